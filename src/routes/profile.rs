use std::sync::Arc;

use actix_web::{get, web};
use serde::Serialize;

use crate::db::models::QuestCompletion;
use crate::db::ProgressStore;
use crate::error::AppError;
use crate::routes::{parse_address, AddressPath, BadgeState, NetworkBadges};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub address: String,
    pub total_xp: u64,
    pub completed_quests: Vec<QuestCompletion>,
    pub badges: Vec<NetworkBadges>,
}

#[get("/api/profile/{address}")]
pub async fn get_profile(
    path: web::Path<AddressPath>,
    state: web::Data<BadgeState>,
    store: web::Data<Arc<dyn ProgressStore>>,
) -> Result<web::Json<ProfileResponse>, AppError> {
    let user = parse_address(&path.address)?;
    let completed_quests = store.completions(user).await?;
    let total_xp = completed_quests.iter().map(|c| u64::from(c.xp)).sum();

    Ok(web::Json(ProfileResponse {
        address: format!("{:#x}", user),
        total_xp,
        completed_quests,
        badges: state.network_badges(user, false).await,
    }))
}
