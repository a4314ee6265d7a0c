use std::sync::Arc;

use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::models::QuestCompletion;
use crate::db::ProgressStore;
use crate::error::AppError;
use crate::routes::{parse_address, AddressPath, BadgeState, NetworkBadges, QuestInfo};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintBadgeRequest {
    pub user_address: String,
    #[serde(flatten)]
    pub quest: QuestInfo,
}

#[derive(Debug, Serialize)]
pub struct MintBadgeResponse {
    pub queued: bool,
}

#[derive(Debug, Serialize)]
pub struct BadgesResponse {
    pub address: String,
    pub networks: Vec<NetworkBadges>,
}

/// Records the completion and queues the badge. Accepted even when the queue
/// is full; `queued` tells the caller which.
#[post("/api/badges/mint")]
pub async fn mint_badge(
    body: web::Json<MintBadgeRequest>,
    state: web::Data<BadgeState>,
    store: web::Data<Arc<dyn ProgressStore>>,
) -> Result<HttpResponse, AppError> {
    let user = parse_address(&body.user_address)?;
    let quest = body.quest.validated()?;

    let completion = QuestCompletion::now(&quest.quest_title, quest.quest_xp.unwrap_or_default());
    let first = store.record_completion(user, completion).await?;
    info!(?user, quest = %quest.quest_title, first, "Quest completion received");

    let queued = state.enqueue_quest_badge(user, &quest);
    Ok(HttpResponse::Accepted().json(MintBadgeResponse { queued }))
}

#[get("/api/badges/{address}")]
pub async fn get_badges(
    path: web::Path<AddressPath>,
    state: web::Data<BadgeState>,
) -> Result<web::Json<BadgesResponse>, AppError> {
    let user = parse_address(&path.address)?;
    Ok(web::Json(BadgesResponse {
        address: format!("{:#x}", user),
        networks: state.network_badges(user, true).await,
    }))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use ethers::abi::{encode, Token};
    use ethers::types::U256;
    use serde_json::{json, Value};

    use super::*;
    use crate::badge::Rarity;
    use crate::routes::testing::{count_output, live_state, simulated_state, store, USER};

    #[actix_web::test]
    async fn test_mint_queues_and_records() {
        let (state, mut receiver) = simulated_state(4);
        let store = store();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .app_data(web::Data::new(store.clone()))
                .service(mint_badge),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/badges/mint")
            .set_json(json!({ "userAddress": USER, "questTitle": "DeFi Basics Quiz", "questXp": 75 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["queued"], true);

        let request = receiver.try_recv().unwrap();
        assert_eq!(request.rarity, Rarity::Legendary);
        assert_eq!(request.token_uri, "https://defiquest.com/metadata/DeFi-Basics-Quiz");

        let user = parse_address(USER).unwrap();
        assert_eq!(store.completions(user).await.unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn test_full_queue_still_accepted() {
        let (state, _receiver) = simulated_state(1);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .app_data(web::Data::new(store()))
                .service(mint_badge),
        )
        .await;

        let mut queued = Vec::new();
        for title in ["DeFi Basics Quiz", "Advanced DeFi Quiz"] {
            let req = test::TestRequest::post()
                .uri("/api/badges/mint")
                .set_json(json!({ "userAddress": USER, "questTitle": title }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::ACCEPTED);
            let body: Value = test::read_body_json(resp).await;
            queued.push(body["queued"].clone());
        }
        assert_eq!(queued, vec![json!(true), json!(false)]);
    }

    #[actix_web::test]
    async fn test_mint_rejects_bad_address() {
        let (state, _receiver) = simulated_state(4);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .app_data(web::Data::new(store()))
                .service(mint_badge),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/api/badges/mint")
            .set_json(json!({ "userAddress": "0xnothex", "questTitle": "DeFi Basics Quiz" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_get_badges_per_network() {
        let tokens: ethers::types::Bytes =
            encode(&[Token::Array(vec![Token::Uint(U256::from(3)), Token::Uint(U256::from(8))])]).into();
        let (state, _receiver) = live_state(vec![count_output(2), tokens]);
        let app = test::init_service(App::new().app_data(web::Data::new(state)).service(get_badges)).await;

        let req = test::TestRequest::get().uri(&format!("/api/badges/{}", USER)).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["address"], USER);
        let ethereum = &body["networks"][0];
        assert_eq!(ethereum["network"], "ethereum");
        assert_eq!(ethereum["count"], 2);
        assert_eq!(ethereum["available"], true);
        assert_eq!(ethereum["badges"].as_array().unwrap().len(), 2);

        let blockdag = &body["networks"][1];
        assert_eq!(blockdag["network"], "blockdag");
        assert_eq!(blockdag["available"], false);
        assert!(blockdag["count"].is_null());
    }

    #[actix_web::test]
    async fn test_failed_listing_keeps_count() {
        // count answers, the getUserBadges call that follows does not
        let (state, _receiver) = live_state(vec![count_output(2)]);
        let app = test::init_service(App::new().app_data(web::Data::new(state)).service(get_badges)).await;

        let req = test::TestRequest::get().uri(&format!("/api/badges/{}", USER)).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        let ethereum = &body["networks"][0];
        assert_eq!(ethereum["count"], 2);
        assert_eq!(ethereum["available"], true);
        assert!(ethereum.get("badges").is_none());
    }

    #[actix_web::test]
    async fn test_mint_with_catalogue_id() {
        let (state, mut receiver) = simulated_state(4);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .app_data(web::Data::new(store()))
                .service(mint_badge),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/api/badges/mint")
            .set_json(json!({ "userAddress": USER, "questTitle": "DeFi Basics Quiz", "questId": 7 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let request = receiver.try_recv().unwrap();
        assert_eq!(request.quest.numeric_id(), 7);
        assert_eq!(request.rarity, Rarity::Common);
    }
}
