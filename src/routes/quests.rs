use std::sync::Arc;

use actix_web::{post, web};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::models::{QuestCompletion, QuizAttempt};
use crate::db::ProgressStore;
use crate::error::AppError;
use crate::routes::{parse_address, BadgeState, QuestInfo};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQuizRequest {
    pub user_address: String,
    #[serde(flatten)]
    pub quest: QuestInfo,
    pub correct: u32,
    pub total: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQuizResponse {
    pub passed: bool,
    pub score: String,
    pub attempt: u32,
    pub best_score: String,
    pub badge_queued: bool,
}

/// Records a scored quiz attempt. The first pass of a quest completes it and
/// queues its badge; later passes do not mint again.
#[post("/api/quests/submit")]
pub async fn submit_quiz(
    body: web::Json<SubmitQuizRequest>,
    state: web::Data<BadgeState>,
    store: web::Data<Arc<dyn ProgressStore>>,
) -> Result<web::Json<SubmitQuizResponse>, AppError> {
    let user = parse_address(&body.user_address)?;
    let quest = body.quest.validated()?;
    if body.total == 0 || body.correct > body.total {
        return Err(AppError::BadRequest("invalid quiz submission".to_owned()));
    }
    let title = quest.quest_title.as_str();

    let attempt_number = store.increment_attempts(user, title).await?;
    let attempt = QuizAttempt::now(title, body.correct, body.total);
    let passed = attempt.passed;
    store.record_attempt(user, attempt).await?;
    let best_score = store
        .attempts(user, title)
        .await?
        .iter()
        .max_by(|a, b| {
            (u64::from(a.correct) * u64::from(b.total)).cmp(&(u64::from(b.correct) * u64::from(a.total)))
        })
        .map(|best| format!("{}/{}", best.correct, best.total))
        .unwrap_or_default();

    let mut badge_queued = false;
    if passed {
        let xp = quest.quest_xp.unwrap_or_default();
        if store.record_completion(user, QuestCompletion::now(title, xp)).await? {
            badge_queued = state.enqueue_quest_badge(user, &quest);
        }
    }
    info!(?user, quest = title, attempt = attempt_number, passed, badge_queued, "Quiz submitted");

    Ok(web::Json(SubmitQuizResponse {
        passed,
        score: format!("{}/{}", body.correct, body.total),
        attempt: attempt_number,
        best_score,
        badge_queued,
    }))
}
