use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A quest a user has finished. One per (user, quest title).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestCompletion {
    pub quest_title: String,
    pub xp: u32,
    pub completed_at: DateTime<Utc>,
}

impl QuestCompletion {
    pub fn now(quest_title: &str, xp: u32) -> Self {
        Self {
            quest_title: quest_title.to_owned(),
            xp,
            completed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub quiz_id: String,
    pub correct: u32,
    pub total: u32,
    pub passed: bool,
    pub attempted_at: DateTime<Utc>,
}

/// Share of correct answers needed to pass a quiz.
pub const PASS_RATIO: f64 = 0.3;

impl QuizAttempt {
    pub fn now(quiz_id: &str, correct: u32, total: u32) -> Self {
        let passed = total > 0 && f64::from(correct) / f64::from(total) >= PASS_RATIO;
        Self {
            quiz_id: quiz_id.to_owned(),
            correct,
            total,
            passed,
            attempted_at: Utc::now(),
        }
    }
}
