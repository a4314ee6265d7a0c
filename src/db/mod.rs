pub mod memory;
pub mod models;

use async_trait::async_trait;
use ethers::types::Address;

use crate::db::models::{QuestCompletion, QuizAttempt};
use crate::error::StoreError;

pub use memory::MemoryStore;

/// Per-user quest progress. Handlers only see this trait, so the in-memory
/// store can be replaced by a database without touching them.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Records a completion. Returns `false` if `user` already completed it.
    async fn record_completion(
        &self,
        user: Address,
        completion: QuestCompletion,
    ) -> Result<bool, StoreError>;

    async fn completions(&self, user: Address) -> Result<Vec<QuestCompletion>, StoreError>;

    async fn record_attempt(&self, user: Address, attempt: QuizAttempt) -> Result<(), StoreError>;

    async fn attempts(&self, user: Address, quiz_id: &str) -> Result<Vec<QuizAttempt>, StoreError>;

    /// Bumps the attempt counter for `quiz_id` and returns the new value.
    async fn increment_attempts(&self, user: Address, quiz_id: &str) -> Result<u32, StoreError>;
}
