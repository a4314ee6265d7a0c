use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use ethers::types::Address;

use crate::db::models::{QuestCompletion, QuizAttempt};
use crate::db::ProgressStore;
use crate::error::StoreError;

#[derive(Default)]
struct Progress {
    completions: HashMap<Address, Vec<QuestCompletion>>,
    attempts: HashMap<(Address, String), Vec<QuizAttempt>>,
    attempt_counts: HashMap<(Address, String), u32>,
}

/// Process-lifetime store behind a single mutex. Every operation holds the
/// lock only for the map access itself.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Progress>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Progress>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn record_completion(
        &self,
        user: Address,
        completion: QuestCompletion,
    ) -> Result<bool, StoreError> {
        let mut progress = self.lock()?;
        let done = progress.completions.entry(user).or_default();
        if done.iter().any(|c| c.quest_title == completion.quest_title) {
            return Ok(false);
        }
        done.push(completion);
        Ok(true)
    }

    async fn completions(&self, user: Address) -> Result<Vec<QuestCompletion>, StoreError> {
        Ok(self.lock()?.completions.get(&user).cloned().unwrap_or_default())
    }

    async fn record_attempt(&self, user: Address, attempt: QuizAttempt) -> Result<(), StoreError> {
        self.lock()?
            .attempts
            .entry((user, attempt.quiz_id.clone()))
            .or_default()
            .push(attempt);
        Ok(())
    }

    async fn attempts(&self, user: Address, quiz_id: &str) -> Result<Vec<QuizAttempt>, StoreError> {
        Ok(self
            .lock()?
            .attempts
            .get(&(user, quiz_id.to_owned()))
            .cloned()
            .unwrap_or_default())
    }

    async fn increment_attempts(&self, user: Address, quiz_id: &str) -> Result<u32, StoreError> {
        let mut progress = self.lock()?;
        let count = progress
            .attempt_counts
            .entry((user, quiz_id.to_owned()))
            .or_insert(0);
        *count += 1;
        Ok(*count)
    }
}
