use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{ParticipantPair, Thread};
use crate::store::{DynStore, StoreError};

/// Resolves participant pairs to their single thread.
#[derive(Clone)]
pub struct ThreadRegistry {
    store: DynStore,
}

impl ThreadRegistry {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// Return the thread between `user_a` and `user_b`, creating it on first
    /// contact. Argument order does not matter.
    ///
    /// Creation relies on the store's unique index over the pair: when two
    /// callers race, the loser gets `Conflict` and re-reads the winner's row,
    /// so both observe the same thread id.
    pub async fn resolve(&self, user_a: Uuid, user_b: Uuid) -> AppResult<Thread> {
        let pair = ParticipantPair::new(user_a, user_b)?;

        if let Some(thread) = self.store.find_thread_by_pair(pair).await? {
            return Ok(thread);
        }

        match self.store.insert_thread(pair).await {
            Ok(thread) => {
                info!(
                    thread_id = %thread.id,
                    participant_low = %pair.low(),
                    participant_high = %pair.high(),
                    "thread created"
                );
                Ok(thread)
            }
            Err(StoreError::Conflict) => {
                debug!(
                    participant_low = %pair.low(),
                    participant_high = %pair.high(),
                    "lost thread creation race, re-reading"
                );
                self.store
                    .find_thread_by_pair(pair)
                    .await?
                    .ok_or(AppError::Internal)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, thread_id: Uuid) -> AppResult<Thread> {
        self.store
            .get_thread(thread_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Load a thread on behalf of `user_id`; non-participants get `Forbidden`.
    pub async fn get_for_participant(&self, thread_id: Uuid, user_id: Uuid) -> AppResult<Thread> {
        let thread = self.get(thread_id).await?;
        if !thread.is_participant(user_id) {
            return Err(AppError::Forbidden);
        }
        Ok(thread)
    }

    /// Most recently active first.
    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Thread>> {
        Ok(self.store.list_threads(user_id).await?)
    }
}
