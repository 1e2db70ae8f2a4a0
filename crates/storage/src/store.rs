use std::{path::Path, sync::Arc};

use l2scope_common::types::{ComplexityProfile, SequencerPerformanceTest};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::StoreEngine;
use crate::error::StoreError;
use crate::store_db::in_memory::Store as InMemoryStore;
#[cfg(feature = "sql")]
use crate::store_db::sql::SQLStore;

/// Snapshots buffered per subscriber before the slowest one starts lagging.
const UPDATES_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct Store {
    engine: Arc<dyn StoreEngine>,
    updates: broadcast::Sender<SequencerPerformanceTest>,
}

impl Default for Store {
    fn default() -> Self {
        Self::from_engine(Arc::new(InMemoryStore::new()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineType {
    InMemory,
    #[cfg(feature = "sql")]
    SQL,
}

impl Store {
    pub fn new(_path: &Path, engine_type: EngineType) -> Result<Self, StoreError> {
        info!("Starting l2scope storage engine ({engine_type:?})");
        let store = match engine_type {
            EngineType::InMemory => Self::from_engine(Arc::new(InMemoryStore::new())),
            #[cfg(feature = "sql")]
            EngineType::SQL => Self::from_engine(Arc::new(SQLStore::new(_path)?)),
        };
        info!("Started l2scope storage engine");
        Ok(store)
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    fn from_engine(engine: Arc<dyn StoreEngine>) -> Self {
        let (updates, _) = broadcast::channel(UPDATES_CAPACITY);
        Self { engine, updates }
    }

    pub async fn insert_profile(&self, profile: ComplexityProfile) -> Result<(), StoreError> {
        debug!(profile_id = %profile.id, "Storing complexity profile");
        self.engine.insert_profile(profile).await
    }

    pub async fn get_profile(&self, id: Uuid) -> Result<Option<ComplexityProfile>, StoreError> {
        self.engine.get_profile(id).await
    }

    pub async fn list_profiles(&self) -> Result<Vec<ComplexityProfile>, StoreError> {
        self.engine.list_profiles().await
    }

    /// Profiles of one contract function, oldest first.
    pub async fn profiles_for(
        &self,
        contract_name: &str,
        function_name: &str,
    ) -> Result<Vec<ComplexityProfile>, StoreError> {
        Ok(self
            .list_profiles()
            .await?
            .into_iter()
            .filter(|p| p.contract_name == contract_name && p.function_name == function_name)
            .collect())
    }

    /// Replaces the stored snapshot and publishes it to subscribers.
    ///
    /// A terminal snapshot can't be replaced.
    pub async fn put_sequencer_test(&self, test: SequencerPerformanceTest) -> Result<(), StoreError> {
        if let Some(stored) = self.engine.get_sequencer_test(test.id).await?
            && stored.is_terminal()
        {
            return Err(StoreError::TerminalRecord(test.id));
        }
        self.engine.put_sequencer_test(test.clone()).await?;
        debug!(session_id = %test.id, status = %test.status, "Stored sequencer test snapshot");
        // No receivers is fine.
        let _ = self.updates.send(test);
        Ok(())
    }

    pub async fn get_sequencer_test(
        &self,
        id: Uuid,
    ) -> Result<Option<SequencerPerformanceTest>, StoreError> {
        self.engine.get_sequencer_test(id).await
    }

    pub async fn list_sequencer_tests(&self) -> Result<Vec<SequencerPerformanceTest>, StoreError> {
        self.engine.list_sequencer_tests().await
    }

    /// Follow the snapshots of one session.
    ///
    /// The current snapshot, if any, is yielded first. The stream ends after a
    /// terminal snapshot.
    pub async fn subscribe(&self, id: Uuid) -> Result<SessionUpdates, StoreError> {
        // Subscribe before reading so nothing published in between is missed.
        let receiver = self.updates.subscribe();
        let current = self.engine.get_sequencer_test(id).await?;
        Ok(SessionUpdates {
            id,
            receiver,
            current,
            done: false,
        })
    }
}

/// Push stream of [`SequencerPerformanceTest`] snapshots for one session.
#[derive(Debug)]
pub struct SessionUpdates {
    id: Uuid,
    receiver: broadcast::Receiver<SequencerPerformanceTest>,
    current: Option<SequencerPerformanceTest>,
    done: bool,
}

impl SessionUpdates {
    pub fn session_id(&self) -> Uuid {
        self.id
    }

    /// Next snapshot, or `None` once the session is terminal or the store is gone.
    pub async fn next(&mut self) -> Option<SequencerPerformanceTest> {
        if self.done {
            return None;
        }
        if let Some(current) = self.current.take() {
            self.done = current.is_terminal();
            return Some(current);
        }
        loop {
            match self.receiver.recv().await {
                Ok(snapshot) if snapshot.id == self.id => {
                    self.done = snapshot.is_terminal();
                    return Some(snapshot);
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Snapshots are whole records, so the next one supersedes the skipped.
                    warn!(session_id = %self.id, skipped, "Subscriber lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}
