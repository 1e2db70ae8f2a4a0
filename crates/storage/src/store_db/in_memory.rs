use std::{
    fmt::Debug,
    sync::{Arc, Mutex, MutexGuard},
};

use l2scope_common::types::{ComplexityProfile, SequencerPerformanceTest};
use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::api::StoreEngine;
use crate::error::StoreError;

#[derive(Default, Clone)]
pub struct Store(Arc<Mutex<StoreInner>>);

#[derive(Default, Debug)]
struct StoreInner {
    /// Profiles by id
    profiles: FxHashMap<Uuid, ComplexityProfile>,
    /// Profile ids in insertion order
    profile_order: Vec<Uuid>,
    /// Latest snapshot of each sequencer test by id
    sequencer_tests: FxHashMap<Uuid, SequencerPerformanceTest>,
    /// Sequencer test ids in first-insertion order
    sequencer_order: Vec<Uuid>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> Result<MutexGuard<'_, StoreInner>, StoreError> {
        self.0
            .lock()
            .map_err(|_| StoreError::Custom("Failed to lock the store".to_string()))
    }
}

#[async_trait::async_trait]
impl StoreEngine for Store {
    async fn insert_profile(&self, profile: ComplexityProfile) -> Result<(), StoreError> {
        let mut inner = self.inner()?;
        if inner.profiles.contains_key(&profile.id) {
            return Err(StoreError::AlreadyExists(profile.id));
        }
        inner.profile_order.push(profile.id);
        inner.profiles.insert(profile.id, profile);
        Ok(())
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<ComplexityProfile>, StoreError> {
        Ok(self.inner()?.profiles.get(&id).cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<ComplexityProfile>, StoreError> {
        let inner = self.inner()?;
        Ok(inner
            .profile_order
            .iter()
            .filter_map(|id| inner.profiles.get(id).cloned())
            .collect())
    }

    async fn put_sequencer_test(&self, test: SequencerPerformanceTest) -> Result<(), StoreError> {
        let mut inner = self.inner()?;
        if inner.sequencer_tests.insert(test.id, test.clone()).is_none() {
            inner.sequencer_order.push(test.id);
        }
        Ok(())
    }

    async fn get_sequencer_test(
        &self,
        id: Uuid,
    ) -> Result<Option<SequencerPerformanceTest>, StoreError> {
        Ok(self.inner()?.sequencer_tests.get(&id).cloned())
    }

    async fn list_sequencer_tests(&self) -> Result<Vec<SequencerPerformanceTest>, StoreError> {
        let inner = self.inner()?;
        Ok(inner
            .sequencer_order
            .iter()
            .filter_map(|id| inner.sequencer_tests.get(id).cloned())
            .collect())
    }
}

impl Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("In-memory Store").finish()
    }
}
