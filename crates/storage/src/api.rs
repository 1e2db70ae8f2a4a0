// Storage API for analysis results

use std::fmt::Debug;

use l2scope_common::types::{ComplexityProfile, SequencerPerformanceTest};
use uuid::Uuid;

use crate::error::StoreError;

// We need async_trait because the stabilized feature lacks support for object safety
// (i.e. dyn StoreEngine)
#[async_trait::async_trait]
pub trait StoreEngine: Debug + Send + Sync {
    /// Stores a new profile. Fails with `AlreadyExists` if the id is taken.
    async fn insert_profile(&self, profile: ComplexityProfile) -> Result<(), StoreError>;

    async fn get_profile(&self, id: Uuid) -> Result<Option<ComplexityProfile>, StoreError>;

    /// All profiles, oldest first.
    async fn list_profiles(&self) -> Result<Vec<ComplexityProfile>, StoreError>;

    /// Stores a sequencer test snapshot, replacing any previous one with the same id.
    async fn put_sequencer_test(&self, test: SequencerPerformanceTest) -> Result<(), StoreError>;

    async fn get_sequencer_test(
        &self,
        id: Uuid,
    ) -> Result<Option<SequencerPerformanceTest>, StoreError>;

    /// All sequencer tests, oldest first.
    async fn list_sequencer_tests(&self) -> Result<Vec<SequencerPerformanceTest>, StoreError>;
}
