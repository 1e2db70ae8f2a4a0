use ethereum_types::U256;
use l2scope_common::networks::NetworkError;
use l2scope_rpc::{ChainClientError, OracleError};
use l2scope_storage::StoreError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("Invalid network: {0}")]
    InvalidNetwork(#[from] NetworkError),

    #[error("Invalid test configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Insufficient balance: {available} wei available, {required} wei required")]
    InsufficientBalance { required: U256, available: U256 },

    #[error("Chain interaction failed: {0}")]
    Chain(#[from] ChainClientError),

    #[error("Price lookup failed: {0}")]
    Oracle(#[from] OracleError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Sequencer test {0} not found")]
    SessionNotFound(Uuid),

    #[error("Test cancelled")]
    Cancelled,

    #[error("Test task failed: {0}")]
    Task(String),
}
