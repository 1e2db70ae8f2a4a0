use l2scope_common::networks::NetworkError;
use l2scope_rpc::{ChainClientError, CompilerError, OracleError};
use l2scope_storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ProfilerError {
    #[error("Invalid network: {0}")]
    InvalidNetwork(#[from] NetworkError),

    #[error(transparent)]
    Compilation(#[from] CompilerError),

    #[error("Chain interaction failed: {0}")]
    Chain(#[from] ChainClientError),

    #[error("Price lookup failed: {0}")]
    Oracle(#[from] OracleError),

    #[error("Failed to persist profile: {0}")]
    Storage(#[from] StoreError),
}

impl ProfilerError {
    /// Compiler diagnostics, when this is a compilation failure.
    pub fn diagnostics(&self) -> Option<&[String]> {
        match self {
            ProfilerError::Compilation(CompilerError::Compilation(diagnostics)) => {
                Some(diagnostics)
            }
            _ => None,
        }
    }
}
