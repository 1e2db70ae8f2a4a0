//! Collaborators consumed by the analyzers: the chain node, the Solidity
//! compiler and the price oracle.

pub mod abi;
pub mod client;
pub mod compiler;
pub mod connector;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod oracle;
pub mod rpc;
pub mod signer;

pub use client::{
    CallRequest, ChainClient, DeployedContract, EthClient, SentTransaction, TransactionRequest,
    wait_for_receipt,
};
pub use compiler::{CompilerAdapter, SolcCompiler};
pub use connector::{ChainConnector, EthClientConnector};
pub use error::{AbiError, ChainClientError, CompilerError, OracleError, RpcError, SignerError};
pub use oracle::{PriceOracle, StaticPriceOracle};
pub use signer::Signer;
