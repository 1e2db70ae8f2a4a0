pub use ethereum_types::{Address, H256, U256};

pub mod config;
pub mod networks;
pub mod opcodes;
pub mod serde_utils;
pub mod stats;
pub mod types;
