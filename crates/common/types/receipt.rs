use ethereum_types::{Address, H256};
use serde::{Deserialize, Serialize};

use crate::serde_utils::{opt_u64_quantity, u64_quantity};

/// The subset of `eth_getTransactionReceipt` the analyzers read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_hash: H256,
    #[serde(with = "u64_quantity")]
    pub block_number: u64,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(with = "u64_quantity")]
    pub gas_used: u64,
    #[serde(default, with = "opt_u64_quantity")]
    pub effective_gas_price: Option<u64>,
    /// `0x1` on success, `0x0` on revert.
    #[serde(with = "u64_quantity")]
    pub status: u64,
    #[serde(default)]
    pub contract_address: Option<Address>,
}

impl Receipt {
    pub fn succeeded(&self) -> bool {
        self.status == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_node_receipt() {
        let raw = r#"{
            "transactionHash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
            "blockNumber": "0x5bad55",
            "from": "0x1000000000000000000000000000000000000001",
            "to": null,
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x3b9aca00",
            "status": "0x1",
            "contractAddress": "0x2000000000000000000000000000000000000002",
            "logs": []
        }"#;
        let receipt: Receipt = serde_json::from_str(raw).unwrap();
        assert!(receipt.succeeded());
        assert_eq!(receipt.block_number, 0x5bad55);
        assert_eq!(receipt.gas_used, 21_000);
        assert_eq!(receipt.effective_gas_price, Some(1_000_000_000));
        assert!(receipt.to.is_none());
        let deployed: Address = "0x2000000000000000000000000000000000000002".parse().unwrap();
        assert_eq!(receipt.contract_address, Some(deployed));
    }

    #[test]
    fn reverted_receipt_is_not_success() {
        let raw = r#"{
            "transactionHash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
            "blockNumber": "0x1",
            "from": "0x1000000000000000000000000000000000000001",
            "to": "0x1000000000000000000000000000000000000001",
            "gasUsed": "0x5208",
            "status": "0x0"
        }"#;
        let receipt: Receipt = serde_json::from_str(raw).unwrap();
        assert!(!receipt.succeeded());
        assert_eq!(receipt.effective_gas_price, None);
    }
}
