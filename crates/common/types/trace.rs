use std::collections::BTreeMap;

use ethereum_types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::opcodes::Opcode;
use crate::serde_utils::{bytes_hex, u64_quantity};

/// One step of an opcode-level trace (a geth `structLogs` entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTraceFrame {
    pub pc: u64,
    pub op: String,
    /// Gas remaining before the step.
    #[serde(with = "u64_quantity")]
    pub gas: u64,
    #[serde(with = "u64_quantity")]
    pub gas_cost: u64,
    pub depth: u64,
    /// Bottom-to-top, so the last element is the top of the stack.
    #[serde(default)]
    pub stack: Vec<String>,
    /// Memory image as 32-byte hex words.
    #[serde(default)]
    pub memory: Vec<String>,
    #[serde(default)]
    pub storage: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionTraceFrame {
    /// `None` for mnemonics this build doesn't know about.
    pub fn opcode(&self) -> Option<Opcode> {
        self.op.parse().ok()
    }

    /// Memory image size in bytes.
    pub fn memory_size(&self) -> usize {
        self.memory.len() * 32
    }

    pub fn stack_top(&self) -> Option<&str> {
        self.stack.last().map(String::as_str)
    }
}

/// Output of `debug_traceTransaction` with the default struct logger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpcodeTrace {
    #[serde(default, with = "u64_quantity")]
    pub gas: u64,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub return_value: String,
    #[serde(default)]
    pub struct_logs: Vec<ExecutionTraceFrame>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallKind {
    Call,
    DelegateCall,
    StaticCall,
    CallCode,
    Create,
    Create2,
    SelfDestruct,
    Internal,
}

impl CallKind {
    pub fn is_create(self) -> bool {
        matches!(self, CallKind::Create | CallKind::Create2)
    }
}

/// A node of the call tree produced by geth's `callTracer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallTraceNode {
    #[serde(rename = "type")]
    pub kind: CallKind,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default, with = "bytes_hex")]
    pub input: Vec<u8>,
    #[serde(default, with = "bytes_hex")]
    pub output: Vec<u8>,
    #[serde(with = "u64_quantity")]
    pub gas: u64,
    #[serde(with = "u64_quantity")]
    pub gas_used: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub calls: Vec<CallTraceNode>,
}

impl CallTraceNode {
    /// Single-node tree for nodes that can't trace; everything comes from the receipt.
    pub fn from_receipt(from: Address, to: Address, gas_used: u64, succeeded: bool) -> Self {
        Self {
            kind: CallKind::Call,
            from,
            to: Some(to),
            input: Vec::new(),
            output: Vec::new(),
            gas: gas_used,
            gas_used,
            value: None,
            error: (!succeeded).then(|| "execution reverted".to_string()),
            calls: Vec::new(),
        }
    }

    /// Depth of the deepest node, the root being depth 1.
    pub fn depth(&self) -> usize {
        1 + self.calls.iter().map(Self::depth).max().unwrap_or(0)
    }

    pub fn node_count(&self) -> usize {
        1 + self.calls.iter().map(Self::node_count).sum::<usize>()
    }

    /// Pre-order walk.
    pub fn walk(&self) -> Vec<&CallTraceNode> {
        let mut out = vec![self];
        for child in &self.calls {
            out.extend(child.walk());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALL_TRACER_OUTPUT: &str = r#"{
        "type": "CALL",
        "from": "0x1000000000000000000000000000000000000001",
        "to": "0x2000000000000000000000000000000000000002",
        "input": "0xa9059cbb",
        "output": "0x",
        "gas": "0x1d4c0",
        "gasUsed": "0x6d60",
        "value": "0x0",
        "calls": [
            {
                "type": "STATICCALL",
                "from": "0x2000000000000000000000000000000000000002",
                "to": "0x3000000000000000000000000000000000000003",
                "input": "0x70a08231",
                "gas": "0x1000",
                "gasUsed": "0x200",
                "calls": [
                    {
                        "type": "DELEGATECALL",
                        "from": "0x3000000000000000000000000000000000000003",
                        "to": "0x4000000000000000000000000000000000000004",
                        "gas": "0x800",
                        "gasUsed": "0x100"
                    }
                ]
            }
        ]
    }"#;

    #[test]
    fn parses_call_tracer_output() {
        let root: CallTraceNode = serde_json::from_str(CALL_TRACER_OUTPUT).unwrap();
        assert_eq!(root.kind, CallKind::Call);
        assert_eq!(root.gas_used, 0x6d60);
        assert_eq!(root.input, vec![0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(root.value, Some(U256::zero()));
        assert_eq!(root.depth(), 3);
        assert_eq!(root.node_count(), 3);
        let kinds: Vec<CallKind> = root.walk().iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![CallKind::Call, CallKind::StaticCall, CallKind::DelegateCall]
        );
    }

    #[test]
    fn parses_struct_logs() {
        let raw = r#"{
            "gas": 43000,
            "failed": false,
            "returnValue": "",
            "structLogs": [
                {"pc": 0, "op": "PUSH1", "gas": 78000, "gasCost": 3, "depth": 1, "stack": []},
                {"pc": 2, "op": "SSTORE", "gas": 77997, "gasCost": 22100, "depth": 1,
                 "stack": ["0x2a", "0x0"], "memory": ["00", "00"],
                 "storage": {"0000000000000000000000000000000000000000000000000000000000000000": "2a"}}
            ]
        }"#;
        let trace: OpcodeTrace = serde_json::from_str(raw).unwrap();
        assert_eq!(trace.struct_logs.len(), 2);
        let sstore = &trace.struct_logs[1];
        assert_eq!(sstore.opcode(), Some(Opcode::SSTORE));
        assert_eq!(sstore.stack_top(), Some("0x0"));
        assert_eq!(sstore.memory_size(), 64);
        assert_eq!(sstore.storage.len(), 1);
    }

    #[test]
    fn receipt_fallback_is_single_node() {
        let node = CallTraceNode::from_receipt(Address::zero(), Address::repeat_byte(1), 50_000, false);
        assert_eq!(node.node_count(), 1);
        assert_eq!(node.depth(), 1);
        assert_eq!(node.gas_used, 50_000);
        assert!(node.error.is_some());
    }
}
