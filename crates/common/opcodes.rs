use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// EVM instruction set as reported by geth-compatible struct loggers.
///
/// Parsing is by mnemonic (`"SSTORE".parse::<Opcode>()`). Older nodes report
/// `KECCAK256` as `SHA3`, both spellings map to the same variant.
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash, EnumString, Display)]
pub enum Opcode {
    // Stop and Arithmetic Operations
    STOP = 0x00,
    ADD = 0x01,
    MUL = 0x02,
    SUB = 0x03,
    DIV = 0x04,
    SDIV = 0x05,
    MOD = 0x06,
    SMOD = 0x07,
    ADDMOD = 0x08,
    MULMOD = 0x09,
    EXP = 0x0A,
    SIGNEXTEND = 0x0B,

    // Comparison & Bitwise Logic Operations
    LT = 0x10,
    GT = 0x11,
    SLT = 0x12,
    SGT = 0x13,
    EQ = 0x14,
    ISZERO = 0x15,
    AND = 0x16,
    OR = 0x17,
    XOR = 0x18,
    NOT = 0x19,
    BYTE = 0x1A,
    SHL = 0x1B,
    SHR = 0x1C,
    SAR = 0x1D,
    CLZ = 0x1E,

    #[strum(to_string = "KECCAK256", serialize = "SHA3")]
    KECCAK256 = 0x20,

    // Environmental Information
    ADDRESS = 0x30,
    BALANCE = 0x31,
    ORIGIN = 0x32,
    CALLER = 0x33,
    CALLVALUE = 0x34,
    CALLDATALOAD = 0x35,
    CALLDATASIZE = 0x36,
    CALLDATACOPY = 0x37,
    CODESIZE = 0x38,
    CODECOPY = 0x39,
    GASPRICE = 0x3A,
    EXTCODESIZE = 0x3B,
    EXTCODECOPY = 0x3C,
    RETURNDATASIZE = 0x3D,
    RETURNDATACOPY = 0x3E,
    EXTCODEHASH = 0x3F,

    // Block Information
    BLOCKHASH = 0x40,
    COINBASE = 0x41,
    TIMESTAMP = 0x42,
    NUMBER = 0x43,
    #[strum(to_string = "PREVRANDAO", serialize = "DIFFICULTY")]
    PREVRANDAO = 0x44,
    GASLIMIT = 0x45,
    CHAINID = 0x46,
    SELFBALANCE = 0x47,
    BASEFEE = 0x48,
    BLOBHASH = 0x49,
    BLOBBASEFEE = 0x4A,

    // Stack, Memory, Storage, and Flow Operations
    POP = 0x50,
    MLOAD = 0x51,
    MSTORE = 0x52,
    MSTORE8 = 0x53,
    SLOAD = 0x54,
    SSTORE = 0x55,
    JUMP = 0x56,
    JUMPI = 0x57,
    PC = 0x58,
    MSIZE = 0x59,
    GAS = 0x5A,
    JUMPDEST = 0x5B,
    TLOAD = 0x5C,
    TSTORE = 0x5D,
    MCOPY = 0x5E,

    // Push Operations
    PUSH0 = 0x5F,
    PUSH1 = 0x60,
    PUSH2 = 0x61,
    PUSH3 = 0x62,
    PUSH4 = 0x63,
    PUSH5 = 0x64,
    PUSH6 = 0x65,
    PUSH7 = 0x66,
    PUSH8 = 0x67,
    PUSH9 = 0x68,
    PUSH10 = 0x69,
    PUSH11 = 0x6A,
    PUSH12 = 0x6B,
    PUSH13 = 0x6C,
    PUSH14 = 0x6D,
    PUSH15 = 0x6E,
    PUSH16 = 0x6F,
    PUSH17 = 0x70,
    PUSH18 = 0x71,
    PUSH19 = 0x72,
    PUSH20 = 0x73,
    PUSH21 = 0x74,
    PUSH22 = 0x75,
    PUSH23 = 0x76,
    PUSH24 = 0x77,
    PUSH25 = 0x78,
    PUSH26 = 0x79,
    PUSH27 = 0x7A,
    PUSH28 = 0x7B,
    PUSH29 = 0x7C,
    PUSH30 = 0x7D,
    PUSH31 = 0x7E,
    PUSH32 = 0x7F,

    // Duplication Operations
    DUP1 = 0x80,
    DUP2 = 0x81,
    DUP3 = 0x82,
    DUP4 = 0x83,
    DUP5 = 0x84,
    DUP6 = 0x85,
    DUP7 = 0x86,
    DUP8 = 0x87,
    DUP9 = 0x88,
    DUP10 = 0x89,
    DUP11 = 0x8A,
    DUP12 = 0x8B,
    DUP13 = 0x8C,
    DUP14 = 0x8D,
    DUP15 = 0x8E,
    DUP16 = 0x8F,

    // Swap Operations
    SWAP1 = 0x90,
    SWAP2 = 0x91,
    SWAP3 = 0x92,
    SWAP4 = 0x93,
    SWAP5 = 0x94,
    SWAP6 = 0x95,
    SWAP7 = 0x96,
    SWAP8 = 0x97,
    SWAP9 = 0x98,
    SWAP10 = 0x99,
    SWAP11 = 0x9A,
    SWAP12 = 0x9B,
    SWAP13 = 0x9C,
    SWAP14 = 0x9D,
    SWAP15 = 0x9E,
    SWAP16 = 0x9F,

    // Logging Operations
    LOG0 = 0xA0,
    LOG1 = 0xA1,
    LOG2 = 0xA2,
    LOG3 = 0xA3,
    LOG4 = 0xA4,

    // System Operations
    CREATE = 0xF0,
    CALL = 0xF1,
    CALLCODE = 0xF2,
    RETURN = 0xF3,
    DELEGATECALL = 0xF4,
    CREATE2 = 0xF5,
    STATICCALL = 0xFA,
    REVERT = 0xFD,
    INVALID = 0xFE,
    SELFDESTRUCT = 0xFF,
}

/// Coarse grouping used by the gas breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OpcodeCategory {
    Arithmetic,
    Comparison,
    Bitwise,
    Memory,
    Storage,
    Control,
    System,
    Other,
}

impl Opcode {
    pub fn category(self) -> OpcodeCategory {
        use Opcode::*;
        match self {
            ADD | MUL | SUB | DIV | SDIV | MOD | SMOD | ADDMOD | MULMOD | EXP | SIGNEXTEND => {
                OpcodeCategory::Arithmetic
            }
            LT | GT | SLT | SGT | EQ | ISZERO => OpcodeCategory::Comparison,
            AND | OR | XOR | NOT | BYTE | SHL | SHR | SAR | CLZ => OpcodeCategory::Bitwise,
            MLOAD | MSTORE | MSTORE8 | MSIZE | MCOPY => OpcodeCategory::Memory,
            SLOAD | SSTORE | TLOAD | TSTORE => OpcodeCategory::Storage,
            STOP | JUMP | JUMPI | PC | JUMPDEST | RETURN | REVERT | INVALID => {
                OpcodeCategory::Control
            }
            CREATE | CALL | CALLCODE | DELEGATECALL | CREATE2 | STATICCALL | SELFDESTRUCT => {
                OpcodeCategory::System
            }
            KECCAK256 | ADDRESS | BALANCE | ORIGIN | CALLER | CALLVALUE | CALLDATALOAD
            | CALLDATASIZE | CALLDATACOPY | CODESIZE | CODECOPY | GASPRICE | EXTCODESIZE
            | EXTCODECOPY | RETURNDATASIZE | RETURNDATACOPY | EXTCODEHASH | BLOCKHASH
            | COINBASE | TIMESTAMP | NUMBER | PREVRANDAO | GASLIMIT | CHAINID | SELFBALANCE
            | BASEFEE | BLOBHASH | BLOBBASEFEE | GAS | POP | PUSH0 | PUSH1 | PUSH2 | PUSH3
            | PUSH4 | PUSH5 | PUSH6 | PUSH7 | PUSH8 | PUSH9 | PUSH10 | PUSH11 | PUSH12
            | PUSH13 | PUSH14 | PUSH15 | PUSH16 | PUSH17 | PUSH18 | PUSH19 | PUSH20 | PUSH21
            | PUSH22 | PUSH23 | PUSH24 | PUSH25 | PUSH26 | PUSH27 | PUSH28 | PUSH29 | PUSH30
            | PUSH31 | PUSH32 | DUP1 | DUP2 | DUP3 | DUP4 | DUP5 | DUP6 | DUP7 | DUP8 | DUP9
            | DUP10 | DUP11 | DUP12 | DUP13 | DUP14 | DUP15 | DUP16 | SWAP1 | SWAP2 | SWAP3
            | SWAP4 | SWAP5 | SWAP6 | SWAP7 | SWAP8 | SWAP9 | SWAP10 | SWAP11 | SWAP12
            | SWAP13 | SWAP14 | SWAP15 | SWAP16 | LOG0 | LOG1 | LOG2 | LOG3 | LOG4 => {
                OpcodeCategory::Other
            }
        }
    }

    /// `SLOAD` and `SSTORE`. Transient storage is not counted.
    pub fn is_storage_access(self) -> bool {
        matches!(self, Opcode::SLOAD | Opcode::SSTORE)
    }

    /// Message calls into another account. `CALLCODE` is deprecated and not counted.
    pub fn is_external_call(self) -> bool {
        matches!(
            self,
            Opcode::CALL | Opcode::DELEGATECALL | Opcode::STATICCALL
        )
    }
}

/// Categorize a raw mnemonic. Unknown mnemonics fall into [`OpcodeCategory::Other`].
pub fn categorize(mnemonic: &str) -> OpcodeCategory {
    mnemonic
        .parse::<Opcode>()
        .map(Opcode::category)
        .unwrap_or(OpcodeCategory::Other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mnemonics() {
        assert_eq!("SSTORE".parse::<Opcode>().unwrap(), Opcode::SSTORE);
        assert_eq!("SHA3".parse::<Opcode>().unwrap(), Opcode::KECCAK256);
        assert_eq!("KECCAK256".parse::<Opcode>().unwrap(), Opcode::KECCAK256);
        assert!("NOT_AN_OPCODE".parse::<Opcode>().is_err());
    }

    #[test]
    fn categories() {
        assert_eq!(categorize("ADD"), OpcodeCategory::Arithmetic);
        assert_eq!(categorize("ISZERO"), OpcodeCategory::Comparison);
        assert_eq!(categorize("SHR"), OpcodeCategory::Bitwise);
        assert_eq!(categorize("MSTORE"), OpcodeCategory::Memory);
        assert_eq!(categorize("SLOAD"), OpcodeCategory::Storage);
        assert_eq!(categorize("JUMPI"), OpcodeCategory::Control);
        assert_eq!(categorize("DELEGATECALL"), OpcodeCategory::System);
        assert_eq!(categorize("PUSH1"), OpcodeCategory::Other);
        assert_eq!(categorize("opcode 0xef not defined"), OpcodeCategory::Other);
    }

    #[test]
    fn call_and_storage_predicates() {
        assert!(Opcode::STATICCALL.is_external_call());
        assert!(!Opcode::CALLCODE.is_external_call());
        assert!(Opcode::SSTORE.is_storage_access());
        assert!(!Opcode::TSTORE.is_storage_access());
    }

    #[test]
    fn category_display_is_snake_case() {
        assert_eq!(OpcodeCategory::Arithmetic.to_string(), "arithmetic");
    }
}
