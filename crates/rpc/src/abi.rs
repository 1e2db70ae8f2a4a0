//! Minimal Solidity ABI encoder for calldata built from JSON arguments.
//!
//! Covers the elementary types (`uintN`, `intN`, `address`, `bool`,
//! `bytesN`, `bytes`, `string`) and dynamic arrays of them. Tuples and
//! fixed-size arrays are rejected with [`AbiError::UnsupportedType`].

use ethereum_types::{Address, U256};
use serde_json::Value;

use crate::error::AbiError;
use crate::signer::keccak;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Uint(usize),
    Int(usize),
    Address,
    Bool,
    FixedBytes(usize),
    Bytes,
    String,
    Array(Box<ParamType>),
}

impl ParamType {
    pub fn parse(raw: &str) -> Result<Self, AbiError> {
        if let Some(inner) = raw.strip_suffix("[]") {
            return Ok(ParamType::Array(Box::new(Self::parse(inner)?)));
        }
        let unsupported = || AbiError::UnsupportedType(raw.to_string());
        let bits = |rest: &str| -> Result<usize, AbiError> {
            if rest.is_empty() {
                return Ok(256);
            }
            match rest.parse::<usize>() {
                Ok(bits) if bits > 0 && bits <= 256 && bits % 8 == 0 => Ok(bits),
                _ => Err(unsupported()),
            }
        };
        match raw {
            "address" => Ok(ParamType::Address),
            "bool" => Ok(ParamType::Bool),
            "bytes" => Ok(ParamType::Bytes),
            "string" => Ok(ParamType::String),
            _ => {
                if let Some(rest) = raw.strip_prefix("uint") {
                    Ok(ParamType::Uint(bits(rest)?))
                } else if let Some(rest) = raw.strip_prefix("int") {
                    Ok(ParamType::Int(bits(rest)?))
                } else if let Some(rest) = raw.strip_prefix("bytes") {
                    match rest.parse::<usize>() {
                        Ok(len) if (1..=32).contains(&len) => Ok(ParamType::FixedBytes(len)),
                        _ => Err(unsupported()),
                    }
                } else {
                    Err(unsupported())
                }
            }
        }
    }

    fn canonical(&self) -> String {
        match self {
            ParamType::Uint(bits) => format!("uint{bits}"),
            ParamType::Int(bits) => format!("int{bits}"),
            ParamType::Address => "address".to_string(),
            ParamType::Bool => "bool".to_string(),
            ParamType::FixedBytes(len) => format!("bytes{len}"),
            ParamType::Bytes => "bytes".to_string(),
            ParamType::String => "string".to_string(),
            ParamType::Array(inner) => format!("{}[]", inner.canonical()),
        }
    }
}

enum Token {
    Static([u8; 32]),
    /// Tail encoding of a dynamic value; the head holds its offset.
    Dynamic(Vec<u8>),
}

pub fn function_signature(name: &str, params: &[ParamType]) -> String {
    let types: Vec<String> = params.iter().map(ParamType::canonical).collect();
    format!("{name}({})", types.join(","))
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// `selector || encode(args)` for `function`, resolved by name and arity.
pub fn encode_call(abi: &Value, function: &str, args: &[Value]) -> Result<Vec<u8>, AbiError> {
    let candidates: Vec<&Value> = entries(abi)?
        .iter()
        .filter(|entry| {
            entry.get("type").and_then(Value::as_str) == Some("function")
                && entry.get("name").and_then(Value::as_str) == Some(function)
        })
        .collect();
    let first = candidates
        .first()
        .ok_or_else(|| AbiError::FunctionNotFound(function.to_string()))?;
    let entry = candidates
        .iter()
        .find(|entry| input_count(entry) == args.len())
        .unwrap_or(first);

    let params = input_types(entry)?;
    let mut calldata = selector(&function_signature(function, &params)).to_vec();
    calldata.extend(encode_args(function, &params, args)?);
    Ok(calldata)
}

/// Encoded constructor arguments, to be appended to the creation bytecode.
pub fn encode_constructor(abi: &Value, args: &[Value]) -> Result<Vec<u8>, AbiError> {
    let constructor = entries(abi)?
        .iter()
        .find(|entry| entry.get("type").and_then(Value::as_str) == Some("constructor"));
    let params = match constructor {
        Some(entry) => input_types(entry)?,
        None => Vec::new(),
    };
    encode_args("constructor", &params, args)
}

fn entries(abi: &Value) -> Result<&Vec<Value>, AbiError> {
    abi.as_array()
        .ok_or_else(|| AbiError::Malformed("ABI must be a JSON array".to_string()))
}

fn input_count(entry: &Value) -> usize {
    entry
        .get("inputs")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}

fn input_types(entry: &Value) -> Result<Vec<ParamType>, AbiError> {
    let Some(inputs) = entry.get("inputs").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    inputs
        .iter()
        .map(|input| {
            let ty = input
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| AbiError::Malformed("input without type".to_string()))?;
            ParamType::parse(ty)
        })
        .collect()
}

fn encode_args(function: &str, params: &[ParamType], args: &[Value]) -> Result<Vec<u8>, AbiError> {
    if params.len() != args.len() {
        return Err(AbiError::ArgumentCount {
            function: function.to_string(),
            expected: params.len(),
            got: args.len(),
        });
    }
    let tokens = params
        .iter()
        .zip(args)
        .map(|(param, arg)| tokenize(param, arg))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(encode_tokens(&tokens))
}

fn encode_tokens(tokens: &[Token]) -> Vec<u8> {
    let head_len = 32 * tokens.len();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();
    for token in tokens {
        match token {
            Token::Static(word) => head.extend_from_slice(word),
            Token::Dynamic(bytes) => {
                head.extend_from_slice(&u256_word(U256::from(head_len + tail.len())));
                tail.extend_from_slice(bytes);
            }
        }
    }
    head.extend(tail);
    head
}

fn tokenize(param: &ParamType, arg: &Value) -> Result<Token, AbiError> {
    let invalid = |reason: &str| AbiError::InvalidArgument {
        ty: param.canonical(),
        value: arg.to_string(),
        reason: reason.to_string(),
    };
    match param {
        ParamType::Uint(bits) => {
            let value = parse_uint(arg).ok_or_else(|| invalid("not an unsigned integer"))?;
            if *bits < 256 && value.bits() > *bits {
                return Err(invalid("out of range"));
            }
            Ok(Token::Static(u256_word(value)))
        }
        ParamType::Int(_) => {
            let value = parse_int(arg).ok_or_else(|| invalid("not an integer"))?;
            Ok(Token::Static(u256_word(value)))
        }
        ParamType::Address => {
            let address: Address = arg
                .as_str()
                .and_then(|raw| raw.parse().ok())
                .ok_or_else(|| invalid("not an address"))?;
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(address.as_bytes());
            Ok(Token::Static(word))
        }
        ParamType::Bool => {
            let flag = match arg {
                Value::Bool(flag) => *flag,
                Value::String(raw) if raw == "true" => true,
                Value::String(raw) if raw == "false" => false,
                _ => return Err(invalid("not a bool")),
            };
            Ok(Token::Static(u256_word(U256::from(u8::from(flag)))))
        }
        ParamType::FixedBytes(len) => {
            let bytes = parse_hex(arg).ok_or_else(|| invalid("not hex"))?;
            if bytes.len() > *len {
                return Err(invalid("too long"));
            }
            let mut word = [0u8; 32];
            word[..bytes.len()].copy_from_slice(&bytes);
            Ok(Token::Static(word))
        }
        ParamType::Bytes => {
            let bytes = parse_hex(arg).ok_or_else(|| invalid("not hex"))?;
            Ok(Token::Dynamic(encode_packed_bytes(&bytes)))
        }
        ParamType::String => {
            let text = arg.as_str().ok_or_else(|| invalid("not a string"))?;
            Ok(Token::Dynamic(encode_packed_bytes(text.as_bytes())))
        }
        ParamType::Array(inner) => {
            let items = arg.as_array().ok_or_else(|| invalid("not an array"))?;
            let tokens = items
                .iter()
                .map(|item| tokenize(inner, item))
                .collect::<Result<Vec<_>, _>>()?;
            let mut encoded = u256_word(U256::from(items.len())).to_vec();
            encoded.extend(encode_tokens(&tokens));
            Ok(Token::Dynamic(encoded))
        }
    }
}

fn u256_word(value: U256) -> [u8; 32] {
    value.to_big_endian()
}

/// Length word followed by the bytes right-padded to a multiple of 32.
fn encode_packed_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut encoded = u256_word(U256::from(bytes.len())).to_vec();
    encoded.extend_from_slice(bytes);
    let padding = (32 - bytes.len() % 32) % 32;
    encoded.extend(std::iter::repeat_n(0u8, padding));
    encoded
}

fn parse_uint(arg: &Value) -> Option<U256> {
    match arg {
        Value::Number(number) => number.as_u64().map(U256::from),
        Value::String(raw) => match raw.strip_prefix("0x") {
            Some(hex) => U256::from_str_radix(hex, 16).ok(),
            None => U256::from_dec_str(raw).ok(),
        },
        _ => None,
    }
}

/// Two's complement encoding for negative values.
fn parse_int(arg: &Value) -> Option<U256> {
    let (negative, magnitude) = match arg {
        Value::Number(number) => {
            let value = number.as_i64()?;
            (value < 0, U256::from(value.unsigned_abs()))
        }
        Value::String(raw) => match raw.strip_prefix('-') {
            Some(rest) => (true, parse_uint(&Value::String(rest.to_string()))?),
            None => (false, parse_uint(arg)?),
        },
        _ => return None,
    };
    if negative {
        Some((!magnitude).overflowing_add(U256::one()).0)
    } else {
        Some(magnitude)
    }
}

fn parse_hex(arg: &Value) -> Option<Vec<u8>> {
    let raw = arg.as_str()?;
    hex::decode(raw.strip_prefix("0x").unwrap_or(raw)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn erc20_abi() -> Value {
        json!([
            {"type": "constructor", "inputs": [{"name": "supply", "type": "uint256"}]},
            {"type": "function", "name": "transfer", "inputs": [
                {"name": "to", "type": "address"},
                {"name": "amount", "type": "uint256"}
            ]},
            {"type": "function", "name": "setName", "inputs": [{"name": "name", "type": "string"}]},
            {"type": "function", "name": "store", "inputs": [{"name": "values", "type": "uint256[]"}]},
            {"type": "event", "name": "Transfer", "inputs": []}
        ])
    }

    #[test]
    fn known_selectors() {
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(selector("balanceOf(address)"), [0x70, 0xa0, 0x82, 0x31]);
    }

    #[test]
    fn encodes_static_arguments() {
        let calldata = encode_call(
            &erc20_abi(),
            "transfer",
            &[json!("0x00000000000000000000000000000000000000ff"), json!(1000)],
        )
        .unwrap();
        assert_eq!(calldata.len(), 4 + 64);
        assert_eq!(&calldata[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(calldata[4 + 31], 0xff);
        assert_eq!(U256::from_big_endian(&calldata[36..68]), U256::from(1000));
    }

    #[test]
    fn encodes_dynamic_arguments() {
        let calldata = encode_call(&erc20_abi(), "setName", &[json!("hello")]).unwrap();
        let body = &calldata[4..];
        // offset, length, padded data
        assert_eq!(body.len(), 96);
        assert_eq!(U256::from_big_endian(&body[..32]), U256::from(32));
        assert_eq!(U256::from_big_endian(&body[32..64]), U256::from(5));
        assert_eq!(&body[64..69], b"hello");
        assert!(body[69..].iter().all(|b| *b == 0));

        let calldata = encode_call(&erc20_abi(), "store", &[json!([1, 2, 3])]).unwrap();
        let body = &calldata[4..];
        assert_eq!(body.len(), 32 * 5);
        assert_eq!(U256::from_big_endian(&body[32..64]), U256::from(3));
        assert_eq!(U256::from_big_endian(&body[128..160]), U256::from(3));
    }

    #[test]
    fn encodes_negative_ints_as_twos_complement() {
        let word = match tokenize(&ParamType::Int(256), &json!(-1)).unwrap() {
            Token::Static(word) => word,
            Token::Dynamic(_) => panic!("int is static"),
        };
        assert!(word.iter().all(|b| *b == 0xff));
    }

    #[test]
    fn rejects_bad_calls() {
        assert!(matches!(
            encode_call(&erc20_abi(), "mint", &[]),
            Err(AbiError::FunctionNotFound(_))
        ));
        assert!(matches!(
            encode_call(&erc20_abi(), "transfer", &[json!(1)]),
            Err(AbiError::ArgumentCount { expected: 2, got: 1, .. })
        ));
        assert!(matches!(
            encode_call(&erc20_abi(), "transfer", &[json!("nope"), json!(1)]),
            Err(AbiError::InvalidArgument { .. })
        ));
        assert!(matches!(
            ParamType::parse("tuple"),
            Err(AbiError::UnsupportedType(_))
        ));
        assert!(matches!(
            tokenize(&ParamType::Uint(8), &json!(256)),
            Err(AbiError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn constructor_arguments() {
        let encoded = encode_constructor(&erc20_abi(), &[json!("1000000")]).unwrap();
        assert_eq!(U256::from_big_endian(&encoded), U256::from(1_000_000));
        assert!(encode_constructor(&json!([]), &[]).unwrap().is_empty());
        assert!(encode_constructor(&json!([]), &[json!(1)]).is_err());
    }
}
