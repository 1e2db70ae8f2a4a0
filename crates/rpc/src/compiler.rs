use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use l2scope_common::types::CompiledContract;
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::CompilerError;

/// Source file name used in the compiler's standard-JSON input.
const SOURCE_UNIT: &str = "Contract.sol";

#[async_trait]
pub trait CompilerAdapter: Send + Sync {
    /// Compile `source` and return the artifacts of `contract_name`.
    async fn compile(
        &self,
        source: &str,
        contract_name: &str,
    ) -> Result<CompiledContract, CompilerError>;
}

/// Runs `solc --standard-json` as a child process.
#[derive(Debug, Clone)]
pub struct SolcCompiler {
    solc_path: PathBuf,
    optimize: bool,
}

impl SolcCompiler {
    pub fn new(solc_path: impl Into<PathBuf>) -> Self {
        Self {
            solc_path: solc_path.into(),
            optimize: false,
        }
    }

    pub fn with_optimizer(mut self, enabled: bool) -> Self {
        self.optimize = enabled;
        self
    }

    fn standard_json_input(&self, source: &str) -> Value {
        json!({
            "language": "Solidity",
            "sources": { SOURCE_UNIT: { "content": source } },
            "settings": {
                "optimizer": { "enabled": self.optimize, "runs": 200 },
                "outputSelection": {
                    "*": {
                        "*": ["abi", "evm.bytecode.object", "evm.bytecode.sourceMap", "metadata"]
                    }
                }
            }
        })
    }
}

#[async_trait]
impl CompilerAdapter for SolcCompiler {
    async fn compile(
        &self,
        source: &str,
        contract_name: &str,
    ) -> Result<CompiledContract, CompilerError> {
        let input = serde_json::to_vec(&self.standard_json_input(source))
            .map_err(|e| CompilerError::InvalidOutput(e.to_string()))?;

        let mut child = tokio::process::Command::new(&self.solc_path)
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input).await?;
            // Dropping stdin closes the pipe so solc starts compiling.
        }
        let output = child.wait_with_output().await?;
        debug!(status = %output.status, bytes = output.stdout.len(), "solc finished");

        let parsed: Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            CompilerError::InvalidOutput(format!(
                "{e}; stderr: {}",
                String::from_utf8_lossy(&output.stderr)
            ))
        })?;
        parse_standard_json_output(&parsed, contract_name)
    }
}

/// Extract one contract from `solc --standard-json` output.
///
/// Every diagnostic with `severity == "error"` is collected; warnings are ignored.
pub fn parse_standard_json_output(
    output: &Value,
    contract_name: &str,
) -> Result<CompiledContract, CompilerError> {
    let errors: Vec<String> = output
        .get("errors")
        .and_then(Value::as_array)
        .map(|diagnostics| {
            diagnostics
                .iter()
                .filter(|d| d.get("severity").and_then(Value::as_str) == Some("error"))
                .map(|d| {
                    d.get("formattedMessage")
                        .or_else(|| d.get("message"))
                        .and_then(Value::as_str)
                        .unwrap_or("unknown compiler error")
                        .trim()
                        .to_string()
                })
                .collect()
        })
        .unwrap_or_default();
    if !errors.is_empty() {
        return Err(CompilerError::Compilation(errors));
    }

    let contract = output
        .get("contracts")
        .and_then(Value::as_object)
        .and_then(|units| units.values().find_map(|unit| unit.get(contract_name)))
        .ok_or_else(|| CompilerError::ContractNotFound(contract_name.to_string()))?;

    let bytecode_hex = contract
        .pointer("/evm/bytecode/object")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if bytecode_hex.is_empty() {
        // Interfaces and abstract contracts compile to nothing.
        return Err(CompilerError::InvalidOutput(format!(
            "{contract_name} has no deployable bytecode"
        )));
    }
    let bytecode = hex::decode(bytecode_hex.trim_start_matches("0x"))
        .map_err(|e| CompilerError::InvalidOutput(format!("bytecode: {e}")))?;

    Ok(CompiledContract {
        contract_name: contract_name.to_string(),
        bytecode,
        abi: contract.get("abi").cloned().unwrap_or_else(|| json!([])),
        metadata: contract
            .get("metadata")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        source_map: contract
            .pointer("/evm/bytecode/sourceMap")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}
