//! Compiled-contract artifacts.
//!
//! The harness consumes the contract toolchain's JSON output as-is: one file
//! per contract with `contractName`, `abi` and `bytecode` fields. Compiling
//! is someone else's job; this module only reads the result and turns it
//! into deployable calldata.

use std::path::Path;

use alloy_core::dyn_abi::{DynSolValue, JsonAbiExt, Specifier};
use alloy_core::json_abi::{JsonAbi, Param};
use alloy_core::primitives::Bytes;
use serde::Deserialize;

use crate::error::{Error, Result};

/// One compiled contract, as emitted by the contract toolchain.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    /// The contract's name.
    pub contract_name: String,
    /// The contract's ABI, used for constructor/method encoding and for
    /// decoding emitted events.
    pub abi: JsonAbi,
    /// The deployable creation bytecode.
    pub bytecode: Bytes,
}

impl ContractArtifact {
    /// Load an artifact from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Artifact(format!("failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Artifact(format!("{}: {e}", path.display())))
    }

    /// Parse an artifact from a JSON string.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Artifact(e.to_string()))
    }

    /// The constructor's parameter list (empty if the contract has no
    /// explicit constructor).
    pub fn constructor_params(&self) -> &[Param] {
        self.abi
            .constructor
            .as_ref()
            .map(|c| c.inputs.as_slice())
            .unwrap_or(&[])
    }

    /// Build the deployment calldata: creation bytecode followed by the
    /// ABI-encoded constructor arguments.
    pub fn deploy_data(&self, ctor_args: &[DynSolValue]) -> Result<Bytes> {
        match &self.abi.constructor {
            None => {
                if !ctor_args.is_empty() {
                    return Err(Error::Plan(format!(
                        "contract '{}' has no constructor but {} argument(s) were supplied",
                        self.contract_name,
                        ctor_args.len()
                    )));
                }
                Ok(self.bytecode.clone())
            }
            Some(ctor) => {
                let encoded = ctor.abi_encode_input(ctor_args).map_err(|e| {
                    Error::Plan(format!(
                        "constructor arguments for '{}' do not match its ABI: {e}",
                        self.contract_name
                    ))
                })?;
                Ok(Bytes::from([self.bytecode.to_vec(), encoded].concat()))
            }
        }
    }
}

/// Coerce string arguments into ABI values, guided by the parameter types.
///
/// This is how plan files and the CLI pass arguments: plain strings
/// ("0xf39F...", "42", "hello"), interpreted against the declared types.
pub fn coerce_args(params: &[Param], raw: &[String]) -> Result<Vec<DynSolValue>> {
    if params.len() != raw.len() {
        return Err(Error::Plan(format!(
            "expected {} argument(s), got {}",
            params.len(),
            raw.len()
        )));
    }

    params
        .iter()
        .zip(raw)
        .map(|(param, value)| {
            let ty = param
                .resolve()
                .map_err(|e| Error::Plan(format!("unresolvable ABI type '{}': {e}", param.ty)))?;
            ty.coerce_str(value).map_err(|e| {
                Error::Plan(format!(
                    "argument '{value}' is not a valid '{}': {e}",
                    param.ty
                ))
            })
        })
        .collect()
}
