//! Hardhat and Foundry build artifacts for the lottery contract.

use alloy::primitives::Bytes;
use anyhow::{
    Context,
    Result,
    bail,
};
use serde::Deserialize;
use serde_json::Value;
use std::{
    fs,
    path::Path,
};

/// Hardhat writes to `artifacts/`, `forge build` to `out/`.
pub const ARTIFACT_CANDIDATES: [&str; 2] = [
    "./artifacts/contracts/RefBoom.sol/RefBoom.json",
    "./out/RefBoom.sol/RefBoom.json",
];

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(String),
    Object { object: String },
}

#[derive(Debug, Deserialize)]
struct RawArtifact {
    abi: Value,
    bytecode: RawBytecode,
}

#[derive(Clone, Debug)]
pub struct Artifact {
    pub abi: Value,
    /// Creation code, always `0x`-prefixed.
    pub bytecode: String,
}

impl Artifact {
    pub fn parse(raw: &str) -> Result<Self> {
        let parsed: RawArtifact =
            serde_json::from_str(raw).context("artifact is not valid JSON with abi and bytecode")?;
        if !parsed.abi.is_array() {
            bail!("artifact abi must be a JSON array");
        }
        let hex_code = match parsed.bytecode {
            RawBytecode::Hex(code) => code,
            RawBytecode::Object { object } => object,
        };
        let trimmed = hex_code.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if digits.is_empty() {
            bail!("artifact bytecode is empty; is the contract abstract?");
        }
        hex::decode(digits).context("artifact bytecode is not valid hex")?;
        Ok(Self {
            abi: parsed.abi,
            bytecode: format!("0x{digits}"),
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading artifact {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing artifact {}", path.display()))
    }

    pub fn creation_code(&self) -> Result<Bytes> {
        let digits = self.bytecode.trim_start_matches("0x");
        Ok(hex::decode(digits).context("decoding bytecode")?.into())
    }
}

/// The explicit path, or the first build output that exists.
pub fn choose_artifact(explicit: Option<&str>) -> Result<String> {
    if let Some(path) = explicit {
        return Ok(shellexpand::tilde(path).into_owned());
    }
    ARTIFACT_CANDIDATES
        .iter()
        .find(|p| Path::new(p).exists())
        .map(|p| p.to_string())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Contract artifact not found. Tried {:?}; pass --artifact <path>",
                ARTIFACT_CANDIDATES
            )
        })
}
