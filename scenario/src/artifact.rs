//! Compiled contract artifacts in Hardhat's JSON layout

use crate::error::{ScenarioError, ScenarioResult};
use compound_fork_client::Bytes;
use ethers::abi::Abi;
use serde::Deserialize;
use std::path::Path;

/// A compiled contract: ABI, creation code and runtime code
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    pub abi: Abi,
    /// Creation bytecode (constructor + runtime)
    pub bytecode: Bytes,
    /// Runtime bytecode, what `setCode` injects
    pub deployed_bytecode: Bytes,
}

impl ContractArtifact {
    /// Load an artifact from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> ScenarioResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Parse an artifact from a JSON string
    pub fn from_json(json: &str) -> ScenarioResult<Self> {
        let artifact: ContractArtifact = serde_json::from_str(json)?;
        if artifact.deployed_bytecode.is_empty() {
            return Err(ScenarioError::Config(format!(
                "Artifact {} has no runtime bytecode (abstract contract or interface?)",
                artifact.contract_name
            )));
        }
        Ok(artifact)
    }

    /// Creation transaction payload: bytecode followed by encoded constructor args
    pub fn deployment_data(&self, constructor_args: &[u8]) -> Bytes {
        let mut data = self.bytecode.to_vec();
        data.extend_from_slice(constructor_args);
        data.into()
    }
}
