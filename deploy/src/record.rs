use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Deployed address per contract for one network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentRecord {
    contracts: BTreeMap<String, Address>,
}

impl DeploymentRecord {
    pub fn insert(&mut self, contract: impl Into<String>, address: Address) {
        self.contracts.insert(contract.into(), address);
    }

    pub fn get(&self, contract: &str) -> Option<Address> {
        self.contracts.get(contract).copied()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    pub fn path(dir: &Path, network: &str) -> PathBuf {
        dir.join(format!("{network}.json"))
    }

    /// Replaces any previous record for `network`.
    pub fn save(&self, dir: &Path, network: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        let path = Self::path(dir, network);
        let json = serde_json::to_string_pretty(self).map_err(|e| Error::Record {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        fs::write(&path, json).map_err(|e| Error::io(&path, e))?;
        Ok(path)
    }

    pub fn load(dir: &Path, network: &str) -> Result<Self> {
        let path = Self::path(dir, network);
        let raw = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        serde_json::from_str(&raw).map_err(|e| Error::Record {
            path,
            reason: e.to_string(),
        })
    }
}

impl FromIterator<(String, Address)> for DeploymentRecord {
    fn from_iter<I: IntoIterator<Item = (String, Address)>>(iter: I) -> Self {
        Self {
            contracts: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_overwrites_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let first: DeploymentRecord = [
            ("Token".to_string(), Address::repeat_byte(0xaa)),
            ("Lib".to_string(), Address::repeat_byte(0xbb)),
        ]
        .into_iter()
        .collect();
        first.save(dir.path(), "testnet").unwrap();
        assert_eq!(DeploymentRecord::load(dir.path(), "testnet").unwrap(), first);

        let second: DeploymentRecord = [("Other".to_string(), Address::repeat_byte(0xcc))]
            .into_iter()
            .collect();
        second.save(dir.path(), "testnet").unwrap();
        let loaded = DeploymentRecord::load(dir.path(), "testnet").unwrap();
        assert_eq!(loaded, second);
        assert_eq!(loaded.get("Token"), None);
    }

    #[test]
    fn stored_as_name_to_hex_address() {
        let dir = tempfile::tempdir().unwrap();
        let mut record = DeploymentRecord::default();
        record.insert("Token", Address::repeat_byte(0xaa));
        let path = record.save(dir.path(), "default").unwrap();

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({ "Token": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa" })
        );
    }

    #[test]
    fn corrupt_record_is_reported_as_such() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("testnet.json"), r#"{"Token": "not-an-address"}"#).unwrap();

        let err = DeploymentRecord::load(dir.path(), "testnet").unwrap_err();
        assert!(matches!(err, Error::Record { ref path, .. } if *path == dir.path().join("testnet.json")));

        let err = DeploymentRecord::load(dir.path(), "missing").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
