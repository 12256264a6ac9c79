//! `config.json` model and network resolution.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    migrations::Migration,
};

pub const DEFAULT_NETWORK: &str = "default";

/// Network names treated as local development nodes when no `kind` is configured.
const DEVELOPMENT_NETWORKS: [&str; 3] = ["testrpc", "ganache", "ganache-cli"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    /// Node with unlocked accounts that signs transactions itself.
    Development,
    /// Transactions are signed locally with a keystore account.
    Managed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    #[serde(default)]
    pub name: String,
    pub url: String,
    /// Default sender. Empty means "pick one from the discovered accounts".
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub keystore: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<NetworkKind>,
}

impl Network {
    pub fn kind(&self) -> NetworkKind {
        self.kind.unwrap_or_else(|| {
            if DEVELOPMENT_NETWORKS.contains(&self.name.as_str()) {
                NetworkKind::Development
            } else {
                NetworkKind::Managed
            }
        })
    }

    /// Returns a copy whose sender is `candidate` when none is configured.
    pub fn with_default_sender(&self, candidate: &str) -> Network {
        let mut network = self.clone();
        if network.from.trim().is_empty() {
            network.from = candidate.to_string();
        }
        network
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub networks: BTreeMap<String, Network>,
    #[serde(default)]
    pub migrations: Vec<Migration>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&raw).map_err(|reason| Error::Config {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, String> {
        let mut config: Config = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        for (key, network) in config.networks.iter_mut() {
            if network.name.is_empty() {
                network.name = key.clone();
            }
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        fs::write(path, json).map_err(|e| Error::io(path, e))
    }

    /// Looks a network up by key, falling back to an entry with a matching `name`.
    /// `None` and `"default"` select the entry keyed `"default"`.
    pub fn resolve_network(&self, requested: Option<&str>) -> Result<Network> {
        let requested = requested
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_NETWORK);

        self.networks
            .get(requested)
            .or_else(|| {
                if requested == DEFAULT_NETWORK {
                    return None;
                }
                self.networks.values().find(|n| n.name == requested)
            })
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("network `{requested}` is not configured")))
    }

    /// Configuration written by `leth init`.
    pub fn scaffold() -> Self {
        let mut networks = BTreeMap::new();
        networks.insert(
            DEFAULT_NETWORK.to_string(),
            Network {
                name: "ganache".to_string(),
                url: "http://localhost:8545".to_string(),
                from: String::new(),
                keystore: PathBuf::new(),
                kind: None,
            },
        );
        networks.insert(
            "testnet".to_string(),
            Network {
                name: "testnet".to_string(),
                url: "http://localhost:8546".to_string(),
                from: String::new(),
                keystore: PathBuf::from("./keystore"),
                kind: None,
            },
        );

        Self {
            networks,
            migrations: vec![Migration::new("testnet", "Example")],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "networks": {
            "default": { "name": "ganache", "url": "http://localhost:8545" },
            "testnet": { "url": "https://rpc.testnet.example", "from": "0x01", "keystore": "./keystore" },
            "local": { "url": "http://localhost:9545", "kind": "development" }
        },
        "migrations": [ { "network": "testnet", "contract": "Example" } ]
    }"#;

    #[test]
    fn names_default_to_keys() {
        let config = Config::from_json(CONFIG).unwrap();
        assert_eq!(config.networks["testnet"].name, "testnet");
        assert_eq!(config.networks["default"].name, "ganache");
        assert_eq!(config.migrations, vec![Migration::new("testnet", "Example")]);
    }

    #[test]
    fn default_resolves_like_its_actual_name() {
        let config = Config::from_json(CONFIG).unwrap();
        let by_sentinel = config.resolve_network(Some("default")).unwrap();
        let by_name = config.resolve_network(Some("ganache")).unwrap();
        let omitted = config.resolve_network(None).unwrap();
        assert_eq!(by_sentinel, by_name);
        assert_eq!(by_sentinel, omitted);
        assert_eq!(by_sentinel.url, "http://localhost:8545");
    }

    #[test]
    fn unknown_network_is_not_found() {
        let config = Config::from_json(CONFIG).unwrap();
        assert!(matches!(
            config.resolve_network(Some("mainnet")),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            Config::default().resolve_network(None),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn kind_prefers_explicit_setting() {
        let config = Config::from_json(CONFIG).unwrap();
        assert_eq!(config.networks["default"].kind(), NetworkKind::Development);
        assert_eq!(config.networks["testnet"].kind(), NetworkKind::Managed);
        assert_eq!(config.networks["local"].kind(), NetworkKind::Development);
    }

    #[test]
    fn sender_backfill_leaves_original_untouched() {
        let config = Config::from_json(CONFIG).unwrap();
        let network = config.resolve_network(None).unwrap();
        let filled = network.with_default_sender("0xabc");
        assert_eq!(filled.from, "0xabc");
        assert!(network.from.is_empty());

        let testnet = config.resolve_network(Some("testnet")).unwrap();
        assert_eq!(testnet.with_default_sender("0xabc").from, "0x01");
    }

    #[test]
    fn scaffold_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        Config::scaffold().save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), Config::scaffold());
    }

    #[test]
    fn malformed_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config { .. })));
    }
}
