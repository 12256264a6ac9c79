//! Account discovery and signer selection.
//!
//! Development nodes report their own unlocked accounts and sign transactions
//! themselves. Managed networks sign locally with a key from the project keystore.

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use ethers::{signers::LocalWallet, types::Address};
use serde::Deserialize;

use crate::{
    config::{Network, NetworkKind},
    error::{Error, Result},
    target::DeploymentTarget,
};

/// A key file in a keystore directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeystoreAccount {
    pub address: Address,
    pub path: PathBuf,
}

#[derive(Deserialize)]
struct KeyFile {
    address: String,
}

/// Directory of encrypted JSON key files.
#[derive(Debug, Clone)]
pub struct Keystore {
    dir: PathBuf,
}

impl Keystore {
    pub fn open(dir: &Path) -> Result<Self> {
        if dir.as_os_str().is_empty() || !dir.is_dir() {
            return Err(Error::Keystore(format!(
                "keystore directory `{}` does not exist",
                dir.display()
            )));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Accounts ordered by key file name.
    ///
    /// Only geth-style key files, which carry a plain `address` field, are listed.
    /// Anything else, including keys written without that field, is skipped with a
    /// warning.
    pub fn accounts(&self) -> Result<Vec<KeystoreAccount>> {
        let mut paths = fs::read_dir(&self.dir)
            .map_err(|e| Error::io(&self.dir, e))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file())
            .collect::<Vec<_>>();
        paths.sort();

        let mut accounts = Vec::with_capacity(paths.len());
        for path in paths {
            let raw = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
            let Ok(key) = serde_json::from_str::<KeyFile>(&raw) else {
                log::warn!(
                    "skipping {}: no `address` field (only geth-style key files are supported)",
                    path.display()
                );
                continue;
            };
            match parse_address(&key.address) {
                Ok(address) => accounts.push(KeystoreAccount { address, path }),
                Err(_) => log::warn!("skipping {}: invalid address", path.display()),
            }
        }
        Ok(accounts)
    }

    /// Decrypts the key file of `account`.
    pub fn unlock(&self, account: &KeystoreAccount, password: &str) -> Result<LocalWallet> {
        LocalWallet::decrypt_keystore(&account.path, password).map_err(|e| {
            Error::Keystore(format!("cannot unlock {:?}: {}", account.address, e))
        })
    }
}

pub fn parse_address(raw: &str) -> Result<Address> {
    let trimmed = raw.trim();
    let hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    Address::from_str(hex).map_err(|_| Error::InvalidAddress(raw.to_string()))
}

/// Accounts available for a run. The two sources are never merged.
#[derive(Debug, Clone)]
pub enum AccountSet {
    Node(Vec<Address>),
    Keystore {
        keystore: Keystore,
        accounts: Vec<KeystoreAccount>,
    },
}

impl AccountSet {
    pub fn addresses(&self) -> Vec<Address> {
        match self {
            AccountSet::Node(addresses) => addresses.clone(),
            AccountSet::Keystore { accounts, .. } => accounts.iter().map(|a| a.address).collect(),
        }
    }

    pub fn log(&self) {
        for (i, address) in self.addresses().iter().enumerate() {
            log::info!("account {}: {:?}", i, address);
        }
    }
}

/// Queries the node or opens the keystore, depending on the network kind.
pub async fn provision<T: DeploymentTarget + ?Sized>(
    network: &Network,
    target: &T,
) -> Result<AccountSet> {
    match network.kind() {
        NetworkKind::Development => Ok(AccountSet::Node(target.accounts().await?)),
        NetworkKind::Managed => {
            let keystore = Keystore::open(&network.keystore)?;
            let accounts = keystore.accounts()?;
            Ok(AccountSet::Keystore { keystore, accounts })
        }
    }
}

/// Who signs the deployment transactions.
#[derive(Debug, Clone)]
pub enum SigningSource {
    /// The node signs on behalf of this unlocked account.
    Node(Address),
    Wallet(LocalWallet),
}

impl SigningSource {
    pub fn address(&self) -> Address {
        match self {
            SigningSource::Node(address) => *address,
            SigningSource::Wallet(wallet) => ethers::signers::Signer::address(wallet),
        }
    }
}

/// Picks the sender and signer for `network`.
///
/// Returns the network with its sender filled in for development nodes.
pub fn signing_source(
    network: &Network,
    accounts: &AccountSet,
    password: Option<&str>,
) -> Result<(Network, SigningSource)> {
    match accounts {
        AccountSet::Node(addresses) => {
            let network = match addresses.first() {
                Some(first) => network.with_default_sender(&format!("{first:?}")),
                None => network.clone(),
            };
            if network.from.trim().is_empty() {
                return Err(Error::NotFound(format!(
                    "no sender for network `{}`: node reported no accounts",
                    network.name
                )));
            }
            let from = parse_address(&network.from)?;
            Ok((network, SigningSource::Node(from)))
        }
        AccountSet::Keystore { keystore, accounts } => {
            let account = if network.from.trim().is_empty() {
                accounts.first()
            } else {
                let from = parse_address(&network.from)?;
                accounts.iter().find(|account| account.address == from)
            }
            .ok_or_else(|| {
                Error::Keystore(format!(
                    "no keystore account for sender `{}` in {}",
                    network.from,
                    network.keystore.display()
                ))
            })?;
            let password = password.ok_or_else(|| {
                Error::Keystore("a keystore password is required for managed networks".into())
            })?;
            let wallet = keystore.unlock(account, password)?;
            Ok((network.clone(), SigningSource::Wallet(wallet)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR_A: &str = "0x1111111111111111111111111111111111111111";
    const ADDR_B: &str = "0x2222222222222222222222222222222222222222";

    fn network(from: &str, keystore: &Path) -> Network {
        Network {
            name: "testnet".into(),
            url: "http://localhost:8546".into(),
            from: from.into(),
            keystore: keystore.to_path_buf(),
            kind: None,
        }
    }

    fn write_key(dir: &Path, file: &str, address: &str) {
        let body = format!(r#"{{"address":"{}","crypto":{{}},"version":3}}"#, address);
        fs::write(dir.join(file), body).unwrap();
    }

    #[test]
    fn keystore_accounts_are_ordered_by_file_name() {
        let dir = tempfile::tempdir().unwrap();
        write_key(dir.path(), "UTC--2024-02--b", &ADDR_B[2..]);
        write_key(dir.path(), "UTC--2024-01--a", &ADDR_A[2..]);
        fs::write(dir.path().join("README"), "not a key").unwrap();

        let accounts = Keystore::open(dir.path()).unwrap().accounts().unwrap();
        let addresses: Vec<_> = accounts.iter().map(|a| a.address).collect();
        assert_eq!(
            addresses,
            vec![parse_address(ADDR_A).unwrap(), parse_address(ADDR_B).unwrap()]
        );
    }

    #[test]
    fn key_files_without_address_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_key(dir.path(), "geth-key", &ADDR_A[2..]);
        fs::write(
            dir.path().join("0f4a1b2c-ethers-key"),
            r#"{"id":"0f4a1b2c-0000-4000-8000-000000000000","crypto":{},"version":3}"#,
        )
        .unwrap();

        let accounts = Keystore::open(dir.path()).unwrap().accounts().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].path, dir.path().join("geth-key"));
    }

    #[test]
    fn missing_keystore_is_a_keystore_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Keystore::open(&dir.path().join("nope")),
            Err(Error::Keystore(_))
        ));
        assert!(matches!(Keystore::open(Path::new("")), Err(Error::Keystore(_))));
    }

    #[test]
    fn node_accounts_backfill_the_sender() {
        let accounts = AccountSet::Node(vec![
            parse_address(ADDR_A).unwrap(),
            parse_address(ADDR_B).unwrap(),
        ]);
        let original = network("", Path::new(""));
        let (resolved, signer) = signing_source(&original, &accounts, None).unwrap();
        assert_eq!(resolved.from, ADDR_A);
        assert!(original.from.is_empty());
        assert_eq!(signer.address(), parse_address(ADDR_A).unwrap());
    }

    #[test]
    fn configured_sender_wins_over_node_accounts() {
        let accounts = AccountSet::Node(vec![parse_address(ADDR_A).unwrap()]);
        let (resolved, signer) =
            signing_source(&network(ADDR_B, Path::new("")), &accounts, None).unwrap();
        assert_eq!(resolved.from, ADDR_B);
        assert_eq!(signer.address(), parse_address(ADDR_B).unwrap());
    }

    #[test]
    fn no_node_accounts_and_no_sender_fails() {
        let accounts = AccountSet::Node(Vec::new());
        assert!(matches!(
            signing_source(&network("", Path::new("")), &accounts, None),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn managed_network_requires_password_and_known_sender() {
        let dir = tempfile::tempdir().unwrap();
        write_key(dir.path(), "UTC--a", &ADDR_A[2..]);
        let keystore = Keystore::open(dir.path()).unwrap();
        let accounts = AccountSet::Keystore {
            accounts: keystore.accounts().unwrap(),
            keystore,
        };

        assert!(matches!(
            signing_source(&network("", dir.path()), &accounts, None),
            Err(Error::Keystore(_))
        ));
        assert!(matches!(
            signing_source(&network(ADDR_B, dir.path()), &accounts, Some("pw")),
            Err(Error::Keystore(_))
        ));
        // The fixture has no valid crypto section, so decryption fails.
        assert!(matches!(
            signing_source(&network(ADDR_A, dir.path()), &accounts, Some("pw")),
            Err(Error::Keystore(_))
        ));
    }
}
