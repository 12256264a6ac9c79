//! Discovery and loading of compiler output.
//!
//! `solc` writes one `<Name>.bin` (hex bytecode) and one `<Name>.abi` (JSON) per
//! contract into the build directory. The shared stem is the contract name.

use std::{
    collections::BTreeMap,
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};

use ethers::{abi::Abi, types::Bytes, utils::hex};
use walkdir::WalkDir;

use crate::error::{Error, Result};

pub const BYTECODE_EXT: &str = "bin";
pub const ABI_EXT: &str = "abi";

/// Lists every entry under `dir`, the root included, sorted by path.
pub fn scan(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| Error::io(dir, e.into()))?;
        entries.push(entry.into_path());
    }
    entries.sort();
    Ok(entries)
}

/// Files under `dir` whose extension is exactly `ext` (case-sensitive).
pub fn scan_for_kind(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let ext = OsStr::new(ext.trim_start_matches('.'));
    Ok(scan(dir)?
        .into_iter()
        .filter(|path| path.is_file() && path.extension() == Some(ext))
        .collect())
}

/// Base name of `path` with one extension stripped. Both `/` and `\` are
/// treated as separators, so the result does not depend on the host.
pub fn contract_name(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let base = normalized
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    match base.rfind('.') {
        Some(idx) => base[..idx].to_string(),
        None => base.to_string(),
    }
}

/// Stem used to name the bytecode file paired with an artifact.
pub fn bytecode_stem(path: &str) -> String {
    contract_name(path)
}

/// `<dir>/<stem>.bin` next to the given artifact.
pub fn bytecode_path(artifact: &Path) -> PathBuf {
    let stem = bytecode_stem(&artifact.to_string_lossy());
    artifact
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(format!("{stem}.{BYTECODE_EXT}"))
}

pub fn contract_names(artifacts: &[PathBuf]) -> Vec<String> {
    artifacts
        .iter()
        .map(|path| contract_name(&path.to_string_lossy()))
        .collect()
}

/// Maps contract names to the artifact each was found at.
///
/// Two artifacts with the same name in different directories are rejected.
pub fn index(artifacts: &[PathBuf]) -> Result<BTreeMap<String, PathBuf>> {
    let mut index = BTreeMap::new();
    for path in artifacts {
        let name = contract_name(&path.to_string_lossy());
        if let Some(first) = index.insert(name.clone(), path.clone()) {
            return Err(Error::Artifact {
                path: path.clone(),
                reason: format!("contract `{name}` is also built at {}", first.display()),
            });
        }
    }
    Ok(index)
}

/// Bytecode and interface of a single compiled contract.
#[derive(Debug, Clone)]
pub struct CompiledContract {
    pub name: String,
    pub bytecode: Bytes,
    pub abi: Abi,
}

impl CompiledContract {
    /// Loads the bytecode paired with `artifact` and, when present, the `.abi`
    /// next to it.
    pub fn load(artifact: &Path) -> Result<Self> {
        let bin_path = bytecode_path(artifact);
        let bytecode = read_bytecode(&bin_path)?;

        let abi_path = bin_path.with_extension(ABI_EXT);
        let abi = if abi_path.is_file() {
            let raw = fs::read_to_string(&abi_path).map_err(|e| Error::io(&abi_path, e))?;
            serde_json::from_str(&raw).map_err(|e| Error::Artifact {
                path: abi_path.clone(),
                reason: e.to_string(),
            })?
        } else {
            log::debug!("no abi next to {}, using an empty interface", bin_path.display());
            Abi::default()
        };

        Ok(Self {
            name: contract_name(&bin_path.to_string_lossy()),
            bytecode,
            abi,
        })
    }
}

fn read_bytecode(path: &Path) -> Result<Bytes> {
    let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let trimmed = raw.trim();
    let code = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed)).map_err(|e| {
        Error::Artifact {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;
    if code.is_empty() {
        return Err(Error::Artifact {
            path: path.to_path_buf(),
            reason: "empty bytecode".to_string(),
        });
    }
    Ok(code.into())
}
