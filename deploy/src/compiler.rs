//! External tooling: the Solidity compiler and the binding generator.

use std::{
    fs,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use ethers::contract::Abigen;
use tokio::process::Command;

use crate::{
    artifacts::{self, ABI_EXT, BYTECODE_EXT},
    error::{Error, Result},
};

/// Turns contract sources into `.bin`/`.abi` artifacts.
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Compiles everything under `sources` into `build` and returns the bytecode artifacts.
    async fn compile(&self, sources: &Path, build: &Path) -> Result<Vec<PathBuf>>;
}

/// Generates client code for a compiled contract.
pub trait BindingGenerator {
    /// Writes the binding for `abi` into `out_dir` and returns the file written.
    fn generate(&self, abi: &Path, out_dir: &Path) -> Result<PathBuf>;
}

/// Runs the `solc` binary found on `PATH` (or at `bin`).
#[derive(Debug, Clone)]
pub struct Solc {
    pub bin: PathBuf,
}

impl Default for Solc {
    fn default() -> Self {
        Self {
            bin: PathBuf::from("solc"),
        }
    }
}

#[async_trait]
impl Compiler for Solc {
    async fn compile(&self, sources: &Path, build: &Path) -> Result<Vec<PathBuf>> {
        let files = artifacts::scan_for_kind(sources, "sol")?;
        if files.is_empty() {
            return Err(Error::Compile(format!(
                "no .sol sources under {}",
                sources.display()
            )));
        }
        fs::create_dir_all(build).map_err(|e| Error::io(build, e))?;

        let output = Command::new(&self.bin)
            .arg("--bin")
            .arg("--abi")
            .arg("--overwrite")
            .arg("-o")
            .arg(build)
            .args(&files)
            .output()
            .await
            .map_err(|e| Error::Compile(format!("cannot run {}: {}", self.bin.display(), e)))?;

        if !output.status.success() {
            return Err(Error::Compile(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            log::debug!("{}", stdout.trim());
        }

        artifacts::scan_for_kind(build, BYTECODE_EXT)
    }
}

/// Rust bindings through `ethers` Abigen.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustBindings;

impl BindingGenerator for RustBindings {
    fn generate(&self, abi: &Path, out_dir: &Path) -> Result<PathBuf> {
        let name = artifacts::contract_name(&abi.to_string_lossy());
        let source = fs::read_to_string(abi).map_err(|e| Error::io(abi, e))?;

        let output = out_dir.join(format!("{}.rs", module_name(&name)));
        let bindings = Abigen::new(&name, source)
            .and_then(|abigen| abigen.generate())
            .map_err(|e| Error::Compile(format!("binding for {name}: {e}")))?;
        bindings
            .write_to_file(&output)
            .map_err(|e| Error::io(&output, e))?;
        Ok(output)
    }
}

/// `CDKValidium` -> `cdk_validium`, `ERC20Token` -> `erc20_token`.
pub fn module_name(contract: &str) -> String {
    let chars: Vec<char> = contract.chars().collect();
    let mut out = String::with_capacity(contract.len() + 4);
    for (i, c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Recreates `out_dir` and writes one binding per ABI under `build`, plus a `mod.rs`.
///
/// Stops at the first contract that fails.
pub fn generate_bindings<G: BindingGenerator + ?Sized>(
    generator: &G,
    build: &Path,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let abis = artifacts::scan_for_kind(build, ABI_EXT)?;

    if out_dir.exists() {
        fs::remove_dir_all(out_dir).map_err(|e| Error::io(out_dir, e))?;
    }
    fs::create_dir_all(out_dir).map_err(|e| Error::io(out_dir, e))?;

    let mut written = Vec::with_capacity(abis.len());
    for abi in &abis {
        log::info!(
            "generating binding for {}",
            abi.file_name().unwrap_or_default().to_string_lossy()
        );
        let path = generator.generate(abi, out_dir).map_err(|e| {
            log::error!("could not generate binding for {}: {}", abi.display(), e);
            e
        })?;
        written.push(path);
    }

    let modules = written
        .iter()
        .filter_map(|path| path.file_stem())
        .map(|stem| format!("pub mod {};\n", stem.to_string_lossy()))
        .collect::<String>();
    let mod_rs = out_dir.join("mod.rs");
    fs::write(&mod_rs, modules).map_err(|e| Error::io(&mod_rs, e))?;

    Ok(written)
}
