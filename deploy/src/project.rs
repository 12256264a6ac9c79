use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    config::Config,
    error::{Error, Result},
};

pub const CONFIG_FILE: &str = "config.json";

/// Fixed directory layout of a leth project.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contracts_dir(&self) -> PathBuf {
        self.root.join("contracts")
    }

    pub fn build_dir(&self) -> PathBuf {
        self.root.join("build")
    }

    pub fn bindings_dir(&self) -> PathBuf {
        self.root.join("bindings")
    }

    pub fn deployed_dir(&self) -> PathBuf {
        self.root.join("deployed")
    }

    pub fn keystore_dir(&self) -> PathBuf {
        self.root.join("keystore")
    }

    pub fn test_dir(&self) -> PathBuf {
        self.root.join("test")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn load_config(&self) -> Result<Config> {
        Config::load(&self.config_path())
    }

    /// Paths in the config are relative to the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.as_os_str().is_empty() || path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Scaffolds an empty directory: source, keystore and test directories plus
    /// a default `config.json`.
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| Error::io(&self.root, e))?;
        let mut entries = fs::read_dir(&self.root).map_err(|e| Error::io(&self.root, e))?;
        if entries.next().is_some() {
            return Err(Error::Io {
                path: self.root.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "cannot init in non-empty directory",
                ),
            });
        }

        for dir in [self.contracts_dir(), self.keystore_dir(), self.test_dir()] {
            fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }
        Config::scaffold().save(&self.config_path())
    }
}
