//! Deployment driver.
//!
//! A run moves through [`Stage`]s in order. With [`FailurePolicy::AbortOnError`]
//! any failure ends the run before the record is written; contracts already
//! created on chain stay there. [`FailurePolicy::ContinueOnError`] logs failing
//! contracts, keeps going and records the ones that succeeded.

use std::path::{Path, PathBuf};

use ethers::types::Address;

use crate::{
    accounts::{self, SigningSource},
    artifacts::{self, CompiledContract, BYTECODE_EXT},
    compiler::Compiler,
    config::{Config, Network, DEFAULT_NETWORK},
    error::{Error, Result},
    project::Project,
    record::DeploymentRecord,
    target::{Connector, DeploymentTarget},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// First failure aborts the run, nothing is recorded.
    AbortOnError,
    /// Failures are collected, successes are recorded.
    ContinueOnError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    ArtifactsResolved,
    NetworkResolved,
    ClientDialed,
    AccountsResolved,
    Deploying,
    Recorded,
}

#[derive(Debug)]
pub struct DeploymentReport {
    pub network: String,
    pub sender: String,
    pub record: DeploymentRecord,
    pub failures: Vec<(String, Error)>,
    /// Where the record was written, if it was.
    pub record_path: Option<PathBuf>,
}

pub struct Pipeline<'a, C, K: ?Sized> {
    project: &'a Project,
    config: &'a Config,
    connector: &'a C,
    compiler: &'a K,
    password: Option<String>,
}

impl<'a, C, K> Pipeline<'a, C, K>
where
    C: Connector,
    K: Compiler + ?Sized,
{
    pub fn new(project: &'a Project, config: &'a Config, connector: &'a C, compiler: &'a K) -> Self {
        Self {
            project,
            config,
            connector,
            compiler,
            password: None,
        }
    }

    /// Password used to unlock keystore accounts on managed networks.
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    pub fn project(&self) -> &Project {
        self.project
    }

    /// Bytecode artifacts in the build directory, compiling once if there are none.
    pub async fn ensure_artifacts(&self) -> Result<Vec<PathBuf>> {
        let build = self.project.build_dir();
        let found = if build.is_dir() {
            artifacts::scan_for_kind(&build, BYTECODE_EXT)?
        } else {
            Vec::new()
        };
        if !found.is_empty() {
            return Ok(found);
        }

        log::info!("no artifacts in {}. compiling contracts...", build.display());
        self.compiler
            .compile(&self.project.contracts_dir(), &build)
            .await?;

        let found = artifacts::scan_for_kind(&build, BYTECODE_EXT)?;
        if found.is_empty() {
            return Err(Error::NotFound(format!(
                "no contract artifacts in {} after compiling",
                build.display()
            )));
        }
        Ok(found)
    }

    /// Deploys every contract in the build directory, nested ones included; the
    /// first failure aborts.
    pub async fn deploy_all(&self, network: Option<&str>) -> Result<DeploymentReport> {
        let label = network.unwrap_or(DEFAULT_NETWORK);
        stage(label, Stage::Idle);
        let found = self.ensure_artifacts().await?;
        let names = artifacts::contract_names(&found);
        stage(label, Stage::ArtifactsResolved);
        self.deploy(network, &names, FailurePolicy::AbortOnError).await
    }

    /// Deploys `contracts` to `network` in order under `policy`. Each name is
    /// looked up among the artifacts under the build directory.
    pub async fn deploy(
        &self,
        network: Option<&str>,
        contracts: &[String],
        policy: FailurePolicy,
    ) -> Result<DeploymentReport> {
        let network = self.resolve(network)?;
        stage(&network.name, Stage::NetworkResolved);

        let build = self.project.build_dir();
        let built = artifacts::index(&artifacts::scan_for_kind(&build, BYTECODE_EXT)?)?;

        let target = self.connector.dial(&network.url).await?;
        stage(&network.name, Stage::ClientDialed);

        let found = accounts::provision(&network, &target).await?;
        found.log();
        let (network, signer) =
            accounts::signing_source(&network, &found, self.password.as_deref())?;
        stage(&network.name, Stage::AccountsResolved);
        let sender = format!("{:?}", signer.address());
        log::info!("deploying to {} from {}", network.name, sender);

        stage(&network.name, Stage::Deploying);
        let mut record = DeploymentRecord::default();
        let mut failures = Vec::new();
        for name in contracts {
            let deployed = match built.get(name) {
                Some(artifact) => deploy_one(&target, artifact, &signer).await,
                None => Err(Error::NotFound(format!(
                    "no artifact for contract `{name}` in {}",
                    build.display()
                ))),
            };
            match deployed {
                Ok(address) => {
                    log::info!("{} deployed at {:?}", name, address);
                    record.insert(name.clone(), address);
                }
                Err(err) => match policy {
                    FailurePolicy::AbortOnError => return Err(err),
                    FailurePolicy::ContinueOnError => {
                        log::error!("could not deploy {} to {}: {}", name, network.name, err);
                        failures.push((name.clone(), err));
                    }
                },
            }
        }

        let record_path = if record.is_empty() && !failures.is_empty() {
            None
        } else {
            let path = record.save(&self.project.deployed_dir(), &network.name)?;
            stage(&network.name, Stage::Recorded);
            Some(path)
        };

        Ok(DeploymentReport {
            network: network.name.clone(),
            sender,
            record,
            failures,
            record_path,
        })
    }

    fn resolve(&self, requested: Option<&str>) -> Result<Network> {
        let mut network = self.config.resolve_network(requested)?;
        network.keystore = self.project.resolve(&network.keystore);
        Ok(network)
    }
}

async fn deploy_one<T: DeploymentTarget + ?Sized>(
    target: &T,
    artifact: &Path,
    signer: &SigningSource,
) -> Result<Address> {
    let contract = CompiledContract::load(artifact)?;
    target.deploy(&contract, signer).await
}

fn stage(network: &str, stage: Stage) {
    log::debug!("[{}] {:?}", network, stage);
}
