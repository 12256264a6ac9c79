use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tokio::process::Command as Process;

use leth::{
    compiler::{self, Compiler, RustBindings, Solc},
    config::DEFAULT_NETWORK,
    migrations,
    target::EthersConnector,
    Pipeline, Project,
};

#[derive(Debug, Parser)]
#[clap(name = "leth", version, about = "Compile, bind and deploy Solidity contracts")]
pub struct CommandLine {
    /// Project root.
    #[clap(long, global = true, default_value = ".")]
    project: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scaffold a new project in an empty directory.
    Init,
    /// Generate Rust bindings for every ABI in build/ into bindings/.
    Bind,
    /// Compile contracts/ into build/.
    Compile {
        /// Also generate bindings.
        #[clap(long, default_value_t = true, action = ArgAction::Set)]
        bind: bool,
    },
    /// Run the migrations listed in config.json.
    Migrate {
        #[clap(flatten)]
        keystore: KeystoreArgs,
    },
    /// Deploy every compiled contract and save the addresses in deployed/.
    Deploy {
        /// Network from config.json.
        #[clap(short, long, default_value = DEFAULT_NETWORK)]
        network: String,

        #[clap(flatten)]
        keystore: KeystoreArgs,
    },
    /// Run the project's tests with cargo.
    Test {
        /// Only run tests whose name contains this filter.
        #[clap(long)]
        test: Option<String>,
    },
}

#[derive(Debug, Args)]
struct KeystoreArgs {
    /// Password of the keystore account used on managed networks.
    #[clap(long, env = "LETH_KEYSTORE_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl CommandLine {
    pub async fn execute(self) -> Result<()> {
        let project = Project::new(self.project);
        match self.command {
            Command::Init => {
                project
                    .init()
                    .with_context(|| format!("cannot init {}", project.root().display()))?;
                log::info!("initialized project in {}", project.root().display());
            }
            Command::Bind => bind(&project)?,
            Command::Compile { bind: with_bindings } => {
                Solc::default()
                    .compile(&project.contracts_dir(), &project.build_dir())
                    .await
                    .context("compilation error")?;
                log::info!("compilation completed. saving binaries in build/ directory.");
                if with_bindings {
                    bind(&project)?;
                }
            }
            Command::Migrate { keystore } => {
                let config = project.load_config()?;
                let solc = Solc::default();
                let pipeline = Pipeline::new(&project, &config, &EthersConnector, &solc)
                    .with_password(keystore.password);
                let summary = migrations::migrate(&pipeline, &config.migrations).await;
                for (migration, address) in &summary.applied {
                    log::info!(
                        "migrated {} to {} at {:?}",
                        migration.contract,
                        migration.network,
                        address
                    );
                }
                log::info!(
                    "{} migration(s) applied, {} failed",
                    summary.applied.len(),
                    summary.failed.len()
                );
            }
            Command::Deploy { network, keystore } => {
                let config = project.load_config()?;
                let solc = Solc::default();
                let report = Pipeline::new(&project, &config, &EthersConnector, &solc)
                    .with_password(keystore.password)
                    .deploy_all(Some(network.as_str()))
                    .await
                    .with_context(|| format!("could not deploy contracts to {network}"))?;
                if let Some(path) = report.record_path {
                    log::info!(
                        "deployed {} contract(s) to {}. saved in {}",
                        report.record.len(),
                        report.network,
                        path.display()
                    );
                }
            }
            Command::Test { test } => run_tests(&project, test.as_deref()).await?,
        }
        Ok(())
    }
}

fn bind(project: &Project) -> Result<()> {
    compiler::generate_bindings(&RustBindings, &project.build_dir(), &project.bindings_dir())
        .context("could not create bindings")?;
    log::info!("generation of bindings completed. saving bindings in bindings/ directory.");
    Ok(())
}

async fn run_tests(project: &Project, filter: Option<&str>) -> Result<()> {
    let mut cmd = Process::new("cargo");
    cmd.arg("test").current_dir(project.root());
    if let Some(filter) = filter {
        cmd.arg(filter);
    }
    let output = cmd.output().await.context("cannot run cargo test")?;
    log::info!(
        "executing tests in {}...\n{}{}",
        project.root().display(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    if !output.status.success() {
        bail!("tests failed with {}", output.status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_defaults_to_default_network() {
        let cmd = CommandLine::parse_from(["leth", "deploy"]);
        match cmd.command {
            Command::Deploy { network, .. } => assert_eq!(network, "default"),
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cmd.project, PathBuf::from("."));
    }

    #[test]
    fn compile_bind_flag_takes_a_value() {
        let cmd = CommandLine::parse_from(["leth", "compile", "--bind=false"]);
        assert!(matches!(cmd.command, Command::Compile { bind: false }));
        let cmd = CommandLine::parse_from(["leth", "compile"]);
        assert!(matches!(cmd.command, Command::Compile { bind: true }));
    }

    #[test]
    fn network_and_project_are_parsed() {
        let cmd = CommandLine::parse_from(["leth", "deploy", "--network", "testnet", "--project", "/tmp/app"]);
        assert!(matches!(cmd.command, Command::Deploy { ref network, .. } if network == "testnet"));
        assert_eq!(cmd.project, PathBuf::from("/tmp/app"));
    }
}
