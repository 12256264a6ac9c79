//! Client side of a deployment: dialing a node and submitting contracts.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::{
    contract::ContractFactory,
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::Signer,
    types::Address,
};

use crate::{
    accounts::SigningSource,
    artifacts::CompiledContract,
    error::{Error, Result},
};

/// Opens a client handle for a network URL.
#[async_trait]
pub trait Connector: Send + Sync {
    type Target: DeploymentTarget;

    async fn dial(&self, url: &str) -> Result<Self::Target>;
}

/// A dialed node.
#[async_trait]
pub trait DeploymentTarget: Send + Sync {
    /// Unlocked accounts reported by the node, in node order.
    async fn accounts(&self) -> Result<Vec<Address>>;

    /// Creates `contract` on chain and returns its address.
    async fn deploy(&self, contract: &CompiledContract, signer: &SigningSource) -> Result<Address>;
}

/// JSON-RPC over HTTP through `ethers`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EthersConnector;

#[async_trait]
impl Connector for EthersConnector {
    type Target = EthersTarget;

    async fn dial(&self, url: &str) -> Result<EthersTarget> {
        if url.trim().is_empty() {
            return Err(Error::connection(url, "empty url"));
        }
        let provider = Provider::<Http>::try_from(url).map_err(|e| Error::connection(url, e))?;
        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| Error::connection(url, e))?
            .as_u64();
        log::debug!("dialed {} (chain id {})", url, chain_id);

        Ok(EthersTarget {
            url: url.to_string(),
            provider,
            chain_id,
        })
    }
}

#[derive(Debug, Clone)]
pub struct EthersTarget {
    url: String,
    provider: Provider<Http>,
    chain_id: u64,
}

#[async_trait]
impl DeploymentTarget for EthersTarget {
    async fn accounts(&self) -> Result<Vec<Address>> {
        self.provider
            .get_accounts()
            .await
            .map_err(|e| Error::connection(&self.url, e))
    }

    async fn deploy(&self, contract: &CompiledContract, signer: &SigningSource) -> Result<Address> {
        match signer {
            SigningSource::Node(from) => {
                send_deployment(Arc::new(self.provider.clone()), contract, Some(*from)).await
            }
            SigningSource::Wallet(wallet) => {
                let client = Arc::new(SignerMiddleware::new(
                    self.provider.clone(),
                    wallet.clone().with_chain_id(self.chain_id),
                ));
                send_deployment(client, contract, None).await
            }
        }
    }
}

/// Sends the creation transaction and waits for its receipt.
async fn send_deployment<M: Middleware + 'static>(
    client: Arc<M>,
    contract: &CompiledContract,
    from: Option<Address>,
) -> Result<Address> {
    let factory = ContractFactory::new(contract.abi.clone(), contract.bytecode.clone(), client);
    let mut deployer = factory
        .deploy(())
        .map_err(|e| Error::deployment(&contract.name, e))?
        .legacy();
    if let Some(from) = from {
        deployer.tx.set_from(from);
    }

    let (instance, receipt) = deployer
        .send_with_receipt()
        .await
        .map_err(|e| Error::deployment(&contract.name, e))?;
    log::info!(
        "{} transaction hash:{:?}",
        contract.name,
        receipt.transaction_hash
    );
    Ok(instance.address())
}
