pub mod balance;
pub mod minter;
pub mod transaction;
pub mod utils;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::abi::Abi;
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use serde::Serialize;
use tracing::info;

use crate::config::ChainConfig;
use crate::error::{ChainError, ConfigError, UnknownNetwork};
use crate::mint::dispatcher::Dispatcher;
use self::balance::BalanceReader;
use self::minter::BadgeMinter;
use self::transaction::{NonceAllocator, SigningIdentity, TransactionBuilder};

/// Networks a badge can be minted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Ethereum,
    BlockDag,
}

impl Network {
    pub const ALL: [Network; 2] = [Network::Ethereum, Network::BlockDag];

    pub fn name(&self) -> &'static str {
        match self {
            Network::Ethereum => "ethereum",
            Network::BlockDag => "blockdag",
        }
    }

    /// Prefix of this network's `*_RPC_URL` / `*_CHAIN_ID` / `*_CONTRACT_ADDRESS` variables.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Network::Ethereum => "SEPOLIA",
            Network::BlockDag => "BLOCKDAG",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Network::Ethereum => "Ethereum Sepolia",
            Network::BlockDag => "BlockDAG Primordial",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ethereum" | "sepolia" | "eth" => Ok(Network::Ethereum),
            "blockdag" | "bdag" | "primordial" => Ok(Network::BlockDag),
            other => Err(UnknownNetwork(other.to_owned())),
        }
    }
}

/// Static per-network settings, fixed after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub network: Network,
    pub chain_id: u64,
    pub rpc_url: String,
    pub contract_address: Address,
}

/// The JSON-RPC calls the minting subsystem makes against a network.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn chain_id(&self) -> Result<u64, ChainError>;

    /// Transaction count including the pending block.
    async fn pending_nonce(&self, account: Address) -> Result<U256, ChainError>;

    async fn gas_price(&self) -> Result<U256, ChainError>;

    async fn submit_raw_transaction(&self, raw: Bytes) -> Result<H256, ChainError>;

    async fn transaction_receipt(&self, tx_hash: H256)
        -> Result<Option<TransactionReceipt>, ChainError>;

    /// Read-only `eth_call` against the latest block.
    async fn call_contract(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError>;
}

#[async_trait]
impl ChainRpc for Provider<Http> {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        let id = self
            .get_chainid()
            .await
            .map_err(|e| ChainError::rpc("eth_chainId", e))?;
        Ok(id.as_u64())
    }

    async fn pending_nonce(&self, account: Address) -> Result<U256, ChainError> {
        self.get_transaction_count(account, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| ChainError::rpc("eth_getTransactionCount", e))
    }

    async fn gas_price(&self) -> Result<U256, ChainError> {
        self.get_gas_price()
            .await
            .map_err(|e| ChainError::rpc("eth_gasPrice", e))
    }

    async fn submit_raw_transaction(&self, raw: Bytes) -> Result<H256, ChainError> {
        let pending = Middleware::send_raw_transaction(self, raw)
            .await
            .map_err(|e| ChainError::rpc("eth_sendRawTransaction", e))?;
        Ok(pending.tx_hash())
    }

    async fn transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        self.get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| ChainError::rpc("eth_getTransactionReceipt", e))
    }

    async fn call_contract(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        Middleware::call(self, &tx, None)
            .await
            .map_err(|e| ChainError::rpc("eth_call", e))
    }
}

/// Connection handle, contract address and ABI for one network.
pub struct ChainConnector {
    config: NetworkConfig,
    rpc: Arc<dyn ChainRpc>,
    abi: Arc<Abi>,
}

impl ChainConnector {
    pub fn connect(config: NetworkConfig, abi: Arc<Abi>) -> Result<Self, ConfigError> {
        let provider =
            Provider::<Http>::try_from(config.rpc_url.as_str()).map_err(|e| ConfigError::Endpoint {
                network: config.network,
                reason: e.to_string(),
            })?;
        Ok(Self::with_rpc(config, Arc::new(provider), abi))
    }

    pub fn with_rpc(config: NetworkConfig, rpc: Arc<dyn ChainRpc>, abi: Arc<Abi>) -> Self {
        Self { config, rpc, abi }
    }

    pub fn network(&self) -> Network {
        self.config.network
    }

    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    pub fn contract_address(&self) -> Address {
        self.config.contract_address
    }

    pub fn rpc(&self) -> &dyn ChainRpc {
        self.rpc.as_ref()
    }

    pub fn abi(&self) -> &Abi {
        &self.abi
    }
}

/// Everything the live minting path needs, built once at startup.
pub struct ChainService {
    pub dispatcher: Arc<Dispatcher>,
    pub balances: Arc<BalanceReader>,
    pub sender: Address,
}

impl ChainService {
    pub fn initialize(config: &ChainConfig) -> Result<Self, ConfigError> {
        info!("Initializing blockchain service...");
        let identity = Arc::new(SigningIdentity::from_hex(config.private_key())?);
        let abi = Arc::new(utils::parse_badge_abi()?);
        let connectors = config
            .networks
            .iter()
            .map(|network| ChainConnector::connect(network.clone(), abi.clone()).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        let service = Self::from_connectors(connectors, identity, config);
        info!(sender = ?service.sender, "Blockchain service initialized successfully");
        Ok(service)
    }

    pub fn from_connectors(
        connectors: Vec<Arc<ChainConnector>>,
        identity: Arc<SigningIdentity>,
        config: &ChainConfig,
    ) -> Self {
        let sender = identity.address();
        let builder = Arc::new(TransactionBuilder::new(
            identity,
            Arc::new(NonceAllocator::default()),
            config.gas_limit,
        ));
        let minters = connectors
            .iter()
            .map(|connector| {
                BadgeMinter::new(connector.clone(), builder.clone(), config.confirmation.clone())
            })
            .collect();
        Self {
            dispatcher: Arc::new(Dispatcher::new(minters)),
            balances: Arc::new(BalanceReader::new(connectors)),
            sender,
        }
    }
}
