use std::env;
use std::str::FromStr;
use std::time::Duration;

use ethers::types::Address;
use tracing::warn;

use crate::block_chain::minter::ConfirmationPolicy;
use crate::block_chain::transaction::DEFAULT_GAS_LIMIT;
use crate::block_chain::{Network, NetworkConfig};
use crate::error::ConfigError;
use crate::mint::queue::MINT_QUEUE_CAPACITY;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";
const DEFAULT_METADATA_BASE_URL: &str = "https://defiquest.com/metadata";
const DEFAULT_BLOCKDAG_RPC: &str = "https://rpc.primordial.bdagscan.com";
const DEFAULT_SEPOLIA_RPC: &str = "https://rpc.sepolia.org";
const MIN_RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// HTTP server and queue settings. Always loadable.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_address: String,
    pub metadata_base_url: String,
    pub queue_capacity: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let queue_capacity = parse_or(&lookup, "MINT_QUEUE_CAPACITY", MINT_QUEUE_CAPACITY)?;
        if queue_capacity == 0 {
            return Err(ConfigError::InvalidVar {
                name: "MINT_QUEUE_CAPACITY".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(Self {
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_owned()),
            metadata_base_url: lookup("BADGE_METADATA_BASE_URL")
                .unwrap_or_else(|| DEFAULT_METADATA_BASE_URL.to_owned()),
            queue_capacity,
        })
    }
}

/// Signing key and per-network chain settings. A failure here puts minting
/// into simulation mode; it never stops the server.
#[derive(Clone)]
pub struct ChainConfig {
    private_key: String,
    pub networks: Vec<NetworkConfig>,
    pub confirmation: ConfirmationPolicy,
    pub gas_limit: u64,
}

impl ChainConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let private_key = required(&lookup, "PRIVATE_KEY")?;

        let networks = match lookup("MINT_NETWORKS") {
            Some(list) => parse_networks(&list)?,
            None => Network::ALL.to_vec(),
        };
        if networks.is_empty() {
            return Err(ConfigError::NoNetworks);
        }
        let networks = networks
            .into_iter()
            .map(|network| network_config(&lookup, network))
            .collect::<Result<Vec<_>, _>>()?;

        let defaults = ConfirmationPolicy::default();
        let confirmation = ConfirmationPolicy {
            wait: parse_or(&lookup, "MINT_WAIT_FOR_CONFIRMATION", defaults.wait)?,
            timeout: Duration::from_secs(parse_or(
                &lookup,
                "MINT_CONFIRMATION_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )?),
            poll_interval: Duration::from_millis(parse_or(
                &lookup,
                "MINT_RECEIPT_POLL_MILLIS",
                defaults.poll_interval.as_millis() as u64,
            )?)
            .max(MIN_RECEIPT_POLL_INTERVAL),
        };

        Ok(Self {
            private_key,
            networks,
            confirmation,
            gas_limit: parse_or(&lookup, "MINT_GAS_LIMIT", DEFAULT_GAS_LIMIT)?,
        })
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }
}

impl std::fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainConfig")
            .field("private_key", &"[redacted]")
            .field("networks", &self.networks)
            .field("confirmation", &self.confirmation)
            .field("gas_limit", &self.gas_limit)
            .finish()
    }
}

/// Ordered network list. Aliases of a network already listed are skipped.
fn parse_networks(list: &str) -> Result<Vec<Network>, ConfigError> {
    let mut networks = Vec::new();
    for name in list.split(',').filter(|name| !name.trim().is_empty()) {
        let network = Network::from_str(name).map_err(|e| ConfigError::InvalidVar {
            name: "MINT_NETWORKS".to_owned(),
            reason: e.to_string(),
        })?;
        if networks.contains(&network) {
            warn!(%network, entry = name.trim(), "Network listed twice in MINT_NETWORKS, ignoring repeat");
            continue;
        }
        networks.push(network);
    }
    Ok(networks)
}

fn network_config(
    lookup: &impl Fn(&str) -> Option<String>,
    network: Network,
) -> Result<NetworkConfig, ConfigError> {
    let prefix = network.env_prefix();
    let rpc_url = lookup(&format!("{prefix}_RPC_URL")).unwrap_or_else(|| default_rpc_url(lookup, network));

    // no baked-in addresses or chain ids: the deployments differ per environment
    let chain_id_var = format!("{prefix}_CHAIN_ID");
    let chain_id = parse_value(&chain_id_var, &required(lookup, &chain_id_var)?)?;
    let contract_var = format!("{prefix}_CONTRACT_ADDRESS");
    let contract_address: Address = parse_value(&contract_var, &required(lookup, &contract_var)?)?;

    Ok(NetworkConfig {
        network,
        chain_id,
        rpc_url,
        contract_address,
    })
}

fn default_rpc_url(lookup: &impl Fn(&str) -> Option<String>, network: Network) -> String {
    match network {
        Network::Ethereum => match lookup("INFURA_API_KEY") {
            Some(key) if !key.trim().is_empty() => format!("https://sepolia.infura.io/v3/{}", key.trim()),
            _ => DEFAULT_SEPOLIA_RPC.to_owned(),
        },
        Network::BlockDag => DEFAULT_BLOCKDAG_RPC.to_owned(),
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String, ConfigError> {
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_owned()),
        _ => Err(ConfigError::MissingVar(name.to_owned())),
    }
}

fn parse_value<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidVar {
        name: name.to_owned(),
        reason: e.to_string(),
    })
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => parse_value(name, &value),
        None => Ok(default),
    }
}
