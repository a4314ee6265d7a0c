pub mod dispatcher;
pub mod queue;

use ethers::types::{Address, H256, U256};
use serde::Serialize;

use crate::block_chain::minter::Submitted;
use crate::block_chain::Network;
use crate::error::MintError;

/// Where a mint stands after its attempt on one network.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MintStatus {
    /// Sent, but no receipt observed (not waited for, or wait timed out).
    Pending,
    Confirmed {
        block_number: Option<u64>,
        gas_used: Option<U256>,
    },
    Failed {
        reason: String,
    },
}

/// Result of one (request, network) pair. Logged, not stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MintOutcome {
    pub network: Network,
    pub tx_hash: Option<H256>,
    #[serde(flatten)]
    pub status: MintStatus,
}

impl MintOutcome {
    pub fn from_result(network: Network, result: Result<Submitted, MintError>) -> Self {
        match result {
            Ok(submitted) => Self {
                network,
                tx_hash: Some(submitted.tx_hash),
                status: submitted.status,
            },
            Err(e) => Self {
                network,
                tx_hash: e.tx_hash(),
                status: MintStatus::Failed {
                    reason: e.to_string(),
                },
            },
        }
    }

    /// Sent and not known to have failed.
    pub fn is_success(&self) -> bool {
        !matches!(self.status, MintStatus::Failed { .. })
    }
}

/// Outcomes of one request across every configured network.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MintReport {
    pub recipient: Address,
    pub quest: String,
    pub outcomes: Vec<MintOutcome>,
}

impl MintReport {
    pub fn succeeded(&self) -> Vec<Network> {
        self.outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.network)
            .collect()
    }

    pub fn failed(&self) -> Vec<Network> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.network)
            .collect()
    }
}
