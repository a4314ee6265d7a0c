use std::sync::Arc;

use ethers::prelude::*;
use serde::Serialize;
use tracing::warn;

use crate::block_chain::utils::{
    decode_badge_count, decode_user_badges, encode_badge_count, encode_user_badges,
};
use crate::block_chain::{ChainConnector, Network};
use crate::error::ChainError;

/// Badge count as seen by a profile: a real number or "could not ask".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BadgeBalance {
    Known(u64),
    Unavailable,
}

impl BadgeBalance {
    pub fn known(&self) -> Option<u64> {
        match self {
            BadgeBalance::Known(count) => Some(*count),
            BadgeBalance::Unavailable => None,
        }
    }
}

/// Read-only badge queries against each configured network.
pub struct BalanceReader {
    connectors: Vec<Arc<ChainConnector>>,
}

impl BalanceReader {
    pub fn new(connectors: Vec<Arc<ChainConnector>>) -> Self {
        Self { connectors }
    }

    fn connector(&self, network: Network) -> Result<&ChainConnector, ChainError> {
        self.connectors
            .iter()
            .find(|c| c.network() == network)
            .map(|c| c.as_ref())
            .ok_or(ChainError::NotConfigured(network))
    }

    /// `getUserBadgeCount(user)`.
    pub async fn badge_count(&self, network: Network, user: Address) -> Result<u64, ChainError> {
        let connector = self.connector(network)?;
        let data = encode_badge_count(connector.abi(), user)?;
        let output = connector
            .rpc()
            .call_contract(connector.contract_address(), data)
            .await?;
        let count = decode_badge_count(connector.abi(), &output)?;
        if count > U256::from(u64::MAX) {
            return Err(ChainError::abi(
                crate::block_chain::utils::GET_USER_BADGE_COUNT,
                format!("badge count {} out of range", count),
            ));
        }
        Ok(count.as_u64())
    }

    /// `getUserBadges(user)`: the token ids held by `user`.
    pub async fn badges(&self, network: Network, user: Address) -> Result<Vec<U256>, ChainError> {
        let connector = self.connector(network)?;
        let data = encode_user_badges(connector.abi(), user)?;
        let output = connector
            .rpc()
            .call_contract(connector.contract_address(), data)
            .await?;
        decode_user_badges(connector.abi(), &output)
    }

    /// Profile-facing count. Errors are logged and become `Unavailable`, never zero.
    pub async fn check_balance(&self, network: Network, user: Address) -> BadgeBalance {
        match self.badge_count(network, user).await {
            Ok(count) => BadgeBalance::Known(count),
            Err(e) => {
                warn!(%network, ?user, error = %e, "Failed to read badge balance");
                BadgeBalance::Unavailable
            }
        }
    }
}
