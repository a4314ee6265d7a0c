pub mod badges;
pub mod health;
pub mod profile;
pub mod quests;

use std::sync::Arc;

use actix_web::web;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::badge::{MintRequest, Rarity};
use crate::block_chain::balance::{BadgeBalance, BalanceReader};
use crate::block_chain::Network;
use crate::error::AppError;
use crate::mint::queue::MintQueue;

/// Minting state shared by every handler.
#[derive(Clone)]
pub struct BadgeState {
    pub queue: MintQueue,
    /// `None` in simulation mode.
    pub balances: Option<Arc<BalanceReader>>,
    pub networks: Vec<Network>,
    pub init_error: Option<String>,
}

impl BadgeState {
    pub fn blockchain_enabled(&self) -> bool {
        self.balances.is_some()
    }

    /// Queues the badge for a completed quest. A catalogue id, when given,
    /// replaces the title hash; XP, when given, decides rarity.
    pub fn enqueue_quest_badge(&self, user: Address, quest: &QuestInfo) -> bool {
        if quest.quest_id.is_none() && quest.quest_xp.is_none() {
            return self.queue.enqueue_mint(user, &quest.quest_title);
        }
        let mut request =
            MintRequest::for_quest(user, &quest.quest_title, self.queue.metadata_base_url());
        if let Some(id) = quest.quest_id {
            request = request.with_quest_id(id);
        }
        if let Some(xp) = quest.quest_xp {
            request = request.with_rarity(Rarity::from_xp(xp));
        }
        self.queue.enqueue(request)
    }

    /// Badge count and token ids on every network. Unreachable networks are
    /// reported as unavailable, never as zero.
    pub async fn network_badges(&self, user: Address, with_tokens: bool) -> Vec<NetworkBadges> {
        let mut entries = Vec::with_capacity(self.networks.len());
        for &network in &self.networks {
            let entry = match &self.balances {
                Some(reader) => {
                    let count = reader.check_balance(network, user).await;
                    let mut entry = NetworkBadges::new(network, count);
                    if with_tokens && entry.available {
                        match reader.badges(network, user).await {
                            Ok(badges) => entry.badges = Some(badges),
                            Err(e) => {
                                warn!(%network, ?user, error = %e, "Failed to list badges");
                            }
                        }
                    }
                    entry
                }
                None => NetworkBadges::new(network, BadgeBalance::Unavailable),
            };
            entries.push(entry);
        }
        entries
    }
}

#[derive(Debug, Serialize)]
pub struct NetworkBadges {
    pub network: Network,
    pub available: bool,
    pub count: BadgeBalance,
    /// Token ids. `None` when not requested or the listing call failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badges: Option<Vec<U256>>,
}

impl NetworkBadges {
    fn new(network: Network, count: BadgeBalance) -> Self {
        Self {
            network,
            available: count.known().is_some(),
            count,
            badges: None,
        }
    }
}

/// Quest fields shared by the completion endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestInfo {
    pub quest_title: String,
    pub quest_id: Option<u64>,
    pub quest_xp: Option<u32>,
}

impl QuestInfo {
    pub fn validated(&self) -> Result<QuestInfo, AppError> {
        let quest_title = self.quest_title.trim();
        if quest_title.is_empty() {
            return Err(AppError::BadRequest("questTitle must not be empty".to_owned()));
        }
        Ok(QuestInfo {
            quest_title: quest_title.to_owned(),
            ..self.clone()
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AddressPath {
    pub address: String,
}

pub fn parse_address(raw: &str) -> Result<Address, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid address: {}", raw)))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health)
        .service(badges::mint_badge)
        .service(badges::get_badges)
        .service(profile::get_profile)
        .service(quests::submit_quiz);
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use ethers::abi::{encode, Token};
    use tokio::sync::mpsc;

    use super::*;
    use crate::badge::MintRequest;
    use crate::block_chain::testing::{connector, ScriptedRpc};
    use crate::db::{MemoryStore, ProgressStore};

    pub const BASE: &str = "https://defiquest.com/metadata";
    pub const USER: &str = "0xabc0000000000000000000000000000000000123";

    pub fn count_output(count: u64) -> ethers::types::Bytes {
        encode(&[Token::Uint(U256::from(count))]).into()
    }

    /// State whose Ethereum side answers `ethereum_calls` in order and whose
    /// BlockDAG side is down.
    pub fn live_state(ethereum_calls: Vec<ethers::types::Bytes>) -> (BadgeState, mpsc::Receiver<MintRequest>) {
        let ethereum = ScriptedRpc::healthy(11155111);
        ethereum
            .call_results
            .lock()
            .unwrap()
            .extend(ethereum_calls.into_iter().map(Ok));
        let reader = BalanceReader::new(vec![
            connector(Network::Ethereum, 11155111, ethereum),
            connector(Network::BlockDag, 1043, ScriptedRpc::unreachable()),
        ]);
        let (queue, receiver) = MintQueue::new(4, BASE);
        let state = BadgeState {
            queue,
            balances: Some(Arc::new(reader)),
            networks: Network::ALL.to_vec(),
            init_error: None,
        };
        (state, receiver)
    }

    pub fn simulated_state(capacity: usize) -> (BadgeState, mpsc::Receiver<MintRequest>) {
        let (queue, receiver) = MintQueue::new(capacity, BASE);
        let state = BadgeState {
            queue,
            balances: None,
            networks: Network::ALL.to_vec(),
            init_error: Some("PRIVATE_KEY environment variable not set".to_owned()),
        };
        (state, receiver)
    }

    pub fn store() -> Arc<dyn ProgressStore> {
        Arc::new(MemoryStore::new())
    }
}
