use async_trait::async_trait;
use tracing::{error, info};

use crate::badge::MintRequest;
use crate::block_chain::minter::BadgeMinter;
use crate::block_chain::Network;
use crate::mint::{MintOutcome, MintReport};

/// Mints one request on every configured network.
#[async_trait]
pub trait BadgeDispatch: Send + Sync {
    async fn mint_everywhere(&self, request: &MintRequest) -> MintReport;
}

/// Live dispatcher: one minter per network, tried in configured order.
pub struct Dispatcher {
    minters: Vec<BadgeMinter>,
}

impl Dispatcher {
    pub fn new(minters: Vec<BadgeMinter>) -> Self {
        Self { minters }
    }

    pub fn networks(&self) -> Vec<Network> {
        self.minters.iter().map(|m| m.network()).collect()
    }
}

#[async_trait]
impl BadgeDispatch for Dispatcher {
    async fn mint_everywhere(&self, request: &MintRequest) -> MintReport {
        info!(
            recipient = ?request.recipient,
            quest = %request.quest,
            rarity = request.rarity.name(),
            "Minting badge on {} network(s)",
            self.minters.len()
        );
        let mut outcomes = Vec::with_capacity(self.minters.len());
        for minter in &self.minters {
            // a failure here is recorded and the next network is still attempted
            let result = minter
                .mint(
                    request.recipient,
                    &request.quest,
                    &request.token_uri,
                    request.rarity,
                )
                .await;
            let outcome = MintOutcome::from_result(minter.network(), result);
            log_outcome(&outcome);
            outcomes.push(outcome);
        }
        MintReport {
            recipient: request.recipient,
            quest: request.quest.to_string(),
            outcomes,
        }
    }
}

fn log_outcome(outcome: &MintOutcome) {
    let network = outcome.network.display_name();
    match (&outcome.status, outcome.tx_hash) {
        (crate::mint::MintStatus::Failed { reason }, tx_hash) => {
            error!(network, ?tx_hash, %reason, "Failed to mint badge");
        }
        (status, tx_hash) => {
            info!(network, ?tx_hash, ?status, "Badge mint submitted");
        }
    }
}

/// Stand-in used when the chain subsystem failed to start: logs what would
/// have been minted and submits nothing.
pub struct SimulatedDispatch {
    networks: Vec<Network>,
}

impl SimulatedDispatch {
    pub fn new(networks: Vec<Network>) -> Self {
        Self { networks }
    }
}

#[async_trait]
impl BadgeDispatch for SimulatedDispatch {
    async fn mint_everywhere(&self, request: &MintRequest) -> MintReport {
        for network in &self.networks {
            info!(
                network = network.display_name(),
                recipient = ?request.recipient,
                quest = %request.quest,
                quest_id = request.quest.numeric_id(),
                token_uri = %request.token_uri,
                rarity = request.rarity.name(),
                "SIMULATION MODE: badge mint not submitted"
            );
        }
        MintReport {
            recipient: request.recipient,
            quest: request.quest.to_string(),
            outcomes: Vec::new(),
        }
    }
}
