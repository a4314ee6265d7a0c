use std::sync::Arc;
use std::time::Duration;

use ethers::prelude::*;
use tracing::{debug, error, info, warn};

use crate::badge::{QuestRef, Rarity};
use crate::block_chain::transaction::TransactionBuilder;
use crate::block_chain::utils::encode_mint_badge;
use crate::block_chain::{ChainConnector, Network};
use crate::error::MintError;
use crate::mint::MintStatus;

/// Whether and how long a mint blocks on its receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub wait: bool,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            wait: true,
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(3),
        }
    }
}

/// A transaction accepted by the network. `status` is never `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub struct Submitted {
    pub tx_hash: H256,
    pub status: MintStatus,
}

/// `mintBadge` on a single network.
pub struct BadgeMinter {
    connector: Arc<ChainConnector>,
    builder: Arc<TransactionBuilder>,
    policy: ConfirmationPolicy,
}

impl BadgeMinter {
    pub fn new(
        connector: Arc<ChainConnector>,
        builder: Arc<TransactionBuilder>,
        policy: ConfirmationPolicy,
    ) -> Self {
        Self {
            connector,
            builder,
            policy,
        }
    }

    pub fn network(&self) -> Network {
        self.connector.network()
    }

    pub async fn mint(
        &self,
        recipient: Address,
        quest: &QuestRef,
        token_uri: &str,
        rarity: Rarity,
    ) -> Result<Submitted, MintError> {
        let network = self.network();
        let quest_id = quest.numeric_id();
        let contract = self.connector.contract_address();
        info!(
            %network,
            ?recipient,
            ?contract,
            %quest,
            quest_id,
            rarity = rarity.name(),
            "Preparing mint transaction"
        );

        let data = encode_mint_badge(self.connector.abi(), recipient, quest_id, token_uri, rarity)
            .map_err(MintError::Encode)?;
        let auth = match self.builder.build(&self.connector).await {
            Ok(auth) => auth,
            Err(e) => {
                error!(%network, step = %e.step(), error = %e, "Failed to build mint transaction");
                return Err(e.into());
            }
        };
        let nonces = self.builder.nonces();

        let signed = match self.builder.identity().sign(&auth, contract, data) {
            Ok(signed) => signed,
            Err(e) => {
                nonces.release(network, auth.nonce);
                return Err(e);
            }
        };

        let tx_hash = match self.connector.rpc().submit_raw_transaction(signed.raw).await {
            Ok(hash) => hash,
            Err(e) => {
                nonces.release(network, signed.nonce);
                return Err(MintError::Submit(e));
            }
        };
        if tx_hash != signed.hash {
            warn!(%network, returned = ?tx_hash, computed = ?signed.hash, "Endpoint returned unexpected transaction hash");
        }
        info!(%network, tx_hash = ?tx_hash, nonce = %auth.nonce, gas_price = %auth.gas_price, "Transaction sent");

        if !self.policy.wait {
            return Ok(Submitted {
                tx_hash,
                status: MintStatus::Pending,
            });
        }

        match self.wait_for_receipt(tx_hash).await {
            None => {
                warn!(%network, tx_hash = ?tx_hash, timeout = ?self.policy.timeout, "Transaction may still be pending");
                // next build trusts the endpoint's pending nonce again
                nonces.resync(network);
                Ok(Submitted {
                    tx_hash,
                    status: MintStatus::Pending,
                })
            }
            Some(receipt) => {
                let Some(status) = receipt.status.map(|s| s.as_u64()) else {
                    warn!(%network, tx_hash = ?tx_hash, "Receipt carries no status, outcome unknown");
                    return Ok(Submitted {
                        tx_hash,
                        status: MintStatus::Pending,
                    });
                };
                if status != 1 {
                    error!(%network, tx_hash = ?tx_hash, status, "Mint transaction reverted");
                    return Err(MintError::Reverted { tx_hash, status });
                }
                let block_number = receipt.block_number.map(|b| b.as_u64());
                info!(%network, tx_hash = ?tx_hash, ?block_number, gas_used = ?receipt.gas_used, "Badge minted");
                Ok(Submitted {
                    tx_hash,
                    status: MintStatus::Confirmed {
                        block_number,
                        gas_used: receipt.gas_used,
                    },
                })
            }
        }
    }

    /// Polls for the receipt until it shows up or the policy timeout expires.
    async fn wait_for_receipt(&self, tx_hash: H256) -> Option<TransactionReceipt> {
        let rpc = self.connector.rpc();
        let poll = async {
            loop {
                match rpc.transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => {}
                    Err(e) => debug!(tx_hash = ?tx_hash, error = %e, "Receipt poll failed"),
                }
                tokio::time::sleep(self.policy.poll_interval).await;
            }
        };
        tokio::time::timeout(self.policy.timeout, poll).await.ok()
    }
}
