use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use tracing::{debug, info, warn};

use crate::block_chain::{ChainConnector, Network};
use crate::error::{BuildError, BuildStep, ConfigError, MintError};

/// Gas budget for a single `mintBadge` call. Not estimated per call.
pub const DEFAULT_GAS_LIMIT: u64 = 300_000;

/// The process-wide hot key and its address. Read-only after startup.
pub struct SigningIdentity {
    wallet: LocalWallet,
}

impl SigningIdentity {
    pub fn from_hex(private_key: &str) -> Result<Self, ConfigError> {
        let key = private_key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);
        let wallet =
            LocalWallet::from_str(key).map_err(|e| ConfigError::InvalidKey(e.to_string()))?;
        info!(address = ?wallet.address(), "Loaded signing wallet");
        Ok(Self { wallet })
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Signs a legacy transaction calling `to` with EIP-155 replay protection.
    pub fn sign(
        &self,
        auth: &TransactionAuthorization,
        to: Address,
        data: Bytes,
    ) -> Result<SignedTransaction, MintError> {
        let tx: TypedTransaction = TransactionRequest::new()
            .from(self.address())
            .to(to)
            .data(data)
            .value(auth.value)
            .gas(auth.gas_limit)
            .gas_price(auth.gas_price)
            .nonce(auth.nonce)
            .chain_id(auth.chain_id)
            .into();
        let signature = self
            .wallet
            .sign_transaction_sync(&tx)
            .map_err(|e| MintError::Sign(e.to_string()))?;
        Ok(SignedTransaction {
            hash: tx.hash(&signature),
            raw: tx.rlp_signed(&signature),
            nonce: auth.nonce,
        })
    }
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Parameters for one submission attempt. Built fresh every time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionAuthorization {
    pub chain_id: u64,
    pub from: Address,
    pub nonce: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub value: U256,
}

#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub raw: Bytes,
    pub hash: H256,
    pub nonce: U256,
}

/// Serializes nonce issue per network for the single signing identity.
///
/// The network's pending count is still read on every build; the allocator
/// never hands out a nonce at or below one it already issued.
#[derive(Debug, Default)]
pub struct NonceAllocator {
    issued: Mutex<HashMap<Network, U256>>,
}

impl NonceAllocator {
    pub fn allocate(&self, network: Network, reported_pending: U256) -> U256 {
        let mut issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        let nonce = match issued.get(&network) {
            Some(last) if *last >= reported_pending => *last + 1,
            _ => reported_pending,
        };
        issued.insert(network, nonce);
        nonce
    }

    /// Stops tracking `network`, so the next build takes the endpoint's
    /// pending nonce as is. Called when a sent transaction goes unconfirmed,
    /// so a nonce the endpoint dropped gets reused.
    pub fn resync(&self, network: Network) {
        let mut issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        issued.remove(&network);
    }

    /// Gives back a nonce whose transaction never reached the network.
    /// Only the most recent issue can be returned.
    pub fn release(&self, network: Network, nonce: U256) {
        let mut issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        if issued.get(&network) == Some(&nonce) {
            if nonce.is_zero() {
                issued.remove(&network);
            } else {
                issued.insert(network, nonce - 1);
            }
        }
    }
}

pub struct TransactionBuilder {
    identity: Arc<SigningIdentity>,
    nonces: Arc<NonceAllocator>,
    gas_limit: u64,
}

impl TransactionBuilder {
    pub fn new(identity: Arc<SigningIdentity>, nonces: Arc<NonceAllocator>, gas_limit: u64) -> Self {
        Self {
            identity,
            nonces,
            gas_limit,
        }
    }

    pub fn identity(&self) -> &SigningIdentity {
        &self.identity
    }

    pub fn nonces(&self) -> &NonceAllocator {
        &self.nonces
    }

    /// Chain id check, pending nonce, suggested gas price, fixed gas limit.
    pub async fn build(
        &self,
        connector: &ChainConnector,
    ) -> Result<TransactionAuthorization, BuildError> {
        let network = connector.network();
        let rpc = connector.rpc();

        let chain_id = rpc.chain_id().await.map_err(|source| BuildError::Failed {
            step: BuildStep::ChainId,
            source,
        })?;
        if chain_id != connector.chain_id() {
            return Err(BuildError::ChainIdMismatch {
                expected: connector.chain_id(),
                actual: chain_id,
            });
        }

        let from = self.identity.address();
        let reported = rpc
            .pending_nonce(from)
            .await
            .map_err(|source| BuildError::Failed {
                step: BuildStep::Nonce,
                source,
            })?;
        let nonce = self.nonces.allocate(network, reported);
        if nonce != reported {
            warn!(%network, %reported, %nonce, "Pending nonce lags behind issued nonces");
        }

        let gas_price = match rpc.gas_price().await {
            Ok(price) => price,
            Err(source) => {
                self.nonces.release(network, nonce);
                return Err(BuildError::Failed {
                    step: BuildStep::GasPrice,
                    source,
                });
            }
        };

        debug!(%network, chain_id, %nonce, %gas_price, gas_limit = self.gas_limit, "Built transaction authorization");
        Ok(TransactionAuthorization {
            chain_id,
            from,
            nonce,
            gas_price,
            gas_limit: U256::from(self.gas_limit),
            value: U256::zero(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_chain::testing::{connector, ScriptedRpc, TEST_KEY};
    use ethers::utils::rlp::Rlp;

    fn n(value: u64) -> U256 {
        U256::from(value)
    }

    fn builder() -> TransactionBuilder {
        TransactionBuilder::new(
            Arc::new(SigningIdentity::from_hex(TEST_KEY).unwrap()),
            Arc::new(NonceAllocator::default()),
            DEFAULT_GAS_LIMIT,
        )
    }

    #[test]
    fn test_identity_from_hex() {
        let with_prefix = SigningIdentity::from_hex(TEST_KEY).unwrap();
        let without_prefix = SigningIdentity::from_hex(&TEST_KEY[2..]).unwrap();
        let expected: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        assert_eq!(with_prefix.address(), expected);
        assert_eq!(without_prefix.address(), expected);
        assert!(!format!("{:?}", with_prefix).contains(&TEST_KEY[2..]));
    }

    #[test]
    fn test_identity_rejects_malformed_key() {
        assert!(matches!(
            SigningIdentity::from_hex("0xnot-a-key"),
            Err(ConfigError::InvalidKey(_))
        ));
        assert!(matches!(SigningIdentity::from_hex(""), Err(ConfigError::InvalidKey(_))));
    }

    #[test]
    fn test_nonce_allocator() {
        let nonces = NonceAllocator::default();
        assert_eq!(nonces.allocate(Network::Ethereum, n(5)), n(5));
        // endpoint has not seen our last submission yet
        assert_eq!(nonces.allocate(Network::Ethereum, n(5)), n(6));
        assert_eq!(nonces.allocate(Network::Ethereum, n(9)), n(9));
        // independent per network
        assert_eq!(nonces.allocate(Network::BlockDag, n(0)), n(0));

        nonces.release(Network::Ethereum, n(9));
        assert_eq!(nonces.allocate(Network::Ethereum, n(5)), n(9));
        // stale release is ignored
        nonces.release(Network::Ethereum, n(3));
        assert_eq!(nonces.allocate(Network::Ethereum, n(5)), n(10));

        nonces.release(Network::BlockDag, n(0));
        assert_eq!(nonces.allocate(Network::BlockDag, n(0)), n(0));
    }

    #[test]
    fn test_nonce_allocator_resync_reuses_dropped_nonce() {
        let nonces = NonceAllocator::default();
        assert_eq!(nonces.allocate(Network::Ethereum, n(7)), n(7));
        assert_eq!(nonces.allocate(Network::Ethereum, n(7)), n(8));

        // endpoint still reports 7: both sent transactions were dropped
        nonces.resync(Network::Ethereum);
        assert_eq!(nonces.allocate(Network::Ethereum, n(7)), n(7));

        // other networks keep their history
        assert_eq!(nonces.allocate(Network::BlockDag, n(2)), n(2));
        nonces.resync(Network::Ethereum);
        assert_eq!(nonces.allocate(Network::BlockDag, n(2)), n(3));
    }

    #[tokio::test]
    async fn test_build_authorization() {
        let connector = connector(Network::Ethereum, 11155111, ScriptedRpc::healthy(11155111));
        let builder = builder();
        let auth = builder.build(&connector).await.unwrap();
        assert_eq!(auth.chain_id, 11155111);
        assert_eq!(auth.nonce, U256::from(7));
        assert_eq!(auth.gas_price, U256::from(2_000_000_000u64));
        assert_eq!(auth.gas_limit, U256::from(DEFAULT_GAS_LIMIT));
        assert_eq!(auth.value, U256::zero());
        assert_eq!(auth.from, builder.identity().address());

        // back-to-back builds never reuse a nonce
        let next = builder.build(&connector).await.unwrap();
        assert_eq!(next.nonce, U256::from(8));
    }

    #[tokio::test]
    async fn test_build_chain_id_mismatch() {
        let connector = connector(Network::BlockDag, 1043, ScriptedRpc::healthy(1));
        let err = builder().build(&connector).await.unwrap_err();
        assert!(matches!(err, BuildError::ChainIdMismatch { expected: 1043, actual: 1 }));
        assert_eq!(err.step(), BuildStep::ChainId);
    }

    #[tokio::test]
    async fn test_build_reports_failing_step() {
        let down = connector(Network::BlockDag, 1043, ScriptedRpc::unreachable());
        assert_eq!(builder().build(&down).await.unwrap_err().step(), BuildStep::ChainId);

        let rpc = ScriptedRpc {
            nonce: None,
            ..ScriptedRpc::healthy(1043)
        };
        let no_nonce = connector(Network::BlockDag, 1043, rpc);
        assert_eq!(builder().build(&no_nonce).await.unwrap_err().step(), BuildStep::Nonce);

        let rpc = ScriptedRpc {
            gas_price: None,
            ..ScriptedRpc::healthy(1043)
        };
        let no_gas = connector(Network::BlockDag, 1043, rpc);
        let builder = builder();
        assert_eq!(builder.build(&no_gas).await.unwrap_err().step(), BuildStep::GasPrice);
        // nonce reserved for the failed build was handed back
        assert_eq!(builder.nonces().allocate(Network::BlockDag, n(7)), n(7));
    }

    #[test]
    fn test_sign_recovers_sender() {
        let identity = SigningIdentity::from_hex(TEST_KEY).unwrap();
        let auth = TransactionAuthorization {
            chain_id: 1043,
            from: identity.address(),
            nonce: U256::from(3),
            gas_price: U256::from(1_000_000_000u64),
            gas_limit: U256::from(DEFAULT_GAS_LIMIT),
            value: U256::zero(),
        };
        let contract = Address::repeat_byte(0x11);
        let signed = identity.sign(&auth, contract, Bytes::from(vec![0xde, 0xad])).unwrap();

        assert_eq!(signed.hash, H256::from(ethers::utils::keccak256(&signed.raw)));
        assert_eq!(signed.nonce, U256::from(3));

        let (tx, signature) = TypedTransaction::decode_signed(&Rlp::new(&signed.raw)).unwrap();
        assert_eq!(tx.chain_id(), Some(U64::from(1043)));
        assert_eq!(tx.nonce(), Some(&U256::from(3)));
        assert_eq!(tx.to_addr(), Some(&contract));
        assert_eq!(signature.recover(tx.sighash()).unwrap(), identity.address());
    }
}
