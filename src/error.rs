use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use ethers::types::H256;
use serde_json::json;
use thiserror::Error;

use crate::block_chain::Network;

/// Startup configuration problems. Fatal for the chain subsystem only.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    MissingVar(String),
    #[error("invalid value for {name}: {reason}")]
    InvalidVar { name: String, reason: String },
    #[error("failed to parse private key: {0}")]
    InvalidKey(String),
    #[error("failed to parse contract ABI: {0}")]
    InvalidAbi(String),
    #[error("failed to connect to {network}: {reason}")]
    Endpoint { network: Network, reason: String },
    #[error("no networks configured for minting")]
    NoNetworks,
}

#[derive(Debug, Error)]
#[error("unsupported network: {0}")]
pub struct UnknownNetwork(pub String);

/// Failure talking to a chain endpoint or encoding/decoding contract data.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("{method} failed: {message}")]
    Rpc { method: &'static str, message: String },
    #[error("abi error in {function}: {message}")]
    Abi { function: &'static str, message: String },
    #[error("network {0} is not configured")]
    NotConfigured(Network),
}

impl ChainError {
    pub fn rpc(method: &'static str, err: impl std::fmt::Display) -> Self {
        ChainError::Rpc {
            method,
            message: err.to_string(),
        }
    }

    pub fn abi(function: &'static str, err: impl std::fmt::Display) -> Self {
        ChainError::Abi {
            function,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    ChainId,
    Nonce,
    GasPrice,
}

impl std::fmt::Display for BuildStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let step = match self {
            BuildStep::ChainId => "chain id",
            BuildStep::Nonce => "pending nonce",
            BuildStep::GasPrice => "gas price",
        };
        f.write_str(step)
    }
}

/// Transaction authorization could not be assembled. Never retried here.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to get {step}: {source}")]
    Failed {
        step: BuildStep,
        #[source]
        source: ChainError,
    },
    #[error("chain id mismatch: configured {expected}, endpoint reports {actual}")]
    ChainIdMismatch { expected: u64, actual: u64 },
}

impl BuildError {
    pub fn step(&self) -> BuildStep {
        match self {
            BuildError::Failed { step, .. } => *step,
            BuildError::ChainIdMismatch { .. } => BuildStep::ChainId,
        }
    }
}

#[derive(Debug, Error)]
pub enum MintError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("failed to encode mint call: {0}")]
    Encode(#[source] ChainError),
    #[error("failed to sign transaction: {0}")]
    Sign(String),
    #[error("failed to send transaction: {0}")]
    Submit(#[source] ChainError),
    #[error("transaction {tx_hash:#x} reverted with status {status}")]
    Reverted { tx_hash: H256, status: u64 },
}

impl MintError {
    /// Hash of a transaction that reached the chain, if any.
    pub fn tx_hash(&self) -> Option<H256> {
        match self {
            MintError::Reverted { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("progress store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal Server Error")]
    InternalError,
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<StoreError> for AppError {
    fn from(_: StoreError) -> Self {
        AppError::InternalError
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}
