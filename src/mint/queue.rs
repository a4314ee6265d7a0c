use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use ethers::types::Address;
use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::badge::MintRequest;
use crate::mint::dispatcher::BadgeDispatch;
use crate::mint::MintReport;

pub const MINT_QUEUE_CAPACITY: usize = 100;

/// Producer side of the bounded mint queue. Never blocks: a full queue
/// drops the request.
#[derive(Clone)]
pub struct MintQueue {
    sender: mpsc::Sender<MintRequest>,
    capacity: usize,
    metadata_base_url: Arc<str>,
}

impl MintQueue {
    pub fn new(capacity: usize, metadata_base_url: &str) -> (Self, mpsc::Receiver<MintRequest>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let queue = Self {
            sender,
            capacity,
            metadata_base_url: Arc::from(metadata_base_url),
        };
        (queue, receiver)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn metadata_base_url(&self) -> &str {
        &self.metadata_base_url
    }

    /// Requests waiting for the worker.
    pub fn len(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    /// Entry point for quest completion: builds the badge request for
    /// `topic` and queues it. Returns whether it was queued.
    pub fn enqueue_mint(&self, recipient: Address, topic: &str) -> bool {
        self.enqueue(MintRequest::for_quest(recipient, topic, &self.metadata_base_url))
    }

    pub fn enqueue(&self, request: MintRequest) -> bool {
        let recipient = request.recipient;
        let quest = request.quest.to_string();
        match self.sender.try_send(request) {
            Ok(()) => {
                info!(?recipient, %quest, "Queued badge mint");
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(?recipient, %quest, capacity = self.capacity, "Mint queue full, dropping request");
                false
            }
            Err(TrySendError::Closed(_)) => {
                error!(?recipient, %quest, "Mint worker stopped, dropping request");
                false
            }
        }
    }
}

/// Single consumer of the mint queue. Requests are processed one at a time,
/// each on every network, in arrival order.
pub struct MintWorker {
    receiver: mpsc::Receiver<MintRequest>,
    dispatcher: Arc<dyn BadgeDispatch>,
}

impl MintWorker {
    pub fn new(receiver: mpsc::Receiver<MintRequest>, dispatcher: Arc<dyn BadgeDispatch>) -> Self {
        Self {
            receiver,
            dispatcher,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        info!("Mint worker started");
        while let Some(request) = self.receiver.recv().await {
            self.process(request).await;
        }
        info!("Mint queue closed, worker exiting");
    }

    /// A panic inside a dispatch is logged and swallowed so the loop keeps going.
    async fn process(&self, request: MintRequest) -> Option<MintReport> {
        let recipient = request.recipient;
        let quest = request.quest.to_string();
        match AssertUnwindSafe(self.dispatcher.mint_everywhere(&request))
            .catch_unwind()
            .await
        {
            Ok(report) => {
                let succeeded = report.succeeded();
                let failed = report.failed();
                if failed.is_empty() {
                    info!(?recipient, %quest, ?succeeded, "Mint request processed");
                } else {
                    warn!(?recipient, %quest, ?succeeded, ?failed, "Mint request partially failed");
                }
                Some(report)
            }
            Err(panic) => {
                error!(?recipient, %quest, reason = panic_message(panic.as_ref()), "Mint attempt panicked");
                None
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
