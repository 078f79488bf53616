//! Request coalescer - FIFO single-worker queue
//!
//! Callers enqueue requests; exactly one background worker drains the
//! queue and runs them against the provider one at a time, in submission
//! order. The provider's guard already gives mutual exclusion; the queue
//! adds first-come-first-served fairness across callers.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use tokenguard_core::{Result, Token, TokenError, TokenStrategy};

use crate::provider::TokenProvider;
use crate::state::ProviderState;

/// A request waiting in the queue
struct QueuedRequest {
    id: Uuid,
    strategy: TokenStrategy,
    reply: oneshot::Sender<Result<Token>>,
}

/// Handle to a submitted request
#[derive(Debug)]
pub struct PendingToken {
    id: Uuid,
    reply: oneshot::Receiver<Result<Token>>,
}

impl PendingToken {
    /// Request identifier (appears in logs)
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the request's result
    pub async fn wait(self) -> Result<Token> {
        self.reply.await.unwrap_or(Err(TokenError::QueueClosed))
    }
}

/// FIFO queue in front of a token provider
///
/// Must be created inside a tokio runtime. Dropping the coalescer closes
/// the queue; requests already queued are still served.
pub struct RequestCoalescer {
    sender: mpsc::UnboundedSender<QueuedRequest>,
    provider: Arc<dyn TokenProvider>,
    worker: JoinHandle<()>,
}

impl RequestCoalescer {
    /// Start the worker for `provider`
    pub fn spawn(provider: Arc<dyn TokenProvider>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(Arc::clone(&provider), receiver));
        info!("Token request queue started");
        Self {
            sender,
            provider,
            worker,
        }
    }

    /// Enqueue a request without waiting for it
    pub fn submit(&self, strategy: TokenStrategy) -> PendingToken {
        let id = Uuid::new_v4();
        let (reply, receiver) = oneshot::channel();

        // On a closed queue the request (and its reply sender) is dropped,
        // so the caller sees QueueClosed.
        if self
            .sender
            .send(QueuedRequest {
                id,
                strategy,
                reply,
            })
            .is_ok()
        {
            debug!(request_id = %id, strategy = %strategy, "Enqueued token request");
        }

        PendingToken {
            id,
            reply: receiver,
        }
    }

    /// Enqueue a request and wait for its result
    pub async fn request(&self, strategy: TokenStrategy) -> Result<Token> {
        self.submit(strategy).wait().await
    }

    /// State of the underlying provider
    pub fn state(&self) -> ProviderState {
        self.provider.state()
    }

    /// Close the queue and wait for queued requests to drain
    pub async fn shutdown(self) {
        let Self { sender, worker, .. } = self;
        drop(sender);
        if let Err(e) = worker.await {
            debug!(error = %e, "Token request worker ended abnormally");
        }
    }
}

async fn run_worker(
    provider: Arc<dyn TokenProvider>,
    mut receiver: mpsc::UnboundedReceiver<QueuedRequest>,
) {
    while let Some(request) = receiver.recv().await {
        if request.reply.is_closed() {
            debug!(request_id = %request.id, "Caller went away, skipping request");
            continue;
        }

        let result = provider.provide_token(request.strategy).await;
        if request.reply.send(result).is_err() {
            debug!(request_id = %request.id, "Caller went away before the reply");
        }
    }
    info!("Token request queue closed");
}
