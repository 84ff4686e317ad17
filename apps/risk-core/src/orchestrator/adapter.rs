//! Exchange adapter port.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::{ExecutionEvent, Order};

/// The exchange refused or failed the submission handoff.
#[derive(Debug, Clone, Error)]
#[error("exchange submission failed: {0}")]
pub struct ExchangeError(pub String);

/// Driven port: hands orders to the exchange and streams back their events.
///
/// The stream is at-least-once and may repeat `Ack`s; the orchestrator
/// tolerates duplicates. The stream ends when the adapter drops the sender,
/// which for an unfilled day order can happen without any terminal event.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Submit an order, returning the event stream for its lifecycle.
    async fn submit(
        &self,
        order: &Order,
    ) -> Result<mpsc::UnboundedReceiver<ExecutionEvent>, ExchangeError>;
}
