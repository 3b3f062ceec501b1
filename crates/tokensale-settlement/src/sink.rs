//! Event delivery.
//!
//! Sinks only observe. They receive a [`SaleEventRecord`] after the
//! request that produced it has committed and cannot influence the ledger.

use tokensale_types::SaleEventRecord;
use tokio::sync::mpsc;

/// Receives committed sale events in sequence order.
pub trait EventSink: Send {
    fn emit(&mut self, record: SaleEventRecord);
}

impl<E: EventSink + ?Sized> EventSink for Box<E> {
    fn emit(&mut self, record: SaleEventRecord) {
        (**self).emit(record);
    }
}

/// Writes each event as a structured `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, record: SaleEventRecord) {
        tracing::info!(
            sale_id = %record.sale_id,
            sequence = record.sequence,
            kind = record.event.kind(),
            event = ?record.event,
            "sale event"
        );
    }
}

/// Forwards events to an async consumer.
///
/// A closed receiver is not an error: events are observational.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SaleEventRecord>,
}

impl ChannelSink {
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SaleEventRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&mut self, record: SaleEventRecord) {
        if let Err(err) = self.tx.send(record) {
            tracing::debug!(sequence = err.0.sequence, "event receiver closed, dropping event");
        }
    }
}

/// Keeps every record in memory.
/// **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub records: Vec<SaleEventRecord>,
}

#[cfg(any(test, feature = "test-helpers"))]
impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Event kinds in emission order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.records.iter().map(|r| r.event.kind()).collect()
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl EventSink for RecordingSink {
    fn emit(&mut self, record: SaleEventRecord) {
        self.records.push(record);
    }
}
