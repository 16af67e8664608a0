use chrono::{DateTime, Utc};

/// A fact recorded in a ledger stream.
///
/// Events are immutable, versioned for schema evolution, and only ever
/// appended. Movements, sales, payments and corrections are all events.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "inventory.stock_moved").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
