//! Ledger events and the envelopes they are stored in.

pub mod envelope;
pub mod event;

pub use envelope::EventEnvelope;
pub use event::Event;
