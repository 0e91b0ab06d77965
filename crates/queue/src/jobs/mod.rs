//! Queue payload definitions.

mod envelope;
mod event;

pub use envelope::RetryEnvelope;
pub use event::Event;
