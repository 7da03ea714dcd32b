//! Delivery of queued messages: composing them, handing them to a relay in periodic cycles,
//! and recording the outcome.

mod composer;
mod cycle;
mod scheduler;
mod transport;

pub mod errors;

pub use composer::compose;
pub use cycle::{CycleOutcome, CycleSummary, DispatchCycle};
pub use scheduler::{CycleScheduler, SchedulerConfig, SchedulerState};
pub use transport::{Transport, TransportSession};

#[cfg(test)]
pub mod tests {
    pub use super::transport::{MockTransport, MockTransportSession};
}
