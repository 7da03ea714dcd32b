#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Store-and-forward email queue.
//!
//! Callers admit messages through a [`QueueService`](domain::queue::QueueService); a
//! [`DispatchCycle`](domain::dispatch::DispatchCycle), fired by a
//! [`CycleScheduler`](domain::dispatch::CycleScheduler), drains them to an SMTP relay.

pub mod domain;
pub mod infrastructure;
