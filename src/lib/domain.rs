//! Domain types, contracts and services

pub mod dispatch;
pub mod queue;
