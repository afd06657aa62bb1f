//! Integration tests for the case coordination components

mod collector_resilience;
mod journal;
mod lock_broker;
mod migration;
mod node_data_store;
mod support;
