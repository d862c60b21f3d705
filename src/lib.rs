//! A replicated auction service
//!
//! Several replicas each hold a full copy of the auction state. A
//! coordinator broadcasts every client request to all of them, checks
//! whether their answers agree and, when they don't, trusts the replica
//! that has processed the most requests.
pub mod agreement;
pub mod auction;
pub mod client;
pub mod config;
pub mod group;
pub mod rpc;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;
