//! Consortium - governance client for a replicated ledger service
//!
//! Drives the member-governance lifecycle of a service:
//! - Proposals and majority voting (quorum = floor(N/2) + 1)
//! - Waiting for transactions to be globally committed
//! - Verifying node and service status in the store
//! - Composite operations (trust/retire nodes, open the network, rekey)
//!
//! The service itself sits behind the `ServiceClient` trait.

pub mod clock;
pub mod credentials;
pub mod governance;
pub mod service;
