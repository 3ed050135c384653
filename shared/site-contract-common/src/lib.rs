//! Site contract queue message contracts.
//!
//! Two message shapes travel over the contract queue:
//! - `create_contract`: deploy a site contract through the factory and link it to a site
//! - `update_contract`: record a CID on an already deployed site contract
//!
//! The worker that consumes these lives in `providers/site-contract`; it also
//! produces `update_contract` follow-ups for itself.

pub mod message;
pub mod subjects;

pub use message::{ContractMessage, ContractMessageType};
pub use subjects::*;
