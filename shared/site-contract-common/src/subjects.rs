//! Site Contract Subject Patterns
//!
//! Subject hierarchy for the contract queue:
//! ```text
//! sites.contracts.queue                     # create_contract / update_contract work items
//! sites.contracts.failed.{message_type}     # Dead letter copies of failed work items
//! ```

/// JetStream stream backing the contract queue
pub const CONTRACT_STREAM_NAME: &str = "SITE_CONTRACTS";

/// Durable consumer name used by the site contract provider
pub const CONTRACT_CONSUMER_NAME: &str = "site-contract-provider";

/// Contract queue subject
pub fn contract_queue() -> &'static str {
    "sites.contracts.queue"
}

/// Dead letter subject for a failed work item under `prefix`
///
/// Example: `sites.contracts.failed.create_contract`
pub fn dead_letter_subject(prefix: &str, message_type: &str) -> String {
    format!("{}.{}", prefix.trim_end_matches('.'), message_type)
}

/// Subscription patterns

/// Pattern for all site contract subjects (stream binding)
pub fn pattern_contracts_all() -> &'static str {
    "sites.contracts.>"
}
