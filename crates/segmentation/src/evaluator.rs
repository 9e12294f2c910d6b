//! Segment evaluation — applies a rule set to a customer population.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pulse_core::types::Customer;

use crate::rules::RuleSet;

/// The customers a rule set selects, in population order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audience {
    #[serde(rename = "audienceSize")]
    pub size: u64,
    pub matched: Vec<Customer>,
}

/// Filter the population through the rule set at `now`. Input order is
/// preserved and the inputs are never mutated, so repeated calls over
/// the same snapshot return the same audience.
pub fn evaluate(rule_set: &RuleSet, customers: &[Customer], now: DateTime<Utc>) -> Audience {
    let matched: Vec<Customer> = customers
        .iter()
        .filter(|customer| rule_set.evaluate(customer, now))
        .cloned()
        .collect();

    Audience {
        size: matched.len() as u64,
        matched,
    }
}
