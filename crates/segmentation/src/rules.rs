//! Rule sets — ordered conditions joined by an ALL/ANY combinator, with
//! a canonical versioned text form for persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pulse_core::types::Customer;
use pulse_core::{CrmError, CrmResult};

use crate::condition::Condition;

/// Schema version written into canonical rule text. Bumped on any
/// incompatible change to the envelope.
pub const RULE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleSet {
    pub conditions: Vec<Condition>,
    pub logic: RuleLogic,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RuleLogic {
    #[serde(rename = "ALL", alias = "AND")]
    All,
    #[serde(rename = "ANY", alias = "OR")]
    Any,
}

/// Wire envelope for canonical text. Rule text saved before the
/// envelope was versioned has no `version` field and reads as v1.
#[derive(Serialize, Deserialize)]
struct RuleEnvelope {
    #[serde(default = "default_version")]
    version: u32,
    conditions: Vec<Condition>,
    logic: RuleLogic,
}

fn default_version() -> u32 {
    1
}

impl RuleSet {
    pub fn all(conditions: Vec<Condition>) -> Self {
        Self {
            conditions,
            logic: RuleLogic::All,
        }
    }

    pub fn any(conditions: Vec<Condition>) -> Self {
        Self {
            conditions,
            logic: RuleLogic::Any,
        }
    }

    /// True when the customer satisfies the rule set at `now`. An empty
    /// rule set matches nothing.
    pub fn evaluate(&self, customer: &Customer, now: DateTime<Utc>) -> bool {
        if self.conditions.is_empty() {
            return false;
        }
        match self.logic {
            RuleLogic::All => self.conditions.iter().all(|c| c.evaluate(customer, now)),
            RuleLogic::Any => self.conditions.iter().any(|c| c.evaluate(customer, now)),
        }
    }

    /// Render the canonical text form: a pretty-printed, versioned JSON
    /// envelope. This is the only persisted rule artifact.
    pub fn to_canonical(&self) -> CrmResult<String> {
        let envelope = RuleEnvelope {
            version: RULE_SCHEMA_VERSION,
            conditions: self.conditions.clone(),
            logic: self.logic,
        };
        Ok(serde_json::to_string_pretty(&envelope)?)
    }

    /// Parse canonical text back into a rule set. Accepts unversioned
    /// envelopes and the legacy `"AND"` / `"OR"` logic labels.
    pub fn from_canonical(text: &str) -> CrmResult<Self> {
        let envelope: RuleEnvelope =
            serde_json::from_str(text).map_err(|e| CrmError::RuleParse(e.to_string()))?;
        if envelope.version > RULE_SCHEMA_VERSION {
            return Err(CrmError::RuleParse(format!(
                "unsupported rule schema version {}",
                envelope.version
            )));
        }
        Ok(Self {
            conditions: envelope.conditions,
            logic: envelope.logic,
        })
    }
}
