//! Audience segmentation — typed conditions, ALL/ANY rule sets with a
//! canonical text form, a heuristic free-text rule extractor, and the
//! segment evaluator.

pub mod condition;
pub mod evaluator;
pub mod extractor;
pub mod rules;

pub use condition::{Condition, ConditionValue, Operator, RelativeSpan, TimeUnit};
pub use evaluator::{evaluate, Audience};
pub use extractor::RuleExtractor;
pub use rules::{RuleLogic, RuleSet, RULE_SCHEMA_VERSION};
