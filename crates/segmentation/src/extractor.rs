//! Heuristic rule extraction from free-form targeting requests.
//!
//! Each targeting category is a (recognizer, builder) pair: a trigger
//! pattern that decides whether the category applies, and a parameter
//! pattern that pulls the threshold out of the text, falling back to a
//! default when the request names none. Patterns are compiled once at
//! construction and applied in a fixed order, so identical requests
//! always produce identical rule sets.

use regex::Regex;
use tracing::debug;

use crate::condition::{Condition, ConditionValue, Operator, RelativeSpan};
use crate::rules::RuleSet;

const DEFAULT_INACTIVITY_MONTHS: u32 = 6;
const DEFAULT_SPEND_THRESHOLD: u64 = 5000;
const DEFAULT_RECENCY_DAYS: u32 = 30;
const DEFAULT_EMAIL_DOMAIN: &str = "gmail.com";
const FALLBACK_SPEND_THRESHOLD: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Inactivity,
    Spend,
    Recency,
    EmailDomain,
}

struct CompiledCategory {
    kind: Category,
    trigger: Regex,
    params: Vec<Regex>,
}

pub struct RuleExtractor {
    categories: Vec<CompiledCategory>,
}

impl RuleExtractor {
    pub fn new() -> Self {
        let categories = [
            Category::Inactivity,
            Category::Spend,
            Category::Recency,
            Category::EmailDomain,
        ]
        .iter()
        .filter_map(|kind| Self::compile_category(*kind))
        .collect();

        Self { categories }
    }

    fn compile_category(kind: Category) -> Option<CompiledCategory> {
        let (trigger_str, param_strs): (&str, &[&str]) = match kind {
            Category::Inactivity => (
                r"haven['’]t shopped|inactive|not purchased",
                &[r"(\d+)\s*months?"],
            ),
            Category::Spend => (
                r"spent over|spend|purchase",
                &[r"₹\s*(\d+)", r"(\d+)"],
            ),
            Category::Recency => (
                r"\bnew\b|recent|joined",
                &[r"(\d+)\s*days?"],
            ),
            Category::EmailDomain => (
                r"email.*contains|contains.*email",
                &[r"@([a-z0-9.-]+)"],
            ),
        };

        let trigger = Regex::new(trigger_str).ok()?;
        let params = param_strs
            .iter()
            .map(|p| Regex::new(p).ok())
            .collect::<Option<Vec<_>>>()?;

        Some(CompiledCategory {
            kind,
            trigger,
            params,
        })
    }

    /// Turn a free-form targeting request into a rule set. Every
    /// recognized category contributes one condition; a request no
    /// category recognizes falls back to a single spend condition, so
    /// the result is never empty.
    pub fn extract(&self, request_text: &str) -> RuleSet {
        let text = request_text.to_lowercase();

        let mut conditions = Vec::new();
        for category in &self.categories {
            if category.trigger.is_match(&text) {
                debug!("targeting category {:?} matched", category.kind);
                conditions.push(category.build(&text));
            }
        }

        if conditions.is_empty() {
            debug!("no targeting category matched, applying default spend rule");
            conditions.push(Condition {
                field: "totalSpend".to_string(),
                operator: Operator::GreaterThan,
                value: ConditionValue::Number(FALLBACK_SPEND_THRESHOLD.into()),
            });
        }

        RuleSet::all(conditions)
    }
}

impl CompiledCategory {
    /// First parameter pattern with a capture wins; the builder falls
    /// back to the category default when none hit.
    fn build(&self, text: &str) -> Condition {
        let param = self
            .params
            .iter()
            .find_map(|re| re.captures(text).and_then(|c| c.get(1)))
            .map(|m| m.as_str());

        match self.kind {
            Category::Inactivity => Condition {
                field: "lastPurchaseDate".to_string(),
                operator: Operator::LessThan,
                value: ConditionValue::Relative(RelativeSpan::months(parse_or(
                    param,
                    DEFAULT_INACTIVITY_MONTHS,
                ))),
            },
            Category::Spend => Condition {
                field: "totalSpend".to_string(),
                operator: Operator::GreaterThan,
                value: ConditionValue::Number(
                    parse_or(param, DEFAULT_SPEND_THRESHOLD).into(),
                ),
            },
            Category::Recency => Condition {
                field: "createdAt".to_string(),
                operator: Operator::GreaterThan,
                value: ConditionValue::Relative(RelativeSpan::days(parse_or(
                    param,
                    DEFAULT_RECENCY_DAYS,
                ))),
            },
            Category::EmailDomain => Condition {
                field: "email".to_string(),
                operator: Operator::Contains,
                value: ConditionValue::Text(
                    param.unwrap_or(DEFAULT_EMAIL_DOMAIN).to_string(),
                ),
            },
        }
    }
}

fn parse_or<T: std::str::FromStr>(param: Option<&str>, default: T) -> T {
    param.and_then(|p| p.parse().ok()).unwrap_or(default)
}

impl Default for RuleExtractor {
    fn default() -> Self {
        Self::new()
    }
}
