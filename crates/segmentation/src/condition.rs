//! Condition types and evaluation logic for audience rules.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use pulse_core::types::Customer;

/// A single filter over one customer attribute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: ConditionValue,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    Before,
    After,
}

/// The right-hand side of a condition. Untagged on the wire: numbers
/// stay JSON numbers, relative time spans are strings of the form
/// `"6 months ago"`, everything else is plain text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ConditionValue {
    Number(serde_json::Number),
    Relative(RelativeSpan),
    Text(String),
}

/// An offset into the past, anchored at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelativeSpan {
    pub amount: u32,
    pub unit: TimeUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Days,
    Months,
}

impl RelativeSpan {
    pub fn days(amount: u32) -> Self {
        Self {
            amount,
            unit: TimeUnit::Days,
        }
    }

    pub fn months(amount: u32) -> Self {
        Self {
            amount,
            unit: TimeUnit::Months,
        }
    }

    /// Parse `"<n> days ago"` / `"<n> months ago"`; singular units are
    /// accepted, the emitter always writes the plural form.
    pub fn parse(text: &str) -> Option<Self> {
        let mut tokens = text.split_whitespace();
        let amount: u32 = tokens.next()?.parse().ok()?;
        let unit = match tokens.next()?.to_ascii_lowercase().as_str() {
            "day" | "days" => TimeUnit::Days,
            "month" | "months" => TimeUnit::Months,
            _ => return None,
        };
        if !tokens.next()?.eq_ignore_ascii_case("ago") || tokens.next().is_some() {
            return None;
        }
        Some(Self { amount, unit })
    }

    /// Resolve to a concrete instant: `now` minus the span. Day spans
    /// subtract exact days, month spans subtract calendar months.
    pub fn resolve(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.unit {
            TimeUnit::Days => now.checked_sub_signed(Duration::days(i64::from(self.amount))),
            TimeUnit::Months => now.checked_sub_months(Months::new(self.amount)),
        }
    }
}

impl fmt::Display for RelativeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            TimeUnit::Days => "days",
            TimeUnit::Months => "months",
        };
        write!(f, "{} {} ago", self.amount, unit)
    }
}

impl Serialize for RelativeSpan {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RelativeSpan {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid time span: {text}")))
    }
}

/// A customer attribute resolved to its runtime kind.
enum FieldValue<'a> {
    Text(&'a str),
    Number(f64),
    Timestamp(DateTime<Utc>),
}

fn resolve_field<'a>(customer: &'a Customer, field: &str) -> Option<FieldValue<'a>> {
    match field {
        "name" => Some(FieldValue::Text(&customer.name)),
        "email" => Some(FieldValue::Text(&customer.email)),
        "phone" => Some(FieldValue::Text(&customer.phone)),
        "totalSpend" => Some(FieldValue::Number(customer.total_spend)),
        "lastPurchaseDate" => customer.last_purchase_date.map(FieldValue::Timestamp),
        "createdAt" => Some(FieldValue::Timestamp(customer.created_at)),
        _ => None,
    }
}

/// Resolve a condition value to an instant. Relative spans anchor at
/// `now`; text values accept RFC 3339 or `YYYY-MM-DD`.
fn resolve_instant(value: &ConditionValue, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match value {
        ConditionValue::Relative(span) => span.resolve(now),
        ConditionValue::Text(text) => parse_instant(text),
        ConditionValue::Number(_) => None,
    }
}

fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

#[allow(clippy::unnecessary_map_or)]
impl Condition {
    /// Evaluate against one customer at the given instant. Unknown
    /// fields, absent optionals and mismatched kinds never match; no
    /// operator can fail.
    pub fn evaluate(&self, customer: &Customer, now: DateTime<Utc>) -> bool {
        let Some(actual) = resolve_field(customer, &self.field) else {
            return false;
        };
        match self.operator {
            Operator::Equals => self.matches_exact(&actual, now),
            Operator::NotEquals => !self.matches_exact(&actual, now),
            Operator::GreaterThan => self
                .ordered_cmp(&actual, now)
                .map_or(false, |o| o == Ordering::Greater),
            Operator::LessThan => self
                .ordered_cmp(&actual, now)
                .map_or(false, |o| o == Ordering::Less),
            Operator::Contains => match (&actual, &self.value) {
                (FieldValue::Text(a), ConditionValue::Text(e)) => {
                    a.to_lowercase().contains(&e.to_lowercase())
                }
                _ => false,
            },
            Operator::Before => match actual {
                FieldValue::Timestamp(ts) => {
                    resolve_instant(&self.value, now).map_or(false, |inst| ts < inst)
                }
                _ => false,
            },
            Operator::After => match actual {
                FieldValue::Timestamp(ts) => {
                    resolve_instant(&self.value, now).map_or(false, |inst| ts > inst)
                }
                _ => false,
            },
        }
    }

    fn matches_exact(&self, actual: &FieldValue<'_>, now: DateTime<Utc>) -> bool {
        match (actual, &self.value) {
            (FieldValue::Number(a), ConditionValue::Number(e)) => {
                e.as_f64().map_or(false, |e| *a == e)
            }
            (FieldValue::Text(a), ConditionValue::Text(e)) => *a == e.as_str(),
            (FieldValue::Timestamp(ts), value) => {
                resolve_instant(value, now).map_or(false, |inst| *ts == inst)
            }
            _ => false,
        }
    }

    fn ordered_cmp(&self, actual: &FieldValue<'_>, now: DateTime<Utc>) -> Option<Ordering> {
        match (actual, &self.value) {
            (FieldValue::Number(a), ConditionValue::Number(e)) => a.partial_cmp(&e.as_f64()?),
            (FieldValue::Timestamp(ts), value) => {
                let instant = resolve_instant(value, now)?;
                Some(ts.cmp(&instant))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn make_customer(total_spend: f64) -> Customer {
        let now = Utc::now();
        Customer {
            id: Uuid::new_v4(),
            name: "Priya Sharma".to_string(),
            email: "priya@gmail.com".to_string(),
            phone: "+91-9000000001".to_string(),
            profile_image: None,
            total_spend,
            last_purchase_date: Some(now - Duration::days(90)),
            created_at: now - Duration::days(365),
            updated_at: now,
        }
    }

    fn condition(field: &str, operator: Operator, value: ConditionValue) -> Condition {
        Condition {
            field: field.to_string(),
            operator,
            value,
        }
    }

    #[test]
    fn test_unknown_field_never_matches() {
        let customer = make_customer(500.0);
        let now = Utc::now();
        let operators = [
            Operator::Equals,
            Operator::NotEquals,
            Operator::GreaterThan,
            Operator::LessThan,
            Operator::Contains,
            Operator::Before,
            Operator::After,
        ];
        for op in operators {
            let cond = condition("loyaltyTier", op, ConditionValue::Text("gold".to_string()));
            assert!(!cond.evaluate(&customer, now), "{op:?} matched an unknown field");
        }
    }

    #[test]
    fn test_absent_optional_field_never_matches() {
        let mut customer = make_customer(500.0);
        customer.last_purchase_date = None;
        let cond = condition(
            "lastPurchaseDate",
            Operator::LessThan,
            ConditionValue::Relative(RelativeSpan::months(6)),
        );
        assert!(!cond.evaluate(&customer, Utc::now()));
    }

    #[test]
    fn test_numeric_comparisons() {
        let customer = make_customer(500.0);
        let now = Utc::now();
        let gt = condition(
            "totalSpend",
            Operator::GreaterThan,
            ConditionValue::Number(100u64.into()),
        );
        let lt = condition(
            "totalSpend",
            Operator::LessThan,
            ConditionValue::Number(100u64.into()),
        );
        let eq = condition(
            "totalSpend",
            Operator::Equals,
            ConditionValue::Number(500u64.into()),
        );
        assert!(gt.evaluate(&customer, now));
        assert!(!lt.evaluate(&customer, now));
        assert!(eq.evaluate(&customer, now));
    }

    #[test]
    fn test_kind_mismatch_is_false() {
        let customer = make_customer(500.0);
        let now = Utc::now();
        let cond = condition(
            "totalSpend",
            Operator::GreaterThan,
            ConditionValue::Text("lots".to_string()),
        );
        assert!(!cond.evaluate(&customer, now));

        let cond = condition(
            "name",
            Operator::Contains,
            ConditionValue::Number(42u64.into()),
        );
        assert!(!cond.evaluate(&customer, now));
    }

    #[test]
    fn test_not_equals_on_resolved_field() {
        let customer = make_customer(500.0);
        let now = Utc::now();
        let cond = condition(
            "email",
            Operator::NotEquals,
            ConditionValue::Text("other@gmail.com".to_string()),
        );
        assert!(cond.evaluate(&customer, now));

        // Kind mismatch counts as "not equal" once the field resolved.
        let cond = condition(
            "email",
            Operator::NotEquals,
            ConditionValue::Number(1u64.into()),
        );
        assert!(cond.evaluate(&customer, now));
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let customer = make_customer(500.0);
        let now = Utc::now();
        let cond = condition(
            "email",
            Operator::Contains,
            ConditionValue::Text("GMAIL".to_string()),
        );
        assert!(cond.evaluate(&customer, now));
    }

    #[test]
    fn test_relative_span_against_timestamp() {
        let customer = make_customer(500.0);
        let now = Utc::now();
        // Last purchase 90 days back: before "2 months ago", after "6 months ago".
        let stale = condition(
            "lastPurchaseDate",
            Operator::LessThan,
            ConditionValue::Relative(RelativeSpan::months(2)),
        );
        let fresh = condition(
            "lastPurchaseDate",
            Operator::GreaterThan,
            ConditionValue::Relative(RelativeSpan::months(6)),
        );
        assert!(stale.evaluate(&customer, now));
        assert!(fresh.evaluate(&customer, now));
    }

    #[test]
    fn test_before_after_with_absolute_date() {
        let customer = make_customer(500.0);
        let now = Utc::now();
        let before = condition(
            "createdAt",
            Operator::Before,
            ConditionValue::Text("2099-01-01".to_string()),
        );
        let after = condition(
            "createdAt",
            Operator::After,
            ConditionValue::Text("2000-01-01".to_string()),
        );
        let garbage = condition(
            "createdAt",
            Operator::Before,
            ConditionValue::Text("not a date".to_string()),
        );
        assert!(before.evaluate(&customer, now));
        assert!(after.evaluate(&customer, now));
        assert!(!garbage.evaluate(&customer, now));
    }

    #[test]
    fn test_relative_span_parse_and_display() {
        assert_eq!(RelativeSpan::parse("3 months ago"), Some(RelativeSpan::months(3)));
        assert_eq!(RelativeSpan::parse("1 month ago"), Some(RelativeSpan::months(1)));
        assert_eq!(RelativeSpan::parse("30 days ago"), Some(RelativeSpan::days(30)));
        assert_eq!(RelativeSpan::parse("ten days ago"), None);
        assert_eq!(RelativeSpan::parse("3 years ago"), None);
        assert_eq!(RelativeSpan::parse("3 months"), None);
        assert_eq!(RelativeSpan::months(1).to_string(), "1 months ago");
    }

    #[test]
    fn test_condition_value_wire_forms() {
        let number: ConditionValue = serde_json::from_str("5000").unwrap();
        assert_eq!(number, ConditionValue::Number(5000u64.into()));

        let relative: ConditionValue = serde_json::from_str("\"6 months ago\"").unwrap();
        assert_eq!(relative, ConditionValue::Relative(RelativeSpan::months(6)));

        let text: ConditionValue = serde_json::from_str("\"gmail.com\"").unwrap();
        assert_eq!(text, ConditionValue::Text("gmail.com".to_string()));

        assert_eq!(
            serde_json::to_string(&ConditionValue::Relative(RelativeSpan::days(30))).unwrap(),
            "\"30 days ago\""
        );
    }
}
