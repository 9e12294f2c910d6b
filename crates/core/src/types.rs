use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A customer record. Field names serialize in camelCase to match the
/// dashboard wire format and the persisted rule vocabulary
/// (`totalSpend`, `lastPurchaseDate`, `createdAt`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub total_spend: f64,
    #[serde(default)]
    pub last_purchase_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single purchase attributed to a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub amount: f64,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// An outreach campaign. Owns its targeting rule text: the text is
/// mutable while the campaign is a draft and frozen once launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// The free-form targeting request the rule text was generated from.
    #[serde(default)]
    pub targeting_request: Option<String>,
    /// Canonical rule set text (versioned JSON envelope).
    #[serde(default)]
    pub rule_text: Option<String>,
    #[serde(default)]
    pub audience_size: u64,
    #[serde(default)]
    pub delivery_stats: DeliveryStats,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStats {
    pub sent: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Active,
    Completed,
}

/// One delivery attempt for one customer. Append-only; the analytics
/// layer only ever reads these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationLog {
    pub id: Uuid,
    #[serde(default)]
    pub message_id: Option<String>,
    pub campaign_id: Uuid,
    pub customer_id: Uuid,
    pub status: DeliveryStatus,
    #[serde(default)]
    pub failure_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
}

// ─── Tests ──────────────────────────────────────────────────────────────
