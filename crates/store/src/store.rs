//! In-memory CRM store backed by DashMap.
//!
//! Production: replace with PostgreSQL (sqlx) or similar ACID store.
//! This provides the same API surface for development and testing.

use chrono::{Duration, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use pulse_core::types::{
    Campaign, CampaignStatus, CommunicationLog, Customer, DeliveryStats, DeliveryStatus, Order,
};
use pulse_core::{CrmError, CrmResult};
use pulse_segmentation::{evaluate, RuleExtractor, RuleSet};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub targeting_request: Option<String>,
    #[serde(default)]
    pub rule_text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCampaignRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub targeting_request: Option<String>,
    #[serde(default)]
    pub rule_text: Option<String>,
}

/// Thread-safe in-memory store for customers, orders, campaigns and
/// delivery logs. Listings come back in a fixed order (creation time,
/// then id) so downstream tie-breaks are stable across calls.
pub struct CrmStore {
    customers: DashMap<Uuid, Customer>,
    orders: DashMap<Uuid, Order>,
    campaigns: DashMap<Uuid, Campaign>,
    logs: DashMap<Uuid, CommunicationLog>,
    extractor: RuleExtractor,
}

impl CrmStore {
    pub fn new() -> Self {
        info!("CRM store initialized (in-memory, development mode)");
        Self {
            customers: DashMap::new(),
            orders: DashMap::new(),
            campaigns: DashMap::new(),
            logs: DashMap::new(),
            extractor: RuleExtractor::new(),
        }
    }

    // ─── Customers ─────────────────────────────────────────────────────────

    pub fn add_customer(&self, customer: Customer) {
        self.customers.insert(customer.id, customer);
    }

    pub fn list_customers(&self) -> Vec<Customer> {
        let mut customers: Vec<Customer> =
            self.customers.iter().map(|r| r.value().clone()).collect();
        customers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        customers
    }

    // ─── Orders ────────────────────────────────────────────────────────────

    pub fn add_order(&self, order: Order) {
        self.orders.insert(order.id, order);
    }

    pub fn list_orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.orders.iter().map(|r| r.value().clone()).collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        orders
    }

    // ─── Delivery Logs ─────────────────────────────────────────────────────

    pub fn add_log(&self, log: CommunicationLog) {
        self.logs.insert(log.id, log);
    }

    pub fn list_logs(&self) -> Vec<CommunicationLog> {
        let mut logs: Vec<CommunicationLog> = self.logs.iter().map(|r| r.value().clone()).collect();
        logs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        logs
    }

    // ─── Campaigns ─────────────────────────────────────────────────────────

    pub fn list_campaigns(&self) -> Vec<Campaign> {
        let mut campaigns: Vec<Campaign> =
            self.campaigns.iter().map(|r| r.value().clone()).collect();
        campaigns.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        campaigns
    }

    pub fn get_campaign(&self, id: Uuid) -> Option<Campaign> {
        self.campaigns.get(&id).map(|r| r.value().clone())
    }

    /// Create a campaign. An explicit rule text wins over a targeting
    /// request; a targeting request alone runs through the extractor.
    /// The audience size is evaluated against the current customer
    /// population and persisted with the campaign.
    pub fn create_campaign(&self, req: CreateCampaignRequest) -> CrmResult<Campaign> {
        let rule_text = self.resolve_rule_text(&req.targeting_request, &req.rule_text)?;
        let audience_size = self.audience_size_for(rule_text.as_deref())?;

        let now = Utc::now();
        let campaign = Campaign {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            targeting_request: req.targeting_request,
            rule_text,
            audience_size,
            delivery_stats: DeliveryStats::default(),
            status: CampaignStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        let id = campaign.id;
        self.campaigns.insert(id, campaign.clone());
        info!("Created campaign {} ({}), audience {}", campaign.name, id, audience_size);
        Ok(campaign)
    }

    /// Update a campaign. Name and description can change at any time;
    /// targeting fields only while the campaign is still a draft.
    pub fn update_campaign(
        &self,
        id: Uuid,
        req: UpdateCampaignRequest,
    ) -> CrmResult<Option<Campaign>> {
        let Some(mut entry) = self.campaigns.get_mut(&id) else {
            return Ok(None);
        };
        let campaign = entry.value_mut();

        let retargets = req.targeting_request.is_some() || req.rule_text.is_some();
        if retargets && campaign.status != CampaignStatus::Draft {
            return Err(CrmError::Validation(
                "rule text is frozen once a campaign launches".to_string(),
            ));
        }

        if let Some(name) = req.name {
            campaign.name = name;
        }
        if let Some(description) = req.description {
            campaign.description = description;
        }
        if retargets {
            let targeting_request =
                req.targeting_request.or_else(|| campaign.targeting_request.clone());
            let rule_text = self.resolve_rule_text(&targeting_request, &req.rule_text)?;
            campaign.audience_size = self.audience_size_for(rule_text.as_deref())?;
            campaign.targeting_request = targeting_request;
            campaign.rule_text = rule_text;
        }
        campaign.updated_at = Utc::now();
        Ok(Some(campaign.clone()))
    }

    pub fn delete_campaign(&self, id: Uuid) -> bool {
        self.campaigns.remove(&id).is_some()
    }

    /// Draft → Active. Any other starting state is rejected.
    pub fn launch_campaign(&self, id: Uuid) -> CrmResult<Option<Campaign>> {
        self.transition(id, CampaignStatus::Draft, CampaignStatus::Active, "launch")
    }

    /// Active → Completed. Any other starting state is rejected.
    pub fn complete_campaign(&self, id: Uuid) -> CrmResult<Option<Campaign>> {
        self.transition(id, CampaignStatus::Active, CampaignStatus::Completed, "complete")
    }

    fn transition(
        &self,
        id: Uuid,
        from: CampaignStatus,
        to: CampaignStatus,
        action: &str,
    ) -> CrmResult<Option<Campaign>> {
        let Some(mut entry) = self.campaigns.get_mut(&id) else {
            return Ok(None);
        };
        let campaign = entry.value_mut();
        if campaign.status != from {
            return Err(CrmError::Validation(format!(
                "cannot {} campaign {} from {:?} state",
                action, id, campaign.status
            )));
        }
        campaign.status = to;
        campaign.updated_at = Utc::now();
        info!("Campaign {} is now {:?}", id, to);
        Ok(Some(campaign.clone()))
    }

    fn resolve_rule_text(
        &self,
        targeting_request: &Option<String>,
        rule_text: &Option<String>,
    ) -> CrmResult<Option<String>> {
        if let Some(text) = rule_text {
            // Round-trip through the parser so malformed text is
            // rejected before it is persisted.
            RuleSet::from_canonical(text)?;
            return Ok(Some(text.clone()));
        }
        match targeting_request {
            Some(request) => Ok(Some(self.extractor.extract(request).to_canonical()?)),
            None => Ok(None),
        }
    }

    fn audience_size_for(&self, rule_text: Option<&str>) -> CrmResult<u64> {
        let Some(text) = rule_text else {
            return Ok(0);
        };
        let rules = RuleSet::from_canonical(text)?;
        let customers = self.list_customers();
        Ok(evaluate(&rules, &customers, Utc::now()).size)
    }

    // ─── Demo Data ─────────────────────────────────────────────────────────

    /// Populate the store with a small deterministic CRM data set:
    /// customers with varied spend and recency, orders across the last
    /// two months, and campaigns with delivery logs over their
    /// evaluated audiences.
    pub fn seed_demo_data(&self) -> CrmResult<()> {
        let now = Utc::now();

        let customers = vec![
            ("Asha Rao", "asha.rao@gmail.com", "+91-9810000001", 18500.0, Some(12), 420),
            ("Binod Patel", "binod.patel@yahoo.com", "+91-9810000002", 7200.0, Some(45), 380),
            ("Chitra Iyer", "chitra.iyer@gmail.com", "+91-9810000003", 3100.0, Some(210), 400),
            ("Devang Shah", "devang.shah@outlook.com", "+91-9810000004", 950.0, None, 350),
            ("Esha Kapoor", "esha.kapoor@gmail.com", "+91-9810000005", 12750.0, Some(8), 300),
            ("Farhan Ali", "farhan.ali@gmail.com", "+91-9810000006", 5400.0, Some(95), 280),
            ("Gauri Nair", "gauri.nair@yahoo.com", "+91-9810000007", 22000.0, Some(3), 500),
            ("Harish Kumar", "harish.kumar@gmail.com", "+91-9810000008", 1600.0, Some(240), 460),
            ("Ishita Sen", "ishita.sen@outlook.com", "+91-9810000009", 8900.0, Some(20), 25),
            ("Jatin Mehta", "jatin.mehta@gmail.com", "+91-9810000010", 450.0, Some(130), 140),
            ("Kavya Reddy", "kavya.reddy@gmail.com", "+91-9810000011", 15300.0, Some(6), 18),
            ("Lakshmi Pillai", "lakshmi.pillai@yahoo.com", "+91-9810000012", 2800.0, Some(75), 200),
        ];

        let mut customer_ids = Vec::new();
        for (name, email, phone, total_spend, purchase_days_ago, created_days_ago) in customers {
            let customer = Customer {
                id: Uuid::new_v4(),
                name: name.to_string(),
                email: email.to_string(),
                phone: phone.to_string(),
                profile_image: None,
                total_spend,
                last_purchase_date: purchase_days_ago.map(|d| now - Duration::days(d)),
                created_at: now - Duration::days(created_days_ago),
                updated_at: now,
            };
            customer_ids.push(customer.id);
            self.add_customer(customer);
        }

        // (customer index, amount, days ago) — spread over the last two
        // months so revenue growth has both periods populated.
        let orders = vec![
            (0, 2500.0, 5),
            (0, 1800.0, 40),
            (1, 1200.0, 45),
            (2, 310.0, 210),
            (4, 3200.0, 12),
            (5, 900.0, 95),
            (6, 5400.0, 3),
            (6, 2100.0, 38),
            (8, 1450.0, 20),
            (9, 450.0, 130),
            (10, 2950.0, 6),
            (11, 640.0, 75),
        ];

        for (idx, amount, days_ago) in orders {
            self.add_order(Order {
                id: Uuid::new_v4(),
                customer_id: customer_ids[idx],
                amount,
                date: now - Duration::days(days_ago),
                created_at: now - Duration::days(days_ago),
            });
        }

        let campaigns = vec![
            (
                "Diwali Mega Sale",
                "Festive offers for high spenders",
                "customers who spent over 10000",
                CampaignStatus::Active,
            ),
            (
                "Winback Lapsed Buyers",
                "Re-engage customers who stopped purchasing",
                "customers who haven't shopped in 6 months",
                CampaignStatus::Active,
            ),
            (
                "New Customer Welcome",
                "Onboarding offers for recent signups",
                "customers who joined in the last 30 days",
                CampaignStatus::Active,
            ),
            (
                "Gmail Exclusive Preview",
                "Early access for the gmail audience",
                "customers whose email contains @gmail.com",
                CampaignStatus::Draft,
            ),
        ];

        for (offset, (name, description, request, status)) in campaigns.into_iter().enumerate() {
            let created = self.create_campaign(CreateCampaignRequest {
                name: name.to_string(),
                description: description.to_string(),
                targeting_request: Some(request.to_string()),
                rule_text: None,
            })?;

            if status == CampaignStatus::Draft {
                continue;
            }
            self.launch_campaign(created.id)?;

            // One delivery attempt per audience member, with a
            // deterministic sprinkling of failures.
            let Some(rule_text) = created.rule_text.as_deref() else {
                continue;
            };
            let rules = RuleSet::from_canonical(rule_text)?;
            let audience = evaluate(&rules, &self.list_customers(), now);
            let mut stats = DeliveryStats::default();
            for (i, customer) in audience.matched.iter().enumerate() {
                let failed = i % 8 == 5;
                if failed {
                    stats.failed += 1;
                } else {
                    stats.sent += 1;
                }
                self.add_log(CommunicationLog {
                    id: Uuid::new_v4(),
                    message_id: Some(format!("msg-{}", Uuid::new_v4())),
                    campaign_id: created.id,
                    customer_id: customer.id,
                    status: if failed { DeliveryStatus::Failed } else { DeliveryStatus::Sent },
                    failure_reason: failed.then(|| "provider rejected recipient".to_string()),
                    timestamp: now - Duration::days(2) + Duration::minutes(offset as i64),
                });
            }
            if let Some(mut entry) = self.campaigns.get_mut(&created.id) {
                entry.value_mut().delivery_stats = stats;
            }
        }

        info!(
            "Seeded demo data: {} customers, {} orders, {} campaigns, {} delivery logs",
            self.customers.len(),
            self.orders.len(),
            self.campaigns.len(),
            self.logs.len()
        );
        Ok(())
    }
}

impl Default for CrmStore {
    fn default() -> Self {
        Self::new()
    }
}
