//! Business metrics aggregation over CRM snapshots.
//!
//! Every quantity here is a pure function of the input collections and
//! the evaluation instant. Rates are percentages rounded half away from
//! zero; any quantity whose denominator is empty is 0, and "top"
//! placeholders read `"None"` when there is nothing to rank.

use std::collections::HashMap;

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pulse_core::types::{Campaign, CommunicationLog, Customer, DeliveryStatus, Order};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub campaign_performance: CampaignPerformance,
    pub customer_insights: CustomerInsights,
    pub revenue_metrics: RevenueMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignPerformance {
    pub total_campaigns: u64,
    /// Percentage of all delivery log entries with status `sent`.
    pub average_success_rate: i64,
    pub total_messages_sent: u64,
    /// Name of the campaign with the best per-campaign send rate.
    /// Ties, and campaigns with no logs at all, resolve to the first
    /// campaign in snapshot order.
    pub top_performing_campaign: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInsights {
    pub total_customers: u64,
    pub average_spend: i64,
    pub active_customers: u64,
    pub new_customers_this_month: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueMetrics {
    pub total_revenue: f64,
    /// Order revenue of the last month against the month before it,
    /// as a rounded percentage change. 0 when the earlier month had
    /// no revenue.
    pub monthly_growth: i64,
    pub average_order_value: i64,
    pub top_spending_customer: String,
}

/// Counts shown on the dashboard landing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_customers: u64,
    pub total_orders: u64,
    pub total_campaigns: u64,
    pub total_revenue: f64,
}

/// Aggregate a full snapshot into dashboard analytics at `now`.
pub fn compute(
    customers: &[Customer],
    orders: &[Order],
    campaigns: &[Campaign],
    logs: &[CommunicationLog],
    now: DateTime<Utc>,
) -> Analytics {
    Analytics {
        campaign_performance: campaign_performance(campaigns, logs),
        customer_insights: customer_insights(customers, now),
        revenue_metrics: revenue_metrics(customers, orders, now),
    }
}

pub fn dashboard_stats(
    customers: &[Customer],
    orders: &[Order],
    campaigns: &[Campaign],
) -> DashboardStats {
    DashboardStats {
        total_customers: customers.len() as u64,
        total_orders: orders.len() as u64,
        total_campaigns: campaigns.len() as u64,
        total_revenue: orders.iter().map(|o| o.amount).sum(),
    }
}

fn campaign_performance(campaigns: &[Campaign], logs: &[CommunicationLog]) -> CampaignPerformance {
    let total_sent = logs
        .iter()
        .filter(|l| l.status == DeliveryStatus::Sent)
        .count() as u64;

    let average_success_rate = if logs.is_empty() {
        0
    } else {
        round_percent(total_sent as f64 / logs.len() as f64)
    };

    // (total, sent) per campaign, then ranked in snapshot order with a
    // strictly-greater comparison so the first campaign wins ties.
    let mut delivery_counts: HashMap<Uuid, (u64, u64)> = HashMap::new();
    for log in logs {
        let entry = delivery_counts.entry(log.campaign_id).or_default();
        entry.0 += 1;
        if log.status == DeliveryStatus::Sent {
            entry.1 += 1;
        }
    }

    let mut top: Option<(&Campaign, f64)> = None;
    for campaign in campaigns {
        let (total, sent) = delivery_counts.get(&campaign.id).copied().unwrap_or((0, 0));
        let rate = if total > 0 {
            sent as f64 / total as f64
        } else {
            0.0
        };
        match top {
            Some((_, best)) if rate <= best => {}
            _ => top = Some((campaign, rate)),
        }
    }

    CampaignPerformance {
        total_campaigns: campaigns.len() as u64,
        average_success_rate,
        total_messages_sent: total_sent,
        top_performing_campaign: top
            .map_or_else(|| "None".to_string(), |(c, _)| c.name.clone()),
    }
}

fn customer_insights(customers: &[Customer], now: DateTime<Utc>) -> CustomerInsights {
    let spend_sum: f64 = customers.iter().map(|c| c.total_spend).sum();
    let average_spend = if customers.is_empty() {
        0
    } else {
        (spend_sum / customers.len() as f64).round() as i64
    };

    let active_customers = customers
        .iter()
        .filter(|c| c.last_purchase_date.is_some())
        .count() as u64;

    let new_customers_this_month = match now.checked_sub_months(Months::new(1)) {
        Some(cutoff) => customers.iter().filter(|c| c.created_at > cutoff).count() as u64,
        None => 0,
    };

    CustomerInsights {
        total_customers: customers.len() as u64,
        average_spend,
        active_customers,
        new_customers_this_month,
    }
}

fn revenue_metrics(customers: &[Customer], orders: &[Order], now: DateTime<Utc>) -> RevenueMetrics {
    let total_revenue: f64 = orders.iter().map(|o| o.amount).sum();
    let average_order_value = if orders.is_empty() {
        0
    } else {
        (total_revenue / orders.len() as f64).round() as i64
    };

    let mut top: Option<&Customer> = None;
    for customer in customers {
        match top {
            Some(best) if customer.total_spend <= best.total_spend => {}
            _ => top = Some(customer),
        }
    }

    RevenueMetrics {
        total_revenue,
        monthly_growth: monthly_growth(orders, now),
        average_order_value,
        top_spending_customer: top.map_or_else(|| "None".to_string(), |c| c.name.clone()),
    }
}

fn monthly_growth(orders: &[Order], now: DateTime<Utc>) -> i64 {
    let (Some(one_month_ago), Some(two_months_ago)) = (
        now.checked_sub_months(Months::new(1)),
        now.checked_sub_months(Months::new(2)),
    ) else {
        return 0;
    };

    let current: f64 = orders
        .iter()
        .filter(|o| o.date > one_month_ago)
        .map(|o| o.amount)
        .sum();
    let previous: f64 = orders
        .iter()
        .filter(|o| o.date > two_months_ago && o.date <= one_month_ago)
        .map(|o| o.amount)
        .sum();

    if previous == 0.0 {
        return 0;
    }
    (100.0 * (current - previous) / previous).round() as i64
}

fn round_percent(ratio: f64) -> i64 {
    (ratio * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_customer(name: &str, total_spend: f64, created_days_ago: i64) -> Customer {
        let now = Utc::now();
        Customer {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{name}@example.com"),
            phone: "+91-9000000004".to_string(),
            profile_image: None,
            total_spend,
            last_purchase_date: Some(now - Duration::days(7)),
            created_at: now - Duration::days(created_days_ago),
            updated_at: now,
        }
    }

    fn make_order(amount: f64, days_ago: i64) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            amount,
            date: now - Duration::days(days_ago),
            created_at: now - Duration::days(days_ago),
        }
    }

    fn make_campaign(name: &str) -> Campaign {
        let now = Utc::now();
        Campaign {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            targeting_request: None,
            rule_text: None,
            audience_size: 0,
            delivery_stats: Default::default(),
            status: pulse_core::types::CampaignStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    fn make_log(campaign_id: Uuid, status: DeliveryStatus) -> CommunicationLog {
        CommunicationLog {
            id: Uuid::new_v4(),
            message_id: None,
            campaign_id,
            customer_id: Uuid::new_v4(),
            status,
            failure_reason: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_empty_snapshot_yields_zeroes() {
        let analytics = compute(&[], &[], &[], &[], Utc::now());

        assert_eq!(analytics.campaign_performance.total_campaigns, 0);
        assert_eq!(analytics.campaign_performance.average_success_rate, 0);
        assert_eq!(analytics.campaign_performance.top_performing_campaign, "None");
        assert_eq!(analytics.customer_insights.average_spend, 0);
        assert_eq!(analytics.revenue_metrics.total_revenue, 0.0);
        assert_eq!(analytics.revenue_metrics.average_order_value, 0);
        assert_eq!(analytics.revenue_metrics.monthly_growth, 0);
        assert_eq!(analytics.revenue_metrics.top_spending_customer, "None");
    }

    #[test]
    fn test_success_rate_rounds_half_away() {
        let campaign = make_campaign("Diwali Sale");
        let logs = vec![
            make_log(campaign.id, DeliveryStatus::Sent),
            make_log(campaign.id, DeliveryStatus::Sent),
            make_log(campaign.id, DeliveryStatus::Failed),
        ];
        let perf = campaign_performance(&[campaign], &logs);

        // 2/3 = 66.67% rounds to 67.
        assert_eq!(perf.average_success_rate, 67);
        assert_eq!(perf.total_messages_sent, 2);
    }

    #[test]
    fn test_sent_excludes_other_statuses() {
        let campaign = make_campaign("Winback");
        let logs = vec![
            make_log(campaign.id, DeliveryStatus::Sent),
            make_log(campaign.id, DeliveryStatus::Delivered),
            make_log(campaign.id, DeliveryStatus::Pending),
            make_log(campaign.id, DeliveryStatus::Failed),
        ];
        let perf = campaign_performance(&[campaign], &logs);

        assert_eq!(perf.total_messages_sent, 1);
        assert_eq!(perf.average_success_rate, 25);
    }

    #[test]
    fn test_top_campaign_ranked_by_send_rate() {
        let low = make_campaign("Low");
        let high = make_campaign("High");
        let logs = vec![
            make_log(low.id, DeliveryStatus::Sent),
            make_log(low.id, DeliveryStatus::Failed),
            make_log(high.id, DeliveryStatus::Sent),
            make_log(high.id, DeliveryStatus::Sent),
        ];
        let perf = campaign_performance(&[low, high], &logs);

        assert_eq!(perf.top_performing_campaign, "High");
    }

    #[test]
    fn test_top_campaign_tie_goes_to_first() {
        let first = make_campaign("First");
        let second = make_campaign("Second");
        let logs = vec![
            make_log(first.id, DeliveryStatus::Sent),
            make_log(second.id, DeliveryStatus::Sent),
        ];
        let perf = campaign_performance(&[first, second], &logs);

        assert_eq!(perf.top_performing_campaign, "First");
    }

    #[test]
    fn test_top_campaign_without_any_logs() {
        let first = make_campaign("Launch Teaser");
        let second = make_campaign("Follow Up");
        let perf = campaign_performance(&[first, second], &[]);

        assert_eq!(perf.top_performing_campaign, "Launch Teaser");
        assert_eq!(perf.average_success_rate, 0);
    }

    #[test]
    fn test_average_spend_rounding() {
        let customers = vec![
            make_customer("a", 100.0, 400),
            make_customer("b", 101.0, 400),
        ];
        let insights = customer_insights(&customers, Utc::now());

        // 100.5 rounds away from zero to 101.
        assert_eq!(insights.average_spend, 101);
        assert_eq!(insights.total_customers, 2);
    }

    #[test]
    fn test_active_and_new_customers() {
        let mut dormant = make_customer("dormant", 50.0, 400);
        dormant.last_purchase_date = None;
        let customers = vec![
            make_customer("fresh", 500.0, 10),
            make_customer("old", 900.0, 400),
            dormant,
        ];
        let insights = customer_insights(&customers, Utc::now());

        assert_eq!(insights.active_customers, 2);
        assert_eq!(insights.new_customers_this_month, 1);
    }

    #[test]
    fn test_revenue_totals_and_average() {
        let orders = vec![make_order(100.0, 5), make_order(250.5, 5)];
        let metrics = revenue_metrics(&[], &orders, Utc::now());

        assert_eq!(metrics.total_revenue, 350.5);
        // 175.25 rounds to 175.
        assert_eq!(metrics.average_order_value, 175);
    }

    #[test]
    fn test_top_spender_tie_goes_to_first() {
        let customers = vec![
            make_customer("Asha", 900.0, 100),
            make_customer("Binod", 900.0, 100),
            make_customer("Chitra", 100.0, 100),
        ];
        let metrics = revenue_metrics(&customers, &[], Utc::now());

        assert_eq!(metrics.top_spending_customer, "Asha");
    }

    #[test]
    fn test_monthly_growth_between_periods() {
        // 40 days back lands in the previous month window, 10 days back
        // in the current one.
        let orders = vec![make_order(200.0, 40), make_order(300.0, 10)];
        assert_eq!(monthly_growth(&orders, Utc::now()), 50);
    }

    #[test]
    fn test_monthly_growth_decline() {
        let orders = vec![make_order(400.0, 40), make_order(300.0, 10)];
        assert_eq!(monthly_growth(&orders, Utc::now()), -25);
    }

    #[test]
    fn test_monthly_growth_without_previous_revenue() {
        let orders = vec![make_order(300.0, 10)];
        assert_eq!(monthly_growth(&orders, Utc::now()), 0);
    }

    #[test]
    fn test_dashboard_stats_counts() {
        let customers = vec![make_customer("a", 10.0, 50)];
        let orders = vec![make_order(100.0, 5), make_order(50.0, 3)];
        let campaigns = vec![make_campaign("One")];
        let stats = dashboard_stats(&customers, &orders, &campaigns);

        assert_eq!(stats.total_customers, 1);
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.total_campaigns, 1);
        assert_eq!(stats.total_revenue, 150.0);
    }

    #[test]
    fn test_analytics_wire_shape() {
        let analytics = compute(&[], &[], &[], &[], Utc::now());
        let json = serde_json::to_value(&analytics).unwrap();

        assert!(json.get("campaignPerformance").is_some());
        assert!(json["campaignPerformance"].get("averageSuccessRate").is_some());
        assert!(json["customerInsights"].get("newCustomersThisMonth").is_some());
        assert!(json["revenueMetrics"].get("topSpendingCustomer").is_some());
    }
}
