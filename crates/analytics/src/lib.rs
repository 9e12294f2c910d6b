//! Dashboard analytics — pure aggregation of CRM snapshots into
//! campaign, customer and revenue metrics.

pub mod aggregator;

pub use aggregator::{
    compute, dashboard_stats, Analytics, CampaignPerformance, CustomerInsights, DashboardStats,
    RevenueMetrics,
};
