//! Data source seam for analytics snapshots.
//!
//! The aggregation layer never reads the store directly; it consumes a
//! [`Snapshot`] gathered through the [`DataSource`] trait so the
//! in-memory store can later be swapped for real repositories without
//! touching the analytics code.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use pulse_core::types::{Campaign, CommunicationLog, Customer, Order};
use pulse_core::CrmResult;

use crate::store::CrmStore;

/// Read access to the four CRM collections. Each fetch is independent
/// so a snapshot can issue them concurrently.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_customers(&self) -> CrmResult<Vec<Customer>>;
    async fn fetch_orders(&self) -> CrmResult<Vec<Order>>;
    async fn fetch_campaigns(&self) -> CrmResult<Vec<Campaign>>;
    async fn fetch_logs(&self) -> CrmResult<Vec<CommunicationLog>>;
}

/// A consistent view of all four collections, taken at one instant.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub customers: Vec<Customer>,
    pub orders: Vec<Order>,
    pub campaigns: Vec<Campaign>,
    pub logs: Vec<CommunicationLog>,
    pub fetched_at: DateTime<Utc>,
}

/// Fan out the four fetches concurrently and join them into one
/// snapshot. Any single failure fails the whole snapshot; partial
/// results are never returned.
pub async fn fetch_snapshot<S: DataSource + ?Sized>(source: &S) -> CrmResult<Snapshot> {
    let (customers, orders, campaigns, logs) = tokio::try_join!(
        source.fetch_customers(),
        source.fetch_orders(),
        source.fetch_campaigns(),
        source.fetch_logs(),
    )?;

    Ok(Snapshot {
        customers,
        orders,
        campaigns,
        logs,
        fetched_at: Utc::now(),
    })
}

#[async_trait]
impl DataSource for CrmStore {
    async fn fetch_customers(&self) -> CrmResult<Vec<Customer>> {
        Ok(self.list_customers())
    }

    async fn fetch_orders(&self) -> CrmResult<Vec<Order>> {
        Ok(self.list_orders())
    }

    async fn fetch_campaigns(&self) -> CrmResult<Vec<Campaign>> {
        Ok(self.list_campaigns())
    }

    async fn fetch_logs(&self) -> CrmResult<Vec<CommunicationLog>> {
        Ok(self.list_logs())
    }
}
