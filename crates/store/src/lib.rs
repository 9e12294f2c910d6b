//! CRM data layer — customers, orders, campaigns, communication logs.
//!
//! Data stored in DashMap (development); swap to PostgreSQL for production
//! by providing another [`DataSource`] implementation.

pub mod source;
pub mod store;

pub use source::{fetch_snapshot, DataSource, Snapshot};
pub use store::{CreateCampaignRequest, CrmStore, UpdateCampaignRequest};
