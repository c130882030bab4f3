//! Infrastructure layer: persistence, configuration and the stock mutation
//! service that ties authorization to the inventory ledger.

pub mod config;
pub mod directory;
pub mod error;
pub mod stock_service;
pub mod store;


pub use config::{ConfigError, InfraConfig};
pub use directory::{InMemoryTenantDirectory, TenantDirectory};
pub use error::{OutwardError, ServiceError};
pub use stock_service::{InventoryEnvelope, MovementResult, StockMutationService};
pub use store::{InMemoryInventoryStore, InventoryStore, PostgresInventoryStore, StoreError};
