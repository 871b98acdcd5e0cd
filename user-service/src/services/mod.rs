pub mod database;
pub mod memory;
pub mod metrics;
pub mod store;

pub use database::MongoUserStore;
pub use memory::InMemoryUserStore;
pub use metrics::{get_metrics, init_metrics};
pub use store::{BoundedStore, StoreError, UserStore};
