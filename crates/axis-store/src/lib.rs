pub mod query;
pub mod sqlite_store;

pub use query::WindowQuery;
pub use sqlite_store::EventStore;
