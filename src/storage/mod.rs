pub mod connection;
pub mod database;
pub mod table;

pub use connection::MemoryConnection;
pub use database::{MemoryDatabase, PendingWrite};
pub use table::Table;
