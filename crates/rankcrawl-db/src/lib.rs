//! Loading canonical datasets into Postgres.
//!
//! [`SchemaLoader::generate`] writes drop-and-recreate scripts for the target
//! database and table plus a bulk-load script pointing at the newest dataset;
//! [`SchemaLoader::apply`] runs them through a [`RelationalStore`].

pub mod connection;
pub mod error;
pub mod loader;
pub mod scripts;
pub mod store;

pub use connection::ConnectionParams;
pub use error::{LoadError, LoadStage};
pub use loader::{LoadReport, SchemaLoader};
pub use scripts::{LoadScriptSet, Script};
pub use store::{PgStore, RelationalStore, StoreConnection};
