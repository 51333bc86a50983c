//! PostgreSQL/PostGIS storage layer: connection pool, embedded migrations,
//! the partition manager (§4.2), geometry ingestion (§9 "Geospatial"), and
//! the repository functions wrapping the decision stored routines
//! (§4.4-§4.6).

pub mod error;
pub mod geometry;
pub mod partition;
pub mod pool;
pub mod repository;

pub use error::{DataError, SqlxErrorExt, StoreResult};
pub use pool::{connect_pool, migrate};
