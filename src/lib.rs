//! Immutable query builder and cursor pagination engine for document stores.
//!
//! ```
//! use std::sync::Arc;
//! use bson::doc;
//! use docquery::{Collection, Cond, store::MemoryStore};
//!
//! let store = Arc::new(MemoryStore::new("people"));
//! store.insert_many([doc! {"id": 1, "age": 31}, doc! {"id": 2, "age": 45}]);
//! let people = Collection::new(store);
//!
//! let adults = people.find([Cond::gte("age", 40)]).order_by(["id"]);
//! let rows: Vec<bson::Document> = adults.all().unwrap();
//! assert_eq!(rows.len(), 1);
//! assert_eq!(adults.count().unwrap(), 1);
//! ```

pub mod collection;
pub mod errors;
pub mod logger;
pub mod query;
pub mod result;
pub mod store;

pub use collection::Collection;
pub use errors::{DbError, DbResult};
pub use query::telemetry;
pub use query::{Cond, Filter, Op};
pub use result::{QuerySpec, ResultSet};
