pub mod cache;
pub mod error;
pub mod filter;
pub mod schema;
pub mod settings;
pub mod store;
pub mod value;

pub use cache::CacheService;
pub use error::{FilterError, StoreError, StoreResult};
pub use filter::{CompiledFilter, Filter, Op};
pub use schema::{Field, FieldKind, Table, TableSchema};
pub use settings::{Settings, keys};
pub use store::{Query, RecordStore, Scope};
pub use value::{Record, Value};
