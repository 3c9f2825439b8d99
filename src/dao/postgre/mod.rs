pub use self::types::{PoolOption, PoolType, QueryResult};

mod subscription;
mod types;
