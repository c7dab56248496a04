pub mod building;
pub mod citizen;
pub mod colony;
pub mod configs;
pub mod id;
pub mod interest;
pub mod interval;
pub mod logger;
pub mod position;
pub mod replication;
pub mod substrate;

pub use building::*;
pub use citizen::*;
pub use colony::*;
pub use configs::*;
pub use id::*;
pub use interest::*;
pub use position::*;
pub use replication::*;
pub use substrate::*;

pub use ahash::{AHashMap, AHashSet, RandomState};
pub use indexmap::IndexMap;
pub use serde::{Deserialize, Serialize};
pub use smallvec::SmallVec;
