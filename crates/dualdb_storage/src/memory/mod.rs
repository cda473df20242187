//! In-memory implementations of both storage services.

mod attribute;
mod keyrange;

pub use attribute::{InMemoryAttributeStore, DEFAULT_SELECT_LIMIT};
pub use keyrange::{condition_holds, InMemoryKeyRangeStore};
