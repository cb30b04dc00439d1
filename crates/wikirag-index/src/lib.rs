#![deny(unused_imports)]

pub mod index;
pub mod schema;
pub mod search;
pub mod store;
pub mod table;

pub use index::Index;
pub use search::{search, Retriever};
pub use store::{IndexOrigin, IndexStore, Resolved};
