mod schema;
mod store;

pub use store::{InsertReport, Store};
