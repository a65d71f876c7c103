mod fetcher;
mod sync;

pub use fetcher::{DocumentFetcher, FetchedFeed, FetchedItem, HttpFetcher};
pub use sync::SyncEngine;
