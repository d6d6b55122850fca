//! Side services agents can be granted: web search and file storage.
pub mod files;
pub mod search;

pub use files::{Destination, FileContent, FileDescriptor, FileStore};
pub use search::{DuckDuckGoSearch, SearchResult, WebSearch, DUCKDUCKGO_BASE};
