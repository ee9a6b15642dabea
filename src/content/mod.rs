//! Content module.
//!
//! The [`ContentStore`] capability, its filesystem and in-memory
//! implementations, and the [`ContentGateway`] that only opens the store to
//! authorized requests.

mod fs;
mod gateway;
mod memory;
mod mime;
mod store;

pub use fs::FsContentStore;
pub use gateway::{ChunkStream, ContentGateway, ContentStream, DEFAULT_CHUNK_SIZE};
pub use memory::MemoryContentStore;
pub use mime::guess_mime_type;
pub use store::{ContentDescriptor, ContentReader, ContentStore};
