pub mod local_store;
pub mod memory_store;
pub mod store;

pub use local_store::LocalFileBlobStore;
pub use memory_store::MemoryBlobStore;
pub use store::{BlobStore, BlobStores};
