pub mod assets;
pub mod batches;
pub mod commit;
pub mod encoding;
pub mod errors;
pub mod types;
pub mod url;
