pub mod pdf;
pub mod pipeline;

pub use pipeline::{IngestionPipeline, CHUNK_CAPACITY, CHUNK_OVERLAP};
