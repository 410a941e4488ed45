//! Vector retrieval: the local flat index and question-to-chunk lookup

mod flat_index;
mod retriever;

pub use flat_index::{FlatIndex, CHUNKS_FILE, INDEX_FILE};
pub use retriever::Retriever;
