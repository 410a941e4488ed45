//! Exact nearest-neighbour index over a contiguous vector buffer
//!
//! Vectors are stored row-major in a single `Vec<f32>` alongside a
//! parallel `Vec<Chunk>`, so row `i` of the matrix belongs to
//! `records[i]`. Persisted as `index.bin` (bincode header + vectors) and
//! `chunks.json` (chunk text and citation metadata). Both files carry the
//! same generation id; a pair from different saves is not loaded.

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

use crate::config::DistanceMetric;
use crate::error::{Error, Result};
use crate::providers::vector_store::VectorSearchResult;
use crate::types::Chunk;

/// Vector file name inside the index directory
pub const INDEX_FILE: &str = "index.bin";
/// Chunk metadata file name inside the index directory
pub const CHUNKS_FILE: &str = "chunks.json";

#[derive(Serialize, Deserialize)]
struct IndexFile {
    generation: Uuid,
    dimensions: usize,
    metric: DistanceMetric,
    vectors: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct ChunksFile {
    generation: Uuid,
    chunks: Vec<Chunk>,
}

/// In-memory flat index
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimensions: usize,
    metric: DistanceMetric,
    vectors: Vec<f32>,
    records: Vec<Chunk>,
}

impl FlatIndex {
    /// Create an empty index
    pub fn new(dimensions: usize, metric: DistanceMetric) -> Self {
        Self {
            dimensions,
            metric,
            vectors: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Build an index from embedded chunks
    pub fn from_chunks(dimensions: usize, metric: DistanceMetric, chunks: &[Chunk]) -> Result<Self> {
        let mut index = Self::new(dimensions, metric);
        index.insert(chunks)?;
        Ok(index)
    }

    /// Number of indexed chunks
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Vector dimensions
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Distance metric
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Indexed chunks in insertion order
    pub fn records(&self) -> &[Chunk] {
        &self.records
    }

    /// Append embedded chunks
    ///
    /// All chunks are validated before any is added, so a bad chunk leaves
    /// the index unchanged.
    pub fn insert(&mut self, chunks: &[Chunk]) -> Result<()> {
        for chunk in chunks {
            if chunk.embedding.len() != self.dimensions {
                return Err(Error::vector_db(format!(
                    "Chunk {} has {} dimensions, index expects {}",
                    chunk.id,
                    chunk.embedding.len(),
                    self.dimensions
                )));
            }
            if chunk.embedding.iter().any(|v| !v.is_finite()) {
                return Err(Error::vector_db(format!(
                    "Chunk {} has a non-finite embedding",
                    chunk.id
                )));
            }
        }

        self.vectors.reserve(chunks.len() * self.dimensions);
        self.records.reserve(chunks.len());
        for chunk in chunks {
            match self.metric {
                DistanceMetric::Cosine => self.vectors.extend(normalized(&chunk.embedding)),
                _ => self.vectors.extend_from_slice(&chunk.embedding),
            }
            let mut record = chunk.clone();
            record.embedding = Vec::new();
            self.records.push(record);
        }

        debug_assert_eq!(self.vectors.len(), self.dimensions * self.records.len());
        Ok(())
    }

    /// Remove everything
    pub fn clear(&mut self) {
        self.vectors.clear();
        self.records.clear();
    }

    /// The `top_k` closest chunks, best first
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<VectorSearchResult>> {
        if query.len() != self.dimensions {
            return Err(Error::vector_db(format!(
                "Query has {} dimensions, index expects {}",
                query.len(),
                self.dimensions
            )));
        }
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let distances = self.distances(query)?;

        let mut order: Vec<usize> = (0..distances.len()).collect();
        let by_distance = |a: &usize, b: &usize| -> Ordering {
            distances[*a]
                .total_cmp(&distances[*b])
                .then_with(|| a.cmp(b))
        };
        let k = top_k.min(order.len());
        if k < order.len() {
            order.select_nth_unstable_by(k - 1, by_distance);
            order.truncate(k);
        }
        order.sort_by(by_distance);

        Ok(order
            .into_iter()
            .map(|i| VectorSearchResult {
                chunk: self.records[i].clone(),
                similarity: self.metric.similarity_from_distance(distances[i]),
            })
            .collect())
    }

    /// Distance from `query` to every row (lower is closer)
    fn distances(&self, query: &[f32]) -> Result<Array1<f32>> {
        let matrix = ArrayView2::from_shape((self.len(), self.dimensions), &self.vectors)
            .map_err(|e| Error::vector_db(format!("Corrupt vector buffer: {}", e)))?;

        Ok(match self.metric {
            DistanceMetric::L2 => {
                let q = ArrayView1::from(query);
                let q_norm = q.dot(&q);
                let row_norms = matrix.map_axis(ndarray::Axis(1), |row| row.dot(&row));
                let dots = matrix.dot(&q);
                (row_norms - dots * 2.0 + q_norm).mapv(|d| d.max(0.0))
            }
            DistanceMetric::Cosine => {
                let q = normalized(query);
                matrix.dot(&ArrayView1::from(q.as_slice())).mapv(|s| 1.0 - s)
            }
            DistanceMetric::InnerProduct => matrix.dot(&ArrayView1::from(query)).mapv(|s| 1.0 - s),
        })
    }

    /// Load an index from `dir`
    ///
    /// A missing index, one built with different dimensions or metric, or
    /// a vector file and chunk file from different saves, yields an empty
    /// index so the next ingest rebuilds it.
    pub fn load(dir: &Path, dimensions: usize, metric: DistanceMetric) -> Result<Self> {
        let index_path = dir.join(INDEX_FILE);
        let chunks_path = dir.join(CHUNKS_FILE);
        if !index_path.exists() || !chunks_path.exists() {
            tracing::info!("No existing index at {:?}, starting empty", dir);
            return Ok(Self::new(dimensions, metric));
        }

        let bytes = std::fs::read(&index_path)?;
        let (file, _): (IndexFile, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(|e| Error::vector_db(format!("Failed to decode {:?}: {}", index_path, e)))?;

        if file.dimensions != dimensions || file.metric != metric {
            tracing::warn!(
                "Index at {:?} was built with {} dimensions ({:?}), configured {} ({:?}); starting empty",
                dir,
                file.dimensions,
                file.metric,
                dimensions,
                metric
            );
            return Ok(Self::new(dimensions, metric));
        }

        let chunks: ChunksFile = serde_json::from_slice(&std::fs::read(&chunks_path)?)?;
        if chunks.generation != file.generation {
            tracing::warn!(
                "{} and {} in {:?} come from different saves; starting empty",
                INDEX_FILE,
                CHUNKS_FILE,
                dir
            );
            return Ok(Self::new(dimensions, metric));
        }

        let records = chunks.chunks;
        if file.vectors.len() != dimensions * records.len() {
            return Err(Error::vector_db(format!(
                "Index at {:?} holds {} values for {} chunks of {} dimensions",
                dir,
                file.vectors.len(),
                records.len(),
                dimensions
            )));
        }

        tracing::info!("Loaded {} chunks from {:?}", records.len(), dir);
        Ok(Self {
            dimensions,
            metric,
            vectors: file.vectors,
            records,
        })
    }

    /// Persist the index to `dir`, replacing any previous files
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let generation = Uuid::new_v4();
        let file = IndexFile {
            generation,
            dimensions: self.dimensions,
            metric: self.metric,
            vectors: self.vectors.clone(),
        };
        let bytes = bincode::serde::encode_to_vec(&file, bincode::config::standard())
            .map_err(|e| Error::vector_db(format!("Failed to encode index: {}", e)))?;

        let chunks = ChunksFile {
            generation,
            chunks: self.records.clone(),
        };
        write_atomic(dir, CHUNKS_FILE, &serde_json::to_vec(&chunks)?)?;
        write_atomic(dir, INDEX_FILE, &bytes)?;
        Ok(())
    }
}

fn normalized(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|v| v / norm).collect()
}

fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(name)).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
