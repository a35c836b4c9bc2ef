//! Exact nearest-neighbor vector index with positionally aligned metadata.
//!
//! [`VectorIndex`] stores embeddings in a flat row-major buffer next to the
//! [`Chunk`] each row was computed from. Search is an exact linear scan under
//! one of two [`Metric`]s. An index is persisted as two sibling files keyed by
//! the same base path: the vector file itself and `<stem>_metadata.json`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::document::Chunk;
use crate::error::{RagError, Result};

const FORMAT_VERSION: u32 = 1;

/// Distance metric used to rank stored vectors against a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Squared Euclidean distance; smaller is closer.
    #[default]
    L2,
    /// Inner product of L2-normalized vectors; larger is closer.
    Cosine,
}

impl Metric {
    /// Convert a raw search score into a similarity where higher is better.
    ///
    /// `l2` distances map to `1 / (1 + distance)`; cosine scores are already
    /// similarities and pass through unchanged.
    pub fn similarity(self, raw_score: f32) -> f32 {
        match self {
            Metric::L2 => 1.0 / (1.0 + raw_score),
            Metric::Cosine => raw_score,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Metric::L2 => "l2",
            Metric::Cosine => "cosine",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l2" => Ok(Metric::L2),
            "cosine" => Ok(Metric::Cosine),
            other => Err(RagError::ConfigError(format!(
                "unknown metric '{other}', expected 'l2' or 'cosine'"
            ))),
        }
    }
}

/// One nearest-neighbor match: the insertion position of the stored vector
/// and its raw metric score (distance for `l2`, similarity for `cosine`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// Insertion index of the matched vector.
    pub position: usize,
    /// Raw score under the index metric.
    pub score: f32,
}

/// An append-only exact-search vector index.
///
/// The dimension and metric are fixed at construction. `add` requires
/// `&mut self`, so a built index shared behind an `Arc` (or a
/// `tokio::sync::RwLock` read guard) is read-only for every query.
///
/// # Example
///
/// ```
/// use legalrag::{Metric, VectorIndex};
/// # use legalrag::document::Chunk;
/// # fn chunk(id: &str) -> Chunk {
/// #     Chunk { chunk_id: id.into(), content: "text".into(), source_doc_id: "d".into(),
/// #         source_title: "D".into(), chunk_index: 0, start_char: 0, end_char: 4,
/// #         metadata: Default::default() }
/// # }
///
/// let mut index = VectorIndex::new(2, Metric::Cosine).unwrap();
/// index.add(&[vec![1.0, 0.0], vec![0.0, 1.0]], vec![chunk("a"), chunk("b")]).unwrap();
/// let hits = index.search(&[0.9, 0.1], 1).unwrap();
/// assert_eq!(hits[0].position, 0);
/// ```
#[derive(Debug, Clone)]
pub struct VectorIndex {
    embedding_dim: usize,
    metric: Metric,
    vectors: Vec<f32>,
    metadata: Vec<Chunk>,
}

impl VectorIndex {
    /// Create an empty index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `embedding_dim` is zero.
    pub fn new(embedding_dim: usize, metric: Metric) -> Result<Self> {
        if embedding_dim == 0 {
            return Err(RagError::ConfigError(
                "embedding_dim must be greater than zero".to_string(),
            ));
        }
        Ok(Self { embedding_dim, metric, vectors: Vec::new(), metadata: Vec::new() })
    }

    /// The fixed vector dimension.
    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// The metric used for search.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Number of stored vectors (always equal to the number of metadata records).
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Metadata stored at `position`.
    pub fn chunk(&self, position: usize) -> Option<&Chunk> {
        self.metadata.get(position)
    }

    /// All metadata records in insertion order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.metadata
    }

    /// The stored (for `cosine`, normalized) vector at `position`.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.embedding_dim)?;
        self.vectors.get(start..start + self.embedding_dim)
    }

    /// Append vectors with their metadata.
    ///
    /// Inputs are validated in full before anything is stored, so a failed
    /// call leaves the index unchanged. Caller-owned vectors are never
    /// mutated; cosine normalization is applied to the index's copy.
    ///
    /// # Errors
    ///
    /// - [`RagError::LengthMismatch`] if `vectors.len() != metadata.len()`
    /// - [`RagError::DimensionMismatch`] if any vector has the wrong length
    pub fn add(&mut self, vectors: &[Vec<f32>], metadata: Vec<Chunk>) -> Result<()> {
        if vectors.len() != metadata.len() {
            return Err(RagError::LengthMismatch {
                operation: "VectorIndex::add",
                vectors: vectors.len(),
                metadata: metadata.len(),
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.embedding_dim) {
            return Err(RagError::DimensionMismatch {
                operation: "VectorIndex::add",
                expected: self.embedding_dim,
                actual: bad.len(),
            });
        }

        self.vectors.reserve(vectors.len() * self.embedding_dim);
        for vector in vectors {
            match self.metric {
                Metric::L2 => self.vectors.extend_from_slice(vector),
                Metric::Cosine => self.vectors.extend(l2_normalized(vector)),
            }
        }
        self.metadata.extend(metadata);

        info!(added = vectors.len(), total = self.len(), metric = %self.metric, "added embeddings");
        Ok(())
    }

    /// Return up to `k` nearest neighbors of `query`.
    ///
    /// Results are ordered by increasing distance (`l2`) or decreasing
    /// similarity (`cosine`); equal scores keep insertion order. An empty
    /// index, or `k == 0`, yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if a non-empty index is queried
    /// with a vector of the wrong length.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.embedding_dim {
            return Err(RagError::DimensionMismatch {
                operation: "VectorIndex::search",
                expected: self.embedding_dim,
                actual: query.len(),
            });
        }

        let mut hits: Vec<SearchHit> = match self.metric {
            Metric::L2 => self
                .rows()
                .enumerate()
                .map(|(position, row)| SearchHit { position, score: squared_l2(row, query) })
                .collect(),
            Metric::Cosine => {
                let query = l2_normalized(query);
                self.rows()
                    .enumerate()
                    .map(|(position, row)| SearchHit { position, score: dot(row, &query) })
                    .collect()
            }
        };

        let metric = self.metric;
        hits.sort_by(|a, b| {
            let by_score = match metric {
                Metric::L2 => a.score.total_cmp(&b.score),
                Metric::Cosine => b.score.total_cmp(&a.score),
            };
            by_score.then(a.position.cmp(&b.position))
        });
        hits.truncate(k);

        debug!(k, returned = hits.len(), metric = %metric, "index search");
        Ok(hits)
    }

    fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.vectors.chunks_exact(self.embedding_dim)
    }

    /// Path of the metadata file paired with the vector file at `path`.
    pub fn metadata_path(path: &Path) -> PathBuf {
        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        path.with_file_name(format!("{stem}_metadata.json"))
    }

    /// Persist vectors and metadata as a pair.
    ///
    /// Both files are written to temporary siblings first and renamed into
    /// place once both writes succeeded.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let metadata_path = Self::metadata_path(path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| RagError::io(parent, e))?;
        }

        let header = VectorFile {
            format_version: FORMAT_VERSION,
            embedding_dim: self.embedding_dim,
            metric: self.metric,
            count: self.len(),
            vectors: self.vectors.clone(),
        };
        let vector_bytes = bincode::serialize(&header).map_err(|e| RagError::CorruptIndex {
            path: path.to_path_buf(),
            message: format!("failed to encode vectors: {e}"),
        })?;
        let metadata_bytes =
            serde_json::to_vec_pretty(&self.metadata).map_err(|e| RagError::CorruptIndex {
                path: metadata_path.clone(),
                message: format!("failed to encode metadata: {e}"),
            })?;

        let vector_tmp = tmp_sibling(path);
        let metadata_tmp = tmp_sibling(&metadata_path);
        fs::write(&vector_tmp, vector_bytes).map_err(|e| RagError::io(&vector_tmp, e))?;
        fs::write(&metadata_tmp, metadata_bytes).map_err(|e| RagError::io(&metadata_tmp, e))?;
        fs::rename(&vector_tmp, path).map_err(|e| RagError::io(path, e))?;
        fs::rename(&metadata_tmp, &metadata_path).map_err(|e| RagError::io(&metadata_path, e))?;

        info!(
            path = %path.display(),
            metadata_path = %metadata_path.display(),
            count = self.len(),
            "saved index"
        );
        Ok(())
    }

    /// Restore an index written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::CorruptIndex`] if the metadata file is missing,
    /// either file cannot be decoded, or the vector and metadata counts
    /// disagree.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata_path = Self::metadata_path(path);
        let corrupt = |message: String| RagError::CorruptIndex { path: path.to_path_buf(), message };

        let vector_bytes = fs::read(path).map_err(|e| RagError::io(path, e))?;
        let file: VectorFile = bincode::deserialize(&vector_bytes)
            .map_err(|e| corrupt(format!("failed to decode vectors: {e}")))?;

        if file.format_version != FORMAT_VERSION {
            return Err(corrupt(format!("unsupported format version {}", file.format_version)));
        }
        if file.embedding_dim == 0 {
            return Err(corrupt("embedding_dim is zero".to_string()));
        }
        let expected_values = file.count.checked_mul(file.embedding_dim).ok_or_else(|| {
            corrupt(format!(
                "header declares {} vectors of dimension {}, which overflows",
                file.count, file.embedding_dim
            ))
        })?;
        if file.vectors.len() != expected_values {
            return Err(corrupt(format!(
                "header declares {} vectors of dimension {} but payload holds {} values",
                file.count,
                file.embedding_dim,
                file.vectors.len()
            )));
        }

        let metadata_bytes = match fs::read(&metadata_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(corrupt(format!(
                    "metadata file {} is missing",
                    metadata_path.display()
                )));
            }
            Err(e) => return Err(RagError::io(&metadata_path, e)),
        };
        let metadata: Vec<Chunk> = serde_json::from_slice(&metadata_bytes)
            .map_err(|e| corrupt(format!("failed to decode metadata: {e}")))?;

        if metadata.len() != file.count {
            return Err(corrupt(format!(
                "{} vectors but {} metadata records",
                file.count,
                metadata.len()
            )));
        }

        info!(path = %path.display(), count = file.count, metric = %file.metric, "loaded index");
        Ok(Self {
            embedding_dim: file.embedding_dim,
            metric: file.metric,
            vectors: file.vectors,
            metadata,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct VectorFile {
    format_version: u32,
    embedding_dim: usize,
    metric: Metric,
    count: usize,
    vectors: Vec<f32>,
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Return an L2-normalized copy of `v`. A zero vector stays zero.
fn l2_normalized(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            content: format!("content of {id}"),
            source_doc_id: "doc".to_string(),
            source_title: "Doc".to_string(),
            chunk_index: 0,
            start_char: 0,
            end_char: 10,
            metadata: Default::default(),
        }
    }

    #[test]
    fn parses_metric_names() {
        assert_eq!("l2".parse::<Metric>().unwrap(), Metric::L2);
        assert_eq!(" Cosine ".parse::<Metric>().unwrap(), Metric::Cosine);
        assert!(matches!("ip".parse::<Metric>(), Err(RagError::ConfigError(_))));
    }

    #[test]
    fn zero_dimension_is_rejected() {
        assert!(matches!(VectorIndex::new(0, Metric::L2), Err(RagError::ConfigError(_))));
    }

    #[test]
    fn add_rejects_wrong_dimension_without_mutating() {
        let mut index = VectorIndex::new(3, Metric::L2).unwrap();
        let err = index
            .add(&[vec![1.0, 2.0, 3.0], vec![1.0, 2.0]], vec![chunk("a"), chunk("b")])
            .unwrap_err();
        assert!(matches!(
            err,
            RagError::DimensionMismatch { operation: "VectorIndex::add", expected: 3, actual: 2 }
        ));
        assert!(index.is_empty());
    }

    #[test]
    fn add_rejects_length_mismatch() {
        let mut index = VectorIndex::new(2, Metric::L2).unwrap();
        let err = index.add(&[vec![1.0, 2.0]], vec![chunk("a"), chunk("b")]).unwrap_err();
        assert!(matches!(err, RagError::LengthMismatch { vectors: 1, metadata: 2, .. }));
        assert!(index.is_empty());
    }

    #[test]
    fn search_on_empty_index_is_empty_even_with_bad_query() {
        let index = VectorIndex::new(4, Metric::Cosine).unwrap();
        assert!(index.search(&[1.0], 5).unwrap().is_empty());
    }

    #[test]
    fn search_rejects_wrong_query_dimension() {
        let mut index = VectorIndex::new(2, Metric::L2).unwrap();
        index.add(&[vec![0.0, 0.0]], vec![chunk("a")]).unwrap();
        assert!(matches!(
            index.search(&[0.0, 0.0, 0.0], 1),
            Err(RagError::DimensionMismatch { operation: "VectorIndex::search", .. })
        ));
    }

    #[test]
    fn l2_orders_by_increasing_distance() {
        let mut index = VectorIndex::new(1, Metric::L2).unwrap();
        index
            .add(&[vec![5.0], vec![1.0], vec![3.0]], vec![chunk("a"), chunk("b"), chunk("c")])
            .unwrap();
        let hits = index.search(&[0.0], 3).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert_eq!(hits[0].score, 1.0);
        assert_eq!(hits[1].score, 9.0);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut index = VectorIndex::new(2, Metric::Cosine).unwrap();
        index
            .add(
                &[vec![0.0, 1.0], vec![2.0, 0.0], vec![1.0, 0.0]],
                vec![chunk("a"), chunk("b"), chunk("c")],
            )
            .unwrap();
        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn cosine_identity_and_orthogonality() {
        let mut index = VectorIndex::new(3, Metric::Cosine).unwrap();
        index.add(&[vec![3.0, 4.0, 0.0], vec![0.0, 0.0, 7.0]], vec![chunk("a"), chunk("b")]).unwrap();
        let hits = index.search(&[3.0, 4.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].position, 0);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!(hits[1].score.abs() < 1e-6);
    }

    #[test]
    fn cosine_does_not_mutate_caller_vectors() {
        let vectors = vec![vec![3.0, 4.0]];
        let mut index = VectorIndex::new(2, Metric::Cosine).unwrap();
        index.add(&vectors, vec![chunk("a")]).unwrap();
        assert_eq!(vectors[0], vec![3.0, 4.0]);
        let stored = index.vector(0).unwrap();
        assert!((stored[0] - 0.6).abs() < 1e-6 && (stored[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn similarity_conversion_per_metric() {
        assert_eq!(Metric::L2.similarity(0.0), 1.0);
        assert_eq!(Metric::L2.similarity(1.0), 0.5);
        assert_eq!(Metric::Cosine.similarity(0.25), 0.25);
    }

    #[test]
    fn metadata_path_sits_next_to_vector_file() {
        let path = Path::new("data/indices/faiss_index.bin");
        assert_eq!(
            VectorIndex::metadata_path(path),
            PathBuf::from("data/indices/faiss_index_metadata.json")
        );
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/index.bin");

        let mut index = VectorIndex::new(2, Metric::L2).unwrap();
        index.add(&[vec![0.125, -3.5], vec![1e-7, 42.0]], vec![chunk("a"), chunk("b")]).unwrap();
        index.save(&path).unwrap();

        let restored = VectorIndex::load(&path).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.metric(), Metric::L2);
        assert_eq!(restored.vector(0).unwrap(), &[0.125, -3.5]);
        assert_eq!(restored.vector(1).unwrap(), &[1e-7, 42.0]);
        assert_eq!(restored.chunks(), index.chunks());
    }

    #[test]
    fn load_fails_when_metadata_is_missing_or_misaligned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");

        let mut index = VectorIndex::new(1, Metric::L2).unwrap();
        index.add(&[vec![1.0], vec![2.0]], vec![chunk("a"), chunk("b")]).unwrap();
        index.save(&path).unwrap();

        let metadata_path = VectorIndex::metadata_path(&path);
        fs::write(&metadata_path, serde_json::to_vec(&vec![chunk("a")]).unwrap()).unwrap();
        assert!(matches!(VectorIndex::load(&path), Err(RagError::CorruptIndex { .. })));

        fs::remove_file(&metadata_path).unwrap();
        assert!(matches!(VectorIndex::load(&path), Err(RagError::CorruptIndex { .. })));
    }

    fn write_vector_file(path: &Path, file: &VectorFile) {
        fs::write(path, bincode::serialize(file).unwrap()).unwrap();
        fs::write(VectorIndex::metadata_path(path), b"[]").unwrap();
    }

    fn header(count: usize, embedding_dim: usize, vectors: Vec<f32>) -> VectorFile {
        VectorFile { format_version: FORMAT_VERSION, embedding_dim, metric: Metric::L2, count, vectors }
    }

    #[test]
    fn load_rejects_header_payload_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        write_vector_file(&path, &header(2, 3, vec![1.0; 5]));

        let err = VectorIndex::load(&path).unwrap_err();
        assert!(matches!(err, RagError::CorruptIndex { ref message, .. } if message.contains("payload")));
    }

    #[test]
    fn load_rejects_overflowing_header_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        write_vector_file(&path, &header(usize::MAX / 2 + 1, 2, Vec::new()));

        let err = VectorIndex::load(&path).unwrap_err();
        assert!(matches!(err, RagError::CorruptIndex { ref message, .. } if message.contains("overflows")));
    }

    #[test]
    fn load_rejects_unsupported_format_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        let mut file = header(0, 2, Vec::new());
        file.format_version = FORMAT_VERSION + 1;
        write_vector_file(&path, &file);

        let err = VectorIndex::load(&path).unwrap_err();
        assert!(matches!(err, RagError::CorruptIndex { ref message, .. } if message.contains("format version")));
    }

    #[test]
    fn load_rejects_undecodable_vector_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        fs::write(&path, b"not an index").unwrap();
        fs::write(VectorIndex::metadata_path(&path), b"[]").unwrap();

        let err = VectorIndex::load(&path).unwrap_err();
        assert!(matches!(err, RagError::CorruptIndex { ref message, .. } if message.contains("decode vectors")));
    }

    #[test]
    fn nan_scores_do_not_break_ordering() {
        let mut index = VectorIndex::new(1, Metric::L2).unwrap();
        index.add(&[vec![f32::NAN], vec![1.0], vec![0.0]], vec![chunk("nan"), chunk("one"), chunk("zero")]).unwrap();

        let hits = index.search(&[0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        let finite: Vec<usize> = hits.iter().filter(|h| !h.score.is_nan()).map(|h| h.position).collect();
        assert_eq!(finite, vec![2, 1]);
    }
}
