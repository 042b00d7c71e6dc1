//! Vector similarity search using HNSW with an exact fallback
//!
//! [`SearchStructure`] owns the vectors of one index build and an
//! `instant-distance` HNSW map over them. It is persisted on its own through
//! bincode; the leading fields form a [`StructureHeader`] that can be read
//! without decoding the graph.

use crate::error::{DbotError, Result};
use crate::ml::embedding::Embedding;
use instant_distance::{Builder, HnswMap, Point, Search};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Indexes with at most this many vectors are always searched exactly
pub const EXACT_SEARCH_LIMIT: usize = 256;

/// Distance metrics supported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine distance (good for normalized embeddings)
    #[default]
    Cosine,
    /// Euclidean distance (L2)
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Negated dot product
    DotProduct,
}

impl DistanceMetric {
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_distance(a, b),
            DistanceMetric::Euclidean => euclidean_distance(a, b),
            DistanceMetric::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
            DistanceMetric::DotProduct => -dot_product(a, b),
        }
    }
}

/// Cosine distance (1 - cosine similarity)
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot = dot_product(a, b);
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        1.0 // Maximum distance for zero vectors
    } else {
        1.0 - (dot / (norm_a * norm_b))
    }
}

/// Euclidean distance (L2)
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Point implementation for instant-distance HNSW
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorPoint {
    pub data: Vec<f32>,
    pub distance_metric: DistanceMetric,
}

impl VectorPoint {
    pub fn new(data: Vec<f32>, distance_metric: DistanceMetric) -> Self {
        Self {
            data,
            distance_metric,
        }
    }
}

impl Point for VectorPoint {
    fn distance(&self, other: &Self) -> f32 {
        self.distance_metric.distance(&self.data, &other.data)
    }
}

/// Search result; lower distance is more similar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Position of the matched vector (and its chunk)
    pub id: usize,
    pub distance: f32,
}

/// HNSW parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Candidate list size while building
    pub ef_construction: usize,
    /// Candidate list size while searching
    pub ef_search: usize,
    /// Seed for level assignment; fixed so rebuilds are reproducible
    pub seed: u64,
    pub distance_metric: DistanceMetric,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            ef_construction: 100,
            ef_search: 100,
            seed: 0x5eed_d807,
            distance_metric: DistanceMetric::Cosine,
        }
    }
}

/// The fields at the start of a serialized [`SearchStructure`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureHeader {
    pub build_id: String,
    pub dimension: usize,
    pub len: usize,
}

/// Nearest-neighbor structure over one build's vectors
#[derive(Serialize, Deserialize)]
pub struct SearchStructure {
    // header fields first; see StructureHeader
    build_id: String,
    dimension: usize,
    len: usize,
    config: SearchConfig,
    vectors: Vec<Embedding>,
    map: HnswMap<VectorPoint, usize>,
}

impl std::fmt::Debug for SearchStructure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchStructure")
            .field("build_id", &self.build_id)
            .field("dimension", &self.dimension)
            .field("len", &self.len)
            .finish()
    }
}

impl SearchStructure {
    /// Build over `vectors`; vector `i` is reported as id `i`
    pub fn build(build_id: &str, vectors: Vec<Embedding>, config: &SearchConfig) -> Result<Self> {
        let dimension = match vectors.first() {
            Some(first) => first.len(),
            None => return Err(DbotError::Search("Cannot build an index over zero vectors".to_string())),
        };
        if dimension == 0 {
            return Err(DbotError::Search("Vectors must not be empty".to_string()));
        }
        if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dimension) {
            return Err(DbotError::Search(format!(
                "Vector {} has dimension {}, expected {}",
                i,
                v.len(),
                dimension
            )));
        }

        log::info!(
            "Building HNSW index with {} vectors, dimension {}",
            vectors.len(),
            dimension
        );

        let points: Vec<VectorPoint> = vectors
            .iter()
            .map(|v| VectorPoint::new(v.clone(), config.distance_metric))
            .collect();
        let ids: Vec<usize> = (0..vectors.len()).collect();

        let map = Builder::default()
            .ef_construction(config.ef_construction)
            .ef_search(config.ef_search)
            .seed(config.seed)
            .build(points, ids);

        Ok(Self {
            build_id: build_id.to_string(),
            dimension,
            len: vectors.len(),
            config: config.clone(),
            vectors,
            map,
        })
    }

    pub fn header(&self) -> StructureHeader {
        StructureHeader {
            build_id: self.build_id.clone(),
            dimension: self.dimension,
            len: self.len,
        }
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of indexed vectors
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn vector(&self, id: usize) -> Option<&Embedding> {
        self.vectors.get(id)
    }

    fn check_query(&self, query: &[f32]) -> Result<()> {
        if query.len() != self.dimension {
            return Err(DbotError::Search(format!(
                "Query dimension {} doesn't match index dimension {}",
                query.len(),
                self.dimension
            )));
        }
        Ok(())
    }

    /// Top `k` neighbors, exact for small indexes
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if self.len <= EXACT_SEARCH_LIMIT || k > self.config.ef_search {
            self.search_exact(query, k)
        } else {
            self.search_approximate(query, k)
        }
    }

    /// HNSW search
    pub fn search_approximate(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.check_query(query)?;
        let point = VectorPoint::new(query.to_vec(), self.config.distance_metric);
        let mut search = Search::default();
        let results = self
            .map
            .search(&point, &mut search)
            .take(k)
            .map(|item| SearchResult {
                id: *item.value,
                distance: item.distance,
            })
            .collect();
        Ok(results)
    }

    /// Brute-force search over every vector
    pub fn search_exact(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.check_query(query)?;
        let metric = self.config.distance_metric;
        let mut distances: Vec<SearchResult> = self
            .vectors
            .par_iter()
            .enumerate()
            .map(|(id, vector)| SearchResult {
                id,
                distance: metric.distance(query, vector),
            })
            .collect();

        distances.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        distances.truncate(k);
        Ok(distances)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let structure: Self = bincode::deserialize(bytes)
            .map_err(|e| DbotError::CorruptArtifact(format!("Unreadable search structure: {}", e)))?;
        if structure.vectors.len() != structure.len {
            return Err(DbotError::CorruptArtifact(format!(
                "Search structure claims {} vectors but holds {}",
                structure.len,
                structure.vectors.len()
            )));
        }
        Ok(structure)
    }

    /// Read only the header of a serialized structure
    pub fn read_header(path: &Path) -> Result<StructureHeader> {
        let file = std::fs::File::open(path)?;
        let header: StructureHeader = bincode::deserialize_from(std::io::BufReader::new(file))
            .map_err(|e| DbotError::CorruptArtifact(format!("Unreadable structure header: {}", e)))?;
        Ok(header)
    }
}
