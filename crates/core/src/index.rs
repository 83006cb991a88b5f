//! Index descriptors
//!
//! An index is owned by exactly one property. Its identity is assigned by the
//! synchronizer from the model-wide `last_index_identity` counter. HNSW
//! parameters are passed through to the core engine unchanged.

use crate::iduid::IdUid;
use crate::kind::PropertyFlags;
use serde::{Deserialize, Serialize};

/// Distance function of an HNSW vector index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DistanceType {
    /// Squared euclidean distance
    #[default]
    Euclidean,
    /// Cosine distance (1 - cosine similarity)
    Cosine,
    /// Dot product distance, vectors must be normalized
    DotProduct,
    /// Dot product distance for non-normalized vectors
    DotProductNonNormalized,
}

impl DistanceType {
    /// Engine code
    pub const fn code(self) -> u32 {
        match self {
            DistanceType::Euclidean => 1,
            DistanceType::Cosine => 2,
            DistanceType::DotProduct => 3,
            DistanceType::DotProductNonNormalized => 10,
        }
    }

    /// Inverse of [`DistanceType::code`]
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(DistanceType::Euclidean),
            2 => Some(DistanceType::Cosine),
            3 => Some(DistanceType::DotProduct),
            10 => Some(DistanceType::DotProductNonNormalized),
            _ => None,
        }
    }

    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "euclidean" | "l2" => Some(DistanceType::Euclidean),
            "cosine" => Some(DistanceType::Cosine),
            "dot_product" | "dot" => Some(DistanceType::DotProduct),
            "dot_product_non_normalized" => Some(DistanceType::DotProductNonNormalized),
            _ => None,
        }
    }
}

/// HNSW tuning flags (engine values)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HnswFlags(u32);

impl HnswFlags {
    /// No flags
    pub const NONE: HnswFlags = HnswFlags(0);
    /// Log index maintenance
    pub const DEBUG_LOGS: HnswFlags = HnswFlags(1);
    /// Verbose index maintenance logs
    pub const DEBUG_LOGS_DETAILED: HnswFlags = HnswFlags(2);
    /// Disable SIMD padding in the vector cache
    pub const VECTOR_CACHE_SIMD_PADDING_OFF: HnswFlags = HnswFlags(4);
    /// Limit candidates during graph reparation
    pub const REPARATION_LIMIT_CANDIDATES: HnswFlags = HnswFlags(8);

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// From raw bits
    pub const fn from_bits(bits: u32) -> Self {
        HnswFlags(bits)
    }
}

impl std::ops::BitOr for HnswFlags {
    type Output = HnswFlags;

    fn bitor(self, rhs: Self) -> Self {
        HnswFlags(self.0 | rhs.0)
    }
}

/// Parameters of an HNSW vector index
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HnswParams {
    /// Number of vector dimensions; must be > 0
    pub dimensions: u32,
    /// Distance function
    pub distance_type: DistanceType,
    /// Maximum connections per node (engine default when `None`)
    pub neighbors_per_node: Option<u32>,
    /// Search breadth while indexing (engine default when `None`)
    pub indexing_search_count: Option<u32>,
    /// Tuning flags
    pub flags: HnswFlags,
    /// Probability of repairing back links on deletion, in [0.0, 1.0]
    pub reparation_backlink_probability: Option<f32>,
    /// Vector cache size hint in KiB
    pub vector_cache_hint_size_kb: Option<u64>,
}

impl HnswParams {
    /// Parameters with the given dimensions and engine defaults otherwise
    pub fn new(dimensions: u32) -> Self {
        HnswParams {
            dimensions,
            ..Default::default()
        }
    }

    /// Set the distance function
    pub fn distance_type(mut self, distance_type: DistanceType) -> Self {
        self.distance_type = distance_type;
        self
    }

    /// Set neighbors per node
    pub fn neighbors_per_node(mut self, value: u32) -> Self {
        self.neighbors_per_node = Some(value);
        self
    }

    /// Set indexing search count
    pub fn indexing_search_count(mut self, value: u32) -> Self {
        self.indexing_search_count = Some(value);
        self
    }

    /// Set tuning flags
    pub fn flags(mut self, flags: HnswFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set reparation backlink probability
    pub fn reparation_backlink_probability(mut self, value: f32) -> Self {
        self.reparation_backlink_probability = Some(value);
        self
    }

    /// Set vector cache hint size
    pub fn vector_cache_hint_size_kb(mut self, value: u64) -> Self {
        self.vector_cache_hint_size_kb = Some(value);
        self
    }
}

/// Kind of index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndexKind {
    /// Index on the full value
    Value,
    /// Index on a 32-bit hash of the value
    Hash,
    /// Index on a 64-bit hash of the value
    Hash64,
    /// Approximate nearest neighbor index over float vectors
    Hnsw(HnswParams),
}

impl IndexKind {
    /// Property flags implied by this index kind
    pub fn property_flags(&self) -> PropertyFlags {
        match self {
            IndexKind::Value | IndexKind::Hnsw(_) => PropertyFlags::INDEXED,
            IndexKind::Hash => PropertyFlags::INDEXED | PropertyFlags::INDEX_HASH,
            IndexKind::Hash64 => PropertyFlags::INDEXED | PropertyFlags::INDEX_HASH64,
        }
    }

    /// HNSW parameters, if this is a vector index
    pub fn hnsw(&self) -> Option<&HnswParams> {
        match self {
            IndexKind::Hnsw(params) => Some(params),
            _ => None,
        }
    }
}

/// Index owned by a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Identity (assigned by the synchronizer)
    pub identity: IdUid,
    /// Index kind
    pub kind: IndexKind,
}

impl IndexDescriptor {
    /// New unassigned index
    pub fn new(kind: IndexKind) -> Self {
        IndexDescriptor {
            identity: IdUid::UNASSIGNED,
            kind,
        }
    }

    /// Pin the index to a user supplied UID
    pub fn with_uid(mut self, uid: u64) -> Self {
        self.identity = IdUid::with_uid(uid);
        self
    }
}
