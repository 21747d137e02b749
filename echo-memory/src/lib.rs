//! Echo Memory
//!
//! Unified hypergraph memory engine for long-running cognitive agents.
//!
//! Memories are typed nodes in a hypergraph with weighted relation edges.
//! Retrieval is ranked by echo resonance (lexical match, echo value, and
//! recency), WORKING-type records live in a capacity-bounded LRU working
//! set, and the whole graph is periodically snapshotted to disk.
//!
//! ## Features
//!
//! - **Eight memory types** - declarative, episodic, procedural, semantic,
//!   working, sensory, emotional, associative
//! - **Echo resonance** - reinforcement writes that return the memories
//!   resonating with the new content
//! - **Bounded working memory** - strict-LRU view over active records
//! - **Snapshot persistence** - versioned JSON snapshots, tolerant of
//!   missing or corrupt files at startup
//!
//! ## Example
//!
//! ```ignore
//! use echo_memory::{EchoMemory, MemoryType};
//!
//! let memory = EchoMemory::with_storage("my-agent", "memory_storage");
//! memory.initialize().await;
//!
//! let stored = memory
//!     .store_memory("Deep Tree Echo test", MemoryType::Semantic, 0.8)
//!     .await;
//! let id = stored.data.unwrap()["memory_id"].as_str().unwrap().to_string();
//!
//! let record = memory.retrieve_memory(&id).await;
//! assert!(record.success);
//! ```

pub mod error;
pub mod facade;
pub mod node;
pub mod persistence;
pub mod resonance;
pub mod store;
pub mod working;

// Re-exports for convenience
pub use error::{MemoryError, Result};
pub use facade::{
    AnalysisKind, EchoMemory, LifecycleState, MemoryConfig, MemoryOp, MemoryResponse, MemoryStatus,
};
pub use node::{MemoryEdge, MemoryId, MemoryNode, MemoryNodeBuilder, MemoryType};
pub use persistence::{Snapshot, SnapshotGateway, SNAPSHOT_VERSION};
pub use resonance::{RankedMemory, ScoreBreakdown};
pub use store::HypergraphStore;
pub use working::WorkingSet;
