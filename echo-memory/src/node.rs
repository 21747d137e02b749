//! Memory node and edge types
//!
//! Core types for representing memories and the relations between them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for memory nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryId(pub Uuid);

impl MemoryId {
    /// Create a new random MemoryId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MemoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MemoryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Kinds of memory a node can hold
///
/// The wire names are the lowercase variant names; every caller sees the
/// same eight members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    /// Facts and concepts
    Declarative,
    /// Personal experiences
    Episodic,
    /// How to do things
    Procedural,
    /// General knowledge
    Semantic,
    /// Short-term active processing
    Working,
    /// Perceptual information
    Sensory,
    /// Feelings and emotional states
    Emotional,
    /// Connections between other memories
    Associative,
}

impl MemoryType {
    /// Every memory type, in declaration order.
    pub const ALL: [MemoryType; 8] = [
        MemoryType::Declarative,
        MemoryType::Episodic,
        MemoryType::Procedural,
        MemoryType::Semantic,
        MemoryType::Working,
        MemoryType::Sensory,
        MemoryType::Emotional,
        MemoryType::Associative,
    ];

    /// The wire name of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Declarative => "declarative",
            MemoryType::Episodic => "episodic",
            MemoryType::Procedural => "procedural",
            MemoryType::Semantic => "semantic",
            MemoryType::Working => "working",
            MemoryType::Sensory => "sensory",
            MemoryType::Emotional => "emotional",
            MemoryType::Associative => "associative",
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = crate::error::MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "declarative" => Ok(MemoryType::Declarative),
            "episodic" => Ok(MemoryType::Episodic),
            "procedural" => Ok(MemoryType::Procedural),
            "semantic" => Ok(MemoryType::Semantic),
            "working" => Ok(MemoryType::Working),
            "sensory" => Ok(MemoryType::Sensory),
            "emotional" => Ok(MemoryType::Emotional),
            "associative" => Ok(MemoryType::Associative),
            other => Err(crate::error::MemoryError::validation(format!(
                "unknown memory type: {other}"
            ))),
        }
    }
}

fn default_source() -> String {
    "unknown".to_string()
}

/// A single memory: immutable identity, mutable content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryNode {
    /// Unique identifier, never reused
    pub id: MemoryId,
    /// Text payload; the primary searchable field
    pub content: String,
    /// Kind of memory
    pub memory_type: MemoryType,
    /// When the memory was created
    pub creation_time: DateTime<Utc>,
    /// When the memory was last read
    pub last_access_time: DateTime<Utc>,
    /// Successful retrievals of this memory
    #[serde(default)]
    pub access_count: u64,
    /// Importance weight in [0, 1]; influences retention
    pub salience: f32,
    /// Resonance weight in [0, 1]; influences ranking and eviction
    pub echo_value: f32,
    /// Provenance tag
    #[serde(default = "default_source")]
    pub source: String,
    /// Open key/value annotations
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Opaque vector attached by callers; never interpreted here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeddings: Option<Vec<f32>>,
}

impl MemoryNode {
    /// Create a node with defaults for everything but content and type
    pub fn new(content: impl Into<String>, memory_type: MemoryType) -> Self {
        let now = Utc::now();
        Self {
            id: MemoryId::new(),
            content: content.into(),
            memory_type,
            creation_time: now,
            last_access_time: now,
            access_count: 0,
            salience: 0.5,
            echo_value: 0.0,
            source: default_source(),
            metadata: HashMap::new(),
            embeddings: None,
        }
    }

    /// Create a new builder for MemoryNode
    pub fn builder() -> MemoryNodeBuilder {
        MemoryNodeBuilder::default()
    }

    /// Record a successful read
    pub fn touch(&mut self) {
        self.last_access_time = Utc::now();
        self.access_count += 1;
    }

    /// Set the echo value, clamped to [0, 1]
    pub fn set_echo_value(&mut self, value: f32) {
        self.echo_value = value.clamp(0.0, 1.0);
    }

    /// Set the salience, clamped to [0, 1]
    pub fn set_salience(&mut self, value: f32) {
        self.salience = value.clamp(0.0, 1.0);
    }
}

/// Builder for MemoryNode with fluent API
#[derive(Debug, Default)]
pub struct MemoryNodeBuilder {
    id: Option<MemoryId>,
    content: Option<String>,
    memory_type: Option<MemoryType>,
    salience: Option<f32>,
    echo_value: Option<f32>,
    source: Option<String>,
    metadata: HashMap<String, serde_json::Value>,
    embeddings: Option<Vec<f32>>,
}

impl MemoryNodeBuilder {
    /// Set the memory id (auto-generated if not set)
    pub fn id(mut self, id: MemoryId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the content
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Set the memory type
    pub fn memory_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = Some(memory_type);
        self
    }

    /// Set the salience, clamped to [0, 1]
    pub fn salience(mut self, salience: f32) -> Self {
        self.salience = Some(salience.clamp(0.0, 1.0));
        self
    }

    /// Set the echo value, clamped to [0, 1]
    pub fn echo_value(mut self, echo_value: f32) -> Self {
        self.echo_value = Some(echo_value.clamp(0.0, 1.0));
        self
    }

    /// Set the provenance tag
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Replace the whole metadata map
    pub fn metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Insert one metadata entry
    pub fn metadata_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Attach an opaque embedding vector
    pub fn embeddings(mut self, embeddings: Vec<f32>) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    /// Build the MemoryNode
    pub fn build(self) -> Result<MemoryNode, MemoryNodeBuilderError> {
        let content = self.content.ok_or(MemoryNodeBuilderError::MissingContent)?;
        let memory_type = self
            .memory_type
            .ok_or(MemoryNodeBuilderError::MissingMemoryType)?;

        let now = Utc::now();
        Ok(MemoryNode {
            id: self.id.unwrap_or_default(),
            content,
            memory_type,
            creation_time: now,
            last_access_time: now,
            access_count: 0,
            salience: self.salience.unwrap_or(0.5),
            echo_value: self.echo_value.unwrap_or(0.0),
            source: self.source.unwrap_or_else(default_source),
            metadata: self.metadata,
            embeddings: self.embeddings,
        })
    }
}

/// Errors that can occur when building a MemoryNode
#[derive(Debug, thiserror::Error)]
pub enum MemoryNodeBuilderError {
    #[error("Missing required field: content")]
    MissingContent,
    #[error("Missing required field: memory_type")]
    MissingMemoryType,
}

/// A typed, weighted relation between two memory nodes
///
/// Endpoints are weak references; deleting a node removes every edge that
/// touches it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEdge {
    /// Origin node
    pub source_id: MemoryId,
    /// Destination node
    pub target_id: MemoryId,
    /// Relation label, e.g. "associates_with" or "derived_from"
    pub relation_type: String,
    /// Strength of the relation in [0, 1]
    pub weight: f32,
    /// When the relation was recorded
    pub creation_time: DateTime<Utc>,
    /// Open key/value annotations
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl MemoryEdge {
    /// Create an edge with the default weight
    pub fn new(source_id: MemoryId, target_id: MemoryId, relation_type: impl Into<String>) -> Self {
        Self {
            source_id,
            target_id,
            relation_type: relation_type.into(),
            weight: 0.5,
            creation_time: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Set the weight, clamped to [0, 1]
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight.clamp(0.0, 1.0);
        self
    }

    /// Whether this edge references the given node
    pub fn touches(&self, id: MemoryId) -> bool {
        self.source_id == id || self.target_id == id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_id_generation() {
        let id1 = MemoryId::new();
        let id2 = MemoryId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_memory_id_parse() {
        let id = MemoryId::new();
        let s = id.to_string();
        let parsed: MemoryId = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_memory_type_members() {
        assert_eq!(MemoryType::ALL.len(), 8);
        for memory_type in MemoryType::ALL {
            let parsed: MemoryType = memory_type.as_str().parse().unwrap();
            assert_eq!(parsed, memory_type);
        }
    }

    #[test]
    fn test_memory_type_parse_case_insensitive() {
        let parsed: MemoryType = "SEMANTIC".parse().unwrap();
        assert_eq!(parsed, MemoryType::Semantic);
        assert!("perceptual".parse::<MemoryType>().is_err());
    }

    #[test]
    fn test_memory_type_wire_name() {
        let json = serde_json::to_string(&MemoryType::Associative).unwrap();
        assert_eq!(json, "\"associative\"");
    }

    #[test]
    fn test_builder_defaults() {
        let node = MemoryNode::builder()
            .content("The sky is blue")
            .memory_type(MemoryType::Declarative)
            .build()
            .unwrap();

        assert_eq!(node.content, "The sky is blue");
        assert_eq!(node.access_count, 0);
        assert_eq!(node.salience, 0.5);
        assert_eq!(node.echo_value, 0.0);
        assert_eq!(node.source, "unknown");
    }

    #[test]
    fn test_builder_clamps_weights() {
        let node = MemoryNode::builder()
            .content("overdriven")
            .memory_type(MemoryType::Emotional)
            .echo_value(3.2)
            .salience(-1.0)
            .build()
            .unwrap();

        assert_eq!(node.echo_value, 1.0);
        assert_eq!(node.salience, 0.0);
    }

    #[test]
    fn test_builder_missing_required() {
        let result = MemoryNode::builder().content("no type").build();
        assert!(matches!(
            result,
            Err(MemoryNodeBuilderError::MissingMemoryType)
        ));

        let result = MemoryNode::builder()
            .memory_type(MemoryType::Episodic)
            .build();
        assert!(matches!(result, Err(MemoryNodeBuilderError::MissingContent)));
    }

    #[test]
    fn test_touch_updates_access_stats() {
        let mut node = MemoryNode::new("touch me", MemoryType::Working);
        let before = node.last_access_time;
        node.touch();
        assert_eq!(node.access_count, 1);
        assert!(node.last_access_time >= before);
    }

    #[test]
    fn test_edge_weight_clamped() {
        let a = MemoryId::new();
        let b = MemoryId::new();
        let edge = MemoryEdge::new(a, b, "associates_with").with_weight(2.5);
        assert_eq!(edge.weight, 1.0);
        assert!(edge.touches(a));
        assert!(edge.touches(b));
        assert!(!edge.touches(MemoryId::new()));
    }

    #[test]
    fn test_node_serialization_round_trip() {
        let node = MemoryNode::builder()
            .content("Serialized fact")
            .memory_type(MemoryType::Semantic)
            .echo_value(0.8)
            .metadata_entry("topic", serde_json::json!("serialization"))
            .embeddings(vec![0.25, -0.5, 0.75])
            .build()
            .unwrap();

        let json = serde_json::to_string(&node).unwrap();
        let restored: MemoryNode = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.id, node.id);
        assert_eq!(restored.content, node.content);
        assert_eq!(restored.memory_type, node.memory_type);
        assert_eq!(restored.echo_value, node.echo_value);
        assert_eq!(restored.embeddings, node.embeddings);
        assert_eq!(restored.metadata, node.metadata);
    }
}
