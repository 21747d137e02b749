//! Unified memory facade
//!
//! Single entry point for every memory operation. Validates operation
//! descriptors once at the boundary, routes them to the store, working-set
//! regulator, and resonance engine under one lock region, and wraps every
//! outcome in a uniform response envelope. Also owns the component
//! lifecycle and the auto-save task.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{MemoryError, Result};
use crate::node::{MemoryEdge, MemoryId, MemoryNode, MemoryType};
use crate::persistence::{Snapshot, SnapshotGateway};
use crate::resonance;
use crate::store::HypergraphStore;
use crate::working::WorkingSet;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Name used in log lines and as the default provenance tag
    pub component_name: String,
    /// Working-set capacity
    pub working_capacity: usize,
    /// Delete evicted working records from the store instead of only
    /// dropping them from the bounded view
    pub evict_from_store: bool,
    /// Auto-save period; zero disables the timer
    pub auto_save_interval: Duration,
    /// Snapshot directory; in-memory only when absent
    pub storage_path: Option<PathBuf>,
    /// Result limit applied when a request does not carry one
    pub default_max_results: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            component_name: "echo-memory".to_string(),
            working_capacity: 7,
            evict_from_store: false,
            auto_save_interval: Duration::from_secs(300),
            storage_path: None,
            default_max_results: 10,
        }
    }
}

impl MemoryConfig {
    /// Set the component name
    pub fn with_component_name(mut self, name: impl Into<String>) -> Self {
        self.component_name = name.into();
        self
    }

    /// Set the snapshot directory
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// Set the working-set capacity
    pub fn with_working_capacity(mut self, capacity: usize) -> Self {
        self.working_capacity = capacity;
        self
    }

    /// Evicted working records are also deleted from the store
    pub fn with_evict_from_store(mut self, evict: bool) -> Self {
        self.evict_from_store = evict;
        self
    }

    /// Set the auto-save period
    pub fn with_auto_save_interval(mut self, interval: Duration) -> Self {
        self.auto_save_interval = interval;
        self
    }
}

/// Lifecycle states of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
    ShutDown,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Initializing => "initializing",
            LifecycleState::Ready => "ready",
            LifecycleState::ShutDown => "shut_down",
        })
    }
}

/// Analysis flavors understood by the analyze operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    #[default]
    Overview,
    EchoPatterns,
    Temporal,
}

impl AnalysisKind {
    /// The wire name of this analysis kind
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Overview => "overview",
            AnalysisKind::EchoPatterns => "echo_patterns",
            AnalysisKind::Temporal => "temporal",
        }
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation descriptor accepted by [`EchoMemory::process`]
///
/// Deserializes from the wire shape `{"operation": "...", ...}`; unknown
/// operations and malformed fields fail at the boundary before any state
/// is touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum MemoryOp {
    Store {
        content: String,
        memory_type: MemoryType,
        #[serde(default)]
        echo_value: f32,
        #[serde(default)]
        salience: Option<f32>,
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        metadata: HashMap<String, Value>,
        #[serde(default)]
        embeddings: Option<Vec<f32>>,
    },
    Retrieve {
        memory_id: String,
    },
    Update {
        memory_id: String,
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        metadata: Option<HashMap<String, Value>>,
        #[serde(default)]
        echo_value: Option<f32>,
        #[serde(default)]
        salience: Option<f32>,
    },
    Delete {
        memory_id: String,
    },
    Search {
        query: String,
        #[serde(default)]
        memory_type: Option<MemoryType>,
        #[serde(default)]
        echo_threshold: f32,
        #[serde(default)]
        max_results: Option<usize>,
    },
    Echo {
        data: Value,
        echo_value: f32,
        #[serde(default)]
        echo_threshold: f32,
        #[serde(default)]
        max_resonant: Option<usize>,
    },
    Link {
        source_id: String,
        target_id: String,
        relation_type: String,
        #[serde(default)]
        weight: Option<f32>,
    },
    Analyze {
        #[serde(default)]
        analysis_type: AnalysisKind,
    },
    Clear,
}

/// Uniform response envelope returned by every operation
#[derive(Debug, Clone, Serialize)]
pub struct MemoryResponse {
    /// Whether the operation succeeded
    pub success: bool,
    /// Human-readable outcome
    pub message: String,
    /// Operation result payload
    pub data: Option<Value>,
    /// Diagnostic context (counts, ids, flags)
    pub metadata: Map<String, Value>,
}

impl MemoryResponse {
    /// Successful response
    pub fn ok(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            metadata: Map::new(),
        }
    }

    /// Failed response
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            metadata: Map::new(),
        }
    }

    /// Attach a metadata entry
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    fn from_error(error: &MemoryError) -> Self {
        let mut response = Self::fail(error.to_string());
        if matches!(error, MemoryError::NotFound(_)) {
            response.metadata.insert("found".into(), Value::Bool(false));
        }
        response
    }
}

/// Point-in-time view of the engine for lifecycle control
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStatus {
    pub state: LifecycleState,
    pub node_count: usize,
    pub edge_count: usize,
    pub working_len: usize,
    pub working_capacity: usize,
    pub degraded: bool,
    pub total_operations: u64,
    pub last_operation_time: Option<DateTime<Utc>>,
}

/// Everything a mutating operation needs under one lock
struct CoreState {
    graph: HypergraphStore,
    working: WorkingSet,
    last_operation_time: Option<DateTime<Utc>>,
}

/// Unified memory engine facade
///
/// Each instance exclusively owns its store and working set. Callers that
/// need a process-wide instance wrap one in their own `Arc`; nothing here
/// is a global.
pub struct EchoMemory {
    config: MemoryConfig,
    state: Arc<RwLock<CoreState>>,
    lifecycle: RwLock<LifecycleState>,
    gateway: RwLock<Option<SnapshotGateway>>,
    autosave: Mutex<Option<JoinHandle<()>>>,
    mutation_counter: Arc<AtomicU64>,
    degraded: Arc<AtomicBool>,
    total_operations: AtomicU64,
}

fn parse_id(raw: &str) -> Result<MemoryId> {
    raw.parse().map_err(|_| MemoryError::not_found(raw))
}

fn rebuild_working(graph: &HypergraphStore, capacity: usize) -> WorkingSet {
    let mut working = WorkingSet::new(capacity);
    let mut records = graph.nodes_of_type(MemoryType::Working);
    records.sort_by_key(|node| node.last_access_time);
    for node in records {
        working.touch(node.id);
    }
    working
}

impl EchoMemory {
    /// Create an engine from configuration; call [`initialize`] before use
    ///
    /// [`initialize`]: EchoMemory::initialize
    pub fn new(config: MemoryConfig) -> Self {
        let working = WorkingSet::new(config.working_capacity);
        Self {
            config,
            state: Arc::new(RwLock::new(CoreState {
                graph: HypergraphStore::new(),
                working,
                last_operation_time: None,
            })),
            lifecycle: RwLock::new(LifecycleState::Uninitialized),
            gateway: RwLock::new(None),
            autosave: Mutex::new(None),
            mutation_counter: Arc::new(AtomicU64::new(0)),
            degraded: Arc::new(AtomicBool::new(false)),
            total_operations: AtomicU64::new(0),
        }
    }

    /// Collaborator factory: a named component persisting at `storage_path`
    pub fn with_storage(component_name: impl Into<String>, storage_path: impl Into<PathBuf>) -> Self {
        Self::new(
            MemoryConfig::default()
                .with_component_name(component_name)
                .with_storage_path(storage_path),
        )
    }

    /// The engine configuration
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn lifecycle(&self) -> LifecycleState {
        *self.lifecycle.read()
    }

    /// Load the snapshot (if any), rebuild the working set, start auto-save,
    /// and become ready
    ///
    /// Persistence problems never fail initialization; the engine comes up
    /// empty and degraded instead.
    pub async fn initialize(&self) -> MemoryResponse {
        {
            let mut lifecycle = self.lifecycle.write();
            match *lifecycle {
                LifecycleState::Uninitialized => *lifecycle = LifecycleState::Initializing,
                LifecycleState::Initializing => {
                    return MemoryResponse::fail("initialization already in progress")
                }
                LifecycleState::Ready => {
                    return MemoryResponse::fail("engine is already initialized")
                }
                LifecycleState::ShutDown => return MemoryResponse::fail("engine is shut down"),
            }
        }

        let mut loaded = 0usize;
        if let Some(dir) = &self.config.storage_path {
            match SnapshotGateway::new(dir) {
                Ok(gateway) => {
                    if let Some(snapshot) = gateway.load() {
                        let graph = HypergraphStore::restore(snapshot.nodes, snapshot.edges);
                        let working = rebuild_working(&graph, self.config.working_capacity);
                        loaded = graph.len();
                        let mut state = self.state.write();
                        state.graph = graph;
                        state.working = working;
                    }
                    self.spawn_autosave(gateway.clone());
                    *self.gateway.write() = Some(gateway);
                }
                Err(e) => {
                    log::warn!(
                        "{}: storage unavailable, continuing in-memory only: {e}",
                        self.config.component_name
                    );
                    self.degraded.store(true, Ordering::Relaxed);
                }
            }
        }

        *self.lifecycle.write() = LifecycleState::Ready;
        log::info!(
            "{} initialized with {loaded} existing memories",
            self.config.component_name
        );

        MemoryResponse::ok(
            format!(
                "{} initialized with {loaded} memories",
                self.config.component_name
            ),
            None,
        )
        .with_meta("memory_count", json!(loaded))
        .with_meta("working_memory_capacity", json!(self.config.working_capacity))
    }

    /// Dispatch one operation
    ///
    /// Always returns an envelope; no fault escapes to the caller.
    pub async fn process(&self, op: MemoryOp) -> MemoryResponse {
        {
            let lifecycle = *self.lifecycle.read();
            if lifecycle != LifecycleState::Ready {
                let err = MemoryError::lifecycle(format!(
                    "engine is {lifecycle}, initialize it before issuing operations"
                ));
                return MemoryResponse::from_error(&err)
                    .with_meta("lifecycle_state", json!(lifecycle));
            }
        }
        self.total_operations.fetch_add(1, Ordering::Relaxed);

        let response = match op {
            MemoryOp::Store {
                content,
                memory_type,
                echo_value,
                salience,
                source,
                metadata,
                embeddings,
            } => self.op_store(content, memory_type, echo_value, salience, source, metadata, embeddings),
            MemoryOp::Retrieve { memory_id } => self.op_retrieve(&memory_id),
            MemoryOp::Update {
                memory_id,
                content,
                metadata,
                echo_value,
                salience,
            } => self.op_update(&memory_id, content, metadata, echo_value, salience),
            MemoryOp::Delete { memory_id } => self.op_delete(&memory_id),
            MemoryOp::Search {
                query,
                memory_type,
                echo_threshold,
                max_results,
            } => self.op_search(&query, memory_type, echo_threshold, max_results),
            MemoryOp::Echo {
                data,
                echo_value,
                echo_threshold,
                max_resonant,
            } => self.op_echo(data, echo_value, echo_threshold, max_resonant),
            MemoryOp::Link {
                source_id,
                target_id,
                relation_type,
                weight,
            } => self.op_link(&source_id, &target_id, relation_type, weight),
            MemoryOp::Analyze { analysis_type } => self.op_analyze(analysis_type),
            MemoryOp::Clear => self.op_clear(),
        };

        self.state.write().last_operation_time = Some(Utc::now());
        response
    }

    /// Validate an untyped operation descriptor and dispatch it
    pub async fn process_value(&self, value: Value) -> MemoryResponse {
        match serde_json::from_value::<MemoryOp>(value) {
            Ok(op) => self.process(op).await,
            Err(e) => MemoryResponse::fail(format!("invalid operation descriptor: {e}")),
        }
    }

    /// Serialize the graph and write it to the snapshot, retrying once
    pub async fn flush(&self) -> MemoryResponse {
        if *self.lifecycle.read() != LifecycleState::Ready {
            return MemoryResponse::fail("operation rejected: engine is not ready");
        }
        let Some(gateway) = self.gateway.read().as_ref().cloned() else {
            return MemoryResponse::fail("persistence is not configured");
        };

        // hold the read lock only for the serialization step
        let snapshot = {
            let state = self.state.read();
            let (nodes, edges) = state.graph.export();
            Snapshot::new(nodes, edges)
        };

        match gateway.save_with_retry(&snapshot) {
            Ok(()) => {
                self.degraded.store(false, Ordering::Relaxed);
                MemoryResponse::ok("Memories saved", None)
                    .with_meta("node_count", json!(snapshot.nodes.len()))
                    .with_meta("edge_count", json!(snapshot.edges.len()))
            }
            Err(e) => {
                log::warn!("Snapshot flush failed; in-memory state unaffected: {e}");
                self.degraded.store(true, Ordering::Relaxed);
                MemoryResponse::fail(format!("snapshot save failed: {e}"))
                    .with_meta("degraded", json!(true))
            }
        }
    }

    /// Point-in-time status, available in every lifecycle state
    pub fn get_status(&self) -> MemoryStatus {
        let state = self.state.read();
        MemoryStatus {
            state: self.lifecycle(),
            node_count: state.graph.len(),
            edge_count: state.graph.edge_count(),
            working_len: state.working.len(),
            working_capacity: state.working.capacity(),
            degraded: self.degraded.load(Ordering::Relaxed),
            total_operations: self.total_operations.load(Ordering::Relaxed),
            last_operation_time: state.last_operation_time,
        }
    }

    /// Drop all state and return to the uninitialized lifecycle state
    pub async fn reset(&self) -> MemoryResponse {
        if *self.lifecycle.read() == LifecycleState::ShutDown {
            return MemoryResponse::fail("engine is shut down");
        }
        self.stop_autosave();
        {
            let mut state = self.state.write();
            state.graph.clear();
            state.working.clear();
            state.last_operation_time = None;
        }
        *self.gateway.write() = None;
        self.degraded.store(false, Ordering::Relaxed);
        self.mutation_counter.store(0, Ordering::Relaxed);
        self.total_operations.store(0, Ordering::Relaxed);
        *self.lifecycle.write() = LifecycleState::Uninitialized;
        MemoryResponse::ok("Memory engine reset", None)
    }

    /// Flush once (when persistence is configured) and become terminal
    pub async fn shutdown(&self) -> MemoryResponse {
        if *self.lifecycle.read() == LifecycleState::ShutDown {
            return MemoryResponse::fail("engine is already shut down");
        }
        self.stop_autosave();
        if let Some(gateway) = self.gateway.read().as_ref().cloned() {
            let snapshot = {
                let state = self.state.read();
                let (nodes, edges) = state.graph.export();
                Snapshot::new(nodes, edges)
            };
            if let Err(e) = gateway.save_with_retry(&snapshot) {
                log::warn!("Final snapshot save failed during shutdown: {e}");
            }
        }
        *self.lifecycle.write() = LifecycleState::ShutDown;
        MemoryResponse::ok("Memory engine shut down", None)
    }

    // ---- convenience wrappers -------------------------------------------

    /// Store a memory with just content, type, and echo value
    pub async fn store_memory(
        &self,
        content: impl Into<String>,
        memory_type: MemoryType,
        echo_value: f32,
    ) -> MemoryResponse {
        self.process(MemoryOp::Store {
            content: content.into(),
            memory_type,
            echo_value,
            salience: None,
            source: None,
            metadata: HashMap::new(),
            embeddings: None,
        })
        .await
    }

    /// Retrieve a memory by id
    pub async fn retrieve_memory(&self, memory_id: &str) -> MemoryResponse {
        self.process(MemoryOp::Retrieve {
            memory_id: memory_id.to_string(),
        })
        .await
    }

    /// Ranked content search
    pub async fn search_memories(
        &self,
        query: impl Into<String>,
        memory_type: Option<MemoryType>,
        echo_threshold: f32,
        max_results: usize,
    ) -> MemoryResponse {
        self.process(MemoryOp::Search {
            query: query.into(),
            memory_type,
            echo_threshold,
            max_results: Some(max_results),
        })
        .await
    }

    /// Overview analysis of the whole store
    pub async fn memory_overview(&self) -> MemoryResponse {
        self.process(MemoryOp::Analyze {
            analysis_type: AnalysisKind::Overview,
        })
        .await
    }

    // ---- operation handlers ---------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn op_store(
        &self,
        content: String,
        memory_type: MemoryType,
        echo_value: f32,
        salience: Option<f32>,
        source: Option<String>,
        metadata: HashMap<String, Value>,
        embeddings: Option<Vec<f32>>,
    ) -> MemoryResponse {
        let mut builder = MemoryNode::builder()
            .content(content)
            .memory_type(memory_type)
            .echo_value(echo_value)
            .source(source.unwrap_or_else(|| self.config.component_name.clone()))
            .metadata(metadata);
        if let Some(salience) = salience {
            builder = builder.salience(salience);
        }
        if let Some(embeddings) = embeddings {
            builder = builder.embeddings(embeddings);
        }
        let node = match builder.build() {
            Ok(node) => node,
            Err(e) => return MemoryResponse::fail(e.to_string()),
        };

        let mut state = self.state.write();
        let id = match state.graph.insert(node) {
            Ok(id) => id,
            Err(e) => return MemoryResponse::from_error(&e),
        };
        if memory_type == MemoryType::Working {
            self.regulate(&mut state, id);
        }
        drop(state);
        self.mark_mutated();

        MemoryResponse::ok(
            format!("Memory stored with id {id}"),
            Some(json!({ "memory_id": id.to_string(), "memory_type": memory_type })),
        )
        .with_meta("memory_id", json!(id.to_string()))
        .with_meta("memory_type", json!(memory_type))
    }

    fn op_retrieve(&self, memory_id: &str) -> MemoryResponse {
        let id = match parse_id(memory_id) {
            Ok(id) => id,
            Err(e) => return MemoryResponse::from_error(&e),
        };

        let mut state = self.state.write();
        let record = match state.graph.access(id) {
            Some(node) => node.clone(),
            None => return MemoryResponse::from_error(&MemoryError::not_found(memory_id)),
        };
        if record.memory_type == MemoryType::Working {
            self.regulate(&mut state, id);
        }
        drop(state);
        self.mark_mutated();

        let data = match serde_json::to_value(&record) {
            Ok(value) => value,
            Err(e) => return MemoryResponse::from_error(&e.into()),
        };
        MemoryResponse::ok(format!("Memory retrieved: {memory_id}"), Some(data))
            .with_meta("memory_id", json!(memory_id))
            .with_meta("access_count", json!(record.access_count))
    }

    fn op_update(
        &self,
        memory_id: &str,
        content: Option<String>,
        metadata: Option<HashMap<String, Value>>,
        echo_value: Option<f32>,
        salience: Option<f32>,
    ) -> MemoryResponse {
        let id = match parse_id(memory_id) {
            Ok(id) => id,
            Err(e) => return MemoryResponse::from_error(&e),
        };

        let mut state = self.state.write();
        let is_working = match state.graph.get_mut(id) {
            Some(node) => {
                if let Some(content) = content {
                    node.content = content;
                }
                if let Some(metadata) = metadata {
                    node.metadata.extend(metadata);
                }
                if let Some(echo_value) = echo_value {
                    node.set_echo_value(echo_value);
                }
                if let Some(salience) = salience {
                    node.set_salience(salience);
                }
                node.memory_type == MemoryType::Working
            }
            None => return MemoryResponse::from_error(&MemoryError::not_found(memory_id)),
        };
        if is_working {
            self.regulate(&mut state, id);
        }
        drop(state);
        self.mark_mutated();

        MemoryResponse::ok(format!("Memory updated: {memory_id}"), None)
            .with_meta("memory_id", json!(memory_id))
    }

    fn op_delete(&self, memory_id: &str) -> MemoryResponse {
        let id = match parse_id(memory_id) {
            Ok(id) => id,
            Err(e) => return MemoryResponse::from_error(&e),
        };

        let mut state = self.state.write();
        if state.graph.remove(id).is_none() {
            return MemoryResponse::from_error(&MemoryError::not_found(memory_id));
        }
        state.working.remove(id);
        drop(state);
        self.mark_mutated();

        MemoryResponse::ok(format!("Memory deleted: {memory_id}"), None)
            .with_meta("memory_id", json!(memory_id))
    }

    fn op_search(
        &self,
        query: &str,
        memory_type: Option<MemoryType>,
        echo_threshold: f32,
        max_results: Option<usize>,
    ) -> MemoryResponse {
        let limit = max_results.unwrap_or(self.config.default_max_results);

        let state = self.state.read();
        let hits = resonance::search(&state.graph, query, memory_type, echo_threshold, limit);
        drop(state);

        let result_count = hits.len();
        let data = json!({
            "query": query,
            "result_count": result_count,
            "results": hits,
        });
        MemoryResponse::ok(
            format!("Search completed: {result_count} results found"),
            Some(data),
        )
        .with_meta("query", json!(query))
        .with_meta("result_count", json!(result_count))
    }

    fn op_echo(
        &self,
        data: Value,
        echo_value: f32,
        echo_threshold: f32,
        max_resonant: Option<usize>,
    ) -> MemoryResponse {
        let content = match &data {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let node = match MemoryNode::builder()
            .content(content.clone())
            .memory_type(MemoryType::Associative)
            .echo_value(echo_value)
            .source("echo_operation")
            .metadata_entry("echo_timestamp", json!(Utc::now().to_rfc3339()))
            .metadata_entry("original_data", data)
            .build()
        {
            Ok(node) => node,
            Err(e) => return MemoryResponse::fail(e.to_string()),
        };
        let clamped = node.echo_value;
        let limit = max_resonant.unwrap_or(self.config.default_max_results);

        // one write-lock hold keeps the reinforcement and its resonance
        // snapshot atomic with respect to other writers
        let mut state = self.state.write();
        let id = match state.graph.insert(node) {
            Ok(id) => id,
            Err(e) => return MemoryResponse::from_error(&e),
        };
        let resonant = resonance::resonants(&state.graph, &content, echo_threshold, limit, id);
        let working: Vec<String> = state
            .working
            .snapshot()
            .iter()
            .map(|id| id.to_string())
            .collect();
        drop(state);
        self.mark_mutated();

        let resonant_count = resonant.len();
        let payload = json!({
            "echo_memory_id": id.to_string(),
            "echo_value": clamped,
            "resonant_memories": resonant,
            "working_memory": working,
            "timestamp": Utc::now().to_rfc3339(),
        });
        MemoryResponse::ok(
            format!("Echo operation completed (value: {clamped:.2})"),
            Some(payload),
        )
        .with_meta("memory_id", json!(id.to_string()))
        .with_meta("resonant_count", json!(resonant_count))
    }

    fn op_link(
        &self,
        source_id: &str,
        target_id: &str,
        relation_type: String,
        weight: Option<f32>,
    ) -> MemoryResponse {
        let source = match parse_id(source_id) {
            Ok(id) => id,
            Err(e) => return MemoryResponse::from_error(&e),
        };
        let target = match parse_id(target_id) {
            Ok(id) => id,
            Err(e) => return MemoryResponse::from_error(&e),
        };
        let edge = MemoryEdge::new(source, target, relation_type).with_weight(weight.unwrap_or(0.5));

        let mut state = self.state.write();
        match state.graph.link(edge) {
            Ok(()) => {
                drop(state);
                self.mark_mutated();
                MemoryResponse::ok(format!("Linked {source_id} -> {target_id}"), None)
            }
            Err(e) => MemoryResponse::from_error(&e),
        }
    }

    fn op_analyze(&self, kind: AnalysisKind) -> MemoryResponse {
        let state = self.state.read();
        let data = match kind {
            AnalysisKind::Overview => overview(&state),
            AnalysisKind::EchoPatterns => echo_patterns(&state.graph),
            AnalysisKind::Temporal => temporal(&state.graph),
        };
        drop(state);

        MemoryResponse::ok(format!("Memory analysis completed: {kind}"), Some(data))
            .with_meta("analysis_type", json!(kind))
    }

    fn op_clear(&self) -> MemoryResponse {
        let mut state = self.state.write();
        state.graph.clear();
        state.working.clear();
        drop(state);
        self.mark_mutated();

        MemoryResponse::ok("Memory cleared", None)
    }

    // ---- internals ------------------------------------------------------

    /// Touch the working set for a WORKING record and apply the eviction
    /// policy to anything that falls out
    fn regulate(&self, state: &mut CoreState, id: MemoryId) {
        let evicted = state.working.touch(id);
        if self.config.evict_from_store {
            for old in evicted {
                if state.graph.remove(old).is_some() {
                    log::debug!("Evicted working memory {old} from store");
                }
            }
        }
    }

    fn mark_mutated(&self) {
        self.mutation_counter.fetch_add(1, Ordering::Relaxed);
    }

    fn spawn_autosave(&self, gateway: SnapshotGateway) {
        if self.config.auto_save_interval.is_zero() {
            return;
        }
        let state = Arc::clone(&self.state);
        let counter = Arc::clone(&self.mutation_counter);
        let degraded = Arc::clone(&self.degraded);
        let period = self.config.auto_save_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            let mut saved_at = 0u64;
            loop {
                ticker.tick().await;
                let current = counter.load(Ordering::Relaxed);
                if current == saved_at {
                    continue;
                }
                // serialize under the read lock, write outside it
                let snapshot = {
                    let state = state.read();
                    let (nodes, edges) = state.graph.export();
                    Snapshot::new(nodes, edges)
                };
                match gateway.save_with_retry(&snapshot) {
                    Ok(()) => {
                        saved_at = current;
                        degraded.store(false, Ordering::Relaxed);
                    }
                    Err(e) => {
                        log::warn!("Auto-save failed; continuing in-memory: {e}");
                        degraded.store(true, Ordering::Relaxed);
                    }
                }
            }
        });
        *self.autosave.lock() = Some(handle);
    }

    fn stop_autosave(&self) {
        if let Some(handle) = self.autosave.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for EchoMemory {
    fn drop(&mut self) {
        self.stop_autosave();
    }
}

// ---- analysis helpers ---------------------------------------------------

fn stats(values: &[f64]) -> Value {
    if values.is_empty() {
        return json!({ "mean": 0.0, "std_dev": 0.0, "min": 0.0, "max": 0.0 });
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    json!({ "mean": mean, "std_dev": variance.sqrt(), "min": min, "max": max })
}

fn overview(state: &CoreState) -> Value {
    let graph = &state.graph;
    let mut distribution = Map::new();
    for (memory_type, count) in graph.type_distribution() {
        distribution.insert(memory_type.to_string(), json!(count));
    }

    let echo_values: Vec<f64> = graph.nodes().map(|n| n.echo_value as f64).collect();
    let total_accesses: u64 = graph.nodes().map(|n| n.access_count).sum();
    let mean_accesses = if graph.is_empty() {
        0.0
    } else {
        total_accesses as f64 / graph.len() as f64
    };

    json!({
        "total_memories": graph.len(),
        "memory_type_distribution": distribution,
        "echo_statistics": stats(&echo_values),
        "access_statistics": { "mean": mean_accesses, "total": total_accesses },
        "working_memory": { "size": state.working.len(), "capacity": state.working.capacity() },
        "edge_count": graph.edge_count(),
    })
}

fn echo_patterns(graph: &HypergraphStore) -> Value {
    let mut counts = [0u64; 10];
    for node in graph.nodes() {
        let bin = ((node.echo_value * 10.0) as usize).min(9);
        counts[bin] += 1;
    }
    let bins: Vec<f64> = (0..=10).map(|i| f64::from(i) / 10.0).collect();
    json!({ "bins": bins, "counts": counts.to_vec(), "total_memories": graph.len() })
}

fn temporal(graph: &HypergraphStore) -> Value {
    if graph.is_empty() {
        return json!({ "total_memories": 0 });
    }
    let now = Utc::now();
    let earliest = graph.nodes().map(|n| n.creation_time).min().expect("nonempty");
    let latest = graph.nodes().map(|n| n.creation_time).max().expect("nonempty");
    let recent_accesses = graph
        .nodes()
        .filter(|n| now - n.last_access_time < chrono::Duration::hours(1))
        .count();
    let never_accessed = graph.nodes().filter(|n| n.access_count == 0).count();

    json!({
        "total_memories": graph.len(),
        "creation_time_range": {
            "earliest": earliest.to_rfc3339(),
            "latest": latest.to_rfc3339(),
            "span_hours": (latest - earliest).num_milliseconds() as f64 / 3_600_000.0,
        },
        "access_patterns": {
            "recent_accesses": recent_accesses,
            "never_accessed": never_accessed,
        },
    })
}
