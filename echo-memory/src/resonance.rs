//! Echo resonance engine
//!
//! Ranks stored memories against a query by combining lexical match,
//! echo value, and recency. Also produces the "resonant memories" snapshot
//! returned by the echo operation.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::node::{MemoryId, MemoryNode, MemoryType};
use crate::store::HypergraphStore;

/// Relative weight of each ranking signal
const LEXICAL_WEIGHT: f32 = 0.5;
const ECHO_WEIGHT: f32 = 0.3;
const RECENCY_WEIGHT: f32 = 0.2;

/// Half-life of the recency signal, in seconds
const RECENCY_HALF_LIFE_SECS: f32 = 3600.0;

/// Per-signal score breakdown for a ranked result
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScoreBreakdown {
    pub lexical: f32,
    pub echo: f32,
    pub recency: f32,
    pub combined: f32,
}

/// A ranked retrieval hit
#[derive(Debug, Clone, Serialize)]
pub struct RankedMemory {
    /// The matched record
    pub memory: MemoryNode,
    /// How the record scored
    pub score: ScoreBreakdown,
}

/// Tokenize text into search terms
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.len() > 2)
        .map(String::from)
        .collect()
}

/// Lexical closeness of `content` to the query, in [0, 1]
///
/// A whole-phrase substring match scores 1.0; otherwise the fraction of
/// query terms present in the content. Zero means no lexical relation.
fn lexical_score(query_lc: &str, query_tokens: &[String], content: &str) -> f32 {
    let content_lc = content.to_lowercase();
    if !query_lc.is_empty() && content_lc.contains(query_lc) {
        return 1.0;
    }
    if query_tokens.is_empty() {
        return 0.0;
    }
    let hits = query_tokens
        .iter()
        .filter(|token| content_lc.contains(token.as_str()))
        .count();
    hits as f32 / query_tokens.len() as f32
}

/// Exponential decay over the time since the record was last touched
fn recency_score(last_access: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
    let age_secs = (now - last_access).num_milliseconds().max(0) as f32 / 1000.0;
    0.5_f32.powf(age_secs / RECENCY_HALF_LIFE_SECS)
}

fn score_node(
    query_lc: &str,
    query_tokens: &[String],
    node: &MemoryNode,
    now: DateTime<Utc>,
) -> Option<ScoreBreakdown> {
    let lexical = lexical_score(query_lc, query_tokens, &node.content);
    if lexical <= 0.0 {
        return None;
    }
    let echo = node.echo_value;
    let recency = recency_score(node.last_access_time, now);
    let combined = LEXICAL_WEIGHT * lexical + ECHO_WEIGHT * echo + RECENCY_WEIGHT * recency;
    Some(ScoreBreakdown {
        lexical,
        echo,
        recency,
        combined,
    })
}

/// Order hits by combined score, breaking ties by echo value then recency
fn rank(hits: &mut Vec<RankedMemory>, limit: usize) {
    hits.sort_by(|a, b| {
        b.score
            .combined
            .partial_cmp(&a.score.combined)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.memory
                    .echo_value
                    .partial_cmp(&a.memory.echo_value)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| b.memory.last_access_time.cmp(&a.memory.last_access_time))
    });
    hits.truncate(limit);
}

/// Ranked search over the store
///
/// Candidates whose echo value falls below `echo_threshold`, or with no
/// lexical relation to the query, are excluded before ranking.
pub fn search(
    store: &HypergraphStore,
    query: &str,
    type_filter: Option<MemoryType>,
    echo_threshold: f32,
    max_results: usize,
) -> Vec<RankedMemory> {
    let query_lc = query.to_lowercase();
    let query_tokens = tokenize(query);
    let now = Utc::now();

    let mut hits: Vec<RankedMemory> = store
        .nodes()
        .filter(|node| type_filter.map_or(true, |t| node.memory_type == t))
        .filter(|node| node.echo_value >= echo_threshold)
        .filter_map(|node| {
            score_node(&query_lc, &query_tokens, node, now).map(|score| RankedMemory {
                memory: node.clone(),
                score,
            })
        })
        .collect();

    rank(&mut hits, max_results);
    hits
}

/// Memories resonating with newly reinforced content
///
/// The read half of the echo operation: ranks existing records closest to
/// `content` whose echo value exceeds the threshold, excluding the record
/// that carried the reinforcement itself.
pub fn resonants(
    store: &HypergraphStore,
    content: &str,
    echo_threshold: f32,
    limit: usize,
    exclude: MemoryId,
) -> Vec<RankedMemory> {
    let content_lc = content.to_lowercase();
    let content_tokens = tokenize(content);
    let now = Utc::now();

    let mut hits: Vec<RankedMemory> = store
        .nodes()
        .filter(|node| node.id != exclude)
        .filter(|node| node.echo_value > echo_threshold)
        .filter_map(|node| {
            score_node(&content_lc, &content_tokens, node, now).map(|score| RankedMemory {
                memory: node.clone(),
                score,
            })
        })
        .collect();

    rank(&mut hits, limit);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::MemoryNode;

    fn store_with(entries: &[(&str, f32)]) -> HypergraphStore {
        let mut store = HypergraphStore::new();
        for (content, echo_value) in entries {
            let node = MemoryNode::builder()
                .content(*content)
                .memory_type(MemoryType::Semantic)
                .echo_value(*echo_value)
                .build()
                .unwrap();
            store.insert(node).unwrap();
        }
        store
    }

    #[test]
    fn test_tokenize_drops_short_terms() {
        let tokens = tokenize("How to ride a bicycle");
        assert!(tokens.contains(&"ride".to_string()));
        assert!(tokens.contains(&"bicycle".to_string()));
        assert!(!tokens.contains(&"to".to_string()));
        assert!(!tokens.contains(&"a".to_string()));
    }

    #[test]
    fn test_search_matches_relevant_content_only() {
        let store = store_with(&[
            ("Important business meeting", 0.9),
            ("How to ride a bicycle", 0.9),
        ]);

        let hits = search(&store, "meeting", None, 0.5, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory.content, "Important business meeting");
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let store = store_with(&[("Important Business Meeting", 0.5)]);
        let hits = search(&store, "MEETING", None, 0.0, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score.lexical, 1.0);
    }

    #[test]
    fn test_search_excludes_below_threshold() {
        let store = store_with(&[
            ("meeting with the faint echo", 0.2),
            ("meeting with the strong echo", 0.8),
        ]);

        let hits = search(&store, "meeting", None, 0.5, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory.content, "meeting with the strong echo");

        // a zero threshold admits both
        assert_eq!(search(&store, "meeting", None, 0.0, 10).len(), 2);
    }

    #[test]
    fn test_search_type_filter() {
        let mut store = store_with(&[("standup meeting notes", 0.6)]);
        let working = MemoryNode::builder()
            .content("meeting scratchpad")
            .memory_type(MemoryType::Working)
            .echo_value(0.6)
            .build()
            .unwrap();
        store.insert(working).unwrap();

        let hits = search(&store, "meeting", Some(MemoryType::Working), 0.0, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory.memory_type, MemoryType::Working);
    }

    #[test]
    fn test_search_truncates_to_max_results() {
        let store = store_with(&[
            ("meeting one", 0.5),
            ("meeting two", 0.5),
            ("meeting three", 0.5),
        ]);
        assert_eq!(search(&store, "meeting", None, 0.0, 2).len(), 2);
    }

    #[test]
    fn test_higher_echo_ranks_first_on_equal_match() {
        let store = store_with(&[("quarterly meeting", 0.3), ("quarterly meeting", 0.9)]);

        let hits = search(&store, "quarterly meeting", None, 0.0, 10);
        assert_eq!(hits.len(), 2);
        assert!(hits[0].memory.echo_value > hits[1].memory.echo_value);
    }

    #[test]
    fn test_partial_token_overlap_scores_between_zero_and_one() {
        let store = store_with(&[("bicycle repair manual", 0.5)]);
        let hits = search(&store, "bicycle maintenance", None, 0.0, 10);
        assert_eq!(hits.len(), 1);
        let lexical = hits[0].score.lexical;
        assert!(lexical > 0.0 && lexical < 1.0);
    }

    #[test]
    fn test_recency_decays() {
        let now = Utc::now();
        let fresh = recency_score(now, now);
        let hour_old = recency_score(now - chrono::Duration::hours(1), now);
        let day_old = recency_score(now - chrono::Duration::days(1), now);

        assert!(fresh > 0.99);
        assert!((hour_old - 0.5).abs() < 0.01);
        assert!(day_old < hour_old);
    }

    #[test]
    fn test_resonants_excludes_self_and_requires_echo_above_threshold() {
        let mut store = store_with(&[
            ("deep tree echo resonance", 0.8),
            ("deep tree echo resonance", 0.0),
        ]);
        let echo_node = MemoryNode::builder()
            .content("deep tree echo resonance")
            .memory_type(MemoryType::Associative)
            .echo_value(0.9)
            .build()
            .unwrap();
        let echo_id = store.insert(echo_node).unwrap();

        let hits = resonants(&store, "deep tree echo resonance", 0.5, 10, echo_id);
        assert_eq!(hits.len(), 1);
        assert_ne!(hits[0].memory.id, echo_id);
        assert_eq!(hits[0].memory.echo_value, 0.8);
    }
}
