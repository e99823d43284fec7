//! End-to-end tests for relationship discovery, inverse mirroring,
//! traversal and graph statistics.
//!
//! Each test builds a small element index in memory, runs discovery or a
//! traversal, and checks the stored edges.

use std::time::Instant;

use pretty_assertions::assert_eq;
use portfolio_sync::config::RelationshipConfig;
use portfolio_sync::model::INVERSE_MARKER;
use portfolio_sync::{
    Config, ElementId, ElementType, IndexedElement, LocalStore, Portfolio, Relationship, RelationshipGraph,
    RelationshipType, TraversalOptions, deduplicate,
};

// ============================================================================
// Helpers
// ============================================================================

fn id(s: &str) -> ElementId {
    ElementId::parse(s).unwrap()
}

/// a -> b -> c -> d, all `uses` at 0.9, plus a weak a -> e.
fn chain() -> RelationshipGraph {
    let mut g = RelationshipGraph::default();
    for name in ["a", "b", "c", "d", "e"] {
        g.insert_element(id(&format!("skills:{name}")), IndexedElement::new(name));
    }
    g.link(&id("skills:a"), RelationshipType::Uses, &id("skills:b"), 0.9).unwrap();
    g.link(&id("skills:b"), RelationshipType::Uses, &id("skills:c"), 0.9).unwrap();
    g.link(&id("skills:c"), RelationshipType::Uses, &id("skills:d"), 0.9).unwrap();
    g.link(&id("skills:a"), RelationshipType::SimilarTo, &id("skills:e"), 0.2).unwrap();
    g
}

// ============================================================================
// 1. Discovery scenario: "This skill uses debugging-helper"
// ============================================================================

#[test]
fn test_discovers_uses_edge_and_mirror() {
    let mut g = RelationshipGraph::default();
    g.insert_element(
        id("skills:code-review"),
        IndexedElement::new("Code Review").with_description("This skill uses debugging-helper"),
    );
    g.insert_element(id("skills:debugging-helper"), IndexedElement::new("Debugging Helper"));

    let report = g.discover_all();
    assert!(!report.timed_out);
    assert!(report.failed.is_empty());

    let source = g.get(&id("skills:code-review")).unwrap();
    let uses = &source.relationships[&RelationshipType::Uses];
    assert_eq!(uses.len(), 1);
    assert_eq!(uses[0].element, "skills:debugging-helper");
    assert_eq!(uses[0].strength, Some(0.8));

    let target = g.get(&id("skills:debugging-helper")).unwrap();
    let used_by = &target.relationships[&RelationshipType::UsedBy];
    assert_eq!(used_by.len(), 1);
    assert_eq!(used_by[0].element, "skills:code-review");
    assert_eq!(used_by[0].strength, Some(0.8));
    assert_eq!(used_by[0].metadata.get(INVERSE_MARKER), Some(&serde_json::Value::Bool(true)));
}

#[test]
fn test_discovery_is_idempotent() {
    let mut g = RelationshipGraph::default();
    g.insert_element(
        id("skills:code-review"),
        IndexedElement::new("Code Review").with_description("This skill uses debugging-helper"),
    );
    g.insert_element(id("skills:debugging-helper"), IndexedElement::new("Debugging Helper"));

    g.discover_all();
    let before = g.stats().total_relationships;
    let second = g.discover_all();
    assert_eq!(second.added, 0);
    assert_eq!(g.stats().total_relationships, before);
}

// ============================================================================
// 2. Discovery budget
// ============================================================================

#[test]
fn test_exhausted_budget_keeps_partial_results() {
    let mut g = RelationshipGraph::new(RelationshipConfig { discovery_budget_ms: 0, ..Default::default() });
    for i in 0..10 {
        g.insert_element(
            id(&format!("skills:s{i}")),
            IndexedElement::new(format!("S{i}")).with_description("uses s0"),
        );
    }

    let report = g.discover_all_until(Instant::now());
    assert!(report.timed_out);
    assert_eq!(report.processed, 0);

    let report = g.discover_all();
    assert!(report.timed_out);
    assert!(report.processed < 10);
}

// ============================================================================
// 3. Inverses
// ============================================================================

#[test]
fn test_every_asymmetric_type_mirrors_with_same_strength() {
    for rel_type in RelationshipType::ALL {
        let mut g = RelationshipGraph::default();
        g.insert_element(id("agents:x"), IndexedElement::new("x"));
        g.insert_element(id("agents:y"), IndexedElement::new("y"));

        let rel = Relationship::new(&id("agents:y"), rel_type, 0.66);
        g.add_relationship(&id("agents:x"), rel.clone()).unwrap();
        let mirrored = g.add_inverse(&id("agents:x"), &rel);

        let inverse = rel_type.inverse();
        let y = g.get(&id("agents:y")).unwrap();
        if inverse == rel_type {
            assert!(!mirrored, "{rel_type} is symmetric and must not mirror");
        } else {
            assert!(mirrored, "{rel_type}");
            let back = &y.relationships[&inverse][0];
            assert_eq!(back.element, "agents:x");
            assert_eq!(back.effective_strength(), 0.66);
        }
    }
}

#[test]
fn test_remove_element_drops_inbound_mirrors() {
    let mut g = chain();
    g.remove_element(&id("skills:b"));
    assert!(!g.get(&id("skills:a")).unwrap().has_edge(RelationshipType::Uses, "skills:b"));
    assert!(!g.get(&id("skills:c")).unwrap().has_edge(RelationshipType::UsedBy, "skills:b"));
}

// ============================================================================
// 4. Traversal
// ============================================================================

#[test]
fn test_find_path_respects_max_depth() {
    let g = chain();
    let opts = TraversalOptions::default().with_types([RelationshipType::Uses]);

    assert!(g.find_path(&id("skills:a"), &id("skills:c"), &opts.clone().with_max_depth(1)).is_none());

    let path = g.find_path(&id("skills:a"), &id("skills:c"), &opts.with_max_depth(2)).unwrap();
    assert_eq!(path.len(), 2);
    assert!((path.strength() - 0.81).abs() < 1e-9);
}

#[test]
fn test_find_path_prunes_weak_edges() {
    let g = chain();
    let opts = TraversalOptions::default().with_min_strength(0.5);
    assert!(g.find_path(&id("skills:a"), &id("skills:e"), &opts).is_none());
    assert!(g.find_path(&id("skills:a"), &id("skills:e"), &TraversalOptions::default()).is_some());
}

#[test]
fn test_get_connected_reaches_one_past_max_depth() {
    let g = chain();
    let opts = TraversalOptions::default().with_types([RelationshipType::Uses]).with_max_depth(1);
    let connected = g.get_connected(&id("skills:a"), &opts);

    let ids: Vec<String> = connected.keys().map(ToString::to_string).collect();
    assert_eq!(ids, vec!["skills:b", "skills:c"]);
    assert_eq!(connected[&id("skills:c")].len(), 2);
}

// ============================================================================
// 5. Stats, dedup and malformed data
// ============================================================================

#[test]
fn test_stats_zero_initialise_every_type() {
    let g = chain();
    let stats = g.stats();
    assert_eq!(stats.by_type.len(), RelationshipType::ALL.len());
    assert_eq!(stats.by_type[&RelationshipType::Uses], 3);
    assert_eq!(stats.by_type[&RelationshipType::UsedBy], 3);
    assert_eq!(stats.by_type[&RelationshipType::Contradicts], 0);
    assert_eq!(stats.total_relationships, 7);
    // e only has an inbound similar_to, which is symmetric and never mirrored
    assert_eq!(stats.elements_with_relationships, 4);
}

#[test]
fn test_invalid_relationships_are_reported_not_fatal() {
    let mut g = RelationshipGraph::default();
    g.insert_element(id("skills:a"), IndexedElement::new("a"));
    for bad in ["no-separator", ":leading", "trailing:", "a:b:c"] {
        let rel = Relationship {
            element: bad.to_string(),
            relationship_type: Some("uses".into()),
            strength: None,
            metadata: Default::default(),
        };
        g.add_relationship(&id("skills:a"), rel).unwrap();
    }

    let report = g.invalid_relationships();
    assert_eq!(report.summary(), "4 invalid relationships found");
    assert!(report.entries.iter().any(|e| e.error.contains("positions")));
    assert_eq!(g.stats().invalid_relationships, 4);
    assert!(g.get_connected(&id("skills:a"), &TraversalOptions::default()).is_empty());
}

#[test]
fn test_deduplicate_keeps_strongest_per_target() {
    let b = id("skills:b");
    let c = id("skills:c");
    let out = deduplicate([
        Relationship::new(&b, RelationshipType::Uses, 0.4),
        Relationship::new(&c, RelationshipType::Uses, 0.5),
        Relationship::new(&b, RelationshipType::Requires, 0.9),
    ]);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].element, "skills:b");
    assert_eq!(out[0].strength, Some(0.9));
}

// ============================================================================
// 6. Indexing a local portfolio
// ============================================================================

#[tokio::test]
async fn test_index_local_portfolio() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.portfolio.root = dir.path().to_path_buf();
    let portfolio = Portfolio::open_memory("octo", config);

    let local = portfolio.local();
    local
        .write(
            ElementType::Skills,
            "code-review",
            "---\nname: Code Review\ndescription: This skill uses debugging-helper\n---\n",
        )
        .await
        .unwrap();
    local
        .write(ElementType::Skills, "debugging-helper", "---\nname: Debugging Helper\n---\n")
        .await
        .unwrap();
    local.write(ElementType::Skills, "broken", "---\nname: [unclosed\n---\n").await.unwrap();

    let (graph, report) = portfolio.index_local().await.unwrap();
    assert_eq!(graph.len(), 2);
    assert!(report.added >= 1);
    assert!(graph.get(&id("skills:code-review")).unwrap().has_edge(RelationshipType::Uses, "skills:debugging-helper"));
}

#[tokio::test]
async fn test_index_local_reads_custom_header_fields() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.portfolio.root = dir.path().to_path_buf();
    let portfolio = Portfolio::open_memory("octo", config);

    let local = portfolio.local();
    local
        .write(ElementType::Agents, "reviewer", "---\nname: Reviewer\nnotes: requires lint-runner\n---\n")
        .await
        .unwrap();
    local.write(ElementType::Agents, "lint-runner", "---\nname: Lint Runner\n---\n").await.unwrap();

    let (graph, _) = portfolio.index_local().await.unwrap();
    let reviewer = graph.get(&id("agents:reviewer")).unwrap();
    assert_eq!(reviewer.custom.get("notes").map(String::as_str), Some("requires lint-runner"));
    assert!(reviewer.has_edge(RelationshipType::Requires, "agents:lint-runner"));
}
