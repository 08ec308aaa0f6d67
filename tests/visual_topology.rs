//! End-to-end tests for TopologyEngine over the in-memory store
//!
//! The main fixture is a small campus network:
//!
//!   core-001 (root) ── core-002
//!        ├── dist-100 ── access-001
//!        ├── dist-101 ── access-002
//!        └── dist-102 ── access-003

use std::collections::BTreeSet;
use std::sync::Arc;

use topolens::topology::{CachingStore, TopologySnapshot};
use topolens::visual::{RecordingSink, TraceEvent, GROUP_KIND};
use topolens::{
    Device, GroupCriterion, GroupingConfig, InMemoryStore, Link, PathAlgorithm, SearchMode,
    TopologyEngine, TopologyError, VisualGraph,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn campus() -> InMemoryStore {
    let mut store = InMemoryStore::new();
    store.add_device(Device::new("core-001", "router").with_layer(1));
    store.add_device(Device::new("core-002", "router").with_layer(1));
    for n in 100..=102 {
        store.add_device(Device::new(format!("dist-{}", n), "switch").with_layer(2));
    }
    for n in 1..=3 {
        store.add_device(Device::new(format!("access-00{}", n), "switch").with_layer(3));
    }

    store
        .add_link(Link::new("l-core", "core-001", "core-002"))
        .unwrap();
    for (i, n) in (100..=102).enumerate() {
        let dist = format!("dist-{}", n);
        store
            .add_link(
                Link::new(format!("l-core-{}", n), "core-001", dist.clone())
                    .with_ports("ge-0/0/1", "ge-0/0/48"),
            )
            .unwrap();
        store
            .add_link(Link::new(
                format!("l-{}-a{}", n, i + 1),
                dist,
                format!("access-00{}", i + 1),
            ))
            .unwrap();
    }
    store
}

fn scenario_grouping() -> GroupingConfig {
    GroupingConfig {
        enabled: true,
        min_group_size: 3,
        max_depth: 2,
        group_by_prefix: true,
        prefix_min_len: 3,
        ..GroupingConfig::default()
    }
}

fn node_ids(graph: &VisualGraph) -> BTreeSet<&str> {
    graph.nodes.iter().map(|n| n.id.as_str()).collect()
}

fn edge_ids(graph: &VisualGraph) -> BTreeSet<&str> {
    graph.edges.iter().map(|e| e.id.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_grouping_collapses_access_layer() {
    let engine = TopologyEngine::new(campus());
    let graph = engine
        .extract_visual("core-001", 3, &scenario_grouping())
        .await
        .unwrap();

    assert_eq!(graph.groups.len(), 1);
    let group = &graph.groups[0];
    assert_eq!(group.criterion, GroupCriterion::Prefix("access-".into()));
    assert_eq!(group.len(), 3);
    assert_eq!(group.label, "access-* (3)");
    assert_eq!(group.internal_edges, 0);
    assert_eq!(group.external_edges.len(), 3);

    // dist-* only reaches depth 1 and stays ungrouped
    for n in 100..=102 {
        assert!(graph.node(&format!("dist-{}", n)).is_some());
    }
    assert!(!graph.nodes.iter().any(|n| n.id.starts_with("access-")));

    let group_edges: Vec<_> = graph.edges.iter().filter(|e| e.touches(&group.id)).collect();
    assert_eq!(group_edges.len(), 3);
    for n in 100..=102 {
        assert!(graph.edge_between(&format!("dist-{}", n), &group.id).is_some());
    }

    let group_node = graph.node(&group.id).unwrap();
    assert_eq!(group_node.kind, GROUP_KIND);
    assert_eq!(group_node.layer, 3);
    assert_eq!(graph.stats.total_nodes, 6);
    assert_eq!(graph.stats.total_edges, 7);
    assert_eq!(graph.stats.total_groups, 1);
}

#[tokio::test]
async fn test_grouping_disabled_returns_source_graph() {
    let engine = TopologyEngine::new(campus());
    let graph = engine
        .extract_visual("core-001", 3, &GroupingConfig::default())
        .await
        .unwrap();

    assert_eq!(graph.nodes.len(), 8);
    assert_eq!(graph.edges.len(), 7);
    assert!(graph.groups.is_empty());
    assert!(graph.node("core-001").unwrap().is_root);
    assert_eq!(graph.node("access-002").unwrap().depth, Some(2));

    let uplink = graph.edges.iter().find(|e| e.id == "l-core-100").unwrap();
    assert_eq!(uplink.local_port, "ge-0/0/1");
    assert_eq!(uplink.remote_port, "ge-0/0/48");
}

#[tokio::test]
async fn test_group_invariants_hold_with_every_criterion() {
    let mut store = campus();
    for n in 1..=4 {
        let id = format!("ap-{}", n);
        store.add_device(Device::new(id.clone(), "switch").with_layer(4));
        store
            .add_link(Link::new(format!("l-ap-{}", n), "dist-101", id))
            .unwrap();
    }
    for name in ["printer", "scanner", "kiosk"] {
        store.add_device(Device::new(name, "endpoint").with_layer(5));
        store
            .add_link(Link::new(format!("l-{}", name), "access-003", name))
            .unwrap();
    }

    let grouping = GroupingConfig {
        group_by_type: true,
        group_by_depth: true,
        ..scenario_grouping()
    };
    let engine = TopologyEngine::new(store);
    let graph = engine.extract_visual("core-001", 4, &grouping).await.unwrap();

    graph.validate().unwrap();
    let plain = node_ids(&graph);
    let mut members = BTreeSet::new();
    for group in &graph.groups {
        for member in &group.members {
            assert!(!plain.contains(member.as_str()), "{} shown and grouped", member);
            assert!(members.insert(member.as_str()), "{} in two groups", member);
        }
    }
    for edge in &graph.edges {
        assert!(plain.contains(edge.source.as_str()));
        assert!(plain.contains(edge.target.as_str()));
    }
    assert!(graph
        .groups
        .iter()
        .any(|g| g.criterion == GroupCriterion::Prefix("ap-".into())));
}

#[tokio::test]
async fn test_extraction_is_deterministic() {
    let engine = TopologyEngine::new(campus());
    let first = engine
        .extract_visual("core-001", 3, &scenario_grouping())
        .await
        .unwrap();
    let second = engine
        .extract_visual("core-001", 3, &scenario_grouping())
        .await
        .unwrap();

    let order = |g: &VisualGraph| g.nodes.iter().map(|n| n.id.clone()).collect::<Vec<_>>();
    assert_eq!(order(&first), order(&second));
    assert_eq!(first.groups, second.groups);
    assert_eq!(first.fingerprint(), second.fingerprint());
}

// ---------------------------------------------------------------------------
// Expansion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_expand_round_trip_restores_original() {
    let engine = TopologyEngine::new(campus());
    let grouping = scenario_grouping();
    let flat = engine
        .extract_visual("core-001", 3, &GroupingConfig::default())
        .await
        .unwrap();
    let grouped = engine
        .extract_visual("core-001", 3, &grouping)
        .await
        .unwrap();

    let group = grouped.groups[0].clone();
    let expansion = engine
        .expand_group(&grouped, &group.id, &group.members, "core-001", &grouping, 2)
        .await
        .unwrap();

    let expanded = &expansion.graph;
    assert_eq!(node_ids(expanded), node_ids(&flat));
    assert_eq!(edge_ids(expanded), edge_ids(&flat));
    assert!(expanded.groups.is_empty());
    expanded.validate().unwrap();
}

#[tokio::test]
async fn test_expand_adds_only_new_elements() {
    let engine = TopologyEngine::new(campus());
    let grouping = scenario_grouping();
    let grouped = engine
        .extract_visual("core-001", 3, &grouping)
        .await
        .unwrap();
    let group_id = grouped.groups[0].id.clone();

    // Exploring two hops from each access switch rediscovers dist-* and core-001.
    let expansion = engine
        .expand_group(&grouped, &group_id, &[], "core-001", &grouping, 2)
        .await
        .unwrap();

    assert_eq!(expansion.new_nodes.len(), 3);
    assert_eq!(expansion.new_edges.len(), 3);
    assert_eq!(
        expansion.graph.nodes.len(),
        grouped.nodes.len() - 1 + expansion.new_nodes.len()
    );
    assert_eq!(
        expansion.graph.edges.len(),
        grouped.edges.len() - 3 + expansion.new_edges.len()
    );
}

#[tokio::test]
async fn test_expand_twice_is_group_not_found() {
    let engine = TopologyEngine::new(campus());
    let grouping = scenario_grouping();
    let grouped = engine
        .extract_visual("core-001", 3, &grouping)
        .await
        .unwrap();
    let group_id = grouped.groups[0].id.clone();

    let once = engine
        .expand_group(&grouped, &group_id, &[], "core-001", &grouping, 2)
        .await
        .unwrap();
    let err = engine
        .expand_group(&once.graph, &group_id, &[], "core-001", &grouping, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, TopologyError::GroupNotFound(ref id) if *id == group_id));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_expand_skips_members_removed_from_store() {
    let engine = TopologyEngine::new(campus());
    let grouping = scenario_grouping();
    let grouped = engine
        .extract_visual("core-001", 3, &grouping)
        .await
        .unwrap();
    let group_id = grouped.groups[0].id.clone();

    let members = vec!["access-001".to_string(), "access-404".to_string()];
    let expansion = engine
        .expand_group(&grouped, &group_id, &members, "core-001", &grouping, 1)
        .await
        .unwrap();
    assert_eq!(expansion.skipped_members, vec!["access-404"]);
    for id in ["access-001", "access-002", "access-003"] {
        assert!(expansion.graph.node(id).is_some(), "{} missing", id);
    }
    expansion.graph.validate().unwrap();
}

#[tokio::test]
async fn test_expand_with_partial_member_list_keeps_every_member() {
    let engine = TopologyEngine::new(campus());
    let grouping = scenario_grouping();
    let flat = engine
        .extract_visual("core-001", 3, &GroupingConfig::default())
        .await
        .unwrap();
    let grouped = engine
        .extract_visual("core-001", 3, &grouping)
        .await
        .unwrap();
    let group_id = grouped.groups[0].id.clone();

    let expansion = engine
        .expand_group(
            &grouped,
            &group_id,
            &["access-001".to_string()],
            "core-001",
            &grouping,
            2,
        )
        .await
        .unwrap();

    assert_eq!(
        expansion.explored_members,
        vec!["access-001", "access-002", "access-003"]
    );
    let expanded = &expansion.graph;
    assert!(expanded.groups.is_empty());
    assert_eq!(node_ids(expanded), node_ids(&flat));
    assert_eq!(edge_ids(expanded), edge_ids(&flat));
}

#[tokio::test]
async fn test_trace_records_expansion() {
    let sink = Arc::new(RecordingSink::new());
    let engine = TopologyEngine::new(campus()).with_trace(sink.clone());
    let grouping = scenario_grouping();
    let grouped = engine
        .extract_visual("core-001", 3, &grouping)
        .await
        .unwrap();
    let group_id = grouped.groups[0].id.clone();
    engine
        .expand_group(&grouped, &group_id, &[], "core-001", &grouping, 0)
        .await
        .unwrap();

    let events = sink.events();
    assert!(events
        .iter()
        .any(|e| matches!(e, TraceEvent::Composed { rewritten_edges: 3, .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        TraceEvent::GroupExpanded { members: 3, new_nodes: 3, .. }
    )));
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_connections_of_distribution_switch() {
    let engine = TopologyEngine::new(campus());
    let dist = engine.device_connections("dist-100").await.unwrap();

    assert_eq!(dist.uplinks.len(), 1);
    let up = &dist.uplinks[0];
    assert_eq!(up.device_id, "core-001");
    assert_eq!(up.local_port, "ge-0/0/48");
    assert_eq!(up.remote_port, "ge-0/0/1");

    assert_eq!(dist.downlinks.len(), 1);
    assert_eq!(dist.downlinks[0].device_id, "access-001");
    assert!(dist.peers.is_empty());

    let core = engine.device_connections("core-001").await.unwrap();
    assert_eq!(core.downlinks.len(), 3);
    assert_eq!(core.downlinks[0].local_port, "ge-0/0/1");
    assert_eq!(core.peers.len(), 1);
    assert!(!core.peers[0].is_same_group);
}

// ---------------------------------------------------------------------------
// Reachability and paths
// ---------------------------------------------------------------------------

fn sorted_ids(devices: &[Device]) -> Vec<String> {
    let mut ids: Vec<String> = devices.iter().map(|d| d.id.clone()).collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn test_reachable_matches_depth_bound() {
    let engine = TopologyEngine::new(campus());
    let flat = engine
        .extract_visual("core-002", 5, &GroupingConfig::default())
        .await
        .unwrap();

    for hops in 1..=4 {
        let mut expected: Vec<String> = flat
            .nodes
            .iter()
            .filter(|n| n.id != "core-002" && n.depth.is_some_and(|d| d <= hops))
            .map(|n| n.id.clone())
            .collect();
        expected.sort();

        let bfs = engine.find_reachable("core-002", hops, SearchMode::Bfs).await.unwrap();
        let dfs = engine.find_reachable("core-002", hops, SearchMode::Dfs).await.unwrap();
        assert_eq!(sorted_ids(&bfs), expected, "bfs within {}", hops);
        assert_eq!(sorted_ids(&dfs), expected, "dfs within {}", hops);
    }

    let bfs = engine.find_reachable("core-002", 0, SearchMode::Bfs).await.unwrap();
    let dfs = engine.find_reachable("core-002", 0, SearchMode::Dfs).await.unwrap();
    assert_eq!(sorted_ids(&bfs), sorted_ids(&dfs));
    assert_eq!(bfs.len(), 7);
}

fn chain() -> InMemoryStore {
    let mut store = InMemoryStore::new();
    for id in ["A", "B", "C", "D", "E"] {
        store.add_device(Device::new(id, "switch"));
    }
    store.add_link(Link::new("ab", "A", "B")).unwrap();
    store.add_link(Link::new("bc", "B", "C")).unwrap();
    store.add_link(Link::new("cd", "C", "D")).unwrap();
    store.add_link(Link::new("ad", "A", "D").with_weight(5.0)).unwrap();
    store
}

#[tokio::test]
async fn test_shortest_path_on_chain() {
    let engine = TopologyEngine::new(chain());
    let paths = engine
        .find_shortest_path("A", "D", PathAlgorithm::Dijkstra)
        .await
        .unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].hop_count, 3);
    assert_eq!(paths[0].total_cost, 3.0);
    assert_eq!(paths[0].device_ids(), vec!["A", "B", "C", "D"]);
}

#[tokio::test]
async fn test_k_shortest_returns_what_exists() {
    let engine = TopologyEngine::new(chain());
    let paths = engine
        .find_shortest_path("A", "D", PathAlgorithm::KShortest { k: 5 })
        .await
        .unwrap();
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0].total_cost, 3.0);
    assert_eq!(paths[1].total_cost, 5.0);
    assert_eq!(paths[1].device_ids(), vec!["A", "D"]);
}

#[tokio::test]
async fn test_path_to_isolated_device() {
    let engine = TopologyEngine::new(chain());
    let err = engine
        .find_shortest_path("A", "E", PathAlgorithm::Dijkstra)
        .await
        .unwrap_err();
    assert!(matches!(err, TopologyError::NoPathExists { .. }));
    assert!(err.is_not_found());
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_engine_over_snapshot_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("campus.json");
    campus().save(&path).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let snapshot: TopologySnapshot = serde_json::from_str(&raw).unwrap();
    assert_eq!(snapshot.devices.len(), 8);

    let engine = TopologyEngine::new(InMemoryStore::load(&path).unwrap());
    let graph = engine
        .extract_visual("core-001", 3, &scenario_grouping())
        .await
        .unwrap();
    assert_eq!(graph.groups.len(), 1);
}

#[tokio::test]
async fn test_engine_over_caching_store() {
    let engine = TopologyEngine::new(CachingStore::new(campus()));
    let first = engine
        .extract_visual("core-001", 3, &scenario_grouping())
        .await
        .unwrap();
    let second = engine
        .extract_visual("core-001", 3, &scenario_grouping())
        .await
        .unwrap();
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_eq!(engine.store().cached_entries().await, 1);
}
