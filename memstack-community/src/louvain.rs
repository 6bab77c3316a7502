//! In-memory Louvain modularity optimization, grounded on
//! `original_source/.../community/louvain_detector.py`'s `_detect_with_networkx`
//! fallback, reimplemented directly over `petgraph` rather than shelling
//! out to a Python graph library (spec.md §4.6 "Native path").
//!
//! This runs the local-moving phase of Blondel et al.'s algorithm to
//! convergence on a single level (no multi-level community aggregation).
//! That is enough to find well-separated clusters in the modest,
//! per-project graphs MemStack deals with; `GdsAccelerator` is what
//! handles graphs large enough to need the full multi-level version.

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use uuid::Uuid;

/// Partition `nodes`, connected by weighted `edges`, into communities by
/// greedy modularity optimization. Returns one `Vec<Uuid>` per detected
/// community, in no particular order, including singleton communities.
pub fn detect_communities(nodes: &[Uuid], edges: &[(Uuid, Uuid, f64)]) -> Vec<Vec<Uuid>> {
    if nodes.is_empty() {
        return Vec::new();
    }

    let mut graph: UnGraph<Uuid, f64> = UnGraph::new_undirected();
    let mut index_of: HashMap<Uuid, NodeIndex> = HashMap::with_capacity(nodes.len());
    for &uuid in nodes {
        let idx = graph.add_node(uuid);
        index_of.insert(uuid, idx);
    }
    for &(from, to, weight) in edges {
        if from == to {
            continue;
        }
        if let (Some(&a), Some(&b)) = (index_of.get(&from), index_of.get(&to)) {
            graph.add_edge(a, b, weight);
        }
    }

    let total_weight: f64 = graph.edge_weights().sum();
    if total_weight <= 0.0 {
        return nodes.iter().map(|&n| vec![n]).collect();
    }

    let mut community: HashMap<NodeIndex, usize> = graph
        .node_indices()
        .enumerate()
        .map(|(i, idx)| (idx, i))
        .collect();

    let degree: HashMap<NodeIndex, f64> = graph
        .node_indices()
        .map(|idx| {
            let deg: f64 = graph
                .edges(idx)
                .map(|e| *e.weight())
                .sum();
            (idx, deg)
        })
        .collect();

    const MAX_PASSES: usize = 100;
    for _ in 0..MAX_PASSES {
        let mut moved_any = false;

        for node in graph.node_indices() {
            let current_community = community[&node];
            let k_i = degree[&node];

            let mut weight_to_community: HashMap<usize, f64> = HashMap::new();
            for edge in graph.edges(node) {
                let neighbor = if edge.source() == node { edge.target() } else { edge.source() };
                let neighbor_community = community[&neighbor];
                *weight_to_community.entry(neighbor_community).or_insert(0.0) += *edge.weight();
            }

            let community_total = |c: usize| -> f64 {
                graph
                    .node_indices()
                    .filter(|n| community[n] == c)
                    .map(|n| degree[&n])
                    .sum()
            };

            let current_sigma_tot = community_total(current_community) - k_i;
            let current_gain = weight_to_community.get(&current_community).copied().unwrap_or(0.0) / total_weight
                - (current_sigma_tot * k_i) / (2.0 * total_weight * total_weight);

            let mut best_community = current_community;
            let mut best_gain = current_gain;

            for (&candidate_community, &k_i_in) in &weight_to_community {
                if candidate_community == current_community {
                    continue;
                }
                let sigma_tot = community_total(candidate_community);
                let gain = k_i_in / total_weight - (sigma_tot * k_i) / (2.0 * total_weight * total_weight);
                if gain > best_gain {
                    best_gain = gain;
                    best_community = candidate_community;
                }
            }

            if best_community != current_community {
                community.insert(node, best_community);
                moved_any = true;
            }
        }

        if !moved_any {
            break;
        }
    }

    let mut groups: HashMap<usize, Vec<Uuid>> = HashMap::new();
    for node in graph.node_indices() {
        groups.entry(community[&node]).or_default().push(graph[node]);
    }
    groups.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn no_nodes_yields_no_communities() {
        assert!(detect_communities(&[], &[]).is_empty());
    }

    #[test]
    fn disconnected_nodes_are_singleton_communities() {
        let nodes = uuids(3);
        let communities = detect_communities(&nodes, &[]);
        assert_eq!(communities.len(), 3);
        assert!(communities.iter().all(|c| c.len() == 1));
    }

    #[test]
    fn two_dense_triangles_connected_by_one_weak_edge_separate() {
        let nodes = uuids(6);
        let mut edges = Vec::new();
        for i in 0..3 {
            for j in (i + 1)..3 {
                edges.push((nodes[i], nodes[j], 5.0));
            }
        }
        for i in 3..6 {
            for j in (i + 1)..6 {
                edges.push((nodes[i], nodes[j], 5.0));
            }
        }
        edges.push((nodes[0], nodes[3], 0.1));

        let communities = detect_communities(&nodes, &edges);
        let sizes: Vec<usize> = {
            let mut sizes: Vec<usize> = communities.iter().map(|c| c.len()).collect();
            sizes.sort_unstable();
            sizes
        };
        assert_eq!(sizes, vec![3, 3]);
    }
}
