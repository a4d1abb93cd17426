//! Connectivity checks over the link graph.
//!
//! Nodes and storage units become graph vertices, links with both endpoints
//! resolved become edges. Imports count islands and nodes that no link
//! touches in their statistics.

use std::collections::HashMap;

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;

use crate::Network;

/// Connected components of the drainage graph.
#[derive(Debug, Default)]
pub struct IslandAnalysis {
    /// Node names per island, islands ordered by their first node
    pub islands: Vec<Vec<String>>,
}

impl IslandAnalysis {
    pub fn count(&self) -> usize {
        self.islands.len()
    }
}

fn build_graph(network: &Network) -> (UnGraph<String, String>, HashMap<&str, NodeIndex>) {
    let mut graph = UnGraph::new_undirected();
    let mut index = HashMap::new();
    let names = network
        .nodes
        .iter()
        .map(|n| n.name.as_str())
        .chain(network.storage_units.iter().map(|s| s.name.as_str()));
    for name in names {
        index
            .entry(name)
            .or_insert_with(|| graph.add_node(name.to_string()));
    }
    for link in &network.links {
        let (Some(a), Some(b)) = (link.inlet_node.as_deref(), link.outlet_node.as_deref()) else {
            continue;
        };
        if let (Some(&ia), Some(&ib)) = (index.get(a), index.get(b)) {
            graph.add_edge(ia, ib, link.name.clone());
        }
    }
    (graph, index)
}

/// Labels connected components with union-find.
pub fn find_islands(network: &Network) -> IslandAnalysis {
    let (graph, _) = build_graph(network);
    let mut uf = UnionFind::new(graph.node_count());
    for edge in graph.edge_references() {
        uf.union(edge.source().index(), edge.target().index());
    }
    let mut by_root: HashMap<usize, usize> = HashMap::new();
    let mut islands: Vec<Vec<String>> = Vec::new();
    for node in graph.node_indices() {
        let root = uf.find(node.index());
        let slot = *by_root.entry(root).or_insert_with(|| {
            islands.push(Vec::new());
            islands.len() - 1
        });
        islands[slot].push(graph[node].clone());
    }
    IslandAnalysis { islands }
}

/// Names of nodes no resolved link touches
pub fn find_isolated_nodes(network: &Network) -> Vec<String> {
    let (graph, _) = build_graph(network);
    graph
        .node_indices()
        .filter(|n| graph.neighbors(*n).next().is_none())
        .map(|n| graph[n].clone())
        .collect()
}
