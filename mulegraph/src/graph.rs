// mulegraph/src/graph.rs
//
// Transaction network as an arena: petgraph owns one node per graph_data
// node, edges hold NodeIndex handles instead of copies. The layout engine
// keeps its position/velocity table indexed by the same NodeIndex, so every
// derived view resolves to the node the simulation moves.
//
// An edge naming an id absent from `nodes` rejects the whole graph_data.
// Dropping the edge would misrepresent the network topology.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use tracing::{debug, warn};

use crate::error::{Endpoint, GraphError};
use crate::model::{GraphData, GraphNode};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub weight: f64,
    pub count:  Option<u64>,
}

#[derive(Debug, Clone)]
pub struct NetworkGraph {
    graph: DiGraph<GraphNode, Link>,
    by_id: HashMap<String, NodeIndex>,
}

impl NetworkGraph {
    pub fn build(data: &GraphData) -> Result<Self, GraphError> {
        let mut graph = DiGraph::with_capacity(data.nodes.len(), data.edges.len());
        let mut by_id = HashMap::with_capacity(data.nodes.len());

        for node in &data.nodes {
            if by_id.contains_key(&node.id) {
                warn!("graph_data rejected: duplicate node {}", node.id);
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
            let ix = graph.add_node(node.clone());
            by_id.insert(node.id.clone(), ix);
        }

        for (i, edge) in data.edges.iter().enumerate() {
            let resolve = |id: &str, endpoint| {
                by_id.get(id).copied().ok_or_else(|| GraphError::DanglingEdge {
                    edge:       i,
                    endpoint,
                    account_id: id.to_string(),
                })
            };
            let (s, t) = match (resolve(&edge.source, Endpoint::Source), resolve(&edge.target, Endpoint::Target)) {
                (Ok(s), Ok(t)) => (s, t),
                (Err(e), _) | (_, Err(e)) => {
                    warn!("graph_data rejected: {}", e);
                    return Err(e);
                }
            };
            graph.add_edge(s, t, Link { weight: edge.weight, count: edge.count });
        }

        debug!("network graph: {} nodes, {} edges", graph.node_count(), graph.edge_count());
        Ok(Self { graph, by_id })
    }

    pub fn node_count(&self) -> usize { self.graph.node_count() }
    pub fn edge_count(&self) -> usize { self.graph.edge_count() }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.by_id.get(id).copied()
    }

    pub fn node(&self, ix: NodeIndex) -> &GraphNode {
        &self.graph[ix]
    }

    pub fn lookup(&self, id: &str) -> Result<&GraphNode, GraphError> {
        self.index_of(id)
            .map(|ix| &self.graph[ix])
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))
    }

    /// Nodes in arena order (same order as graph_data.nodes).
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &GraphNode)> {
        self.graph.node_indices().map(move |ix| (ix, &self.graph[ix]))
    }

    /// Edges in arena order as (edge, source, target, link).
    pub fn links(&self) -> impl Iterator<Item = (EdgeIndex, NodeIndex, NodeIndex, &Link)> {
        self.graph
            .edge_references()
            .map(|e| (e.id(), e.source(), e.target(), e.weight()))
    }

    /// Number of edges touching `ix` in either direction. Drives link strength.
    pub fn degree(&self, ix: NodeIndex) -> usize {
        self.graph.edges_directed(ix, Direction::Outgoing).count()
            + self.graph.edges_directed(ix, Direction::Incoming).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GraphEdge;
    use pretty_assertions::assert_eq;

    fn node(id: &str) -> GraphNode {
        GraphNode {
            id:                id.into(),
            total_sent:        0.0,
            total_received:    0.0,
            transaction_count: 0,
            is_suspicious:     false,
            suspicion_score:   0.0,
            ring_ids:          vec![],
        }
    }

    fn edge(s: &str, t: &str) -> GraphEdge {
        GraphEdge { source: s.into(), target: t.into(), weight: 1.0, count: None }
    }

    #[test]
    fn resolves_edges_to_arena_indices() {
        let data = GraphData {
            nodes: vec![node("A"), node("B"), node("C")],
            edges: vec![edge("A", "B"), edge("B", "C"), edge("C", "A")],
        };
        let g = NetworkGraph::build(&data).unwrap();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 3);
        let a = g.index_of("A").unwrap();
        assert_eq!(g.degree(a), 2);
        let (_, s, t, _) = g.links().next().unwrap();
        assert_eq!(g.node(s).id, "A");
        assert_eq!(g.node(t).id, "B");
    }

    #[test]
    fn dangling_target_rejects_graph() {
        let data = GraphData {
            nodes: vec![node("A"), node("B")],
            edges: vec![edge("A", "B"), edge("B", "GHOST")],
        };
        let err = NetworkGraph::build(&data).unwrap_err();
        assert_eq!(
            err,
            GraphError::DanglingEdge { edge: 1, endpoint: Endpoint::Target, account_id: "GHOST".into() }
        );
    }

    #[test]
    fn dangling_source_reported_first() {
        let data = GraphData { nodes: vec![], edges: vec![edge("X", "Y")] };
        match NetworkGraph::build(&data) {
            Err(GraphError::DanglingEdge { endpoint, account_id, .. }) => {
                assert_eq!(endpoint, Endpoint::Source);
                assert_eq!(account_id, "X");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_ids_rejected() {
        let data = GraphData { nodes: vec![node("A"), node("A")], edges: vec![] };
        assert_eq!(NetworkGraph::build(&data).unwrap_err(), GraphError::DuplicateNode("A".into()));
    }

    #[test]
    fn lookup_unknown_is_error() {
        let g = NetworkGraph::build(&GraphData::default()).unwrap();
        assert_eq!(g.lookup("nope").unwrap_err(), GraphError::UnknownNode("nope".into()));
    }
}
