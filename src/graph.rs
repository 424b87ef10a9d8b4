// src/graph.rs

use std::collections::HashMap;

use petgraph::{graph::NodeIndex, stable_graph::StableDiGraph, visit::NodeIndexable};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::registry::TopicRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum VertexKind {
    Topic,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vertex {
    pub id: String,
    pub kind: VertexKind,
    pub name: String,
}

/// One vertex of the graph export: what a renderer needs to draw it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VertexView {
    pub id: String,
    pub kind: VertexKind,
    pub display_name: String,
    pub outgoing_edge_ids: Vec<String>,
}

/// A status-table row for one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopicValue {
    /// Vertex id from the last graph built over this registry, if any.
    pub display_id: Option<String>,
    pub topic: String,
    /// Two decimals for numbers, the raw text otherwise, `None` if never published.
    pub value: Option<String>,
}

/// A read-only snapshot of the topic/agent wiring.
///
/// Edges follow the data: topic → agent for every subscriber, agent → topic
/// for every publisher. Built fresh on every call; never updated in place.
#[derive(Debug, Default)]
pub struct Graph {
    graph: StableDiGraph<Vertex, ()>,
    topics: HashMap<String, NodeIndex>,
    agents: HashMap<String, NodeIndex>,
}

impl Graph {
    /// Snapshot the registry's current wiring and stamp each topic with its vertex id.
    pub fn from_registry(registry: &TopicRegistry) -> Self {
        let mut graph = Graph::default();
        for topic in registry.topics() {
            let t = graph.vertex(VertexKind::Topic, topic.name());
            topic.set_display_id(graph.graph[t].id.clone());

            for agent in topic.subscriber_names() {
                let a = graph.vertex(VertexKind::Agent, &agent);
                graph.graph.add_edge(t, a, ());
            }
            for agent in topic.publisher_names() {
                let a = graph.vertex(VertexKind::Agent, &agent);
                graph.graph.add_edge(a, t, ());
            }
        }
        debug!(
            vertices = graph.graph.node_count(),
            edges = graph.graph.edge_count(),
            "built graph snapshot"
        );
        graph
    }

    /// Get or create the vertex for `(kind, name)`.
    fn vertex(&mut self, kind: VertexKind, name: &str) -> NodeIndex {
        let index = match kind {
            VertexKind::Topic => &mut self.topics,
            VertexKind::Agent => &mut self.agents,
        };
        if let Some(&ix) = index.get(name) {
            return ix;
        }
        let id = format!("v{}", self.graph.node_count());
        let ix = self.graph.add_node(Vertex {
            id,
            kind,
            name: name.to_string(),
        });
        index.insert(name.to_string(), ix);
        ix
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.graph.node_indices().map(move |ix| &self.graph[ix])
    }

    pub fn find(&self, kind: VertexKind, name: &str) -> Option<&Vertex> {
        let index = match kind {
            VertexKind::Topic => &self.topics,
            VertexKind::Agent => &self.agents,
        };
        index.get(name).map(|&ix| &self.graph[ix])
    }

    pub fn contains_edge(&self, from: (VertexKind, &str), to: (VertexKind, &str)) -> bool {
        let lookup = |(kind, name): (VertexKind, &str)| match kind {
            VertexKind::Topic => self.topics.get(name).copied(),
            VertexKind::Agent => self.agents.get(name).copied(),
        };
        match (lookup(from), lookup(to)) {
            (Some(a), Some(b)) => self.graph.contains_edge(a, b),
            _ => false,
        }
    }

    /// Whether any directed cycle exists.
    pub fn has_cycle(&self) -> bool {
        self.find_cycle().is_some()
    }

    /// Depth-first search with a global visited set and an on-stack set.
    ///
    /// Returns the vertex names along the first cycle found, with the starting
    /// vertex repeated at the end. Vertices finished by an earlier root are
    /// not descended into again.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let bound = self.graph.node_bound();
        let mut visited = vec![false; bound];
        let mut on_stack = vec![false; bound];

        for root in self.graph.node_indices() {
            if visited[root.index()] {
                continue;
            }
            visited[root.index()] = true;
            on_stack[root.index()] = true;
            let mut stack = vec![(root, self.graph.neighbors(root))];

            while let Some((node, neighbors)) = stack.last_mut() {
                let node = *node;
                match neighbors.next() {
                    Some(next) if on_stack[next.index()] => {
                        let start = stack.iter().position(|(n, _)| *n == next).unwrap_or(0);
                        let mut path: Vec<String> = stack[start..]
                            .iter()
                            .map(|(n, _)| self.graph[*n].name.clone())
                            .collect();
                        path.push(self.graph[next].name.clone());
                        return Some(path);
                    }
                    Some(next) if !visited[next.index()] => {
                        visited[next.index()] = true;
                        on_stack[next.index()] = true;
                        stack.push((next, self.graph.neighbors(next)));
                    }
                    Some(_) => {}
                    None => {
                        on_stack[node.index()] = false;
                        stack.pop();
                    }
                }
            }
        }
        None
    }

    /// The serializable vertex/edge list, in vertex-id order.
    pub fn export(&self) -> Vec<VertexView> {
        self.graph
            .node_indices()
            .map(|ix| {
                let vertex = &self.graph[ix];
                let mut targets: Vec<NodeIndex> = self.graph.neighbors(ix).collect();
                targets.sort();
                VertexView {
                    id: vertex.id.clone(),
                    kind: vertex.kind,
                    display_name: vertex.name.clone(),
                    outgoing_edge_ids: targets.iter().map(|t| self.graph[*t].id.clone()).collect(),
                }
            })
            .collect()
    }
}

/// Current value of every registered topic, sorted by topic name.
pub fn topic_values(registry: &TopicRegistry) -> Vec<TopicValue> {
    registry
        .topics()
        .into_iter()
        .map(|topic| TopicValue {
            display_id: topic.display_id(),
            topic: topic.name().to_string(),
            value: topic.last_message().map(|msg| {
                if msg.is_numeric() {
                    format!("{:.2}", msg.numeric())
                } else {
                    msg.text().to_string()
                }
            }),
        })
        .collect()
}
