//! The meta-graph of tunnels and path trials.
//!
//! Nodes are tunnels, plus a synthetic origin (a free tunnel from the
//! origin to itself) and a synthetic destination (a free tunnel entered at
//! the target). An edge from A to B is a trial walking from A's exit to
//! B's entrance. Edge weights change as trials resolve, so every solve
//! reads the trials afresh.

use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};

use super::trial::PathTrial;
use super::{MinScored, ResultState, lock};
use crate::domain::{Caller, Cell, DomainError, Itinerary, Segment, Target, Tunnel};

/// A trial shared between its session and the work manager.
pub type SharedTrial = Arc<Mutex<PathTrial>>;

/// The current weight of a meta-graph edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeCost {
    /// The trial succeeded with a path of this cost
    Known(f64),
    /// The trial has not finished; this is an estimate
    Approximate(f64),
    /// The trial can never supply a path
    Unusable,
}

impl EdgeCost {
    pub fn is_known(&self) -> bool {
        matches!(self, EdgeCost::Known(_))
    }
}

/// Which edges a solve may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostPolicy {
    /// Only edges whose trials succeeded
    SuccessfulOnly,
    /// Succeeded edges and estimates for unfinished ones
    Usable,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Origin,
    Destination,
    Tunnel(Tunnel),
}

#[derive(Debug)]
struct GraphNode {
    kind: NodeKind,
    entrance: Target,
    /// Where travel continues after this node; the destination has none.
    exit: Option<Cell>,
    cost: f64,
}

struct GraphEdge {
    from: usize,
    to: usize,
    trial: SharedTrial,
}

/// One route through the meta-graph and what it costs right now.
#[derive(Debug, Clone, PartialEq)]
pub struct ItineraryTrial {
    nodes: Vec<usize>,
    edges: Vec<usize>,
    edge_costs: Vec<EdgeCost>,
    cost: f64,
}

impl ItineraryTrial {
    /// Nodes from the origin to the destination.
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    /// Edges in travel order.
    pub fn edges(&self) -> &[usize] {
        &self.edges
    }

    /// Path costs plus tunnel costs, using estimates where unresolved.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Returns true if every edge's trial has succeeded.
    pub fn is_complete(&self) -> bool {
        self.edge_costs.iter().all(EdgeCost::is_known)
    }

    /// Edges whose trials have not finished.
    pub fn unresolved_edges(&self) -> impl Iterator<Item = usize> + '_ {
        self.edges
            .iter()
            .zip(&self.edge_costs)
            .filter(|(_, cost)| !cost.is_known())
            .map(|(edge, _)| *edge)
    }
}

/// The meta-graph for one session.
#[derive(Default)]
pub struct SearchGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    outgoing: Vec<Vec<usize>>,
}

impl SearchGraph {
    pub const ORIGIN: usize = 0;
    pub const DESTINATION: usize = 1;

    /// Builds the graph from `origin` to `target` through `tunnels`.
    ///
    /// Tunnels `caller` may not use are left out. `make_trial` is called
    /// with the start cell, the goal target and whether the edge ends at
    /// the destination, for every pair of nodes where the start and goal
    /// share a domain; returning `None` leaves that edge out.
    pub fn build<F>(origin: Cell, target: &Target, tunnels: Vec<Tunnel>, caller: &Caller, mut make_trial: F) -> Self
    where
        F: FnMut(Cell, &Target, bool) -> Option<PathTrial>,
    {
        let mut nodes = vec![
            GraphNode {
                kind: NodeKind::Origin,
                entrance: Target::Cell(origin),
                exit: Some(origin),
                cost: 0.0,
            },
            GraphNode {
                kind: NodeKind::Destination,
                entrance: target.clone(),
                exit: None,
                cost: 0.0,
            },
        ];
        nodes.extend(tunnels.into_iter().filter(|t| t.permits(caller)).map(|tunnel| GraphNode {
            entrance: tunnel.entrance().clone(),
            exit: Some(tunnel.exit()),
            cost: f64::from(tunnel.cost()),
            kind: NodeKind::Tunnel(tunnel),
        }));

        let mut edges = Vec::new();
        let mut outgoing = vec![Vec::new(); nodes.len()];
        for (from, source) in nodes.iter().enumerate() {
            let Some(start) = source.exit else {
                continue;
            };
            for (to, sink) in nodes.iter().enumerate() {
                if to == from || to == Self::ORIGIN || sink.entrance.domain() != start.domain {
                    continue;
                }
                if let Some(trial) = make_trial(start, &sink.entrance, to == Self::DESTINATION) {
                    outgoing[from].push(edges.len());
                    edges.push(GraphEdge {
                        from,
                        to,
                        trial: Arc::new(Mutex::new(trial)),
                    });
                }
            }
        }

        Self { nodes, edges, outgoing }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_kind(&self, node: usize) -> Option<&NodeKind> {
        self.nodes.get(node).map(|n| &n.kind)
    }

    /// The (from, to) nodes of an edge.
    pub fn endpoints(&self, edge: usize) -> Option<(usize, usize)> {
        self.edges.get(edge).map(|e| (e.from, e.to))
    }

    pub fn trial(&self, edge: usize) -> Option<&SharedTrial> {
        self.edges.get(edge).map(|e| &e.trial)
    }

    /// Returns true if any trial ended in a fault.
    pub fn any_errored(&self) -> bool {
        self.edges
            .iter()
            .any(|e| lock(&e.trial).state() == ResultState::Error)
    }

    /// The cheapest route from origin to destination under `policy`.
    pub fn best_route(&self, policy: CostPolicy) -> Option<ItineraryTrial> {
        if self.nodes.len() <= Self::DESTINATION {
            return None;
        }

        let costs: Vec<EdgeCost> = self.edges.iter().map(|e| lock(&e.trial).cost_estimate()).collect();
        let mut dist = vec![f64::INFINITY; self.nodes.len()];
        let mut via: Vec<Option<usize>> = vec![None; self.nodes.len()];
        let mut heap = BinaryHeap::new();

        dist[Self::ORIGIN] = 0.0;
        heap.push(MinScored::new(0.0, Self::ORIGIN));

        while let Some(MinScored { score, item: node }) = heap.pop() {
            if score > dist[node] {
                continue;
            }
            if node == Self::DESTINATION {
                break;
            }
            for &edge in &self.outgoing[node] {
                let weight = match (costs[edge], policy) {
                    (EdgeCost::Known(c), _) => c,
                    (EdgeCost::Approximate(c), CostPolicy::Usable) => c,
                    _ => continue,
                };
                let next = self.edges[edge].to;
                let candidate = score + weight + self.nodes[next].cost;
                if candidate < dist[next] {
                    dist[next] = candidate;
                    via[next] = Some(edge);
                    heap.push(MinScored::new(candidate, next));
                }
            }
        }

        if !dist[Self::DESTINATION].is_finite() {
            return None;
        }

        let mut edges = Vec::new();
        let mut nodes = vec![Self::DESTINATION];
        let mut current = Self::DESTINATION;
        while let Some(edge) = via[current] {
            edges.push(edge);
            current = self.edges[edge].from;
            nodes.push(current);
        }
        edges.reverse();
        nodes.reverse();

        Some(ItineraryTrial {
            edge_costs: edges.iter().map(|&e| costs[e]).collect(),
            nodes,
            edges,
            cost: dist[Self::DESTINATION],
        })
    }

    /// Assembles the itinerary for a complete route.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a trial on the route has no path, or if the paths
    /// and tunnels do not join up.
    pub fn to_itinerary(&self, route: &ItineraryTrial) -> Result<Itinerary, DomainError> {
        let mut segments = Vec::with_capacity(route.edges.len() * 2);
        for &edge in &route.edges {
            let edge = &self.edges[edge];
            let path = lock(&edge.trial).path().cloned().ok_or(DomainError::EmptyPath)?;
            segments.push(Segment::Path(path));
            if let NodeKind::Tunnel(tunnel) = &self.nodes[edge.to].kind {
                segments.push(Segment::Tunnel(tunnel.clone()));
            }
        }
        Itinerary::new(segments)
    }
}
