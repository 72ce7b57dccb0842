//! Layering graph: which layers may coexist and in what wear order.
//!
//! A directed acyclic graph over slot classes. An edge `a → b` means `b`
//! is worn over `a`. Acyclicity is checked at construction with Kahn's
//! algorithm; the derived topological order is the canonical wear order.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::items::SlotClass;

/// Error raised when the declared layering edges contain a cycle.
#[derive(Debug, Clone, Error)]
#[error("layering graph contains a cycle through {slots:?}")]
pub struct LayeringCycle {
    /// Slots left unresolved by the topological sort.
    pub slots: Vec<SlotClass>,
}

/// The validated layering DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<(SlotClass, SlotClass)>", into = "Vec<(SlotClass, SlotClass)>")]
pub struct LayeringGraph {
    edges: Vec<(SlotClass, SlotClass)>,
    #[serde(skip)]
    order: Vec<SlotClass>,
}

impl TryFrom<Vec<(SlotClass, SlotClass)>> for LayeringGraph {
    type Error = LayeringCycle;

    fn try_from(edges: Vec<(SlotClass, SlotClass)>) -> Result<Self, Self::Error> {
        LayeringGraph::new(edges)
    }
}

impl From<LayeringGraph> for Vec<(SlotClass, SlotClass)> {
    fn from(graph: LayeringGraph) -> Self {
        graph.edges
    }
}

impl LayeringGraph {
    /// Build and validate a layering graph from directed edges.
    pub fn new(edges: Vec<(SlotClass, SlotClass)>) -> Result<Self, LayeringCycle> {
        let order = topological_order(&edges)?;
        Ok(Self { edges, order })
    }

    /// The default graph: `top → mid → outer`, `one_piece → outer`,
    /// `bottom` and everything else parallel.
    pub fn standard() -> Self {
        Self::new(vec![
            (SlotClass::Top, SlotClass::Mid),
            (SlotClass::Mid, SlotClass::Outer),
            (SlotClass::OnePiece, SlotClass::Outer),
        ])
        .expect("standard layering graph is acyclic")
    }

    /// Canonical wear order (innermost first). Deterministic: ties inside
    /// a Kahn level resolve by slot-class ordering.
    pub fn topological_order(&self) -> &[SlotClass] {
        &self.order
    }

    /// Slots that participate in the graph.
    pub fn nodes(&self) -> BTreeSet<SlotClass> {
        self.edges
            .iter()
            .flat_map(|(a, b)| [*a, *b])
            .collect()
    }

    /// Whether `from` reaches `to` along edges.
    pub fn reaches(&self, from: SlotClass, to: SlotClass) -> bool {
        if from == to {
            return true;
        }
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([from]);
        while let Some(slot) = queue.pop_front() {
            for (a, b) in &self.edges {
                if *a == slot && seen.insert(*b) {
                    if *b == to {
                        return true;
                    }
                    queue.push_back(*b);
                }
            }
        }
        false
    }

    /// Whether two slots lie on a common wear chain.
    pub fn comparable(&self, a: SlotClass, b: SlotClass) -> bool {
        self.reaches(a, b) || self.reaches(b, a)
    }

    /// Graph sources: base layers worn directly on the body.
    pub fn sources(&self) -> BTreeSet<SlotClass> {
        let mut nodes = self.nodes();
        for (_, to) in &self.edges {
            nodes.remove(to);
        }
        nodes
    }
}

impl Default for LayeringGraph {
    fn default() -> Self {
        Self::standard()
    }
}

/// Kahn's algorithm with deterministic tie-breaking inside each level.
fn topological_order(edges: &[(SlotClass, SlotClass)]) -> Result<Vec<SlotClass>, LayeringCycle> {
    let mut in_degree: BTreeMap<SlotClass, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<SlotClass, BTreeSet<SlotClass>> = BTreeMap::new();

    for (from, to) in edges {
        in_degree.entry(*from).or_insert(0);
        *in_degree.entry(*to).or_insert(0) += 1;
        dependents.entry(*from).or_default().insert(*to);
    }

    let mut queue: VecDeque<SlotClass> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(slot, _)| *slot)
        .collect();

    let mut order = Vec::with_capacity(in_degree.len());
    while let Some(slot) = queue.pop_front() {
        order.push(slot);
        if let Some(next) = dependents.get(&slot) {
            for to in next {
                let deg = in_degree.get_mut(to).expect("edge endpoint registered");
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(*to);
                }
            }
        }
    }

    if order.len() != in_degree.len() {
        let resolved: BTreeSet<SlotClass> = order.iter().copied().collect();
        let stuck = in_degree
            .keys()
            .filter(|slot| !resolved.contains(slot))
            .copied()
            .collect();
        return Err(LayeringCycle { slots: stuck });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_graph_order() {
        let graph = LayeringGraph::standard();
        let order = graph.topological_order();
        let pos = |slot| order.iter().position(|s| *s == slot).unwrap();
        assert!(pos(SlotClass::Top) < pos(SlotClass::Mid));
        assert!(pos(SlotClass::Mid) < pos(SlotClass::Outer));
        assert!(pos(SlotClass::OnePiece) < pos(SlotClass::Outer));
    }

    #[test]
    fn test_cycle_rejected() {
        let err = LayeringGraph::new(vec![
            (SlotClass::Top, SlotClass::Mid),
            (SlotClass::Mid, SlotClass::Top),
        ])
        .unwrap_err();
        assert!(!err.slots.is_empty());
    }

    #[test]
    fn test_reachability_and_comparability() {
        let graph = LayeringGraph::standard();
        assert!(graph.reaches(SlotClass::Top, SlotClass::Outer));
        assert!(!graph.reaches(SlotClass::Outer, SlotClass::Top));
        assert!(graph.comparable(SlotClass::Top, SlotClass::Outer));
        assert!(!graph.comparable(SlotClass::Top, SlotClass::OnePiece));
    }

    #[test]
    fn test_sources() {
        let sources = LayeringGraph::standard().sources();
        assert!(sources.contains(&SlotClass::Top));
        assert!(sources.contains(&SlotClass::OnePiece));
        assert!(!sources.contains(&SlotClass::Outer));
    }

    #[test]
    fn test_serde_round_trip() {
        let graph = LayeringGraph::standard();
        let json = serde_json::to_string(&graph).unwrap();
        let back: LayeringGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back.topological_order(), graph.topological_order());
    }
}
