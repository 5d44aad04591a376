//! Processing order for intelligence fields.
//!
//! Kahn's algorithm over the dependency edges that stay inside the input
//! set. Dependencies on fields outside the set are treated as resolved.

use std::collections::{HashMap, VecDeque};
use teable_core::{Field, FieldId, ValidationError};

/// A node of the dependency graph.
pub trait DependencyNode {
    fn node_id(&self) -> &FieldId;

    /// Ids this node must be processed after.
    fn dependencies(&self) -> &[FieldId];
}

impl DependencyNode for Field {
    fn node_id(&self) -> &FieldId {
        &self.id
    }

    fn dependencies(&self) -> &[FieldId] {
        self.intelligence().map(|i| i.depends()).unwrap_or(&[])
    }
}

/// Result of ordering a set of nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyOrder<T> {
    /// Nodes in processing order.
    pub ordered: Vec<T>,
    /// Ids on a cycle or depending on one, in input order.
    pub omitted: Vec<FieldId>,
}

impl<T> DependencyOrder<T> {
    pub fn has_cycle(&self) -> bool {
        !self.omitted.is_empty()
    }

    /// The ordered nodes, or a cycle error naming the omitted ids.
    pub fn into_strict(self) -> Result<Vec<T>, ValidationError> {
        if self.omitted.is_empty() {
            Ok(self.ordered)
        } else {
            Err(ValidationError::DependencyCycle {
                field_ids: self.omitted,
            })
        }
    }
}

/// Order `nodes` so every node follows its in-set dependencies.
///
/// Ties keep discovery order: zero in-degree nodes in input order, then
/// FIFO queue order. Nodes that never reach in-degree zero are reported in
/// `omitted`. Repeated ids keep their first occurrence.
pub fn topological_order<T: DependencyNode + Clone>(nodes: &[T]) -> DependencyOrder<T> {
    let mut index: HashMap<&FieldId, usize> = HashMap::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        index.entry(node.node_id()).or_insert(i);
    }

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut in_degree: Vec<usize> = vec![0; nodes.len()];
    for (i, node) in nodes.iter().enumerate() {
        if index.get(node.node_id()) != Some(&i) {
            continue;
        }
        for dependency in node.dependencies() {
            if let Some(&d) = index.get(dependency) {
                dependents[d].push(i);
                in_degree[i] += 1;
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..nodes.len())
        .filter(|&i| in_degree[i] == 0 && index.get(nodes[i].node_id()) == Some(&i))
        .collect();
    let mut visited = vec![false; nodes.len()];
    let mut ordered = Vec::with_capacity(nodes.len());

    while let Some(i) = queue.pop_front() {
        visited[i] = true;
        ordered.push(nodes[i].clone());
        for &dependent in &dependents[i] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    let omitted = nodes
        .iter()
        .enumerate()
        .filter(|(i, node)| !visited[*i] && index.get(node.node_id()) == Some(i))
        .map(|(_, node)| node.node_id().clone())
        .collect();

    DependencyOrder { ordered, omitted }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Node(FieldId, Vec<FieldId>);

    impl DependencyNode for Node {
        fn node_id(&self) -> &FieldId {
            &self.0
        }
        fn dependencies(&self) -> &[FieldId] {
            &self.1
        }
    }

    fn node(id: &str, deps: &[&str]) -> Node {
        Node(id.into(), deps.iter().map(|d| FieldId::from(*d)).collect())
    }

    fn ids(order: &DependencyOrder<Node>) -> Vec<&str> {
        order.ordered.iter().map(|n| n.0.as_str()).collect()
    }

    #[test]
    fn test_dependencies_come_first() {
        let order = topological_order(&[node("C", &["B"]), node("B", &["A"]), node("A", &[])]);
        assert_eq!(ids(&order), vec!["A", "B", "C"]);
        assert!(!order.has_cycle());
    }

    #[test]
    fn test_independent_nodes_keep_input_order() {
        let order = topological_order(&[node("X", &[]), node("Y", &["X"]), node("Z", &[])]);
        assert_eq!(ids(&order), vec!["X", "Z", "Y"]);
    }

    #[test]
    fn test_out_of_set_dependencies_are_ignored() {
        let order = topological_order(&[node("B", &["fldOutside"]), node("A", &["B"])]);
        assert_eq!(ids(&order), vec!["B", "A"]);
    }

    #[test]
    fn test_two_node_cycle_is_omitted() {
        let order = topological_order(&[node("A", &["B"]), node("B", &["A"]), node("C", &[])]);
        assert_eq!(ids(&order), vec!["C"]);
        assert_eq!(order.omitted, vec![FieldId::from("A"), FieldId::from("B")]);
    }

    #[test]
    fn test_dependents_of_a_cycle_are_omitted() {
        let order = topological_order(&[
            node("A", &["B"]),
            node("B", &["A"]),
            node("D", &["A"]),
        ]);
        assert!(order.ordered.is_empty());
        assert_eq!(order.omitted.len(), 3);
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let order = topological_order(&[node("A", &["A"])]);
        assert!(order.has_cycle());
    }

    #[test]
    fn test_strict_conversion() {
        let ok = topological_order(&[node("A", &[])]).into_strict().unwrap();
        assert_eq!(ok.len(), 1);

        let err = topological_order(&[node("A", &["B"]), node("B", &["A"])])
            .into_strict()
            .unwrap_err();
        assert!(matches!(err, ValidationError::DependencyCycle { ref field_ids } if field_ids.len() == 2));
    }

    #[test]
    fn test_field_without_intelligence_has_no_dependencies() {
        let field = Field::new("fldA", "A", "a");
        assert!(field.dependencies().is_empty());
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[derive(Debug, Clone)]
    struct Node(FieldId, Vec<FieldId>);

    impl DependencyNode for Node {
        fn node_id(&self) -> &FieldId {
            &self.0
        }
        fn dependencies(&self) -> &[FieldId] {
            &self.1
        }
    }

    /// Acyclic graphs: node `i` may only depend on nodes `< i`, then the
    /// input is shuffled.
    fn arb_dag() -> impl Strategy<Value = Vec<Node>> {
        (1usize..12)
            .prop_flat_map(|n| {
                let edges = proptest::collection::vec(
                    proptest::collection::vec(any::<prop::sample::Index>(), 0..4),
                    n,
                );
                (Just(n), edges)
            })
            .prop_map(|(n, edges)| {
                (0..n)
                    .map(|i| {
                        let deps = if i == 0 {
                            Vec::new()
                        } else {
                            edges[i]
                                .iter()
                                .map(|ix| FieldId::from(format!("fld{}", ix.index(i))))
                                .collect()
                        };
                        Node(FieldId::from(format!("fld{i}")), deps)
                    })
                    .collect::<Vec<_>>()
            })
            .prop_shuffle()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Every dependency inside the set is processed before its dependent.
        #[test]
        fn prop_order_respects_dependencies(nodes in arb_dag()) {
            let order = topological_order(&nodes);
            prop_assert!(order.omitted.is_empty());
            prop_assert_eq!(order.ordered.len(), nodes.len());

            let mut seen: HashSet<FieldId> = HashSet::new();
            for node in &order.ordered {
                for dep in &node.1 {
                    prop_assert!(seen.contains(dep), "{} before {}", node.0, dep);
                }
                seen.insert(node.0.clone());
            }
        }

        /// Closing a back edge onto the first node puts the cycle in `omitted`.
        #[test]
        fn prop_cycle_is_reported(nodes in arb_dag()) {
            let mut nodes = nodes;
            if nodes.len() < 2 {
                return Ok(());
            }
            let first = nodes[0].0.clone();
            let last = nodes[nodes.len() - 1].0.clone();
            nodes[0].1.push(last.clone());
            let last_index = nodes.len() - 1;
            nodes[last_index].1.push(first.clone());

            let order = topological_order(&nodes);
            prop_assert!(order.omitted.contains(&first));
            prop_assert!(order.omitted.contains(&last));
            prop_assert_eq!(order.ordered.len() + order.omitted.len(), nodes.len());
        }
    }
}
