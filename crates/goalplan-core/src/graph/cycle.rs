//! Cycle detection over "depends on" edges.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use goalplan_db::models::TaskDependency;

/// Adjacency index from a task to the tasks it depends on.
#[derive(Debug, Clone, Default)]
pub struct DependencyIndex {
    depends_on: HashMap<Uuid, Vec<Uuid>>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges<'a>(edges: impl IntoIterator<Item = &'a TaskDependency>) -> Self {
        let mut index = Self::new();
        for edge in edges {
            index.insert(*edge);
        }
        index
    }

    /// Record an edge without checking it.
    pub fn insert(&mut self, edge: TaskDependency) {
        let targets = self.depends_on.entry(edge.task_id).or_default();
        if !targets.contains(&edge.depends_on) {
            targets.push(edge.depends_on);
        }
    }

    /// Whether adding "`node` depends on `candidate`" would close a cycle.
    ///
    /// True when `node == candidate` or `node` is reachable from `candidate`
    /// by following existing edges.
    pub fn would_cycle(&self, node: Uuid, candidate: Uuid) -> bool {
        if node == candidate {
            return true;
        }
        let mut visited = HashSet::new();
        let mut stack = vec![candidate];
        while let Some(current) = stack.pop() {
            if current == node {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(next) = self.depends_on.get(&current) {
                stack.extend(next.iter().copied().filter(|id| !visited.contains(id)));
            }
        }
        false
    }
}

/// Whether adding "`node` depends on `candidate`" to `edges` would create a
/// cycle.
pub fn has_cycle(edges: &[TaskDependency], node: Uuid, candidate: Uuid) -> bool {
    DependencyIndex::from_edges(edges).would_cycle(node, candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(task_id: Uuid, depends_on: Uuid) -> TaskDependency {
        TaskDependency {
            task_id,
            depends_on,
        }
    }

    fn ids<const N: usize>() -> [Uuid; N] {
        std::array::from_fn(|_| Uuid::new_v4())
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let [a] = ids();
        assert!(has_cycle(&[], a, a));
    }

    #[test]
    fn closing_a_chain_is_a_cycle() {
        let [a, b, c] = ids();
        // c -> b -> a
        let edges = [edge(c, b), edge(b, a)];
        assert!(has_cycle(&edges, a, c));
        assert!(has_cycle(&edges, b, c));
    }

    #[test]
    fn extending_a_chain_is_not_a_cycle() {
        let [a, b, c, d] = ids();
        let edges = [edge(c, b), edge(b, a)];
        assert!(!has_cycle(&edges, d, c));
        assert!(!has_cycle(&edges, c, a));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        // d depends on b and c, both depend on a.
        let [a, b, c, d] = ids();
        let edges = [edge(b, a), edge(c, a), edge(d, b), edge(d, c)];
        assert!(!has_cycle(&edges, d, a));
        assert!(has_cycle(&edges, a, d));
    }

    #[test]
    fn shared_descendants_are_visited_once_without_missing_paths() {
        // x depends on p and q; both depend on r; r depends on n.
        let [n, p, q, r, x] = ids();
        let edges = [edge(x, p), edge(x, q), edge(p, r), edge(q, r), edge(r, n)];
        assert!(has_cycle(&edges, n, x));
        assert!(!has_cycle(&edges, x, n));
    }

    #[test]
    fn existing_cycle_does_not_hang() {
        let [a, b, c] = ids();
        let edges = [edge(a, b), edge(b, a)];
        assert!(!has_cycle(&edges, c, a));
    }

    #[test]
    fn index_deduplicates_edges() {
        let [a, b] = ids();
        let mut index = DependencyIndex::new();
        index.insert(edge(a, b));
        index.insert(edge(a, b));
        assert_eq!(index.depends_on[&a].len(), 1);
    }
}
