//! Dependency ordering shared by jobs and steps.
//!
//! Kahn's algorithm over the nodes of one scope. Nodes that become ready at
//! the same time keep their declaration order.

use crate::error::{Error, Result};
use std::collections::{HashMap, VecDeque};

/// Something with an id and a list of sibling ids it depends on.
pub trait Node {
    fn id(&self) -> &str;
    fn needs(&self) -> &[String];
}

/// What is being ordered; used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Jobs,
    Steps,
}

impl Scope {
    fn singular(self) -> &'static str {
        match self {
            Scope::Jobs => "job",
            Scope::Steps => "step",
        }
    }

    fn plural(self) -> &'static str {
        match self {
            Scope::Jobs => "jobs",
            Scope::Steps => "steps",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Scope::Jobs => "Job",
            Scope::Steps => "Step",
        }
    }
}

/// Order `nodes` so every node comes after everything it needs.
///
/// Fails with a structural error on a missing dependency, a duplicate id or
/// a cycle; no partial order is returned.
pub fn order<N: Node>(nodes: &[N], scope: Scope) -> Result<Vec<&N>> {
    let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        if index_of.insert(node.id(), i).is_some() {
            return Err(Error::structural(format!(
                "Duplicate {} id '{}'.",
                scope.singular(),
                node.id()
            )));
        }
    }

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut in_degree: Vec<usize> = vec![0; nodes.len()];

    for (i, node) in nodes.iter().enumerate() {
        for dep in node.needs() {
            let Some(&dep_index) = index_of.get(dep.as_str()) else {
                return Err(Error::structural(format!(
                    "{} '{}' depends on missing {} '{}'.",
                    scope.title(),
                    node.id(),
                    scope.singular(),
                    dep
                )));
            };
            dependents[dep_index].push(i);
            in_degree[i] += 1;
        }
    }

    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut ordered = Vec::with_capacity(nodes.len());

    while let Some(current) = queue.pop_front() {
        ordered.push(&nodes[current]);
        for &dependent in &dependents[current] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    if ordered.len() != nodes.len() {
        return Err(Error::structural(format!(
            "Cyclic dependency detected among {}.",
            scope.plural()
        )));
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct N {
        id: String,
        needs: Vec<String>,
    }

    impl Node for N {
        fn id(&self) -> &str {
            &self.id
        }
        fn needs(&self) -> &[String] {
            &self.needs
        }
    }

    fn n(id: &str, needs: &[&str]) -> N {
        N {
            id: id.to_string(),
            needs: needs.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn ids(nodes: Vec<&N>) -> Vec<&str> {
        nodes.into_iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn test_independent_nodes_keep_declaration_order() {
        let nodes = vec![n("c", &[]), n("a", &[]), n("b", &[])];
        assert_eq!(ids(order(&nodes, Scope::Steps).unwrap()), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_dependencies_come_first() {
        let nodes = vec![n("deploy", &["build", "test"]), n("test", &["build"]), n("build", &[])];
        assert_eq!(
            ids(order(&nodes, Scope::Jobs).unwrap()),
            vec!["build", "test", "deploy"]
        );
    }

    #[test]
    fn test_ties_follow_declaration_order() {
        // y and z are both ready from the start; y is declared first
        let nodes = vec![n("x", &["z"]), n("y", &[]), n("z", &[])];
        assert_eq!(ids(order(&nodes, Scope::Steps).unwrap()), vec!["y", "z", "x"]);
    }

    #[test]
    fn test_diamond() {
        let nodes = vec![
            n("a", &[]),
            n("b", &["a"]),
            n("c", &["a"]),
            n("d", &["c", "b"]),
        ];
        assert_eq!(ids(order(&nodes, Scope::Steps).unwrap()), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_repeated_need() {
        let nodes = vec![n("b", &["a", "a"]), n("a", &[])];
        assert_eq!(ids(order(&nodes, Scope::Steps).unwrap()), vec!["a", "b"]);
    }

    #[test]
    fn test_missing_dependency() {
        let nodes = vec![n("a", &["ghost"])];
        let err = order(&nodes, Scope::Jobs).unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
        assert_eq!(err.to_string(), "Job 'a' depends on missing job 'ghost'.");
    }

    #[test]
    fn test_cycle() {
        let nodes = vec![n("a", &["b"]), n("b", &["a"]), n("c", &[])];
        let err = order(&nodes, Scope::Steps).unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
        assert_eq!(err.to_string(), "Cyclic dependency detected among steps.");
    }

    #[test]
    fn test_self_cycle() {
        let nodes = vec![n("a", &["a"])];
        assert!(order(&nodes, Scope::Jobs).is_err());
    }

    #[test]
    fn test_duplicate_id() {
        let nodes = vec![n("a", &[]), n("a", &[])];
        assert!(matches!(order(&nodes, Scope::Steps), Err(Error::Structural(_))));
    }

    #[test]
    fn test_empty_scope() {
        let nodes: Vec<N> = Vec::new();
        assert!(order(&nodes, Scope::Jobs).unwrap().is_empty());
    }
}
