//! Module dependency resolution
//!
//! Builds the dependency graph fresh on every pass, rejects cycles and
//! produces a deterministic load order.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, warn};

use crate::module::registry::descriptor::ModuleDescriptor;
use crate::module::traits::ModuleError;

/// Anything that can be placed in the dependency graph
pub trait DependencyNode {
    fn node_name(&self) -> &str;
    fn node_dependencies(&self) -> &[String];
    fn node_priority(&self) -> i64;
}

impl DependencyNode for ModuleDescriptor {
    fn node_name(&self) -> &str {
        &self.name
    }

    fn node_dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn node_priority(&self) -> i64 {
        self.priority
    }
}

/// A dependency edge dropped because its target is not loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedDependency {
    pub module: String,
    pub dependency: String,
}

/// Dependency resolution result
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Modules in load order (dependencies first)
    pub order: Vec<String>,
    /// Edges whose target was not among the nodes
    pub dropped: Vec<DroppedDependency>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Dependency resolver
pub struct DependencyResolver;

impl DependencyResolver {
    /// Resolve load order for `nodes`, given in declaration order
    ///
    /// Unknown dependency names are dropped with a warning. Names are
    /// expected to be unique; the contract validator guarantees that.
    pub fn resolve<N: DependencyNode>(nodes: &[N]) -> Result<Resolution, ModuleError> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            index.entry(node.node_name()).or_insert(i);
        }

        let mut edges: Vec<Vec<usize>> = Vec::with_capacity(nodes.len());
        let mut dropped = Vec::new();
        for node in nodes {
            let mut deps: Vec<usize> = Vec::new();
            for dep in node.node_dependencies() {
                match index.get(dep.as_str()) {
                    Some(&target) => {
                        if !deps.contains(&target) {
                            deps.push(target);
                        }
                    }
                    None => {
                        warn!(
                            "Module {} depends on unknown module {}, ignoring the dependency",
                            node.node_name(),
                            dep
                        );
                        dropped.push(DroppedDependency {
                            module: node.node_name().to_string(),
                            dependency: dep.clone(),
                        });
                    }
                }
            }
            edges.push(deps);
        }

        Self::detect_cycle(&edges).map_err(|cycle| ModuleError::CircularDependency {
            cycle: cycle
                .into_iter()
                .map(|i| nodes[i].node_name().to_string())
                .collect(),
        })?;

        let order = Self::topological_sort(nodes, &edges)?;
        debug!("Dependency resolution complete: {:?}", order);

        Ok(Resolution { order, dropped })
    }

    /// Three-colour depth-first search
    ///
    /// Returns the path that closed a cycle, first node repeated at the end.
    fn detect_cycle(edges: &[Vec<usize>]) -> Result<(), Vec<usize>> {
        let mut marks = vec![Mark::Unvisited; edges.len()];
        let mut path = Vec::new();
        for start in 0..edges.len() {
            if marks[start] == Mark::Unvisited {
                Self::visit(start, edges, &mut marks, &mut path)?;
            }
        }
        Ok(())
    }

    fn visit(
        node: usize,
        edges: &[Vec<usize>],
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Result<(), Vec<usize>> {
        marks[node] = Mark::InProgress;
        path.push(node);

        for &dep in &edges[node] {
            match marks[dep] {
                Mark::InProgress => {
                    let start = path.iter().position(|&n| n == dep).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(dep);
                    return Err(cycle);
                }
                Mark::Unvisited => Self::visit(dep, edges, marks, path)?,
                Mark::Done => {}
            }
        }

        path.pop();
        marks[node] = Mark::Done;
        Ok(())
    }

    /// Kahn's algorithm; ready nodes leave by priority, then declaration order
    fn topological_sort<N: DependencyNode>(
        nodes: &[N],
        edges: &[Vec<usize>],
    ) -> Result<Vec<String>, ModuleError> {
        let mut remaining: Vec<usize> = edges.iter().map(Vec::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        for (node, deps) in edges.iter().enumerate() {
            for &dep in deps {
                dependents[dep].push(node);
            }
        }

        let mut ready: BinaryHeap<(i64, Reverse<usize>)> = remaining
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count == 0)
            .map(|(i, _)| (nodes[i].node_priority(), Reverse(i)))
            .collect();

        let mut order = Vec::with_capacity(nodes.len());
        while let Some((_, Reverse(node))) = ready.pop() {
            order.push(nodes[node].node_name().to_string());
            for &dependent in &dependents[node] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.push((nodes[dependent].node_priority(), Reverse(dependent)));
                }
            }
        }

        if order.len() != nodes.len() {
            let stuck = remaining
                .iter()
                .enumerate()
                .filter(|&(_, &count)| count > 0)
                .map(|(i, _)| nodes[i].node_name().to_string())
                .collect();
            return Err(ModuleError::CircularDependency { cycle: stuck });
        }

        Ok(order)
    }
}
