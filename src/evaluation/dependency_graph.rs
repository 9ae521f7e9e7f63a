//! Dependency ordering of active rules.
//!
//! This module builds the dependency graph between active components,
//! validates every declared dependency, and computes a topological
//! evaluation order. Independent components keep their declaration order.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

use crate::error::{EngineError, EngineResult};
use crate::models::{ActiveRuleIndex, EvalContext, Rule};

/// The dependency graph over one date's active rules.
///
/// Nodes are numbered by declaration position. A rule's dependencies on
/// context inputs are validated but do not become edges.
#[derive(Debug, Clone)]
pub struct DependencyGraph<'a> {
    nodes: Vec<&'a Rule>,
    /// For each node, the nodes it depends on.
    dependencies: Vec<Vec<usize>>,
}

impl<'a> DependencyGraph<'a> {
    /// Builds and validates the graph.
    ///
    /// Returns an error if an expression reads a name its rule does not
    /// declare (`UndeclaredDependency`), or a declared dependency is neither
    /// an active component nor an input of `context` (`UnresolvedDependency`).
    pub fn build(active: &ActiveRuleIndex<'a>, context: &EvalContext) -> EngineResult<Self> {
        let nodes: Vec<&'a Rule> = active.iter().collect();
        let mut dependencies = Vec::with_capacity(nodes.len());

        for rule in &nodes {
            let declared: BTreeSet<&str> = rule.depends_on.iter().map(String::as_str).collect();

            if let Some(reference) = rule
                .expression
                .references()
                .into_iter()
                .find(|name| !declared.contains(name))
            {
                return Err(EngineError::UndeclaredDependency {
                    target: rule.target.clone(),
                    reference: reference.to_string(),
                });
            }

            let mut edges = Vec::new();
            // Declaration order, so errors name the first missing dependency
            for dependency in &rule.depends_on {
                if let Some(position) = active.position(dependency) {
                    if !edges.contains(&position) {
                        edges.push(position);
                    }
                } else if !context.has_input(dependency) {
                    return Err(EngineError::UnresolvedDependency {
                        target: rule.target.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
            dependencies.push(edges);
        }

        Ok(Self {
            nodes,
            dependencies,
        })
    }

    /// The number of components in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no components.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Computes the evaluation order.
    ///
    /// Every component comes after all of its component dependencies. Among
    /// components that are ready at the same time, the one declared first
    /// goes first. Returns `CyclicDependency` naming the members of one cycle
    /// if no such order exists.
    pub fn evaluation_order(&self) -> EngineResult<Vec<&'a Rule>> {
        let count = self.nodes.len();
        let mut remaining: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (node, edges) in self.dependencies.iter().enumerate() {
            for &dependency in edges {
                dependents[dependency].push(node);
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = remaining
            .iter()
            .enumerate()
            .filter(|&(_, &n)| n == 0)
            .map(|(node, _)| Reverse(node))
            .collect();

        let mut order = Vec::with_capacity(count);
        while let Some(Reverse(node)) = ready.pop() {
            order.push(self.nodes[node]);
            for &dependent in &dependents[node] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() < count {
            return Err(EngineError::CyclicDependency {
                cycle: self.find_cycle(&remaining),
            });
        }

        Ok(order)
    }

    /// Extracts one cycle among the nodes left unordered.
    ///
    /// Every unordered node still waits on at least one unordered dependency,
    /// so following those edges from any of them must revisit a node.
    fn find_cycle(&self, remaining: &[usize]) -> Vec<String> {
        let blocked = |node: usize| remaining[node] > 0;

        let Some(start) = (0..self.nodes.len()).find(|&n| blocked(n)) else {
            return Vec::new();
        };

        let mut path: Vec<usize> = Vec::new();
        let mut current = start;
        loop {
            if let Some(position) = path.iter().position(|&n| n == current) {
                return path[position..]
                    .iter()
                    .map(|&n| self.nodes[n].target.clone())
                    .collect();
            }
            path.push(current);
            match self.dependencies[current].iter().copied().find(|&d| blocked(d)) {
                Some(next) => current = next,
                None => {
                    return path
                        .iter()
                        .map(|&n| self.nodes[n].target.clone())
                        .collect();
                }
            }
        }
    }
}

/// Validates `active` against `context` and returns its evaluation order.
pub fn evaluation_order<'a>(
    active: &ActiveRuleIndex<'a>,
    context: &EvalContext,
) -> EngineResult<Vec<&'a Rule>> {
    DependencyGraph::build(active, context)?.evaluation_order()
}
