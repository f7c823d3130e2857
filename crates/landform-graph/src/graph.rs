//! Resource graph construction and validation
//!
//! A graph is built incrementally, then finalized. Finalization checks
//! that every dependency target exists, rejects cycles, and fixes the
//! topological order used for planning. Ties among resources with no
//! ordering constraint break by declaration order, so plans computed
//! from the same graph are reproducible.

use crate::error::{GraphError, Result};
use crate::resource::Resource;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Incremental builder for a [`ResourceGraph`]
#[derive(Debug, Default)]
pub struct GraphBuilder {
    resources: Vec<Resource>,
    index: HashMap<String, usize>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declared resource.
    ///
    /// Fails if the identifier is already present or is not usable as a
    /// state file name. Dependency targets may be declared in any order;
    /// they are checked at [`finalize`](Self::finalize).
    pub fn add_resource(&mut self, resource: Resource) -> Result<&mut Self> {
        validate_identifier(&resource.id)?;
        if self.index.contains_key(&resource.id) {
            return Err(GraphError::DuplicateIdentifier(resource.id));
        }
        self.index.insert(resource.id.clone(), self.resources.len());
        self.resources.push(resource);
        Ok(self)
    }

    /// Validate the full set and produce an immutable graph
    pub fn finalize(self) -> Result<ResourceGraph> {
        for resource in &self.resources {
            for dependency in &resource.depends_on {
                if !self.index.contains_key(dependency) {
                    return Err(GraphError::UnknownDependency {
                        resource: resource.id.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        detect_cycle(&self.resources, &self.index)?;
        let order = topological_order(&self.resources, &self.index);

        tracing::debug!(resources = self.resources.len(), "finalized resource graph");
        Ok(ResourceGraph {
            resources: self.resources,
            index: self.index,
            order,
        })
    }
}

/// Validated, immutable set of resources for one stack
#[derive(Debug, Clone)]
pub struct ResourceGraph {
    resources: Vec<Resource>,
    index: HashMap<String, usize>,
    order: Vec<usize>,
}

impl ResourceGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.index.get(id).map(|&i| &self.resources[i])
    }

    /// Resources in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    /// Resource identifiers in dependency order
    pub fn topological_order(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|&i| self.resources[i].id.as_str())
    }
}

/// Identifiers double as state file names, so they must be plain path
/// segments.
fn validate_identifier(id: &str) -> Result<()> {
    let ok = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && id != "."
        && id != "..";
    if ok {
        Ok(())
    } else {
        Err(GraphError::InvalidIdentifier(id.to_string()))
    }
}

/// Depth-first search over dependency edges, reporting the offending
/// path when a cycle is found.
fn detect_cycle(resources: &[Resource], index: &HashMap<String, usize>) -> Result<()> {
    const WHITE: u8 = 0;
    const GRAY: u8 = 1;
    const BLACK: u8 = 2;

    fn visit(
        current: usize,
        resources: &[Resource],
        index: &HashMap<String, usize>,
        marks: &mut [u8],
        path: &mut Vec<usize>,
    ) -> Option<usize> {
        marks[current] = GRAY;
        path.push(current);
        for dependency in &resources[current].depends_on {
            let target = index[dependency.as_str()];
            match marks[target] {
                GRAY => return Some(target),
                WHITE => {
                    if let Some(start) = visit(target, resources, index, marks, path) {
                        return Some(start);
                    }
                }
                _ => {}
            }
        }
        path.pop();
        marks[current] = BLACK;
        None
    }

    let mut marks = vec![WHITE; resources.len()];
    for root in 0..resources.len() {
        if marks[root] != WHITE {
            continue;
        }
        let mut path = Vec::new();
        if let Some(start) = visit(root, resources, index, &mut marks, &mut path) {
            let from = path.iter().position(|&p| p == start).unwrap_or(0);
            let mut names: Vec<&str> = path[from..]
                .iter()
                .map(|&p| resources[p].id.as_str())
                .collect();
            names.push(resources[start].id.as_str());
            return Err(GraphError::CycleDetected(names.join(" -> ")));
        }
    }
    Ok(())
}

/// Kahn's algorithm with a min-heap keyed by declaration index, so
/// unordered resources come out in declaration order. Must run after
/// cycle detection.
fn topological_order(resources: &[Resource], index: &HashMap<String, usize>) -> Vec<usize> {
    let mut in_degree = vec![0usize; resources.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); resources.len()];
    for (i, resource) in resources.iter().enumerate() {
        for dependency in &resource.depends_on {
            let target = index[dependency.as_str()];
            dependents[target].push(i);
            in_degree[i] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(resources.len());
    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        for &dependent in &dependents[i] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }
    order
}
