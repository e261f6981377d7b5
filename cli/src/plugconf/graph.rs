//! Dependency ranking of plugins.
//!
//! Nodes live in one arena and edges are indices into it, so every edge
//! observes the same node state.
use std::collections::HashMap;

use crate::paths::ReposPath;

#[derive(Debug, Default)]
struct Node {
    /// What this node depends on.
    deps: Vec<usize>,
    /// What depends on this node.
    rdeps: Vec<usize>,
}

/// Result of ranking a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranking {
    /// Input indices, dependencies before dependents, stable on ties.
    pub order: Vec<usize>,
    /// The graph has at least one cycle; members keep their input order.
    pub cyclic: bool,
    /// `(dependent, dependency)` pairs whose dependency is not in the input.
    pub unknown: Vec<(ReposPath, ReposPath)>,
}

/// Order `repos` (each with its declared dependencies) so that every
/// dependency precedes its dependents.
///
/// Leaves start at rank 0 and every node reached by walking reverse edges
/// from a leaf takes the deepest walk depth seen. The input is then
/// stable-sorted by rank.
#[must_use]
pub fn rank(repos: &[(ReposPath, Vec<ReposPath>)]) -> Ranking {
    let index: HashMap<&ReposPath, usize> = repos
        .iter()
        .enumerate()
        .map(|(i, (path, _))| (path, i))
        .collect();

    let mut nodes: Vec<Node> = repos.iter().map(|_| Node::default()).collect();
    let mut unknown = Vec::new();
    for (i, (path, deps)) in repos.iter().enumerate() {
        for dep in deps {
            match index.get(dep) {
                Some(&d) => {
                    if let Some(node) = nodes.get_mut(i)
                        && !node.deps.contains(&d)
                    {
                        node.deps.push(d);
                    }
                    if let Some(node) = nodes.get_mut(d)
                        && !node.rdeps.contains(&i)
                    {
                        node.rdeps.push(i);
                    }
                }
                None => unknown.push((path.clone(), dep.clone())),
            }
        }
    }

    let mut ranks: Vec<Option<usize>> = vec![None; nodes.len()];
    let mut on_path = vec![false; nodes.len()];
    for leaf in (0..nodes.len()).filter(|&i| nodes.get(i).is_some_and(|n| n.deps.is_empty())) {
        walk(&nodes, leaf, 0, &mut ranks, &mut on_path);
    }

    let mut order: Vec<usize> = (0..repos.len()).collect();
    order.sort_by_key(|&i| ranks.get(i).copied().flatten().unwrap_or(0));

    Ranking {
        order,
        cyclic: has_cycle(&nodes),
        unknown,
    }
}

fn walk(
    nodes: &[Node],
    idx: usize,
    depth: usize,
    ranks: &mut [Option<usize>],
    on_path: &mut [bool],
) {
    if on_path.get(idx).copied().unwrap_or(true) {
        return;
    }
    match ranks.get_mut(idx) {
        // Already reached at least this deep: its dependents are too.
        Some(Some(r)) if *r >= depth => return,
        Some(slot) => *slot = Some(depth),
        None => return,
    }
    if let Some(flag) = on_path.get_mut(idx) {
        *flag = true;
    }
    if let Some(node) = nodes.get(idx) {
        for &next in &node.rdeps {
            walk(nodes, next, depth + 1, ranks, on_path);
        }
    }
    if let Some(flag) = on_path.get_mut(idx) {
        *flag = false;
    }
}

/// Detect cycles using Kahn's algorithm.
fn has_cycle(nodes: &[Node]) -> bool {
    let mut in_degree: Vec<usize> = nodes.iter().map(|n| n.deps.len()).collect();

    let mut queue: Vec<usize> = in_degree
        .iter()
        .enumerate()
        .filter_map(|(i, &d)| if d == 0 { Some(i) } else { None })
        .collect();
    let mut processed = 0usize;

    while let Some(idx) = queue.pop() {
        processed += 1;
        if let Some(node) = nodes.get(idx) {
            for &dep in &node.rdeps {
                if let Some(count) = in_degree.get_mut(dep) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push(dep);
                    }
                }
            }
        }
    }

    processed != nodes.len()
}
