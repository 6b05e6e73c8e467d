//! Dependency edge recorder
//!
//! Edges point from a consumer to the provider whose attribute it reads.
//! The emission order places every provider before its consumers, with
//! ties broken by declaration order so output is stable across runs.

use std::collections::{BTreeMap, BTreeSet};

/// A cycle in the dependency graph.
///
/// The first and last entries are the same node, e.g. `[a, b, a]` means
/// `a` reads `b` and `b` reads `a`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle<N>(pub Vec<N>);

/// Directed dependency graph over node handles
#[derive(Debug, Clone)]
pub struct DependencyGraph<N> {
    /// Nodes in declaration order
    order: Vec<N>,
    /// consumer -> providers
    edges: BTreeMap<N, BTreeSet<N>>,
}

impl<N: Copy + Ord> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Copy + Ord> DependencyGraph<N> {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            edges: BTreeMap::new(),
        }
    }

    /// Register a node. Re-adding a node keeps its original position.
    pub fn add_node(&mut self, node: N) {
        if !self.contains(node) {
            self.order.push(node);
        }
    }

    /// Returns true if the node is registered
    pub fn contains(&self, node: N) -> bool {
        self.order.contains(&node)
    }

    /// Number of registered nodes
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if no nodes are registered
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Remove a node and every edge touching it
    pub fn remove_node(&mut self, node: N) {
        self.order.retain(|n| *n != node);
        self.edges.remove(&node);
        for providers in self.edges.values_mut() {
            providers.remove(&node);
        }
    }

    /// Record that `consumer` depends on `provider`
    pub fn add_edge(&mut self, consumer: N, provider: N) {
        self.edges.entry(consumer).or_default().insert(provider);
    }

    /// Providers `node` depends on
    pub fn providers(&self, node: N) -> impl Iterator<Item = N> + '_ {
        self.edges.get(&node).into_iter().flat_map(|p| p.iter().copied())
    }

    /// All edges as (consumer, provider), consumers in declaration order
    pub fn edges(&self) -> Vec<(N, N)> {
        self.order
            .iter()
            .flat_map(|&c| self.providers(c).map(move |p| (c, p)))
            .collect()
    }

    /// Restrict the graph to the nodes accepted by `keep`.
    ///
    /// Edges to dropped nodes are dropped as well.
    pub fn subgraph<F>(&self, keep: F) -> Self
    where
        F: Fn(N) -> bool,
    {
        let order: Vec<N> = self.order.iter().copied().filter(|&n| keep(n)).collect();
        let mut edges = BTreeMap::new();
        for &consumer in &order {
            let providers: BTreeSet<N> = self.providers(consumer).filter(|&p| keep(p)).collect();
            if !providers.is_empty() {
                edges.insert(consumer, providers);
            }
        }
        Self { order, edges }
    }

    /// Compute an order in which every provider precedes its consumers.
    ///
    /// Edges to providers that are not registered are ignored.
    pub fn emission_order(&self) -> Result<Vec<N>, Cycle<N>> {
        let position: BTreeMap<N, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(i, &n)| (n, i))
            .collect();

        let mut pending: BTreeMap<N, usize> = BTreeMap::new();
        let mut consumers: BTreeMap<N, Vec<N>> = BTreeMap::new();
        for &node in &self.order {
            let mut count = 0;
            for provider in self.providers(node) {
                if position.contains_key(&provider) {
                    count += 1;
                    consumers.entry(provider).or_default().push(node);
                }
            }
            pending.insert(node, count);
        }

        let mut ready: BTreeSet<(usize, N)> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(&n, _)| (position[&n], n))
            .collect();

        let mut out = Vec::with_capacity(self.order.len());
        while let Some(entry) = ready.iter().next().copied() {
            ready.remove(&entry);
            let (_, node) = entry;
            out.push(node);

            for &consumer in consumers.get(&node).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(count) = pending.get_mut(&consumer) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert((position[&consumer], consumer));
                    }
                }
            }
        }

        if out.len() == self.order.len() {
            return Ok(out);
        }

        let emitted: BTreeSet<N> = out.into_iter().collect();
        Err(self.find_cycle(&emitted, &position))
    }

    /// Walk provider edges among the nodes left over by the topological
    /// sort. Every such node still has an unemitted provider, so the walk
    /// must revisit a node; the revisited stretch is the cycle.
    fn find_cycle(&self, emitted: &BTreeSet<N>, position: &BTreeMap<N, usize>) -> Cycle<N> {
        let remaining = |n: &N| position.contains_key(n) && !emitted.contains(n);

        let mut path: Vec<N> = Vec::new();
        let mut seen: BTreeMap<N, usize> = BTreeMap::new();
        let mut current = self.order.iter().copied().find(|n| remaining(n));

        while let Some(node) = current {
            if let Some(&start) = seen.get(&node) {
                let mut cycle: Vec<N> = path[start..].to_vec();
                // Start from the earliest-declared member for stable reports
                if let Some(min_at) = (0..cycle.len()).min_by_key(|&i| position[&cycle[i]]) {
                    cycle.rotate_left(min_at);
                }
                if let Some(&first) = cycle.first() {
                    cycle.push(first);
                }
                return Cycle(cycle);
            }
            seen.insert(node, path.len());
            path.push(node);
            current = self.providers(node).find(|p| remaining(p));
        }

        // Unreachable when emission_order found leftovers; keep the path
        Cycle(path)
    }
}
