//! Disjoint-set forest over arena indices
//!
//! Nodes are plain `usize` handles into two parallel vectors, so a forest is
//! a cheap owned value that the grouper allocates per call and drops
//! afterwards. Union by size plus path compression keeps `find` and `union`
//! amortized near O(1).

/// Disjoint-set forest
#[derive(Debug, Default)]
pub(crate) struct UnionFind {
    /// Parent link per node; roots point at themselves
    parent: Vec<usize>,
    /// Component size, only meaningful at roots
    size: Vec<usize>,
}

impl UnionFind {
    /// Create an empty forest with room for `capacity` nodes
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            parent: Vec::with_capacity(capacity),
            size: Vec::with_capacity(capacity),
        }
    }

    /// Add a singleton component and return its node
    pub(crate) fn make_set(&mut self) -> usize {
        let node = self.parent.len();
        self.parent.push(node);
        self.size.push(1);
        node
    }

    /// Representative of the component containing `node`
    pub(crate) fn find(&mut self, node: usize) -> usize {
        let mut root = node;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut current = node;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }

        root
    }

    /// Merge the components of `a` and `b`, returning the new representative
    pub(crate) fn union(&mut self, a: usize, b: usize) -> usize {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return root_a;
        }

        let (big, small) = if self.size[root_a] >= self.size[root_b] {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        big
    }

    /// Number of nodes in the component containing `node`
    #[cfg(test)]
    pub(crate) fn component_size(&mut self, node: usize) -> usize {
        let root = self.find(node);
        self.size[root]
    }

    /// Number of nodes in the forest
    pub(crate) fn len(&self) -> usize {
        self.parent.len()
    }
}
