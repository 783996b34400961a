// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Octree over mesh nodes, used to find near-duplicate vertices

use super::mesh::{NodeId, TMesh};
use super::tri_octree::octant;
use super::BoundingBox;
use nalgebra::Point3;

#[derive(Debug, Clone)]
pub enum NodeOctKind {
    Leaf(Vec<NodeId>),
    Internal([usize; 8]),
}

#[derive(Debug, Clone)]
pub struct NodeOctNode {
    pub bbox: BoundingBox,
    pub kind: NodeOctKind,
}

/// Node octree; every box is padded so that a point near a border is found
/// in every leaf that could hold one of its duplicates. A child's padded box
/// stays inside its parent's, so queries prune at internal nodes.
#[derive(Debug, Clone)]
pub struct NodeOctree {
    nodes: Vec<NodeOctNode>,
}

impl NodeOctree {
    /// Build over every node of `mesh`. Buckets split while they hold more
    /// than `leaf_size` nodes and their diagonal exceeds `sqrt(merge_tol)`.
    pub fn build(mesh: &TMesh, leaf_size: usize, merge_tol: f64) -> Self {
        let max_size = merge_tol.sqrt();
        let ids: Vec<NodeId> = (0..mesh.nodes.len()).map(NodeId).collect();
        let mut tree = Self { nodes: Vec::new() };
        tree.build_node(mesh, ids, leaf_size.max(1), max_size);
        tree
    }

    fn build_node(&mut self, mesh: &TMesh, ids: Vec<NodeId>, leaf_size: usize, max_size: f64) -> usize {
        let mut bbox = BoundingBox::empty();
        for &n in &ids {
            bbox.expand_to_include(&mesh.point(n));
        }

        let idx = self.nodes.len();
        self.nodes.push(NodeOctNode {
            bbox,
            kind: NodeOctKind::Leaf(Vec::new()),
        });

        if ids.len() <= leaf_size || bbox.diagonal() <= max_size {
            self.finish_leaf(idx, ids, max_size);
            return idx;
        }

        let mid = bbox.center();
        let mut buckets: [Vec<NodeId>; 8] = Default::default();
        for n in ids {
            buckets[octant(&mesh.point(n), &mid)].push(n);
        }

        if buckets.iter().filter(|b| !b.is_empty()).count() <= 1 {
            let ids = buckets.into_iter().flatten().collect();
            self.finish_leaf(idx, ids, max_size);
            return idx;
        }

        let mut children = [0usize; 8];
        for (i, bucket) in buckets.into_iter().enumerate() {
            children[i] = self.build_node(mesh, bucket, leaf_size, max_size);
        }
        let node = &mut self.nodes[idx];
        node.bbox.expand(max_size);
        node.kind = NodeOctKind::Internal(children);
        idx
    }

    fn finish_leaf(&mut self, idx: usize, ids: Vec<NodeId>, pad: f64) {
        let node = &mut self.nodes[idx];
        if !node.bbox.is_empty() {
            node.bbox.expand(pad);
        }
        node.kind = NodeOctKind::Leaf(ids);
    }

    /// Non-empty leaves whose padded box contains `p`
    pub fn leaves_containing(&self, p: &Point3<f64>) -> Vec<&[NodeId]> {
        let mut out = Vec::new();
        if !self.nodes.is_empty() {
            self.collect_leaves(0, p, &mut out);
        }
        out
    }

    fn collect_leaves<'a>(&'a self, idx: usize, p: &Point3<f64>, out: &mut Vec<&'a [NodeId]>) {
        let node = &self.nodes[idx];
        if !node.bbox.contains(p) {
            return;
        }
        match &node.kind {
            NodeOctKind::Internal(children) => {
                for &c in children {
                    self.collect_leaves(c, p, out);
                }
            }
            NodeOctKind::Leaf(ids) if !ids.is_empty() => out.push(ids),
            NodeOctKind::Leaf(_) => {}
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(&n.kind, NodeOctKind::Leaf(ids) if !ids.is_empty()))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives::Primitive;
    use nalgebra::Vector3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_every_node_is_found_in_some_leaf() {
        let mesh = Primitive::sphere(Point3::origin(), 1.0, 12, 16).to_mesh("sphere", 1);
        let tree = NodeOctree::build(&mesh, 64, 1e-12);
        assert!(tree.leaf_count() > 1);

        for (i, node) in mesh.nodes.iter().enumerate() {
            let found = tree
                .leaves_containing(&node.pnt)
                .iter()
                .any(|leaf| leaf.contains(&NodeId(i)));
            assert!(found, "node {i} not found");
        }
    }

    #[test]
    fn test_pruned_query_matches_leaf_scan() {
        let mesh = Primitive::sphere(Point3::origin(), 1.0, 24, 32).to_mesh("sphere", 1);
        let tree = NodeOctree::build(&mesh, 16, 1e-6);
        assert!(tree.leaf_count() > 8);

        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            let p = Point3::new(rng.gen_range(-1.2..1.2), rng.gen_range(-1.2..1.2), rng.gen_range(-1.2..1.2));
            let scanned: Vec<&[NodeId]> = tree
                .nodes
                .iter()
                .filter_map(|n| match &n.kind {
                    NodeOctKind::Leaf(ids) if !ids.is_empty() && n.bbox.contains(&p) => Some(ids.as_slice()),
                    _ => None,
                })
                .collect();
            let found = tree.leaves_containing(&p);
            assert_eq!(found.len(), scanned.len(), "at {p:?}");
            for leaf in scanned {
                assert!(found.iter().any(|f| std::ptr::eq(*f, leaf)));
            }
        }

        assert!(tree.leaves_containing(&Point3::new(5.0, 0.0, 0.0)).is_empty());
    }

    #[test]
    fn test_coincident_nodes_stay_together() {
        let mut mesh = TMesh::named("dups");
        for _ in 0..100 {
            mesh.add_node(Point3::new(1.0, 1.0, 1.0));
        }
        mesh.add_node(Point3::new(1.0, 1.0, 1.0) + Vector3::repeat(1e-8));
        let tree = NodeOctree::build(&mesh, 64, 1e-12);
        assert_eq!(tree.leaf_count(), 1);
    }
}
