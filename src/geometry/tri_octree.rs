// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Octree over mesh triangles
//!
//! Broad phase for mesh/mesh intersection, parity ray casting and segment
//! queries. Stored as a flat arena; node 0 is the root.

use super::mesh::{TMesh, TriId};
use super::robust_predicates::{ray_triangle, segment_triangle};
use super::BoundingBox;
use nalgebra::{Point3, Vector3};

/// Octree node payload
#[derive(Debug, Clone)]
pub enum OctKind {
    Leaf(Vec<TriId>),
    Internal([usize; 8]),
}

/// Octree node: a box and either triangles or eight children
#[derive(Debug, Clone)]
pub struct OctNode {
    pub bbox: BoundingBox,
    pub kind: OctKind,
}

/// Triangle octree (one per mesh, rebuilt wholesale)
#[derive(Debug, Clone)]
pub struct TriOctree {
    nodes: Vec<OctNode>,
}

/// Octant of `p` relative to `mid`: +1 for x, +2 for y, +4 for z
#[inline]
pub(crate) fn octant(p: &Point3<f64>, mid: &Point3<f64>) -> usize {
    let mut cnt = 0;
    if p.x > mid.x {
        cnt += 1;
    }
    if p.y > mid.y {
        cnt += 2;
    }
    if p.z > mid.z {
        cnt += 4;
    }
    cnt
}

impl TriOctree {
    /// Build over every triangle of `mesh`, splitting buckets larger than
    /// `leaf_size`
    pub fn build(mesh: &TMesh, leaf_size: usize) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build_node(mesh, mesh.tri_ids().collect(), leaf_size.max(1));
        tree
    }

    fn build_node(&mut self, mesh: &TMesh, tris: Vec<TriId>, leaf_size: usize) -> usize {
        let mut bbox = BoundingBox::empty();
        for &t in &tris {
            for p in mesh.tri_points(t) {
                bbox.expand_to_include(&p);
            }
        }

        let idx = self.nodes.len();
        self.nodes.push(OctNode {
            bbox,
            kind: OctKind::Leaf(Vec::new()),
        });

        if tris.len() <= leaf_size {
            self.nodes[idx].kind = OctKind::Leaf(tris);
            return idx;
        }

        // Bucket on each triangle's first corner
        let mid = bbox.center();
        let mut buckets: [Vec<TriId>; 8] = Default::default();
        for t in tris {
            let p = mesh.point(mesh.tri(t).n[0]);
            buckets[octant(&p, &mid)].push(t);
        }

        // Everything landed in one octant: splitting would not shrink anything
        if buckets.iter().filter(|b| !b.is_empty()).count() <= 1 {
            let tris = buckets.into_iter().flatten().collect();
            self.nodes[idx].kind = OctKind::Leaf(tris);
            return idx;
        }

        let mut children = [0usize; 8];
        for (i, bucket) in buckets.into_iter().enumerate() {
            children[i] = self.build_node(mesh, bucket, leaf_size);
        }
        self.nodes[idx].kind = OctKind::Internal(children);
        idx
    }

    pub fn bbox(&self) -> BoundingBox {
        self.nodes.first().map(|n| n.bbox).unwrap_or_default()
    }

    pub fn nodes(&self) -> &[OctNode] {
        &self.nodes
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n.kind, OctKind::Leaf(_)))
            .count()
    }

    /// Visit every `(self triangle, other triangle)` pair whose leaf boxes
    /// overlap
    pub fn intersect<F>(&self, other: &TriOctree, mut visit: F)
    where
        F: FnMut(TriId, TriId),
    {
        if self.nodes.is_empty() || other.nodes.is_empty() {
            return;
        }
        self.intersect_node(0, other, 0, &mut visit);
    }

    fn intersect_node<F>(&self, a: usize, other: &TriOctree, b: usize, visit: &mut F)
    where
        F: FnMut(TriId, TriId),
    {
        let na = &self.nodes[a];
        let nb = &other.nodes[b];
        if !na.bbox.overlaps(&nb.bbox) {
            return;
        }

        match (&na.kind, &nb.kind) {
            (OctKind::Internal(children), _) => {
                for &c in children {
                    self.intersect_node(c, other, b, visit);
                }
            }
            (OctKind::Leaf(_), OctKind::Internal(children)) => {
                for &c in children {
                    self.intersect_node(a, other, c, visit);
                }
            }
            (OctKind::Leaf(ta), OctKind::Leaf(tb)) => {
                for &x in ta {
                    for &y in tb {
                        visit(x, y);
                    }
                }
            }
        }
    }

    /// Cast a ray from `orig` along +X and collect distinct positive hit
    /// parameters into `t_parms`. Returns the number of crossings.
    pub fn num_cross_x_ray(&self, mesh: &TMesh, orig: &Point3<f64>, dedup_tol: f64, t_parms: &mut Vec<f64>) -> usize {
        if !self.nodes.is_empty() {
            self.cross_x_ray_node(0, mesh, orig, dedup_tol, t_parms);
        }
        t_parms.len()
    }

    fn cross_x_ray_node(&self, idx: usize, mesh: &TMesh, orig: &Point3<f64>, dedup_tol: f64, t_parms: &mut Vec<f64>) {
        let node = &self.nodes[idx];
        if !node.bbox.admits_x_ray(orig) {
            return;
        }

        match &node.kind {
            OctKind::Internal(children) => {
                for &c in children {
                    self.cross_x_ray_node(c, mesh, orig, dedup_tol, t_parms);
                }
            }
            OctKind::Leaf(tris) => {
                let dir = Vector3::x();
                for &t in tris {
                    let [v0, v1, v2] = mesh.tri_points(t);
                    if let Some(tparm) = ray_triangle(orig, &dir, &v0, &v1, &v2) {
                        if tparm > 0.0 && !t_parms.iter().any(|v| (v - tparm).abs() < dedup_tol) {
                            t_parms.push(tparm);
                        }
                    }
                }
            }
        }
    }

    /// Points where segment `p0-p1` crosses mesh triangles
    pub fn seg_intersect(&self, mesh: &TMesh, p0: &Point3<f64>, p1: &Point3<f64>, out: &mut Vec<Point3<f64>>) {
        self.seg_tris(mesh, p0, p1, |_, tparm| out.push(p0 + (p1 - p0) * tparm));
    }

    /// Triangles crossed by segment `p0-p1`, with the parameter of each hit
    pub fn seg_tris<F>(&self, mesh: &TMesh, p0: &Point3<f64>, p1: &Point3<f64>, mut visit: F)
    where
        F: FnMut(TriId, f64),
    {
        if self.nodes.is_empty() {
            return;
        }
        let seg_box = BoundingBox::from_points([p0, p1]);
        self.seg_tris_node(0, mesh, p0, p1, &seg_box, &mut visit);
    }

    fn seg_tris_node<F>(
        &self,
        idx: usize,
        mesh: &TMesh,
        p0: &Point3<f64>,
        p1: &Point3<f64>,
        seg_box: &BoundingBox,
        visit: &mut F,
    ) where
        F: FnMut(TriId, f64),
    {
        let node = &self.nodes[idx];
        if !node.bbox.overlaps(seg_box) {
            return;
        }

        match &node.kind {
            OctKind::Internal(children) => {
                for &c in children {
                    self.seg_tris_node(c, mesh, p0, p1, seg_box, visit);
                }
            }
            OctKind::Leaf(tris) => {
                for &t in tris {
                    let [v0, v1, v2] = mesh.tri_points(t);
                    if let Some(tparm) = segment_triangle(p0, p1, &v0, &v1, &v2) {
                        visit(t, tparm);
                    }
                }
            }
        }
    }
}
