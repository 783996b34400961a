// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Triangle mesh stored as index arenas
//!
//! A [`TMesh`] owns three arenas (nodes, edges, triangles) addressed by
//! [`NodeId`], [`EdgeId`] and [`TriId`]. Adjacency (node -> triangles,
//! triangle -> edges) is derived data: every topology pass rebuilds it from
//! the triangle corner lists instead of patching it in place.

use super::robust_predicates::{area, dist_squared, face_normal};
use super::tri_octree::TriOctree;
use super::BoundingBox;
use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub usize);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

arena_id!(NodeId);
arena_id!(EdgeId);
arena_id!(TriId);

/// Mesh vertex
#[derive(Debug, Clone)]
pub struct Node {
    pub pnt: Point3<f64>,
    /// Stable identity; the lowest id wins when duplicates are merged
    pub id: usize,
    /// Lies on an intersection curve between two meshes
    pub isect: bool,
    /// Near-duplicates found by the last merge pass (includes self)
    pub merge_list: Vec<NodeId>,
    pub tris: Vec<TriId>,
    pub edges: Vec<EdgeId>,
}

impl Node {
    pub fn new(pnt: Point3<f64>, id: usize) -> Self {
        Self {
            pnt,
            id,
            isect: false,
            merge_list: Vec::new(),
            tris: Vec::new(),
            edges: Vec::new(),
        }
    }
}

/// Edge between two nodes, shared by at most two triangles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub n0: NodeId,
    pub n1: NodeId,
    pub tri0: Option<TriId>,
    pub tri1: Option<TriId>,
}

impl Edge {
    pub fn new(n0: NodeId, n1: NodeId) -> Self {
        Self {
            n0,
            n1,
            tri0: None,
            tri1: None,
        }
    }

    pub fn connects(&self, a: NodeId, b: NodeId) -> bool {
        (self.n0 == a && self.n1 == b) || (self.n0 == b && self.n1 == a)
    }
}

/// Raw intersection segment recorded on a triangle. Each triangle owns its
/// copy of both endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsectEdge {
    pub p0: Point3<f64>,
    pub p1: Point3<f64>,
}

impl IsectEdge {
    pub fn new(p0: Point3<f64>, p1: Point3<f64>) -> Self {
        Self { p0, p1 }
    }

    pub fn length(&self) -> f64 {
        (self.p1 - self.p0).norm()
    }

    pub fn is_finite(&self) -> bool {
        self.p0.coords.iter().chain(self.p1.coords.iter()).all(|c| c.is_finite())
    }

    /// Same segment within `tol`, in either direction
    pub fn matches(&self, other: &IsectEdge, tol: f64) -> bool {
        let tol_sq = tol * tol;
        (dist_squared(&self.p0, &other.p0) < tol_sq && dist_squared(&self.p1, &other.p1) < tol_sq)
            || (dist_squared(&self.p0, &other.p1) < tol_sq && dist_squared(&self.p1, &other.p0) < tol_sq)
    }
}

/// Component that owns a region for mass purposes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassTag {
    pub comp_id: i32,
    pub density: f64,
}

/// Child triangle produced by splitting; corners index the patch points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubTri {
    pub corners: [usize; 3],
    pub norm: Vector3<f64>,
    pub interior: bool,
    pub mass_tag: Option<MassTag>,
}

/// Local re-triangulation of one parent triangle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitPatch {
    pub points: Vec<Point3<f64>>,
    /// Parallel to `points`: point lies on an intersection curve
    pub isect: Vec<bool>,
    pub tris: Vec<SubTri>,
}

impl SplitPatch {
    pub fn corner_points(&self, sub: &SubTri) -> [Point3<f64>; 3] {
        sub.corners.map(|c| self.points[c])
    }

    pub fn is_empty(&self) -> bool {
        self.tris.is_empty()
    }
}

/// Mesh triangle
#[derive(Debug, Clone)]
pub struct Tri {
    pub n: [NodeId; 3],
    pub norm: Vector3<f64>,
    /// Adjacency edges, filled by the watertight pass in discovery order
    pub e: [Option<EdgeId>; 3],
    pub isect_edges: Vec<IsectEdge>,
    pub split: Option<SplitPatch>,
    pub interior: bool,
    pub invalid: bool,
    pub mass_tag: Option<MassTag>,
}

impl Tri {
    pub fn new(n: [NodeId; 3], norm: Vector3<f64>) -> Self {
        Self {
            n,
            norm,
            e: [None; 3],
            isect_edges: Vec::new(),
            split: None,
            interior: false,
            invalid: false,
            mass_tag: None,
        }
    }

    pub fn has_node(&self, node: NodeId) -> bool {
        self.n.contains(&node)
    }

    /// Children that replace this triangle, if it was split
    pub fn children(&self) -> Option<&SplitPatch> {
        self.split.as_ref().filter(|p| !p.is_empty())
    }

    pub fn num_edges(&self) -> usize {
        self.e.iter().filter(|e| e.is_some()).count()
    }
}

/// Drag build-up summary carried along from the source component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragFactors {
    pub min_chord: f64,
    pub avg_chord: f64,
    pub max_chord: f64,
    pub min_thick_to_chord: f64,
    pub avg_thick_to_chord: f64,
    pub max_thick_to_chord: f64,
    pub avg_sweep: f64,
    pub length: f64,
    pub max_xsec_area: f64,
    pub length_to_dia: f64,
}

/// Identity payload stamped by the component that produced the mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshInfo {
    pub name: String,
    pub comp_id: i32,
    pub density: f64,
    pub shell_mass_area: f64,
    pub shell: bool,
    pub mass_priority: i32,
    pub reflected: bool,
    pub drag: DragFactors,
}

impl Default for MeshInfo {
    fn default() -> Self {
        Self {
            name: String::from("mesh"),
            comp_id: 0,
            density: 1.0,
            shell_mass_area: 0.0,
            shell: false,
            mass_priority: 0,
            reflected: false,
            drag: DragFactors::default(),
        }
    }
}

impl MeshInfo {
    pub fn named(name: impl Into<String>, comp_id: i32) -> Self {
        Self {
            name: name.into(),
            comp_id,
            ..Self::default()
        }
    }
}

/// Cached per-mesh area and volume sums
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AreaVolume {
    pub theo_area: f64,
    pub wet_area: f64,
    pub theo_vol: f64,
    pub wet_vol: f64,
    pub guess_vol: f64,
}

/// Exterior facet ready for export or shell integration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Facet {
    pub pnts: [Point3<f64>; 3],
    pub norm: Vector3<f64>,
    pub mass_tag: Option<MassTag>,
}

/// Triangulated surface of one component
#[derive(Debug, Clone)]
pub struct TMesh {
    pub info: MeshInfo,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub tris: Vec<Tri>,
    /// Triangles missing a neighbour after the last watertight pass
    pub non_closed: Vec<TriId>,
    pub delete_me: bool,
    /// Helper box used to cut symmetric halves
    pub half_box: bool,
    pub stats: AreaVolume,
    tree: Option<TriOctree>,
}

impl TMesh {
    pub fn new(info: MeshInfo) -> Self {
        Self {
            info,
            nodes: Vec::new(),
            edges: Vec::new(),
            tris: Vec::new(),
            non_closed: Vec::new(),
            delete_me: false,
            half_box: false,
            stats: AreaVolume::default(),
            tree: None,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(MeshInfo::named(name, 0))
    }

    /// Build a mesh from a U x V point grid, two triangles per cell.
    /// Cells that collapse (poles, closed seams) yield no triangle.
    pub fn from_grid(info: MeshInfo, rows: &[Vec<Point3<f64>>]) -> Self {
        let mut mesh = Self::new(info);
        for pair in rows.windows(2) {
            let (r0, r1) = (&pair[0], &pair[1]);
            let cols = r0.len().min(r1.len());
            for j in 0..cols.saturating_sub(1) {
                let p00 = r0[j];
                let p10 = r1[j];
                let p11 = r1[j + 1];
                let p01 = r0[j + 1];
                mesh.add_tri_auto(p00, p10, p11);
                mesh.add_tri_auto(p00, p11, p01);
            }
        }
        mesh
    }

    pub fn add_node(&mut self, pnt: Point3<f64>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::new(pnt, id));
        NodeId(id)
    }

    /// Add a triangle with three freshly allocated nodes
    pub fn add_tri(&mut self, p0: Point3<f64>, p1: Point3<f64>, p2: Point3<f64>, norm: Vector3<f64>) -> TriId {
        let n0 = self.add_node(p0);
        let n1 = self.add_node(p1);
        let n2 = self.add_node(p2);
        self.add_tri_nodes([n0, n1, n2], norm)
    }

    /// Add a triangle with its normal taken from the winding; zero-area
    /// triangles are skipped
    pub fn add_tri_auto(&mut self, p0: Point3<f64>, p1: Point3<f64>, p2: Point3<f64>) -> Option<TriId> {
        let norm = face_normal(&p0, &p1, &p2);
        if norm == Vector3::zeros() {
            return None;
        }
        Some(self.add_tri(p0, p1, p2, norm))
    }

    /// Add a triangle over existing nodes
    pub fn add_tri_nodes(&mut self, n: [NodeId; 3], norm: Vector3<f64>) -> TriId {
        let id = TriId(self.tris.len());
        self.tris.push(Tri::new(n, norm));
        self.tree = None;
        id
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    #[inline]
    pub fn tri(&self, id: TriId) -> &Tri {
        &self.tris[id.0]
    }

    #[inline]
    pub fn tri_mut(&mut self, id: TriId) -> &mut Tri {
        &mut self.tris[id.0]
    }

    #[inline]
    pub fn point(&self, id: NodeId) -> Point3<f64> {
        self.nodes[id.0].pnt
    }

    pub fn tri_points(&self, id: TriId) -> [Point3<f64>; 3] {
        self.tris[id.0].n.map(|n| self.nodes[n.0].pnt)
    }

    pub fn tri_ids(&self) -> impl Iterator<Item = TriId> {
        (0..self.tris.len()).map(TriId)
    }

    pub fn num_tris(&self) -> usize {
        self.tris.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tris.is_empty()
    }

    /// Total number of split children across all triangles
    pub fn num_pnts(&self) -> usize {
        self.tris
            .iter()
            .filter_map(|t| t.split.as_ref())
            .map(|p| p.tris.len())
            .sum()
    }

    pub fn num_invalid(&self) -> usize {
        self.tris.iter().filter(|t| t.invalid).count()
    }

    /// Recompute a triangle normal from its corners
    pub fn compute_normal(&self, id: TriId) -> Vector3<f64> {
        let [p0, p1, p2] = self.tri_points(id);
        face_normal(&p0, &p1, &p2)
    }

    pub fn tri_area(&self, id: TriId) -> f64 {
        let [p0, p1, p2] = self.tri_points(id);
        area(&p0, &p1, &p2)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        for tri in &self.tris {
            for n in tri.n {
                bbox.expand_to_include(&self.nodes[n.0].pnt);
            }
        }
        bbox
    }

    /// Build the triangle octree
    pub fn load_bnd_box(&mut self, leaf_size: usize) {
        let tree = TriOctree::build(self, leaf_size);
        self.tree = Some(tree);
    }

    pub fn tree(&self) -> Option<&TriOctree> {
        self.tree.as_ref()
    }

    pub fn invalidate_tree(&mut self) {
        self.tree = None;
    }

    /// Drop intersection segments and split results from every triangle
    pub fn clear_isect(&mut self) {
        for tri in &mut self.tris {
            tri.isect_edges.clear();
            tri.split = None;
            tri.interior = false;
            tri.mass_tag = None;
        }
    }

    /// Apply a placement matrix to every point, normal and intersection record
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        let normal_matrix = matrix
            .try_inverse()
            .map(|m| m.transpose())
            .unwrap_or(*matrix);
        let xform_norm = |n: &Vector3<f64>| {
            let v = normal_matrix.transform_vector(n);
            let mag = v.norm();
            if mag > 0.0 {
                v / mag
            } else {
                v
            }
        };

        for node in &mut self.nodes {
            node.pnt = matrix.transform_point(&node.pnt);
        }
        for tri in &mut self.tris {
            tri.norm = xform_norm(&tri.norm);
            for seg in &mut tri.isect_edges {
                seg.p0 = matrix.transform_point(&seg.p0);
                seg.p1 = matrix.transform_point(&seg.p1);
            }
            if let Some(patch) = tri.split.as_mut() {
                for p in &mut patch.points {
                    *p = matrix.transform_point(p);
                }
                for sub in &mut patch.tris {
                    sub.norm = xform_norm(&sub.norm);
                }
            }
        }
        self.tree = None;
    }

    /// Uniform scale about the origin
    pub fn scale(&mut self, factor: f64) {
        self.transform(&Matrix4::new_scaling(factor));
    }

    /// Reverse winding and normals
    pub fn flip_normals(&mut self) {
        for tri in &mut self.tris {
            tri.n.swap(1, 2);
            tri.norm = -tri.norm;
            if let Some(patch) = tri.split.as_mut() {
                for sub in &mut patch.tris {
                    sub.corners.swap(1, 2);
                    sub.norm = -sub.norm;
                }
            }
        }
    }

    /// Append copies of every triangle of `other`, with fresh nodes
    pub fn merge_from(&mut self, other: &TMesh) {
        for id in other.tri_ids() {
            let [p0, p1, p2] = other.tri_points(id);
            self.add_tri(p0, p1, p2, other.tri(id).norm);
        }
    }

    /// Exterior surface: split children when present, else the triangle
    pub fn exterior_triangles(&self) -> Vec<Facet> {
        let mut facets = Vec::with_capacity(self.tris.len());
        for id in self.tri_ids() {
            let tri = self.tri(id);
            match tri.children() {
                Some(patch) => {
                    for sub in patch.tris.iter().filter(|s| !s.interior) {
                        facets.push(Facet {
                            pnts: patch.corner_points(sub),
                            norm: sub.norm,
                            mass_tag: sub.mass_tag,
                        });
                    }
                }
                None if !tri.interior => facets.push(Facet {
                    pnts: self.tri_points(id),
                    norm: tri.norm,
                    mass_tag: tri.mass_tag,
                }),
                None => {}
            }
        }
        facets
    }

    /// Rebuild node -> triangle back-references
    pub fn rebuild_node_tris(&mut self) {
        for node in &mut self.nodes {
            node.tris.clear();
        }
        for (t, tri) in self.tris.iter().enumerate() {
            for n in tri.n {
                self.nodes[n.0].tris.push(TriId(t));
            }
        }
    }
}

/// Do triangles `ta` of `a` and `tb` of `b` share an edge within `tol_sq`?
/// On a match the paired endpoints of both meshes are snapped to their
/// midpoints.
pub fn share_edge(a: &mut TMesh, ta: TriId, b: &mut TMesh, tb: TriId, tol_sq: f64) -> bool {
    const EDGES: [(usize, usize); 3] = [(0, 1), (1, 2), (0, 2)];
    let na = a.tri(ta).n;
    let nb = b.tri(tb).n;

    for (i0, i1) in EDGES {
        for (j0, j1) in EDGES {
            let (a0, a1) = (na[i0], na[i1]);
            let (b0, b1) = (nb[j0], nb[j1]);
            let pa0 = a.point(a0);
            let pa1 = a.point(a1);
            let pb0 = b.point(b0);
            let pb1 = b.point(b1);

            let pairs = if dist_squared(&pa0, &pb0) < tol_sq && dist_squared(&pa1, &pb1) < tol_sq {
                Some(((a0, b0), (a1, b1)))
            } else if dist_squared(&pa0, &pb1) < tol_sq && dist_squared(&pa1, &pb0) < tol_sq {
                Some(((a0, b1), (a1, b0)))
            } else {
                None
            };

            if let Some(((x0, y0), (x1, y1))) = pairs {
                for (x, y) in [(x0, y0), (x1, y1)] {
                    let mid = Point3::from((a.point(x).coords + b.point(y).coords) * 0.5);
                    a.nodes[x.0].pnt = mid;
                    b.nodes[y.0].pnt = mid;
                }
                a.invalidate_tree();
                b.invalidate_tree();
                return true;
            }
        }
    }

    false
}
