// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Triangle splitting along intersection curves
//!
//! Each triangle that recorded intersection segments is re-triangulated so
//! that every segment becomes an edge of the children. The segments are
//! first merged into a planar straight-line graph (corners, perimeter,
//! snapped endpoints, resolved crossings), then flattened to 2D and handed
//! to a [`Triangulator`].

use super::mesh::{IsectEdge, SplitPatch, SubTri, TMesh, TriId};
use super::robust_predicates::{dist_squared, face_normal, point_seg_dist_sq, project_drop_axis, seg_seg_closest};
use super::triangulate::Triangulator;
use crate::config::TrimConfig;
use crate::error::TriangulationError;
use nalgebra::{Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use tracing::{debug, instrument, warn};

/// Projected points closer than this (L1) make a triangle unsplittable
const DUP_PROJ_TOL: f64 = 1e-7;

/// What happened to one triangle
#[derive(Debug, Clone, PartialEq)]
pub enum SplitOutcome {
    /// No segments, or nothing to triangulate: the triangle is used as is
    Unchanged,
    /// Replaced by this many children
    Split(usize),
    /// Crossing resolution hit the iteration cap; flagged invalid
    Unresolved,
    /// Projected points coincide; left unsplit
    Degenerate,
    /// The triangulator refused the input; left unsplit
    Failed(TriangulationError),
}

/// Per-mesh tally of [`SplitOutcome`]s
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitStats {
    pub split: usize,
    pub children: usize,
    pub unchanged: usize,
    pub unresolved: usize,
    pub degenerate: usize,
    pub failed: usize,
}

impl AddAssign for SplitStats {
    fn add_assign(&mut self, other: Self) {
        self.split += other.split;
        self.children += other.children;
        self.unchanged += other.unchanged;
        self.unresolved += other.unresolved;
        self.degenerate += other.degenerate;
        self.failed += other.failed;
    }
}

/// Planar straight-line graph inside one triangle. Points 0..3 are the
/// triangle corners.
#[derive(Debug, Clone, Default)]
struct SegmentGraph {
    pts: Vec<Point3<f64>>,
    isect: Vec<bool>,
    edges: Vec<[usize; 2]>,
}

impl SegmentGraph {
    fn new(corners: [Point3<f64>; 3]) -> Self {
        Self {
            pts: corners.to_vec(),
            isect: vec![false; 3],
            edges: vec![[0, 1], [1, 2], [2, 0]],
        }
    }

    fn add_point(&mut self, p: Point3<f64>) -> usize {
        self.pts.push(p);
        self.isect.push(true);
        self.pts.len() - 1
    }

    fn has_edge(&self, a: usize, b: usize) -> bool {
        self.edges
            .iter()
            .any(|&[n0, n1]| (n0 == a && n1 == b) || (n0 == b && n1 == a))
    }

    /// Strictly inside edge `e` (not within `tol` of either end)
    fn on_edge(&self, p: &Point3<f64>, e: [usize; 2], tol: f64) -> bool {
        let (p0, p1) = (&self.pts[e[0]], &self.pts[e[1]]);
        if dist_squared(p, p0) < tol * tol || dist_squared(p, p1) < tol * tol {
            return false;
        }
        point_seg_dist_sq(p, p0, p1).0 < tol * tol
    }

    /// Insert segment endpoints: snap onto existing edges first, then onto
    /// existing points, else add free points. Then connect each pair.
    fn insert_segments(&mut self, segs: &[IsectEdge], tol: f64) {
        let pvec: Vec<Point3<f64>> = segs.iter().flat_map(|s| [s.p0, s.p1]).collect();
        let mut matched: Vec<Option<usize>> = vec![None; pvec.len()];

        for (i, p) in pvec.iter().enumerate() {
            let hit = (0..self.edges.len()).find(|&j| self.on_edge(p, self.edges[j], tol));
            if let Some(j) = hit {
                let sn = self.add_point(*p);
                matched[i] = Some(sn);
                let n0 = self.edges[j][0];
                self.edges.push([n0, sn]);
                self.edges[j][0] = sn;
            }
        }

        for (i, p) in pvec.iter().enumerate() {
            if matched[i].is_some() {
                continue;
            }
            let existing = self.pts.iter().position(|q| dist_squared(p, q) < tol * tol);
            matched[i] = Some(existing.unwrap_or_else(|| self.add_point(*p)));
        }

        for pair in matched.chunks_exact(2) {
            if let [Some(a), Some(b)] = *pair {
                if a != b && !self.has_edge(a, b) {
                    self.edges.push([a, b]);
                }
            }
        }
    }

    /// One scan for a pair of nearly touching edges; re-routes or splits the
    /// first one found. Returns true if the graph changed.
    fn resolve_one_crossing(&mut self, tol: f64, uv_min: f64, uv_max: f64) -> bool {
        let interior = |s: f64| s >= uv_min && s <= uv_max;

        for i in 0..self.edges.len() {
            let [en0, en1] = self.edges[i];
            for j in (i + 1)..self.edges.len() {
                let [en2, en3] = self.edges[j];
                if en0 == en2 || en0 == en3 || en1 == en2 || en1 == en3 {
                    continue;
                }

                let c = seg_seg_closest(&self.pts[en0], &self.pts[en1], &self.pts[en2], &self.pts[en3]);
                if c.dist >= tol * tol {
                    continue;
                }
                let (u, v) = (c.s, c.t);

                // Touching at endpoints only
                if !interior(u) && !interior(v) {
                    continue;
                }

                if u < uv_min && interior(v) {
                    // Edge i's start lies on edge j
                    self.edges[j] = [en2, en0];
                    self.edges.push([en0, en3]);
                } else if u > uv_max && interior(v) {
                    self.edges[j] = [en2, en1];
                    self.edges.push([en1, en3]);
                } else if v < uv_min && interior(u) {
                    self.edges[i] = [en2, en0];
                    self.edges.push([en2, en1]);
                } else if v > uv_max && interior(u) {
                    self.edges[i] = [en3, en0];
                    self.edges.push([en3, en1]);
                } else {
                    // Proper crossing: new point at the closest approach
                    let mid = Point3::from((c.on_first.coords + c.on_second.coords) * 0.5);
                    let sn = self.add_point(mid);
                    self.edges[i] = [sn, en1];
                    self.edges[j] = [sn, en3];
                    self.edges.push([en2, sn]);
                    self.edges.push([en0, sn]);
                }
                return true;
            }
        }
        false
    }
}

/// Axis to drop when flattening: the dominant component of the triangle
/// normal, so the projection keeps the triangle largest. Ties favour x,
/// then y.
pub fn flatten_axis(corners: &[Point3<f64>; 3]) -> usize {
    let n = (corners[1] - corners[0]).cross(&(corners[2] - corners[0])).abs();

    if n.x >= n.y && n.x >= n.z {
        0
    } else if n.y >= n.z {
        1
    } else {
        2
    }
}

/// Lift a 2D point back onto the parent plane along the dropped axis
fn lift(q: &Point2<f64>, axis: usize, plane_pnt: &Point3<f64>, plane_norm: &Vector3<f64>) -> Point3<f64> {
    let (i, j) = match axis {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };
    let mut p = *plane_pnt;
    p[i] = q.x;
    p[j] = q.y;

    let na = plane_norm[axis];
    if na.abs() > 1e-12 {
        let off = plane_norm[i] * (q.x - plane_pnt[i]) + plane_norm[j] * (q.y - plane_pnt[j]);
        p[axis] = plane_pnt[axis] - off / na;
    }
    p
}

/// Split one triangle along its recorded intersection segments
pub fn split_tri(mesh: &mut TMesh, id: TriId, cfg: &TrimConfig, triangulator: &dyn Triangulator) -> SplitOutcome {
    mesh.tri_mut(id).split = None;

    let segs: Vec<IsectEdge> = {
        let mut kept: Vec<IsectEdge> = Vec::new();
        for seg in mesh.tri(id).isect_edges.iter().filter(|s| s.is_finite()) {
            if !kept.iter().any(|k| k.matches(seg, cfg.on_edge_tol)) {
                kept.push(*seg);
            }
        }
        kept
    };
    if segs.is_empty() {
        return SplitOutcome::Unchanged;
    }

    let corners = mesh.tri_points(id);
    let parent_norm = mesh.tri(id).norm;

    let mut graph = SegmentGraph::new(corners);
    graph.insert_segments(&segs, cfg.on_edge_tol);

    let mut resolved = false;
    for _ in 0..cfg.max_cross_iterations {
        if !graph.resolve_one_crossing(cfg.on_edge_tol, cfg.uv_min_tol, cfg.uv_max_tol()) {
            resolved = true;
            break;
        }
    }
    if !resolved {
        warn!(tri = id.0, mesh = %mesh.info.name, "crossing resolution did not converge; triangle left unsplit");
        mesh.tri_mut(id).invalid = true;
        return SplitOutcome::Unresolved;
    }

    if graph.pts.len() <= 3 || graph.edges.len() <= 3 {
        return SplitOutcome::Unchanged;
    }

    let axis = flatten_axis(&corners);
    let flat: Vec<Point2<f64>> = graph.pts.iter().map(|p| project_drop_axis(p, axis)).collect();

    for i in 0..flat.len() {
        for j in (i + 1)..flat.len() {
            if (flat[i].x - flat[j].x).abs() + (flat[i].y - flat[j].y).abs() < DUP_PROJ_TOL {
                debug!(tri = id.0, "coincident projected points; triangle left unsplit");
                return SplitOutcome::Degenerate;
            }
        }
    }

    let result = match triangulator.triangulate(&flat, &graph.edges) {
        Ok(r) => r,
        Err(err) => {
            debug!(tri = id.0, %err, "triangulation failed; triangle left unsplit");
            return SplitOutcome::Failed(err);
        }
    };
    if result.triangles.is_empty() {
        return SplitOutcome::Unchanged;
    }

    // Steiner points come after the input points
    let plane_norm = match face_normal(&corners[0], &corners[1], &corners[2]) {
        n if n == Vector3::zeros() => parent_norm,
        n => n,
    };
    let mut points = graph.pts;
    let mut isect = graph.isect;
    for q in result.points.iter().skip(points.len()) {
        points.push(lift(q, axis, &corners[0], &plane_norm));
        isect.push(false);
    }

    let tris: Vec<SubTri> = result
        .triangles
        .iter()
        .filter(|t| t.iter().all(|&k| k < points.len()))
        .map(|&[a, b, c]| {
            let cx = (points[c] - points[b]).cross(&(points[a] - points[b]));
            let corners = if cx.dot(&parent_norm) < 0.0 { [a, c, b] } else { [a, b, c] };
            SubTri {
                corners,
                norm: parent_norm,
                interior: false,
                mass_tag: None,
            }
        })
        .collect();

    let count = tris.len();
    mesh.tri_mut(id).split = Some(SplitPatch { points, isect, tris });
    SplitOutcome::Split(count)
}

/// Split every triangle of `mesh` that carries intersection segments
#[instrument(skip_all, fields(mesh = %mesh.info.name))]
pub fn split_mesh(mesh: &mut TMesh, cfg: &TrimConfig, triangulator: &dyn Triangulator) -> SplitStats {
    let mut stats = SplitStats::default();
    for id in mesh.tri_ids() {
        if mesh.tri(id).isect_edges.is_empty() {
            mesh.tri_mut(id).split = None;
            continue;
        }
        match split_tri(mesh, id, cfg, triangulator) {
            SplitOutcome::Split(n) => {
                stats.split += 1;
                stats.children += n;
            }
            SplitOutcome::Unchanged => stats.unchanged += 1,
            SplitOutcome::Unresolved => stats.unresolved += 1,
            SplitOutcome::Degenerate => stats.degenerate += 1,
            SplitOutcome::Failed(_) => stats.failed += 1,
        }
    }

    debug!(
        split = stats.split,
        children = stats.children,
        unresolved = stats.unresolved,
        failed = stats.failed,
        "split complete"
    );
    stats
}
