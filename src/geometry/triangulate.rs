// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Constrained 2D triangulation
//!
//! The splitter only needs "triangulate these points so that these segments
//! appear as edges". [`Triangulator`] is that seam; [`ConstrainedDelaunay`]
//! is the default implementation:
//!
//! 1. Bowyer-Watson insertion inside a super-triangle, with the cavity grown
//!    by walking neighbours from the containing triangle
//! 2. constraint recovery by edge flips (Sloan)
//! 3. flood fill from the super-triangle, stopping at constraints, to drop
//!    everything outside the constrained boundary

use super::robust_predicates::{incircle, orient2d, segments_cross_2d};
use crate::error::TriangulationError;
use ahash::{AHashMap, AHashSet};
use nalgebra::Point2;
use std::collections::VecDeque;

/// Triangulated point set. Indices at or above the input point count refer
/// to Steiner points added by the triangulator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Triangulation {
    pub points: Vec<Point2<f64>>,
    pub triangles: Vec<[usize; 3]>,
}

/// Constrained triangulation capability
pub trait Triangulator {
    fn triangulate(&self, points: &[Point2<f64>], segments: &[[usize; 2]]) -> Result<Triangulation, TriangulationError>;
}

/// Constrained Delaunay triangulation by incremental insertion and flips
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstrainedDelaunay {
    /// Flip budget per constraint segment
    pub max_flips: usize,
}

impl Default for ConstrainedDelaunay {
    fn default() -> Self {
        Self { max_flips: 10_000 }
    }
}

/// Coincidence threshold in normalised (unit box) coordinates
const DUP_EPS: f64 = 1e-12;
/// Collinearity threshold in normalised coordinates
const ON_SEG_EPS: f64 = 1e-10;

impl Triangulator for ConstrainedDelaunay {
    fn triangulate(&self, points: &[Point2<f64>], segments: &[[usize; 2]]) -> Result<Triangulation, TriangulationError> {
        let n = points.len();
        if n < 3 {
            return Err(TriangulationError::TooFewPoints(n));
        }
        for &[a, b] in segments {
            if a >= n || b >= n {
                return Err(TriangulationError::BadSegment(a, b));
            }
        }

        let norm = normalise(points);
        for i in 0..n {
            for j in (i + 1)..n {
                if (norm[i] - norm[j]).norm() < DUP_EPS {
                    return Err(TriangulationError::DuplicatePoints(i, j));
                }
            }
        }

        let mut tri = Tri2::with_super_triangle(norm);
        for i in 0..n {
            tri.insert_point(i)?;
        }

        let mut constrained: AHashSet<(usize, usize)> = AHashSet::new();
        for &[a, b] in segments {
            if a == b {
                continue;
            }
            for [s0, s1] in tri.split_at_collinear(a, b, n) {
                tri.recover_edge(s0, s1, self.max_flips)?;
                constrained.insert(undirected(s0, s1));
            }
        }

        tri.remove_outside(n, &constrained);

        Ok(Triangulation {
            points: points.to_vec(),
            triangles: tri.live().collect(),
        })
    }
}

#[inline]
fn undirected(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

/// Map points into the unit box so the tolerances are scale free
fn normalise(points: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut min = points[0];
    let mut max = points[0];
    for p in points {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    let extent = (max.x - min.x).max(max.y - min.y);
    let scale = if extent > 0.0 { 1.0 / extent } else { 1.0 };
    points
        .iter()
        .map(|p| Point2::new((p.x - min.x) * scale, (p.y - min.y) * scale))
        .collect()
}

/// Working triangulation: counter-clockwise triangles with a directed-edge
/// index. The last three points are the super-triangle.
struct Tri2 {
    pts: Vec<Point2<f64>>,
    tris: Vec<Option<[usize; 3]>>,
    edges: AHashMap<(usize, usize), usize>,
    /// Most recently created triangle, where point location starts walking
    last: usize,
}

impl Tri2 {
    fn with_super_triangle(mut pts: Vec<Point2<f64>>) -> Self {
        let base = pts.len();
        pts.push(Point2::new(-20.0, -20.0));
        pts.push(Point2::new(22.0, -20.0));
        pts.push(Point2::new(1.0, 22.0));

        let mut tri = Self {
            pts,
            tris: Vec::new(),
            edges: AHashMap::new(),
            last: 0,
        };
        tri.add([base, base + 1, base + 2]);
        tri
    }

    fn add(&mut self, t: [usize; 3]) -> usize {
        let idx = self.tris.len();
        for k in 0..3 {
            self.edges.insert((t[k], t[(k + 1) % 3]), idx);
        }
        self.tris.push(Some(t));
        self.last = idx;
        idx
    }

    fn remove(&mut self, idx: usize) {
        if let Some(t) = self.tris[idx].take() {
            for k in 0..3 {
                let key = (t[k], t[(k + 1) % 3]);
                if self.edges.get(&key) == Some(&idx) {
                    self.edges.remove(&key);
                }
            }
        }
    }

    fn live(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.tris.iter().flatten().copied()
    }

    fn has_edge(&self, a: usize, b: usize) -> bool {
        self.edges.contains_key(&(a, b)) || self.edges.contains_key(&(b, a))
    }

    /// Triangle on the other side of directed edge `a -> b`
    fn across(&self, a: usize, b: usize) -> Option<usize> {
        self.edges.get(&(b, a)).copied()
    }

    fn third(t: [usize; 3], a: usize, b: usize) -> usize {
        t.into_iter().find(|&v| v != a && v != b).unwrap_or(t[0])
    }

    /// Smallest signed distance (times edge length) of `p` to the edges of `t`
    fn depth(&self, t: [usize; 3], p: &Point2<f64>) -> f64 {
        (0..3)
            .map(|k| orient2d(&self.pts[t[k]], &self.pts[t[(k + 1) % 3]], p))
            .fold(f64::INFINITY, f64::min)
    }

    /// Containing triangle. Walks from the last created triangle towards
    /// `p`; points on or near an edge fall back to [`Self::locate_scan`].
    fn locate(&self, p: &Point2<f64>) -> Option<usize> {
        let mut cur = self.last;
        for _ in 0..self.tris.len() {
            let Some(t) = self.tris.get(cur).copied().flatten() else {
                break;
            };
            let exit = (0..3).find(|&k| orient2d(&self.pts[t[k]], &self.pts[t[(k + 1) % 3]], p) < 0.0);
            match exit {
                None if self.depth(t, p) > DUP_EPS => return Some(cur),
                None => break,
                Some(k) => match self.across(t[k], t[(k + 1) % 3]) {
                    Some(next) => cur = next,
                    None => break,
                },
            }
        }
        self.locate_scan(p)
    }

    /// Containing triangle, preferring the one the point is deepest inside
    fn locate_scan(&self, p: &Point2<f64>) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, t) in self.tris.iter().enumerate() {
            let Some(t) = *t else { continue };
            let depth = self.depth(t, p);
            if depth >= -DUP_EPS && best.map_or(true, |(_, d)| depth > d) {
                best = Some((idx, depth));
            }
        }
        best.map(|(idx, _)| idx)
    }

    fn insert_point(&mut self, vi: usize) -> Result<(), TriangulationError> {
        let p = self.pts[vi];
        let start = self.locate(&p).ok_or(TriangulationError::PointNotLocated(vi))?;

        // Grow the cavity across edges whose far triangle's circumcircle
        // holds the point
        let mut cavity = vec![start];
        let mut in_cavity: AHashSet<usize> = AHashSet::from_iter([start]);
        let mut k = 0;
        while k < cavity.len() {
            let Some(t) = self.tris[cavity[k]] else { break };
            for e in 0..3 {
                let (a, b) = (t[e], t[(e + 1) % 3]);
                if let Some(nb) = self.across(a, b) {
                    if in_cavity.contains(&nb) {
                        continue;
                    }
                    if let Some(nt) = self.tris[nb] {
                        if incircle(&self.pts[nt[0]], &self.pts[nt[1]], &self.pts[nt[2]], &p) > 0.0 {
                            in_cavity.insert(nb);
                            cavity.push(nb);
                        }
                    }
                }
            }
            k += 1;
        }

        let mut boundary = Vec::new();
        for &idx in &cavity {
            let Some(t) = self.tris[idx] else { continue };
            for e in 0..3 {
                let (a, b) = (t[e], t[(e + 1) % 3]);
                let inside = self.across(a, b).is_some_and(|nb| in_cavity.contains(&nb));
                if !inside {
                    if orient2d(&self.pts[a], &self.pts[b], &p) <= 0.0 {
                        return Err(TriangulationError::PointNotLocated(vi));
                    }
                    boundary.push((a, b));
                }
            }
        }

        for idx in cavity {
            self.remove(idx);
        }
        for (a, b) in boundary {
            self.add([a, b, vi]);
        }
        Ok(())
    }

    /// Break segment `a-b` at every input point lying on it
    fn split_at_collinear(&self, a: usize, b: usize, n: usize) -> Vec<[usize; 2]> {
        let pa = self.pts[a];
        let d = self.pts[b] - pa;
        let len_sq = d.norm_squared();

        let mut on: Vec<(f64, usize)> = (0..n)
            .filter(|&i| i != a && i != b)
            .filter_map(|i| {
                let w = self.pts[i] - pa;
                let t = w.dot(&d) / len_sq;
                let off = (w - d * t).norm();
                (t > 0.0 && t < 1.0 && off < ON_SEG_EPS).then_some((t, i))
            })
            .collect();
        on.sort_by(|x, y| x.0.total_cmp(&y.0));

        let mut chain = Vec::with_capacity(on.len() + 2);
        chain.push(a);
        chain.extend(on.into_iter().map(|(_, i)| i));
        chain.push(b);
        chain.windows(2).map(|w| [w[0], w[1]]).collect()
    }

    /// Flip edges until `a-b` is an edge of the triangulation
    fn recover_edge(&mut self, a: usize, b: usize, max_flips: usize) -> Result<(), TriangulationError> {
        if self.has_edge(a, b) {
            return Ok(());
        }

        let (pa, pb) = (self.pts[a], self.pts[b]);
        let mut queue: VecDeque<(usize, usize)> = self
            .edges
            .keys()
            .filter(|&&(u, v)| u < v && u != a && u != b && v != a && v != b)
            .filter(|&&(u, v)| segments_cross_2d(&pa, &pb, &self.pts[u], &self.pts[v]))
            .copied()
            .collect();

        let mut flips = 0;
        while let Some((u, v)) = queue.pop_front() {
            flips += 1;
            if flips > max_flips {
                return Err(TriangulationError::ConstraintNotRecovered(a, b));
            }

            let (Some(&t1), Some(&t2)) = (self.edges.get(&(u, v)), self.edges.get(&(v, u))) else {
                continue;
            };
            let (Some(tri1), Some(tri2)) = (self.tris[t1], self.tris[t2]) else {
                continue;
            };
            let w1 = Self::third(tri1, u, v);
            let w2 = Self::third(tri2, u, v);

            let convex = orient2d(&self.pts[w1], &self.pts[u], &self.pts[w2]) > 0.0
                && orient2d(&self.pts[w2], &self.pts[v], &self.pts[w1]) > 0.0;
            if !convex {
                queue.push_back((u, v));
                continue;
            }

            self.remove(t1);
            self.remove(t2);
            self.add([w1, u, w2]);
            self.add([w2, v, w1]);

            let still_crossing = ![a, b].contains(&w1)
                && ![a, b].contains(&w2)
                && segments_cross_2d(&pa, &pb, &self.pts[w1], &self.pts[w2]);
            if still_crossing {
                queue.push_back((w1, w2));
            }
        }

        if self.has_edge(a, b) {
            Ok(())
        } else {
            Err(TriangulationError::ConstraintNotRecovered(a, b))
        }
    }

    /// Remove every triangle reachable from the super-triangle without
    /// crossing a constraint
    fn remove_outside(&mut self, n: usize, constrained: &AHashSet<(usize, usize)>) {
        let mut stack: Vec<usize> = self
            .tris
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.filter(|t| t.iter().any(|&v| v >= n)).map(|_| i))
            .collect();
        let mut outside: AHashSet<usize> = stack.iter().copied().collect();

        while let Some(idx) = stack.pop() {
            let Some(t) = self.tris[idx] else { continue };
            for e in 0..3 {
                let (a, b) = (t[e], t[(e + 1) % 3]);
                if constrained.contains(&undirected(a, b)) {
                    continue;
                }
                if let Some(nb) = self.across(a, b) {
                    if outside.insert(nb) {
                        stack.push(nb);
                    }
                }
            }
        }

        for idx in outside {
            self.remove(idx);
        }
    }
}
