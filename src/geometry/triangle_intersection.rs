// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Triangle-triangle intersection
//!
//! Interval-overlap method: each triangle is cut by the other's plane, the
//! two cuts are projected onto the planes' common line and the overlap of
//! the two intervals is the intersection segment. Coplanar pairs are
//! reported but never produce a segment.

use super::robust_predicates::face_normal;
use super::BoundingBox;
use nalgebra::{Point3, Vector3};

/// Plane-side threshold, relative to the triangles' size
const PLANE_EPS: f64 = 1e-10;

/// Outcome of intersecting two triangles
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriTriIntersection {
    None,
    Coplanar,
    Segment(Point3<f64>, Point3<f64>),
}

impl TriTriIntersection {
    pub fn segment(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        match *self {
            Self::Segment(p0, p1) => Some((p0, p1)),
            _ => None,
        }
    }
}

/// Intersect triangles `a` and `b`. The returned segment is the same (up to
/// endpoint order) when the arguments are swapped.
pub fn tri_tri_intersection(a: &[Point3<f64>; 3], b: &[Point3<f64>; 3]) -> TriTriIntersection {
    let n1 = face_normal(&a[0], &a[1], &a[2]);
    let n2 = face_normal(&b[0], &b[1], &b[2]);
    if n1 == Vector3::zeros() || n2 == Vector3::zeros() {
        return TriTriIntersection::None;
    }

    let eps = PLANE_EPS * characteristic_length(a, b).max(1.0);

    let db = plane_distances(&n1, &a[0], b, eps);
    if db.iter().all(|&d| d == 0.0) {
        return TriTriIntersection::Coplanar;
    }
    if same_side(&db) {
        return TriTriIntersection::None;
    }

    let da = plane_distances(&n2, &b[0], a, eps);
    if da.iter().all(|&d| d == 0.0) {
        return TriTriIntersection::Coplanar;
    }
    if same_side(&da) {
        return TriTriIntersection::None;
    }

    let cut_a = plane_cut(a, &da);
    let cut_b = plane_cut(b, &db);
    if cut_a.is_empty() || cut_b.is_empty() {
        return TriTriIntersection::None;
    }

    let dir = n1.cross(&n2);
    let (a_lo, a_hi) = interval(&cut_a, &dir);
    let (b_lo, b_hi) = interval(&cut_b, &dir);

    // Each bound comes from whichever cut is tighter on that side
    let lo = if a_lo.0 >= b_lo.0 { a_lo } else { b_lo };
    let hi = if a_hi.0 <= b_hi.0 { a_hi } else { b_hi };

    if lo.0 > hi.0 + eps {
        return TriTriIntersection::None;
    }

    TriTriIntersection::Segment(lo.1, hi.1)
}

fn characteristic_length(a: &[Point3<f64>; 3], b: &[Point3<f64>; 3]) -> f64 {
    BoundingBox::from_points(a.iter().chain(b.iter())).diagonal()
}

/// Signed distances of `pts` from the plane through `origin` with unit
/// normal `n`; values within `eps` are snapped to zero
fn plane_distances(n: &Vector3<f64>, origin: &Point3<f64>, pts: &[Point3<f64>; 3], eps: f64) -> [f64; 3] {
    pts.map(|p| {
        let d = n.dot(&(p - origin));
        if d.abs() < eps {
            0.0
        } else {
            d
        }
    })
}

fn same_side(d: &[f64; 3]) -> bool {
    (d[0] > 0.0 && d[1] > 0.0 && d[2] > 0.0) || (d[0] < 0.0 && d[1] < 0.0 && d[2] < 0.0)
}

/// Points where a triangle meets a plane, given its vertex distances
fn plane_cut(tri: &[Point3<f64>; 3], d: &[f64; 3]) -> Vec<Point3<f64>> {
    let mut pts = Vec::with_capacity(2);
    for i in 0..3 {
        if d[i] == 0.0 {
            pts.push(tri[i]);
        }
    }
    for (i, j) in [(0, 1), (1, 2), (2, 0)] {
        if d[i] * d[j] < 0.0 {
            let t = d[i] / (d[i] - d[j]);
            pts.push(tri[i] + (tri[j] - tri[i]) * t);
        }
    }
    pts
}

/// Extent of `pts` along `dir`, with the point realising each bound
fn interval(pts: &[Point3<f64>], dir: &Vector3<f64>) -> ((f64, Point3<f64>), (f64, Point3<f64>)) {
    let first = (dir.dot(&pts[0].coords), pts[0]);
    pts.iter().skip(1).fold((first, first), |(lo, hi), p| {
        let t = dir.dot(&p.coords);
        let lo = if t < lo.0 { (t, *p) } else { lo };
        let hi = if t > hi.0 { (t, *p) } else { hi };
        (lo, hi)
    })
}
