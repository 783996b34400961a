// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometric predicates and measures
//!
//! Everything here is plain `f64` with explicit tolerances. Callers decide
//! what "close enough" means; these functions only report distances,
//! parameters and signs.

use nalgebra::{Point2, Point3, Vector3};

/// Parallel-line threshold for segment/segment distance
const SMALL_NUM: f64 = 1e-7;

/// Möller–Trumbore determinant threshold
const RAY_EPS: f64 = 1e-12;

/// Squared distance between two points
#[inline]
pub fn dist_squared(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (a - b).norm_squared()
}

/// Signed volume of the tetrahedron spanned by the origin and `a`, `b`, `c`
pub fn tetra_volume(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> f64 {
    a.dot(&b.cross(c)) / 6.0
}

/// Triangle area with Kahan's side-length formula, stable for slivers
pub fn area(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let mut sides = [(b - a).norm(), (c - a).norm(), (c - b).norm()];
    sides.sort_by(|x, y| y.total_cmp(x));
    let [a, b, c] = sides;

    if c - (a - b) < 0.0 {
        // Not a real triangle
        return 0.0;
    }

    0.25 * ((a + (b + c)) * (c - (a - b)) * (c + (a - b)) * (a + (b - c))).sqrt()
}

/// Unnormalized face normal `(p1 - p0) x (p2 - p0)`
#[inline]
pub fn face_cross(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> Vector3<f64> {
    (p1 - p0).cross(&(p2 - p0))
}

/// Unit face normal, or the zero vector for a degenerate triangle
pub fn face_normal(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> Vector3<f64> {
    let n = face_cross(p0, p1, p2);
    let mag = n.norm();
    if mag > 0.0 && mag.is_finite() {
        n / mag
    } else {
        Vector3::zeros()
    }
}

/// Cosines of the interior angles at `p0`, `p1`, `p2`, from squared edge
/// lengths via the law of cosines
pub fn cos_angles(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> [f64; 3] {
    let d01 = dist_squared(p0, p1);
    let d12 = dist_squared(p1, p2);
    let d20 = dist_squared(p2, p0);

    let s01 = d01.sqrt();
    let s12 = d12.sqrt();
    let s20 = d20.sqrt();

    let cos0 = (-d12 + d01 + d20) / (2.0 * s01 * s20);
    let cos1 = (-d20 + d01 + d12) / (2.0 * s01 * s12);
    let cos2 = (-d01 + d12 + d20) / (2.0 * s12 * s20);

    [cos0, cos1, cos2]
}

/// Interior angles in degrees
pub fn angles_deg(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> [f64; 3] {
    cos_angles(p0, p1, p2).map(|c| c.clamp(-1.0, 1.0).acos().to_degrees())
}

/// Squared distance from `p` to segment `s0-s1` and the clamped parameter
pub fn point_seg_dist_sq(p: &Point3<f64>, s0: &Point3<f64>, s1: &Point3<f64>) -> (f64, f64) {
    let d = s1 - s0;
    let len_sq = d.norm_squared();
    if len_sq <= 0.0 {
        return (dist_squared(p, s0), 0.0);
    }

    let t = (p - s0).dot(&d) / len_sq;
    if t < 0.0 {
        (dist_squared(p, s0), 0.0)
    } else if t > 1.0 {
        (dist_squared(p, s1), 1.0)
    } else {
        (dist_squared(p, &(s0 + d * t)), t)
    }
}

/// Closest approach of two segments
#[derive(Debug, Clone, Copy)]
pub struct SegSegClosest {
    pub dist: f64,
    /// Parameter on the first segment
    pub s: f64,
    /// Parameter on the second segment
    pub t: f64,
    pub on_first: Point3<f64>,
    pub on_second: Point3<f64>,
}

/// Minimum distance between segments `a0-a1` and `b0-b1`
pub fn seg_seg_closest(
    a0: &Point3<f64>,
    a1: &Point3<f64>,
    b0: &Point3<f64>,
    b1: &Point3<f64>,
) -> SegSegClosest {
    let u = a1 - a0;
    let v = b1 - b0;
    let w = a0 - b0;
    let a = u.dot(&u);
    let b = u.dot(&v);
    let c = v.dot(&v);
    let d = u.dot(&w);
    let e = v.dot(&w);
    let det = a * c - b * b;

    let (mut s_n, mut s_d, mut t_n, t_d) = if det < SMALL_NUM {
        // Nearly parallel: pin the first segment at its start
        (0.0, 1.0, e, c)
    } else {
        let s_n = b * e - c * d;
        let t_n = a * e - b * d;
        if s_n < 0.0 {
            (0.0, det, e, c)
        } else if s_n > det {
            (det, det, e + b, c)
        } else {
            (s_n, det, t_n, det)
        }
    };

    if t_n < 0.0 {
        t_n = 0.0;
        if -d < 0.0 {
            s_n = 0.0;
        } else if -d > a {
            s_n = s_d;
        } else {
            s_n = -d;
            s_d = a;
        }
    } else if t_n > t_d {
        t_n = t_d;
        if -d + b < 0.0 {
            s_n = 0.0;
        } else if -d + b > a {
            s_n = s_d;
        } else {
            s_n = -d + b;
            s_d = a;
        }
    }

    let s = if s_n.abs() < SMALL_NUM || s_d == 0.0 { 0.0 } else { s_n / s_d };
    let t = if t_n.abs() < SMALL_NUM || t_d == 0.0 { 0.0 } else { t_n / t_d };

    let on_first = a0 + u * s;
    let on_second = b0 + v * t;

    SegSegClosest {
        dist: (on_first - on_second).norm(),
        s,
        t,
        on_first,
        on_second,
    }
}

/// Möller–Trumbore ray/triangle test. Returns the ray parameter of the hit,
/// which may be negative; edges and vertices count as hits.
pub fn ray_triangle(
    orig: &Point3<f64>,
    dir: &Vector3<f64>,
    v0: &Point3<f64>,
    v1: &Point3<f64>,
    v2: &Point3<f64>,
) -> Option<f64> {
    let e1 = v1 - v0;
    let e2 = v2 - v0;
    let p = dir.cross(&e2);
    let det = e1.dot(&p);

    let scale = e1.norm() * e2.norm() * dir.norm();
    if det.abs() <= RAY_EPS * scale.max(f64::MIN_POSITIVE) {
        return None;
    }

    let inv_det = 1.0 / det;
    let s = orig - v0;
    let u = s.dot(&p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&e1);
    let v = dir.dot(&q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    Some(e2.dot(&q) * inv_det)
}

/// Segment/triangle crossing; returns the parameter along `p0-p1`
pub fn segment_triangle(
    p0: &Point3<f64>,
    p1: &Point3<f64>,
    v0: &Point3<f64>,
    v1: &Point3<f64>,
    v2: &Point3<f64>,
) -> Option<f64> {
    let dir = p1 - p0;
    ray_triangle(p0, &dir, v0, v1, v2).filter(|t| (0.0..=1.0).contains(t))
}

/// Twice the signed area of the 2D triangle `a, b, c`; positive when
/// counter-clockwise
#[inline]
pub fn orient2d(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Positive when `d` lies inside the circumcircle of counter-clockwise `a, b, c`
pub fn incircle(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>, d: &Point2<f64>) -> f64 {
    let adx = a.x - d.x;
    let ady = a.y - d.y;
    let bdx = b.x - d.x;
    let bdy = b.y - d.y;
    let cdx = c.x - d.x;
    let cdy = c.y - d.y;

    let ad = adx * adx + ady * ady;
    let bd = bdx * bdx + bdy * bdy;
    let cd = cdx * cdx + cdy * cdy;

    adx * (bdy * cd - bd * cdy) - ady * (bdx * cd - bd * cdx) + ad * (bdx * cdy - bdy * cdx)
}

/// Do segments `a-b` and `c-d` cross at a point interior to both?
pub fn segments_cross_2d(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>, d: &Point2<f64>) -> bool {
    let o1 = orient2d(a, b, c);
    let o2 = orient2d(a, b, d);
    let o3 = orient2d(c, d, a);
    let o4 = orient2d(c, d, b);
    o1 * o2 < 0.0 && o3 * o4 < 0.0
}

/// Drop one coordinate axis (0 = x, 1 = y, 2 = z)
#[inline]
pub fn project_drop_axis(p: &Point3<f64>, axis: usize) -> Point2<f64> {
    match axis {
        0 => Point2::new(p.y, p.z),
        1 => Point2::new(p.x, p.z),
        _ => Point2::new(p.x, p.y),
    }
}
