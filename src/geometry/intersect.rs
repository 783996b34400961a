// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Pairwise mesh intersection
//!
//! Walks the two triangle octrees together and records every
//! triangle/triangle intersection segment on both triangles.

use super::mesh::{IsectEdge, TMesh, TriId};
use super::robust_predicates::dist_squared;
use super::triangle_intersection::tri_tri_intersection;
use crate::config::TrimConfig;
use crate::error::MeshError;
use tracing::{debug, instrument};

/// Two distinct meshes of a slice, borrowed mutably at once
pub fn pair_mut(meshes: &mut [TMesh], i: usize, j: usize) -> Result<(&mut TMesh, &mut TMesh), MeshError> {
    let len = meshes.len();
    for index in [i, j] {
        if index >= len {
            return Err(MeshError::BadMeshIndex { index, len });
        }
    }
    if i == j {
        return Err(MeshError::BadMeshIndex { index: j, len });
    }

    if i < j {
        let (lo, hi) = meshes.split_at_mut(j);
        Ok((&mut lo[i], &mut hi[0]))
    } else {
        let (lo, hi) = meshes.split_at_mut(i);
        Ok((&mut hi[0], &mut lo[j]))
    }
}

/// Intersect `a` with `b`. Both octrees must be loaded. Every segment
/// longer than `min_segment_len` is pushed onto both triangles; returns the
/// number of segments recorded.
#[instrument(skip_all, fields(a = %a.info.name, b = %b.info.name))]
pub fn intersect_meshes(a: &mut TMesh, b: &mut TMesh, cfg: &TrimConfig) -> Result<usize, MeshError> {
    let tree_a = a.tree().ok_or_else(|| MeshError::MissingOctree(a.info.name.clone()))?;
    let tree_b = b.tree().ok_or_else(|| MeshError::MissingOctree(b.info.name.clone()))?;

    let mut hits: Vec<(TriId, TriId, IsectEdge)> = Vec::new();
    tree_a.intersect(tree_b, |ta, tb| {
        let pa = a.tri_points(ta);
        let pb = b.tri_points(tb);
        if let Some((p0, p1)) = tri_tri_intersection(&pa, &pb).segment() {
            if (p1 - p0).norm() > cfg.min_segment_len {
                hits.push((ta, tb, IsectEdge::new(p0, p1)));
            }
        }
    });

    for &(ta, tb, seg) in &hits {
        a.tri_mut(ta).isect_edges.push(seg);
        b.tri_mut(tb).isect_edges.push(seg);
    }

    debug!(segments = hits.len(), "meshes intersected");
    Ok(hits.len())
}

/// Intersect a mesh with itself, skipping identical triangles and triangles
/// that share a corner position
#[instrument(skip_all, fields(mesh = %mesh.info.name))]
pub fn intersect_self(mesh: &mut TMesh, cfg: &TrimConfig) -> Result<usize, MeshError> {
    let tree = mesh
        .tree()
        .ok_or_else(|| MeshError::MissingOctree(mesh.info.name.clone()))?;

    let mut hits: Vec<(TriId, TriId, IsectEdge)> = Vec::new();
    tree.intersect(tree, |ta, tb| {
        if ta >= tb {
            return;
        }
        let pa = mesh.tri_points(ta);
        let pb = mesh.tri_points(tb);
        let touching = pa
            .iter()
            .any(|p| pb.iter().any(|q| dist_squared(p, q) <= cfg.merge_tol));
        if touching {
            return;
        }
        if let Some((p0, p1)) = tri_tri_intersection(&pa, &pb).segment() {
            if (p1 - p0).norm() > cfg.min_segment_len {
                hits.push((ta, tb, IsectEdge::new(p0, p1)));
            }
        }
    });

    for &(ta, tb, seg) in &hits {
        mesh.tri_mut(ta).isect_edges.push(seg);
        mesh.tri_mut(tb).isect_edges.push(seg);
    }

    debug!(segments = hits.len(), "self intersections");
    Ok(hits.len())
}

/// Intersect every pair `(i, j > i)` of `meshes`; trees must be loaded
pub fn intersect_all(meshes: &mut [TMesh], cfg: &TrimConfig) -> Result<usize, MeshError> {
    let mut total = 0;
    for i in 0..meshes.len() {
        for j in (i + 1)..meshes.len() {
            let (a, b) = pair_mut(meshes, i, j)?;
            total += intersect_meshes(a, b, cfg)?;
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives::Primitive;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn test_missing_tree_is_an_error() {
        let cfg = TrimConfig::default();
        let mut a = Primitive::cube(Point3::origin(), Vector3::repeat(1.0)).to_mesh("a", 1);
        let mut b = a.clone();
        assert!(matches!(
            intersect_meshes(&mut a, &mut b, &cfg),
            Err(MeshError::MissingOctree(_))
        ));
    }

    #[test]
    fn test_disjoint_meshes_record_nothing() {
        let cfg = TrimConfig::default();
        let mut a = Primitive::cube(Point3::origin(), Vector3::repeat(1.0)).to_mesh("a", 1);
        let mut b = Primitive::cube(Point3::new(5.0, 0.0, 0.0), Vector3::repeat(1.0)).to_mesh("b", 2);
        a.load_bnd_box(cfg.tri_leaf_size);
        b.load_bnd_box(cfg.tri_leaf_size);
        assert_eq!(intersect_meshes(&mut a, &mut b, &cfg).unwrap(), 0);
    }

    #[test]
    fn test_segments_are_recorded_on_both_meshes() {
        let cfg = TrimConfig::default();
        let mut a = Primitive::cube(Point3::origin(), Vector3::repeat(1.0)).to_mesh("a", 1);
        let mut b = Primitive::cube(Point3::new(0.5, 0.3, 0.2), Vector3::repeat(1.0)).to_mesh("b", 2);
        a.load_bnd_box(cfg.tri_leaf_size);
        b.load_bnd_box(cfg.tri_leaf_size);

        let count = intersect_meshes(&mut a, &mut b, &cfg).unwrap();
        assert!(count > 0);
        let on_a: usize = a.tris.iter().map(|t| t.isect_edges.len()).sum();
        let on_b: usize = b.tris.iter().map(|t| t.isect_edges.len()).sum();
        assert_eq!(on_a, count);
        assert_eq!(on_b, count);
    }

    #[test]
    fn test_pair_mut_rejects_same_index() {
        let mut meshes = vec![TMesh::named("a"), TMesh::named("b")];
        assert!(pair_mut(&mut meshes, 1, 1).is_err());
        assert!(pair_mut(&mut meshes, 0, 2).is_err());
        let (b, a) = pair_mut(&mut meshes, 1, 0).unwrap();
        assert_eq!(b.info.name, "b");
        assert_eq!(a.info.name, "a");
    }
}
