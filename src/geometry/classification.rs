// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Interior/exterior classification
//!
//! Every (sub-)triangle is sampled at its centroid with a +X ray cast
//! through the other meshes; an odd crossing count means the sample lies
//! inside that mesh. Surface samples start a hair outside their own face so
//! the ray never runs along a face shared with another mesh; a face that
//! coincides with a same-facing face of another mesh is kept by the mesh
//! listed first.

use super::mesh::{MassTag, TMesh, TriId};
use crate::config::TrimConfig;
use crate::error::MeshError;
use nalgebra::{Point3, Vector3};
use tracing::{debug, instrument};

/// A triangle or one of its split children
#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    tri: TriId,
    sub: Option<usize>,
    centroid: Point3<f64>,
    norm: Vector3<f64>,
}

fn centroid(p: &[Point3<f64>; 3]) -> Point3<f64> {
    Point3::from((p[0].coords + p[1].coords + p[2].coords) / 3.0)
}

fn samples(mesh: &TMesh) -> Vec<Sample> {
    let mut out = Vec::with_capacity(mesh.num_tris());
    for id in mesh.tri_ids() {
        match mesh.tri(id).children() {
            Some(patch) => out.extend(patch.tris.iter().enumerate().map(|(k, sub)| Sample {
                tri: id,
                sub: Some(k),
                centroid: centroid(&patch.corner_points(sub)),
                norm: sub.norm,
            })),
            None => out.push(Sample {
                tri: id,
                sub: None,
                centroid: centroid(&mesh.tri_points(id)),
                norm: mesh.tri(id).norm,
            }),
        }
    }
    out
}

/// Number of distinct +X ray crossings of `mesh` starting at `p`
pub fn crossing_count(p: &Point3<f64>, mesh: &TMesh, cfg: &TrimConfig) -> Result<usize, MeshError> {
    let tree = mesh
        .tree()
        .ok_or_else(|| MeshError::MissingOctree(mesh.info.name.clone()))?;
    let mut t_parms = Vec::new();
    Ok(tree.num_cross_x_ray(mesh, p, cfg.ray_dedup_tol, &mut t_parms))
}

/// Parity test: is `p` inside the closed `mesh`?
pub fn point_inside(p: &Point3<f64>, mesh: &TMesh, cfg: &TrimConfig) -> Result<bool, MeshError> {
    Ok(crossing_count(p, mesh, cfg)? % 2 == 1)
}

/// Does `sample` sit on a triangle of `other` facing the same way? Looks
/// for triangles crossed by a segment of half-length `tol` along the sample
/// normal.
fn on_same_facing_surface(sample: &Sample, norm: &Vector3<f64>, other: &TMesh, tol: f64) -> Result<bool, MeshError> {
    let tree = other
        .tree()
        .ok_or_else(|| MeshError::MissingOctree(other.info.name.clone()))?;
    let p0 = sample.centroid - norm * tol;
    let p1 = sample.centroid + norm * tol;

    let mut found = false;
    tree.seg_tris(other, &p0, &p1, |t, _| {
        if other.tri(t).norm.dot(norm) > 0.5 {
            found = true;
        }
    });
    Ok(found)
}

/// Is the surface sample inside `other` (mesh `j`) from the point of view of
/// mesh `index`?
fn sample_inside(sample: &Sample, index: usize, j: usize, other: &TMesh, cfg: &TrimConfig) -> Result<bool, MeshError> {
    let Some(norm) = sample.norm.try_normalize(f64::EPSILON) else {
        return point_inside(&sample.centroid, other, cfg);
    };

    if on_same_facing_surface(sample, &norm, other, cfg.on_edge_tol)? {
        return Ok(j < index);
    }
    point_inside(&(sample.centroid + norm * cfg.on_edge_tol), other, cfg)
}

fn check_index(meshes: &[TMesh], index: usize) -> Result<(), MeshError> {
    if index >= meshes.len() {
        return Err(MeshError::BadMeshIndex {
            index,
            len: meshes.len(),
        });
    }
    Ok(())
}

/// Classify mesh `index` against every other mesh. Split parents are marked
/// interior so only their children count. Returns the number of interior
/// samples.
#[instrument(skip_all, fields(mesh = index))]
pub fn deter_int_ext(meshes: &mut [TMesh], index: usize, cfg: &TrimConfig) -> Result<usize, MeshError> {
    check_index(meshes, index)?;

    let mut verdicts = Vec::new();
    for sample in samples(&meshes[index]) {
        let mut interior = false;
        for (j, other) in meshes.iter().enumerate() {
            if j == index {
                continue;
            }
            if sample_inside(&sample, index, j, other, cfg)? {
                interior = true;
                break;
            }
        }
        verdicts.push((sample, interior));
    }

    let mesh = &mut meshes[index];
    let mut num_interior = 0;
    for (sample, interior) in verdicts {
        num_interior += usize::from(interior);
        let tri = mesh.tri_mut(sample.tri);
        match (sample.sub, tri.split.as_mut()) {
            (Some(k), Some(patch)) => {
                tri.interior = true;
                patch.tris[k].interior = interior;
            }
            _ => tri.interior = interior,
        }
    }

    debug!(interior = num_interior, "classified");
    Ok(num_interior)
}

/// Classify every mesh against all the others
pub fn deter_int_ext_all(meshes: &mut [TMesh], cfg: &TrimConfig) -> Result<usize, MeshError> {
    let mut total = 0;
    for i in 0..meshes.len() {
        total += deter_int_ext(meshes, i, cfg)?;
    }
    Ok(total)
}

/// Mass classification of a slice: a sample is kept (exterior) when it lies
/// inside some other mesh, and takes the mass tag of the highest-priority
/// mesh containing it. Returns the number of tagged samples.
#[instrument(skip_all, fields(mesh = index))]
pub fn mass_deter_int_ext(meshes: &mut [TMesh], index: usize, cfg: &TrimConfig) -> Result<usize, MeshError> {
    check_index(meshes, index)?;

    let mut verdicts = Vec::new();
    for sample in samples(&meshes[index]) {
        let mut interior = true;
        let mut prior = -1;
        let mut tag = None;
        for (j, other) in meshes.iter().enumerate() {
            if j == index {
                continue;
            }
            if crossing_count(&sample.centroid, other, cfg)? % 2 == 1 && other.info.mass_priority > prior {
                interior = false;
                prior = other.info.mass_priority;
                tag = Some(MassTag {
                    comp_id: other.info.comp_id,
                    density: other.info.density,
                });
            }
        }
        verdicts.push((sample, interior, tag));
    }

    let mesh = &mut meshes[index];
    let mut tagged = 0;
    for (sample, interior, tag) in verdicts {
        tagged += usize::from(tag.is_some());
        let tri = mesh.tri_mut(sample.tri);
        match (sample.sub, tri.split.as_mut()) {
            (Some(k), Some(patch)) => {
                tri.interior = true;
                patch.tris[k].interior = interior;
                patch.tris[k].mass_tag = tag;
            }
            _ => {
                tri.interior = interior;
                tri.mass_tag = tag;
            }
        }
    }

    Ok(tagged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::primitives::Primitive;
    use approx::assert_relative_eq;

    fn loaded(mut mesh: TMesh) -> TMesh {
        mesh.load_bnd_box(32);
        mesh
    }

    #[test]
    fn test_point_inside_box() {
        let cfg = TrimConfig::default();
        let cube = loaded(Primitive::cube(Point3::origin(), Vector3::repeat(2.0)).to_mesh("box", 1));
        assert!(point_inside(&Point3::new(0.1, 0.2, 0.3), &cube, &cfg).unwrap());
        assert!(!point_inside(&Point3::new(3.0, 0.2, 0.3), &cube, &cfg).unwrap());
        assert!(!point_inside(&Point3::new(-3.0, 0.2, 0.3), &cube, &cfg).unwrap());
    }

    #[test]
    fn test_nested_box_is_interior() {
        let cfg = TrimConfig::default();
        let mut meshes = vec![
            loaded(Primitive::cube(Point3::origin(), Vector3::repeat(4.0)).to_mesh("outer", 1)),
            loaded(Primitive::cube(Point3::new(0.1, 0.2, 0.3), Vector3::repeat(1.0)).to_mesh("inner", 2)),
        ];

        assert_eq!(deter_int_ext(&mut meshes, 0, &cfg).unwrap(), 0);
        assert_eq!(deter_int_ext(&mut meshes, 1, &cfg).unwrap(), 12);
        assert!(meshes[1].tris.iter().all(|t| t.interior));
        assert!(meshes[0].tris.iter().all(|t| !t.interior));
    }

    #[test]
    fn test_shared_face_is_kept_once() {
        let cfg = TrimConfig::default();
        let mut meshes = vec![
            loaded(Primitive::cube(Point3::origin(), Vector3::repeat(1.0)).to_mesh("a", 1)),
            loaded(Primitive::cube(Point3::origin(), Vector3::repeat(1.0)).to_mesh("b", 2)),
        ];

        // Identical boxes: the first keeps every face, the second none
        assert_eq!(deter_int_ext(&mut meshes, 0, &cfg).unwrap(), 0);
        assert_eq!(deter_int_ext(&mut meshes, 1, &cfg).unwrap(), 12);
    }

    #[test]
    fn test_abutting_faces_are_interior() {
        let cfg = TrimConfig::default();
        let mut meshes = vec![
            loaded(Primitive::cube(Point3::origin(), Vector3::repeat(1.0)).to_mesh("a", 1)),
            loaded(Primitive::cube(Point3::new(1.0, 0.0, 0.0), Vector3::repeat(1.0)).to_mesh("b", 2)),
        ];

        // Only the two touching faces (x = 0.5) are hidden
        assert_eq!(deter_int_ext(&mut meshes, 0, &cfg).unwrap(), 2);
        assert_eq!(deter_int_ext(&mut meshes, 1, &cfg).unwrap(), 2);
        for mesh in &meshes {
            for tri in mesh.tris.iter().filter(|t| t.interior) {
                assert_relative_eq!(tri.norm.x.abs(), 1.0);
            }
        }
    }

    #[test]
    fn test_mass_priority_picks_tag() {
        let cfg = TrimConfig::default();
        let mut low = Primitive::cube(Point3::origin(), Vector3::repeat(4.0)).to_mesh("low", 1);
        low.info.mass_priority = 0;
        low.info.density = 2.0;
        let mut high = Primitive::cube(Point3::origin(), Vector3::repeat(3.0)).to_mesh("high", 2);
        high.info.mass_priority = 5;
        high.info.density = 7.0;
        let slice = Primitive::square(Point3::new(0.05, 0.05, 0.01), 0.5).to_mesh("slice", -1);

        let mut meshes = vec![loaded(slice), loaded(low), loaded(high)];
        let tagged = mass_deter_int_ext(&mut meshes, 0, &cfg).unwrap();
        assert_eq!(tagged, 2);
        for tri in &meshes[0].tris {
            assert!(!tri.interior);
            assert_eq!(
                tri.mass_tag,
                Some(MassTag {
                    comp_id: 2,
                    density: 7.0
                })
            );
        }
    }

    #[test]
    fn test_missing_tree_is_reported() {
        let cfg = TrimConfig::default();
        let mut meshes = vec![
            Primitive::cube(Point3::origin(), Vector3::repeat(1.0)).to_mesh("a", 1),
            Primitive::cube(Point3::origin(), Vector3::repeat(2.0)).to_mesh("b", 2),
        ];
        assert!(matches!(
            deter_int_ext(&mut meshes, 0, &cfg),
            Err(MeshError::MissingOctree(_))
        ));
        assert!(matches!(
            deter_int_ext(&mut meshes, 5, &cfg),
            Err(MeshError::BadMeshIndex { index: 5, len: 2 })
        ));
    }
}
