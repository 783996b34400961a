// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Kernel API: component-geometry trimming and sliced mass properties
//!
//! A [`Kernel`] owns the meshes of one model. [`Kernel::intersect_trim`]
//! produces the wetted surface with per-component areas and volumes;
//! [`Kernel::mass_slice_x`] integrates mass properties over X slices and
//! [`Kernel::area_slice`] reports cross-section areas along any axis.

use crate::config::TrimConfig;
use crate::error::MeshError;
use crate::geometry::{
    deter_int_ext_all, intersect_all, intersect_meshes, mass_deter_int_ext, merge_non_closed, prism_tetras, split_mesh,
    BoundingBox, ConstrainedDelaunay, DragFactors, MassProperties, MeshInfo, SplitStats, TMesh, TetraMassProp,
    TriShellMassProp, Triangulator, WaterTightReport,
};
use nalgebra::{Matrix4, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Redistribution rounds used to spread the trimmed volume over components
const WET_VOL_ROUNDS: usize = 20;

/// Area slices start and end this far outside the model
const SLICE_PAD: f64 = 1.0e-4;

/// What the open-mesh pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenMeshInfo {
    pub merged: usize,
    pub deleted: usize,
    pub degenerate_removed: usize,
}

/// Areas and volumes of one component (all meshes sharing a comp id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompResult {
    pub name: String,
    pub comp_id: i32,
    pub theo_area: f64,
    pub wet_area: f64,
    pub theo_vol: f64,
    pub wet_vol: f64,
    pub guess_vol: f64,
    pub drag: DragFactors,
}

/// Output of [`Kernel::intersect_trim`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompGeomResult {
    pub num_comps: usize,
    pub num_meshes: usize,
    pub num_tris: usize,
    pub segments: usize,
    pub split: SplitStats,
    pub components: Vec<CompResult>,
    pub total_theo_area: f64,
    pub total_wet_area: f64,
    pub total_theo_vol: f64,
    pub total_wet_vol: f64,
    pub open: OpenMeshInfo,
    pub watertight: Option<WaterTightReport>,
    /// Text written by the watertight check
    #[serde(default)]
    pub watertight_log: String,
}

/// Mass properties of one component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompMass {
    pub name: String,
    pub comp_id: i32,
    pub props: MassProperties,
}

/// Output of [`Kernel::mass_slice_x`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MassReport {
    pub num_comps: usize,
    pub num_meshes: usize,
    pub num_tris: usize,
    pub num_slices: usize,
    pub slice_width: f64,
    pub open: OpenMeshInfo,
    pub total: MassProperties,
    pub components: Vec<CompMass>,
}

/// Cross-section area at one slice location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaSlice {
    /// Position along the slice axis
    pub loc: f64,
    pub area: f64,
    /// Center of area, in model coordinates
    pub area_center: Point3<f64>,
}

/// Output of [`Kernel::area_slice`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaSliceReport {
    pub num_comps: usize,
    pub num_meshes: usize,
    pub num_tris: usize,
    /// Unit slice axis
    pub axis: Vector3<f64>,
    pub open: OpenMeshInfo,
    pub slices: Vec<AreaSlice>,
}

/// Owns the meshes of a model and drives the trimming passes
pub struct Kernel {
    pub meshes: Vec<TMesh>,
    /// Slice meshes left by the last [`Kernel::mass_slice_x`] or
    /// [`Kernel::area_slice`]
    pub slices: Vec<TMesh>,
    pub point_masses: Vec<TetraMassProp>,
    config: TrimConfig,
    triangulator: Box<dyn Triangulator>,
}

impl Kernel {
    /// Create a kernel with the default constrained Delaunay triangulator
    pub fn new(config: TrimConfig) -> Self {
        Self::with_triangulator(config, Box::new(ConstrainedDelaunay::default()))
    }

    pub fn with_triangulator(config: TrimConfig, triangulator: Box<dyn Triangulator>) -> Self {
        Self {
            meshes: Vec::new(),
            slices: Vec::new(),
            point_masses: Vec::new(),
            config,
            triangulator,
        }
    }

    pub fn config(&self) -> &TrimConfig {
        &self.config
    }

    pub fn add_mesh(&mut self, mesh: TMesh) {
        self.meshes.push(mesh);
    }

    /// Concentrated mass included by [`Self::mass_slice_x`]
    pub fn add_point_mass(&mut self, comp_id: i32, mass: f64, pos: Point3<f64>) {
        self.point_masses.push(TetraMassProp::point(comp_id, mass, pos));
    }

    fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        for mesh in &self.meshes {
            bbox.union(&mesh.bounding_box());
        }
        bbox
    }

    fn comp_ids(&self) -> Vec<i32> {
        let mut ids = Vec::new();
        for mesh in self.meshes.iter().filter(|m| !m.half_box) {
            if !ids.contains(&mesh.info.comp_id) {
                ids.push(mesh.info.comp_id);
            }
        }
        ids
    }

    fn num_tris(&self) -> usize {
        self.meshes
            .iter()
            .filter(|m| !m.half_box)
            .map(|m| m.num_tris())
            .sum()
    }

    /// Close every mesh, stitch pairs of open meshes that fit together and
    /// drop the ones that stay open; then remove degenerate triangles
    #[instrument(skip_all)]
    pub fn merge_remove_open_meshes(&mut self) -> OpenMeshInfo {
        let cfg = &self.config;
        let mut info = OpenMeshInfo::default();

        for mesh in &mut self.meshes {
            mesh.check_if_closed(cfg);
        }

        for i in 0..self.meshes.len() {
            let (head, tail) = self.meshes.split_at_mut(i + 1);
            let a = &mut head[i];
            for b in tail.iter_mut() {
                merge_non_closed(a, b, cfg);
            }
        }
        info.merged = self.meshes.iter().filter(|m| m.delete_me).count();

        for mesh in &mut self.meshes {
            if !mesh.non_closed.is_empty() {
                if !mesh.delete_me {
                    warn!(mesh = %mesh.info.name, open = mesh.non_closed.len(), "removing open mesh");
                    info.deleted += 1;
                }
                mesh.delete_me = true;
            }
        }
        self.meshes.retain(|m| !m.delete_me);

        for mesh in &mut self.meshes {
            info.degenerate_removed += mesh.remove_degenerate(cfg);
        }

        debug!(?info, "open meshes handled");
        info
    }

    /// Append a closed box covering `y <= 0`, twice the model's extent, used
    /// to trim away the mirrored half of a symmetric model
    pub fn add_half_box(&mut self) {
        let mut bbox = self.bounding_box();
        if bbox.is_empty() {
            return;
        }
        bbox.scale(Vector3::repeat(2.0));

        let (x0, x1) = (bbox.min.x, bbox.max.x);
        let (z0, z1) = (bbox.min.z, bbox.max.z);
        let y0 = bbox.min.y.min(-bbox.size().y);

        let a = Point3::new(x0, 0.0, z0);
        let b = Point3::new(x1, 0.0, z0);
        let c = Point3::new(x0, 0.0, z1);
        let d = Point3::new(x1, 0.0, z1);
        let e = Point3::new(x0, y0, z0);
        let f = Point3::new(x1, y0, z0);
        let g = Point3::new(x0, y0, z1);
        let h = Point3::new(x1, y0, z1);

        let mut mesh = TMesh::new(MeshInfo::named("half_box", -1));
        mesh.half_box = true;
        let faces = [
            (g, e, h, -Vector3::y()),
            (h, e, f, -Vector3::y()),
            (b, a, d, Vector3::y()),
            (d, a, c, Vector3::y()),
            (c, a, e, -Vector3::x()),
            (g, c, e, -Vector3::x()),
            (f, b, d, Vector3::x()),
            (f, d, h, Vector3::x()),
            (d, c, g, Vector3::z()),
            (h, d, g, Vector3::z()),
            (e, a, b, -Vector3::z()),
            (e, b, f, -Vector3::z()),
        ];
        for (p0, p1, p2, n) in faces {
            mesh.add_tri(p0, p1, p2, n);
        }
        self.meshes.push(mesh);
    }

    fn rescale(&mut self, factor: f64) {
        for mesh in &mut self.meshes {
            mesh.scale(factor);
        }
    }

    fn load_trees(&mut self) {
        let leaf = self.config.tri_leaf_size;
        for mesh in &mut self.meshes {
            mesh.load_bnd_box(leaf);
        }
    }

    /// Intersect, split and classify every mesh, then integrate areas and
    /// volumes per component. With `half` the half box (see
    /// [`Self::add_half_box`]) is used for trimming and dropped afterwards.
    /// With `water_tight` (and not `half`) the exterior surface is merged
    /// into a single mesh and checked for closure.
    #[instrument(skip_all)]
    pub fn intersect_trim(&mut self, water_tight: bool, half: bool) -> Result<CompGeomResult, MeshError> {
        let open = self.merge_remove_open_meshes();

        let comp_ids = self.comp_ids();
        let num_meshes = self.meshes.len();
        let num_tris = self.num_tris();
        info!(comps = comp_ids.len(), meshes = num_meshes, tris = num_tris, "comp geom");

        let largest = self.bounding_box().largest_dim();
        let factor = if self.config.scale_to > 0.0 && largest > 0.0 && largest.is_finite() {
            self.config.scale_to / largest
        } else {
            1.0
        };
        self.rescale(factor);
        self.load_trees();

        let segments = intersect_all(&mut self.meshes, &self.config)?;

        let mut split = SplitStats::default();
        for mesh in &mut self.meshes {
            split += split_mesh(mesh, &self.config, self.triangulator.as_ref());
        }
        if split.unresolved > 0 {
            warn!(unresolved = split.unresolved, "crossing resolution hit its cap");
        }

        deter_int_ext_all(&mut self.meshes, &self.config)?;

        if half {
            self.meshes.retain(|m| !m.half_box);
        }
        self.rescale(1.0 / factor);

        let mut total_theo_area = 0.0;
        let mut total_wet_area = 0.0;
        let mut total_theo_vol = 0.0;
        let mut total_wet_vol = 0.0;
        for mesh in self.meshes.iter_mut().filter(|m| !m.half_box) {
            total_theo_area += mesh.compute_theo_area();
            total_wet_area += mesh.compute_wet_area();
            total_theo_vol += mesh.compute_theo_vol();
            let wet_vol = mesh.compute_trim_vol();
            mesh.stats.wet_vol = wet_vol;
            total_wet_vol += wet_vol;
        }

        let mut components = self.component_sums(&comp_ids);
        distribute_wet_volume(&mut components, total_wet_vol);

        let (watertight, watertight_log) = if water_tight && !half {
            let mut log = Vec::new();
            let report = self.water_tight_check(&mut log)?;
            (report, String::from_utf8_lossy(&log).into_owned())
        } else {
            (None, String::new())
        };

        info!(
            segments,
            split = split.split,
            wet_area = total_wet_area,
            wet_vol = total_wet_vol,
            "comp geom complete"
        );

        Ok(CompGeomResult {
            num_comps: comp_ids.len(),
            num_meshes,
            num_tris,
            segments,
            split,
            components,
            total_theo_area,
            total_wet_area,
            total_theo_vol,
            total_wet_vol,
            open,
            watertight,
            watertight_log,
        })
    }

    fn component_sums(&self, comp_ids: &[i32]) -> Vec<CompResult> {
        comp_ids
            .iter()
            .filter_map(|&id| {
                let group: Vec<&TMesh> = self
                    .meshes
                    .iter()
                    .filter(|m| !m.half_box && m.info.comp_id == id)
                    .collect();
                let first = group.first()?;
                let theo_area: f64 = group.iter().map(|m| m.stats.theo_area).sum();
                let wet_area: f64 = group.iter().map(|m| m.stats.wet_area).sum();
                let theo_vol: f64 = group.iter().map(|m| m.stats.theo_vol).sum();
                let guess_vol = if theo_area > 0.0 {
                    theo_vol * wet_area / theo_area
                } else {
                    0.0
                };
                Some(CompResult {
                    name: first.info.name.clone(),
                    comp_id: id,
                    theo_area,
                    wet_area,
                    theo_vol,
                    wet_vol: 0.0,
                    guess_vol,
                    drag: first.info.drag.clone(),
                })
            })
            .collect()
    }

    /// Merge the exterior surface of every mesh into one mesh, run the
    /// watertight check on it and keep it as the only mesh
    pub fn water_tight_check(&mut self, out: &mut impl std::io::Write) -> Result<Option<WaterTightReport>, MeshError> {
        let Some(first) = self.meshes.first() else {
            return Ok(None);
        };

        let mut one = TMesh::new(MeshInfo {
            name: String::from("watertight"),
            ..first.info.clone()
        });
        for mesh in &self.meshes {
            for tri in &mesh.tris {
                match tri.children() {
                    Some(patch) => {
                        for sub in patch.tris.iter().filter(|s| !s.interior) {
                            let [a, b, c] = patch.corner_points(sub);
                            let id = one.add_tri(a, b, c, tri.norm);
                            let nodes = one.tri(id).n;
                            for (k, node) in nodes.iter().enumerate() {
                                one.nodes[node.0].isect = patch.isect[sub.corners[k]];
                            }
                        }
                    }
                    None if !tri.interior => {
                        let [a, b, c] = tri.n.map(|n| mesh.point(n));
                        let id = one.add_tri(a, b, c, tri.norm);
                        let nodes = one.tri(id).n;
                        for (k, node) in nodes.iter().enumerate() {
                            one.nodes[node.0].isect = mesh.node(tri.n[k]).isect;
                        }
                    }
                    None => {}
                }
            }
        }

        one.load_bnd_box(self.config.tri_leaf_size);
        let report = one.water_tight_check(&self.config, out)?;
        self.meshes = vec![one];
        Ok(Some(report))
    }

    /// Slice the model with `num_slices` planes normal to X, classify each
    /// slice against the meshes and integrate the wetted slice area as
    /// prisms; shell meshes add their exterior surface. Point masses are
    /// included in every total.
    #[instrument(skip_all, fields(num_slices))]
    pub fn mass_slice_x(&mut self, num_slices: usize) -> Result<MassReport, MeshError> {
        let open = self.merge_remove_open_meshes();
        let num_slices = num_slices.max(3);

        let comp_ids = self.comp_ids();
        let num_meshes = self.meshes.len();
        let num_tris = self.num_tris();

        self.load_trees();
        let bbox = self.bounding_box();
        if bbox.is_empty() {
            return Err(MeshError::Empty(String::from("model")));
        }

        let slice_width = (bbox.max.x - bbox.min.x) / num_slices as f64;
        self.slices = (0..num_slices)
            .map(|s| slice_mesh(&bbox, bbox.min.x + (s as f64 + 0.5) * slice_width, s))
            .collect();

        self.classify_slices()?;

        let cfg = &self.config;
        intersect_all(&mut self.meshes, cfg)?;
        for mesh in &mut self.meshes {
            split_mesh(mesh, cfg, self.triangulator.as_ref());
        }
        deter_int_ext_all(&mut self.meshes, cfg)?;

        let mut shells = Vec::new();
        for mesh in self.meshes.iter().filter(|m| m.info.shell) {
            for f in mesh.exterior_triangles() {
                shells.push(TriShellMassProp::new(
                    mesh.info.comp_id,
                    mesh.info.shell_mass_area,
                    f.pnts[0],
                    f.pnts[1],
                    f.pnts[2],
                ));
            }
        }

        let mut tetras = Vec::new();
        for slice in &self.slices {
            for f in slice.exterior_triangles() {
                if let Some(tag) = f.mass_tag {
                    tetras.extend(prism_tetras(tag.comp_id, tag.density, &f.pnts, slice_width));
                }
            }
        }
        tetras.extend(self.point_masses.iter().copied());

        let total = MassProperties::accumulate(&tetras, &shells);
        let components = comp_ids
            .iter()
            .map(|&id| CompMass {
                name: self
                    .meshes
                    .iter()
                    .find(|m| m.info.comp_id == id)
                    .map(|m| m.info.name.clone())
                    .unwrap_or_default(),
                comp_id: id,
                props: MassProperties::accumulate_component(&tetras, &shells, id),
            })
            .collect();

        info!(mass = total.mass, volume = total.volume, "mass properties complete");

        Ok(MassReport {
            num_comps: comp_ids.len(),
            num_meshes,
            num_tris,
            num_slices,
            slice_width,
            open,
            total,
            components,
        })
    }

    /// Intersect every slice with the meshes, split it and keep the parts
    /// lying inside some mesh, tagged with that mesh's mass data
    fn classify_slices(&mut self) -> Result<(), MeshError> {
        let cfg = &self.config;
        let mut slices = std::mem::take(&mut self.slices);
        for slice in &mut slices {
            slice.load_bnd_box(cfg.tri_leaf_size);
            for mesh in &mut self.meshes {
                intersect_meshes(slice, mesh, cfg)?;
                for tri in &mut mesh.tris {
                    tri.isect_edges.clear();
                }
            }
            split_mesh(slice, cfg, self.triangulator.as_ref());

            // Classify the slice in place at the end of the mesh list
            self.meshes.push(std::mem::replace(slice, TMesh::named("")));
            let index = self.meshes.len() - 1;
            let tagged = mass_deter_int_ext(&mut self.meshes, index, cfg);
            if let Some(done) = self.meshes.pop() {
                *slice = done;
            }
            let tagged = tagged?;
            debug!(slice = %slice.info.name, tagged, "slice classified");
        }
        self.slices = slices;
        Ok(())
    }

    fn transform_all(&mut self, matrix: &Matrix4<f64>) {
        for mesh in self.meshes.iter_mut().chain(self.slices.iter_mut()) {
            mesh.transform(matrix);
        }
    }

    /// Cut the model with `num_slices` planes normal to `axis`, evenly spaced
    /// from just before the model to just past it, and report the area
    /// enclosed by the meshes at each plane. The meshes are rotated so
    /// `axis` runs along X for the cut and rotated back afterwards; the
    /// slices are left in [`Self::slices`] in model coordinates.
    #[instrument(skip_all, fields(num_slices))]
    pub fn area_slice(&mut self, num_slices: usize, axis: Vector3<f64>) -> Result<AreaSliceReport, MeshError> {
        let axis = axis.try_normalize(f64::EPSILON).ok_or(MeshError::ZeroAxis)?;
        let to_x = Rotation3::rotation_between(&axis, &Vector3::x())
            .unwrap_or_else(|| Rotation3::from_axis_angle(&Vector3::z_axis(), std::f64::consts::PI));
        let forward = to_x.to_homogeneous();
        let back = to_x.inverse().to_homogeneous();

        self.slices.clear();
        self.transform_all(&forward);
        let open = self.merge_remove_open_meshes();

        let comp_ids = self.comp_ids();
        let num_meshes = self.meshes.len();
        let num_tris = self.num_tris();

        self.load_trees();
        let bbox = self.bounding_box();
        if bbox.is_empty() {
            self.transform_all(&back);
            return Err(MeshError::Empty(String::from("model")));
        }

        let start = bbox.min.x - SLICE_PAD;
        let end = bbox.max.x + SLICE_PAD;
        let width = if num_slices > 1 {
            (end - start) / (num_slices - 1) as f64
        } else {
            0.0
        };
        let locs: Vec<f64> = (0..num_slices).map(|s| start + s as f64 * width).collect();
        self.slices = locs.iter().enumerate().map(|(s, &x)| slice_mesh(&bbox, x, s)).collect();

        let classified = self.classify_slices();
        if let Err(err) = classified {
            self.transform_all(&back);
            return Err(err);
        }

        let slices = locs
            .iter()
            .zip(&self.slices)
            .map(|(&loc, slice)| {
                let (area, center) = area_and_center(slice);
                AreaSlice {
                    loc,
                    area,
                    area_center: back.transform_point(&center),
                }
            })
            .collect();

        self.transform_all(&back);
        info!(slices = num_slices, "area slicing complete");

        Ok(AreaSliceReport {
            num_comps: comp_ids.len(),
            num_meshes,
            num_tris,
            axis,
            open,
            slices,
        })
    }
}

/// Spread `total_wet_vol` over components in proportion to their guessed
/// volumes, never exceeding a component's theoretical volume
fn distribute_wet_volume(components: &mut [CompResult], total_wet_vol: f64) {
    let guess_total: f64 = components.iter().map(|c| c.guess_vol).sum();
    if guess_total == 0.0 {
        return;
    }

    let mut left_over = total_wet_vol;
    for _ in 0..WET_VOL_ROUNDS {
        let mut sum = 0.0;
        for comp in components.iter_mut() {
            comp.wet_vol += comp.guess_vol / guess_total * left_over;
            if comp.wet_vol > comp.theo_vol {
                comp.wet_vol = comp.theo_vol;
            }
            sum += comp.wet_vol;
        }

        left_over = if sum < total_wet_vol { total_wet_vol - sum } else { 0.0 };
        if left_over < 1.0e-5 {
            break;
        }
    }
}

/// Exterior area of a classified slice and its center of area (the slice
/// plane point nearest the origin when nothing is kept)
fn area_and_center(slice: &TMesh) -> (f64, Point3<f64>) {
    let mut area = 0.0;
    let mut moment = Vector3::zeros();
    for f in slice.exterior_triangles() {
        let [a, b, c] = f.pnts;
        let da = (b - a).cross(&(c - a)).norm() * 0.5;
        area += da;
        moment += (a.coords + b.coords + c.coords) * (da / 3.0);
    }
    if area > 0.0 {
        (area, Point3::from(moment / area))
    } else {
        let x = slice.nodes.first().map_or(0.0, |n| n.pnt.x);
        (0.0, Point3::new(x, 0.0, 0.0))
    }
}

/// A 10 x 10 grid of triangle pairs in the plane `x`, slightly larger than
/// the model in Y and Z
fn slice_mesh(bbox: &BoundingBox, x: f64, index: usize) -> TMesh {
    let ydel = 1.02 * (bbox.max.y - bbox.min.y);
    let ys = bbox.min.y - 0.01 * ydel;
    let zdel = 1.02 * (bbox.max.z - bbox.min.z);
    let zs = bbox.min.z - 0.01 * zdel;

    let mut mesh = TMesh::new(MeshInfo::named(format!("slice_{index}"), -1));
    for i in 0..10 {
        let y0 = ys + ydel * 0.1 * i as f64;
        let y1 = ys + ydel * 0.1 * (i + 1) as f64;
        for j in 0..10 {
            let z0 = zs + zdel * 0.1 * j as f64;
            let z1 = zs + zdel * 0.1 * (j + 1) as f64;
            mesh.add_tri(
                Point3::new(x, y0, z0),
                Point3::new(x, y1, z0),
                Point3::new(x, y1, z1),
                Vector3::x(),
            );
            mesh.add_tri(
                Point3::new(x, y0, z0),
                Point3::new(x, y1, z1),
                Point3::new(x, y0, z1),
                Vector3::x(),
            );
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use approx::assert_relative_eq;

    fn comp(theo_vol: f64, guess_vol: f64) -> CompResult {
        CompResult {
            name: String::from("c"),
            comp_id: 0,
            theo_area: 1.0,
            wet_area: 1.0,
            theo_vol,
            wet_vol: 0.0,
            guess_vol,
            drag: DragFactors::default(),
        }
    }

    #[test]
    fn test_wet_volume_respects_theo_cap() {
        let mut comps = vec![comp(1.0, 3.0), comp(10.0, 1.0)];
        distribute_wet_volume(&mut comps, 6.0);
        assert_relative_eq!(comps[0].wet_vol, 1.0, epsilon = 1e-12);
        let sum = comps[0].wet_vol + comps[1].wet_vol;
        assert!(sum <= 6.0 && sum > 5.95, "distributed {sum}");
    }

    #[test]
    fn test_disjoint_boxes_keep_full_area() {
        let mut kernel = Kernel::new(TrimConfig::default());
        kernel.add_mesh(Primitive::cube(Point3::origin(), Vector3::repeat(1.0)).to_mesh("a", 1));
        kernel.add_mesh(Primitive::cube(Point3::new(3.0, 0.0, 0.0), Vector3::repeat(1.0)).to_mesh("b", 2));

        let result = kernel.intersect_trim(false, false).unwrap();
        assert_eq!(result.num_comps, 2);
        assert_eq!(result.segments, 0);
        assert_relative_eq!(result.total_theo_area, 12.0, epsilon = 1e-9);
        assert_relative_eq!(result.total_wet_area, 12.0, epsilon = 1e-9);
        assert_relative_eq!(result.total_wet_vol, 2.0, epsilon = 1e-9);
        assert_relative_eq!(result.components[0].wet_vol, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_nested_box_is_fully_trimmed() {
        let mut kernel = Kernel::new(TrimConfig::default());
        kernel.add_mesh(Primitive::cube(Point3::origin(), Vector3::repeat(4.0)).to_mesh("outer", 1));
        kernel.add_mesh(Primitive::cube(Point3::new(0.1, 0.2, 0.3), Vector3::repeat(1.0)).to_mesh("inner", 2));

        let result = kernel.intersect_trim(false, false).unwrap();
        assert_relative_eq!(result.components[1].wet_area, 0.0, epsilon = 1e-12);
        assert_relative_eq!(result.total_wet_area, 96.0, epsilon = 1e-9);
        assert_relative_eq!(result.total_wet_vol, 64.0, epsilon = 1e-9);
    }

    #[test]
    fn test_open_mesh_is_removed() {
        let mut kernel = Kernel::new(TrimConfig::default());
        kernel.add_mesh(Primitive::cube(Point3::origin(), Vector3::repeat(1.0)).to_mesh("box", 1));
        kernel.add_mesh(Primitive::hemisphere(Point3::new(5.0, 0.0, 0.0), 1.0, 4, 8, true).to_mesh("cap", 2));

        let info = kernel.merge_remove_open_meshes();
        assert_eq!(info.deleted, 1);
        assert_eq!(kernel.meshes.len(), 1);
        assert_eq!(kernel.meshes[0].info.name, "box");
    }

    #[test]
    fn test_sliced_box_mass() {
        let mut kernel = Kernel::new(TrimConfig::default());
        kernel.add_mesh(Primitive::cube(Point3::origin(), Vector3::repeat(2.0)).to_mesh("box", 1));
        kernel.add_point_mass(1, 2.0, Point3::new(3.0, 0.0, 0.0));

        let report = kernel.mass_slice_x(1).unwrap();
        assert_eq!(report.num_slices, 3);
        assert_relative_eq!(report.slice_width, 2.0 / 3.0, epsilon = 1e-12);
        assert_eq!(kernel.slices.len(), 3);

        assert_relative_eq!(report.total.mass, 10.0, epsilon = 1e-6);
        assert_relative_eq!(report.total.volume, 8.0, epsilon = 1e-6);
        assert_relative_eq!(report.total.cg.x, 0.6, epsilon = 1e-6);
        assert_relative_eq!(report.total.cg.y, 0.0, epsilon = 1e-6);
        assert_eq!(report.components.len(), 1);
        assert_relative_eq!(report.components[0].props.mass, 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_box_has_constant_section() {
        let mut kernel = Kernel::new(TrimConfig::default());
        kernel.add_mesh(Primitive::cube(Point3::origin(), Vector3::new(4.0, 2.0, 3.0)).to_mesh("box", 1));

        let report = kernel.area_slice(6, Vector3::x()).unwrap();
        assert_eq!(report.slices.len(), 6);
        assert_eq!(kernel.slices.len(), 6);
        assert_relative_eq!(report.slices[0].loc, -2.0001, epsilon = 1e-12);
        assert_relative_eq!(report.slices[5].loc, 2.0001, epsilon = 1e-12);

        // The end planes sit just outside the box
        assert_relative_eq!(report.slices[0].area, 0.0, epsilon = 1e-12);
        assert_relative_eq!(report.slices[5].area, 0.0, epsilon = 1e-12);
        for slice in &report.slices[1..5] {
            assert_relative_eq!(slice.area, 6.0, epsilon = 1e-6);
            assert_relative_eq!(slice.area_center, Point3::new(slice.loc, 0.0, 0.0), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_slicing_along_y_restores_the_model() {
        let mut kernel = Kernel::new(TrimConfig::default());
        kernel.add_mesh(Primitive::cube(Point3::origin(), Vector3::new(4.0, 2.0, 3.0)).to_mesh("box", 1));
        let before = kernel.bounding_box();

        let report = kernel.area_slice(5, Vector3::new(0.0, 2.0, 0.0)).unwrap();
        assert_relative_eq!(report.axis, Vector3::y(), epsilon = 1e-12);
        for slice in &report.slices[1..4] {
            assert_relative_eq!(slice.area, 12.0, epsilon = 1e-6);
            assert_relative_eq!(slice.area_center, Point3::new(0.0, slice.loc, 0.0), epsilon = 1e-6);
        }

        assert!(kernel.bounding_box().approx_eq(&before, 1e-9));
        for slice in &kernel.slices {
            let bbox = slice.bounding_box();
            assert_relative_eq!(bbox.max.y - bbox.min.y, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_sphere_section_follows_circle() {
        let mut kernel = Kernel::new(TrimConfig::default());
        kernel.add_mesh(Primitive::sphere(Point3::origin(), 1.0, 16, 30).to_mesh("ball", 1));

        let report = kernel.area_slice(4, Vector3::x()).unwrap();
        for slice in &report.slices[1..3] {
            let exact = std::f64::consts::PI * (1.0 - slice.loc * slice.loc);
            assert!(slice.area < exact);
            assert_relative_eq!(slice.area, exact, max_relative = 0.05);
        }
        assert_relative_eq!(report.slices[1].area, report.slices[2].area, max_relative = 0.01);
    }

    #[test]
    fn test_zero_axis_is_rejected() {
        let mut kernel = Kernel::new(TrimConfig::default());
        kernel.add_mesh(Primitive::cube(Point3::origin(), Vector3::repeat(1.0)).to_mesh("box", 1));
        assert!(matches!(
            kernel.area_slice(3, Vector3::zeros()),
            Err(MeshError::ZeroAxis)
        ));
    }

    #[test]
    fn test_half_box_is_closed() {
        let mut kernel = Kernel::new(TrimConfig::default());
        kernel.add_mesh(Primitive::cube(Point3::new(0.0, 1.0, 0.0), Vector3::repeat(1.0)).to_mesh("box", 1));
        kernel.add_half_box();
        let half = kernel.meshes.last_mut().unwrap();
        assert!(half.half_box);
        assert_eq!(half.check_if_closed(&TrimConfig::default()), 0);
        for id in half.tri_ids() {
            let n = half.compute_normal(id);
            assert_relative_eq!(n, half.tri(id).norm, epsilon = 1e-12);
        }
    }
}
