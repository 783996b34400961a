// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh quality passes: needle collapse, long-edge swaps and statistics

use super::mesh::{NodeId, TMesh, TriId};
use super::robust_predicates::{angles_deg, dist_squared};
use crate::config::TrimConfig;
use crate::error::MeshError;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::{debug, info, instrument, warn};

/// Extreme edge length and corner angles over a mesh
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityStats {
    pub min_edge_len: f64,
    /// Degrees
    pub min_angle: f64,
    /// Degrees
    pub max_angle: f64,
}

impl Default for QualityStats {
    fn default() -> Self {
        Self {
            min_edge_len: 1.0e6,
            min_angle: 1.0e6,
            max_angle: -1.0e6,
        }
    }
}

impl QualityStats {
    fn write_to(&self, out: &mut impl Write) -> std::io::Result<()> {
        writeln!(out, "  Min Edge Length = {:.6}", self.min_edge_len)?;
        writeln!(out, "  Min Angle = {:.6}", self.min_angle)?;
        writeln!(out, "  Max Angle = {:.6}", self.max_angle)
    }
}

/// Outcome of [`TMesh::water_tight_check`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterTightReport {
    pub before: QualityStats,
    pub after: QualityStats,
    pub invalid: usize,
}

impl WaterTightReport {
    pub fn is_water_tight(&self) -> bool {
        self.invalid == 0
    }
}

impl TMesh {
    /// Collapse (or flag) needle triangles that touch an intersection node.
    /// Returns the number of triangles acted on.
    pub fn tag_needles(&mut self, min_angle: f64, min_aspect: f64, collapse: bool) -> usize {
        let mut tagged = 0;
        for t in 0..self.tris.len() {
            let n = self.tris[t].n;
            if !n.iter().any(|id| self.nodes[id.0].isect) {
                continue;
            }

            let p = n.map(|id| self.nodes[id.0].pnt);
            let d01 = dist_squared(&p[0], &p[1]).sqrt();
            let d12 = dist_squared(&p[1], &p[2]).sqrt();
            let d20 = dist_squared(&p[2], &p[0]).sqrt();
            let [a0, a1, a2] = angles_deg(&p[0], &p[1], &p[2]);

            let pair = if a0 < min_angle && d12 / (d20 + d01) < min_aspect {
                Some((n[1], n[2]))
            } else if a1 < min_angle && d20 / (d01 + d12) < min_aspect {
                Some((n[2], n[0]))
            } else if a2 < min_angle && d01 / (d12 + d20) < min_aspect {
                Some((n[0], n[1]))
            } else {
                None
            };

            if let Some((a, b)) = pair {
                tagged += 1;
                if collapse {
                    self.move_node(a, b);
                } else {
                    self.tris[t].invalid = true;
                }
            }
        }
        if tagged > 0 {
            self.invalidate_tree();
        }
        tagged
    }

    /// Bring `a` and `b` together: an intersection node stays put and the
    /// other snaps onto it, otherwise both move to the midpoint
    pub fn move_node(&mut self, a: NodeId, b: NodeId) {
        let fa = self.nodes[a.0].isect;
        let fb = self.nodes[b.0].isect;
        let pa = self.nodes[a.0].pnt;
        let pb = self.nodes[b.0].pnt;

        match (fa, fb) {
            (true, false) => self.nodes[b.0].pnt = pa,
            (false, true) => self.nodes[a.0].pnt = pb,
            _ => {
                let mid = Point3::from((pa.coords + pb.coords) * 0.5);
                self.nodes[a.0].pnt = mid;
                self.nodes[b.0].pnt = mid;
            }
        }
    }

    /// Flip the edge opposite every corner angle above `max_angle`.
    /// Returns the number of flips.
    pub fn swap_edges(&mut self, max_angle: f64) -> usize {
        self.rebuild_node_tris();
        let mut flipped = vec![false; self.tris.len()];
        let mut swaps = 0;

        for t in 0..self.tris.len() {
            if flipped[t] {
                continue;
            }
            let n = self.tris[t].n;
            let p = n.map(|id| self.nodes[id.0].pnt);
            let [a0, a1, a2] = angles_deg(&p[0], &p[1], &p[2]);

            let (e0, e1) = if a0 > max_angle {
                (n[1], n[2])
            } else if a1 > max_angle {
                (n[0], n[2])
            } else if a2 > max_angle {
                (n[0], n[1])
            } else {
                continue;
            };

            let other = self.nodes[e0.0]
                .tris
                .iter()
                .copied()
                .find(|&o| o.0 != t && !flipped[o.0] && self.tri(o).has_node(e1));
            if let Some(o) = other {
                if self.flip_diagonal(TriId(t), o, e0, e1) {
                    flipped[t] = true;
                    flipped[o.0] = true;
                    swaps += 1;
                }
            }
        }

        if swaps > 0 {
            self.edges.clear();
            for tri in &mut self.tris {
                tri.e = [None; 3];
            }
            self.invalidate_tree();
            self.rebuild_node_tris();
        }
        swaps
    }

    /// Replace the diagonal `(e0, e1)` shared by `t0` and `t1` with the one
    /// joining their opposite corners. Winding of both triangles is kept.
    fn flip_diagonal(&mut self, t0: TriId, t1: TriId, e0: NodeId, e1: NodeId) -> bool {
        // Rotate t0 so that it reads (a, b, c) with a->b the shared edge
        let n0 = self.tri(t0).n;
        let Some(k) = (0..3).find(|&k| {
            let (x, y) = (n0[k], n0[(k + 1) % 3]);
            (x == e0 && y == e1) || (x == e1 && y == e0)
        }) else {
            return false;
        };
        let (a, b, c) = (n0[k], n0[(k + 1) % 3], n0[(k + 2) % 3]);

        // A consistently wound neighbour traverses the edge as b->a
        let n1 = self.tri(t1).n;
        let Some(j) = (0..3).find(|&j| n1[j] == b && n1[(j + 1) % 3] == a) else {
            return false;
        };
        let d = n1[(j + 2) % 3];
        if d == c {
            return false;
        }

        self.tri_mut(t0).n = [c, a, d];
        self.tri_mut(t1).n = [d, b, c];

        for (node, from, to) in [(b, t0, None), (d, t1, Some(t0)), (a, t1, None), (c, t0, Some(t1))] {
            let list = &mut self.nodes[node.0].tris;
            match to {
                Some(to) => {
                    if !list.contains(&to) {
                        list.push(to);
                    }
                }
                None => list.retain(|&x| x != from),
            }
        }
        true
    }

    /// Shortest edge and extreme corner angles
    pub fn mesh_stats(&self) -> QualityStats {
        let mut min_len_sq: f64 = 1.0e6;
        let mut stats = QualityStats::default();
        for id in self.tri_ids() {
            let [p0, p1, p2] = self.tri_points(id);
            min_len_sq = min_len_sq
                .min(dist_squared(&p0, &p1))
                .min(dist_squared(&p1, &p2))
                .min(dist_squared(&p2, &p0));
            for a in angles_deg(&p0, &p1, &p2) {
                if a < stats.min_angle {
                    stats.min_angle = a;
                }
                if a > stats.max_angle {
                    stats.max_angle = a;
                }
            }
        }
        stats.min_edge_len = min_len_sq.sqrt();
        stats
    }

    /// Merge, clean up needles and long edges, then report whether every
    /// triangle has three neighbours. Progress text goes to `out`.
    #[instrument(skip_all, fields(mesh = %self.info.name))]
    pub fn water_tight_check(&mut self, cfg: &TrimConfig, out: &mut impl Write) -> Result<WaterTightReport, MeshError> {
        writeln!(out, "\n...WaterTight Check...")?;
        self.match_nodes(cfg);
        self.check_valid();

        let before = self.mesh_stats();
        writeln!(out, "  Before Edge Swap and Needle Removal")?;
        before.write_to(out)?;

        for round in 0..cfg.quality_iterations {
            let needles = self.tag_needles(cfg.needle_min_angle, cfg.needle_min_aspect, true);
            self.match_nodes(cfg);
            let swaps = self.swap_edges(cfg.swap_max_angle);
            let more = self.tag_needles(cfg.needle_min_angle, cfg.needle_min_aspect, true);
            self.match_nodes(cfg);
            debug!(round, needles = needles + more, swaps, "quality round");
        }

        let after = self.mesh_stats();
        writeln!(out, "  After Edge Swap and Needle Removal")?;
        after.write_to(out)?;

        let invalid = self.check_valid();
        if invalid == 0 {
            writeln!(out, "Mesh IS WaterTight")?;
            info!("mesh is watertight");
        } else {
            writeln!(out, "There are {} Invalid Triangles", invalid)?;
            warn!(invalid, "mesh is not watertight");
        }

        Ok(WaterTightReport { before, after, invalid })
    }
}
