// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Report generation (text tables, CSV, TSV and JSON)

use crate::kernel::{AreaSliceReport, CompGeomResult, MassReport, OpenMeshInfo};
use anyhow::Result;
use serde::Serialize;
use std::fs;
use std::path::Path;

const RULE: &str = "-------------------------------------------------";

/// Report writer
pub struct Reporter;

impl Reporter {
    /// Write any result as pretty JSON
    pub fn write_json<T: Serialize>(report: &T, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Component table of a trim run
    pub fn comp_geom_text(result: &CompGeomResult) -> String {
        let mut txt = String::new();

        txt.push_str("...Comp Geom...\n");
        txt.push_str(&format!("{} Num Comps\n", result.num_comps));
        txt.push_str(&format!("{} Total Num Meshes\n", result.num_meshes));
        txt.push_str(&format!("{} Total Num Tris\n", result.num_tris));

        txt.push_str("\nTheo_Area   Wet_Area   Theo_Vol    Wet_Vol  Name\n");
        for c in &result.components {
            txt.push_str(&format!(
                "{:9.3}  {:9.3}  {:9.3}  {:9.3}  {:<15}\n",
                c.theo_area, c.wet_area, c.theo_vol, c.wet_vol, c.name
            ));
        }
        txt.push_str(RULE);
        txt.push('\n');
        txt.push_str(&format!(
            "{:9.3}  {:9.3}  {:9.3}  {:9.3}  {:<15}\n",
            result.total_theo_area, result.total_wet_area, result.total_theo_vol, result.total_wet_vol, "Totals"
        ));

        txt.push_str(&result.watertight_log);
        txt.push_str(&open_mesh_warnings(&result.open));
        txt
    }

    /// Component areas and volumes as CSV
    pub fn comp_geom_csv(result: &CompGeomResult) -> String {
        let mut csv = String::from("Name, Theo_Area, Wet_Area, Theo_Vol, Wet_Vol\n");
        for c in &result.components {
            csv.push_str(&format!(
                "{},{:.6},{:.6},{:.6},{:.6}\n",
                c.name, c.theo_area, c.wet_area, c.theo_vol, c.wet_vol
            ));
        }
        csv.push_str(&format!(
            "Totals,{:.6},{:.6},{:.6},{:.6}\n",
            result.total_theo_area, result.total_wet_area, result.total_theo_vol, result.total_wet_vol
        ));
        csv
    }

    /// Drag build-up table, one tab separated row per component
    pub fn drag_tsv(result: &CompGeomResult) -> String {
        let mut tsv = String::from(
            "Name\tTheo_Area\tWet_Area\tTheo_Vol\tWet_Vol\tMin_Chord\tAve_Chord\tMax_Chord\t\
             Min_TC_Ratio\tAvg_TC_Ratio\tMax_TC_Ratio\tAve_Sweep\tLength\tMax_Xsec_Area\tLen_Dia_Ratio\n",
        );
        for c in &result.components {
            let d = &c.drag;
            tsv.push_str(&format!(
                "{}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\n",
                c.name,
                c.theo_area,
                c.wet_area,
                c.theo_vol,
                c.wet_vol,
                d.min_chord,
                d.avg_chord,
                d.max_chord,
                d.min_thick_to_chord,
                d.avg_thick_to_chord,
                d.max_thick_to_chord,
                d.avg_sweep,
                d.length,
                d.max_xsec_area,
                d.length_to_dia,
            ));
        }
        tsv
    }

    /// Mass properties summary followed by the per-component table
    pub fn mass_text(report: &MassReport) -> String {
        let mut txt = open_mesh_warnings(&report.open);

        txt.push_str("...Mass Properties...\n");
        txt.push_str(&format!("{} Num Comps\n", report.num_comps));
        txt.push_str(&format!("{} Total Num Meshes\n", report.num_meshes));
        txt.push_str(&format!("{} Total Num Tris\n", report.num_tris));
        txt.push('\n');

        let t = &report.total;
        txt.push_str(&format!("{:.6}             Total Mass\n", t.mass));
        txt.push_str(&format!("{:.6} {:.6} {:.6}       Center of Gravity\n", t.cg.x, t.cg.y, t.cg.z));
        txt.push_str(&format!(
            "{:.6} {:.6} {:.6}       Ixx, Iyy, Izz\n",
            t.inertia.ixx, t.inertia.iyy, t.inertia.izz
        ));
        txt.push_str(&format!(
            "{:.6} {:.6} {:.6}       Ixy, Ixz, Iyz\n",
            t.inertia.ixy, t.inertia.ixz, t.inertia.iyz
        ));
        txt.push_str(&format!("{:.6}             Volume\n", t.volume));

        txt.push_str("\nName\tMass\tcgX\tcgY\tcgZ\tIxx\tIyy\tIzz\tIxy\tIxz\tIyz\tVolume\n");
        for c in &report.components {
            txt.push_str(&mass_row(&c.name, &c.props));
        }
        txt.push_str(&mass_row("Totals", t));
        txt
    }

    /// Slice summary followed by one row per slice
    pub fn slice_text(report: &AreaSliceReport) -> String {
        let mut txt = open_mesh_warnings(&report.open);

        txt.push_str("...Slice...\n");
        txt.push_str(&format!("{} Num Comps\n", report.num_comps));
        txt.push_str(&format!("{} Total Num Meshes\n", report.num_meshes));
        txt.push_str(&format!("{} Total Num Tris\n", report.num_tris));
        let a = &report.axis;
        txt.push_str(&format!("{:.5} {:.5} {:.5} Axis Vector\n", a.x, a.y, a.z));

        txt.push_str("\n    Loc    XCenter  YCenter  ZCenter         Area\n");
        for s in &report.slices {
            let c = &s.area_center;
            txt.push_str(&format!("{:9.3} {:9.3} {:9.3} {:9.3} {:9.3}\n", s.loc, c.x, c.y, c.z, s.area));
        }
        txt
    }
}

fn mass_row(name: &str, p: &crate::geometry::MassProperties) -> String {
    let i = &p.inertia;
    format!(
        "{}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\n",
        name, p.mass, p.cg.x, p.cg.y, p.cg.z, i.ixx, i.iyy, i.izz, i.ixy, i.ixz, i.iyz, p.volume
    )
}

fn open_mesh_warnings(open: &OpenMeshInfo) -> String {
    let mut txt = String::new();
    if open.degenerate_removed > 0 {
        txt.push_str(&format!("WARNING: {} degenerate triangle removed\n", open.degenerate_removed));
    }
    if open.deleted > 0 {
        txt.push_str(&format!("WARNING: {} open meshes removed\n", open.deleted));
    }
    if open.merged > 0 {
        txt.push_str(&format!("WARNING: {} open meshes merged\n", open.merged));
    }
    txt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{DragFactors, MassProperties, SplitStats};
    use crate::kernel::{AreaSlice, CompMass, CompResult};
    use nalgebra::Point3;
    use tempfile::NamedTempFile;

    fn sample_result() -> CompGeomResult {
        CompGeomResult {
            num_comps: 1,
            num_meshes: 1,
            num_tris: 12,
            segments: 0,
            split: SplitStats::default(),
            components: vec![CompResult {
                name: "box".into(),
                comp_id: 1,
                theo_area: 6.0,
                wet_area: 6.0,
                theo_vol: 1.0,
                wet_vol: 1.0,
                guess_vol: 1.0,
                drag: DragFactors::default(),
            }],
            total_theo_area: 6.0,
            total_wet_area: 6.0,
            total_theo_vol: 1.0,
            total_wet_vol: 1.0,
            open: OpenMeshInfo {
                merged: 0,
                deleted: 2,
                degenerate_removed: 0,
            },
            watertight: None,
            watertight_log: String::new(),
        }
    }

    #[test]
    fn test_comp_geom_table() {
        let txt = Reporter::comp_geom_text(&sample_result());
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines[0], "...Comp Geom...");
        assert_eq!(lines[1], "1 Num Comps");
        assert_eq!(lines[5], "Theo_Area   Wet_Area   Theo_Vol    Wet_Vol  Name");
        assert_eq!(lines[6], "    6.000      6.000      1.000      1.000  box            ");
        assert_eq!(lines[7], RULE);
        assert!(lines[8].contains("Totals"));
        assert_eq!(lines[9], "WARNING: 2 open meshes removed");
    }

    #[test]
    fn test_csv_and_tsv() {
        let result = sample_result();
        let csv = Reporter::comp_geom_csv(&result);
        assert_eq!(csv.lines().nth(1), Some("box,6.000000,6.000000,1.000000,1.000000"));
        assert!(csv.ends_with("Totals,6.000000,6.000000,1.000000,1.000000\n"));

        let tsv = Reporter::drag_tsv(&result);
        let header: Vec<&str> = tsv.lines().next().unwrap_or_default().split('\t').collect();
        assert_eq!(header.len(), 15);
        assert_eq!(tsv.lines().nth(1).map(|l| l.split('\t').count()), Some(15));
    }

    #[test]
    fn test_mass_table_has_every_column() {
        let props = MassProperties {
            mass: 2.0,
            cg: Point3::new(0.5, 0.0, 0.0),
            volume: 1.0,
            ..Default::default()
        };
        let report = MassReport {
            num_comps: 1,
            num_meshes: 1,
            num_tris: 12,
            num_slices: 3,
            slice_width: 0.5,
            open: OpenMeshInfo::default(),
            total: props,
            components: vec![CompMass {
                name: "box".into(),
                comp_id: 1,
                props,
            }],
        };
        let txt = Reporter::mass_text(&report);
        assert!(txt.starts_with("...Mass Properties...\n"));
        assert!(txt.contains("2.000000             Total Mass\n"));
        assert!(txt.contains("0.500000 0.000000 0.000000       Center of Gravity\n"));
        let row = txt.lines().find(|l| l.starts_with("box\t")).unwrap_or_default();
        assert_eq!(row.split('\t').count(), 12);
    }

    #[test]
    fn test_slice_table() {
        let report = AreaSliceReport {
            num_comps: 1,
            num_meshes: 1,
            num_tris: 12,
            axis: nalgebra::Vector3::y(),
            open: OpenMeshInfo::default(),
            slices: vec![
                AreaSlice {
                    loc: -0.5,
                    area: 0.0,
                    area_center: Point3::new(0.0, -0.5, 0.0),
                },
                AreaSlice {
                    loc: 0.25,
                    area: 12.0,
                    area_center: Point3::new(0.0, 0.25, 0.0),
                },
            ],
        };

        let txt = Reporter::slice_text(&report);
        assert!(!txt.contains("WARNING"));
        assert!(txt.starts_with("...Slice...\n"));
        assert!(txt.contains("0.00000 1.00000 0.00000 Axis Vector\n"));
        assert!(txt.contains("    0.250     0.000     0.250     0.000    12.000\n"));
        assert_eq!(txt.lines().count(), 9);
    }

    #[test]
    fn test_json_round_trip() -> Result<()> {
        let file = NamedTempFile::with_suffix(".json")?;
        Reporter::write_json(&sample_result(), file.path())?;
        let back: CompGeomResult = serde_json::from_str(&fs::read_to_string(file.path())?)?;
        assert_eq!(back.components, sample_result().components);
        Ok(())
    }
}
