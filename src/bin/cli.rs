// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polyframe Trim CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use nalgebra::Vector3;
use polyframe_trim::io::{export_cart3d, export_stl, import_stl, Reporter};
use polyframe_trim::{Kernel, MeshInfo, TrimConfig};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "polyframe-trim")]
#[command(about = "Polyframe Trim - mesh intersection, wetted area and mass properties", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file (defaults to ./trim.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Intersect and trim STL components, report wetted areas and volumes
    CompGeom {
        /// Input STL files, one component each
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Trim against the y <= 0 half box
        #[arg(long)]
        half: bool,

        /// Skip the watertight check of the merged surface
        #[arg(long)]
        no_watertight: bool,

        /// Write the component table as CSV
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,

        /// Write the drag build-up table
        #[arg(long, value_name = "FILE")]
        drag: Option<PathBuf>,

        /// Write the full result as JSON
        #[arg(long, value_name = "FILE")]
        json: Option<PathBuf>,

        /// Export the trimmed surface as ASCII STL
        #[arg(long, value_name = "FILE")]
        stl: Option<PathBuf>,

        /// Export the trimmed surface as a Cart3D .tri file
        #[arg(long, value_name = "FILE")]
        tri: Option<PathBuf>,
    },

    /// Mass properties by slicing in X
    Mass {
        /// Input STL files, one component each
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Number of slices (at least 3; defaults to the configured count)
        #[arg(short, long)]
        slices: Option<usize>,

        /// Density applied to every component
        #[arg(short, long, default_value = "1.0")]
        density: f64,

        /// Write the full report as JSON
        #[arg(long, value_name = "FILE")]
        json: Option<PathBuf>,
    },

    /// Cross-section areas along an axis
    Slice {
        /// Input STL files, one component each
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Number of slice planes
        #[arg(short, long, default_value = "10")]
        slices: usize,

        /// Slice axis
        #[arg(short, long, value_enum, default_value = "x")]
        axis: SliceAxis,

        /// Write the full report as JSON
        #[arg(long, value_name = "FILE")]
        json: Option<PathBuf>,
    },

    /// Watertight check of each input on its own
    Check {
        /// Input STL files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Show version information
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum SliceAxis {
    X,
    Y,
    Z,
}

impl SliceAxis {
    fn vector(self) -> Vector3<f64> {
        match self {
            Self::X => Vector3::x(),
            Self::Y => Vector3::y(),
            Self::Z => Vector3::z(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => TrimConfig::from_file(path)?,
        None => TrimConfig::load()?,
    };

    match &cli.command {
        Commands::CompGeom {
            inputs,
            half,
            no_watertight,
            csv,
            drag,
            json,
            stl,
            tri,
        } => {
            let exports = Exports {
                csv: csv.as_deref(),
                drag: drag.as_deref(),
                json: json.as_deref(),
                stl: stl.as_deref(),
                tri: tri.as_deref(),
            };
            comp_geom_command(inputs, config, *half, !no_watertight, &exports, cli.verbose)?;
        }
        Commands::Mass {
            inputs,
            slices,
            density,
            json,
        } => {
            let slices = slices.unwrap_or(config.mass_slices);
            mass_command(inputs, config, slices, *density, json.as_deref(), cli.verbose)?;
        }
        Commands::Slice {
            inputs,
            slices,
            axis,
            json,
        } => {
            slice_command(inputs, config, *slices, *axis, json.as_deref(), cli.verbose)?;
        }
        Commands::Check { inputs } => {
            check_command(inputs, config, cli.verbose)?;
        }
        Commands::Version => {
            println!("Polyframe Trim v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

struct Exports<'a> {
    csv: Option<&'a Path>,
    drag: Option<&'a Path>,
    json: Option<&'a Path>,
    stl: Option<&'a Path>,
    tri: Option<&'a Path>,
}

fn component_name(path: &Path, index: usize) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("comp_{index}"))
}

/// Import every input into a fresh kernel
fn load_kernel(inputs: &[PathBuf], config: TrimConfig, density: f64, verbose: bool) -> Result<Kernel> {
    let progress = if verbose {
        let pb = ProgressBar::new(inputs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .context("Invalid progress template")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut kernel = Kernel::new(config);
    for (i, path) in inputs.iter().enumerate() {
        if !path.exists() {
            eprintln!("{} Input file not found: {}", "Error:".red(), path.display());
            std::process::exit(1);
        }
        if let Some(ref pb) = progress {
            pb.set_message(format!("Loading {}", path.display()));
        }

        let mut info = MeshInfo::named(component_name(path, i), i as i32);
        info.density = density;
        let mesh = import_stl(path, info)?;
        if verbose {
            println!("  {} {} ({} triangles)", "ℹ".bright_blue(), path.display(), mesh.num_tris());
        }
        kernel.add_mesh(mesh);

        if let Some(ref pb) = progress {
            pb.inc(1);
        }
    }
    if let Some(pb) = progress {
        pb.finish_with_message("loaded");
    }
    Ok(kernel)
}

fn comp_geom_command(
    inputs: &[PathBuf],
    config: TrimConfig,
    half: bool,
    water_tight: bool,
    exports: &Exports<'_>,
    verbose: bool,
) -> Result<()> {
    let mut kernel = load_kernel(inputs, config, 1.0, verbose)?;

    let start = std::time::Instant::now();
    let result = kernel.intersect_trim(water_tight, half)?;
    if verbose {
        println!("Trimmed in {:.2?}", start.elapsed());
    }

    print!("{}", Reporter::comp_geom_text(&result));

    if let Some(path) = exports.csv {
        std::fs::write(path, Reporter::comp_geom_csv(&result))
            .with_context(|| format!("Failed to write CSV: {}", path.display()))?;
    }
    if let Some(path) = exports.drag {
        std::fs::write(path, Reporter::drag_tsv(&result))
            .with_context(|| format!("Failed to write drag table: {}", path.display()))?;
    }
    if let Some(path) = exports.json {
        Reporter::write_json(&result, path)?;
    }
    if let Some(path) = exports.stl {
        export_stl(&kernel.meshes, path)?;
    }
    if let Some(path) = exports.tri {
        export_cart3d(&kernel.meshes, path)?;
    }

    if let Some(report) = result.watertight {
        if report.is_water_tight() {
            println!("{}", "✓ Trimmed surface is watertight".green());
        } else {
            println!("{} {} invalid triangles", "✗".red(), report.invalid.to_string().red());
            std::process::exit(1);
        }
    }

    Ok(())
}

fn mass_command(
    inputs: &[PathBuf],
    config: TrimConfig,
    slices: usize,
    density: f64,
    json: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let mut kernel = load_kernel(inputs, config, density, verbose)?;
    let report = kernel.mass_slice_x(slices)?;

    print!("{}", Reporter::mass_text(&report));
    if let Some(path) = json {
        Reporter::write_json(&report, path)?;
    }
    Ok(())
}

fn slice_command(
    inputs: &[PathBuf],
    config: TrimConfig,
    slices: usize,
    axis: SliceAxis,
    json: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let mut kernel = load_kernel(inputs, config, 1.0, verbose)?;
    let report = kernel.area_slice(slices, axis.vector())?;

    print!("{}", Reporter::slice_text(&report));
    if let Some(path) = json {
        Reporter::write_json(&report, path)?;
    }
    Ok(())
}

fn check_command(inputs: &[PathBuf], config: TrimConfig, verbose: bool) -> Result<()> {
    let mut failed = 0;

    for (i, path) in inputs.iter().enumerate() {
        let mut mesh = import_stl(path, MeshInfo::named(component_name(path, i), i as i32))?;
        mesh.load_bnd_box(config.tri_leaf_size);

        let mut log = Vec::new();
        let report = mesh.water_tight_check(&config, &mut log)?;
        if verbose {
            print!("{}", String::from_utf8_lossy(&log));
        }

        if report.is_water_tight() {
            println!("{} {}", "✓".green(), path.display());
        } else {
            failed += 1;
            println!(
                "{} {} ({} invalid triangles)",
                "✗".red(),
                path.display(),
                report.invalid.to_string().red()
            );
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
