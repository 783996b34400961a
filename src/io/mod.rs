// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! I/O module - STL import, surface export and reports

mod export_cart3d;
mod export_stl;
mod importer;
mod report;

pub use export_cart3d::{export_cart3d, Cart3DSurface};
pub use export_stl::{export_stl, export_stl_binary, write_stl_tris};
pub use importer::import_stl;
pub use report::Reporter;
