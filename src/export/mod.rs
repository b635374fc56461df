//! Scene to `.esc` export.
//!
//! The whole scene is indexed before any space is encoded, and the whole map
//! is encoded before anything is written, so every ordinal is known by the
//! time it is emitted and a failed export never leaves a partial file.
//!
//! ```no_run
//! use escher_export::export::{self, ExportOptions};
//! use escher_export::scene::Scene;
//! # fn main() -> Result<(), rootcause::Report> {
//! let json = std::fs::read_to_string("level.json")?;
//! let scene = Scene::from_json_str(&json)?;
//! let summary = export::export_to_path(&scene, &ExportOptions::default(), "level.esc")?;
//! println!("wrote {} spaces", summary.spaces);
//! # Ok(())
//! # }
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rootcause::Report;
use tracing::info;

use crate::error::{EscherError, EscherResult};
use crate::scene::SceneSource;

pub mod encoder;
pub mod materials;
pub mod model;
pub mod options;
pub mod spaces;
pub mod writer;

pub use encoder::{SpaceEncoder, allocate_portal_slot};
pub use materials::{MaterialCatalog, MaterialRef};
pub use model::{ExportSummary, MapModel};
pub use options::{AxisConvention, ExportOptions};
pub use spaces::SpaceIndex;
pub use writer::{FORMAT_VERSION, MapWriter};

/// Resolve the whole scene into a [`MapModel`] without writing anything.
pub fn build_model<S: SceneSource + ?Sized>(
    source: &S,
    options: &ExportOptions,
) -> EscherResult<MapModel> {
    let catalog = MaterialCatalog::collect(source.materials())?;
    let spaces = SpaceIndex::collect(source, &options.markers)?;
    let encoder = SpaceEncoder::new(source, &catalog, &spaces, options);

    let jobs: Vec<(usize, &str, usize)> = spaces
        .iter()
        .enumerate()
        .map(|(ordinal, (name, pso))| (ordinal, name, pso))
        .collect();

    #[cfg(feature = "rayon")]
    if options.parallel {
        use rayon::prelude::*;

        // Report the lowest failing ordinal, not whichever space failed first.
        let spaces = jobs
            .par_iter()
            .map(|&(ordinal, name, pso)| encoder.encode(ordinal, name, pso))
            .collect::<Vec<_>>()
            .into_iter()
            .collect::<EscherResult<Vec<_>>>()?;
        return Ok(MapModel {
            materials: catalog.records(),
            spaces,
        });
    }

    let spaces = jobs
        .iter()
        .map(|&(ordinal, name, pso)| encoder.encode(ordinal, name, pso))
        .collect::<EscherResult<Vec<_>>>()?;

    Ok(MapModel {
        materials: catalog.records(),
        spaces,
    })
}

/// Export `source` into `writer`.
pub fn export<S: SceneSource + ?Sized>(
    source: &S,
    options: &ExportOptions,
    writer: &mut impl Write,
) -> EscherResult<ExportSummary> {
    let model = build_model(source, options)?;
    MapWriter::new(writer, options).write_map(&model)?;
    Ok(model.summary())
}

/// Export `source` to the file at `path`.
///
/// The file is only created once the map has been fully resolved.
pub fn export_to_path<S: SceneSource + ?Sized>(
    source: &S,
    options: &ExportOptions,
    path: impl AsRef<Path>,
) -> EscherResult<ExportSummary> {
    let path = path.as_ref();
    let model = build_model(source, options)?;

    let io_error = |err: std::io::Error| {
        Report::new(EscherError::Io {
            path: path.display().to_string(),
            err,
        })
    };
    let mut out = BufWriter::new(File::create(path).map_err(io_error)?);
    MapWriter::new(&mut out, options)
        .with_target(path.display().to_string())
        .write_map(&model)?;
    out.flush().map_err(io_error)?;

    let summary = model.summary();
    info!(
        "wrote {}: {} materials, {} spaces, {} faces",
        path.display(),
        summary.materials,
        summary.spaces,
        summary.faces
    );
    Ok(summary)
}
