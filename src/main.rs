use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use rootcause::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use escher_export::export::{
    self, AxisConvention, ExportOptions, MaterialCatalog, allocate_portal_slot,
};
use escher_export::scene::classify::classify_object;
use escher_export::scene::{Scene, SceneSource};

/// Export editor scene snapshots to Escher maps (.esc)
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log every discovered material, space and anchor
    #[clap(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export a scene snapshot to an .esc map
    Export {
        /// Scene snapshot (JSON) written by the editor
        scene: PathBuf,
        /// Destination .esc file
        out: PathBuf,
        /// JSON file with export options. Flags below override it.
        #[clap(long)]
        options: Option<PathBuf>,
        /// Digits after the decimal point
        #[clap(long)]
        precision: Option<usize>,
        /// Write editor coordinates without axis conversion
        #[clap(long)]
        identity_axes: bool,
        /// Encode spaces in parallel
        #[clap(long)]
        parallel: bool,
    },
    /// Print how the exporter classifies and indexes a scene snapshot
    Inspect {
        /// Scene snapshot (JSON) written by the editor
        scene: PathBuf,
        /// JSON file with export options
        #[clap(long)]
        options: Option<PathBuf>,
        /// Dump the fully resolved map model as JSON instead
        #[clap(long)]
        json: bool,
    },
}

fn load_scene(path: &Path) -> Result<Scene, Report> {
    let file = File::open(path).context("Failed to open scene snapshot")?;
    let scene =
        Scene::from_json_reader(BufReader::new(file)).context("Failed to load scene snapshot")?;
    Ok(scene)
}

fn load_options(path: Option<&Path>) -> Result<ExportOptions, Report> {
    let Some(path) = path else {
        return Ok(ExportOptions::default());
    };
    let file = File::open(path).context("Failed to open export options")?;
    let options = serde_json::from_reader(BufReader::new(file))
        .context("Failed to parse export options")?;
    Ok(options)
}

fn inspect(scene: &Scene, options: &ExportOptions, json: bool) -> Result<(), Report> {
    if json {
        let model = export::build_model(scene, options).context("Failed to resolve map")?;
        serde_json::to_writer_pretty(io::stdout().lock(), &model)
            .context("Failed to write map model")?;
        println!();
        return Ok(());
    }

    println!("objects:");
    for (id, depth) in scene.walk() {
        let object = &scene.objects()[id];
        let role = match classify_object(object, &options.markers) {
            Ok(role) => role.to_string(),
            Err(err) => format!("invalid: {}", err.current_context()),
        };
        println!("  {}{} [{role}]", "  ".repeat(depth), object.name);
    }

    let catalog = MaterialCatalog::collect(scene.materials()).context("Failed to index materials")?;
    println!("materials:");
    for (ordinal, (name, material)) in catalog.index().iter().enumerate() {
        println!("  {ordinal}: \"{name}\" ({} textures)", material.textures.len());
    }

    let model = export::build_model(scene, options).context("Failed to resolve map")?;
    println!("spaces:");
    for space in &model.spaces {
        let next_slot = allocate_portal_slot(
            space.remotes.iter().map(|remote| remote.slot),
            options.max_portal_slots,
        )
        .map_or_else(|_| "none".to_string(), |slot| slot.to_string());
        println!(
            "  {}: {} ({} verts, {} faces, {} remotes, {} spawns, next free portal slot: {next_slot})",
            space.ordinal,
            space.name,
            space.vertices.len(),
            space.faces.len(),
            space.remotes.len(),
            space.spawns.len()
        );
    }

    Ok(())
}

fn main() -> Result<(), Report> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "escher_export=debug"
    } else {
        "escher_export=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match args.command {
        Command::Export {
            scene,
            out,
            options,
            precision,
            identity_axes,
            parallel,
        } => {
            let mut options = load_options(options.as_deref())?;
            if let Some(precision) = precision {
                options.precision = precision;
            }
            if identity_axes {
                options.axes = AxisConvention::Identity;
            }
            options.parallel |= parallel;

            let scene = load_scene(&scene)?;
            let summary = export::export_to_path(&scene, &options, &out)
                .context("Failed to export map")?;
            info!(
                "{} verts, {} remotes, {} spawns",
                summary.vertices, summary.remotes, summary.spawns
            );
        }
        Command::Inspect {
            scene,
            options,
            json,
        } => {
            let options = load_options(options.as_deref())?;
            let scene = load_scene(&scene)?;
            inspect(&scene, &options, json)?;
        }
    }

    Ok(())
}
