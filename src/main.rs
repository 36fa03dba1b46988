//! `manifold-montage` CLI - Render a binned montage of a manifold projection.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use manifold_montage::{
    read_manifest, save_montage, ManifoldProjection2D, PatchShape, ProjectionConfig,
};

/// Render a montage of images arranged by two manifold components.
#[derive(Parser, Debug)]
#[command(name = "manifold-montage")]
#[command(version, about, long_about = None)]
struct Args {
    /// CSV manifest with one `path,c0,c1,...` row per image.
    #[arg(value_name = "MANIFEST")]
    manifest: PathBuf,

    /// Output image path.
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Number of bins along each axis.
    #[arg(short, long, default_value = "32", value_name = "INT")]
    bins: usize,

    /// Manifold components to project onto, as `A,B`.
    #[arg(
        short,
        long,
        default_value = "0,1",
        value_name = "A,B",
        value_parser = parse_components
    )]
    components: (usize, usize),

    /// Patch size, either `N` or `HxW`.
    #[arg(
        short,
        long,
        default_value = "64",
        value_name = "SIZE",
        value_parser = parse_shape
    )]
    size: PatchShape,

    /// Load images lazily while building the montage instead of up front.
    #[arg(long)]
    no_preload: bool,

    /// Output JPEG quality (1-100).
    #[arg(short, long, default_value = "95", value_name = "INT")]
    quality: u8,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn parse_components(value: &str) -> std::result::Result<(usize, usize), String> {
    let (a, b) = value
        .split_once(',')
        .ok_or_else(|| format!("expected `A,B`, got {value:?}"))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<usize>()
            .map_err(|e| format!("invalid component {s:?}: {e}"))
    };
    Ok((parse(a)?, parse(b)?))
}

fn parse_shape(value: &str) -> std::result::Result<PatchShape, String> {
    let parse = |s: &str| {
        s.trim()
            .parse::<usize>()
            .map_err(|e| format!("invalid size {s:?}: {e}"))
    };
    let shape = match value.split_once(['x', 'X']) {
        Some((h, w)) => PatchShape::new(parse(h)?, parse(w)?),
        None => {
            let side = parse(value)?;
            PatchShape::new(side, side)
        }
    };
    shape.validate().map_err(|e| e.to_string())?;
    Ok(shape)
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("manifold_montage={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: &Args) -> Result<()> {
    if !args.manifest.exists() {
        anyhow::bail!("Manifest does not exist: {}", args.manifest.display());
    }

    let config = ProjectionConfig {
        bins: args.bins,
        components: args.components,
    };
    config.validate().context("Invalid projection settings")?;

    let manifest = read_manifest(&args.manifest).context("Failed to read manifest")?;

    let projection = ManifoldProjection2D::new(manifest.paths, args.size, !args.no_preload)
        .context("Failed to prepare images")?;

    let montage = projection
        .project(manifest.manifold.view(), &config)
        .context("Failed to build montage")?;

    save_montage(&montage, &args.output, args.quality).context("Failed to save montage")?;

    let (x_min, x_max, y_min, y_max) = montage.extent.as_tuple();
    println!(
        "Wrote {}x{} montage to {} (extent x: [{x_min}, {x_max}], y: [{y_min}, {y_max}])",
        montage.width(),
        montage.height(),
        args.output.display()
    );

    Ok(())
}
