use clap::{Parser, Subcommand};
use rendition::config::{self, RenderSettings};
use rendition::imaging::{Anchor, Color, FillPolicy, ImageFormat, QualityProfile, ResizeRequest, codec};
use rendition::output;
use rendition::process::{self, Operation, RenderJob};
use serde::Serialize;
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "rendition")]
#[command(about = "Resize, crop, filter and re-encode JPEG, PNG and GIF images")]
#[command(long_about = "\
Resize, crop, filter and re-encode JPEG, PNG and GIF images

Settings (quality profile, JPEG quality, fill color, filter chain) come from
the stock defaults, then an optional --config file, then command-line flags.

Resize modes for `render --width W --height H`:

  (no flags)          exact size, aspect ratio ignored
  --keep-aspect       largest aspect-preserving size inside the box
  --fill COLOR        fit, then pad to exactly WxH (letterbox)
  --anchor A          cover WxH, crop the overflow at A

Anchors: center, up, down, left, right, up_left, up_right, down_left, down_right

Run 'rendition gen-config' to generate a documented settings.toml.")]
#[command(version)]
struct Cli {
    /// Log algorithm decisions to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Flags that override the settings file.
#[derive(clap::Args, Clone)]
struct SettingsArgs {
    /// Settings file (TOML), merged over the stock defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Quality profile: speed, quality, quality-bicubic, quality-soft
    #[arg(long)]
    profile: Option<QualityProfile>,

    /// JPEG quality, 0.0-1.0
    #[arg(long)]
    quality: Option<f32>,
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Source image
    input: PathBuf,

    /// Destination file; its extension picks the format unless --format is set
    output: PathBuf,

    #[command(flatten)]
    settings: SettingsArgs,

    /// Job file (TOML or JSON) whose operations run before the flag operations
    #[arg(long)]
    job: Option<PathBuf>,

    /// Target width
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Target height
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Preserve the aspect ratio (fit inside the box)
    #[arg(long)]
    keep_aspect: bool,

    /// Cover the box and crop at this anchor
    #[arg(long)]
    anchor: Option<Anchor>,

    /// Letterbox color ("transparent" or "#rrggbb"); also the settings fill
    #[arg(long)]
    fill: Option<FillPolicy>,

    /// Never scale above the source size
    #[arg(long)]
    no_enlarge: bool,

    /// Multiply the size by this factor
    #[arg(long)]
    scale: Option<f64>,

    /// Center the WxH output on this point instead of resizing
    #[arg(long, value_name = "X,Y", value_parser = parse_point, requires = "width")]
    crop_point: Option<(i64, i64)>,

    /// With --crop-point, take the largest window around the point and resample it
    #[arg(long, requires = "crop_point")]
    allow_scaling: bool,

    /// Run the settings' filter chain
    #[arg(long)]
    filters: bool,

    /// Draw a cross at this point (after all other operations)
    #[arg(long, value_name = "X,Y", value_parser = parse_point)]
    mark: Option<(i64, i64)>,

    /// Output format: jpeg, png, gif
    #[arg(long)]
    format: Option<ImageFormat>,
}

#[derive(Subcommand)]
enum Command {
    /// Show format, dimensions and color model
    Info {
        files: Vec<PathBuf>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Render one image
    Render(RenderArgs),
    /// Render many images with one job, in parallel
    Batch {
        /// Directory for the rendered files
        output_dir: PathBuf,
        /// Source images
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Job file (TOML or JSON)
        #[arg(long)]
        job: PathBuf,
        #[command(flatten)]
        settings: SettingsArgs,
        /// Worker threads (defaults to all cores)
        #[arg(long)]
        threads: Option<usize>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stock settings.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Info { files, json } => {
            let mut infos = Vec::new();
            for file in &files {
                let info = codec::identify(&std::fs::read(file)?)?;
                if !json {
                    output::print_info(file, &info);
                }
                infos.push(info);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&infos)?);
            }
        }
        Command::Render(args) => {
            let settings = resolve_settings(&args.settings, args.fill)?;
            let job = render_job(&args)?;
            let result = process::render_file(&args.input, &args.output, &job, &settings)?;
            output::print_processed(&result);
        }
        Command::Batch {
            output_dir,
            inputs,
            job,
            settings,
            threads,
            json,
        } => {
            let settings = resolve_settings(&settings, None)?;
            let job = RenderJob::load(&job)?;
            init_thread_pool(threads);
            let report = process::process_files(&inputs, &output_dir, &job, &settings)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_batch_report(&report);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_settings_toml());
        }
    }

    Ok(())
}

/// Command-line settings overrides, serialized as the top TOML layer.
#[derive(Serialize, Default)]
struct SettingsOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<QualityProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    compression_quality: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fill: Option<FillPolicy>,
}

/// Stock defaults → `--config` file → command-line flags.
fn resolve_settings(
    args: &SettingsArgs,
    fill: Option<FillPolicy>,
) -> Result<RenderSettings, config::ConfigError> {
    let mut layers = Vec::new();
    if let Some(path) = &args.config {
        layers.push(config::load_raw_settings(path)?);
    }
    let overrides = SettingsOverrides {
        profile: args.profile,
        compression_quality: args.quality,
        fill,
    };
    layers.push(toml::Value::try_from(overrides)?);
    config::resolve_settings(config::stock_defaults_value()?, layers)
}

/// Job file operations followed by the ones the flags describe.
fn render_job(args: &RenderArgs) -> Result<RenderJob, process::ProcessError> {
    let mut job = match &args.job {
        Some(path) => RenderJob::load(path)?,
        None => RenderJob::default(),
    };
    if args.format.is_some() {
        job.format = args.format;
    }

    if let (Some(width), Some(height)) = (args.width, args.height) {
        let op = match args.crop_point {
            Some((x, y)) => Operation::CropPoint {
                x,
                y,
                width,
                height,
                allow_scaling: args.allow_scaling,
            },
            None => Operation::Resize(
                ResizeRequest {
                    keep_aspect: args.keep_aspect,
                    fill: args.fill,
                    anchor: args.anchor,
                    ..ResizeRequest::exact(width, height)
                }
                .allow_enlarge(!args.no_enlarge),
            ),
        };
        job.operations.push(op);
    }
    if let Some(factor) = args.scale {
        job.operations.push(Operation::Scale { factor });
    }
    if args.filters {
        job.operations.push(Operation::Filters);
    }
    if let Some((x, y)) = args.mark {
        job.operations.push(Operation::Mark {
            x,
            y,
            color: Color::RED,
        });
    }
    Ok(job)
}

/// Parse `"X,Y"` into a point.
fn parse_point(s: &str) -> Result<(i64, i64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got {s}"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<i64>()
            .map_err(|e| format!("invalid coordinate {v:?}: {e}"))
    };
    Ok((parse(x)?, parse(y)?))
}

/// Send `tracing` output to stderr: warnings by default, debug with `--verbose`.
fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool for batch processing.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(requested: Option<usize>) {
    let threads = config::effective_threads(requested);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
