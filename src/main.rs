use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tryon::capture::{FileSource, ImageSource};
use tryon::fitting::{self, AccessoryKind};
use tryon::output::{DataUrlSink, OutputSink, PngFileSink};
use tryon::{create_default_session, parse_color, CompositeMode, PointLabel, Provider, SessionConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Photo to segment
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the composited PNG
    #[arg(short, long, default_value = "look.png")]
    output: PathBuf,

    /// TOML session config (model paths, provider, threads)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Encoder ONNX model, overrides the config file
    #[arg(long)]
    encoder_model: Option<PathBuf>,

    /// Decoder ONNX model, overrides the config file
    #[arg(long)]
    decoder_model: Option<PathBuf>,

    /// Run on CPU only
    #[arg(long)]
    cpu: bool,

    /// Point prompt "x,y" in normalized [0, 1] coordinates
    #[arg(long, value_parser = parse_point, conflicts_with = "bbox")]
    point: Option<[f32; 2]>,

    /// Treat the point prompt as background instead of foreground
    #[arg(long, requires = "point")]
    exclude: bool,

    /// Box prompt "x1,y1,x2,y2" in normalized [0, 1] coordinates
    /// If neither point nor box is given, the person heuristic box is used
    #[arg(long = "box", value_parser = parse_box)]
    bbox: Option<[f32; 4]>,

    /// Rendering mode: cutout, highlight or background
    #[arg(long, default_value = "cutout")]
    mode: CompositeMode,

    /// Background color for cutout mode
    #[arg(long, default_value = "rgba(0,0,0,0)")]
    background: String,

    /// Also write the selected mask as a grayscale PNG
    #[arg(long)]
    mask_output: Option<PathBuf>,

    /// Accessory image to overlay on the result
    #[arg(long)]
    accessory: Option<PathBuf>,

    /// Accessory category (clothing, jewelry, glasses, hats, watches, other)
    #[arg(long)]
    accessory_kind: Option<String>,

    /// Print the result as a PNG data URL
    #[arg(long)]
    data_url: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn parse_floats<const N: usize>(s: &str) -> Result<[f32; N], String> {
    let values: Vec<f32> = s
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid number in '{}': {}", s, e))?;
    let values: [f32; N] = values
        .try_into()
        .map_err(|_| format!("expected {} comma-separated values, got '{}'", N, s))?;
    if values.iter().any(|v| !(0.0..=1.0).contains(v)) {
        return Err(format!("coordinates must be within [0, 1], got '{}'", s));
    }
    Ok(values)
}

fn parse_point(s: &str) -> Result<[f32; 2], String> {
    parse_floats::<2>(s)
}

fn parse_box(s: &str) -> Result<[f32; 4], String> {
    parse_floats::<4>(s)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Try-on starting");

    let mut config = match &args.config {
        Some(path) => SessionConfig::from_file(path)?,
        None => SessionConfig::default(),
    };
    if let Some(path) = &args.encoder_model {
        config.encoder_model = path.clone();
    }
    if let Some(path) = &args.decoder_model {
        config.decoder_model = path.clone();
    }
    if args.cpu {
        config.provider = Provider::Cpu;
    }
    config.validate().context("Invalid session config")?;

    let background = parse_color(&args.background).context("Invalid background color")?;

    let session = create_default_session(config);
    session.set_progress_hook(|progress| tracing::debug!("Progress: {}%", progress));
    session.set_status_hook(|status| tracing::info!("{}", status));

    let load_start = Instant::now();
    let photo = FileSource::new(&args.input)
        .load()
        .context("Failed to load input photo")?;
    let load_time = load_start.elapsed();

    let segment_start = Instant::now();
    let masks = match (args.point, args.bbox) {
        (Some([x, y]), _) => {
            let label = if args.exclude {
                PointLabel::Background
            } else {
                PointLabel::Foreground
            };
            session.embed(photo.into()).await.context("Failed to embed photo")?;
            session
                .decode_from_point(x, y, label)
                .await
                .context("Failed to segment from point")?
        }
        (None, Some(bbox)) => {
            session.embed(photo.into()).await.context("Failed to embed photo")?;
            session
                .decode_from_box(bbox)
                .await
                .context("Failed to segment from box")?
        }
        (None, None) => session
            .auto_segment_human(photo.into())
            .await
            .context("Failed to segment person")?,
    };
    let segment_time = segment_start.elapsed();

    let compose_start = Instant::now();
    let mut look = session
        .composite(args.mode, background)
        .context("Failed to composite")?;

    if args.accessory.is_some() || args.accessory_kind.is_some() {
        let kind = args
            .accessory_kind
            .as_deref()
            .map(AccessoryKind::from_name)
            .unwrap_or(AccessoryKind::Other);
        let art = match &args.accessory {
            Some(path) => Some(
                FileSource::new(path)
                    .load()
                    .context("Failed to load accessory")?
                    .to_rgba8(),
            ),
            None => None,
        };
        look = fitting::apply_accessory(&look, art.as_ref(), kind, None);
    }
    let compose_time = compose_start.elapsed();

    PngFileSink::new(&args.output)
        .write_image(&look)
        .context("Failed to write output")?;

    if let Some(path) = &args.mask_output {
        session
            .current_mask(None)?
            .save(path)
            .with_context(|| format!("Failed to write mask to {}", path.display()))?;
        tracing::info!("Mask written to {}", path.display());
    }

    if args.data_url {
        let mut sink = DataUrlSink::new();
        sink.write_image(&look)?;
        if let Some(url) = sink.latest() {
            println!("{}", url);
        }
    }

    tracing::info!(
        "Done: {} masks, best={} ({:.3}), load={:.1}ms, segment={:.1}ms, compose={:.1}ms",
        masks.len(),
        masks.best_index(),
        masks.scores()[masks.best_index()],
        load_time.as_secs_f64() * 1000.0,
        segment_time.as_secs_f64() * 1000.0,
        compose_time.as_secs_f64() * 1000.0
    );

    session.dispose();
    Ok(())
}
