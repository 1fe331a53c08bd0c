// Command-line front end over the `ambient_palette` library: sample one image,
// or loop an image sequence and stream palettes to stdout.

use std::path::PathBuf;
use std::time::Duration;

use ambient_palette::{
    AppConfig, ClockedSource, FrameColorSampler, ImageSequence, Palette, PeriodicSamplingScheduler,
    TilingPolicy,
};
use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tracing::{Level, info};

#[derive(Parser, Debug)]
#[command(name = "ambient-palette", version, about = "Grid-based average colors from video frames")]
struct Cli {
    /// Configuration file (TOML, JSON or YAML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample a single still image and print its palette.
    Sample(SampleArgs),
    /// Loop an image sequence and stream palettes.
    Play(PlayArgs),
}

#[derive(Args, Debug)]
struct GridArgs {
    /// Grid rows.
    #[arg(long)]
    rows: Option<u32>,

    /// Grid columns.
    #[arg(long)]
    columns: Option<u32>,

    /// Grow the last row and column to cover remainder pixels.
    #[arg(long, default_value_t = false)]
    absorb_remainder: bool,
}

#[derive(Args, Debug)]
struct SampleArgs {
    /// Input image.
    image: PathBuf,

    #[command(flatten)]
    grid: GridArgs,

    /// Print the palette as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug)]
struct PlayArgs {
    /// Directory of frames, played in file name order.
    #[arg(long)]
    frames: PathBuf,

    /// Playback rate of the sequence.
    #[arg(long)]
    fps: Option<f64>,

    #[command(flatten)]
    grid: GridArgs,

    /// Milliseconds between samples.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Milliseconds to wait before playback starts.
    #[arg(long)]
    startup_delay_ms: Option<u64>,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long)]
    run_for_secs: Option<f64>,

    /// Print palettes as JSON lines.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = AppConfig::load(cli.config.as_deref()).context("load configuration")?;
    match cli.cmd {
        Command::Sample(args) => cmd_sample(config, args),
        Command::Play(args) => cmd_play(config, args).await,
    }
}

fn apply_grid(config: &mut AppConfig, args: &GridArgs) {
    if let Some(rows) = args.rows {
        config.grid.rows = rows;
    }
    if let Some(columns) = args.columns {
        config.grid.columns = columns;
    }
    if args.absorb_remainder {
        config.grid.tiling = TilingPolicy::AbsorbRemainder;
    }
}

fn render(palette: &Palette, json: bool) -> anyhow::Result<String> {
    if json {
        return serde_json::to_string(palette).context("serialize palette");
    }
    let columns = palette.columns().max(1) as usize;
    let rows: Vec<String> = palette
        .colors()
        .chunks(columns)
        .map(|row| {
            row.iter()
                .map(|c| c.to_hex())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    Ok(rows.join(" | "))
}

fn cmd_sample(mut config: AppConfig, args: SampleArgs) -> anyhow::Result<()> {
    apply_grid(&mut config, &args.grid);
    config.validate()?;

    let encoded = std::fs::read(&args.image)
        .with_context(|| format!("read image '{}'", args.image.display()))?;
    let sampler = FrameColorSampler::new(config.workers);
    let palette = sampler
        .sample_encoded(&encoded, config.grid)
        .with_context(|| format!("sample '{}'", args.image.display()))?;

    println!("{}", render(&palette, args.json)?);
    Ok(())
}

async fn cmd_play(mut config: AppConfig, args: PlayArgs) -> anyhow::Result<()> {
    apply_grid(&mut config, &args.grid);
    if let Some(fps) = args.fps {
        config.fps = fps;
    }
    if let Some(interval_ms) = args.interval_ms {
        config.interval_ms = interval_ms;
    }
    if let Some(startup_delay_ms) = args.startup_delay_ms {
        config.startup_delay_ms = startup_delay_ms;
    }
    config.validate()?;

    let sequence = ImageSequence::open_dir(&args.frames, config.fps)
        .with_context(|| format!("open frames '{}'", args.frames.display()))?;
    let source = ClockedSource::new(sequence);

    let mut scheduler = PeriodicSamplingScheduler::with_capacity(
        FrameColorSampler::new(config.workers),
        config.subscriber_capacity,
    );
    let json = args.json;
    scheduler.start(source, config.session(), move |palette| {
        match render(&palette, json) {
            Ok(line) => println!("{line}"),
            Err(err) => tracing::warn!(%err, "failed to render palette"),
        }
    })?;

    match args.run_for_secs {
        Some(secs) => {
            let limit = Duration::try_from_secs_f64(secs)
                .with_context(|| format!("invalid --run-for-secs {secs}"))?;
            tokio::select! {
                _ = tokio::time::sleep(limit) => info!("time limit reached"),
                res = tokio::signal::ctrl_c() => res.context("listen for ctrl-c")?,
            }
        }
        None => tokio::signal::ctrl_c().await.context("listen for ctrl-c")?,
    }

    scheduler.stop().await;
    let status = scheduler.status();
    info!(
        ticks = status.ticks,
        published = status.published,
        skipped = status.skipped,
        loops = status.loops,
        "done"
    );
    Ok(())
}
