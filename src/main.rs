use clap::{Parser, Subcommand};
use fitview::config;
use fitview::imaging::{Bitmap, Rotation, RustCodec};
use fitview::loader::ImageLoader;
use fitview::output::{self, FrameReport, ZoomReport};
use fitview::state::ZoomDirection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("FITVIEW_ON_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("FITVIEW_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup; called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "fitview")]
#[command(about = "Fit, zoom and animate images the way a full-screen viewer does")]
#[command(long_about = "\
Fit, zoom and animate images the way a full-screen viewer does

Every command loads the image through the same pipeline an interactive
viewer uses: format sniffing, screen fit (with scaled JPEG decode and
halving for large sources), the fitted-bitmap cache, and background
animation frame loading.

Examples:

  fitview fit photo.jpg -o fitted.png     # fit to the configured viewport
  fitview zoom photo.jpg --steps 5        # walk zoom levels until the cap
  fitview frames anim.gif                 # list fitted animation frames
  fitview --json fit photo.jpg            # details as JSON

Logging goes to stderr; set RUST_LOG=fitview=debug to see pipeline decisions.

Run 'fitview gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Directory containing config.toml
    #[arg(long, default_value = ".", global = true)]
    config: PathBuf,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fit an image to the viewport and print its details
    Fit {
        image: PathBuf,
        /// Write the fitted bitmap as PNG
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Zoom in step by step, reporting each level's bitmap size
    Zoom {
        image: PathBuf,
        /// Number of zoom-in steps to attempt
        #[arg(long, default_value_t = 1)]
        steps: u32,
        /// Rotate clockwise by this many degrees (multiple of 90)
        #[arg(long, value_parser = parse_rotation)]
        rotate: Option<Rotation>,
        /// Write the last bitmap as PNG
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Load every animation frame and list them
    Frames { image: PathBuf },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn parse_rotation(value: &str) -> Result<Rotation, String> {
    let degrees: i64 = value
        .parse()
        .map_err(|_| format!("not a number: {value}"))?;
    Rotation::from_degrees(degrees).ok_or_else(|| format!("{degrees} is not a multiple of 90"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fitview=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Fit { image, output: out } => {
            let mut loader = open_loader(&cli.config)?;
            let bitmap = loader.load(&image)?;
            if let Some(details) = loader.details() {
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(details)?);
                } else {
                    output::print_details(details);
                }
            }
            if let Some(path) = out {
                save(&bitmap, &path)?;
            }
        }
        Command::Zoom {
            image,
            steps,
            rotate,
            output: out,
        } => {
            let mut loader = open_loader(&cli.config)?;
            let fit = loader.load(&image)?;
            let mut last = fit.clone();
            let mut rows = vec![report_row(&loader, &fit)];
            if let Some(bitmap) = loader.zoom_or_rotate(None, rotate) {
                rows[0] = report_row(&loader, &bitmap);
                last = bitmap;
            }
            for _ in 0..steps {
                match loader.zoom_or_rotate(Some(ZoomDirection::In), None) {
                    Some(bitmap) => {
                        rows.push(report_row(&loader, &bitmap));
                        last = bitmap;
                    }
                    None => {
                        info!(level = loader.zoom_level(), "zoom capped");
                        break;
                    }
                }
            }
            if let Some(row) = rows.last_mut() {
                row.capped = loader.zoom_level() == loader.zoom_cap();
            }
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                output::print_zoom_report(&rows);
            }
            if let Some(path) = out {
                save(&last, &path)?;
            }
        }
        Command::Frames { image } => {
            let mut loader = open_loader(&cli.config)?;
            let first = loader.load(&image)?;
            loader.wait_for_frames();
            let (loaded, total) = loader.animation_progress();
            let mut frames = Vec::new();
            if total == 0 {
                frames.push(FrameReport {
                    index: 1,
                    width: first.width(),
                    height: first.height(),
                    delay_ms: 0,
                });
            } else {
                if loaded < total {
                    warn!(loaded, total, "some frames failed to load");
                }
                for index in 1..=total {
                    let Some(frame) = loader.next_frame() else {
                        break;
                    };
                    frames.push(FrameReport {
                        index,
                        width: frame.bitmap.width(),
                        height: frame.bitmap.height(),
                        delay_ms: frame.delay_ms,
                    });
                }
            }
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&frames)?);
            } else {
                output::print_frame_report(&frames);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Production codec with the viewport and tuning from `config.toml` in `dir`.
fn open_loader(dir: &Path) -> Result<ImageLoader, config::ConfigError> {
    let viewer_config = config::load_config(dir)?;
    Ok(ImageLoader::new(Arc::new(RustCodec), &viewer_config))
}

fn report_row(loader: &ImageLoader, bitmap: &Bitmap) -> ZoomReport {
    ZoomReport {
        level: loader.zoom_level(),
        width: bitmap.width(),
        height: bitmap.height(),
        rotation: loader.rotation(),
        capped: false,
    }
}

fn save(bitmap: &Bitmap, path: &Path) -> Result<(), image::ImageError> {
    bitmap.image().save(path)?;
    info!(path = %path.display(), "wrote bitmap");
    Ok(())
}
