use clap::Parser;
use image::{ImageReader, RgbaImage};
use rquant::{dither, generate, Method, Options, PixelBuffer, Progress, Request};
use std::error::Error;
use std::fs;
use std::io::{stdout, Write};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Generate a color palette for an image and optionally write the
/// remapped or dithered result
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Input image path
    img: PathBuf,

    /// Number of palette colors
    #[arg(short, long, default_value_t = 16)]
    colors: usize,

    /// Method tag, e.g. octree, k_means, floyd_steinberg
    #[arg(short, long, default_value = "k_means")]
    method: String,

    /// Seed for randomized methods
    #[arg(short, long)]
    seed: Option<u64>,

    /// JSON options file; replaces --method
    #[arg(long)]
    options: Option<PathBuf>,

    /// Write the mapped image here
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn options(args: &Args) -> Result<Options, Box<dyn Error>> {
    let mut options = match &args.options {
        Some(path) => Options::from_json(&fs::read_to_string(path)?)?,
        None => Options::new(args.method.parse::<Method>()?),
    };
    if let Some(seed) = args.seed {
        options.seed = seed;
    }
    Ok(options)
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let img = ImageReader::open(&args.img)?.decode()?.to_rgba8();
    let buffer = PixelBuffer::from_image(&img)?;
    let options = options(args)?;
    let method = options.method.name();

    let mut sink = |fraction: f32| tracing::trace!(fraction, "progress");
    let out = generate(
        &Request::new(buffer, args.colors, options),
        &mut Progress::new(&mut sink),
    )?;
    tracing::info!(method, colors = out.palette.len(), "palette ready");

    let mut stdout = stdout().lock();
    for color in &out.palette {
        writeln!(stdout, "#{:02x}{:02x}{:02x}", color[0], color[1], color[2])?;
    }

    if let Some(path) = &args.output {
        let pixels = match out.dithered {
            Some(pixels) => pixels,
            None => dither::remap(&buffer, &out.palette)?,
        };
        let mapped = RgbaImage::from_raw(img.width(), img.height(), pixels)
            .ok_or("mapped pixels do not match the image size")?;
        mapped.save(path)?;
        tracing::info!(path = %path.display(), "image written");
    }
    Ok(())
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rquant=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("{}: {e}", args.img.to_string_lossy());
        std::process::exit(1);
    }
}
