use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use swift_compress::session::{download_name, FitParameter};
use swift_compress::{
    page_geometry, FitConfig, FitRequest, ImageFitter, PdfConfig, PdfFitter, RasterImage,
    SizeEstimate,
};

/// Fit images and PDFs to a target size
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Re-encode images as JPEG until they fit the target size
    Image {
        /// Input images
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Target size in KB
        #[arg(long, default_value_t = 200)]
        target_kb: u32,

        /// Output directory (defaults to each input's directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Maximum encode rounds per image
        #[arg(long, default_value_t = 8)]
        max_iterations: u32,

        /// Measure size as a base64 data URL, like the browser preview
        #[arg(long)]
        data_url_estimate: bool,
    },
    /// Scale every page of a PDF
    Pdf {
        /// Input PDF file
        input: PathBuf,

        /// Output PDF file
        output: Option<PathBuf>,

        /// Page scale factor in (0, 1]
        #[arg(long, default_value_t = 0.75)]
        scale: f32,
    },
    /// Print page sizes of a PDF
    Inspect {
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    match args.command {
        Command::Image {
            inputs,
            target_kb,
            out_dir,
            max_iterations,
            data_url_estimate,
        } => {
            let config = FitConfig {
                max_iterations,
                size_estimate: if data_url_estimate {
                    SizeEstimate::DataUrl
                } else {
                    SizeEstimate::Binary
                },
                ..FitConfig::default()
            };
            run_images(&inputs, target_kb, out_dir.as_deref(), config)
        }
        Command::Pdf {
            input,
            output,
            scale,
        } => run_pdf(&input, output, scale),
        Command::Inspect { input } => {
            let bytes = std::fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let pages = page_geometry(&bytes).context("Failed to load PDF")?;
            for (i, page) in pages.iter().enumerate() {
                println!("Page {}: {:.1} x {:.1} pt", i + 1, page.width, page.height);
            }
            Ok(())
        }
    }
}

fn run_images(
    inputs: &[PathBuf],
    target_kb: u32,
    out_dir: Option<&Path>,
    config: FitConfig,
) -> Result<()> {
    let fitter = ImageFitter::new(config).context("Invalid fit settings")?;
    let start = Instant::now();

    let outcomes: Vec<(PathBuf, Result<String>)> = inputs
        .par_iter()
        .map(|input| {
            let outcome = fit_one(&fitter, input, target_kb, out_dir);
            (input.clone(), outcome)
        })
        .collect();

    let mut failed = 0;
    for (input, outcome) in outcomes {
        match outcome {
            Ok(summary) => println!("{}: {}", input.display(), summary),
            Err(e) => {
                failed += 1;
                eprintln!("{}: {:#}", input.display(), e);
            }
        }
    }
    println!("Processed {} image(s) in {:.2?}", inputs.len(), start.elapsed());

    if failed > 0 {
        bail!("{} of {} image(s) failed", failed, inputs.len());
    }
    Ok(())
}

fn fit_one(
    fitter: &ImageFitter,
    input: &Path,
    target_kb: u32,
    out_dir: Option<&Path>,
) -> Result<String> {
    let bytes = std::fs::read(input).context("Failed to read image")?;
    let raster = RasterImage::decode(&bytes)?;
    let request = FitRequest::new(Arc::new(raster), target_kb)?;
    let result = fitter.fit(&request)?;

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let filename = format!("{}-{}", stem, download_name(FitParameter::TargetKb(target_kb)));
    let dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let output = dir.join(filename);
    std::fs::write(&output, &result.encoded_bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    Ok(format!(
        "{:.1} KB -> {:.1} KB ({}x{}, q={}, {} round(s)){} -> {}",
        bytes.len() as f64 / 1024.0,
        result.achieved_kb,
        result.width,
        result.height,
        result.quality.unwrap_or_default(),
        result.iterations,
        if result.met_goal { "" } else { " [target not met]" },
        output.display()
    ))
}

fn run_pdf(input: &Path, output: Option<PathBuf>, scale: f32) -> Result<()> {
    println!("Loading PDF: {:?}", input);
    let start = Instant::now();
    let bytes = std::fs::read(input).context("Failed to read PDF")?;

    let fitter = PdfFitter::new(PdfConfig {
        scale_factor: scale,
        target_kb: None,
    });
    let result = fitter.fit_default(&bytes).context("Failed to scale PDF")?;

    let output = output.unwrap_or_else(|| {
        input.with_file_name(download_name(FitParameter::Scale(scale)))
    });
    std::fs::write(&output, &result.encoded_bytes).context("Failed to save PDF")?;

    println!("Scaled in {:.2?}", start.elapsed());
    println!(
        "Original size: {:.2} MB",
        bytes.len() as f64 / 1_048_576.0
    );
    println!(
        "New size:      {:.2} MB",
        result.encoded_bytes.len() as f64 / 1_048_576.0
    );
    println!("Written to {}", output.display());
    Ok(())
}
