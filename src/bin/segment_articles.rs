//! Segment OCR output into articles
//!
//! Reads an OCR output file (fragment array, JSON lines or page document)
//! and writes `{ total_articles, articles }` JSON.
//!
//! Usage:
//!   cargo run --release --bin segment_articles -- --input ocr_output.json
//!   cargo run --release --bin segment_articles -- --input ocr.jsonl --output articles.json \
//!       --config segmentation.json --workers 8

use broadsheet::config::SegmentationConfig;
use broadsheet::pipeline::{load_path, SegmentationPipeline};
use std::path::PathBuf;
use std::time::Instant;

struct CliConfig {
    input: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    workers: usize,
    conservative: bool,
}

impl CliConfig {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();
        let mut input = None;
        let mut output = PathBuf::from("articles.json");
        let mut config = None;
        let mut workers = std::thread::available_parallelism().map_or(1, |n| n.get());
        let mut conservative = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--input" | "-i" => {
                    i += 1;
                    input = args.get(i).map(PathBuf::from);
                },
                "--output" | "-o" => {
                    i += 1;
                    if let Some(v) = args.get(i) {
                        output = PathBuf::from(v);
                    }
                },
                "--config" | "-c" => {
                    i += 1;
                    config = args.get(i).map(PathBuf::from);
                },
                "--workers" | "-j" => {
                    i += 1;
                    workers = args
                        .get(i)
                        .and_then(|v| v.parse().ok())
                        .ok_or("--workers needs a number")?;
                },
                "--conservative" => {
                    conservative = true;
                },
                "--help" | "-h" => {
                    return Err(String::new());
                },
                other => {
                    return Err(format!("unknown argument: {}", other));
                },
            }
            i += 1;
        }

        let input = input.ok_or("--input is required")?;
        Ok(Self {
            input,
            output,
            config,
            workers,
            conservative,
        })
    }
}

fn usage() {
    eprintln!("Usage: segment_articles --input <ocr.json> [--output articles.json]");
    eprintln!("                        [--config config.json] [--workers N] [--conservative]");
}

fn main() {
    env_logger::init();

    let cli = match CliConfig::from_args() {
        Ok(cli) => cli,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("Error: {}", msg);
            }
            usage();
            std::process::exit(2);
        },
    };

    let config = match &cli.config {
        Some(path) => match SegmentationConfig::from_json_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                std::process::exit(1);
            },
        },
        None if cli.conservative => SegmentationConfig::conservative(),
        None => SegmentationConfig::broadsheet(),
    };

    println!("Article Segmentation");
    println!("====================");
    println!("Input:   {}", cli.input.display());
    println!("Output:  {}", cli.output.display());
    println!("Workers: {}\n", cli.workers);

    let start_time = Instant::now();

    let report = match load_path(&cli.input) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to read {}: {}", cli.input.display(), e);
            std::process::exit(1);
        },
    };
    println!(
        "Loaded {} fragments on {} pages",
        report.fragment_count(),
        report.pages.len()
    );

    let pipeline = SegmentationPipeline::with_config(config);
    let output = pipeline.segment_report(report, cli.workers);

    if let Err(e) = output.corpus.write_json(&cli.output) {
        eprintln!("Failed to write {}: {}", cli.output.display(), e);
        std::process::exit(1);
    }

    println!("\n{}", output.summary);
    println!("\nDone in {:.2}s", start_time.elapsed().as_secs_f64());
}
