//! Split page images into column snippets
//!
//! Detects column boundaries and horizontal rules on every page image, saves
//! each snippet as a PNG and writes `snippets.json` with the page offsets an
//! OCR stage needs to put recognized boxes back into page coordinates.
//!
//! Usage:
//!   cargo run --release --bin split_pages -- --output-dir snippets page_001.png page_002.png
//!   cargo run --release --bin split_pages -- --source times_1888 --config segmentation.json scans/*.png

use broadsheet::config::SegmentationConfig;
use broadsheet::layout::snippet::{snippet_image, Snippet};
use broadsheet::pipeline::{load_page_image, SegmentationPipeline};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

struct SplitConfig {
    pages: Vec<PathBuf>,
    output_dir: PathBuf,
    source: Option<String>,
    config: Option<PathBuf>,
}

impl SplitConfig {
    fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let mut pages = Vec::new();
        let mut output_dir = PathBuf::from("snippets");
        let mut source = None;
        let mut config = None;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--output-dir" => {
                    i += 1;
                    if i < args.len() {
                        output_dir = PathBuf::from(&args[i]);
                    }
                },
                "--source" => {
                    i += 1;
                    source = args.get(i).cloned();
                },
                "--config" => {
                    i += 1;
                    config = args.get(i).map(PathBuf::from);
                },
                path => pages.push(PathBuf::from(path)),
            }
            i += 1;
        }

        Self {
            pages,
            output_dir,
            source,
            config,
        }
    }
}

#[derive(Serialize)]
struct PageSnippets {
    page_number: u32,
    image: String,
    column_boundaries: Vec<u32>,
    snippets: Vec<SnippetRecord>,
}

#[derive(Serialize)]
struct SnippetRecord {
    path: String,
    #[serde(flatten)]
    snippet: Snippet,
}

#[derive(Serialize)]
struct SnippetManifest {
    source_document_id: String,
    pages: Vec<PageSnippets>,
}

fn source_name(config: &SplitConfig) -> String {
    config
        .source
        .clone()
        .or_else(|| {
            config
                .pages
                .first()
                .and_then(|p| p.parent())
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    env_logger::init();

    let config = SplitConfig::from_args();
    if config.pages.is_empty() {
        eprintln!("Usage: split_pages [--output-dir DIR] [--source NAME] [--config FILE] <page images...>");
        std::process::exit(2);
    }

    let seg_config = match &config.config {
        Some(path) => match SegmentationConfig::from_json_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                std::process::exit(1);
            },
        },
        None => SegmentationConfig::broadsheet(),
    };
    let pipeline = SegmentationPipeline::with_config(seg_config);

    if let Err(e) = fs::create_dir_all(&config.output_dir) {
        eprintln!("Failed to create output directory: {}", e);
        std::process::exit(1);
    }

    let source = source_name(&config);
    println!("Splitting {} page images of {}", config.pages.len(), source);
    let start_time = Instant::now();

    let mut manifest = SnippetManifest {
        source_document_id: source,
        pages: Vec::new(),
    };
    let mut failed = 0;

    for (i, path) in config.pages.iter().enumerate() {
        let page_number = i as u32 + 1;
        let page = match load_page_image(path) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("  Page {}: failed to load {}: {}", page_number, path.display(), e);
                failed += 1;
                continue;
            },
        };

        let (boundaries, snippets) = pipeline.split_page(&page, page_number);
        let mut records = Vec::with_capacity(snippets.len());
        for snippet in snippets {
            let out = config.output_dir.join(snippet.file_name("png"));
            if let Err(e) = snippet_image(&page, &snippet).save(&out) {
                eprintln!("  Failed to save {}: {}", out.display(), e);
                continue;
            }
            records.push(SnippetRecord {
                path: out.display().to_string(),
                snippet,
            });
        }

        println!(
            "  Page {}: {} columns, {} snippets",
            page_number,
            boundaries.column_count(),
            records.len()
        );
        manifest.pages.push(PageSnippets {
            page_number,
            image: path.display().to_string(),
            column_boundaries: boundaries.as_slice().to_vec(),
            snippets: records,
        });
    }

    let manifest_path = config.output_dir.join("snippets.json");
    let written = serde_json::to_string_pretty(&manifest)
        .map_err(|e| e.to_string())
        .and_then(|json| fs::write(&manifest_path, json).map_err(|e| e.to_string()));
    if let Err(e) = written {
        eprintln!("Failed to write {}: {}", manifest_path.display(), e);
        std::process::exit(1);
    }

    println!(
        "\nWrote {} ({} pages, {} failed) in {:.2}s",
        manifest_path.display(),
        manifest.pages.len(),
        failed,
        start_time.elapsed().as_secs_f64()
    );
}
