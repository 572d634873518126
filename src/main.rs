//! jsonsplit - Main Entry Point
//!
//! Reads a saved capture (metadata + records, JSON) and writes the split-JSON
//! document to stdout.
//!
//! Usage: `jsonsplit <capture.json> [format.toml]`

use anyhow::{bail, Context};
use jsonsplit::{Capture, FormatterConfig, JsonSplitExporter};
use std::io::{BufWriter, Write};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    // Initialize logging; stdout carries the document
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,jsonsplit=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args().skip(1);
    let Some(capture_path) = args.next() else {
        bail!("usage: jsonsplit <capture.json> [format.toml]");
    };

    let config = match args.next() {
        Some(path) => FormatterConfig::load(&path)
            .with_context(|| format!("loading format config {}", path))?,
        None => FormatterConfig::default(),
    };

    tracing::info!("Loading capture from {}", capture_path);
    let capture = Capture::load(&capture_path)
        .with_context(|| format!("loading capture {}", capture_path))?;

    let exporter = JsonSplitExporter::from_config(&config)?;
    for record in capture.records {
        exporter.process_record(record);
    }

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let stats = exporter.flush(&capture.metadata, &mut out)?;
    out.flush()?;

    tracing::info!(
        "Wrote {} rows, {} columns, {} path nodes",
        stats.rows,
        stats.columns,
        stats.nodes
    );

    Ok(())
}
