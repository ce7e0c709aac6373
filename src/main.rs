mod dom;
mod error;
mod format;
mod input;
mod llm;
mod locate;
mod render;
mod sanitize;
mod serialize;
mod sink;
mod template;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::warn;

use error::RenderError;
use input::Record;
use render::aio::{AioPage, MAX_SOURCE_CARDS};
use render::serp::{SerpPage, MAX_RESULTS};
use sink::{DirSink, DocumentSink};

#[derive(Parser)]
#[command(name = "serpgen", about = "Mock search-result page generator from retrieval CSVs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render classic result pages, one per retrieval row
    Serp {
        /// Saved results-page template
        #[arg(long, default_value = "serp_template.html")]
        template: PathBuf,
        /// Retrievals CSV (one row per query)
        #[arg(long, default_value = "sample_data/retrievals.csv")]
        retrievals: PathBuf,
        /// Sources CSV (many rows per retrieval)
        #[arg(long, default_value = "sample_data/aio_sources.csv")]
        sources: PathBuf,
        /// Output directory for rendered pages
        #[arg(long, default_value = "out_serp_html")]
        out_dir: PathBuf,
        /// Max retrieval rows to render (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Render AI-answer pages for rows that carry a formatted answer
    Aio {
        /// Saved answer-page template
        #[arg(long, default_value = "aio_template.html")]
        template: PathBuf,
        /// Retrievals CSV with the formatted_text column (see `format`)
        #[arg(long, default_value = "sample_data/retrievals_formatted.csv")]
        retrievals: PathBuf,
        #[arg(long, default_value = "sample_data/aio_sources.csv")]
        sources: PathBuf,
        #[arg(long, default_value = "out_aio_html")]
        out_dir: PathBuf,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Render answer rows as classic result pages, capped at the cited-source count
    AioSerp {
        #[arg(long, default_value = "serp_template.html")]
        template: PathBuf,
        #[arg(long, default_value = "sample_data/retrievals.csv")]
        retrievals: PathBuf,
        #[arg(long, default_value = "sample_data/aio_sources.csv")]
        sources: PathBuf,
        #[arg(long, default_value = "out_aio_as_serp_html")]
        out_dir: PathBuf,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Reformat raw answer text into constrained HTML via the OpenAI API
    Format {
        #[arg(long, default_value = "sample_data/retrievals.csv")]
        retrievals: PathBuf,
        /// Output CSV with the added formatted_text column
        #[arg(long, default_value = "sample_data/retrievals_formatted.csv")]
        output: PathBuf,
        #[arg(long, default_value = "gpt-5.2")]
        model: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serp { template, retrievals, sources, out_dir, limit } => {
            let records = apply_limit(input::load_records(&retrievals)?, limit);
            let source_items = input::load_sources(&sources)?;
            let groups = input::group_by_record(&source_items);
            let page = SerpPage::new(template::load(&template)?)?;
            let sink = DirSink::new(&out_dir)?;

            let stats = render_batch(&records, &sink, |record| {
                let items = groups.get(record.retrieval_id.as_str()).map_or(&[][..], Vec::as_slice);
                let top = input::top_ranked(items, MAX_RESULTS);
                page.render(&record.formatted_query(), &top)
            })?;
            stats.print(&out_dir);
            Ok(())
        }
        Commands::Aio { template, retrievals, sources, out_dir, limit } => {
            let records: Vec<Record> = input::load_records(&retrievals)?
                .into_iter()
                .filter(|r| {
                    r.has_answer()
                        && r.formatted_text.as_deref().is_some_and(|t| !t.trim().is_empty())
                })
                .collect();
            let records = apply_limit(records, limit);
            let source_items = input::load_sources(&sources)?;
            let groups = input::group_by_record(&source_items);
            let page = AioPage::new(template::load(&template)?)?;
            let sink = DirSink::new(&out_dir)?;

            let stats = render_batch(&records, &sink, |record| {
                let items = groups.get(record.retrieval_id.as_str()).map_or(&[][..], Vec::as_slice);
                let top = input::top_ranked(items, MAX_SOURCE_CARDS);
                let answer = record.formatted_text.as_deref().unwrap_or_default();
                page.render(&record.formatted_query(), answer, &top)
            })?;
            stats.print(&out_dir);
            Ok(())
        }
        Commands::AioSerp { template, retrievals, sources, out_dir, limit } => {
            let records: Vec<Record> = input::load_records(&retrievals)?
                .into_iter()
                .filter(Record::has_answer)
                .collect();
            let records = apply_limit(records, limit);
            let source_items = input::load_sources(&sources)?;
            let groups = input::group_by_record(&source_items);
            let cited_counts = input::distinct_cited_counts(&source_items);
            let page = SerpPage::new(template::load(&template)?)?;
            let sink = DirSink::new(&out_dir)?;

            let stats = render_batch(&records, &sink, |record| {
                let rid = record.retrieval_id.as_str();
                let items = groups.get(rid).map_or(&[][..], Vec::as_slice);
                // Mirror the answer page: as many results as it cites, at most 8.
                let cap = cited_counts.get(rid).copied().unwrap_or(0).min(MAX_SOURCE_CARDS);
                let top = input::top_ranked(items, cap);
                page.render(&record.formatted_query(), &top)
            })?;
            stats.print(&out_dir);
            Ok(())
        }
        Commands::Format { retrievals, output, model } => run_format(&retrievals, &output, &model).await,
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

struct RenderStats {
    total: usize,
    rendered: usize,
    failed: usize,
}

impl RenderStats {
    fn print(&self, out_dir: &std::path::Path) {
        println!(
            "Rendered {} of {} page(s) to: {}{}",
            self.rendered,
            self.total,
            out_dir.display(),
            if self.failed > 0 { format!(" ({} failed)", self.failed) } else { String::new() },
        );
    }
}

/// Render all records in parallel chunks, writing each page through the
/// sink as its chunk completes.
fn render_batch<F>(
    records: &[Record],
    sink: &impl DocumentSink,
    render: F,
) -> anyhow::Result<RenderStats>
where
    F: Fn(&Record) -> Result<String, RenderError> + Sync,
{
    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut stats = RenderStats { total: records.len(), rendered: 0, failed: 0 };

    for chunk in records.chunks(200) {
        let results: Vec<(&str, Result<String, RenderError>)> = chunk
            .par_iter()
            .map(|record| (record.retrieval_id.as_str(), render(record)))
            .collect();

        for (rid, result) in results {
            match result {
                Ok(html) => {
                    sink.write(rid, &html)?;
                    stats.rendered += 1;
                }
                Err(e) => {
                    warn!("skipping {}: {}", rid, e);
                    stats.failed += 1;
                }
            }
        }
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(stats)
}

/// Pass retrievals through the reformatter and write them back out with a
/// formatted_text column appended. Rows without answer text come through
/// with an empty value, no API call spent.
async fn run_format(
    retrievals: &std::path::Path,
    output: &std::path::Path,
    model: &str,
) -> anyhow::Result<()> {
    use anyhow::Context;

    let mut reader = csv::Reader::from_path(retrievals)
        .with_context(|| format!("failed to open retrievals CSV {}", retrievals.display()))?;
    let headers = reader.headers()?.clone();
    let text_col = headers
        .iter()
        .position(|h| h == "aio_text")
        .context("retrievals CSV is missing the aio_text column")?;
    let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;

    let reformatter = llm::Reformatter::from_env(model)?;
    let mut totals = llm::UsageTotals::default();

    let pb = ProgressBar::new(rows.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let mut out_headers = headers.clone();
    out_headers.push_field("formatted_text");
    writer.write_record(&out_headers)?;

    for row in &rows {
        let text = row.get(text_col).unwrap_or_default().trim();
        let formatted = if text.is_empty() {
            String::new()
        } else {
            reformatter.reformat(text, &mut totals).await?
        };

        let mut out_row = row.clone();
        out_row.push_field(&formatted);
        writer.write_record(&out_row)?;

        pb.set_message(format!(
            "in={} out={} est=${:.6}",
            totals.prompt_tokens,
            totals.completion_tokens,
            totals.estimated_cost()
        ));
        pb.inc(1);
    }
    writer.flush()?;
    pb.finish_and_clear();

    println!("Done. Wrote: {}", output.display());
    println!("Input tokens:  {}", totals.prompt_tokens);
    println!("Output tokens: {}", totals.completion_tokens);
    println!("Total estimated cost: ${:.6}", totals.estimated_cost());
    Ok(())
}

fn apply_limit(records: Vec<Record>, limit: Option<usize>) -> Vec<Record> {
    match limit {
        Some(n) if n > 0 => records.into_iter().take(n).collect(),
        _ => records,
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
