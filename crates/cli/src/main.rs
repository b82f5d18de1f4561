//! fundfacts command line
//!
//! ```bash
//! # Clean sources, extract facts, write chunks and the fact table
//! fundfacts build
//!
//! # Embed the chunk corpus into the vector index
//! fundfacts index
//!
//! # Ask a question
//! fundfacts query "What is the exit load of HDFC ELSS?" --json
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use fundfacts_config::{load_settings, Settings};
use fundfacts_core::{ConversationContext, Field, Lookup, SchemeTag};
use fundfacts_ingest::{build_index, FactBuilder};
use fundfacts_rag::{
    build_embedder, read_chunks_jsonl, ConflictDetector, FactsheetEngine, MetricAnswer,
    QueryOutcome,
};

#[derive(Parser)]
#[command(name = "fundfacts")]
#[command(about = "Build and query a mutual fund factsheet corpus", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings environment (loads config/{env}.yaml over config/default.yaml)
    #[arg(long, global = true, env = "FUNDFACTS_ENV", value_name = "ENV")]
    env: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean sources, extract facts and write the chunk corpus and fact table
    Build {
        /// Emit canonical fact chunks only
        #[arg(long)]
        no_full_text: bool,
    },
    /// Embed the chunk corpus and write the vector index
    Index,
    /// Answer a question from the indexed corpus
    Query {
        #[arg(value_name = "QUERY")]
        query: String,
        /// Number of chunks to return
        #[arg(long, value_name = "N")]
        top_k: Option<usize>,
        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve one field from the fact chunks
    Extract {
        /// Field name, e.g. exit_load or expense_ratio
        #[arg(long, value_name = "FIELD")]
        field: String,
        /// Scheme tag, e.g. ELSS or LARGE_CAP
        #[arg(long, value_name = "SCHEME")]
        scheme: Option<String>,
    },
    /// List values that differ across sources
    Conflicts {
        /// Also write the conflicts to the configured log file
        #[arg(long)]
        log: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let settings = match load_settings(cli.env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing is not initialized yet
            eprintln!("Warning: failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };
    init_tracing(&settings, cli.verbose);

    match cli.command {
        Commands::Build { no_full_text } => build(&settings, no_full_text),
        Commands::Index => index(&settings),
        Commands::Query { query, top_k, json } => run_query(&settings, &query, top_k, json).await,
        Commands::Extract { field, scheme } => extract(&settings, &field, scheme.as_deref()),
        Commands::Conflicts { log } => conflicts(&settings, log),
    }
}

fn init_tracing(settings: &Settings, verbose: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose {
            "debug"
        } else {
            settings.observability.log_level.as_str()
        };
        format!("fundfacts={}", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };
    subscriber.with(fmt_layer).init();
}

fn build(settings: &Settings, no_full_text: bool) -> Result<()> {
    let mut ingest = settings.ingest.clone();
    if no_full_text {
        ingest.include_full_text = false;
    }

    let report = FactBuilder::new(ingest)
        .run(&settings.data)
        .context("build failed")?;

    println!(
        "Processed {}/{} sources: {} fact chunks, {} full-text chunks, {} flagged for OCR, {} missing text",
        report.sources_processed,
        report.sources_total,
        report.fact_chunks,
        report.fulltext_chunks,
        report.ocr_required.len(),
        report.sources_missing_text.len(),
    );
    println!("Facts per field:");
    for field in Field::ALL {
        println!("  {}: {}", field, report.field_counts.get(&field).copied().unwrap_or(0));
    }
    for issue in &report.quality_issues {
        println!("  issue: {}", issue);
    }

    if !report.is_healthy() {
        bail!(
            "only {} of {} sources yielded fact chunks",
            report.sources_with_facts,
            report.sources_total
        );
    }
    Ok(())
}

fn index(settings: &Settings) -> Result<()> {
    let chunks = read_chunks_jsonl(&settings.data.chunks_path)
        .with_context(|| format!("reading {}", settings.data.chunks_path.display()))?;
    let embedder = build_embedder(&settings.embedding)?;
    let manifest = build_index(&chunks, embedder.as_ref(), &settings.data)?;

    println!(
        "Indexed {} chunks ({} dims, {}) into {}",
        manifest.vector_count,
        manifest.dimension,
        manifest.embedding_model,
        manifest.index_path.display()
    );
    Ok(())
}

async fn run_query(settings: &Settings, query: &str, top_k: Option<usize>, json: bool) -> Result<()> {
    let engine = FactsheetEngine::from_settings(settings).context("loading engine")?;
    let ctx = ConversationContext::new();
    let (outcome, _) = match top_k {
        Some(k) => engine.answer_with_top_k(query, &ctx, k).await,
        None => engine.answer(query, &ctx).await,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn print_outcome(outcome: &QueryOutcome) {
    println!(
        "{} query, scheme {}",
        outcome.query_type,
        outcome.scheme.map(|s| s.display_name()).unwrap_or("unknown")
    );

    if let Some(answer) = &outcome.metric {
        print_metric(answer);
    }
    match &outcome.manager {
        Some(Lookup::Found(manager)) => println!("Fund manager: {} ({})", manager.name, manager.source_id),
        Some(Lookup::NotFound) => println!("Fund manager: not found in scheme overview"),
        Some(Lookup::Error(kind)) => println!("Fund manager: lookup failed ({:?})", kind),
        None => {}
    }

    match &outcome.retrieval {
        Lookup::Found(chunks) => {
            for (rank, r) in chunks.iter().enumerate() {
                let preview: String = r.chunk.text.chars().take(120).collect();
                println!(
                    "{:>2}. [{:.3}] {} ({}) {}",
                    rank + 1,
                    r.final_score.unwrap_or(r.relevance_score),
                    r.chunk.source_id,
                    r.chunk.source_type,
                    preview
                );
            }
        }
        Lookup::NotFound => println!("No matching chunks"),
        Lookup::Error(kind) => println!("Retrieval failed ({:?})", kind),
    }
}

fn print_metric(answer: &MetricAnswer) {
    match &answer.metric {
        Lookup::Found(metric) => println!(
            "{}: {} [{:?}] from {} {}",
            answer.field.label(),
            metric.value,
            metric.confidence,
            metric.source_id,
            metric.source_url
        ),
        Lookup::NotFound => println!("{}: not found in indexed sources", answer.field.label()),
        Lookup::Error(kind) => println!("{}: extraction failed ({:?})", answer.field.label(), kind),
    }
    for conflict in &answer.conflicts {
        println!(
            "  differs: {} says {} (vs {} from {})",
            conflict.conflicting_source,
            conflict.conflicting_value,
            conflict.authoritative_value,
            conflict.authoritative_source
        );
    }
}

fn extract(settings: &Settings, field: &str, scheme: Option<&str>) -> Result<()> {
    let field: Field = field.parse()?;
    let scheme: Option<SchemeTag> = scheme.map(str::parse::<SchemeTag>).transpose()?;

    let engine = FactsheetEngine::from_settings(settings).context("loading engine")?;
    let answer = engine.extract(field, scheme);
    println!("{}", serde_json::to_string_pretty(&answer)?);
    Ok(())
}

fn conflicts(settings: &Settings, log: bool) -> Result<()> {
    let detector = ConflictDetector::load(&settings.data.facts_path)
        .with_context(|| format!("reading {}", settings.data.facts_path.display()))?;
    let conflicts = detector.detect_conflicts();

    if conflicts.is_empty() {
        println!("No conflicts across {} fact rows", detector.facts().len());
    }
    for c in &conflicts {
        println!(
            "{} {}: {} ({}) vs {} ({})",
            c.scheme_tag,
            c.field,
            c.authoritative_value,
            c.authoritative_source,
            c.conflicting_value,
            c.conflicting_source
        );
    }

    if log {
        detector.log_conflicts(&settings.data.conflicts_log_path, &conflicts)?;
        println!("Wrote {}", settings.data.conflicts_log_path.display());
    }
    Ok(())
}
