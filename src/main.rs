use anyhow::Result;
use clap::{Parser, Subcommand};
use shopsight::config::{ModelSelector, NarrativeConfig};
use shopsight::engine::{AnalyticsEngine, QueryOutcome};
use shopsight::narrative::NarrativeGenerator;
use shopsight::result::QueryFailure;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "shopsight")]
#[command(about = "Retail transaction analytics with natural-language queries")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a natural-language query against the dataset
    Query {
        /// The question, e.g. "Show me revenue by category"
        query: String,

        /// Path to the transaction CSV (default: data/customer_shopping_data.csv)
        #[arg(short, long, default_value = "data/customer_shopping_data.csv")]
        data: PathBuf,

        /// Narrative model: local, openai or gemini (default: env/local)
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Print the dataset summary bundle with a narrative
    Summary {
        #[arg(short, long, default_value = "data/customer_shopping_data.csv")]
        data: PathBuf,

        #[arg(short, long)]
        model: Option<String>,
    },
    /// Print customer segment counts
    Segments {
        #[arg(short, long, default_value = "data/customer_shopping_data.csv")]
        data: PathBuf,
    },
    /// Run the predefined analysis suite
    Batch {
        #[arg(short, long, default_value = "data/customer_shopping_data.csv")]
        data: PathBuf,

        #[arg(short, long)]
        model: Option<String>,
    },
}

/// Representative queries for the automated suite.
const BATCH_QUERIES: [&str; 5] = [
    "Show me revenue trends by category",
    "What are the most popular shopping malls?",
    "Show me spending analysis by gender",
    "Give me a summary of customer shopping data",
    "What are the trends in customer spending by age group?",
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    match args.command {
        Commands::Query { query, data, model } => {
            let engine = build_engine(&data, model.as_deref())?;
            match engine.run(&query).await {
                Ok(outcome) => print_outcome(&outcome),
                Err(err) => {
                    let failure = QueryFailure::new(&query, &err);
                    eprintln!("{}", serde_json::to_string_pretty(&failure)?);
                    return Err(err.into());
                }
            }
        }
        Commands::Summary { data, model } => {
            let engine = build_engine(&data, model.as_deref())?;
            let outcome = engine.run("summary").await?;
            print_outcome(&outcome);
        }
        Commands::Segments { data } => {
            let engine = build_engine(&data, None)?;
            let segments = engine.segment_customers()?;
            println!("{}", segments);
        }
        Commands::Batch { data, model } => {
            let engine = build_engine(&data, model.as_deref())?;
            let mut succeeded = 0;
            for query in BATCH_QUERIES {
                println!("\n=== {} ===", query);
                match engine.run(query).await {
                    Ok(outcome) => {
                        succeeded += 1;
                        print_outcome(&outcome);
                    }
                    Err(err) => {
                        let failure = QueryFailure::new(query, &err);
                        eprintln!("{}", serde_json::to_string_pretty(&failure)?);
                    }
                }
            }
            println!(
                "\nCompleted {}/{} analyses successfully",
                succeeded,
                BATCH_QUERIES.len()
            );
        }
    }

    Ok(())
}

fn build_engine(data: &PathBuf, model: Option<&str>) -> Result<AnalyticsEngine> {
    let mut config = NarrativeConfig::from_env();
    if let Some(raw) = model {
        match ModelSelector::parse(raw) {
            Some(selector) => config = config.with_selector(selector),
            None => anyhow::bail!("unknown model '{}': expected local, openai or gemini", raw),
        }
    }
    info!(model = config.resolved_selector().as_str(), "narrative provider selected");

    let narrator = NarrativeGenerator::from_config(&config);
    let engine = AnalyticsEngine::from_csv(data, narrator)?;
    let report = engine.clean_report();
    info!(
        rows = report.rows_kept,
        dropped = report.rows_dropped,
        "dataset ready"
    );
    Ok(engine)
}

fn print_outcome(outcome: &QueryOutcome) {
    println!("Rule matched: {}", outcome.rule);
    println!(
        "Rows: {} ({} ms)",
        outcome.result.row_count, outcome.result.elapsed_ms
    );
    for row in outcome.result.rows.iter().take(10) {
        println!("  {}", row);
    }
    if outcome.result.row_count > 10 {
        println!("  ... {} more rows", outcome.result.row_count - 10);
    }
    match &outcome.chart {
        Some(chart) => println!(
            "Chart: {} \"{}\" ({} vs {})",
            chart.chart_type, chart.title, chart.x_column, chart.y_column
        ),
        None => println!("Chart: skipped"),
    }
    for warning in &outcome.result.warnings {
        println!("Warning: {}", warning);
    }
    println!("\n{}", outcome.narrative);
}
