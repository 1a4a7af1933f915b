use anyhow::{Context, Result};
use clap::Parser;
use eia_loader::config::DEFAULT_MAX_ROWS_PER_REQUEST;
use eia_loader::{storage, Bound, ClientConfig, EiaClient, FacetSet, Frequency};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "eia-loader",
    about = "Backfill an EIA v2 time series into a single sorted frame",
    long_about = "
Probes the series count for the selected facets, splits the range into
request-sized chunks, fetches them in parallel and stitches the result.

Examples:
  eia-loader --path electricity/rto/region-sub-ba-data/data/ \\
      --facet parent=CISO --facet subba=SDGE \\
      --start 2024-01-01T00 --end 2025-01-10T00 --frequency hourly
  eia-loader --path electricity/rto/daily-region-sub-ba-data/data/ \\
      --facet parent=CISO --start 2024-01-01 --end 2024-01-10 --frequency daily --single
",
    version
)]
struct Args {
    /// API route below the base URL
    #[arg(long)]
    path: String,

    /// Facet filter as name=value; repeat a name to select several values
    #[arg(long = "facet")]
    facets: Vec<String>,

    /// Range start (YYYY-MM-DD or YYYY-MM-DDTHH)
    #[arg(long)]
    start: String,

    /// Range end, inclusive
    #[arg(long)]
    end: String,

    /// hourly or daily
    #[arg(long, default_value = "hourly")]
    frequency: String,

    /// Row cap per request, shared by all selected series
    #[arg(long, default_value_t = DEFAULT_MAX_ROWS_PER_REQUEST)]
    max_rows: usize,

    /// Issue a single request without probing or chunking
    #[arg(long)]
    single: bool,

    /// JSON config file; otherwise EIA_* environment variables are used
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the result to this Parquet file
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("eia_loader=info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ClientConfig::from_json_file(path)?,
        None => ClientConfig::from_env()?,
    };
    let client = EiaClient::new(config)?;

    let facets = FacetSet::from_pairs(&args.facets)?;
    let start: Bound = args.start.parse()?;
    let end: Bound = args.end.parse()?;
    let frequency: Frequency = args.frequency.parse()?;

    let started = Instant::now();
    let mut df = if args.single {
        client.fetch_unbounded(&args.path, &facets, Some(start), Some(end), frequency)?
    } else {
        client.fetch(&args.path, &facets, start, end, frequency, args.max_rows)?
    };
    println!("{df}");
    println!("{} observations in {:.2?}", df.height(), started.elapsed());

    if let Some(output) = &args.output {
        storage::write_parquet(&mut df, output)
            .with_context(|| format!("Failed to save result to {}", output.display()))?;
        println!("Saved to {}", output.display());
    }

    Ok(())
}
