//! CandleLab CLI: collect, monthly, check and inspect commands.
//!
//! Commands:
//! - `collect`: fetch a date range, compute indicators, validate and save
//! - `monthly`: archive raw candles month by month as CSV and Parquet
//! - `check`: fetch the latest few candles (connection test)
//! - `inspect`: load a saved series, validate it and print a summary

use anyhow::{bail, Context, Result};
use candlelab_core::data::{BinanceClient, CancelToken, ExchangeClient, SyntheticExchange};
use candlelab_core::export::{self, ExportFormat};
use candlelab_core::monthly::{MonthlyBatch, YearMonth};
use candlelab_core::pipeline::{Pipeline, PipelineData, PipelineError, PipelineRequest};
use candlelab_core::summary::SeriesSummary;
use candlelab_core::{PipelineConfig, Series, Severity, Timeframe, ValidationReport, Validator};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Upper bound for `check --count` (one exchange page).
const MAX_CHECK_COUNT: i64 = 1000;

#[derive(Parser)]
#[command(
    name = "candlelab",
    about = "CandleLab: historical crypto candles, indicators and validation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that talks to an exchange.
#[derive(Args)]
struct SourceArgs {
    /// Trading pair in exchange notation.
    #[arg(long, default_value = "BTC/USDT")]
    symbol: String,

    /// Candle timeframe (1m, 5m, 1h, 1d, ...).
    #[arg(long, default_value = "1m")]
    timeframe: Timeframe,

    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the offline synthetic exchange instead of Binance.
    #[arg(long, default_value_t = false)]
    synthetic: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect a date range, compute indicators, validate and save.
    Collect {
        #[command(flatten)]
        source: SourceArgs,

        /// Start date (YYYY-MM-DD, UTC).
        #[arg(long, default_value = "2017-01-01")]
        start: String,

        /// End date (YYYY-MM-DD, UTC, inclusive). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Output file (.csv or .parquet). Defaults to {symbol}_{timeframe}_{timestamp}.csv.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Save raw candles only, without indicator columns.
        #[arg(long, default_value_t = false)]
        raw_only: bool,

        /// Print the summary and reports as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Archive raw candles month by month.
    Monthly {
        #[command(flatten)]
        source: SourceArgs,

        /// First month (YYYY-MM).
        #[arg(long)]
        from: YearMonth,

        /// Last month (YYYY-MM). Defaults to --from.
        #[arg(long)]
        to: Option<YearMonth>,

        /// Root directory for csv/ and parquet/ subdirectories.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Skip CSV output.
        #[arg(long, default_value_t = false)]
        no_csv: bool,

        /// Skip Parquet output.
        #[arg(long, default_value_t = false)]
        no_parquet: bool,
    },
    /// Fetch the latest candles and print the newest one.
    Check {
        #[command(flatten)]
        source: SourceArgs,

        /// How many recent candles to fetch.
        #[arg(
            long,
            default_value_t = 5,
            value_parser = clap::value_parser!(u32).range(1..=MAX_CHECK_COUNT)
        )]
        count: u32,
    },
    /// Load a saved series, validate it and print a summary.
    Inspect {
        /// CSV or Parquet file written by `collect --raw-only` or `monthly`.
        path: PathBuf,

        #[arg(long, default_value = "BTC/USDT")]
        symbol: String,

        #[arg(long, default_value = "1m")]
        timeframe: Timeframe,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cancel = cancel_on_ctrl_c()?;

    match cli.command {
        Commands::Collect {
            source,
            start,
            end,
            output,
            raw_only,
            json,
        } => run_collect(&source, &start, end.as_deref(), output, raw_only, json, &cancel),
        Commands::Monthly {
            source,
            from,
            to,
            data_dir,
            no_csv,
            no_parquet,
        } => run_monthly(
            &source,
            from,
            to.unwrap_or(from),
            data_dir,
            no_csv,
            no_parquet,
            &cancel,
        ),
        Commands::Check { source, count } => run_check(&source, count, &cancel),
        Commands::Inspect {
            path,
            symbol,
            timeframe,
        } => run_inspect(&path, &symbol, timeframe),
    }
}

/// A token that Ctrl-C cancels; collection stops before the next page.
fn cancel_on_ctrl_c() -> Result<CancelToken> {
    let cancel = CancelToken::new();
    let handler = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("interrupt received, stopping after the current page");
        handler.cancel();
    })
    .context("failed to install Ctrl-C handler")?;
    Ok(cancel)
}

fn load_config(source: &SourceArgs) -> Result<PipelineConfig> {
    let mut config = match &source.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if source.synthetic {
        // No remote rate limit to respect.
        config.fetch.min_request_interval_ms = 0;
    }
    Ok(config)
}

fn make_client(source: &SourceArgs, config: &PipelineConfig) -> Result<Box<dyn ExchangeClient>> {
    if source.synthetic {
        let listed = Utc.with_ymd_and_hms(2017, 1, 1, 0, 0, 0).single();
        let Some(listed) = listed else {
            bail!("invalid synthetic listing date");
        };
        return Ok(Box::new(SyntheticExchange::listed_since(listed)));
    }
    let client = BinanceClient::new(&config.exchange).context("failed to create Binance client")?;
    Ok(Box::new(client))
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
}

/// `--start` at 00:00:00 through `--end` at 23:59:59.
fn date_range(start: &str, end: Option<&str>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = parse_day(start)?.and_time(NaiveTime::MIN).and_utc();
    let end_day = match end {
        Some(s) => parse_day(s)?,
        None => Utc::now().date_naive(),
    };
    let end = end_day.and_time(NaiveTime::MIN).and_utc() + Duration::days(1) - Duration::seconds(1);
    if start >= end {
        bail!("start {start} must be before end {end}");
    }
    Ok((start, end))
}

fn default_output(symbol: &str, timeframe: Timeframe) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let safe = symbol.replace('/', "_").to_ascii_lowercase();
    PathBuf::from(format!("{safe}_{timeframe}_{stamp}.csv"))
}

fn run_collect(
    source: &SourceArgs,
    start: &str,
    end: Option<&str>,
    output: Option<PathBuf>,
    raw_only: bool,
    json: bool,
    cancel: &CancelToken,
) -> Result<()> {
    let (start, end) = date_range(start, end)?;
    let path = output.unwrap_or_else(|| default_output(&source.symbol, source.timeframe));
    ExportFormat::from_path(&path)?;
    let config = load_config(source)?;
    let client = make_client(source, &config)?;
    let pipeline = Pipeline::new(client.as_ref(), config);

    let request = PipelineRequest {
        symbol: source.symbol.clone(),
        timeframe: source.timeframe,
        start,
        end,
        raw_only,
    };

    let out = match pipeline.run(&request, cancel) {
        Ok(out) => out,
        Err(PipelineError::ValidationFailed(report)) => {
            eprintln!("{report}");
            bail!("raw validation failed; nothing was saved");
        }
        Err(e) => return Err(e.into()),
    };

    let summary = match &out.data {
        PipelineData::Raw(series) => {
            export::write_series(&path, series)?;
            SeriesSummary::of_series(series)
        }
        PipelineData::Derived(frame) => {
            export::write_frame(&path, frame)?;
            SeriesSummary::of_frame(frame)
        }
    };
    info!(path = %path.display(), "saved");

    if json {
        let doc = serde_json::json!({
            "output": path,
            "summary": summary,
            "collection": out.collection,
            "raw_validation": out.raw_report,
            "derived_validation": out.derived_report,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        println!("{summary}");
        println!(
            "  gaps:        {} ({} missing candles)",
            out.collection.gap_count(),
            out.collection.missing_candles
        );
        if let Some(derived) = &out.derived_report {
            print_warnings(derived);
        }
        println!("Saved to {}", path.display());
    }
    Ok(())
}

fn print_warnings(report: &ValidationReport) {
    for (rule, result) in report.failures(Severity::Warning) {
        println!("  warning:     {rule}: {}", result.detail);
    }
}

fn run_monthly(
    source: &SourceArgs,
    from: YearMonth,
    to: YearMonth,
    data_dir: PathBuf,
    no_csv: bool,
    no_parquet: bool,
    cancel: &CancelToken,
) -> Result<()> {
    if no_csv && no_parquet {
        bail!("--no-csv and --no-parquet together leave nothing to save");
    }
    if to < from {
        bail!("--to {to} is before --from {from}");
    }

    let config = load_config(source)?;
    let client = make_client(source, &config)?;
    let pipeline = Pipeline::new(client.as_ref(), config);
    let batch = MonthlyBatch::new(&pipeline, source.symbol.clone(), source.timeframe, data_dir)
        .with_formats(!no_csv, !no_parquet);

    let summary = batch.run(from, to, cancel);

    for record in &summary.succeeded {
        println!("{}: {} candles, {} gaps", record.month, record.candles, record.gaps);
        for file in &record.files {
            println!("  {}", file.display());
        }
    }
    for failure in &summary.failed {
        eprintln!("{}: FAILED: {}", failure.month, failure.error);
    }
    println!(
        "Succeeded: {} month(s), failed: {} month(s), location: {}",
        summary.success_count(),
        summary.failure_count(),
        batch.data_dir().display()
    );

    if summary.cancelled {
        bail!("monthly batch interrupted");
    }
    if summary.failure_count() > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn run_check(source: &SourceArgs, count: u32, cancel: &CancelToken) -> Result<()> {
    let config = load_config(source)?;
    let client = make_client(source, &config)?;
    let pipeline = Pipeline::new(client.as_ref(), config);

    let end = Utc::now();
    let start = check_window_start(end, source.timeframe, count)?;
    let request = PipelineRequest {
        symbol: source.symbol.clone(),
        timeframe: source.timeframe,
        start,
        end,
        raw_only: true,
    };

    println!("Connecting to {} for {} ...", client.name(), source.symbol);
    let out = pipeline
        .run(&request, cancel)
        .with_context(|| format!("connection check failed for {}", source.symbol))?;

    let series = out.data.series();
    let Some(latest) = series.last() else {
        bail!("exchange returned no candles");
    };
    println!("Received {} candle(s); latest:", series.len());
    println!("  time:   {}", latest.open_time.format(export::TIMESTAMP_FORMAT));
    println!("  open:   {:.2}", latest.open);
    println!("  high:   {:.2}", latest.high);
    println!("  low:    {:.2}", latest.low);
    println!("  close:  {:.2}", latest.close);
    println!("  volume: {:.4}", latest.volume);
    Ok(())
}

/// Open time `count` steps before `end`.
fn check_window_start(
    end: DateTime<Utc>,
    timeframe: Timeframe,
    count: u32,
) -> Result<DateTime<Utc>> {
    i32::try_from(count)
        .ok()
        .and_then(|n| timeframe.step().checked_mul(n))
        .and_then(|span| end.checked_sub_signed(span))
        .with_context(|| format!("--count {count} reaches before the representable time range"))
}

fn run_inspect(path: &Path, symbol: &str, timeframe: Timeframe) -> Result<()> {
    let series: Series = match ExportFormat::from_path(path)? {
        ExportFormat::Csv => export::read_series_csv(path, symbol, timeframe)?,
        ExportFormat::Parquet => export::read_series_parquet(path, symbol, timeframe)?,
    };

    let report = Validator::validate_raw(&series);
    println!("{}", SeriesSummary::of_series(&series));
    let gaps = series.gaps();
    println!(
        "  gaps:        {} ({} missing candles)",
        gaps.len(),
        gaps.iter().map(|g| g.missing).sum::<u64>()
    );
    println!();
    print!("{report}");

    if report.has_errors() {
        bail!("{} failed validation", path.display());
    }
    Ok(())
}
