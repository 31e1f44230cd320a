//! Folio CLI - Command line interface for stored portfolio analytics.
//!
//! Every command prints a JSON `ApiResponse` on stdout; logs go to stderr.

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use folio_core::{
    portfolio::PNL_TOTAL_COLUMN, store::read_frame, AnalyticsConfig, ApiResponse,
    AttributionMetric, PortfolioData, PortfolioStore, TableView, TimePeriod,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Folio CLI - portfolio accounting and attribution")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $FOLIO_CONFIG or ~/.folio/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Portfolio directory (overrides the config)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PortfolioArgs {
    /// Ticker the portfolio was saved under
    #[arg(short, long)]
    ticker: String,
    /// First date of the window (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Last date of the window (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,
}

impl PortfolioArgs {
    fn time_period(&self) -> Option<TimePeriod> {
        (self.start.is_some() || self.end.is_some()).then_some(TimePeriod {
            start: self.start,
            end: self.end,
        })
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum View {
    ByInstrument,
    Grouped,
    Aggregate,
}

impl From<View> for TableView {
    fn from(view: View) -> Self {
        match view {
            View::ByInstrument => TableView::ByInstrument,
            View::Grouped => TableView::Grouped,
            View::Aggregate => TableView::Aggregate,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List stored portfolios
    List,
    /// Headline performance statistics
    Summary {
        #[command(flatten)]
        portfolio: PortfolioArgs,
    },
    /// Average-cost realized and mark-to-market P&L
    Pnl {
        #[command(flatten)]
        portfolio: PortfolioArgs,
        /// Add group navs and cumulative P&L by direction
        #[arg(long)]
        grouped: bool,
    },
    /// Rolling turnover
    Turnover {
        #[command(flatten)]
        portfolio: PortfolioArgs,
        #[arg(long, value_enum, default_value = "by-instrument")]
        view: View,
    },
    /// Rolling trading costs as a fraction of nav
    Costs {
        #[command(flatten)]
        portfolio: PortfolioArgs,
        #[arg(long, value_enum, default_value = "by-instrument")]
        view: View,
    },
    /// Instrument or group exposures
    Exposures {
        #[command(flatten)]
        portfolio: PortfolioArgs,
        /// Aggregate by group
        #[arg(long)]
        grouped: bool,
    },
    /// Held or target weights sampled at the configured frequency
    Weights {
        #[command(flatten)]
        portfolio: PortfolioArgs,
        /// Report the target weights fed into the simulation
        #[arg(long)]
        input: bool,
    },
    /// Periodic instrument returns and their attribution
    Returns {
        #[command(flatten)]
        portfolio: PortfolioArgs,
    },
    /// Share of market cap held or volume traded at the configured trade level
    Participation {
        #[command(flatten)]
        portfolio: PortfolioArgs,
        /// CSV of market caps (date column first)
        #[arg(long, conflicts_with = "volumes", required_unless_present = "volumes")]
        mcap: Option<PathBuf>,
        /// CSV of traded volumes (date column first)
        #[arg(long)]
        volumes: Option<PathBuf>,
    },
    /// Instrument attribution
    Attribution {
        #[command(flatten)]
        portfolio: PortfolioArgs,
        /// pnl, pnl_risk or inst_pnl
        #[arg(short, long, default_value = "pnl")]
        metric: String,
    },
    /// Portfolio betas to benchmarks
    Betas {
        #[command(flatten)]
        portfolio: PortfolioArgs,
        /// CSV of benchmark prices (date column first)
        #[arg(short, long)]
        benchmarks: PathBuf,
    },
    /// Cumulative attribution of returns to benchmarks
    BenchmarkAttribution {
        #[command(flatten)]
        portfolio: PortfolioArgs,
        /// CSV of benchmark prices (date column first)
        #[arg(short, long)]
        benchmarks: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AnalyticsConfig::load_from_path(path),
        None => AnalyticsConfig::load(),
    }
    .context("loading config")?;
    let store = match &cli.data_dir {
        Some(dir) => PortfolioStore::new(dir),
        None => PortfolioStore::from_config(&config),
    };
    debug!(root = %store.root().display(), "using portfolio store");

    let response = match run(cli.command, &config, &store) {
        Ok(data) => ApiResponse::ok(data),
        Err(e) => ApiResponse::err(e.to_string()),
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn run(
    command: Commands,
    config: &AnalyticsConfig,
    store: &PortfolioStore,
) -> folio_core::Result<Value> {
    let load = |args: &PortfolioArgs| -> folio_core::Result<(PortfolioData, Option<TimePeriod>)> {
        Ok((store.load(&args.ticker)?, args.time_period()))
    };

    let data = match command {
        Commands::List => json!({ "tickers": store.tickers()? }),
        Commands::Summary { portfolio } => {
            let (data, period) = load(&portfolio)?;
            let summary = data.get_performance_summary(
                period.as_ref(),
                config.periods_per_year,
                config.risk_free_rate,
            )?;
            json!({
                "summary": summary,
                "num_investable_instruments": data
                    .get_num_investable_instruments(period.as_ref())
                    .last()
                    .map(|(_, n)| n),
            })
        }
        Commands::Pnl { portfolio, grouped } => {
            let (data, period) = load(&portfolio)?;
            let pnl = data.compute_realized_pnl(period.as_ref())?;
            let mut out = json!({
                "realized_pnl": pnl,
                "attribution": data.get_performance_attribution(true, period.as_ref(), false)?,
                "total_column": PNL_TOTAL_COLUMN,
            });
            if grouped {
                out["group_navs"] = json!(data.get_group_navs(period.as_ref(), false)?);
                out["by_direction"] = json!(data.get_grouped_cum_pnls(period.as_ref())?);
            }
            out
        }
        Commands::Turnover { portfolio, view } => {
            let (data, period) = load(&portfolio)?;
            let mut params = config.turnover_params(view.into());
            params.time_period = period;
            json!({ "turnover": data.get_turnover(&params)? })
        }
        Commands::Costs { portfolio, view } => {
            let (data, period) = load(&portfolio)?;
            let mut params = config.cost_params(view.into());
            params.time_period = period;
            json!({ "costs": data.get_costs(&params)? })
        }
        Commands::Exposures { portfolio, grouped } => {
            let (data, period) = load(&portfolio)?;
            let exposures = data.get_exposures(period.as_ref(), grouped, true);
            if grouped {
                json!({
                    "exposures": exposures,
                    "by_direction": data.get_grouped_exposures(period.as_ref())?,
                })
            } else {
                json!({ "exposures": exposures })
            }
        }
        Commands::Weights { portfolio, input } => {
            let (data, period) = load(&portfolio)?;
            json!({
                "freq": config.weights_freq,
                "weights": data.get_weights(input, None, period.as_ref(), Some(config.weights_freq))?,
            })
        }
        Commands::Returns { portfolio } => {
            let (data, period) = load(&portfolio)?;
            let freq = config.periodic_freq;
            json!({
                "freq": freq,
                "returns": data.get_instruments_periodic_returns(period.as_ref(), freq),
                "attribution": data.get_attribution_table_by_instrument(period.as_ref(), freq)?,
                "performance": data.get_instruments_performance_table(period.as_ref()),
            })
        }
        Commands::Participation {
            portfolio,
            mcap,
            volumes,
        } => {
            let (data, period) = load(&portfolio)?;
            let participation = match (mcap, volumes) {
                (Some(mcap), _) => {
                    data.compute_mcap_participation(&read_frame(&mcap)?, config.trade_level)?
                }
                (None, Some(volumes)) => data.compute_volume_participation(
                    &read_frame(&volumes)?,
                    config.trade_level,
                    Some(config.turnover_roll_period),
                )?,
                (None, None) => {
                    return Err(folio_core::Error::MissingData(
                        "market caps or volumes are required".to_string(),
                    ))
                }
            };
            let participation = match &period {
                Some(period) => participation.locate(period),
                None => participation,
            };
            json!({ "trade_level": config.trade_level, "participation": participation })
        }
        Commands::Attribution { portfolio, metric } => {
            let metric: AttributionMetric = metric.parse()?;
            let (data, period) = load(&portfolio)?;
            json!({
                "metric": metric,
                "title": metric.title(),
                "data": data.get_performance_data(metric, period.as_ref())?,
            })
        }
        Commands::Betas {
            portfolio,
            benchmarks,
        } => {
            let (data, period) = load(&portfolio)?;
            let benchmarks = read_frame(&benchmarks)?;
            json!({
                "betas": data.compute_portfolio_benchmark_betas(
                    &benchmarks,
                    period.as_ref(),
                    None,
                    config.beta_span,
                )?,
            })
        }
        Commands::BenchmarkAttribution {
            portfolio,
            benchmarks,
        } => {
            let (data, period) = load(&portfolio)?;
            let benchmarks = read_frame(&benchmarks)?;
            json!({
                "attribution": data.compute_portfolio_benchmark_attribution(
                    &benchmarks,
                    period.as_ref(),
                    Some(config.attribution_freq),
                    config.attribution_span,
                )?,
            })
        }
    };
    Ok(data)
}
