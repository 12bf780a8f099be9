use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use pxstat::life_table::Vintage;
use pxstat::{
    CacheBackend, CpiOptions, LifeTableOptions, LiveRegisterOptions, Session, SessionConfig, Table,
    periods, storage, toc,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "pxstat",
    version,
    about = "Fetch CSO PxStat tables (CPI, Live Register, life tables, ...) as CSV or JSON"
)]
struct Cli {
    #[command(flatten)]
    session: SessionArgs,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// JSON config file (see SessionConfig); PXSTAT_* variables apply otherwise.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Skip TLS certificate verification (e.g. behind a corporate proxy).
    #[arg(long, global = true, default_value_t = false)]
    no_verify_tls: bool,
    /// Directory for the on-disk response cache.
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,
    /// Always hit the network.
    #[arg(long, global = true, default_value_t = false)]
    no_cache: bool,
    /// Seconds a cached response stays fresh.
    #[arg(long, global = true)]
    expire_after: Option<u64>,
}

#[derive(Args, Debug)]
struct Output {
    /// Save results to file (format inferred by --format or extension). Prints CSV otherwise.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Output format (csv or json). If omitted, inferred from --out extension.
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
    /// Append units to CSV column headers.
    #[arg(long, default_value_t = false)]
    units: bool,
}

#[derive(ValueEnum, Clone, Debug)]
enum OutFormat {
    Csv,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available tables.
    Toc {
        /// Only tables whose name contains this text.
        #[arg(long)]
        search: Option<String>,
        #[command(flatten)]
        output: Output,
    },
    /// Fetch any table by id (e.g. VSA32).
    Table {
        id: String,
        #[command(flatten)]
        output: Output,
    },
    /// Monthly Consumer Price Index (CPM01).
    Cpi {
        /// Commodity groups separated by comma or semicolon.
        #[arg(long, default_value = "All items")]
        groups: String,
        #[arg(long, default_value = pxstat::cpi::DEFAULT_STATISTIC)]
        statistic: String,
        /// First month to keep (YYYY-MM).
        #[arg(long)]
        start: Option<String>,
        /// Keep raw index values instead of re-basing to the latest month.
        #[arg(long, default_value_t = false)]
        raw: bool,
        /// Value the latest month is re-based to.
        #[arg(long, default_value_t = 1.0)]
        scale: f64,
        #[command(flatten)]
        output: Output,
    },
    /// Live Register (LRM02) with reference and extract dates.
    LiveRegister {
        /// First month to keep (YYYY-MM or YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,
        /// Last month to keep (YYYY-MM or YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,
        #[arg(long, default_value = "All ages")]
        age_groups: String,
        #[arg(long, default_value = "Both sexes")]
        sexes: String,
        #[command(flatten)]
        output: Output,
    },
    /// Period life table (VSA32).
    LifeTable {
        /// most_recent, all, or a year.
        #[arg(long, default_value = "most_recent")]
        vintage: String,
        /// Statistics separated by comma or semicolon (default: all).
        #[arg(long)]
        statistics: Option<String>,
        #[command(flatten)]
        output: Output,
    },
    /// Delete cached responses.
    ClearCache,
}

fn parse_list(s: &str) -> Vec<String> {
    s.split([',', ';'])
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| periods::parse_month(s))
        .ok_or_else(|| anyhow::anyhow!("invalid date `{s}`, expected YYYY-MM or YYYY-MM-DD"))
}

fn build_session(args: &SessionArgs) -> Result<Session> {
    let mut cfg = match &args.config {
        Some(p) => SessionConfig::from_json_file(p)?,
        None => SessionConfig::from_env()?,
    };
    if args.no_verify_tls {
        cfg.request.verify_tls = false;
    }
    if let Some(dir) = &args.cache_dir {
        cfg.cache.backend = CacheBackend::File {
            path: Some(dir.clone()),
        };
    }
    if args.no_cache {
        cfg.cache.backend = CacheBackend::Disabled;
    }
    if let Some(secs) = args.expire_after {
        cfg.cache.expire_after = Some(Duration::from_secs(secs));
    }
    log::debug!("session config: {cfg:?}");
    Ok(Session::new(cfg)?)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let session = build_session(&cli.session)?;
    match cli.cmd {
        Command::Toc { search, output } => {
            let all = session.get_toc().context("fetch table of contents (retry on timeout)")?;
            let picked: Vec<_> = match &search {
                Some(needle) => toc::search(&all, needle).into_iter().cloned().collect(),
                None => all,
            };
            match (&output.out, output.format) {
                (Some(path), fmt) if is_json(path, fmt.as_ref()) => storage::save_json(&picked, path)?,
                (Some(path), _) => {
                    let f = std::fs::File::create(path)
                        .with_context(|| format!("create {}", path.display()))?;
                    storage::write_toc_csv(&picked, f)?;
                }
                (None, Some(OutFormat::Json)) => {
                    println!("{}", serde_json::to_string_pretty(&picked)?)
                }
                (None, _) => storage::write_toc_csv(&picked, std::io::stdout().lock())?,
            }
            eprintln!("{} tables", picked.len());
        }
        Command::Table { id, output } => {
            let table = session.get_table(&id)?;
            emit(&table, &output)?;
        }
        Command::Cpi {
            groups,
            statistic,
            start,
            raw,
            scale,
            output,
        } => {
            let opts = CpiOptions {
                commodity_groups: parse_list(&groups),
                statistic,
                start_month: start.as_deref().map(parse_date).transpose()?,
                normalize_to_most_recent: !raw,
                scale,
            };
            let cpi = session.monthly_cpi(&opts)?;
            emit(&cpi.to_table(), &output)?;
        }
        Command::LiveRegister {
            start,
            end,
            age_groups,
            sexes,
            output,
        } => {
            let opts = LiveRegisterOptions {
                start: start.as_deref().map(parse_date).transpose()?,
                end: end.as_deref().map(parse_date).transpose()?,
                age_groups: parse_list(&age_groups),
                sexes: parse_list(&sexes),
            };
            let lr = session.live_register(&opts)?;
            emit(&lr.to_table(), &output)?;
        }
        Command::LifeTable {
            vintage,
            statistics,
            output,
        } => {
            let opts = LifeTableOptions {
                vintage: vintage.parse::<Vintage>()?,
                statistics: statistics.as_deref().map(parse_list),
            };
            let lt = session.life_table(&opts)?;
            emit(&lt.to_table(), &output)?;
        }
        Command::ClearCache => {
            session.clear_cache()?;
            eprintln!("Cache cleared");
        }
    }
    Ok(())
}

fn is_json(path: &std::path::Path, fmt: Option<&OutFormat>) -> bool {
    match fmt {
        Some(OutFormat::Json) => true,
        Some(OutFormat::Csv) => false,
        None => path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json")),
    }
}

fn emit(table: &Table, output: &Output) -> Result<()> {
    match &output.out {
        Some(path) => {
            if is_json(path, output.format.as_ref()) {
                storage::save_json(table, path)?;
            } else {
                storage::save_table_csv(table, path, output.units)?;
            }
            eprintln!("Saved {} rows to {}", table.len(), path.display());
        }
        None => match output.format {
            Some(OutFormat::Json) => println!("{}", serde_json::to_string_pretty(table)?),
            _ => storage::write_table_csv(table, std::io::stdout().lock(), output.units)?,
        },
    }
    Ok(())
}
