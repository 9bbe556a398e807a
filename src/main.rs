use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use cwrelay::collector::Collector;
use cwrelay::config::{parse_proxy_addr, Config};
use cwrelay::provider::cloudwatch::CloudWatchProvider;
use cwrelay::rule::SourceDirective;
use cwrelay::sink::{DryRunSink, ProxySink};
use cwrelay::transform::MetricTransformer;
use cwrelay::window::WindowManager;

/// CloudWatch metric relay agent.
#[derive(Parser)]
#[command(name = "cwrelay", about)]
struct Cli {
    /// Logging verbosity level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll CloudWatch statistics and push them to the proxy.
    Collect(CollectArgs),

    /// Print version information and exit.
    Version,
}

#[derive(Args)]
struct CollectArgs {
    /// Path to the JSON configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Proxy address as host or host:port (port defaults to 2878).
    #[arg(long, default_value = "127.0.0.1:2878")]
    proxy: String,

    /// Print the would-be proxy lines instead of sending them.
    #[arg(long)]
    dry_run: bool,

    /// Drop the statistic suffix when a rule requests a single statistic.
    #[arg(long)]
    no_suffix_for_single: bool,

    /// Prefix added to every output metric name.
    #[arg(long, default_value = "")]
    prefix: String,

    /// Minutes of history to request when no watermark is persisted.
    #[arg(long, default_value_t = 5)]
    lookback_minutes: i64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Version = &cli.command {
        println!("cwrelay {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Initialize tracing.
    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;

    fmt().with_env_filter(filter).with_target(true).init();

    // Build and run the tokio runtime.
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    match cli.command {
        Command::Collect(args) => rt.block_on(collect(args)),
        Command::Version => unreachable!("handled above"),
    }
}

async fn collect(args: CollectArgs) -> Result<()> {
    let cfg = Config::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;

    let (host, port) = parse_proxy_addr(&args.proxy)?;

    let transformer = MetricTransformer::new(
        cfg.rule_set()?,
        SourceDirective::default_chain(),
        args.prefix,
        args.no_suffix_for_single,
    );

    let provider = CloudWatchProvider::from_env().await;
    let collector = Collector::new(
        provider,
        transformer,
        WindowManager::new(&args.config),
        args.lookback_minutes,
    );

    if args.dry_run {
        let mut sink = DryRunSink::new(&host, port);
        collector.run(&mut sink, cfg.watermark()).await?;
    } else {
        let mut sink = ProxySink::connect(&host, port).await?;
        let outcome = collector.run(&mut sink, cfg.watermark()).await;

        // Release the connection on every exit path before surfacing
        // the run outcome.
        let closed = sink.shutdown().await;
        outcome?;
        closed?;
    }

    Ok(())
}
