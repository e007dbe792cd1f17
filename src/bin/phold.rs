use anyhow::Context;
use clap::Parser;
use phold::ConfigBuilder;
use phold::PartitionStrategy;

/// Parallel Hold (PHOLD) discrete-event simulation benchmark.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Number of logical processes.
    #[arg(long, default_value_t = 16)]
    number: u64,

    /// Initial events emitted per LP.
    #[arg(long, default_value_t = 4)]
    events: u64,

    /// Probability that a generated event targets a remote LP.
    #[arg(long, default_value_t = 0.5)]
    remote: f64,

    /// Minimum cross-LP lookahead, in ticks.
    #[arg(long, default_value_t = 1)]
    minimum: u64,

    /// Mean of the exponential delay component, in ticks.
    #[arg(long, default_value_t = 9.0)]
    average: f64,

    /// Virtual time at which the run ends.
    #[arg(long, default_value_t = 1_000_000)]
    stop: u64,

    /// Opaque payload size carried by each PHOLD event.
    #[arg(long, default_value_t = 0)]
    buffer_bytes: usize,

    /// Record the delay histogram.
    #[arg(long, default_value_t = false)]
    delays_out: bool,

    /// Number of scheduler partitions (worker threads).
    #[arg(long, default_value_t = 1)]
    partitions: usize,

    /// Partition assignment strategy: "block" or "round-robin".
    #[arg(long, default_value = "block")]
    partition_strategy: String,

    /// Verbosity: 0 = warn, 1 = info, 2 = debug, 3+ = trace.
    #[arg(short, long, default_value_t = 0)]
    verbosity: u8,

    /// Emit the run report as JSON instead of a human-readable summary.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn parse_partition_strategy(s: &str) -> anyhow::Result<PartitionStrategy> {
    match s {
        "block" => Ok(PartitionStrategy::Block),
        "round-robin" | "roundrobin" => Ok(PartitionStrategy::RoundRobin),
        other => anyhow::bail!("unknown partition strategy '{other}', expected block or round-robin"),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    phold::logging::init(args.verbosity);

    let partition_strategy = parse_partition_strategy(&args.partition_strategy)?;

    let cfg = ConfigBuilder::new()
        .number(args.number)
        .events(args.events)
        .remote(args.remote)
        .minimum(args.minimum)
        .average(args.average)
        .stop(args.stop)
        .buffer_bytes(args.buffer_bytes)
        .delays_out(args.delays_out)
        .verbosity(args.verbosity)
        .partitions(args.partitions)
        .partition_strategy(partition_strategy)
        .build();

    let cfg = match cfg {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(e.exit_code());
        }
    };

    let report = phold::run(&cfg);
    match report {
        Ok(report) => {
            if args.json {
                let json = serde_json::to_string_pretty(&report).context("serializing report")?;
                println!("{json}");
            } else {
                println!(
                    "send_total={} recv_total={} error={}",
                    report.send_total, report.recv_total, report.error
                );
                println!(
                    "duty_factor={:.4} expected_events={:.1}",
                    report.config_echo.duty_factor, report.config_echo.expected_events
                );
                if let Some(min_events) = report.config_echo.min_events_recommendation {
                    println!("warning: consider --events {min_events} for a representative run");
                }
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(e.exit_code());
        }
    }
}
