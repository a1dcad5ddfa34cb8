use std::{
    num::NonZeroU32,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Parser;
use seq_read_bench::{
    config::{self, SweepConfig, DEFAULT_OUTPUT_FILE, DEFAULT_TEST_FILE},
    device::{IoMode, StdDevice},
    fixture,
    schedule::{ByteSize, ChunkSchedule},
    sweep::{Sweep, SweepReport},
    timing::MonotonicClock,
    BenchError, Result,
};
use tracing::{error, info};

#[derive(serde::Serialize, clap::Parser, Clone)]
struct Args {
    /// The pre-existing file every repetition reads.
    #[clap(long, default_value = DEFAULT_TEST_FILE)]
    test_file: PathBuf,
    /// Where the CSV results go. Truncated at start.
    #[clap(long, default_value = DEFAULT_OUTPUT_FILE)]
    output: PathBuf,
    #[clap(long, value_enum, default_value = "cached")]
    io_mode: IoMode,
    /// Also write the arguments and run totals as JSON.
    #[clap(long)]
    summary_json: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Clone, clap::Subcommand, serde::Serialize)]
enum Command {
    /// Sweep the chunk sizes of an experiment over the test file.
    Run {
        #[clap(subcommand)]
        experiment: Experiment,
    },
    /// Write a test file of the given size filled with random bytes.
    PrepareFixture { file_size: ByteSize },
}

#[derive(Clone, clap::Subcommand, serde::Serialize)]
enum Experiment {
    /// 1 MiB file; 100 B, 1 KiB and 64 KiB chunks.
    Small,
    /// 64 MiB file; 100 B, 1 KiB, then 8 KiB to 256 KiB in 8 KiB steps.
    Large,
    /// Any file size and chunk size schedule.
    Custom {
        file_size: ByteSize,
        /// e.g. `100,1k,8k..=256k:8k`
        schedule: ChunkSchedule,
        #[clap(long, default_value_t = config::DEFAULT_REPETITIONS)]
        repetitions: NonZeroU32,
    },
}

impl Experiment {
    fn config(&self, args: &Args) -> SweepConfig {
        let mut config = match self {
            Experiment::Small => SweepConfig::small(),
            Experiment::Large => SweepConfig::large(),
            Experiment::Custom {
                file_size,
                schedule,
                repetitions,
            } => {
                let mut config = SweepConfig::with_defaults(*file_size, schedule.clone());
                config.repetitions = *repetitions;
                config
            }
        };
        config.test_file = args.test_file.clone();
        config.output_file = args.output.clone();
        config
    }
}

#[derive(serde::Serialize)]
struct BenchmarkOutput<'a> {
    args: &'a Args,
    config: &'a SweepConfig,
    report: &'a SweepReport,
}

fn main() {
    tracing_subscriber::fmt()
        .with_file(true)
        .with_line_number(true)
        .with_env_filter({
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        })
        .init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let device = StdDevice::new(args.io_mode);
    match &args.command {
        Command::PrepareFixture { file_size } => {
            if args.io_mode == IoMode::Direct {
                config::check_direct_io_alignment(*file_size)?;
            }
            fixture::prepare(&device, &args.test_file, *file_size)?;
            info!("fixture written to {:?}", args.test_file);
        }
        Command::Run { experiment } => {
            let config = experiment.config(args);
            config.validate_for(args.io_mode)?;

            let clock = MonotonicClock::new();
            let report = Sweep::new(&device, &clock, &config).run()?;
            info!(
                "benchmark completed in {}, results saved to {:?}",
                humantime::format_duration(Duration::from_millis(
                    report.elapsed_us.as_millis() as u64
                )),
                config.output_file
            );

            if let Some(path) = &args.summary_json {
                write_summary(path, args, &config, &report)?;
            }
        }
    }
    Ok(())
}

fn write_summary(path: &Path, args: &Args, config: &SweepConfig, report: &SweepReport) -> Result<()> {
    let output = BenchmarkOutput {
        args,
        config,
        report,
    };
    info!("writing summary to {:?}", path);
    let json = serde_json::to_vec_pretty(&output).map_err(|e| BenchError::Summary {
        path: path.to_owned(),
        source: e.into(),
    })?;
    std::fs::write(path, json).map_err(|source| BenchError::Summary {
        path: path.to_owned(),
        source,
    })
}
