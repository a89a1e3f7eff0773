//! perf-runlevel CLI
//!
//! Builds a concurrency-aware CPU profile from a perf trace and prints the
//! per-process load histogram.

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use perf_runlevel::commands::{
    display_version, execute_profile, validate_args, validate_profile_file, OutputFormat,
    ProfileArgs, TraceSource,
};
use perf_runlevel::flamegraph::FlamegraphConfig;
use perf_runlevel::utils::config::{
    DEFAULT_PERF_BINARY, DEFAULT_PERF_INPUT, DEFAULT_SAMPLE_EVENT, DEFAULT_SWITCH_EVENT,
};

/// perf-runlevel - concurrency-aware profiles from perf traces
#[derive(Parser, Debug)]
#[command(name = "perf-runlevel")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a profile from a perf recording
    Profile {
        /// perf.data file to run through `perf script`
        #[arg(short, long, default_value = DEFAULT_PERF_INPUT, conflicts_with = "script")]
        input: PathBuf,

        /// Read already-rendered `perf script` text instead ("-" for stdin)
        #[arg(long)]
        script: Option<PathBuf>,

        /// Output path for the profile
        #[arg(short, long)]
        output: PathBuf,

        /// Process to profile (0 = the one with the most samples)
        #[arg(short, long, default_value = "0")]
        pid: u32,

        /// Rescale sample counts to real time
        #[arg(long, default_value = "true", action = ArgAction::Set)]
        realtime: bool,

        /// Include samples taken before the process became multithreaded
        #[arg(long, default_value = "true", action = ArgAction::Set)]
        init: bool,

        /// Only emit stacks observed at this run-level (0 = all)
        #[arg(long, visible_alias = "cpu", default_value = "0")]
        load: u32,

        /// Output format (default: inferred from the output extension)
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        /// Drop frames perf could not symbolize
        #[arg(long)]
        drop_unresolved: bool,

        /// Sampling event name
        #[arg(long, default_value = DEFAULT_SAMPLE_EVENT)]
        sample_event: String,

        /// Context switch event name
        #[arg(long, default_value = DEFAULT_SWITCH_EVENT)]
        switch_event: String,

        /// perf executable
        #[arg(long, env = "PERF_RUNLEVEL_PERF", default_value = DEFAULT_PERF_BINARY)]
        perf: String,

        /// Output path for SVG flamegraph (optional)
        #[arg(short, long)]
        flamegraph: Option<PathBuf>,

        /// Flamegraph title
        #[arg(long)]
        title: Option<String>,

        /// Flamegraph width in pixels
        #[arg(long, default_value = "1200")]
        width: usize,

        /// Command to open the profile with afterwards
        #[arg(long)]
        view: Option<String>,
    },

    /// Validate a profile JSON file
    Validate {
        /// Path to profile JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Profile {
            input,
            script,
            output,
            pid,
            realtime,
            init,
            load,
            format,
            drop_unresolved,
            sample_event,
            switch_event,
            perf,
            flamegraph,
            title,
            width,
            view,
        } => {
            let source = match script {
                Some(path) => TraceSource::script(path),
                None => TraceSource::PerfData(input),
            };

            // Create flamegraph config
            let flamegraph_config = flamegraph.as_ref().map(|_| {
                let config = FlamegraphConfig::new().with_width(width);
                match title {
                    Some(title) => config.with_title(title),
                    None => config,
                }
            });

            let args = ProfileArgs {
                source,
                output,
                format,
                pid: (pid != 0).then_some(pid),
                realtime,
                include_init: init,
                load_filter: (load != 0).then_some(load),
                drop_unresolved,
                sample_event,
                switch_event,
                perf_binary: perf,
                flamegraph,
                flamegraph_config,
                view,
            };

            // Validate args first
            validate_args(&args)?;

            execute_profile(args)?;
        }

        Commands::Validate { file } => {
            validate_profile_file(&file)?;
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
