//! Profile command implementation.
//!
//! The profile command:
//! 1. Streams the trace (perf script, a text file, or stdin) through ingest
//! 2. Selects the subject process and rescales its samples
//! 3. Writes the profile artifact (JSON or pprof)
//! 4. Prints the load histogram
//! 5. Optionally renders a flamegraph and opens a viewer

use super::models::{OutputFormat, ProfileArgs, TraceSource};
use crate::flamegraph::{collapsed_stacks, generate_flamegraph};
use crate::output::{write_pprof, write_profile, write_svg};
use crate::perf::{spawn_ingest, IngestOutcome, PerfScript};
use crate::profile::{finalize, Finalized};
use crate::utils::diagnostics::LogSink;
use crate::utils::error::CaptureError;
use anyhow::{Context, Result};
use log::{info, warn};
use std::fs::File;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

/// Execute the profile command
///
/// # Errors
/// * perf could not be started or its pipes set up
/// * The trace could not be read
/// * No process (or not the requested one) was sampled
/// * The artifact could not be written
pub fn execute_profile(args: ProfileArgs) -> Result<Finalized> {
    let start_time = Instant::now();

    info!("Step 1/4: Ingesting trace...");
    let outcome = ingest(&args)?;
    let IngestOutcome {
        snapshot,
        mut sink,
        lines,
    } = outcome;
    info!(
        "Read {} lines, {} processes, {} distinct stacks",
        lines,
        snapshot.processes().len(),
        snapshot.interner().stack_count()
    );

    info!("Step 2/4: Selecting subject and rescaling...");
    let finalized = finalize(&snapshot, &args.finalize_options(), &mut sink)
        .context("Failed to select subject process")?;
    if sink.reported() > 0 {
        warn!("{} diagnostics reported while profiling", sink.reported());
    }

    info!("Step 3/4: Writing profile...");
    match args.format() {
        OutputFormat::Json => write_profile(&finalized.profile, &args.output)
            .context("Failed to write profile JSON")?,
        OutputFormat::Pprof => write_pprof(&finalized.profile, &args.output)
            .context("Failed to write pprof profile")?,
    }
    info!("✓ Profile written to: {}", args.output.display());

    println!("{}", finalized.report.render());

    if let Some(svg_path) = &args.flamegraph {
        info!("Step 4/4: Generating flamegraph...");
        if let Err(e) = render_flamegraph(&finalized, &args, svg_path) {
            warn!("Flamegraph not written: {:#}", e);
        }
    } else {
        info!("Step 4/4: Skipping flamegraph generation (not requested)");
    }

    if let Some(viewer) = &args.view {
        open_viewer(viewer, &args.output);
    }

    let elapsed = start_time.elapsed();
    info!("Profile completed in {:.2}s", elapsed.as_secs_f64());

    Ok(finalized)
}

/// Run the reader/accounting pipeline over the configured source
fn ingest(args: &ProfileArgs) -> Result<IngestOutcome<LogSink>> {
    let options = args.ingest_options();

    match &args.source {
        TraceSource::PerfData(input) => {
            let mut perf = PerfScript::new(input)
                .binary(&args.perf_binary)
                .spawn()
                .context("Failed to launch perf script")?;
            let stdout = perf
                .take_stdout()
                .ok_or(CaptureError::PipeUnavailable("stdout"))?;
            let handle = spawn_ingest(stdout, options, LogSink::new())?;

            let exit = perf.wait().context("Failed to wait for perf script")?;
            if !exit.success() {
                warn!(
                    "perf script exited with {}; continuing with partial data\n{}",
                    exit.status,
                    exit.stderr.trim_end()
                );
            }
            Ok(handle.wait()?)
        }
        TraceSource::Script(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open trace {}", path.display()))?;
            Ok(spawn_ingest(file, options, LogSink::new())?.wait()?)
        }
        TraceSource::Stdin => Ok(spawn_ingest(std::io::stdin(), options, LogSink::new())?.wait()?),
    }
}

fn render_flamegraph(finalized: &Finalized, args: &ProfileArgs, svg_path: &Path) -> Result<()> {
    let stacks = collapsed_stacks(&finalized.profile);
    let svg = generate_flamegraph(&stacks, args.flamegraph_config.as_ref())
        .context("Failed to generate flamegraph")?;
    write_svg(&svg, svg_path).context("Failed to write flamegraph SVG")?;
    info!("✓ Flamegraph written to: {}", svg_path.display());
    Ok(())
}

/// Run `viewer <artifact>`; failure only warns
fn open_viewer(viewer: &str, artifact: &Path) {
    info!("Opening {} with {}", artifact.display(), viewer);
    match Command::new(viewer).arg(artifact).status() {
        Ok(status) if status.success() => {}
        Ok(status) => warn!("Viewer {} exited with {}", viewer, status),
        Err(e) => warn!("Failed to start viewer {}: {}", viewer, e),
    }
}

/// Validate profile arguments
///
/// Can be called before execute_profile for early validation.
pub fn validate_args(args: &ProfileArgs) -> Result<()> {
    if args.output.as_os_str().is_empty() {
        anyhow::bail!("Output path cannot be empty");
    }

    match &args.source {
        TraceSource::PerfData(input) | TraceSource::Script(input) => {
            if !input.exists() {
                anyhow::bail!("Trace input not found: {}", input.display());
            }
        }
        TraceSource::Stdin => {}
    }

    if matches!(args.source, TraceSource::PerfData(_)) && args.perf_binary.is_empty() {
        anyhow::bail!("perf binary cannot be empty");
    }

    for (flag, name) in [
        ("--sample-event", &args.sample_event),
        ("--switch-event", &args.switch_event),
    ] {
        if name.is_empty() || name.contains(char::is_whitespace) {
            anyhow::bail!("{} must be a single non-empty event name", flag);
        }
    }
    if args.sample_event == args.switch_event {
        anyhow::bail!("Sample and switch events must differ");
    }

    if let Some(svg_path) = &args.flamegraph {
        if svg_path == &args.output {
            anyhow::bail!("Flamegraph path must differ from the profile output path");
        }
    }

    if let Some(config) = &args.flamegraph_config {
        if config.width == 0 {
            anyhow::bail!("Flamegraph width must be greater than 0");
        }
    }

    Ok(())
}
