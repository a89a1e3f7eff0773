use crate::output::read_profile;
use crate::utils::config::SCHEMA_VERSION;
use anyhow::{Context, Result};
use std::path::Path;

/// Validate a profile JSON file and print its summary
pub fn validate_profile_file(file_path: &Path) -> Result<()> {
    println!("Validating profile: {}", file_path.display());

    let profile = read_profile(file_path)
        .with_context(|| format!("Not a valid profile: {}", file_path.display()))?;

    if profile.version != SCHEMA_VERSION {
        log::warn!(
            "Profile schema v{} differs from current v{}",
            profile.version,
            SCHEMA_VERSION
        );
    }

    println!("✓ Valid profile JSON");
    println!("  Version: {}", profile.version);
    println!("  Generated: {}", profile.generated_at);
    println!("  Process: {}", profile.summary.pid);
    println!("  Samples: {}", profile.summary.total_samples);
    println!(
        "  Load: avg {:.1}, max {}{}",
        profile.summary.avg_load,
        profile.summary.max_load,
        if profile.summary.rescaled { " (rescaled)" } else { "" }
    );
    println!("  Stacks: {}", profile.samples.len());
    println!("  Functions: {}", profile.functions.len());

    Ok(())
}

/// Display version information
pub fn display_version() {
    println!("perf-runlevel v{}", env!("CARGO_PKG_VERSION"));
    println!("Profile Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("A concurrency-aware CPU profiler for perf traces.");
}
