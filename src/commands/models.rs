use crate::aggregator::IngestOptions;
use crate::flamegraph::FlamegraphConfig;
use crate::profile::FinalizeOptions;
use crate::utils::config::{
    DEFAULT_PERF_BINARY, DEFAULT_PERF_INPUT, DEFAULT_SAMPLE_EVENT, DEFAULT_SWITCH_EVENT,
    SAMPLE_PERIOD_NS,
};
use clap::ValueEnum;
use std::path::{Path, PathBuf};

/// Where the trace text comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceSource {
    /// A `perf.data` file, rendered through `perf script`
    PerfData(PathBuf),
    /// Already-rendered `perf script` text
    Script(PathBuf),
    Stdin,
}

impl TraceSource {
    /// `-` means stdin
    pub fn script(path: PathBuf) -> Self {
        if path.as_os_str() == "-" {
            TraceSource::Stdin
        } else {
            TraceSource::Script(path)
        }
    }
}

/// Artifact encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pprof,
}

impl OutputFormat {
    /// `.pb.gz` and `.pprof` mean pprof, anything else JSON
    pub fn infer(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if name.ends_with(".pb.gz") || name.ends_with(".pprof") {
            OutputFormat::Pprof
        } else {
            OutputFormat::Json
        }
    }
}

/// Arguments for the profile command
#[derive(Debug, Clone)]
pub struct ProfileArgs {
    pub source: TraceSource,

    /// Output path for the profile artifact
    pub output: PathBuf,

    /// `None` infers from the output extension
    pub format: Option<OutputFormat>,

    /// Subject process; `None` picks the busiest
    pub pid: Option<u32>,

    /// Rescale counts to real time
    pub realtime: bool,

    /// Account samples taken before the process became multithreaded
    pub include_init: bool,

    /// Only emit stacks observed at this run-level
    pub load_filter: Option<u32>,

    pub drop_unresolved: bool,
    pub sample_event: String,
    pub switch_event: String,

    /// `perf` executable used for `TraceSource::PerfData`
    pub perf_binary: String,

    /// Output path for SVG flamegraph (optional)
    pub flamegraph: Option<PathBuf>,
    pub flamegraph_config: Option<FlamegraphConfig>,

    /// External viewer run with the artifact path
    pub view: Option<String>,
}

impl Default for ProfileArgs {
    fn default() -> Self {
        Self {
            source: TraceSource::PerfData(PathBuf::from(DEFAULT_PERF_INPUT)),
            output: PathBuf::from("profile.json"),
            format: None,
            pid: None,
            realtime: true,
            include_init: true,
            load_filter: None,
            drop_unresolved: false,
            sample_event: DEFAULT_SAMPLE_EVENT.to_string(),
            switch_event: DEFAULT_SWITCH_EVENT.to_string(),
            perf_binary: DEFAULT_PERF_BINARY.to_string(),
            flamegraph: None,
            flamegraph_config: None,
            view: None,
        }
    }
}

impl ProfileArgs {
    pub fn format(&self) -> OutputFormat {
        self.format.unwrap_or_else(|| OutputFormat::infer(&self.output))
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            target_pid: self.pid,
            include_init: self.include_init,
            drop_unresolved: self.drop_unresolved,
            switch_event: self.switch_event.clone(),
            sample_event: self.sample_event.clone(),
        }
    }

    pub fn finalize_options(&self) -> FinalizeOptions {
        FinalizeOptions {
            target_pid: self.pid,
            realtime: self.realtime,
            load_filter: self.load_filter,
            period: SAMPLE_PERIOD_NS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_inference() {
        assert_eq!(OutputFormat::infer(Path::new("out.pb.gz")), OutputFormat::Pprof);
        assert_eq!(OutputFormat::infer(Path::new("out.PPROF")), OutputFormat::Pprof);
        assert_eq!(OutputFormat::infer(Path::new("out.json")), OutputFormat::Json);
        assert_eq!(OutputFormat::infer(Path::new("out.gz")), OutputFormat::Json);
    }

    #[test]
    fn test_explicit_format_wins() {
        let args = ProfileArgs {
            output: PathBuf::from("profile.pb.gz"),
            format: Some(OutputFormat::Json),
            ..Default::default()
        };
        assert_eq!(args.format(), OutputFormat::Json);
    }

    #[test]
    fn test_dash_is_stdin() {
        assert_eq!(TraceSource::script(PathBuf::from("-")), TraceSource::Stdin);
        assert_eq!(
            TraceSource::script(PathBuf::from("t.txt")),
            TraceSource::Script(PathBuf::from("t.txt"))
        );
    }

    #[test]
    fn test_options_carry_pid() {
        let args = ProfileArgs {
            pid: Some(7),
            realtime: false,
            ..Default::default()
        };
        assert_eq!(args.ingest_options().target_pid, Some(7));
        let finalize = args.finalize_options();
        assert_eq!(finalize.target_pid, Some(7));
        assert!(!finalize.realtime);
    }
}
