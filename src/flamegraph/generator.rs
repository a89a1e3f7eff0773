//! SVG flamegraph generation from the emitted profile.
//!
//! Each sample becomes one collapsed line, root first, so the synthetic
//! `LOAD <n>` frame forms the bottom row and splits the graph by run-level.

use crate::profile::Profile;
use crate::utils::error::FlamegraphError;
use inferno::flamegraph::{self, Options};
use log::{debug, info};

/// Flamegraph configuration
#[derive(Debug, Clone)]
pub struct FlamegraphConfig {
    pub title: String,
    pub width: usize,
    pub count_name: String,
}

impl Default for FlamegraphConfig {
    fn default() -> Self {
        Self {
            title: "CPU Profile by Run-Level".to_string(),
            width: 1200,
            count_name: "samples".to_string(),
        }
    }
}

impl FlamegraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }
}

/// One `a;b;c weight` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollapsedStack {
    pub stack: String,
    pub weight: u64,
}

impl CollapsedStack {
    pub fn to_line(&self) -> String {
        format!("{} {}", self.stack, self.weight)
    }
}

/// Collapse samples into root-first `;`-joined stacks.
///
/// `;` inside a symbol would split the frame, so it is replaced with `:`.
/// Samples with no weight are dropped.
pub fn collapsed_stacks(profile: &Profile) -> Vec<CollapsedStack> {
    profile
        .samples
        .iter()
        .filter_map(|sample| {
            let weight = u64::try_from(*sample.values.first()?).ok()?;
            if weight == 0 {
                return None;
            }
            let frames: Vec<String> = profile
                .sample_frames(sample)
                .into_iter()
                .rev()
                .map(|name| name.replace(';', ":"))
                .collect();
            Some(CollapsedStack {
                stack: frames.join(";"),
                weight,
            })
        })
        .collect()
}

/// Render collapsed stacks with inferno
pub fn generate_flamegraph(
    stacks: &[CollapsedStack],
    config: Option<&FlamegraphConfig>,
) -> Result<String, FlamegraphError> {
    if stacks.is_empty() {
        return Err(FlamegraphError::EmptyStacks);
    }

    let config = config.cloned().unwrap_or_default();
    info!("Generating flamegraph with {} stacks", stacks.len());

    let mut options = Options::default();
    options.title = config.title.clone();
    options.image_width = Some(config.width);
    options.count_name = config.count_name.clone();

    let lines: Vec<String> = stacks.iter().map(CollapsedStack::to_line).collect();
    let mut svg = Vec::new();
    flamegraph::from_lines(&mut options, lines.iter().map(String::as_str), &mut svg)
        .map_err(|e| FlamegraphError::Render(e.to_string()))?;

    let svg = String::from_utf8(svg)?;
    debug!("Flamegraph generated ({} bytes)", svg.len());
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Function, Location, ProfileSummary, Sample, ValueType};
    use pretty_assertions::assert_eq;

    fn profile() -> Profile {
        let function = |id: u64, name: &str| Function {
            id,
            name: name.to_string(),
        };
        let location = |id: u64| Location {
            id,
            address: id * 0x10,
            function_id: id,
        };
        Profile {
            version: "1.0.0".to_string(),
            generated_at: "2024-01-01T00:00:00+00:00".to_string(),
            summary: ProfileSummary {
                pid: 1,
                total_samples: 5,
                avg_load: 1.2,
                max_load: 2,
                rescaled: false,
            },
            period: 250_000,
            period_type: ValueType::new("cpu", "nanoseconds"),
            sample_types: vec![ValueType::new("samples", "count")],
            samples: vec![
                Sample {
                    values: vec![4, 1_000_000],
                    location_ids: vec![1, 2, 3],
                    run_level: 1,
                },
                Sample {
                    values: vec![1, 250_000],
                    location_ids: vec![4, 2, 5],
                    run_level: 2,
                },
                Sample {
                    values: vec![0, 0],
                    location_ids: vec![1, 2, 3],
                    run_level: 1,
                },
            ],
            locations: (1..=5).map(location).collect(),
            functions: vec![
                function(1, "hot"),
                function(2, "main"),
                function(3, "LOAD 1"),
                function(4, "std::vec;push"),
                function(5, "LOAD 2"),
            ],
        }
    }

    #[test]
    fn test_collapsed_stacks_are_root_first() {
        let stacks = collapsed_stacks(&profile());
        assert_eq!(
            stacks,
            vec![
                CollapsedStack {
                    stack: "LOAD 1;main;hot".to_string(),
                    weight: 4,
                },
                CollapsedStack {
                    stack: "LOAD 2;main;std::vec:push".to_string(),
                    weight: 1,
                },
            ]
        );
        assert_eq!(stacks[0].to_line(), "LOAD 1;main;hot 4");
    }

    #[test]
    fn test_generate_flamegraph_svg() {
        let stacks = collapsed_stacks(&profile());
        let config = FlamegraphConfig::new().with_title("run-levels").with_width(800);
        let svg = generate_flamegraph(&stacks, Some(&config)).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("run-levels"));
        assert!(svg.contains("LOAD 1"));
    }

    #[test]
    fn test_empty_stacks_rejected() {
        assert!(matches!(
            generate_flamegraph(&[], None),
            Err(FlamegraphError::EmptyStacks)
        ));
    }

    #[test]
    fn test_zero_weight_stacks_fail_to_render() {
        let stacks = vec![CollapsedStack {
            stack: "LOAD 1;main".to_string(),
            weight: 0,
        }];
        match generate_flamegraph(&stacks, None) {
            Err(FlamegraphError::Render(msg)) => assert!(msg.contains("No stack counts found")),
            other => panic!("expected render error, got {:?}", other.map(|svg| svg.len())),
        }
    }
}
