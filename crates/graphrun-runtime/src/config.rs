use std::path::PathBuf;

use anyhow::Result;
use graphrun_core::{OpPackage, ProfilingLevel};
use graphrun_iotensor::{InputDataType, ManifestOptions, OutputDataType};

pub const DEFAULT_OUTPUT_DIR: &str = "./output/";

/// Everything a run needs besides the backend itself.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// One input list per graph, in graph order.
    pub input_lists: Vec<PathBuf>,
    pub op_packages: Vec<OpPackage>,
    pub output_dir: PathBuf,
    pub input_data_type: InputDataType,
    pub output_data_type: OutputDataType,
    pub profiling_level: ProfilingLevel,
    pub dump_outputs: bool,
    pub manifest: ManifestOptions,
    /// Restore context and graphs from this binary instead of composing them.
    pub cached_binary: Option<PathBuf>,
    /// Save the finalized context as `<output_dir>/<name>.bin`.
    pub save_binary_name: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input_lists: Vec::new(),
            op_packages: Vec::new(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            input_data_type: InputDataType::default(),
            output_data_type: OutputDataType::default(),
            profiling_level: ProfilingLevel::default(),
            dump_outputs: true,
            manifest: ManifestOptions::default(),
            cached_binary: None,
            save_binary_name: None,
        }
    }
}

impl RunConfig {
    pub fn saved_binary_path(&self) -> Option<PathBuf> {
        self.save_binary_name
            .as_ref()
            .map(|name| self.output_dir.join(format!("{name}.bin")))
    }
}

/// Splits a comma-separated argument, dropping empty entries.
pub fn split_list(raw: &str) -> Vec<&str> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect()
}

pub fn parse_op_packages(raw: &str) -> Result<Vec<OpPackage>> {
    split_list(raw).into_iter().map(OpPackage::parse).collect()
}
