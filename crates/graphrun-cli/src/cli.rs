use std::path::{Path, PathBuf};

use anyhow::{ensure, Result};
use clap::{Args, Parser, Subcommand};
use graphrun_core::ProfilingLevel;
use graphrun_iotensor::{InputDataType, ManifestOptions, OutputDataType};
use graphrun_runtime::{parse_op_packages, split_list, RunConfig, DEFAULT_OUTPUT_DIR};

#[derive(Parser, Debug)]
#[command(name = "graphrun", version, about = "Runs model graphs over batches of raw input tensors")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute every graph of a model over its input lists
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Model file handed to the backend
    #[arg(long, required_unless_present = "retrieve_context")]
    pub model: Option<PathBuf>,

    /// Execution backend
    #[arg(long, default_value = "onnx")]
    pub backend: String,

    /// Comma-separated input lists, one per graph
    #[arg(long)]
    pub input_list: String,

    /// Root directory for Result_<batch>/ folders
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// float or native
    #[arg(long, default_value = "float")]
    pub input_data_type: InputDataType,

    /// float_only, native_only or float_and_native
    #[arg(long, default_value = "float_only")]
    pub output_data_type: OutputDataType,

    /// off, basic or detailed
    #[arg(long, default_value = "off")]
    pub profiling_level: ProfilingLevel,

    /// Comma-separated op packages, each path:interface_provider[:target]
    #[arg(long)]
    pub op_packages: Option<String>,

    /// Log level (RUST_LOG)
    #[arg(long, default_value = "info")]
    pub log: String,

    /// Execute graphs without writing output tensors
    #[arg(long)]
    pub no_dump_outputs: bool,

    /// Accept input list lines with differing path counts
    #[arg(long)]
    pub allow_ragged_input_list: bool,

    /// Restore context and graphs from a cached binary instead of composing them
    #[arg(long, conflicts_with = "save_context")]
    pub retrieve_context: Option<PathBuf>,

    /// Save the finalized context as <output-dir>/<name>.bin
    #[arg(long)]
    pub save_context: Option<String>,
}

impl RunArgs {
    pub fn to_config(&self) -> Result<RunConfig> {
        let input_lists: Vec<PathBuf> = split_list(&self.input_list)
            .into_iter()
            .map(PathBuf::from)
            .collect();
        ensure!(!input_lists.is_empty(), "--input-list names no files");

        let op_packages = match &self.op_packages {
            Some(raw) => parse_op_packages(raw)?,
            None => Vec::new(),
        };

        Ok(RunConfig {
            input_lists,
            op_packages,
            output_dir: self.output_dir.clone(),
            input_data_type: self.input_data_type,
            output_data_type: self.output_data_type,
            profiling_level: self.profiling_level,
            dump_outputs: !self.no_dump_outputs,
            manifest: ManifestOptions {
                allow_ragged: self.allow_ragged_input_list,
            },
            cached_binary: self.retrieve_context.clone(),
            save_binary_name: self.save_context.clone(),
        })
    }

    /// The file the backend loads: the model, or the cached binary when no
    /// model is given.
    pub fn model_path(&self) -> Option<&Path> {
        self.model.as_deref().or(self.retrieve_context.as_deref())
    }
}
