use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use utils::version;

use crate::backend::LibraryConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One `label value` line per property
    #[default]
    Text,
    /// A single JSON array
    Json,
}

/// Show CUDA device properties and NVML utilization
#[derive(Debug, Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, help = "Output format")]
    pub format: OutputFormat,

    #[arg(long, help = "Only report the device with this index")]
    pub device: Option<usize>,

    #[arg(
        long,
        help = "Path to the CUDA runtime library",
        env = "GPU_QUERY_CUDA_LIB_PATH",
        value_hint = clap::ValueHint::FilePath
    )]
    pub cuda_lib_path: Option<PathBuf>,

    #[arg(
        long,
        help = "Path to the NVML library",
        env = "GPU_QUERY_NVML_LIB_PATH",
        value_hint = clap::ValueHint::FilePath
    )]
    pub nvml_lib_path: Option<PathBuf>,
}

impl From<&Cli> for LibraryConfig {
    fn from(cli: &Cli) -> Self {
        Self {
            cuda_lib_path: cli.cuda_lib_path.clone(),
            nvml_lib_path: cli.nvml_lib_path.clone(),
        }
    }
}
