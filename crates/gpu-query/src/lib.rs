//! CUDA device inventory and NVML utilization queries.
//!
//! Both vendor libraries are loaded at run time; on hosts without them the
//! inventory is simply empty and utilization is unavailable.

mod backend;
pub mod config;
pub mod cudart;
mod error;
mod inventory;
pub mod loader;
#[cfg(test)]
mod mock;
pub mod nvml;
mod query;
pub mod report;
mod types;
mod utilization;

pub use backend::{Backend, LibraryConfig, NativeBackend};
pub use error::Error;
pub use inventory::{DeviceInventory, MIN_CUDA_RUNTIME_VERSION};
pub use query::{global, DeviceQuery};
pub use types::{DeviceProperties, Scalar, UtilizationSample};
