use std::path::PathBuf;

use crate::cudart::{CudaRuntime, NativeCudaRuntime};
use crate::loader::{self, LibrarySource};
use crate::nvml::{ManagementLibrary, NativeNvml};

const CUDA_RUNTIME_LIB: &str = "libcudart";
const NVML_LIB: &str = "libnvidia-ml";
const NVML_FALLBACK_LIB: &str = "libnvidia-ml.so.1";

/// Loads the vendor libraries a [`DeviceQuery`](crate::DeviceQuery) talks to.
///
/// Returning `None` means the library is not available on this host.
pub trait Backend {
    type Cuda: CudaRuntime;
    type Nvml: ManagementLibrary;

    fn load_cuda_runtime(&self) -> Option<Self::Cuda>;

    fn load_management_library(&self) -> Option<Self::Nvml>;
}

/// Explicit library locations. Unset paths fall back to the dynamic linker
/// search path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryConfig {
    pub cuda_lib_path: Option<PathBuf>,
    pub nvml_lib_path: Option<PathBuf>,
}

impl LibraryConfig {
    pub(crate) fn cuda_sources(&self) -> Vec<LibrarySource> {
        let mut sources = Vec::with_capacity(2);
        if let Some(path) = &self.cuda_lib_path {
            sources.push(LibrarySource::Path(path.clone()));
        }
        sources.push(LibrarySource::Name(CUDA_RUNTIME_LIB));
        sources
    }

    pub(crate) fn nvml_sources(&self) -> Vec<LibrarySource> {
        let mut sources = Vec::with_capacity(3);
        if let Some(path) = &self.nvml_lib_path {
            sources.push(LibrarySource::Path(path.clone()));
        }
        sources.push(LibrarySource::Name(NVML_LIB));
        if cfg!(target_os = "linux") {
            sources.push(LibrarySource::Path(PathBuf::from(NVML_FALLBACK_LIB)));
        }
        sources
    }
}

/// Backend that opens the real `libcudart` and `libnvidia-ml`.
#[derive(Debug, Clone, Default)]
pub struct NativeBackend {
    config: LibraryConfig,
}

impl NativeBackend {
    pub fn new(config: LibraryConfig) -> Self {
        Self { config }
    }
}

impl Backend for NativeBackend {
    type Cuda = NativeCudaRuntime;
    type Nvml = NativeNvml;

    fn load_cuda_runtime(&self) -> Option<NativeCudaRuntime> {
        let library = loader::load_first(&self.config.cuda_sources())?;
        NativeCudaRuntime::from_library(library)
            .inspect_err(|err| tracing::warn!(error = %err, "CUDA runtime is missing symbols"))
            .ok()
    }

    fn load_management_library(&self) -> Option<NativeNvml> {
        let library = loader::load_first(&self.config.nvml_sources())?;
        NativeNvml::from_library(library)
            .inspect_err(|err| tracing::warn!(error = %err, "NVML is missing symbols"))
            .ok()
    }
}
