use std::sync::OnceLock;

use crate::backend::{Backend, LibraryConfig, NativeBackend};
use crate::error::Error;
use crate::inventory::DeviceInventory;
use crate::types::{DeviceProperties, UtilizationSample};
use crate::utilization;

/// Entry point for device inventory and utilization queries.
///
/// The inventory is enumerated on the first call that needs it and then
/// kept for the lifetime of this object; device indices never change. NVML
/// is loaded and a session opened for every utilization query.
pub struct DeviceQuery<B: Backend> {
    backend: B,
    inventory: OnceLock<DeviceInventory<B::Cuda>>,
}

impl DeviceQuery<NativeBackend> {
    pub fn native(config: LibraryConfig) -> Self {
        Self::new(NativeBackend::new(config))
    }
}

impl<B: Backend> DeviceQuery<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            inventory: OnceLock::new(),
        }
    }

    fn inventory(&self) -> &DeviceInventory<B::Cuda> {
        self.inventory.get_or_init(|| match self.backend.load_cuda_runtime() {
            Some(runtime) => DeviceInventory::query(runtime),
            None => {
                tracing::debug!("CUDA runtime not found, no devices available");
                DeviceInventory::empty()
            }
        })
    }

    /// All devices, in native enumeration order.
    pub fn list_devices(&self) -> &[DeviceProperties] {
        self.inventory().devices()
    }

    pub fn get_device(&self, index: usize) -> Result<&DeviceProperties, Error> {
        self.inventory().get(index)
    }

    /// Current utilization of device `index`.
    ///
    /// `Ok(None)` when NVML is not installed or the device does not expose
    /// utilization counters.
    pub fn get_utilization(&self, index: usize) -> Result<Option<UtilizationSample>, Error> {
        let device = self.get_device(index)?;

        let Some(library) = self.backend.load_management_library() else {
            tracing::debug!("NVML not found, skipping utilization for device {index}");
            return Ok(None);
        };

        utilization::sample(&library, index, device)
    }
}

/// Process-wide query service using the default library search.
pub fn global() -> &'static DeviceQuery<NativeBackend> {
    static GLOBAL: OnceLock<DeviceQuery<NativeBackend>> = OnceLock::new();
    GLOBAL.get_or_init(|| DeviceQuery::native(LibraryConfig::default()))
}
