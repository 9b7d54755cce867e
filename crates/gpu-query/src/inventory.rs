use crate::cudart::CudaRuntime;
use crate::error::Error;
use crate::types::DeviceProperties;

/// Oldest supported runtime, CUDA 6.5.
pub const MIN_CUDA_RUNTIME_VERSION: i32 = 6050;

/// Devices found by one enumeration pass, in native order.
///
/// The runtime stays loaded alongside the records; unloading `libcudart`
/// while the process is running is not safe.
pub struct DeviceInventory<R> {
    devices: Vec<DeviceProperties>,
    _runtime: Option<R>,
}

impl<R: CudaRuntime> DeviceInventory<R> {
    /// Inventory for a host without a CUDA runtime.
    pub fn empty() -> Self {
        Self {
            devices: Vec::new(),
            _runtime: None,
        }
    }

    /// Enumerates every device the runtime reports.
    ///
    /// A too-old or failing runtime yields an empty inventory. Devices whose
    /// properties cannot be read are skipped.
    pub fn query(runtime: R) -> Self {
        let devices = enumerate(&runtime);
        Self {
            devices,
            _runtime: Some(runtime),
        }
    }

    pub fn devices(&self) -> &[DeviceProperties] {
        &self.devices
    }

    pub fn get(&self, index: usize) -> Result<&DeviceProperties, Error> {
        self.devices
            .get(index)
            .ok_or(Error::DeviceIndexOutOfRange {
                index,
                count: self.devices.len(),
            })
    }
}

fn enumerate<R: CudaRuntime>(runtime: &R) -> Vec<DeviceProperties> {
    let version = match runtime.runtime_version() {
        Ok(version) => version,
        Err(status) => {
            tracing::error!("cudaRuntimeGetVersion() failed with {status}");
            return Vec::new();
        }
    };
    if version < MIN_CUDA_RUNTIME_VERSION {
        tracing::error!("CUDA version must be >= 6.5, not {version}");
        return Vec::new();
    }

    let count = match runtime.device_count() {
        Ok(count) => count,
        Err(status) => {
            tracing::error!("cudaGetDeviceCount() failed with {status}");
            return Vec::new();
        }
    };
    tracing::debug!("CUDA runtime {version} reports {count} device(s)");

    let mut devices = Vec::with_capacity(count.max(0) as usize);
    for ordinal in 0..count {
        let mut props = match runtime.device_properties(ordinal) {
            Ok(props) => props,
            Err(status) => {
                tracing::debug!(
                    "Skipping device {ordinal}: cudaGetDeviceProperties() failed with {status}"
                );
                continue;
            }
        };

        match runtime.pci_bus_id(ordinal) {
            Ok(pci_bus_id) => props.pci_bus_id_str = Some(pci_bus_id),
            Err(status) => {
                tracing::warn!("cudaDeviceGetPCIBusId() failed for device {ordinal} with {status}")
            }
        }

        let (major, minor) = props.compute_capability();
        tracing::info!(
            "Found GPU {}: {} (compute {}.{}, {:?})",
            devices.len(),
            props.name,
            major,
            minor,
            props.pci_bus_id_str
        );
        devices.push(props);
    }
    devices
}
