use nvml_wrapper::error::NvmlError;

use crate::error::Error;
use crate::nvml::{ManagementLibrary, NvmlSession};
use crate::types::{DeviceProperties, UtilizationSample};

/// Samples utilization for `device` in a fresh NVML session.
///
/// Returns `Ok(None)` when the device does not support utilization
/// counters. The session is shut down before returning on every path.
pub(crate) fn sample<L: ManagementLibrary>(
    library: &L,
    index: usize,
    device: &DeviceProperties,
) -> Result<Option<UtilizationSample>, Error> {
    let pci_bus_id = device
        .pci_bus_id_str
        .as_deref()
        .ok_or(Error::MissingPciBusId(index))?;

    let session = NvmlSession::open(library).map_err(Error::NvmlInit)?;

    let handle = session
        .device_by_pci_bus_id(pci_bus_id)
        .map_err(|source| Error::NvmlDeviceHandle {
            pci_bus_id: pci_bus_id.to_string(),
            source,
        })?;

    match session.utilization_rates(&handle) {
        Ok(rates) => Ok(Some(UtilizationSample {
            gpu: rates.gpu,
            memory: rates.memory,
        })),
        Err(NvmlError::NotSupported) => {
            tracing::debug!("Utilization is not supported on device {index} ({pci_bus_id})");
            Ok(None)
        }
        Err(err) => Err(Error::NvmlUtilization(err)),
    }
}
