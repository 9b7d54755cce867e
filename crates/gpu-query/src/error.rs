use nvml_wrapper::error::NvmlError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid device index: {index} ({count} device(s) found)")]
    DeviceIndexOutOfRange { index: usize, count: usize },

    #[error("Device {0} has no PCI bus ID")]
    MissingPciBusId(usize),

    #[error("nvmlInit() failed: `{0}`")]
    NvmlInit(#[source] NvmlError),

    #[error("nvmlDeviceGetHandleByPciBusId() failed for `{pci_bus_id}`: `{source}`")]
    NvmlDeviceHandle {
        pci_bus_id: String,
        #[source]
        source: NvmlError,
    },

    #[error("nvmlDeviceGetUtilizationRates() failed: `{0}`")]
    NvmlUtilization(#[source] NvmlError),
}
