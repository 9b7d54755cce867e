//! NVML bindings and session scoping.

use std::ffi::{c_char, CStr, CString};
use std::marker::PhantomData;

use libloading::Library;
use nvml_wrapper::error::{nvml_try, NvmlError};
use nvml_wrapper_sys::bindings::{
    nvmlDevice_t, nvmlReturn_enum_NVML_SUCCESS, nvmlReturn_t, nvmlUtilization_t,
};

/// The NVML calls needed for a utilization sample.
///
/// Status codes are returned raw; [`NvmlSession`] turns them into errors.
pub trait ManagementLibrary {
    /// `nvmlInit`
    fn init(&self) -> nvmlReturn_t;

    /// `nvmlShutdown`
    fn shutdown(&self) -> nvmlReturn_t;

    /// `nvmlDeviceGetHandleByPciBusId`
    fn device_handle_by_pci_bus_id(&self, pci_bus_id: &CStr)
        -> Result<nvmlDevice_t, nvmlReturn_t>;

    /// `nvmlDeviceGetUtilizationRates`
    fn utilization_rates(&self, device: nvmlDevice_t)
        -> Result<nvmlUtilization_t, nvmlReturn_t>;
}

type InitFn = unsafe extern "C" fn() -> nvmlReturn_t;
type ShutdownFn = unsafe extern "C" fn() -> nvmlReturn_t;
type GetHandleByPciBusIdFn =
    unsafe extern "C" fn(*const c_char, *mut nvmlDevice_t) -> nvmlReturn_t;
type GetUtilizationRatesFn =
    unsafe extern "C" fn(nvmlDevice_t, *mut nvmlUtilization_t) -> nvmlReturn_t;

/// NVML resolved from a loaded `libnvidia-ml`.
pub struct NativeNvml {
    init: InitFn,
    shutdown: ShutdownFn,
    device_get_handle_by_pci_bus_id: GetHandleByPciBusIdFn,
    device_get_utilization_rates: GetUtilizationRatesFn,
    _library: Library,
}

impl NativeNvml {
    pub fn from_library(library: Library) -> Result<Self, libloading::Error> {
        // SAFETY: signatures match nvml.h.
        unsafe {
            let init = *library.get::<InitFn>(b"nvmlInit\0")?;
            let shutdown = *library.get::<ShutdownFn>(b"nvmlShutdown\0")?;
            let device_get_handle_by_pci_bus_id =
                *library.get::<GetHandleByPciBusIdFn>(b"nvmlDeviceGetHandleByPciBusId\0")?;
            let device_get_utilization_rates =
                *library.get::<GetUtilizationRatesFn>(b"nvmlDeviceGetUtilizationRates\0")?;

            Ok(Self {
                init,
                shutdown,
                device_get_handle_by_pci_bus_id,
                device_get_utilization_rates,
                _library: library,
            })
        }
    }
}

impl ManagementLibrary for NativeNvml {
    fn init(&self) -> nvmlReturn_t {
        unsafe { (self.init)() }
    }

    fn shutdown(&self) -> nvmlReturn_t {
        unsafe { (self.shutdown)() }
    }

    fn device_handle_by_pci_bus_id(
        &self,
        pci_bus_id: &CStr,
    ) -> Result<nvmlDevice_t, nvmlReturn_t> {
        let mut device: nvmlDevice_t = std::ptr::null_mut();
        let rc =
            unsafe { (self.device_get_handle_by_pci_bus_id)(pci_bus_id.as_ptr(), &mut device) };
        if rc == nvmlReturn_enum_NVML_SUCCESS {
            Ok(device)
        } else {
            Err(rc)
        }
    }

    fn utilization_rates(
        &self,
        device: nvmlDevice_t,
    ) -> Result<nvmlUtilization_t, nvmlReturn_t> {
        let mut utilization = nvmlUtilization_t { gpu: 0, memory: 0 };
        let rc = unsafe { (self.device_get_utilization_rates)(device, &mut utilization) };
        if rc == nvmlReturn_enum_NVML_SUCCESS {
            Ok(utilization)
        } else {
            Err(rc)
        }
    }
}

/// An initialized NVML session.
///
/// `nvmlShutdown` runs when the session is dropped, on every exit path.
pub struct NvmlSession<'l, L: ManagementLibrary> {
    library: &'l L,
}

impl<'l, L: ManagementLibrary> NvmlSession<'l, L> {
    pub fn open(library: &'l L) -> Result<Self, NvmlError> {
        nvml_try(library.init())?;
        tracing::trace!("NVML session opened");
        Ok(Self { library })
    }

    pub fn device_by_pci_bus_id(&self, pci_bus_id: &str) -> Result<DeviceHandle<'_>, NvmlError> {
        let pci_bus_id = CString::new(pci_bus_id).map_err(|_| NvmlError::InvalidArg)?;
        let raw = self
            .library
            .device_handle_by_pci_bus_id(&pci_bus_id)
            .map_err(nvml_error)?;
        Ok(DeviceHandle {
            raw,
            _session: PhantomData,
        })
    }

    pub fn utilization_rates(
        &self,
        device: &DeviceHandle<'_>,
    ) -> Result<nvmlUtilization_t, NvmlError> {
        self.library.utilization_rates(device.raw).map_err(nvml_error)
    }
}

impl<L: ManagementLibrary> Drop for NvmlSession<'_, L> {
    fn drop(&mut self) {
        match nvml_try(self.library.shutdown()) {
            Ok(()) => tracing::trace!("NVML session shut down"),
            Err(err) => tracing::warn!(error = %err, "nvmlShutdown() failed"),
        }
    }
}

/// Opaque NVML device reference, valid only while its session is open.
pub struct DeviceHandle<'s> {
    raw: nvmlDevice_t,
    _session: PhantomData<&'s ()>,
}

fn nvml_error(rc: nvmlReturn_t) -> NvmlError {
    match nvml_try(rc) {
        Err(err) => err,
        Ok(()) => NvmlError::Unknown,
    }
}
