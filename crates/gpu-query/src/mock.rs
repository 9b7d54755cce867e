//! In-memory stand-ins for the vendor libraries, recording every call.

use std::cell::{Cell, RefCell};
use std::ffi::CStr;
use std::io;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

pub(crate) use nvml_wrapper_sys::bindings::nvmlReturn_enum_NVML_ERROR_NOT_FOUND as NVML_ERROR_NOT_FOUND;
pub(crate) use nvml_wrapper_sys::bindings::nvmlReturn_enum_NVML_ERROR_NOT_SUPPORTED as NVML_ERROR_NOT_SUPPORTED;
pub(crate) use nvml_wrapper_sys::bindings::nvmlReturn_enum_NVML_ERROR_UNKNOWN as NVML_ERROR_UNKNOWN;
use nvml_wrapper_sys::bindings::{
    nvmlDevice_t, nvmlReturn_enum_NVML_SUCCESS, nvmlReturn_t, nvmlUtilization_t,
};
use tracing_subscriber::fmt::MakeWriter;

use crate::backend::Backend;
use crate::cudart::{CudaRuntime, CudaStatus};
use crate::nvml::ManagementLibrary;
use crate::types::DeviceProperties;

/// Collects formatted log lines emitted while a closure runs.
#[derive(Clone, Default)]
pub(crate) struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Runs `f` with a thread-local subscriber writing into this buffer.
    pub(crate) fn during<T>(&self, f: impl FnOnce() -> T) -> T {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }

    /// Captured lines that mention `needle`.
    pub(crate) fn lines_containing(&self, needle: &str) -> Vec<String> {
        let buffer = self.0.lock().expect("log buffer");
        String::from_utf8_lossy(&buffer)
            .lines()
            .filter(|line| line.contains(needle))
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

pub(crate) fn device(name: &str, pci_bus_id: i32) -> DeviceProperties {
    DeviceProperties {
        name: name.to_string(),
        total_global_mem: 16 << 30,
        warp_size: 32,
        major: 8,
        minor: 6,
        multi_processor_count: 84,
        pci_bus_id,
        ..Default::default()
    }
}

#[derive(Clone)]
pub(crate) struct MockCudaRuntime {
    version: Result<i32, CudaStatus>,
    count: Option<Result<i32, CudaStatus>>,
    devices: Vec<(Result<DeviceProperties, CudaStatus>, Result<String, CudaStatus>)>,
    property_queries: Rc<Cell<usize>>,
}

impl Default for MockCudaRuntime {
    fn default() -> Self {
        Self {
            version: Ok(12040),
            count: None,
            devices: Vec::new(),
            property_queries: Rc::default(),
        }
    }
}

impl MockCudaRuntime {
    pub(crate) fn with_version(mut self, version: Result<i32, CudaStatus>) -> Self {
        self.version = version;
        self
    }

    pub(crate) fn with_count(mut self, count: Result<i32, CudaStatus>) -> Self {
        self.count = Some(count);
        self
    }

    pub(crate) fn with_device(mut self, props: DeviceProperties, pci_bus_id: &str) -> Self {
        self.devices.push((Ok(props), Ok(pci_bus_id.to_string())));
        self
    }

    pub(crate) fn with_device_without_bus_id(mut self, props: DeviceProperties) -> Self {
        self.devices.push((Ok(props), Err(CudaStatus(1))));
        self
    }

    pub(crate) fn with_failed_device(mut self, status: CudaStatus) -> Self {
        self.devices.push((Err(status), Err(status)));
        self
    }

    pub(crate) fn property_queries(&self) -> usize {
        self.property_queries.get()
    }
}

impl CudaRuntime for MockCudaRuntime {
    fn runtime_version(&self) -> Result<i32, CudaStatus> {
        self.version
    }

    fn device_count(&self) -> Result<i32, CudaStatus> {
        self.count.unwrap_or(Ok(self.devices.len() as i32))
    }

    fn device_properties(&self, ordinal: i32) -> Result<DeviceProperties, CudaStatus> {
        self.property_queries.set(self.property_queries.get() + 1);
        match self.devices.get(ordinal as usize) {
            Some((props, _)) => props.clone(),
            None => Err(CudaStatus(101)),
        }
    }

    fn pci_bus_id(&self, ordinal: i32) -> Result<String, CudaStatus> {
        match self.devices.get(ordinal as usize) {
            Some((_, bus_id)) => bus_id.clone(),
            None => Err(CudaStatus(101)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct NvmlCalls {
    pub inits: usize,
    pub successful_inits: usize,
    pub shutdowns: usize,
}

impl NvmlCalls {
    pub(crate) fn open_sessions(&self) -> usize {
        self.successful_inits - self.shutdowns
    }
}

#[derive(Clone, Default)]
pub(crate) struct MockNvml {
    init_status: nvmlReturn_t,
    devices: Vec<(String, Result<(u32, u32), nvmlReturn_t>)>,
    calls: Rc<RefCell<NvmlCalls>>,
}

impl MockNvml {
    pub(crate) fn with_init_status(mut self, status: nvmlReturn_t) -> Self {
        self.init_status = status;
        self
    }

    pub(crate) fn with_device(
        mut self,
        pci_bus_id: &str,
        utilization: Result<(u32, u32), nvmlReturn_t>,
    ) -> Self {
        self.devices.push((pci_bus_id.to_string(), utilization));
        self
    }

    pub(crate) fn calls(&self) -> NvmlCalls {
        *self.calls.borrow()
    }
}

impl ManagementLibrary for MockNvml {
    fn init(&self) -> nvmlReturn_t {
        let mut calls = self.calls.borrow_mut();
        calls.inits += 1;
        if self.init_status == nvmlReturn_enum_NVML_SUCCESS {
            calls.successful_inits += 1;
        }
        self.init_status
    }

    fn shutdown(&self) -> nvmlReturn_t {
        self.calls.borrow_mut().shutdowns += 1;
        nvmlReturn_enum_NVML_SUCCESS
    }

    fn device_handle_by_pci_bus_id(&self, pci_bus_id: &CStr) -> Result<nvmlDevice_t, nvmlReturn_t> {
        let pci_bus_id = pci_bus_id.to_string_lossy();
        self.devices
            .iter()
            .position(|(id, _)| *id == pci_bus_id)
            .map(|position| (position + 1) as nvmlDevice_t)
            .ok_or(NVML_ERROR_NOT_FOUND)
    }

    fn utilization_rates(&self, device: nvmlDevice_t) -> Result<nvmlUtilization_t, nvmlReturn_t> {
        let (_, utilization) = self
            .devices
            .get(device as usize - 1)
            .ok_or(NVML_ERROR_NOT_FOUND)?;
        (*utilization).map(|(gpu, memory)| nvmlUtilization_t { gpu, memory })
    }
}

#[derive(Default)]
pub(crate) struct MockBackend {
    cuda: Option<MockCudaRuntime>,
    nvml: Option<MockNvml>,
    cuda_loads: Cell<usize>,
    nvml_loads: Cell<usize>,
}

impl MockBackend {
    pub(crate) fn with_cuda(mut self, cuda: MockCudaRuntime) -> Self {
        self.cuda = Some(cuda);
        self
    }

    pub(crate) fn with_nvml(mut self, nvml: MockNvml) -> Self {
        self.nvml = Some(nvml);
        self
    }

    pub(crate) fn cuda_loads(&self) -> usize {
        self.cuda_loads.get()
    }

    pub(crate) fn nvml_loads(&self) -> usize {
        self.nvml_loads.get()
    }
}

impl Backend for MockBackend {
    type Cuda = MockCudaRuntime;
    type Nvml = MockNvml;

    fn load_cuda_runtime(&self) -> Option<MockCudaRuntime> {
        self.cuda_loads.set(self.cuda_loads.get() + 1);
        self.cuda.clone()
    }

    fn load_management_library(&self) -> Option<MockNvml> {
        self.nvml_loads.set(self.nvml_loads.get() + 1);
        self.nvml.clone()
    }
}
