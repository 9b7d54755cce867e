//! CUDA runtime bindings.
//!
//! Only the four entry points needed for device enumeration are resolved.
//! `cudaDeviceProp` changed shape in CUDA 10.0 (`uuid`, `luid` and
//! `luidDeviceNodeMask` were inserted after `name`), so the layout passed to
//! `cudaGetDeviceProperties` is chosen from the runtime version.

use std::ffi::{c_char, c_int, c_uint, c_void, CStr};

use derive_more::Display;
use libloading::Library;

use crate::types::DeviceProperties;

/// `cudaError_t`
pub type CudaErrorT = c_int;

pub const CUDA_SUCCESS: CudaErrorT = 0;

/// First runtime version whose `cudaDeviceProp` carries `uuid` and `luid`.
pub const CUDA_UUID_LAYOUT_VERSION: i32 = 10000;

/// Length of the buffer handed to `cudaDeviceGetPCIBusId`, terminator
/// included.
pub const PCI_BUS_ID_LEN: usize = 13;

/// Non-zero `cudaError_t` returned by a runtime call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display("cudaError #{_0}")]
pub struct CudaStatus(pub CudaErrorT);

fn check(rc: CudaErrorT) -> Result<(), CudaStatus> {
    if rc == CUDA_SUCCESS {
        Ok(())
    } else {
        Err(CudaStatus(rc))
    }
}

/// Device enumeration calls of the CUDA runtime.
pub trait CudaRuntime {
    /// `cudaRuntimeGetVersion`, encoded as `1000 * major + 10 * minor`.
    fn runtime_version(&self) -> Result<i32, CudaStatus>;

    /// `cudaGetDeviceCount`
    fn device_count(&self) -> Result<i32, CudaStatus>;

    /// `cudaGetDeviceProperties`; the returned record has no PCI bus ID
    /// string yet.
    fn device_properties(&self, ordinal: i32) -> Result<DeviceProperties, CudaStatus>;

    /// `cudaDeviceGetPCIBusId`
    fn pci_bus_id(&self, ordinal: i32) -> Result<String, CudaStatus>;
}

type RuntimeGetVersionFn = unsafe extern "C" fn(*mut c_int) -> CudaErrorT;
type GetDeviceCountFn = unsafe extern "C" fn(*mut c_int) -> CudaErrorT;
type GetDevicePropertiesFn = unsafe extern "C" fn(*mut c_void, c_int) -> CudaErrorT;
type DeviceGetPciBusIdFn = unsafe extern "C" fn(*mut c_char, c_int, c_int) -> CudaErrorT;

/// CUDA runtime resolved from a loaded `libcudart`.
///
/// Holds the library for as long as the function pointers are in use.
pub struct NativeCudaRuntime {
    runtime_get_version: RuntimeGetVersionFn,
    get_device_count: GetDeviceCountFn,
    get_device_properties: GetDevicePropertiesFn,
    device_get_pci_bus_id: DeviceGetPciBusIdFn,
    _library: Library,
}

impl NativeCudaRuntime {
    pub fn from_library(library: Library) -> Result<Self, libloading::Error> {
        // SAFETY: signatures match cuda_runtime_api.h.
        unsafe {
            let runtime_get_version =
                *library.get::<RuntimeGetVersionFn>(b"cudaRuntimeGetVersion\0")?;
            let get_device_count = *library.get::<GetDeviceCountFn>(b"cudaGetDeviceCount\0")?;
            let get_device_properties =
                *library.get::<GetDevicePropertiesFn>(b"cudaGetDeviceProperties\0")?;
            let device_get_pci_bus_id =
                *library.get::<DeviceGetPciBusIdFn>(b"cudaDeviceGetPCIBusId\0")?;

            Ok(Self {
                runtime_get_version,
                get_device_count,
                get_device_properties,
                device_get_pci_bus_id,
                _library: library,
            })
        }
    }

    fn query_properties<H: PropHead>(
        &self,
        ordinal: i32,
    ) -> Result<DeviceProperties, CudaStatus> {
        let mut raw = RawDeviceProp::<H>::zeroed();
        let ptr = &mut raw as *mut RawDeviceProp<H> as *mut c_void;
        // SAFETY: `raw` is at least as large as any known cudaDeviceProp.
        check(unsafe { (self.get_device_properties)(ptr, ordinal) })?;
        Ok(raw.to_properties())
    }
}

impl CudaRuntime for NativeCudaRuntime {
    fn runtime_version(&self) -> Result<i32, CudaStatus> {
        let mut version: c_int = 0;
        check(unsafe { (self.runtime_get_version)(&mut version) })?;
        Ok(version)
    }

    fn device_count(&self) -> Result<i32, CudaStatus> {
        let mut count: c_int = 0;
        check(unsafe { (self.get_device_count)(&mut count) })?;
        Ok(count)
    }

    fn device_properties(&self, ordinal: i32) -> Result<DeviceProperties, CudaStatus> {
        if self.runtime_version()? >= CUDA_UUID_LAYOUT_VERSION {
            self.query_properties::<UuidHead>(ordinal)
        } else {
            self.query_properties::<LegacyHead>(ordinal)
        }
    }

    fn pci_bus_id(&self, ordinal: i32) -> Result<String, CudaStatus> {
        let mut buffer = [0 as c_char; PCI_BUS_ID_LEN];
        check(unsafe {
            (self.device_get_pci_bus_id)(buffer.as_mut_ptr(), PCI_BUS_ID_LEN as c_int, ordinal)
        })?;
        Ok(c_chars_to_string(&buffer))
    }
}

/// Decodes a fixed-size C string buffer, stopping at the first NUL.
pub(crate) fn c_chars_to_string(chars: &[c_char]) -> String {
    let bytes: Vec<u8> = chars.iter().map(|&c| c as u8).collect();
    match CStr::from_bytes_until_nul(&bytes) {
        Ok(s) => s.to_string_lossy().into_owned(),
        Err(_) => String::from_utf8_lossy(&bytes).into_owned(),
    }
}

/// Extra room after the known fields; newer runtimes append members.
const RESERVED_TAIL: usize = 2048;

/// Leading fields that differ between `cudaDeviceProp` revisions.
pub(crate) trait PropHead {
    fn name(&self) -> &[c_char; 256];
}

#[repr(C)]
pub(crate) struct LegacyHead {
    name: [c_char; 256],
}

#[repr(C)]
#[allow(dead_code, reason = "mirrors the native layout")]
pub(crate) struct UuidHead {
    name: [c_char; 256],
    uuid: [c_char; 16],
    luid: [c_char; 8],
    luid_device_node_mask: c_uint,
}

impl PropHead for LegacyHead {
    fn name(&self) -> &[c_char; 256] {
        &self.name
    }
}

impl PropHead for UuidHead {
    fn name(&self) -> &[c_char; 256] {
        &self.name
    }
}

/// `cudaDeviceProp` from `totalGlobalMem` through `multiGpuBoardGroupID`.
#[repr(C)]
#[allow(dead_code, reason = "mirrors the native layout")]
pub(crate) struct RawPropsBody {
    pub total_global_mem: usize,
    pub shared_mem_per_block: usize,
    pub regs_per_block: c_int,
    pub warp_size: c_int,
    pub mem_pitch: usize,
    pub max_threads_per_block: c_int,
    pub max_threads_dim: [c_int; 3],
    pub max_grid_size: [c_int; 3],
    pub clock_rate: c_int,
    pub total_const_mem: usize,
    pub major: c_int,
    pub minor: c_int,
    pub texture_alignment: usize,
    pub texture_pitch_alignment: usize,
    pub device_overlap: c_int,
    pub multi_processor_count: c_int,
    pub kernel_exec_timeout_enabled: c_int,
    pub integrated: c_int,
    pub can_map_host_memory: c_int,
    pub compute_mode: c_int,
    pub max_texture_1d: c_int,
    pub max_texture_1d_mipmap: c_int,
    pub max_texture_1d_linear: c_int,
    pub max_texture_2d: [c_int; 2],
    pub max_texture_2d_mipmap: [c_int; 2],
    pub max_texture_2d_linear: [c_int; 3],
    pub max_texture_2d_gather: [c_int; 2],
    pub max_texture_3d: [c_int; 3],
    pub max_texture_3d_alt: [c_int; 3],
    pub max_texture_cubemap: c_int,
    pub max_texture_1d_layered: [c_int; 2],
    pub max_texture_2d_layered: [c_int; 3],
    pub max_texture_cubemap_layered: [c_int; 2],
    pub max_surface_1d: c_int,
    pub max_surface_2d: [c_int; 2],
    pub max_surface_3d: [c_int; 3],
    pub max_surface_1d_layered: [c_int; 2],
    pub max_surface_2d_layered: [c_int; 3],
    pub max_surface_cubemap: c_int,
    pub max_surface_cubemap_layered: [c_int; 2],
    pub surface_alignment: usize,
    pub concurrent_kernels: c_int,
    pub ecc_enabled: c_int,
    pub pci_bus_id: c_int,
    pub pci_device_id: c_int,
    pub pci_domain_id: c_int,
    pub tcc_driver: c_int,
    pub async_engine_count: c_int,
    pub unified_addressing: c_int,
    pub memory_clock_rate: c_int,
    pub memory_bus_width: c_int,
    pub l2_cache_size: c_int,
    pub max_threads_per_multi_processor: c_int,
    pub stream_priorities_supported: c_int,
    pub global_l1_cache_supported: c_int,
    pub local_l1_cache_supported: c_int,
    pub shared_mem_per_multiprocessor: usize,
    pub regs_per_multiprocessor: c_int,
    pub managed_memory: c_int,
    pub is_multi_gpu_board: c_int,
    pub multi_gpu_board_group_id: c_int,
}

#[repr(C)]
#[allow(dead_code, reason = "reserved space is only written by the runtime")]
pub(crate) struct RawDeviceProp<H> {
    pub head: H,
    pub body: RawPropsBody,
    reserved: [u8; RESERVED_TAIL],
}

impl<H: PropHead> RawDeviceProp<H> {
    pub(crate) fn zeroed() -> Self {
        // SAFETY: every field is a plain integer or integer array.
        unsafe { std::mem::zeroed() }
    }

    pub(crate) fn to_properties(&self) -> DeviceProperties {
        let b = &self.body;
        DeviceProperties {
            name: c_chars_to_string(self.head.name()),
            total_global_mem: b.total_global_mem as u64,
            shared_mem_per_block: b.shared_mem_per_block as u64,
            regs_per_block: b.regs_per_block,
            warp_size: b.warp_size,
            mem_pitch: b.mem_pitch as u64,
            max_threads_per_block: b.max_threads_per_block,
            max_threads_dim: b.max_threads_dim,
            max_grid_size: b.max_grid_size,
            clock_rate: b.clock_rate,
            total_const_mem: b.total_const_mem as u64,
            major: b.major,
            minor: b.minor,
            texture_alignment: b.texture_alignment as u64,
            texture_pitch_alignment: b.texture_pitch_alignment as u64,
            device_overlap: b.device_overlap,
            multi_processor_count: b.multi_processor_count,
            kernel_exec_timeout_enabled: b.kernel_exec_timeout_enabled,
            integrated: b.integrated,
            can_map_host_memory: b.can_map_host_memory,
            compute_mode: b.compute_mode,
            max_texture_1d: b.max_texture_1d,
            max_texture_1d_mipmap: b.max_texture_1d_mipmap,
            max_texture_1d_linear: b.max_texture_1d_linear,
            max_texture_cubemap: b.max_texture_cubemap,
            max_surface_1d: b.max_surface_1d,
            max_surface_cubemap: b.max_surface_cubemap,
            surface_alignment: b.surface_alignment as u64,
            concurrent_kernels: b.concurrent_kernels,
            ecc_enabled: b.ecc_enabled,
            pci_bus_id: b.pci_bus_id,
            pci_device_id: b.pci_device_id,
            pci_domain_id: b.pci_domain_id,
            tcc_driver: b.tcc_driver,
            async_engine_count: b.async_engine_count,
            unified_addressing: b.unified_addressing,
            memory_clock_rate: b.memory_clock_rate,
            memory_bus_width: b.memory_bus_width,
            l2_cache_size: b.l2_cache_size,
            max_threads_per_multi_processor: b.max_threads_per_multi_processor,
            stream_priorities_supported: b.stream_priorities_supported,
            global_l1_cache_supported: b.global_l1_cache_supported,
            local_l1_cache_supported: b.local_l1_cache_supported,
            shared_mem_per_multiprocessor: b.shared_mem_per_multiprocessor as u64,
            regs_per_multiprocessor: b.regs_per_multiprocessor,
            managed_mem_supported: b.managed_memory,
            is_multi_gpu_board: b.is_multi_gpu_board,
            multi_gpu_board_group_id: b.multi_gpu_board_group_id,
            pci_bus_id_str: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::mem::offset_of;

    use similar_asserts::assert_eq;

    use super::*;

    fn write_name(name: &mut [c_char; 256], value: &str) {
        for (dst, src) in name.iter_mut().zip(value.bytes()) {
            *dst = src as c_char;
        }
    }

    #[test]
    fn uuid_layout_shifts_body() {
        assert_eq!(offset_of!(RawDeviceProp<LegacyHead>, body), 256);
        assert_eq!(offset_of!(RawDeviceProp<UuidHead>, body), 288);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn body_offsets_match_cuda_header() {
        assert_eq!(offset_of!(RawPropsBody, regs_per_block), 16);
        assert_eq!(offset_of!(RawPropsBody, mem_pitch), 24);
        assert_eq!(offset_of!(RawPropsBody, clock_rate), 60);
        assert_eq!(offset_of!(RawPropsBody, total_const_mem), 64);
    }

    #[test]
    fn raw_props_convert_to_record() {
        let mut raw = RawDeviceProp::<UuidHead>::zeroed();
        write_name(&mut raw.head.name, "NVIDIA A100-SXM4-40GB");
        raw.body.total_global_mem = 42_505_273_344;
        raw.body.major = 8;
        raw.body.minor = 0;
        raw.body.multi_processor_count = 108;
        raw.body.max_threads_dim = [1024, 1024, 64];
        raw.body.pci_bus_id = 7;
        raw.body.pci_domain_id = 0;

        let props = raw.to_properties();

        assert_eq!(props.name, "NVIDIA A100-SXM4-40GB");
        assert_eq!(props.total_global_mem, 42_505_273_344);
        assert_eq!(props.compute_capability(), (8, 0));
        assert_eq!(props.multi_processor_count, 108);
        assert_eq!(props.max_threads_dim, [1024, 1024, 64]);
        assert_eq!(props.pci_bus_id, 7);
        assert_eq!(props.pci_bus_id_str, None);
    }

    #[test]
    fn c_string_stops_at_nul() {
        let mut buffer = [0 as c_char; PCI_BUS_ID_LEN];
        for (dst, src) in buffer.iter_mut().zip(b"0000:65:00.0".iter()) {
            *dst = *src as c_char;
        }

        assert_eq!(c_chars_to_string(&buffer), "0000:65:00.0");
    }

    #[test]
    fn c_string_without_nul_uses_whole_buffer() {
        let buffer = [b'a' as c_char; 4];

        assert_eq!(c_chars_to_string(&buffer), "aaaa");
    }
}
