use derive_more::Display;
use serde::Serialize;

/// Static properties of one CUDA device.
///
/// Field names follow `cudaDeviceProp`. Populated once per device by the
/// inventory and never modified afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProperties {
    pub name: String,
    pub total_global_mem: u64,
    pub shared_mem_per_block: u64,
    pub regs_per_block: i32,
    pub warp_size: i32,
    pub mem_pitch: u64,
    pub max_threads_per_block: i32,
    pub max_threads_dim: [i32; 3],
    pub max_grid_size: [i32; 3],
    pub clock_rate: i32,
    pub total_const_mem: u64,
    pub major: i32,
    pub minor: i32,
    pub texture_alignment: u64,
    pub texture_pitch_alignment: u64,
    pub device_overlap: i32,
    pub multi_processor_count: i32,
    pub kernel_exec_timeout_enabled: i32,
    pub integrated: i32,
    pub can_map_host_memory: i32,
    pub compute_mode: i32,
    pub max_texture_1d: i32,
    pub max_texture_1d_mipmap: i32,
    pub max_texture_1d_linear: i32,
    pub max_texture_cubemap: i32,
    pub max_surface_1d: i32,
    pub max_surface_cubemap: i32,
    pub surface_alignment: u64,
    pub concurrent_kernels: i32,
    pub ecc_enabled: i32,
    pub pci_bus_id: i32,
    pub pci_device_id: i32,
    pub pci_domain_id: i32,
    pub tcc_driver: i32,
    pub async_engine_count: i32,
    pub unified_addressing: i32,
    pub memory_clock_rate: i32,
    pub memory_bus_width: i32,
    pub l2_cache_size: i32,
    pub max_threads_per_multi_processor: i32,
    pub stream_priorities_supported: i32,
    pub global_l1_cache_supported: i32,
    pub local_l1_cache_supported: i32,
    pub shared_mem_per_multiprocessor: u64,
    pub regs_per_multiprocessor: i32,
    pub managed_mem_supported: i32,
    pub is_multi_gpu_board: i32,
    pub multi_gpu_board_group_id: i32,
    /// `domain:bus:device.function` as reported by `cudaDeviceGetPCIBusId`.
    /// `None` when that call failed.
    pub pci_bus_id_str: Option<String>,
}

/// A single scalar property value, printed as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Scalar {
    #[display("{_0}")]
    Int(i32),
    #[display("{_0}")]
    Size(u64),
}

impl DeviceProperties {
    /// Compute capability as `(major, minor)`.
    pub fn compute_capability(&self) -> (i32, i32) {
        (self.major, self.minor)
    }

    /// All integer and size fields in native struct order, labelled with
    /// their `cudaDeviceProp` names. Arrays and strings are not included.
    pub fn scalar_fields(&self) -> Vec<(&'static str, Scalar)> {
        use Scalar::{Int, Size};

        vec![
            ("totalGlobalMem", Size(self.total_global_mem)),
            ("sharedMemPerBlock", Size(self.shared_mem_per_block)),
            ("regsPerBlock", Int(self.regs_per_block)),
            ("warpSize", Int(self.warp_size)),
            ("memPitch", Size(self.mem_pitch)),
            ("maxThreadsPerBlock", Int(self.max_threads_per_block)),
            ("clockRate", Int(self.clock_rate)),
            ("totalConstMem", Size(self.total_const_mem)),
            ("major", Int(self.major)),
            ("minor", Int(self.minor)),
            ("textureAlignment", Size(self.texture_alignment)),
            ("texturePitchAlignment", Size(self.texture_pitch_alignment)),
            ("deviceOverlap", Int(self.device_overlap)),
            ("multiProcessorCount", Int(self.multi_processor_count)),
            (
                "kernelExecTimeoutEnabled",
                Int(self.kernel_exec_timeout_enabled),
            ),
            ("integrated", Int(self.integrated)),
            ("canMapHostMemory", Int(self.can_map_host_memory)),
            ("computeMode", Int(self.compute_mode)),
            ("maxTexture1D", Int(self.max_texture_1d)),
            ("maxTexture1DMipmap", Int(self.max_texture_1d_mipmap)),
            ("maxTexture1DLinear", Int(self.max_texture_1d_linear)),
            ("maxTextureCubemap", Int(self.max_texture_cubemap)),
            ("maxSurface1D", Int(self.max_surface_1d)),
            ("maxSurfaceCubemap", Int(self.max_surface_cubemap)),
            ("surfaceAlignment", Size(self.surface_alignment)),
            ("concurrentKernels", Int(self.concurrent_kernels)),
            ("ECCEnabled", Int(self.ecc_enabled)),
            ("pciBusID", Int(self.pci_bus_id)),
            ("pciDeviceID", Int(self.pci_device_id)),
            ("pciDomainID", Int(self.pci_domain_id)),
            ("tccDriver", Int(self.tcc_driver)),
            ("asyncEngineCount", Int(self.async_engine_count)),
            ("unifiedAddressing", Int(self.unified_addressing)),
            ("memoryClockRate", Int(self.memory_clock_rate)),
            ("memoryBusWidth", Int(self.memory_bus_width)),
            ("l2CacheSize", Int(self.l2_cache_size)),
            (
                "maxThreadsPerMultiProcessor",
                Int(self.max_threads_per_multi_processor),
            ),
            (
                "streamPrioritiesSupported",
                Int(self.stream_priorities_supported),
            ),
            ("globalL1CacheSupported", Int(self.global_l1_cache_supported)),
            ("localL1CacheSupported", Int(self.local_l1_cache_supported)),
            (
                "sharedMemPerMultiprocessor",
                Size(self.shared_mem_per_multiprocessor),
            ),
            ("regsPerMultiprocessor", Int(self.regs_per_multiprocessor)),
            ("managedMemSupported", Int(self.managed_mem_supported)),
            ("isMultiGpuBoard", Int(self.is_multi_gpu_board)),
            ("multiGpuBoardGroupID", Int(self.multi_gpu_board_group_id)),
        ]
    }
}

/// Instantaneous utilization percentages reported by NVML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UtilizationSample {
    /// Percent of time a kernel was executing over the last sample period.
    pub gpu: u32,
    /// Percent of time device memory was being read or written.
    pub memory: u32,
}
