//! Batch CREATE2 kernel dispatch.
//!
//! Uploads (implementation, deployer) once per call, fans the batch out one
//! sub-range per compute lane and reads the encoded addresses back in index
//! order. Salts either come pre-padded from the host or are generated on the
//! GPU by the per-lane PCG32 stream.

use super::{GpuError, MetalContext};
use crate::hex as hexc;
use crate::predictor::Network;
use metal::{ComputePipelineState, MTLResourceOptions, MTLSize};
use std::mem;
use std::sync::Arc;

/// Contiguous predictions per compute lane; amortizes the per-lane address
/// decode and template assembly across several salts.
const ADDRESSES_PER_THREAD: u32 = 4;

/// Kernel parameter block; layout mirrors `Create2Params` in create2.metal.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct KernelParams {
    implementation: [u8; 40],
    deployer: [u8; 40],
    batch_size: u32,
    addresses_per_thread: u32,
    base_seed: u32,
    use_gpu_random: u32,
}

/// Per-prediction kernel output; layout mirrors `Create2Result`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct KernelResult {
    address: [u8; 64],
    salt_index: u32,
    address_len: u32,
}

/// GPU batch predictor bound to one network profile
pub struct GpuPredictor {
    context: Arc<MetalContext>,
    pipeline_state: ComputePipelineState,
    params_buffer: metal::Buffer,
    network: Network,
    max_batch_size: usize,
}

impl GpuPredictor {
    pub fn new(
        context: Arc<MetalContext>,
        network: Network,
        max_batch_size: usize,
    ) -> Result<Self, GpuError> {
        let shader_source = include_str!("create2.metal");

        let library = context
            .device
            .new_library_with_source(shader_source, &metal::CompileOptions::new())
            .map_err(|e| GpuError::ShaderCompilationFailed(e.to_string()))?;

        let kernel_name = match network {
            Network::Evm => "predict_create2_evm_batch",
            Network::Tron => "predict_create2_tron_batch",
        };

        let kernel = library
            .get_function(kernel_name, None)
            .map_err(|e| GpuError::ShaderCompilationFailed(format!("missing kernel: {}", e)))?;

        let pipeline_state = context
            .device
            .new_compute_pipeline_state_with_function(&kernel)
            .map_err(|e| GpuError::PipelineCreationFailed(e.to_string()))?;

        let params_buffer = context.device.new_buffer(
            mem::size_of::<KernelParams>() as u64,
            MTLResourceOptions::StorageModeShared,
        );

        Ok(GpuPredictor {
            context,
            pipeline_state,
            params_buffer,
            network,
            max_batch_size,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn device_name(&self) -> String {
        self.context.device_name()
    }

    /// Predict a batch with GPU-generated PCG32 salts.
    ///
    /// Each lane seeds its own stream from `(base_seed + lane, intra-group
    /// index)`, so lanes never collide and reruns with the same seed
    /// reproduce the same salts.
    pub fn predict_batch_random(
        &self,
        implementation: &str,
        deployer: &str,
        batch_size: usize,
        base_seed: u32,
    ) -> Result<Vec<String>, GpuError> {
        let params = self.build_params(implementation, deployer, batch_size, base_seed, true)?;
        // salts buffer is unused by the kernel in random mode but stays bound
        let salts_buffer = self.context.device.new_buffer(
            (32 * batch_size) as u64,
            MTLResourceOptions::StorageModeShared,
        );
        self.dispatch(params, &salts_buffer, batch_size)
    }

    /// Predict a batch for caller-supplied salts (each at most 32 UTF-8
    /// bytes; the host pads them to the 32-byte salt slots).
    pub fn predict_batch_with_salts(
        &self,
        implementation: &str,
        deployer: &str,
        salts: &[String],
    ) -> Result<Vec<String>, GpuError> {
        let params = self.build_params(implementation, deployer, salts.len(), 0, false)?;

        let salts_buffer = self.context.device.new_buffer(
            (32 * salts.len().max(1)) as u64,
            MTLResourceOptions::StorageModeShared,
        );

        unsafe {
            let base = salts_buffer.contents() as *mut u8;
            std::ptr::write_bytes(base, 0, 32 * salts.len());
            for (i, salt) in salts.iter().enumerate() {
                let bytes = salt.as_bytes();
                if bytes.len() > 32 {
                    return Err(GpuError::InvalidParams(format!(
                        "salt {} exceeds 32 bytes",
                        i
                    )));
                }
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), base.add(i * 32), bytes.len());
            }
        }

        self.dispatch(params, &salts_buffer, salts.len())
    }

    fn build_params(
        &self,
        implementation: &str,
        deployer: &str,
        batch_size: usize,
        base_seed: u32,
        use_gpu_random: bool,
    ) -> Result<KernelParams, GpuError> {
        if !hexc::is_hex_address(implementation) {
            return Err(GpuError::InvalidParams(format!(
                "invalid implementation address: {}",
                implementation
            )));
        }
        if !hexc::is_hex_address(deployer) {
            return Err(GpuError::InvalidParams(format!(
                "invalid deployer address: {}",
                deployer
            )));
        }
        if batch_size == 0 || batch_size > self.max_batch_size {
            return Err(GpuError::InvalidParams(format!(
                "batch size {} outside 1..={}",
                batch_size, self.max_batch_size
            )));
        }

        let mut params = KernelParams {
            implementation: [0u8; 40],
            deployer: [0u8; 40],
            batch_size: batch_size as u32,
            addresses_per_thread: ADDRESSES_PER_THREAD,
            base_seed,
            use_gpu_random: use_gpu_random as u32,
        };
        params
            .implementation
            .copy_from_slice(implementation[2..].as_bytes());
        params.deployer.copy_from_slice(deployer[2..].as_bytes());
        Ok(params)
    }

    fn dispatch(
        &self,
        params: KernelParams,
        salts_buffer: &metal::Buffer,
        batch_size: usize,
    ) -> Result<Vec<String>, GpuError> {
        unsafe {
            let ptr = self.params_buffer.contents() as *mut KernelParams;
            *ptr = params;
        }

        let results_size = mem::size_of::<KernelResult>() * batch_size;
        let results_buffer = self.context.device.new_buffer(
            results_size as u64,
            MTLResourceOptions::StorageModeShared,
        );
        unsafe {
            std::ptr::write_bytes(results_buffer.contents() as *mut u8, 0, results_size);
        }

        let command_buffer = self.context.command_queue.new_command_buffer();
        let encoder = command_buffer.new_compute_command_encoder();

        encoder.set_compute_pipeline_state(&self.pipeline_state);
        encoder.set_buffer(0, Some(&self.params_buffer), 0);
        encoder.set_buffer(1, Some(salts_buffer), 0);
        encoder.set_buffer(2, Some(&results_buffer), 0);

        let lanes_needed =
            (batch_size as u64 + ADDRESSES_PER_THREAD as u64 - 1) / ADDRESSES_PER_THREAD as u64;

        let max_per_group = self
            .pipeline_state
            .max_total_threads_per_threadgroup()
            .min(256);
        let threads_per_group = max_per_group.min(lanes_needed).max(1);

        let thread_group_size = MTLSize {
            width: threads_per_group,
            height: 1,
            depth: 1,
        };
        let thread_groups = MTLSize {
            width: (lanes_needed + threads_per_group - 1) / threads_per_group,
            height: 1,
            depth: 1,
        };

        encoder.dispatch_thread_groups(thread_groups, thread_group_size);
        encoder.end_encoding();

        command_buffer.commit();
        command_buffer.wait_until_completed();

        let mut addresses = Vec::with_capacity(batch_size);
        unsafe {
            let ptr = results_buffer.contents() as *const KernelResult;
            let slice = std::slice::from_raw_parts(ptr, batch_size);

            for (i, result) in slice.iter().enumerate() {
                let len = result.address_len as usize;
                if len == 0 || len > 64 {
                    return Err(GpuError::ResultDecodeFailed(format!(
                        "lane produced no address at index {}",
                        i
                    )));
                }
                let address = std::str::from_utf8(&result.address[..len])
                    .map_err(|e| {
                        GpuError::ResultDecodeFailed(format!("index {}: {}", i, e))
                    })?
                    .to_string();
                addresses.push(address);
            }
        }

        Ok(addresses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::initialize;

    #[test]
    fn test_gpu_predictor_creation() {
        if let Ok(context) = initialize() {
            let predictor = GpuPredictor::new(context, Network::Evm, 65536);
            match &predictor {
                Ok(p) => println!("GPU predictor created on: {}", p.device_name()),
                Err(e) => println!("GPU predictor creation failed: {}", e),
            }
            assert!(predictor.is_ok());
        } else {
            println!("Metal not available, skipping GPU predictor test");
        }
    }

    #[test]
    fn test_rejects_bad_inputs() {
        if let Ok(context) = initialize() {
            let predictor = GpuPredictor::new(context, Network::Evm, 1024).unwrap();
            let result = predictor.predict_batch_random(
                "0xbad",
                "0xfe15afcb5b9831b8af5fd984678250e95de8e312",
                16,
                1,
            );
            assert!(matches!(result, Err(GpuError::InvalidParams(_))));
        }
    }
}
