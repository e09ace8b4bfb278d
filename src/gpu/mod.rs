//! GPU acceleration using Metal for macOS.
//!
//! Runs the whole CREATE2 derivation on GPU compute lanes: salt generation,
//! bytecode assembly, both Keccak-256 stages and the address encoding happen
//! inside the kernel with lane-private buffers only.

pub mod pipeline;

use metal::{CommandQueue, Device};
use std::sync::Arc;

/// Metal GPU context holding device and command queue
pub struct MetalContext {
    pub device: Device,
    pub command_queue: CommandQueue,
}

/// Error types for GPU operations
#[derive(Debug)]
pub enum GpuError {
    MetalNotAvailable,
    ShaderCompilationFailed(String),
    PipelineCreationFailed(String),
    InvalidParams(String),
    ResultDecodeFailed(String),
}

impl std::fmt::Display for GpuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuError::MetalNotAvailable => write!(f, "Metal is not available on this system"),
            GpuError::ShaderCompilationFailed(msg) => {
                write!(f, "Shader compilation failed: {}", msg)
            }
            GpuError::PipelineCreationFailed(msg) => {
                write!(f, "Pipeline creation failed: {}", msg)
            }
            GpuError::InvalidParams(msg) => write!(f, "Invalid kernel parameters: {}", msg),
            GpuError::ResultDecodeFailed(msg) => {
                write!(f, "Failed to decode kernel results: {}", msg)
            }
        }
    }
}

impl std::error::Error for GpuError {}

impl MetalContext {
    /// Create a new Metal context with the default device
    pub fn new() -> Result<Self, GpuError> {
        let device = Device::system_default().ok_or(GpuError::MetalNotAvailable)?;
        let command_queue = device.new_command_queue();

        Ok(MetalContext {
            device,
            command_queue,
        })
    }

    /// Check if Metal is available on this system
    pub fn is_available() -> bool {
        Device::system_default().is_some()
    }

    /// Get device name for logging
    pub fn device_name(&self) -> String {
        self.device.name().to_string()
    }
}

/// Check if GPU acceleration is available
pub fn is_gpu_available() -> bool {
    MetalContext::is_available()
}

/// Initialize a shared GPU context
pub fn initialize() -> Result<Arc<MetalContext>, GpuError> {
    MetalContext::new().map(Arc::new)
}

pub use pipeline::GpuPredictor;
