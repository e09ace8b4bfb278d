//! Deterministic CREATE2 minimal-proxy address prediction for EVM and Tron.
//!
//! This library computes the deployment address an EIP-1167 minimal-proxy
//! contract would receive from a CREATE2 call, without ever touching a chain.
//! Around that core sits a batch harness: a rayon CPU dispatcher, a Metal GPU
//! variant (macOS), and pluggable salt generation.

pub mod hex;
pub mod address;
pub mod predictor;
pub mod salt;
pub mod dispatch;
pub mod stats;

#[cfg(target_os = "macos")]
pub mod gpu;

pub use address::{base58check, double_sha256, keccak256, to_checksum_address};
pub use dispatch::{run_batch, BatchReport, DispatchConfig, DispatchError};
pub use predictor::{
    Create2Predictor, Network, PredictError,
    PROXY_PREFIX, PROXY_SUFFIX_EVM, PROXY_SUFFIX_TRON,
};
pub use salt::{Pcg32, SaltError, SaltSource, SaltStrategy};
pub use stats::{format_number, format_speed, PredictStats};

#[cfg(target_os = "macos")]
pub use gpu::{is_gpu_available, GpuError, MetalContext};
