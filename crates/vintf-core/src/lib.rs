//! Operations over the vintf model.
//!
//! This crate combines framework matrix fragments for a device level
//! (`combine`), folds manifest fragments and kernel config files into single
//! documents (`assemble`), checks manifests against matrices and running
//! kernels against kernel requirements (`compat`, `runtime`), detects
//! deprecated instances still in use (`deprecation`), and loads the device's
//! documents through injected collaborators behind a per-slot cache
//! (`VintfObject`).

pub mod assemble;
pub mod cache;
pub mod combine;
pub mod compat;
pub mod config;
pub mod deprecation;
pub mod fs;
pub mod object;
pub mod properties;
pub mod runtime;

pub use assemble::{assemble_kernel, assemble_manifest, AssembleError};
pub use cache::CachedSlot;
pub use combine::{combine, CombineError, Named};
pub use compat::{check_compatibility, CheckError, CheckOptions, CompatibilityReport, Mismatch};
pub use config::{ConfigError, VintfConfig};
pub use deprecation::{
    check_deprecation, manifest_instance_query, DeprecatedInstance, DeprecationError,
    DeprecationReport, ServedInstance,
};
pub use fs::{FileSystem, FsError, MemoryFileSystem, RootedFileSystem};
pub use object::{CompatibilityResult, VintfObject};
pub use properties::{PropertyFetcher, StaticProperties};
pub use runtime::{check_kernel, KernelCheckReport, KernelInfo, KernelMismatch};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("schema error: {0}")]
    Schema(#[from] vintf_schema::SchemaError),
    #[error("decode error: {0}")]
    Codec(#[from] vintf_schema::CodecError),
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: vintf_schema::CodecError,
    },
    #[error("combine error: {0}")]
    Combine(#[from] CombineError),
    #[error("assemble error: {0}")]
    Assemble(#[from] AssembleError),
    #[error("check error: {0}")]
    Check(#[from] CheckError),
    #[error("deprecation error: {0}")]
    Deprecation(#[from] DeprecationError),
    #[error("filesystem error: {0}")]
    Fs(#[from] FsError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A failure remembered by a cache slot from an earlier fetch.
    #[error("{0}")]
    Cached(String),
}
