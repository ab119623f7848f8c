//! Renderarc — a device-object archive
//!
//! A self-describing binary container that serializes render-device objects
//! (resource signatures, render passes, pipelines of four kinds, shaders)
//! once, together with specialized data for up to six rendering backends, and
//! reconstructs them at load time with per-name deduplication and thread-safe
//! live-object caching.
//!
//! ## Features
//!
//! - **Single-schema serialization**: every description type has one schema
//!   that measures, writes and reads, so sizes and bytes can never disagree
//! - **Chunked layout**: kind-tagged chunks with name directories, a shared
//!   backend-agnostic data region and one block per backend
//! - **Shader deduplication**: byte-identical shaders are stored once per
//!   backend and referenced by index
//! - **Lazy, concurrent loading**: objects are materialized on request and
//!   cached by weak reference; readers run in parallel
//!
//! ## Modules
//!
//! - [`archiver`] - writer: accumulates objects, lays out and emits archives
//! - [`dearchiver`] - reader: validates, materializes and caches objects
//! - [`serializer`] - the tri-mode (measure/write/read) serializer
//! - [`format`] - on-disk records and constants
//! - [`types`] - backend-agnostic description types
//! - [`schema`] - wire schemas binding the two together
//! - [`device`] - traits the embedding engine implements
//! - [`source`] - byte source/sink abstractions
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use renderarc::{
//!     Archiver, Backend, BackendFlags, Dearchiver, MemoryByteSource,
//!     PipelineOverrides,
//! };
//! # fn patcher() -> Arc<dyn renderarc::ShaderPatcher> { unimplemented!() }
//! # fn device() -> Arc<dyn renderarc::RenderDevice> { unimplemented!() }
//! # fn pipeline() -> renderarc::GraphicsPipelineArchiveInfo { unimplemented!() }
//!
//! # fn main() -> renderarc::Result<()> {
//! let mut archiver = Archiver::new(patcher());
//! archiver.add_graphics_pipeline(&pipeline(), BackendFlags::single(Backend::Vulkan))?;
//! let blob = archiver.serialize_to_blob()?;
//!
//! let reader = Dearchiver::new(Arc::new(MemoryByteSource::new(blob)), Backend::Vulkan)?;
//! let pso = reader.unpack_graphics_pipeline("opaque", device().as_ref(), &PipelineOverrides::default())?;
//! # let _ = pso;
//! # Ok(())
//! # }
//! ```

pub mod archiver;
pub mod backend;
pub mod dearchiver;
pub mod device;
pub mod error;
pub mod format;
pub mod schema;
pub mod serializer;
pub mod source;
pub mod types;

pub use archiver::{
    Archiver, ComputePipelineArchiveInfo, GraphicsPipelineArchiveInfo,
    RayTracingPipelineArchiveInfo, ShaderRecorder, SignatureArchiveData,
    TilePipelineArchiveInfo,
};
pub use backend::{Backend, BackendFlags, BACKEND_COUNT};
pub use dearchiver::{
    AttachmentOverride, Dearchiver, PipelineOverrides, RenderPassOverride, RenderPassOverrides,
    RenderTargetOverride,
};
pub use device::{
    ComputePipelineCreateInfo, GraphicsPipelineCreateInfo, PatchOutput, Pipeline,
    RayTracingPipelineCreateInfo, RenderDevice, RenderPass, ResourceSignature, Shader,
    ShaderPatcher, ShaderStageData, SignatureBackendData, TilePipelineCreateInfo,
};
pub use error::{ArchiveError, Result};
pub use format::{ARCHIVE_MAGIC, ARCHIVE_VERSION};
pub use schema::ArchiveDebugInfo;
pub use source::{ByteSink, ByteSource, MemoryByteSource};
