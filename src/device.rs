//! External collaborator interfaces
//!
//! The archive core never talks to a real rendering backend. On the write
//! side it drives a [`ShaderPatcher`] that turns pipeline inputs into opaque
//! per-backend bytes; on the read side it drives a [`RenderDevice`] factory
//! that turns deserialized descriptions back into live objects. Both are
//! supplied by the embedding engine.

use std::sync::Arc;

use crate::archiver::ShaderRecorder;
use crate::backend::Backend;
use crate::error::Result;
use crate::types::{
    GraphicsPipelineDesc, PipelineResourceSignatureDesc, PipelineType, RayTracingPipelineDesc,
    RenderPassDesc, ShaderCreateInfo, ShaderType, TilePipelineDesc,
};

/// Live shader produced by a [`RenderDevice`]
pub trait Shader: Send + Sync {
    fn shader_type(&self) -> ShaderType;
    fn entry_point(&self) -> &str;
}

/// Live pipeline resource signature
pub trait ResourceSignature: Send + Sync {
    fn name(&self) -> &str;
}

/// Live render pass
pub trait RenderPass: Send + Sync {
    fn name(&self) -> &str;
}

/// Live pipeline state of any kind
pub trait Pipeline: Send + Sync {
    fn name(&self) -> &str;
    fn pipeline_type(&self) -> PipelineType;
}

impl std::fmt::Debug for dyn Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name())
            .field("pipeline_type", &self.pipeline_type())
            .finish()
    }
}

/// Inputs for creating a graphics pipeline from unpacked archive data
pub struct GraphicsPipelineCreateInfo {
    pub name: String,
    pub desc: GraphicsPipelineDesc,
    pub signatures: Vec<Arc<dyn ResourceSignature>>,
    pub render_pass: Option<Arc<dyn RenderPass>>,
    pub vs: Option<Arc<dyn Shader>>,
    pub ps: Option<Arc<dyn Shader>>,
    pub gs: Option<Arc<dyn Shader>>,
    pub hs: Option<Arc<dyn Shader>>,
    pub ds: Option<Arc<dyn Shader>>,
    pub amplification: Option<Arc<dyn Shader>>,
    pub mesh: Option<Arc<dyn Shader>>,
}

pub struct ComputePipelineCreateInfo {
    pub name: String,
    pub signatures: Vec<Arc<dyn ResourceSignature>>,
    pub cs: Arc<dyn Shader>,
}

pub struct TilePipelineCreateInfo {
    pub name: String,
    pub desc: TilePipelineDesc,
    pub signatures: Vec<Arc<dyn ResourceSignature>>,
    pub ts: Arc<dyn Shader>,
}

/// Inputs for creating a ray tracing pipeline.
///
/// `shaders` is the pipeline's shader list; group members in `desc` index
/// into it.
pub struct RayTracingPipelineCreateInfo {
    pub name: String,
    pub desc: RayTracingPipelineDesc,
    pub signatures: Vec<Arc<dyn ResourceSignature>>,
    pub shaders: Vec<Arc<dyn Shader>>,
}

/// Backend object factory consumed by the dearchiver.
///
/// Implementations materialize live objects from descriptions plus the
/// backend-specific bytes the archive stored for them. Factories are invoked
/// outside the dearchiver's locks and must tolerate concurrent calls.
pub trait RenderDevice: Send + Sync {
    /// `payload` is the shader source or bytecode exactly as archived
    fn create_shader(&self, ci: &ShaderCreateInfo, payload: &[u8]) -> Result<Arc<dyn Shader>>;

    /// `backend_data` is this backend's serialized signature bytes
    fn create_resource_signature(
        &self,
        desc: &PipelineResourceSignatureDesc,
        backend_data: &[u8],
    ) -> Result<Arc<dyn ResourceSignature>>;

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>>;

    fn create_graphics_pipeline(
        &self,
        ci: GraphicsPipelineCreateInfo,
    ) -> Result<Arc<dyn Pipeline>>;

    fn create_compute_pipeline(&self, ci: ComputePipelineCreateInfo)
        -> Result<Arc<dyn Pipeline>>;

    fn create_tile_pipeline(&self, ci: TilePipelineCreateInfo) -> Result<Arc<dyn Pipeline>>;

    fn create_ray_tracing_pipeline(
        &self,
        ci: RayTracingPipelineCreateInfo,
    ) -> Result<Arc<dyn Pipeline>>;
}

/// One shader stage of a pipeline being archived: its description plus the
/// source or bytecode the patcher will specialize per backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderStageData {
    pub info: ShaderCreateInfo,
    pub payload: Vec<u8>,
}

/// Default resource signature synthesized by a patcher for a pipeline that
/// declares none, together with the patching backend's signature bytes
pub struct SignatureBackendData {
    pub desc: PipelineResourceSignatureDesc,
    pub data: Vec<u8>,
}

/// Result of patching one pipeline for one backend
pub struct PatchOutput {
    /// Backend shader-table indices of the pipeline's shaders, one per stage,
    /// obtained from [`ShaderRecorder::serialize_shader`]
    pub shader_indices: Vec<u32>,
    /// Present when the patcher synthesized a default signature
    pub default_signature: Option<SignatureBackendData>,
}

/// Backend shader specializer consumed by the archiver.
///
/// A pure function from pipeline inputs to per-backend bytes: it compiles or
/// transforms each stage for the given backend and records the result through
/// the [`ShaderRecorder`], which deduplicates content and hands back indices.
pub trait ShaderPatcher: Send + Sync {
    /// `default_signature_name` is `Some` iff the pipeline declares no
    /// explicit resource signatures; the patcher must then synthesize a
    /// default one under that name.
    fn patch_pipeline(
        &self,
        backend: Backend,
        pipeline_type: PipelineType,
        pipeline_name: &str,
        stages: &[ShaderStageData],
        default_signature_name: Option<&str>,
        recorder: &mut ShaderRecorder<'_>,
    ) -> Result<PatchOutput>;
}
