//! Shared test doubles: a recording render device and a pass-through patcher

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use renderarc::types::*;
use renderarc::{
    ComputePipelineCreateInfo, GraphicsPipelineCreateInfo, PatchOutput, Pipeline,
    RayTracingPipelineCreateInfo, RenderDevice, RenderPass, ResourceSignature, Result, Shader,
    ShaderPatcher, ShaderStageData, SignatureBackendData, TilePipelineCreateInfo,
};

pub struct StubShader {
    pub info: ShaderCreateInfo,
    pub payload: Vec<u8>,
}

impl Shader for StubShader {
    fn shader_type(&self) -> ShaderType {
        self.info.shader_type
    }

    fn entry_point(&self) -> &str {
        &self.info.entry_point
    }
}

pub struct StubSignature {
    pub desc: PipelineResourceSignatureDesc,
    pub backend_data: Vec<u8>,
}

impl ResourceSignature for StubSignature {
    fn name(&self) -> &str {
        &self.desc.name
    }
}

pub struct StubRenderPass {
    pub desc: RenderPassDesc,
}

impl RenderPass for StubRenderPass {
    fn name(&self) -> &str {
        &self.desc.name
    }
}

pub struct StubPipeline {
    pub name: String,
    pub ty: PipelineType,
    pub signatures: Vec<Arc<dyn ResourceSignature>>,
    pub shaders: Vec<Arc<dyn Shader>>,
    pub render_pass: Option<Arc<dyn RenderPass>>,
}

impl Pipeline for StubPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn pipeline_type(&self) -> PipelineType {
        self.ty
    }
}

/// Everything the device saw when a pipeline was created
#[derive(Clone)]
pub struct PipelineRecord {
    pub name: String,
    pub ty: PipelineType,
    pub blend: Option<BlendStateDesc>,
    pub sample_count: Option<u8>,
    pub signatures: Vec<String>,
    pub shaders: Vec<(ShaderType, String)>,
    pub render_pass: Option<String>,
}

/// Recording factory: produces stub objects and keeps a log of every call
#[derive(Default)]
pub struct NullDevice {
    pub shader_calls: AtomicUsize,
    pub signature_calls: AtomicUsize,
    pub render_pass_calls: AtomicUsize,
    pub pipeline_calls: AtomicUsize,
    pub created_pipelines: Mutex<Vec<PipelineRecord>>,
    pub created_signatures: Mutex<Vec<(String, Vec<u8>)>>,
    pub created_render_passes: Mutex<Vec<RenderPassDesc>>,
}

impl NullDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(NullDevice::default())
    }

    pub fn last_pipeline(&self) -> PipelineRecord {
        self.created_pipelines
            .lock()
            .last()
            .expect("no pipeline was created")
            .clone()
    }
}

impl RenderDevice for NullDevice {
    fn create_shader(&self, ci: &ShaderCreateInfo, payload: &[u8]) -> Result<Arc<dyn Shader>> {
        self.shader_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(StubShader {
            info: ci.clone(),
            payload: payload.to_vec(),
        }))
    }

    fn create_resource_signature(
        &self,
        desc: &PipelineResourceSignatureDesc,
        backend_data: &[u8],
    ) -> Result<Arc<dyn ResourceSignature>> {
        self.signature_calls.fetch_add(1, Ordering::SeqCst);
        self.created_signatures
            .lock()
            .push((desc.name.clone(), backend_data.to_vec()));
        Ok(Arc::new(StubSignature {
            desc: desc.clone(),
            backend_data: backend_data.to_vec(),
        }))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        self.render_pass_calls.fetch_add(1, Ordering::SeqCst);
        self.created_render_passes.lock().push(desc.clone());
        Ok(Arc::new(StubRenderPass { desc: desc.clone() }))
    }

    fn create_graphics_pipeline(
        &self,
        ci: GraphicsPipelineCreateInfo,
    ) -> Result<Arc<dyn Pipeline>> {
        self.pipeline_calls.fetch_add(1, Ordering::SeqCst);
        let mut shaders = Vec::new();
        for shader in [&ci.vs, &ci.ps, &ci.gs, &ci.hs, &ci.ds, &ci.amplification, &ci.mesh]
            .into_iter()
            .flatten()
        {
            shaders.push((shader.shader_type(), shader.entry_point().to_string()));
        }
        self.created_pipelines.lock().push(PipelineRecord {
            name: ci.name.clone(),
            ty: PipelineType::Graphics,
            blend: Some(ci.desc.blend_desc.clone()),
            sample_count: Some(ci.desc.sample_desc.count),
            signatures: ci.signatures.iter().map(|s| s.name().to_string()).collect(),
            shaders,
            render_pass: ci.render_pass.as_ref().map(|rp| rp.name().to_string()),
        });
        let shaders = [ci.vs, ci.ps, ci.gs, ci.hs, ci.ds, ci.amplification, ci.mesh]
            .into_iter()
            .flatten()
            .collect();
        Ok(Arc::new(StubPipeline {
            name: ci.name,
            ty: PipelineType::Graphics,
            signatures: ci.signatures,
            shaders,
            render_pass: ci.render_pass,
        }))
    }

    fn create_compute_pipeline(
        &self,
        ci: ComputePipelineCreateInfo,
    ) -> Result<Arc<dyn Pipeline>> {
        self.pipeline_calls.fetch_add(1, Ordering::SeqCst);
        self.created_pipelines.lock().push(PipelineRecord {
            name: ci.name.clone(),
            ty: PipelineType::Compute,
            blend: None,
            sample_count: None,
            signatures: ci.signatures.iter().map(|s| s.name().to_string()).collect(),
            shaders: vec![(ci.cs.shader_type(), ci.cs.entry_point().to_string())],
            render_pass: None,
        });
        Ok(Arc::new(StubPipeline {
            name: ci.name,
            ty: PipelineType::Compute,
            signatures: ci.signatures,
            shaders: vec![ci.cs],
            render_pass: None,
        }))
    }

    fn create_tile_pipeline(&self, ci: TilePipelineCreateInfo) -> Result<Arc<dyn Pipeline>> {
        self.pipeline_calls.fetch_add(1, Ordering::SeqCst);
        self.created_pipelines.lock().push(PipelineRecord {
            name: ci.name.clone(),
            ty: PipelineType::Tile,
            blend: None,
            sample_count: Some(ci.desc.sample_count),
            signatures: ci.signatures.iter().map(|s| s.name().to_string()).collect(),
            shaders: vec![(ci.ts.shader_type(), ci.ts.entry_point().to_string())],
            render_pass: None,
        });
        Ok(Arc::new(StubPipeline {
            name: ci.name,
            ty: PipelineType::Tile,
            signatures: ci.signatures,
            shaders: vec![ci.ts],
            render_pass: None,
        }))
    }

    fn create_ray_tracing_pipeline(
        &self,
        ci: RayTracingPipelineCreateInfo,
    ) -> Result<Arc<dyn Pipeline>> {
        self.pipeline_calls.fetch_add(1, Ordering::SeqCst);
        self.created_pipelines.lock().push(PipelineRecord {
            name: ci.name.clone(),
            ty: PipelineType::RayTracing,
            blend: None,
            sample_count: None,
            signatures: ci.signatures.iter().map(|s| s.name().to_string()).collect(),
            shaders: ci
                .shaders
                .iter()
                .map(|s| (s.shader_type(), s.entry_point().to_string()))
                .collect(),
            render_pass: None,
        });
        Ok(Arc::new(StubPipeline {
            name: ci.name,
            ty: PipelineType::RayTracing,
            signatures: ci.signatures,
            shaders: ci.shaders,
            render_pass: None,
        }))
    }
}

/// Patcher that archives each stage byte-for-byte and synthesizes a minimal
/// default signature when the pipeline declares none
pub struct PassthroughPatcher;

impl ShaderPatcher for PassthroughPatcher {
    fn patch_pipeline(
        &self,
        _backend: renderarc::Backend,
        _pipeline_type: PipelineType,
        _pipeline_name: &str,
        stages: &[ShaderStageData],
        default_signature_name: Option<&str>,
        recorder: &mut renderarc::ShaderRecorder<'_>,
    ) -> Result<PatchOutput> {
        let mut shader_indices = Vec::new();
        for stage in stages {
            shader_indices.push(recorder.serialize_shader(&stage.info, &stage.payload)?);
        }
        Ok(PatchOutput {
            shader_indices,
            default_signature: default_signature_name.map(|name| SignatureBackendData {
                desc: PipelineResourceSignatureDesc {
                    name: name.to_string(),
                    ..Default::default()
                },
                data: b"default-signature".to_vec(),
            }),
        })
    }
}

/// Patcher that also records every index it got back from the recorder
#[derive(Default)]
pub struct RecordingPatcher {
    pub indices: Mutex<Vec<u32>>,
}

impl ShaderPatcher for RecordingPatcher {
    fn patch_pipeline(
        &self,
        _backend: renderarc::Backend,
        _pipeline_type: PipelineType,
        _pipeline_name: &str,
        stages: &[ShaderStageData],
        default_signature_name: Option<&str>,
        recorder: &mut renderarc::ShaderRecorder<'_>,
    ) -> Result<PatchOutput> {
        let mut shader_indices = Vec::new();
        for stage in stages {
            let index = recorder.serialize_shader(&stage.info, &stage.payload)?;
            self.indices.lock().push(index);
            shader_indices.push(index);
        }
        Ok(PatchOutput {
            shader_indices,
            default_signature: default_signature_name.map(|name| SignatureBackendData {
                desc: PipelineResourceSignatureDesc {
                    name: name.to_string(),
                    ..Default::default()
                },
                data: b"default-signature".to_vec(),
            }),
        })
    }
}

pub fn vertex_stage(source: &str) -> ShaderStageData {
    ShaderStageData {
        info: ShaderCreateInfo::new(ShaderType::Vertex, "main"),
        payload: source.as_bytes().to_vec(),
    }
}

pub fn pixel_stage(source: &str) -> ShaderStageData {
    ShaderStageData {
        info: ShaderCreateInfo::new(ShaderType::Pixel, "main"),
        payload: source.as_bytes().to_vec(),
    }
}

pub fn compute_stage(source: &str) -> ShaderStageData {
    ShaderStageData {
        info: ShaderCreateInfo::new(ShaderType::Compute, "main"),
        payload: source.as_bytes().to_vec(),
    }
}

pub fn simple_signature(name: &str, backend: renderarc::Backend) -> renderarc::SignatureArchiveData {
    renderarc::SignatureArchiveData::new(PipelineResourceSignatureDesc {
        name: name.to_string(),
        binding_index: 0,
        resources: vec![PipelineResourceDesc::new(
            ShaderStages::VERTEX | ShaderStages::PIXEL,
            "g_Texture",
            1,
            ShaderResourceType::TextureSrv,
        )],
        ..Default::default()
    })
    .with_backend_data(backend, format!("sig-bytes-{name}").into_bytes())
}
