//! Wire schemas for every archived description type
//!
//! Each schema is a single function generic over the serializer mode, so the
//! measured size, the written bytes and the read values can never disagree.
//! Description names are deliberately absent from the schemas: a named
//! resource's name lives in the chunk directory, not in its data.

use crate::error::Result;
use crate::format::INVALID_OFFSET;
use crate::serializer::{Measure, Serializer, WriteCursor};
use crate::types::*;

/// Serializes `u32` count followed by the elements.
///
/// In read mode the vector is resized first; the count is bounds-checked
/// against the remaining buffer before any allocation happens.
pub(crate) fn serialize_vec<S, T, F>(s: &mut S, items: &mut Vec<T>, mut f: F) -> Result<()>
where
    S: Serializer,
    T: Default,
    F: FnMut(&mut S, &mut T) -> Result<()>,
{
    let mut count = items.len() as u32;
    s.u32(&mut count)?;
    s.check_array_len(count)?;
    if count as usize != items.len() {
        items.clear();
        items.resize_with(count as usize, T::default);
    }
    for item in items.iter_mut() {
        f(s, item)?;
    }
    Ok(())
}

/// Nullable index: absent is stored as the offset sentinel
fn serialize_opt_index<S: Serializer>(s: &mut S, v: &mut Option<u32>) -> Result<()> {
    let mut raw = v.unwrap_or(INVALID_OFFSET);
    s.u32(&mut raw)?;
    *v = (raw != INVALID_OFFSET).then_some(raw);
    Ok(())
}

pub fn serialize_shader_create_info<S: Serializer>(
    s: &mut S,
    ci: &mut ShaderCreateInfo,
) -> Result<()> {
    s.wire_enum(&mut ci.shader_type)?;
    s.string(&mut ci.entry_point)?;
    s.wire_enum(&mut ci.source_language)?;
    s.wire_enum(&mut ci.compiler)?;
    Ok(())
}

pub fn serialize_sampler_desc<S: Serializer>(s: &mut S, d: &mut SamplerDesc) -> Result<()> {
    s.string(&mut d.name)?;
    s.wire_enum(&mut d.min_filter)?;
    s.wire_enum(&mut d.mag_filter)?;
    s.wire_enum(&mut d.mip_filter)?;
    s.wire_enum(&mut d.address_u)?;
    s.wire_enum(&mut d.address_v)?;
    s.wire_enum(&mut d.address_w)?;
    s.u32(&mut d.flags)?;
    s.f32(&mut d.mip_lod_bias)?;
    s.u32(&mut d.max_anisotropy)?;
    s.wire_enum(&mut d.comparison_func)?;
    for c in &mut d.border_color {
        s.f32(c)?;
    }
    s.f32(&mut d.min_lod)?;
    s.f32(&mut d.max_lod)?;
    Ok(())
}

fn serialize_resource_desc<S: Serializer>(s: &mut S, d: &mut PipelineResourceDesc) -> Result<()> {
    s.string(&mut d.name)?;
    s.u32(&mut d.shader_stages.0)?;
    s.u32(&mut d.array_size)?;
    s.wire_enum(&mut d.resource_type)?;
    s.wire_enum(&mut d.var_type)?;
    s.u32(&mut d.flags)?;
    Ok(())
}

fn serialize_immutable_sampler<S: Serializer>(
    s: &mut S,
    d: &mut ImmutableSamplerDesc,
) -> Result<()> {
    s.u32(&mut d.shader_stages.0)?;
    s.string(&mut d.sampler_or_texture_name)?;
    serialize_sampler_desc(s, &mut d.desc)?;
    Ok(())
}

pub fn serialize_signature_desc<S: Serializer>(
    s: &mut S,
    d: &mut PipelineResourceSignatureDesc,
) -> Result<()> {
    // d.name is the directory key
    s.u8(&mut d.binding_index)?;
    s.boolean(&mut d.use_combined_texture_samplers)?;
    s.opt_string(&mut d.combined_sampler_suffix)?;
    serialize_vec(s, &mut d.resources, serialize_resource_desc)?;
    serialize_vec(s, &mut d.immutable_samplers, serialize_immutable_sampler)?;
    Ok(())
}

fn serialize_attachment_reference<S: Serializer>(
    s: &mut S,
    r: &mut AttachmentReference,
) -> Result<()> {
    s.u32(&mut r.attachment_index)?;
    s.wire_enum(&mut r.state)?;
    Ok(())
}

fn serialize_attachment_desc<S: Serializer>(
    s: &mut S,
    a: &mut RenderPassAttachmentDesc,
) -> Result<()> {
    s.wire_enum(&mut a.format)?;
    s.u8(&mut a.sample_count)?;
    s.wire_enum(&mut a.load_op)?;
    s.wire_enum(&mut a.store_op)?;
    s.wire_enum(&mut a.stencil_load_op)?;
    s.wire_enum(&mut a.stencil_store_op)?;
    s.wire_enum(&mut a.initial_state)?;
    s.wire_enum(&mut a.final_state)?;
    Ok(())
}

fn serialize_subpass_desc<S: Serializer>(s: &mut S, sp: &mut SubpassDesc) -> Result<()> {
    let mut has_resolve = sp.resolve_attachments.is_some();
    let mut has_depth_stencil = sp.depth_stencil_attachment.is_some();
    let mut has_shading_rate = sp.shading_rate_attachment.is_some();

    serialize_vec(s, &mut sp.input_attachments, serialize_attachment_reference)?;
    serialize_vec(s, &mut sp.render_target_attachments, serialize_attachment_reference)?;
    serialize_vec(s, &mut sp.preserve_attachments, |s, idx| s.u32(idx))?;
    s.boolean(&mut has_resolve)?;
    s.boolean(&mut has_depth_stencil)?;
    s.boolean(&mut has_shading_rate)?;

    if has_resolve {
        // One resolve reference per render target; the count is implied.
        let count = sp.render_target_attachments.len();
        let resolve = sp.resolve_attachments.get_or_insert_with(Vec::new);
        if resolve.len() != count {
            resolve.clear();
            resolve.resize_with(count, AttachmentReference::default);
        }
        for r in resolve.iter_mut() {
            serialize_attachment_reference(s, r)?;
        }
    } else {
        sp.resolve_attachments = None;
    }

    if has_depth_stencil {
        let r = sp.depth_stencil_attachment.get_or_insert_with(AttachmentReference::default);
        serialize_attachment_reference(s, r)?;
    } else {
        sp.depth_stencil_attachment = None;
    }

    if has_shading_rate {
        let sr = sp.shading_rate_attachment.get_or_insert_with(ShadingRateAttachment::default);
        serialize_attachment_reference(s, &mut sr.attachment)?;
        s.u32(&mut sr.tile_size[0])?;
        s.u32(&mut sr.tile_size[1])?;
    } else {
        sp.shading_rate_attachment = None;
    }

    Ok(())
}

fn serialize_subpass_dependency<S: Serializer>(
    s: &mut S,
    d: &mut SubpassDependencyDesc,
) -> Result<()> {
    s.u32(&mut d.src_subpass)?;
    s.u32(&mut d.dst_subpass)?;
    s.u32(&mut d.src_stage_mask)?;
    s.u32(&mut d.dst_stage_mask)?;
    s.u32(&mut d.src_access_mask)?;
    s.u32(&mut d.dst_access_mask)?;
    Ok(())
}

pub fn serialize_render_pass_desc<S: Serializer>(s: &mut S, d: &mut RenderPassDesc) -> Result<()> {
    // d.name is the directory key
    serialize_vec(s, &mut d.attachments, serialize_attachment_desc)?;
    serialize_vec(s, &mut d.subpasses, serialize_subpass_desc)?;
    serialize_vec(s, &mut d.dependencies, serialize_subpass_dependency)?;
    Ok(())
}

/// Fields shared by all four pipeline kinds, serialized ahead of the
/// kind-specific body. Resource signatures are referenced by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineCommonData {
    pub pipeline_type: PipelineType,
    pub flags: u32,
    pub signature_names: Vec<String>,
}

pub fn serialize_pipeline_common<S: Serializer>(
    s: &mut S,
    c: &mut PipelineCommonData,
) -> Result<()> {
    s.wire_enum(&mut c.pipeline_type)?;
    s.u32(&mut c.flags)?;
    serialize_vec(s, &mut c.signature_names, |s, name| s.string(name))?;
    Ok(())
}

fn serialize_layout_element<S: Serializer>(s: &mut S, e: &mut LayoutElement) -> Result<()> {
    s.string(&mut e.hlsl_semantic)?;
    s.u32(&mut e.input_index)?;
    s.u32(&mut e.buffer_slot)?;
    s.u32(&mut e.num_components)?;
    s.wire_enum(&mut e.value_type)?;
    s.boolean(&mut e.is_normalized)?;
    s.u32(&mut e.relative_offset)?;
    s.u32(&mut e.stride)?;
    s.wire_enum(&mut e.frequency)?;
    s.u32(&mut e.instance_data_step_rate)?;
    Ok(())
}

fn serialize_blend_state<S: Serializer>(s: &mut S, b: &mut BlendStateDesc) -> Result<()> {
    s.boolean(&mut b.alpha_to_coverage_enable)?;
    s.boolean(&mut b.independent_blend_enable)?;
    for rt in &mut b.render_targets {
        s.boolean(&mut rt.blend_enable)?;
        s.boolean(&mut rt.logic_operation_enable)?;
        s.wire_enum(&mut rt.src_blend)?;
        s.wire_enum(&mut rt.dest_blend)?;
        s.wire_enum(&mut rt.blend_op)?;
        s.wire_enum(&mut rt.src_blend_alpha)?;
        s.wire_enum(&mut rt.dest_blend_alpha)?;
        s.wire_enum(&mut rt.blend_op_alpha)?;
        s.wire_enum(&mut rt.logic_op)?;
        s.u8(&mut rt.render_target_write_mask)?;
    }
    Ok(())
}

fn serialize_rasterizer_state<S: Serializer>(s: &mut S, r: &mut RasterizerStateDesc) -> Result<()> {
    s.wire_enum(&mut r.fill_mode)?;
    s.wire_enum(&mut r.cull_mode)?;
    s.boolean(&mut r.front_counter_clockwise)?;
    s.boolean(&mut r.depth_clip_enable)?;
    s.boolean(&mut r.scissor_enable)?;
    s.boolean(&mut r.antialiased_line_enable)?;
    s.i32(&mut r.depth_bias)?;
    s.f32(&mut r.depth_bias_clamp)?;
    s.f32(&mut r.slope_scaled_depth_bias)?;
    Ok(())
}

fn serialize_stencil_op_desc<S: Serializer>(s: &mut S, d: &mut StencilOpDesc) -> Result<()> {
    s.wire_enum(&mut d.stencil_fail_op)?;
    s.wire_enum(&mut d.stencil_depth_fail_op)?;
    s.wire_enum(&mut d.stencil_pass_op)?;
    s.wire_enum(&mut d.stencil_func)?;
    Ok(())
}

fn serialize_depth_stencil_state<S: Serializer>(
    s: &mut S,
    d: &mut DepthStencilStateDesc,
) -> Result<()> {
    s.boolean(&mut d.depth_enable)?;
    s.boolean(&mut d.depth_write_enable)?;
    s.wire_enum(&mut d.depth_func)?;
    s.boolean(&mut d.stencil_enable)?;
    s.u8(&mut d.stencil_read_mask)?;
    s.u8(&mut d.stencil_write_mask)?;
    serialize_stencil_op_desc(s, &mut d.front_face)?;
    serialize_stencil_op_desc(s, &mut d.back_face)?;
    Ok(())
}

pub fn serialize_graphics_pipeline_desc<S: Serializer>(
    s: &mut S,
    d: &mut GraphicsPipelineDesc,
) -> Result<()> {
    serialize_blend_state(s, &mut d.blend_desc)?;
    s.u32(&mut d.sample_mask)?;
    serialize_rasterizer_state(s, &mut d.rasterizer_desc)?;
    serialize_depth_stencil_state(s, &mut d.depth_stencil_desc)?;
    serialize_vec(s, &mut d.input_layout.elements, serialize_layout_element)?;
    s.wire_enum(&mut d.primitive_topology)?;
    s.u8(&mut d.num_viewports)?;
    s.u8(&mut d.num_render_targets)?;
    s.u8(&mut d.subpass_index)?;
    s.u32(&mut d.shading_rate_flags)?;
    for fmt in &mut d.rtv_formats {
        s.wire_enum(fmt)?;
    }
    s.wire_enum(&mut d.dsv_format)?;
    s.u8(&mut d.sample_desc.count)?;
    s.u8(&mut d.sample_desc.quality)?;
    s.opt_string(&mut d.render_pass)?;
    Ok(())
}

pub fn serialize_tile_pipeline_desc<S: Serializer>(
    s: &mut S,
    d: &mut TilePipelineDesc,
) -> Result<()> {
    s.u8(&mut d.num_render_targets)?;
    s.u8(&mut d.sample_count)?;
    for fmt in &mut d.rtv_formats {
        s.wire_enum(fmt)?;
    }
    Ok(())
}

pub fn serialize_ray_tracing_pipeline_desc<S: Serializer>(
    s: &mut S,
    d: &mut RayTracingPipelineDesc,
) -> Result<()> {
    s.u16(&mut d.shader_record_size)?;
    s.u8(&mut d.max_recursion_depth)?;
    s.opt_string(&mut d.shader_record_name)?;
    s.u32(&mut d.max_attribute_size)?;
    s.u32(&mut d.max_payload_size)?;
    serialize_vec(s, &mut d.general_shaders, |s, g| {
        s.string(&mut g.name)?;
        s.u32(&mut g.shader)?;
        Ok(())
    })?;
    serialize_vec(s, &mut d.triangle_hit_shaders, |s, g| {
        s.string(&mut g.name)?;
        s.u32(&mut g.closest_hit_shader)?;
        serialize_opt_index(s, &mut g.any_hit_shader)?;
        Ok(())
    })?;
    serialize_vec(s, &mut d.procedural_hit_shaders, |s, g| {
        s.string(&mut g.name)?;
        s.u32(&mut g.intersection_shader)?;
        serialize_opt_index(s, &mut g.closest_hit_shader)?;
        serialize_opt_index(s, &mut g.any_hit_shader)?;
        Ok(())
    })?;
    Ok(())
}

/// The backend-specific payload of a pipeline: indices into the backend's
/// shader table, one per entry in the pipeline's shader list.
pub fn serialize_shader_indices<S: Serializer>(s: &mut S, indices: &mut Vec<u32>) -> Result<()> {
    serialize_vec(s, indices, |s, idx| s.u32(idx))
}

/// Contents of the debug-info chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveDebugInfo {
    pub api_version: u32,
    pub commit: Option<String>,
}

pub fn serialize_debug_info<S: Serializer>(s: &mut S, d: &mut ArchiveDebugInfo) -> Result<()> {
    s.u32(&mut d.api_version)?;
    s.opt_string(&mut d.commit)?;
    Ok(())
}

macro_rules! encode_with {
    ($value:expr, $schema:path) => {{
        let mut value = $value;
        let mut measure = Measure::new();
        $schema(&mut measure, &mut value)?;
        let mut buf = vec![0u8; measure.size()];
        let mut writer = WriteCursor::new(&mut buf);
        $schema(&mut writer, &mut value)?;
        debug_assert!(writer.is_full());
        Ok::<Vec<u8>, crate::error::ArchiveError>(buf)
    }};
}

/// Measures and writes one schema into a fresh buffer
pub(crate) mod encode {
    use super::*;

    pub fn signature_desc(desc: &PipelineResourceSignatureDesc) -> Result<Vec<u8>> {
        encode_with!(desc.clone(), serialize_signature_desc)
    }

    pub fn render_pass_desc(desc: &RenderPassDesc) -> Result<Vec<u8>> {
        encode_with!(desc.clone(), serialize_render_pass_desc)
    }

    pub fn shader_create_info(ci: &ShaderCreateInfo) -> Result<Vec<u8>> {
        encode_with!(ci.clone(), serialize_shader_create_info)
    }

    pub fn shader_indices(indices: &[u32]) -> Result<Vec<u8>> {
        encode_with!(indices.to_vec(), serialize_shader_indices)
    }

    pub fn debug_info(info: &ArchiveDebugInfo) -> Result<Vec<u8>> {
        encode_with!(info.clone(), serialize_debug_info)
    }

    pub fn graphics_shared(
        common: &PipelineCommonData,
        desc: &GraphicsPipelineDesc,
    ) -> Result<Vec<u8>> {
        let mut common = common.clone();
        let mut desc = desc.clone();
        let mut measure = Measure::new();
        serialize_pipeline_common(&mut measure, &mut common)?;
        serialize_graphics_pipeline_desc(&mut measure, &mut desc)?;
        let mut buf = vec![0u8; measure.size()];
        let mut writer = WriteCursor::new(&mut buf);
        serialize_pipeline_common(&mut writer, &mut common)?;
        serialize_graphics_pipeline_desc(&mut writer, &mut desc)?;
        debug_assert!(writer.is_full());
        Ok(buf)
    }

    pub fn compute_shared(common: &PipelineCommonData) -> Result<Vec<u8>> {
        encode_with!(common.clone(), serialize_pipeline_common)
    }

    pub fn tile_shared(common: &PipelineCommonData, desc: &TilePipelineDesc) -> Result<Vec<u8>> {
        let mut common = common.clone();
        let mut desc = desc.clone();
        let mut measure = Measure::new();
        serialize_pipeline_common(&mut measure, &mut common)?;
        serialize_tile_pipeline_desc(&mut measure, &mut desc)?;
        let mut buf = vec![0u8; measure.size()];
        let mut writer = WriteCursor::new(&mut buf);
        serialize_pipeline_common(&mut writer, &mut common)?;
        serialize_tile_pipeline_desc(&mut writer, &mut desc)?;
        debug_assert!(writer.is_full());
        Ok(buf)
    }

    pub fn ray_tracing_shared(
        common: &PipelineCommonData,
        desc: &RayTracingPipelineDesc,
    ) -> Result<Vec<u8>> {
        let mut common = common.clone();
        let mut desc = desc.clone();
        let mut measure = Measure::new();
        serialize_pipeline_common(&mut measure, &mut common)?;
        serialize_ray_tracing_pipeline_desc(&mut measure, &mut desc)?;
        let mut buf = vec![0u8; measure.size()];
        let mut writer = WriteCursor::new(&mut buf);
        serialize_pipeline_common(&mut writer, &mut common)?;
        serialize_ray_tracing_pipeline_desc(&mut writer, &mut desc)?;
        debug_assert!(writer.is_full());
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::ReadCursor;

    macro_rules! round_trip {
        ($value:expr, $schema:path) => {{
            let mut copy = $value.clone();
            let mut measure = Measure::new();
            $schema(&mut measure, &mut copy).unwrap();
            let mut buf = vec![0u8; measure.size()];
            let mut writer = WriteCursor::new(&mut buf);
            $schema(&mut writer, &mut copy).unwrap();
            assert!(writer.is_full());

            let mut decoded = Default::default();
            let mut reader = ReadCursor::new(&buf);
            $schema(&mut reader, &mut decoded).unwrap();
            assert!(reader.is_end());
            decoded
        }};
    }

    #[test]
    fn sampler_desc_round_trip() {
        let desc = SamplerDesc {
            name: "linear clamp".into(),
            min_filter: FilterType::Anisotropic,
            max_anisotropy: 16,
            border_color: [0.25, 0.5, 0.75, 1.0],
            mip_lod_bias: -0.5,
            ..Default::default()
        };
        let decoded: SamplerDesc = round_trip!(desc, serialize_sampler_desc);
        assert_eq!(decoded, desc);
    }

    #[test]
    fn signature_desc_round_trip() {
        let desc = PipelineResourceSignatureDesc {
            name: "ignored".into(),
            binding_index: 2,
            use_combined_texture_samplers: true,
            combined_sampler_suffix: Some("_sampler".into()),
            resources: vec![
                PipelineResourceDesc::new(
                    ShaderStages::VERTEX,
                    "R1",
                    1,
                    ShaderResourceType::TextureSrv,
                ),
                PipelineResourceDesc::new(
                    ShaderStages::PIXEL,
                    "R2",
                    3,
                    ShaderResourceType::Sampler,
                ),
            ],
            immutable_samplers: vec![ImmutableSamplerDesc::new(
                ShaderStages::VERTEX | ShaderStages::PIXEL,
                "S1",
                SamplerDesc::default(),
            )],
        };
        let decoded: PipelineResourceSignatureDesc = round_trip!(desc, serialize_signature_desc);
        // Everything except the directory-key name survives.
        assert_eq!(decoded.binding_index, desc.binding_index);
        assert_eq!(decoded.resources, desc.resources);
        assert_eq!(decoded.immutable_samplers, desc.immutable_samplers);
        assert_eq!(decoded.combined_sampler_suffix, desc.combined_sampler_suffix);
    }

    #[test]
    fn subpass_optional_members_round_trip() {
        let desc = RenderPassDesc {
            name: String::new(),
            attachments: vec![RenderPassAttachmentDesc {
                format: TextureFormat::Rgba8Unorm,
                final_state: ResourceState::Present,
                ..Default::default()
            }],
            subpasses: vec![SubpassDesc {
                render_target_attachments: vec![AttachmentReference {
                    attachment_index: 0,
                    state: ResourceState::RenderTarget,
                }],
                resolve_attachments: Some(vec![AttachmentReference {
                    attachment_index: 0,
                    state: ResourceState::ResolveDest,
                }]),
                depth_stencil_attachment: Some(AttachmentReference {
                    attachment_index: 0,
                    state: ResourceState::DepthWrite,
                }),
                shading_rate_attachment: Some(ShadingRateAttachment {
                    attachment: AttachmentReference::default(),
                    tile_size: [16, 16],
                }),
                ..Default::default()
            }],
            dependencies: vec![SubpassDependencyDesc {
                src_subpass: 0,
                dst_subpass: INVALID_OFFSET,
                ..Default::default()
            }],
        };
        let decoded: RenderPassDesc = round_trip!(desc, serialize_render_pass_desc);
        assert_eq!(decoded, desc);
    }

    #[test]
    fn ray_tracing_desc_round_trip() {
        let desc = RayTracingPipelineDesc {
            shader_record_name: None,
            shader_record_size: 32,
            max_recursion_depth: 4,
            max_attribute_size: 16,
            max_payload_size: 64,
            general_shaders: vec![RayTracingGeneralShaderGroup {
                name: "main_gen".into(),
                shader: 0,
            }],
            triangle_hit_shaders: vec![RayTracingTriangleHitShaderGroup {
                name: "tri_hit".into(),
                closest_hit_shader: 1,
                any_hit_shader: None,
            }],
            procedural_hit_shaders: vec![RayTracingProceduralHitShaderGroup {
                name: "proc_hit".into(),
                intersection_shader: 2,
                closest_hit_shader: Some(3),
                any_hit_shader: None,
            }],
        };
        let decoded: RayTracingPipelineDesc = round_trip!(desc, serialize_ray_tracing_pipeline_desc);
        assert_eq!(decoded, desc);
    }

    #[test]
    fn truncated_signature_is_corrupt() {
        let bytes = encode::signature_desc(&PipelineResourceSignatureDesc {
            resources: vec![PipelineResourceDesc::default()],
            ..Default::default()
        })
        .unwrap();
        let mut decoded = PipelineResourceSignatureDesc::default();
        let mut reader = ReadCursor::new(&bytes[..bytes.len() - 3]);
        assert!(serialize_signature_desc(&mut reader, &mut decoded).is_err());
    }

    #[test]
    fn huge_array_count_is_rejected_before_allocation() {
        // count claims u32::MAX entries with a four-byte body
        let bytes = u32::MAX.to_le_bytes();
        let mut indices = Vec::new();
        let mut reader = ReadCursor::new(&bytes);
        assert!(serialize_shader_indices(&mut reader, &mut indices).is_err());
    }
}
