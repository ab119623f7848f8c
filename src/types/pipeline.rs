//! Pipeline state descriptions for the four archived pipeline kinds

use super::{ComparisonFunc, SampleDesc, TextureFormat, MAX_RENDER_TARGETS};
use crate::serializer::wire_enum;

wire_enum! {
    pub enum BlendFactor: u8 {
        Undefined = 0,
        Zero = 1,
        One = 2,
        SrcColor = 3,
        InvSrcColor = 4,
        SrcAlpha = 5,
        InvSrcAlpha = 6,
        DestColor = 7,
        InvDestColor = 8,
        DestAlpha = 9,
        InvDestAlpha = 10,
        BlendFactor = 11,
        InvBlendFactor = 12,
    }
}

wire_enum! {
    pub enum BlendOperation: u8 {
        Undefined = 0,
        Add = 1,
        Subtract = 2,
        RevSubtract = 3,
        Min = 4,
        Max = 5,
    }
}

wire_enum! {
    pub enum LogicOperation: u8 {
        Clear = 0,
        Set = 1,
        Copy = 2,
        Noop = 3,
        Invert = 4,
        And = 5,
        Or = 6,
        Xor = 7,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetBlendDesc {
    pub blend_enable: bool,
    pub logic_operation_enable: bool,
    pub src_blend: BlendFactor,
    pub dest_blend: BlendFactor,
    pub blend_op: BlendOperation,
    pub src_blend_alpha: BlendFactor,
    pub dest_blend_alpha: BlendFactor,
    pub blend_op_alpha: BlendOperation,
    pub logic_op: LogicOperation,
    pub render_target_write_mask: u8,
}

impl Default for RenderTargetBlendDesc {
    fn default() -> Self {
        RenderTargetBlendDesc {
            blend_enable: false,
            logic_operation_enable: false,
            src_blend: BlendFactor::One,
            dest_blend: BlendFactor::Zero,
            blend_op: BlendOperation::Add,
            src_blend_alpha: BlendFactor::One,
            dest_blend_alpha: BlendFactor::Zero,
            blend_op_alpha: BlendOperation::Add,
            logic_op: LogicOperation::Noop,
            render_target_write_mask: 0x0F,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlendStateDesc {
    pub alpha_to_coverage_enable: bool,
    pub independent_blend_enable: bool,
    pub render_targets: [RenderTargetBlendDesc; MAX_RENDER_TARGETS],
}

wire_enum! {
    pub enum FillMode: u8 {
        Undefined = 0,
        Wireframe = 1,
        Solid = 2,
    }
}

wire_enum! {
    pub enum CullMode: u8 {
        Undefined = 0,
        None = 1,
        Front = 2,
        Back = 3,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerStateDesc {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub front_counter_clockwise: bool,
    pub depth_clip_enable: bool,
    pub scissor_enable: bool,
    pub antialiased_line_enable: bool,
    pub depth_bias: i32,
    pub depth_bias_clamp: f32,
    pub slope_scaled_depth_bias: f32,
}

impl Default for RasterizerStateDesc {
    fn default() -> Self {
        RasterizerStateDesc {
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::Back,
            front_counter_clockwise: false,
            depth_clip_enable: true,
            scissor_enable: false,
            antialiased_line_enable: false,
            depth_bias: 0,
            depth_bias_clamp: 0.0,
            slope_scaled_depth_bias: 0.0,
        }
    }
}

wire_enum! {
    pub enum StencilOp: u8 {
        Undefined = 0,
        Keep = 1,
        Zero = 2,
        Replace = 3,
        IncrSat = 4,
        DecrSat = 5,
        Invert = 6,
        IncrWrap = 7,
        DecrWrap = 8,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilOpDesc {
    pub stencil_fail_op: StencilOp,
    pub stencil_depth_fail_op: StencilOp,
    pub stencil_pass_op: StencilOp,
    pub stencil_func: ComparisonFunc,
}

impl Default for StencilOpDesc {
    fn default() -> Self {
        StencilOpDesc {
            stencil_fail_op: StencilOp::Keep,
            stencil_depth_fail_op: StencilOp::Keep,
            stencil_pass_op: StencilOp::Keep,
            stencil_func: ComparisonFunc::Always,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthStencilStateDesc {
    pub depth_enable: bool,
    pub depth_write_enable: bool,
    pub depth_func: ComparisonFunc,
    pub stencil_enable: bool,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
    pub front_face: StencilOpDesc,
    pub back_face: StencilOpDesc,
}

impl Default for DepthStencilStateDesc {
    fn default() -> Self {
        DepthStencilStateDesc {
            depth_enable: true,
            depth_write_enable: true,
            depth_func: ComparisonFunc::Less,
            stencil_enable: false,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
            front_face: StencilOpDesc::default(),
            back_face: StencilOpDesc::default(),
        }
    }
}

wire_enum! {
    pub enum ValueType: u8 {
        Undefined = 0,
        Int8 = 1,
        Int16 = 2,
        Int32 = 3,
        Uint8 = 4,
        Uint16 = 5,
        Uint32 = 6,
        Float16 = 7,
        Float32 = 8,
    }
}

wire_enum! {
    pub enum InputElementFrequency: u8 {
        Undefined = 0,
        PerVertex = 1,
        PerInstance = 2,
    }
}

/// One vertex input slot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LayoutElement {
    pub hlsl_semantic: String,
    pub input_index: u32,
    pub buffer_slot: u32,
    pub num_components: u32,
    pub value_type: ValueType,
    pub is_normalized: bool,
    pub relative_offset: u32,
    pub stride: u32,
    pub frequency: InputElementFrequency,
    pub instance_data_step_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputLayoutDesc {
    pub elements: Vec<LayoutElement>,
}

wire_enum! {
    pub enum PrimitiveTopology: u8 {
        Undefined = 0,
        TriangleList = 1,
        TriangleStrip = 2,
        PointList = 3,
        LineList = 4,
        LineStrip = 5,
        TriangleListAdj = 6,
        TriangleStripAdj = 7,
        LineListAdj = 8,
        LineStripAdj = 9,
        PatchList = 10,
    }
}

/// Fixed-function state of a graphics pipeline.
///
/// The optional render pass is referenced by name; the live object is
/// resolved when the pipeline is unpacked.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsPipelineDesc {
    pub blend_desc: BlendStateDesc,
    pub sample_mask: u32,
    pub rasterizer_desc: RasterizerStateDesc,
    pub depth_stencil_desc: DepthStencilStateDesc,
    pub input_layout: InputLayoutDesc,
    pub primitive_topology: PrimitiveTopology,
    pub num_viewports: u8,
    pub num_render_targets: u8,
    pub subpass_index: u8,
    pub shading_rate_flags: u32,
    pub rtv_formats: [TextureFormat; MAX_RENDER_TARGETS],
    pub dsv_format: TextureFormat,
    pub sample_desc: SampleDesc,
    pub render_pass: Option<String>,
}

impl Default for GraphicsPipelineDesc {
    fn default() -> Self {
        GraphicsPipelineDesc {
            blend_desc: BlendStateDesc::default(),
            sample_mask: 0xFFFF_FFFF,
            rasterizer_desc: RasterizerStateDesc::default(),
            depth_stencil_desc: DepthStencilStateDesc::default(),
            input_layout: InputLayoutDesc::default(),
            primitive_topology: PrimitiveTopology::TriangleList,
            num_viewports: 1,
            num_render_targets: 0,
            subpass_index: 0,
            shading_rate_flags: 0,
            rtv_formats: [TextureFormat::Unknown; MAX_RENDER_TARGETS],
            dsv_format: TextureFormat::Unknown,
            sample_desc: SampleDesc::default(),
            render_pass: None,
        }
    }
}

/// Fixed-function state of a tile pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct TilePipelineDesc {
    pub num_render_targets: u8,
    pub sample_count: u8,
    pub rtv_formats: [TextureFormat; MAX_RENDER_TARGETS],
}

impl Default for TilePipelineDesc {
    fn default() -> Self {
        TilePipelineDesc {
            num_render_targets: 0,
            sample_count: 1,
            rtv_formats: [TextureFormat::Unknown; MAX_RENDER_TARGETS],
        }
    }
}

/// Shader group whose single shader handles a whole ray event class.
///
/// Shader members of all ray tracing groups are indices into the pipeline's
/// own shader list, which is backend-invariant; the per-backend blob maps
/// those list positions to shader-table entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RayTracingGeneralShaderGroup {
    pub name: String,
    pub shader: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RayTracingTriangleHitShaderGroup {
    pub name: String,
    pub closest_hit_shader: u32,
    pub any_hit_shader: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RayTracingProceduralHitShaderGroup {
    pub name: String,
    pub intersection_shader: u32,
    pub closest_hit_shader: Option<u32>,
    pub any_hit_shader: Option<u32>,
}

/// Description of a ray tracing pipeline
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RayTracingPipelineDesc {
    pub shader_record_name: Option<String>,
    pub shader_record_size: u16,
    pub max_recursion_depth: u8,
    pub max_attribute_size: u32,
    pub max_payload_size: u32,
    pub general_shaders: Vec<RayTracingGeneralShaderGroup>,
    pub triangle_hit_shaders: Vec<RayTracingTriangleHitShaderGroup>,
    pub procedural_hit_shaders: Vec<RayTracingProceduralHitShaderGroup>,
}
