//! Render pass descriptions

use crate::serializer::wire_enum;

wire_enum! {
    /// Closed set of texture formats the archive can describe
    pub enum TextureFormat: u16 {
        Unknown = 0,
        Rgba32Float = 1,
        Rgba16Float = 2,
        Rgba8Unorm = 3,
        Rgba8UnormSrgb = 4,
        Bgra8Unorm = 5,
        Rg16Float = 6,
        R32Float = 7,
        R16Float = 8,
        R8Unorm = 9,
        D32Float = 10,
        D24UnormS8Uint = 11,
        D16Unorm = 12,
    }
}

wire_enum! {
    pub enum AttachmentLoadOp: u8 {
        Load = 0,
        Clear = 1,
        Discard = 2,
    }
}

wire_enum! {
    pub enum AttachmentStoreOp: u8 {
        Store = 0,
        Discard = 1,
    }
}

wire_enum! {
    /// Resource state an attachment is in at a given point of the pass
    pub enum ResourceState: u32 {
        Unknown = 0,
        Common = 1,
        RenderTarget = 2,
        DepthWrite = 3,
        DepthRead = 4,
        ShaderResource = 5,
        InputAttachment = 6,
        CopySource = 7,
        CopyDest = 8,
        ResolveSource = 9,
        ResolveDest = 10,
        Present = 11,
        ShadingRate = 12,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderPassAttachmentDesc {
    pub format: TextureFormat,
    pub sample_count: u8,
    pub load_op: AttachmentLoadOp,
    pub store_op: AttachmentStoreOp,
    pub stencil_load_op: AttachmentLoadOp,
    pub stencil_store_op: AttachmentStoreOp,
    pub initial_state: ResourceState,
    pub final_state: ResourceState,
}

impl Default for RenderPassAttachmentDesc {
    fn default() -> Self {
        RenderPassAttachmentDesc {
            format: TextureFormat::Unknown,
            sample_count: 1,
            load_op: AttachmentLoadOp::Load,
            store_op: AttachmentStoreOp::Store,
            stencil_load_op: AttachmentLoadOp::Load,
            stencil_store_op: AttachmentStoreOp::Store,
            initial_state: ResourceState::Unknown,
            final_state: ResourceState::Unknown,
        }
    }
}

/// Reference to an attachment from within a subpass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttachmentReference {
    pub attachment_index: u32,
    pub state: ResourceState,
}

/// Shading-rate attachment reference with its tile size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShadingRateAttachment {
    pub attachment: AttachmentReference,
    pub tile_size: [u32; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubpassDesc {
    pub input_attachments: Vec<AttachmentReference>,
    pub render_target_attachments: Vec<AttachmentReference>,
    /// When present, must hold one entry per render target attachment
    pub resolve_attachments: Option<Vec<AttachmentReference>>,
    pub preserve_attachments: Vec<u32>,
    pub depth_stencil_attachment: Option<AttachmentReference>,
    pub shading_rate_attachment: Option<ShadingRateAttachment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubpassDependencyDesc {
    pub src_subpass: u32,
    pub dst_subpass: u32,
    pub src_stage_mask: u32,
    pub dst_stage_mask: u32,
    pub src_access_mask: u32,
    pub dst_access_mask: u32,
}

/// Full description of a render pass.
///
/// As with signatures, the name is the directory key and is not part of the
/// serialized body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderPassDesc {
    pub name: String,
    pub attachments: Vec<RenderPassAttachmentDesc>,
    pub subpasses: Vec<SubpassDesc>,
    pub dependencies: Vec<SubpassDependencyDesc>,
}
