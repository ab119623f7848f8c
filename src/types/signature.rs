//! Pipeline resource signature descriptions

use super::{SamplerDesc, ShaderStages};
use crate::serializer::wire_enum;

wire_enum! {
    pub enum ShaderResourceType: u8 {
        Unknown = 0,
        ConstantBuffer = 1,
        TextureSrv = 2,
        BufferSrv = 3,
        TextureUav = 4,
        BufferUav = 5,
        Sampler = 6,
        InputAttachment = 7,
        AccelStruct = 8,
    }
}

wire_enum! {
    pub enum ResourceVariableType: u8 {
        Static = 0,
        Mutable = 1,
        Dynamic = 2,
    }
}

/// One resource slot declared by a signature
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelineResourceDesc {
    pub name: String,
    pub shader_stages: ShaderStages,
    pub array_size: u32,
    pub resource_type: ShaderResourceType,
    pub var_type: ResourceVariableType,
    pub flags: u32,
}

impl PipelineResourceDesc {
    pub fn new(
        shader_stages: ShaderStages,
        name: impl Into<String>,
        array_size: u32,
        resource_type: ShaderResourceType,
    ) -> Self {
        PipelineResourceDesc {
            name: name.into(),
            shader_stages,
            array_size,
            resource_type,
            ..Default::default()
        }
    }
}

/// A sampler baked into the signature
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImmutableSamplerDesc {
    pub shader_stages: ShaderStages,
    pub sampler_or_texture_name: String,
    pub desc: SamplerDesc,
}

impl ImmutableSamplerDesc {
    pub fn new(
        shader_stages: ShaderStages,
        sampler_or_texture_name: impl Into<String>,
        desc: SamplerDesc,
    ) -> Self {
        ImmutableSamplerDesc {
            shader_stages,
            sampler_or_texture_name: sampler_or_texture_name.into(),
            desc,
        }
    }
}

/// Full description of a pipeline resource signature.
///
/// The name is the archive directory key and is not serialized with the
/// body; it is restored from the directory when the signature is unpacked.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineResourceSignatureDesc {
    pub name: String,
    pub binding_index: u8,
    pub use_combined_texture_samplers: bool,
    pub combined_sampler_suffix: Option<String>,
    pub resources: Vec<PipelineResourceDesc>,
    pub immutable_samplers: Vec<ImmutableSamplerDesc>,
}
