//! Sampler state description

use crate::serializer::wire_enum;

wire_enum! {
    pub enum FilterType: u8 {
        Unknown = 0,
        Point = 1,
        Linear = 2,
        Anisotropic = 3,
        ComparisonPoint = 4,
        ComparisonLinear = 5,
        ComparisonAnisotropic = 6,
    }
}

wire_enum! {
    pub enum TextureAddressMode: u8 {
        Unknown = 0,
        Wrap = 1,
        Mirror = 2,
        Clamp = 3,
        Border = 4,
        MirrorOnce = 5,
    }
}

wire_enum! {
    pub enum ComparisonFunc: u8 {
        Unknown = 0,
        Never = 1,
        Less = 2,
        Equal = 3,
        LessEqual = 4,
        Greater = 5,
        NotEqual = 6,
        GreaterEqual = 7,
        Always = 8,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDesc {
    pub name: String,
    pub min_filter: FilterType,
    pub mag_filter: FilterType,
    pub mip_filter: FilterType,
    pub address_u: TextureAddressMode,
    pub address_v: TextureAddressMode,
    pub address_w: TextureAddressMode,
    pub flags: u32,
    pub mip_lod_bias: f32,
    pub max_anisotropy: u32,
    pub comparison_func: ComparisonFunc,
    pub border_color: [f32; 4],
    pub min_lod: f32,
    pub max_lod: f32,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        SamplerDesc {
            name: String::new(),
            min_filter: FilterType::Linear,
            mag_filter: FilterType::Linear,
            mip_filter: FilterType::Linear,
            address_u: TextureAddressMode::Clamp,
            address_v: TextureAddressMode::Clamp,
            address_w: TextureAddressMode::Clamp,
            flags: 0,
            mip_lod_bias: 0.0,
            max_anisotropy: 0,
            comparison_func: ComparisonFunc::Never,
            border_color: [0.0; 4],
            min_lod: 0.0,
            max_lod: f32::MAX,
        }
    }
}
