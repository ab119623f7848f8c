//! Shader descriptions

use crate::serializer::wire_enum;

wire_enum! {
    /// Single shader stage
    pub enum ShaderType: u32 {
        Unknown = 0,
        Vertex = 1,
        Pixel = 2,
        Geometry = 3,
        Hull = 4,
        Domain = 5,
        Compute = 6,
        Amplification = 7,
        Mesh = 8,
        Tile = 9,
        RayGen = 10,
        RayMiss = 11,
        RayClosestHit = 12,
        RayAnyHit = 13,
        RayIntersection = 14,
        Callable = 15,
    }
}

wire_enum! {
    pub enum ShaderSourceLanguage: u32 {
        Default = 0,
        Hlsl = 1,
        Glsl = 2,
        GlslVerbatim = 3,
        Msl = 4,
    }
}

wire_enum! {
    pub enum ShaderCompiler: u32 {
        Default = 0,
        Glslang = 1,
        Dxc = 2,
        Fxc = 3,
    }
}

/// Description of an archived shader.
///
/// The shader payload (source text or compiled bytecode) is not part of the
/// description; it follows the serialized description as a raw byte tail
/// inside the backend's shader region.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderCreateInfo {
    pub shader_type: ShaderType,
    pub entry_point: String,
    pub source_language: ShaderSourceLanguage,
    pub compiler: ShaderCompiler,
}

impl ShaderCreateInfo {
    pub fn new(shader_type: ShaderType, entry_point: impl Into<String>) -> Self {
        ShaderCreateInfo {
            shader_type,
            entry_point: entry_point.into(),
            ..Default::default()
        }
    }
}
