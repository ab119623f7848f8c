//! On-disk layout of the archive
//!
//! All multi-byte integers are little-endian and all records are byte-packed;
//! cross-references are absolute 32-bit offsets from the start of the file,
//! with [`INVALID_OFFSET`] as the "absent" sentinel.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ ArchiveHeader (40 bytes)                     │
//! ├──────────────────────────────────────────────┤
//! │ ChunkHeader × chunk_count (12 bytes each)    │
//! ├──────────────────────────────────────────────┤
//! │ Chunk bodies                                 │
//! │   named chunks: NamedResourceArrayHeader +   │
//! │   parallel u32 arrays + packed names         │
//! │   shaders chunk: one DataHeader              │
//! ├──────────────────────────────────────────────┤
//! │ Shared data: DataHeader + description bytes  │
//! │   per named entry (backend-agnostic)         │
//! ├──────────────────────────────────────────────┤
//! │ Per-backend blocks (up to six), each holding │
//! │   the backend's shader region and blobs      │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! A named chunk points at shared-data entries; each shared-data entry's
//! [`DataHeader`] points at the entry's bytes inside the per-backend blocks
//! (offsets relative to the block base recorded in the archive header).

use crate::backend::{Backend, BACKEND_COUNT};
use crate::error::{ArchiveError, Result};
use crate::serializer::{wire_enum, ReadCursor, Serializer, WriteCursor};

/// Identifies the file format; first eight bytes of every archive
pub const ARCHIVE_MAGIC: u64 = 0x44494C4E54415243;

/// Current (and only) format version
pub const ARCHIVE_VERSION: u32 = 1;

/// Interface version recorded in the debug-info chunk
pub const API_VERSION: u32 = 1;

/// Sentinel for an absent 32-bit offset
pub const INVALID_OFFSET: u32 = u32::MAX;

/// Number of chunk kinds, including the reserved slot
pub const CHUNK_KIND_COUNT: usize = 9;

wire_enum! {
    /// Kind tag of a chunk; each kind appears at most once per archive
    pub enum ChunkKind: u32 {
        DebugInfo = 0,
        ResourceSignature = 1,
        RenderPass = 2,
        GraphicsPipeline = 3,
        ComputePipeline = 4,
        RayTracingPipeline = 5,
        TilePipeline = 6,
        Shaders = 7,
        /// Not produced by this version; rejected when read
        Reserved = 8,
    }
}

impl ChunkKind {
    /// Kinds whose chunk body is a named-resource directory
    pub const NAMED: [ChunkKind; 6] = [
        ChunkKind::ResourceSignature,
        ChunkKind::RenderPass,
        ChunkKind::GraphicsPipeline,
        ChunkKind::ComputePipeline,
        ChunkKind::RayTracingPipeline,
        ChunkKind::TilePipeline,
    ];

    /// Human-readable resource label used in diagnostics
    pub fn label(self) -> &'static str {
        match self {
            ChunkKind::DebugInfo => "debug info",
            ChunkKind::ResourceSignature => "resource signature",
            ChunkKind::RenderPass => "render pass",
            ChunkKind::GraphicsPipeline => "graphics pipeline",
            ChunkKind::ComputePipeline => "compute pipeline",
            ChunkKind::RayTracingPipeline => "ray tracing pipeline",
            ChunkKind::TilePipeline => "tile pipeline",
            ChunkKind::Shaders => "shader list",
            ChunkKind::Reserved => "reserved",
        }
    }
}

/// First record of the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub magic: u64,
    pub version: u32,
    pub chunk_count: u32,
    /// Absolute start of each backend block, or [`INVALID_OFFSET`] if the
    /// backend contributed no bytes
    pub backend_base_offsets: [u32; BACKEND_COUNT],
}

impl Default for ArchiveHeader {
    fn default() -> Self {
        ArchiveHeader {
            magic: ARCHIVE_MAGIC,
            version: ARCHIVE_VERSION,
            chunk_count: 0,
            backend_base_offsets: [INVALID_OFFSET; BACKEND_COUNT],
        }
    }
}

impl ArchiveHeader {
    pub const SIZE: usize = 40;

    pub fn serialize<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
        s.u64(&mut self.magic)?;
        s.u32(&mut self.version)?;
        s.u32(&mut self.chunk_count)?;
        for offset in &mut self.backend_base_offsets {
            s.u32(offset)?;
        }
        Ok(())
    }

    /// Checks magic and version; the first validation a reader performs
    pub fn validate(&self) -> Result<()> {
        if self.magic != ARCHIVE_MAGIC {
            return Err(ArchiveError::BadMagic);
        }
        if self.version != ARCHIVE_VERSION {
            return Err(ArchiveError::UnsupportedVersion(self.version));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; Self::SIZE];
        let mut writer = WriteCursor::new(&mut buf);
        self.clone().serialize(&mut writer)?;
        debug_assert!(writer.is_full());
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut header = ArchiveHeader::default();
        header.serialize(&mut ReadCursor::new(bytes))?;
        Ok(header)
    }
}

/// Directory entry locating one chunk body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkHeader {
    pub kind: ChunkKind,
    pub size: u32,
    /// Absolute offset of the chunk body
    pub offset: u32,
}

impl ChunkHeader {
    pub const SIZE: usize = 12;

    pub fn serialize<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
        s.wire_enum(&mut self.kind)?;
        s.u32(&mut self.size)?;
        s.u32(&mut self.offset)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; Self::SIZE];
        let mut writer = WriteCursor::new(&mut buf);
        let mut copy = *self;
        copy.serialize(&mut writer)?;
        debug_assert!(writer.is_full());
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut header = ChunkHeader::default();
        header.serialize(&mut ReadCursor::new(bytes))?;
        Ok(header)
    }
}

/// Leading record of a named chunk body; followed by three parallel
/// `u32` arrays (name length, data size, data offset) and packed
/// zero-terminated names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NamedResourceArrayHeader {
    pub count: u32,
}

impl NamedResourceArrayHeader {
    pub const SIZE: usize = 4;

    pub fn serialize<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
        s.u32(&mut self.count)
    }
}

/// Kind-tagged record at the start of a named entry's shared bytes.
///
/// One shape serves all four tags (resource signature, render pass, pipeline,
/// shader list); render passes simply leave every backend slot absent.
/// Backend offsets are relative to that backend's block base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataHeader {
    pub kind: ChunkKind,
    pub backend_size: [u32; BACKEND_COUNT],
    pub backend_offset: [u32; BACKEND_COUNT],
}

impl DataHeader {
    pub const SIZE: usize = 52;

    pub fn new(kind: ChunkKind) -> Self {
        DataHeader {
            kind,
            backend_size: [0; BACKEND_COUNT],
            backend_offset: [INVALID_OFFSET; BACKEND_COUNT],
        }
    }

    pub fn serialize<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
        s.wire_enum(&mut self.kind)?;
        for size in &mut self.backend_size {
            s.u32(size)?;
        }
        for offset in &mut self.backend_offset {
            s.u32(offset)?;
        }
        Ok(())
    }

    pub fn set_backend(&mut self, backend: Backend, offset: u32, size: u32) {
        self.backend_offset[backend.index()] = offset;
        self.backend_size[backend.index()] = size;
    }

    pub fn size_for(&self, backend: Backend) -> u32 {
        self.backend_size[backend.index()]
    }

    pub fn offset_for(&self, backend: Backend) -> u32 {
        self.backend_offset[backend.index()]
    }

    /// Block-relative end of this backend's bytes
    pub fn end_offset_for(&self, backend: Backend) -> u64 {
        self.offset_for(backend) as u64 + self.size_for(backend) as u64
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; Self::SIZE];
        let mut writer = WriteCursor::new(&mut buf);
        self.clone().serialize(&mut writer)?;
        debug_assert!(writer.is_full());
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut header = DataHeader::new(ChunkKind::DebugInfo);
        header.serialize(&mut ReadCursor::new(bytes))?;
        Ok(header)
    }
}

/// Offset/size pair locating a byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileOffsetAndSize {
    pub offset: u32,
    pub size: u32,
}

impl FileOffsetAndSize {
    pub const SIZE: usize = 8;

    pub fn serialize<S: Serializer>(&mut self, s: &mut S) -> Result<()> {
        s.u32(&mut self.offset)?;
        s.u32(&mut self.size)?;
        Ok(())
    }

    pub fn end(&self) -> u64 {
        self.offset as u64 + self.size as u64
    }
}
