//! Archive reader
//!
//! The [`Dearchiver`] parses and validates an archive over a random-access
//! byte source at construction time, building a name-to-location directory
//! per resource kind. Live objects are materialized lazily on request via an
//! external [`RenderDevice`] factory and cached by weak reference, so repeat
//! requests return the same object while anyone holds it and re-create it
//! after everyone drops it.
//!
//! Reading is designed for parallel threads. Each directory-and-cache pair
//! has its own mutex; bulk reads, deserialization and factory invocations
//! happen outside the locks. Concurrent unpacks of one name may both reach
//! the factory, but at most one weak reference survives in the cache, and
//! the upgrade-from-weak path makes later callers converge on it.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{error, info};

use crate::backend::{Backend, BACKEND_COUNT};
use crate::device::{
    ComputePipelineCreateInfo, GraphicsPipelineCreateInfo, Pipeline, RayTracingPipelineCreateInfo,
    RenderDevice, RenderPass, ResourceSignature, Shader, TilePipelineCreateInfo,
};
use crate::error::{ArchiveError, Result};
use crate::format::{
    ArchiveHeader, ChunkHeader, ChunkKind, DataHeader, FileOffsetAndSize,
    NamedResourceArrayHeader, API_VERSION, CHUNK_KIND_COUNT, INVALID_OFFSET,
};
use crate::schema::{
    self, serialize_shader_indices, ArchiveDebugInfo, PipelineCommonData,
};
use crate::serializer::{ReadCursor, Serializer};
use crate::source::ByteSource;
use crate::types::{
    BlendStateDesc, DepthStencilStateDesc, GraphicsPipelineDesc, InputLayoutDesc,
    PipelineResourceSignatureDesc, PipelineType, PrimitiveTopology, RasterizerStateDesc,
    RayTracingPipelineDesc, RenderPassDesc, SampleDesc, ShaderCreateInfo, ShaderType,
    TextureFormat, TilePipelineDesc, MAX_RENDER_TARGETS,
};

/// Caller-supplied render-target substitution
#[derive(Debug, Clone)]
pub struct RenderTargetOverride {
    pub count: u8,
    pub formats: [TextureFormat; MAX_RENDER_TARGETS],
}

/// Caller-supplied live render pass substitution
#[derive(Clone)]
pub struct RenderPassOverride {
    pub render_pass: Arc<dyn RenderPass>,
    pub subpass_index: u8,
}

/// Description fields substituted at unpack time.
///
/// A set field is an active override. Any active override makes the request
/// bypass the live-object cache, both for lookup and insertion.
#[derive(Clone, Default)]
pub struct PipelineOverrides {
    pub name: Option<String>,
    pub rasterizer: Option<RasterizerStateDesc>,
    pub blend: Option<BlendStateDesc>,
    pub sample_mask: Option<u32>,
    pub depth_stencil: Option<DepthStencilStateDesc>,
    pub input_layout: Option<InputLayoutDesc>,
    pub primitive_topology: Option<PrimitiveTopology>,
    pub num_viewports: Option<u8>,
    pub render_targets: Option<RenderTargetOverride>,
    pub render_pass: Option<RenderPassOverride>,
    pub shading_rate_flags: Option<u32>,
    pub dsv_format: Option<TextureFormat>,
    pub sample_desc: Option<SampleDesc>,
}

impl PipelineOverrides {
    pub fn any(&self) -> bool {
        self.name.is_some()
            || self.rasterizer.is_some()
            || self.blend.is_some()
            || self.sample_mask.is_some()
            || self.depth_stencil.is_some()
            || self.input_layout.is_some()
            || self.primitive_topology.is_some()
            || self.num_viewports.is_some()
            || self.render_targets.is_some()
            || self.render_pass.is_some()
            || self.shading_rate_flags.is_some()
            || self.dsv_format.is_some()
            || self.sample_desc.is_some()
    }
}

/// Per-attachment render pass substitutions
#[derive(Debug, Clone, Default)]
pub struct AttachmentOverride {
    pub attachment_index: u32,
    pub format: Option<TextureFormat>,
    pub sample_count: Option<u8>,
    pub load_op: Option<crate::types::AttachmentLoadOp>,
    pub store_op: Option<crate::types::AttachmentStoreOp>,
    pub stencil_load_op: Option<crate::types::AttachmentLoadOp>,
    pub stencil_store_op: Option<crate::types::AttachmentStoreOp>,
    pub initial_state: Option<crate::types::ResourceState>,
    pub final_state: Option<crate::types::ResourceState>,
}

#[derive(Debug, Clone, Default)]
pub struct RenderPassOverrides {
    pub attachments: Vec<AttachmentOverride>,
}

impl RenderPassOverrides {
    pub fn any(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// Directory entry plus the weak live-object cache slot for one name
struct CacheSlot<T: ?Sized> {
    location: FileOffsetAndSize,
    handle: Option<Weak<T>>,
}

type NamedCache<T> = HashMap<String, CacheSlot<T>>;

/// One shader of the selected backend: its location and, once built, a
/// strong reference that [`Dearchiver::clear_cache`] releases
struct ShaderSlot {
    location: FileOffsetAndSize,
    handle: Option<Arc<dyn Shader>>,
}

/// Reconstructs archived device objects over a [`ByteSource`]
pub struct Dearchiver {
    source: Arc<dyn ByteSource>,
    backend: Backend,
    base_offsets: [u32; BACKEND_COUNT],
    debug_info: ArchiveDebugInfo,
    signatures: Mutex<NamedCache<dyn ResourceSignature>>,
    render_passes: Mutex<NamedCache<dyn RenderPass>>,
    graphics: Mutex<NamedCache<dyn Pipeline>>,
    compute: Mutex<NamedCache<dyn Pipeline>>,
    tile: Mutex<NamedCache<dyn Pipeline>>,
    ray_tracing: Mutex<NamedCache<dyn Pipeline>>,
    shaders: Mutex<Vec<ShaderSlot>>,
}

impl std::fmt::Debug for Dearchiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dearchiver")
            .field("backend", &self.backend)
            .field("base_offsets", &self.base_offsets)
            .finish_non_exhaustive()
    }
}

impl Dearchiver {
    /// Parses and validates the archive structure.
    ///
    /// Fails fatally on bad magic, unsupported version, duplicate or unknown
    /// chunks and any out-of-bounds reference. The dearchiver is immutable
    /// after construction except for its caches.
    pub fn new(source: Arc<dyn ByteSource>, backend: Backend) -> Result<Self> {
        let archive_size = source.len();

        let mut header_bytes = vec![0u8; ArchiveHeader::SIZE];
        source
            .read_at(0, &mut header_bytes)
            .map_err(|_| ArchiveError::corrupt("archive is smaller than its header"))?;
        let header = ArchiveHeader::from_bytes(&header_bytes)?;
        header.validate()?;

        if header.chunk_count as usize > CHUNK_KIND_COUNT {
            return Err(ArchiveError::corrupt(format!(
                "chunk count {} exceeds the number of chunk kinds",
                header.chunk_count
            )));
        }
        for (index, base) in header.backend_base_offsets.iter().enumerate() {
            if *base != INVALID_OFFSET && *base as u64 > archive_size {
                return Err(ArchiveError::corrupt(format!(
                    "backend block {index} starts past the end of the archive"
                )));
            }
        }

        let mut directory_bytes = vec![0u8; header.chunk_count as usize * ChunkHeader::SIZE];
        source.read_at(ArchiveHeader::SIZE as u64, &mut directory_bytes)?;
        let mut chunks = Vec::with_capacity(header.chunk_count as usize);
        for raw in directory_bytes.chunks_exact(ChunkHeader::SIZE) {
            chunks.push(ChunkHeader::from_bytes(raw)?);
        }

        Self::validate_chunk_regions(&chunks, header.chunk_count, archive_size)?;

        let mut debug_info = ArchiveDebugInfo::default();
        let mut signatures = HashMap::new();
        let mut render_passes = HashMap::new();
        let mut graphics = HashMap::new();
        let mut compute = HashMap::new();
        let mut tile = HashMap::new();
        let mut ray_tracing = HashMap::new();
        let mut shader_slots = Vec::new();

        let mut seen = [false; CHUNK_KIND_COUNT];
        for chunk in &chunks {
            let slot = chunk.kind as usize;
            if seen[slot] {
                return Err(ArchiveError::corrupt(format!(
                    "duplicate {} chunk",
                    chunk.kind.label()
                )));
            }
            seen[slot] = true;

            match chunk.kind {
                ChunkKind::DebugInfo => {
                    debug_info = Self::parse_debug_info(source.as_ref(), chunk)?;
                }
                ChunkKind::ResourceSignature => {
                    signatures = Self::parse_named_chunk(source.as_ref(), chunk, archive_size)?;
                }
                ChunkKind::RenderPass => {
                    render_passes = Self::parse_named_chunk(source.as_ref(), chunk, archive_size)?;
                }
                ChunkKind::GraphicsPipeline => {
                    graphics = Self::parse_named_chunk(source.as_ref(), chunk, archive_size)?;
                }
                ChunkKind::ComputePipeline => {
                    compute = Self::parse_named_chunk(source.as_ref(), chunk, archive_size)?;
                }
                ChunkKind::TilePipeline => {
                    tile = Self::parse_named_chunk(source.as_ref(), chunk, archive_size)?;
                }
                ChunkKind::RayTracingPipeline => {
                    ray_tracing = Self::parse_named_chunk(source.as_ref(), chunk, archive_size)?;
                }
                ChunkKind::Shaders => {
                    shader_slots = Self::parse_shaders_chunk(
                        source.as_ref(),
                        chunk,
                        backend,
                        &header.backend_base_offsets,
                        archive_size,
                    )?;
                }
                ChunkKind::Reserved => {
                    return Err(ArchiveError::corrupt("unrecognized chunk kind"));
                }
            }
        }

        if debug_info.api_version != API_VERSION {
            info!(
                archive = debug_info.api_version,
                current = API_VERSION,
                "archive was created with a different interface version"
            );
        }

        Ok(Dearchiver {
            source,
            backend,
            base_offsets: header.backend_base_offsets,
            debug_info,
            signatures: Mutex::new(Self::into_cache(signatures)),
            render_passes: Mutex::new(Self::into_cache(render_passes)),
            graphics: Mutex::new(Self::into_cache(graphics)),
            compute: Mutex::new(Self::into_cache(compute)),
            tile: Mutex::new(Self::into_cache(tile)),
            ray_tracing: Mutex::new(Self::into_cache(ray_tracing)),
            shaders: Mutex::new(shader_slots),
        })
    }

    /// Backend this dearchiver materializes objects for
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Contents of the archive's debug-info chunk
    pub fn debug_info(&self) -> &ArchiveDebugInfo {
        &self.debug_info
    }

    /// Releases cached shader references and purges the name-keyed weak
    /// caches. Directories are untouched; later unpacks re-create objects.
    pub fn clear_cache(&self) {
        for slot in self.shaders.lock().iter_mut() {
            slot.handle = None;
        }
        for slot in self.signatures.lock().values_mut() {
            slot.handle = None;
        }
        for slot in self.render_passes.lock().values_mut() {
            slot.handle = None;
        }
        for cache in [&self.graphics, &self.compute, &self.tile, &self.ray_tracing] {
            for slot in cache.lock().values_mut() {
                slot.handle = None;
            }
        }
    }

    pub fn unpack_resource_signature(
        &self,
        name: &str,
        device: &dyn RenderDevice,
    ) -> Result<Arc<dyn ResourceSignature>> {
        let kind = ChunkKind::ResourceSignature;
        let result = self.unpack_signature_inner(name, device);
        Self::log_failure(kind.label(), name, result)
    }

    pub fn unpack_render_pass(
        &self,
        name: &str,
        device: &dyn RenderDevice,
        overrides: &RenderPassOverrides,
    ) -> Result<Arc<dyn RenderPass>> {
        let result = self.unpack_render_pass_inner(name, device, overrides);
        Self::log_failure(ChunkKind::RenderPass.label(), name, result)
    }

    pub fn unpack_graphics_pipeline(
        &self,
        name: &str,
        device: &dyn RenderDevice,
        overrides: &PipelineOverrides,
    ) -> Result<Arc<dyn Pipeline>> {
        let result = self.unpack_graphics_inner(name, device, overrides);
        Self::log_failure(ChunkKind::GraphicsPipeline.label(), name, result)
    }

    /// Compute pipelines accept no overrides
    pub fn unpack_compute_pipeline(
        &self,
        name: &str,
        device: &dyn RenderDevice,
    ) -> Result<Arc<dyn Pipeline>> {
        let result = self.unpack_compute_inner(name, device);
        Self::log_failure(ChunkKind::ComputePipeline.label(), name, result)
    }

    /// Only the name, render-target and sample-count overrides apply to tile
    /// pipelines; the remaining fields are ignored
    pub fn unpack_tile_pipeline(
        &self,
        name: &str,
        device: &dyn RenderDevice,
        overrides: &PipelineOverrides,
    ) -> Result<Arc<dyn Pipeline>> {
        let result = self.unpack_tile_inner(name, device, overrides);
        Self::log_failure(ChunkKind::TilePipeline.label(), name, result)
    }

    /// Ray tracing pipelines accept no overrides
    pub fn unpack_ray_tracing_pipeline(
        &self,
        name: &str,
        device: &dyn RenderDevice,
    ) -> Result<Arc<dyn Pipeline>> {
        let result = self.unpack_ray_tracing_inner(name, device);
        Self::log_failure(ChunkKind::RayTracingPipeline.label(), name, result)
    }

    // ---- construction helpers ----------------------------------------------

    fn validate_chunk_regions(
        chunks: &[ChunkHeader],
        chunk_count: u32,
        archive_size: u64,
    ) -> Result<()> {
        let directory_end =
            (ArchiveHeader::SIZE + chunk_count as usize * ChunkHeader::SIZE) as u64;
        let mut regions: Vec<(u64, u64)> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let start = chunk.offset as u64;
            let end = start + chunk.size as u64;
            if start < directory_end || end > archive_size {
                return Err(ArchiveError::corrupt(format!(
                    "{} chunk lies outside the archive body",
                    chunk.kind.label()
                )));
            }
            regions.push((start, end));
        }
        regions.sort_unstable();
        for pair in regions.windows(2) {
            if pair[1].0 < pair[0].1 {
                return Err(ArchiveError::corrupt("chunk regions overlap"));
            }
        }
        Ok(())
    }

    fn read_chunk_body(source: &dyn ByteSource, chunk: &ChunkHeader) -> Result<Vec<u8>> {
        let mut body = vec![0u8; chunk.size as usize];
        source.read_at(chunk.offset as u64, &mut body)?;
        Ok(body)
    }

    fn parse_debug_info(source: &dyn ByteSource, chunk: &ChunkHeader) -> Result<ArchiveDebugInfo> {
        let body = Self::read_chunk_body(source, chunk)?;
        let mut cursor = ReadCursor::new(&body);
        let mut info = ArchiveDebugInfo::default();
        schema::serialize_debug_info(&mut cursor, &mut info)?;
        if !cursor.is_end() {
            return Err(ArchiveError::corrupt("trailing bytes in debug info chunk"));
        }
        Ok(info)
    }

    /// Parses a named chunk body into a name-to-location directory
    fn parse_named_chunk(
        source: &dyn ByteSource,
        chunk: &ChunkHeader,
        archive_size: u64,
    ) -> Result<HashMap<String, FileOffsetAndSize>> {
        let body = Self::read_chunk_body(source, chunk)?;
        let mut cursor = ReadCursor::new(&body);

        let mut header = NamedResourceArrayHeader::default();
        header.serialize(&mut cursor)?;
        let count = header.count as usize;
        // Three parallel u32 arrays must fit before anything is allocated.
        if count as u64 * 12 > cursor.remaining() as u64 {
            return Err(ArchiveError::corrupt(format!(
                "{} chunk directory is truncated",
                chunk.kind.label()
            )));
        }

        let read_u32_array = |cursor: &mut ReadCursor, count: usize| -> Result<Vec<u32>> {
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                let mut v = 0u32;
                cursor.u32(&mut v)?;
                values.push(v);
            }
            Ok(values)
        };

        let name_lengths = read_u32_array(&mut cursor, count)?;
        let data_sizes = read_u32_array(&mut cursor, count)?;
        let data_offsets = read_u32_array(&mut cursor, count)?;

        let names_total: u64 = name_lengths.iter().map(|len| *len as u64).sum();
        if names_total > cursor.remaining() as u64 {
            return Err(ArchiveError::corrupt(format!(
                "{} chunk name data is truncated",
                chunk.kind.label()
            )));
        }

        let mut directory = HashMap::with_capacity(count);
        for i in 0..count {
            let len = name_lengths[i] as usize;
            let bytes = cursor.take(len)?;
            let Some((0, name_bytes)) = bytes.split_last().map(|(t, rest)| (*t, rest)) else {
                return Err(ArchiveError::corrupt("resource name is not zero-terminated"));
            };
            let name = std::str::from_utf8(name_bytes)
                .map_err(|_| ArchiveError::corrupt("resource name is not valid UTF-8"))?;
            if name.is_empty() {
                return Err(ArchiveError::corrupt("resource name is empty"));
            }

            let location = FileOffsetAndSize {
                offset: data_offsets[i],
                size: data_sizes[i],
            };
            if location.offset != INVALID_OFFSET && location.end() > archive_size {
                return Err(ArchiveError::corrupt(format!(
                    "{} '{}' data lies outside the archive",
                    chunk.kind.label(),
                    name
                )));
            }
            if directory.insert(name.to_string(), location).is_some() {
                return Err(ArchiveError::corrupt(format!(
                    "{} '{}' appears twice in one chunk",
                    chunk.kind.label(),
                    name
                )));
            }
        }

        Ok(directory)
    }

    /// Resolves the selected backend's shader preamble into indexed slots
    fn parse_shaders_chunk(
        source: &dyn ByteSource,
        chunk: &ChunkHeader,
        backend: Backend,
        base_offsets: &[u32; BACKEND_COUNT],
        archive_size: u64,
    ) -> Result<Vec<ShaderSlot>> {
        if chunk.size as usize != DataHeader::SIZE {
            return Err(ArchiveError::corrupt("shader chunk has unexpected size"));
        }
        let body = Self::read_chunk_body(source, chunk)?;
        let header = DataHeader::from_bytes(&body)?;
        if header.kind != ChunkKind::Shaders {
            return Err(ArchiveError::corrupt("shader chunk header kind mismatch"));
        }

        let preamble_size = header.size_for(backend) as usize;
        let base = base_offsets[backend.index()];
        if preamble_size == 0 || base == INVALID_OFFSET {
            // The archive holds no shaders for this backend.
            return Ok(Vec::new());
        }
        if preamble_size % FileOffsetAndSize::SIZE != 0 {
            return Err(ArchiveError::corrupt("shader preamble size is not a record multiple"));
        }
        if base as u64 + header.end_offset_for(backend) > archive_size {
            return Err(ArchiveError::corrupt("shader preamble lies outside the archive"));
        }

        let mut preamble = vec![0u8; preamble_size];
        source.read_at(base as u64 + header.offset_for(backend) as u64, &mut preamble)?;

        let mut slots = Vec::with_capacity(preamble_size / FileOffsetAndSize::SIZE);
        let mut cursor = ReadCursor::new(&preamble);
        while !cursor.is_end() {
            let mut record = FileOffsetAndSize::default();
            record.serialize(&mut cursor)?;
            if base as u64 + record.end() > archive_size {
                return Err(ArchiveError::corrupt("shader data lies outside the archive"));
            }
            slots.push(ShaderSlot {
                location: record,
                handle: None,
            });
        }
        Ok(slots)
    }

    fn into_cache<T: ?Sized>(directory: HashMap<String, FileOffsetAndSize>) -> NamedCache<T> {
        directory
            .into_iter()
            .map(|(name, location)| {
                (
                    name,
                    CacheSlot {
                        location,
                        handle: None,
                    },
                )
            })
            .collect()
    }

    // ---- unpack helpers ----------------------------------------------------

    fn log_failure<T>(kind: &'static str, name: &str, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            error!(resource = kind, name, error = %err, "failed to unpack archived resource");
        }
        result
    }

    /// Directory lookup plus weak-cache upgrade under the kind's mutex
    fn lookup<T: ?Sized>(
        cache: &Mutex<NamedCache<T>>,
        kind: &'static str,
        name: &str,
    ) -> Result<(FileOffsetAndSize, Option<Arc<T>>)> {
        let guard = cache.lock();
        let slot = guard.get(name).ok_or_else(|| ArchiveError::NotFound {
            kind,
            name: name.to_string(),
        })?;
        let live = slot.handle.as_ref().and_then(Weak::upgrade);
        Ok((slot.location, live))
    }

    /// Installs a weak reference unless a live one is already present
    fn install<T: ?Sized>(cache: &Mutex<NamedCache<T>>, name: &str, handle: &Arc<T>) {
        let mut guard = cache.lock();
        if let Some(slot) = guard.get_mut(name) {
            let alive = slot.handle.as_ref().and_then(Weak::upgrade).is_some();
            if !alive {
                slot.handle = Some(Arc::downgrade(handle));
            }
        }
    }

    fn read_block(&self, location: FileOffsetAndSize) -> Result<Vec<u8>> {
        if location.offset == INVALID_OFFSET {
            return Err(ArchiveError::corrupt("resource has no shared data"));
        }
        if location.end() > self.source.len() {
            return Err(ArchiveError::corrupt("shared data lies outside the archive"));
        }
        let mut block = vec![0u8; location.size as usize];
        self.source.read_at(location.offset as u64, &mut block)?;
        Ok(block)
    }

    /// Reads a shared-data entry, validates its kind tag and decodes the
    /// description with `decode`, enforcing full consumption
    fn decode_shared<R>(
        &self,
        expected: ChunkKind,
        location: FileOffsetAndSize,
        decode: impl FnOnce(&mut ReadCursor) -> Result<R>,
    ) -> Result<(DataHeader, R)> {
        let block = self.read_block(location)?;
        let mut cursor = ReadCursor::new(&block);
        let mut header = DataHeader::new(expected);
        header.serialize(&mut cursor)?;
        if header.kind != expected {
            return Err(ArchiveError::corrupt(format!(
                "data header kind mismatch: expected {}, found {}",
                expected.label(),
                header.kind.label()
            )));
        }
        let value = decode(&mut cursor)?;
        if !cursor.is_end() {
            return Err(ArchiveError::corrupt("trailing bytes after description"));
        }
        Ok((header, value))
    }

    /// Reads this backend's bytes for one resource
    fn load_backend_data(&self, header: &DataHeader) -> Result<Vec<u8>> {
        let backend = self.backend;
        let base = self.base_offsets[backend.index()];
        let size = header.size_for(backend);
        if base == INVALID_OFFSET || size == 0 || header.offset_for(backend) == INVALID_OFFSET {
            return Err(ArchiveError::BackendUnavailable { backend });
        }
        if base as u64 + header.end_offset_for(backend) > self.source.len() {
            return Err(ArchiveError::corrupt("backend data lies outside the archive"));
        }

        let mut data = vec![0u8; size as usize];
        self.source
            .read_at(base as u64 + header.offset_for(backend) as u64, &mut data)?;
        Ok(data)
    }

    /// Loads the shaders a pipeline references, reusing cached ones.
    ///
    /// Slots are inspected and updated under the shader mutex; the read and
    /// the factory call happen outside it. When two threads race on one
    /// index, the later install wins; both handles describe identical bytes.
    fn load_shaders(
        &self,
        indices: &[u32],
        device: &dyn RenderDevice,
    ) -> Result<Vec<Arc<dyn Shader>>> {
        let base = self.base_offsets[self.backend.index()];
        if base == INVALID_OFFSET {
            return Err(ArchiveError::BackendUnavailable { backend: self.backend });
        }

        let mut shaders = Vec::with_capacity(indices.len());
        for &index in indices {
            let location = {
                let guard = self.shaders.lock();
                let slot = guard.get(index as usize).ok_or_else(|| {
                    ArchiveError::corrupt(format!("shader index {index} is out of range"))
                })?;
                if let Some(handle) = &slot.handle {
                    shaders.push(Arc::clone(handle));
                    continue;
                }
                slot.location
            };

            let mut bytes = vec![0u8; location.size as usize];
            self.source.read_at(base as u64 + location.offset as u64, &mut bytes)?;

            let mut cursor = ReadCursor::new(&bytes);
            let mut ci = ShaderCreateInfo::default();
            schema::serialize_shader_create_info(&mut cursor, &mut ci)?;
            let payload = cursor.take_rest();

            let shader = device
                .create_shader(&ci, payload)
                .map_err(|err| ArchiveError::FactoryFailed(err.to_string()))?;

            let mut guard = self.shaders.lock();
            if let Some(slot) = guard.get_mut(index as usize) {
                slot.handle = Some(Arc::clone(&shader));
            }
            shaders.push(shader);
        }
        Ok(shaders)
    }

    fn resolve_signatures(
        &self,
        names: &[String],
        device: &dyn RenderDevice,
    ) -> Result<Vec<Arc<dyn ResourceSignature>>> {
        names
            .iter()
            .map(|name| self.unpack_resource_signature(name, device))
            .collect()
    }

    fn decode_pipeline_shared<R>(
        &self,
        chunk_kind: ChunkKind,
        expected_type: PipelineType,
        location: FileOffsetAndSize,
        decode_desc: impl FnOnce(&mut ReadCursor) -> Result<R>,
    ) -> Result<(DataHeader, PipelineCommonData, R)> {
        let (header, (common, desc)) = self.decode_shared(chunk_kind, location, |cursor| {
            let mut common = PipelineCommonData::default();
            schema::serialize_pipeline_common(cursor, &mut common)?;
            if common.pipeline_type != expected_type {
                return Err(ArchiveError::corrupt(format!(
                    "pipeline type mismatch in {} data",
                    chunk_kind.label()
                )));
            }
            let desc = decode_desc(cursor)?;
            Ok((common, desc))
        })?;
        Ok((header, common, desc))
    }

    /// Decodes the backend blob of a pipeline and loads its shader list
    fn load_pipeline_shaders(
        &self,
        header: &DataHeader,
        device: &dyn RenderDevice,
    ) -> Result<Vec<Arc<dyn Shader>>> {
        let data = self.load_backend_data(header)?;
        let mut cursor = ReadCursor::new(&data);
        let mut indices = Vec::new();
        serialize_shader_indices(&mut cursor, &mut indices)?;
        if !cursor.is_end() {
            return Err(ArchiveError::corrupt("trailing bytes in pipeline backend data"));
        }
        self.load_shaders(&indices, device)
    }

    // ---- per-kind unpack sequences -----------------------------------------

    fn unpack_signature_inner(
        &self,
        name: &str,
        device: &dyn RenderDevice,
    ) -> Result<Arc<dyn ResourceSignature>> {
        let kind = ChunkKind::ResourceSignature;
        let (location, cached) = Self::lookup(&self.signatures, kind.label(), name)?;
        if let Some(live) = cached {
            return Ok(live);
        }

        let (header, mut desc) = self.decode_shared(kind, location, |cursor| {
            let mut desc = PipelineResourceSignatureDesc::default();
            schema::serialize_signature_desc(cursor, &mut desc)?;
            Ok(desc)
        })?;
        desc.name = name.to_string();

        let backend_data = self.load_backend_data(&header)?;
        let signature = device
            .create_resource_signature(&desc, &backend_data)
            .map_err(|err| ArchiveError::FactoryFailed(err.to_string()))?;

        Self::install(&self.signatures, name, &signature);
        Ok(signature)
    }

    fn unpack_render_pass_inner(
        &self,
        name: &str,
        device: &dyn RenderDevice,
        overrides: &RenderPassOverrides,
    ) -> Result<Arc<dyn RenderPass>> {
        let kind = ChunkKind::RenderPass;
        let has_overrides = overrides.any();

        let (location, cached) = Self::lookup(&self.render_passes, kind.label(), name)?;
        if !has_overrides {
            if let Some(live) = cached {
                return Ok(live);
            }
        }

        let (_, mut desc) = self.decode_shared(kind, location, |cursor| {
            let mut desc = RenderPassDesc::default();
            schema::serialize_render_pass_desc(cursor, &mut desc)?;
            Ok(desc)
        })?;
        desc.name = name.to_string();

        for over in &overrides.attachments {
            let index = over.attachment_index as usize;
            let Some(attachment) = desc.attachments.get_mut(index) else {
                return Err(ArchiveError::invalid(format!(
                    "attachment override index {index} is out of range for render pass '{name}'"
                )));
            };
            if let Some(format) = over.format {
                attachment.format = format;
            }
            if let Some(sample_count) = over.sample_count {
                attachment.sample_count = sample_count;
            }
            if let Some(load_op) = over.load_op {
                attachment.load_op = load_op;
            }
            if let Some(store_op) = over.store_op {
                attachment.store_op = store_op;
            }
            if let Some(stencil_load_op) = over.stencil_load_op {
                attachment.stencil_load_op = stencil_load_op;
            }
            if let Some(stencil_store_op) = over.stencil_store_op {
                attachment.stencil_store_op = stencil_store_op;
            }
            if let Some(initial_state) = over.initial_state {
                attachment.initial_state = initial_state;
            }
            if let Some(final_state) = over.final_state {
                attachment.final_state = final_state;
            }
        }

        let render_pass = device
            .create_render_pass(&desc)
            .map_err(|err| ArchiveError::FactoryFailed(err.to_string()))?;

        if !has_overrides {
            Self::install(&self.render_passes, name, &render_pass);
        }
        Ok(render_pass)
    }

    fn unpack_graphics_inner(
        &self,
        name: &str,
        device: &dyn RenderDevice,
        overrides: &PipelineOverrides,
    ) -> Result<Arc<dyn Pipeline>> {
        let kind = ChunkKind::GraphicsPipeline;
        let has_overrides = overrides.any();

        let (location, cached) = Self::lookup(&self.graphics, kind.label(), name)?;
        if !has_overrides {
            if let Some(live) = cached {
                return Ok(live);
            }
        }

        let (header, common, mut desc) =
            self.decode_pipeline_shared(kind, PipelineType::Graphics, location, |cursor| {
                let mut desc = GraphicsPipelineDesc::default();
                schema::serialize_graphics_pipeline_desc(cursor, &mut desc)?;
                Ok(desc)
            })?;

        // Temporary strong references for the duration of pipeline creation;
        // released when this function returns.
        let render_pass = match &desc.render_pass {
            Some(rp_name) => Some(self.unpack_render_pass(
                rp_name,
                device,
                &RenderPassOverrides::default(),
            )?),
            None => None,
        };
        let signatures = self.resolve_signatures(&common.signature_names, device)?;
        let shaders = self.load_pipeline_shaders(&header, device)?;

        let mut ci = GraphicsPipelineCreateInfo {
            name: name.to_string(),
            desc: GraphicsPipelineDesc::default(),
            signatures,
            render_pass,
            vs: None,
            ps: None,
            gs: None,
            hs: None,
            ds: None,
            amplification: None,
            mesh: None,
        };
        for shader in shaders {
            let slot = match shader.shader_type() {
                ShaderType::Vertex => &mut ci.vs,
                ShaderType::Pixel => &mut ci.ps,
                ShaderType::Geometry => &mut ci.gs,
                ShaderType::Hull => &mut ci.hs,
                ShaderType::Domain => &mut ci.ds,
                ShaderType::Amplification => &mut ci.amplification,
                ShaderType::Mesh => &mut ci.mesh,
                other => {
                    return Err(ArchiveError::corrupt(format!(
                        "unsupported shader type {other:?} in graphics pipeline '{name}'"
                    )));
                }
            };
            *slot = Some(shader);
        }

        if let Some(over) = &overrides.name {
            ci.name = over.clone();
        }
        if let Some(over) = &overrides.rasterizer {
            desc.rasterizer_desc = *over;
        }
        if let Some(over) = &overrides.blend {
            desc.blend_desc = over.clone();
        }
        if let Some(over) = overrides.sample_mask {
            desc.sample_mask = over;
        }
        if let Some(over) = &overrides.depth_stencil {
            desc.depth_stencil_desc = *over;
        }
        if let Some(over) = &overrides.input_layout {
            desc.input_layout = over.clone();
        }
        if let Some(over) = overrides.primitive_topology {
            desc.primitive_topology = over;
        }
        if let Some(over) = overrides.num_viewports {
            desc.num_viewports = over;
        }
        if let Some(over) = &overrides.render_targets {
            desc.num_render_targets = over.count;
            desc.rtv_formats = over.formats;
        }
        if let Some(over) = &overrides.render_pass {
            desc.render_pass = Some(over.render_pass.name().to_string());
            desc.subpass_index = over.subpass_index;
            ci.render_pass = Some(Arc::clone(&over.render_pass));
        }
        if let Some(over) = overrides.shading_rate_flags {
            desc.shading_rate_flags = over;
        }
        if let Some(over) = overrides.dsv_format {
            desc.dsv_format = over;
        }
        if let Some(over) = overrides.sample_desc {
            desc.sample_desc = over;
        }
        ci.desc = desc;

        let pipeline = device
            .create_graphics_pipeline(ci)
            .map_err(|err| ArchiveError::FactoryFailed(err.to_string()))?;

        if !has_overrides {
            Self::install(&self.graphics, name, &pipeline);
        }
        Ok(pipeline)
    }

    fn unpack_compute_inner(
        &self,
        name: &str,
        device: &dyn RenderDevice,
    ) -> Result<Arc<dyn Pipeline>> {
        let kind = ChunkKind::ComputePipeline;
        let (location, cached) = Self::lookup(&self.compute, kind.label(), name)?;
        if let Some(live) = cached {
            return Ok(live);
        }

        let (header, common, ()) =
            self.decode_pipeline_shared(kind, PipelineType::Compute, location, |_| Ok(()))?;

        let signatures = self.resolve_signatures(&common.signature_names, device)?;
        let mut shaders = self.load_pipeline_shaders(&header, device)?;
        if shaders.len() != 1 || shaders[0].shader_type() != ShaderType::Compute {
            return Err(ArchiveError::corrupt(format!(
                "compute pipeline '{name}' must reference exactly one compute shader"
            )));
        }
        let cs = shaders.remove(0);

        let pipeline = device
            .create_compute_pipeline(ComputePipelineCreateInfo {
                name: name.to_string(),
                signatures,
                cs,
            })
            .map_err(|err| ArchiveError::FactoryFailed(err.to_string()))?;

        Self::install(&self.compute, name, &pipeline);
        Ok(pipeline)
    }

    fn unpack_tile_inner(
        &self,
        name: &str,
        device: &dyn RenderDevice,
        overrides: &PipelineOverrides,
    ) -> Result<Arc<dyn Pipeline>> {
        let kind = ChunkKind::TilePipeline;
        let has_overrides = overrides.any();

        let (location, cached) = Self::lookup(&self.tile, kind.label(), name)?;
        if !has_overrides {
            if let Some(live) = cached {
                return Ok(live);
            }
        }

        let (header, common, mut desc) =
            self.decode_pipeline_shared(kind, PipelineType::Tile, location, |cursor| {
                let mut desc = TilePipelineDesc::default();
                schema::serialize_tile_pipeline_desc(cursor, &mut desc)?;
                Ok(desc)
            })?;

        let signatures = self.resolve_signatures(&common.signature_names, device)?;
        let mut shaders = self.load_pipeline_shaders(&header, device)?;
        if shaders.len() != 1 || shaders[0].shader_type() != ShaderType::Tile {
            return Err(ArchiveError::corrupt(format!(
                "tile pipeline '{name}' must reference exactly one tile shader"
            )));
        }
        let ts = shaders.remove(0);

        let mut pipeline_name = name.to_string();
        if let Some(over) = &overrides.name {
            pipeline_name = over.clone();
        }
        if let Some(over) = &overrides.render_targets {
            desc.num_render_targets = over.count;
            desc.rtv_formats = over.formats;
        }
        if let Some(over) = overrides.sample_desc {
            desc.sample_count = over.count;
        }

        let pipeline = device
            .create_tile_pipeline(TilePipelineCreateInfo {
                name: pipeline_name,
                desc,
                signatures,
                ts,
            })
            .map_err(|err| ArchiveError::FactoryFailed(err.to_string()))?;

        if !has_overrides {
            Self::install(&self.tile, name, &pipeline);
        }
        Ok(pipeline)
    }

    fn unpack_ray_tracing_inner(
        &self,
        name: &str,
        device: &dyn RenderDevice,
    ) -> Result<Arc<dyn Pipeline>> {
        let kind = ChunkKind::RayTracingPipeline;
        let (location, cached) = Self::lookup(&self.ray_tracing, kind.label(), name)?;
        if let Some(live) = cached {
            return Ok(live);
        }

        let (header, common, desc) =
            self.decode_pipeline_shared(kind, PipelineType::RayTracing, location, |cursor| {
                let mut desc = RayTracingPipelineDesc::default();
                schema::serialize_ray_tracing_pipeline_desc(cursor, &mut desc)?;
                Ok(desc)
            })?;

        let signatures = self.resolve_signatures(&common.signature_names, device)?;
        let shaders = self.load_pipeline_shaders(&header, device)?;

        let shader_count = shaders.len() as u32;
        let check = |index: u32| -> Result<()> {
            if index >= shader_count {
                return Err(ArchiveError::corrupt(format!(
                    "shader group member {index} is out of range in ray tracing pipeline '{name}'"
                )));
            }
            Ok(())
        };
        for group in &desc.general_shaders {
            check(group.shader)?;
        }
        for group in &desc.triangle_hit_shaders {
            check(group.closest_hit_shader)?;
            if let Some(index) = group.any_hit_shader {
                check(index)?;
            }
        }
        for group in &desc.procedural_hit_shaders {
            check(group.intersection_shader)?;
            if let Some(index) = group.closest_hit_shader {
                check(index)?;
            }
            if let Some(index) = group.any_hit_shader {
                check(index)?;
            }
        }

        let pipeline = device
            .create_ray_tracing_pipeline(RayTracingPipelineCreateInfo {
                name: name.to_string(),
                desc,
                signatures,
                shaders,
            })
            .map_err(|err| ArchiveError::FactoryFailed(err.to_string()))?;

        Self::install(&self.ray_tracing, name, &pipeline);
        Ok(pipeline)
    }
}
