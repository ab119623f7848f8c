//! Archive writer
//!
//! The [`Archiver`] accumulates named device objects (resource signatures,
//! render passes, four kinds of pipelines) together with per-backend
//! specialized bytes, then lays the whole set out as one archive in a fixed
//! sequence of phases: assemble the debug and shader chunks, assemble each
//! named-resource chunk while filling the shared-data and per-backend
//! buffers, compute absolute offsets, back-patch the chunk directories and
//! emit everything to the sink.
//!
//! Writing is single-producer: the archiver is not thread-safe across `add_*`
//! calls. Emission is deterministic for a given set of inputs registered in
//! the same order.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::backend::{Backend, BackendFlags, BACKEND_COUNT};
use crate::device::{ShaderPatcher, ShaderStageData};
use crate::error::{ArchiveError, Result};
use crate::format::{
    ArchiveHeader, ChunkHeader, ChunkKind, DataHeader, FileOffsetAndSize, API_VERSION,
    CHUNK_KIND_COUNT, INVALID_OFFSET,
};
use crate::schema::{encode, ArchiveDebugInfo, PipelineCommonData};
use crate::source::ByteSink;
use crate::types::{
    GraphicsPipelineDesc, PipelineResourceSignatureDesc, PipelineType, RayTracingPipelineDesc,
    ShaderCreateInfo, TilePipelineDesc, MAX_RESOURCE_SIGNATURES,
};

/// A resource signature ready for archiving: its description plus the
/// specialized bytes of every backend that has any.
///
/// The macOS slot is ignored; macOS shares the iOS signature bytes and the
/// writer resolves that aliasing itself.
#[derive(Debug, Clone, Default)]
pub struct SignatureArchiveData {
    pub desc: PipelineResourceSignatureDesc,
    pub backend_data: [Option<Vec<u8>>; BACKEND_COUNT],
}

impl SignatureArchiveData {
    pub fn new(desc: PipelineResourceSignatureDesc) -> Self {
        SignatureArchiveData {
            desc,
            backend_data: Default::default(),
        }
    }

    pub fn with_backend_data(mut self, backend: Backend, data: Vec<u8>) -> Self {
        self.backend_data[backend.index()] = Some(data);
        self
    }
}

/// Inputs for archiving a graphics pipeline
#[derive(Debug, Clone, Default)]
pub struct GraphicsPipelineArchiveInfo {
    pub name: String,
    pub desc: GraphicsPipelineDesc,
    pub flags: u32,
    pub signatures: Vec<SignatureArchiveData>,
    pub render_pass: Option<crate::types::RenderPassDesc>,
    pub shader_stages: Vec<ShaderStageData>,
}

#[derive(Debug, Clone, Default)]
pub struct ComputePipelineArchiveInfo {
    pub name: String,
    pub flags: u32,
    pub signatures: Vec<SignatureArchiveData>,
    pub shader_stages: Vec<ShaderStageData>,
}

#[derive(Debug, Clone, Default)]
pub struct TilePipelineArchiveInfo {
    pub name: String,
    pub desc: TilePipelineDesc,
    pub flags: u32,
    pub signatures: Vec<SignatureArchiveData>,
    pub shader_stages: Vec<ShaderStageData>,
}

#[derive(Debug, Clone, Default)]
pub struct RayTracingPipelineArchiveInfo {
    pub name: String,
    pub desc: RayTracingPipelineDesc,
    pub flags: u32,
    pub signatures: Vec<SignatureArchiveData>,
    pub shader_stages: Vec<ShaderStageData>,
}

/// Per-backend shader table with content-keyed deduplication.
///
/// The map is keyed by the full serialized bytes (description prefix plus
/// payload), never by a hash, so index collisions are impossible.
#[derive(Debug, Default)]
struct ShaderTable {
    map: HashMap<Arc<[u8]>, u32>,
    list: Vec<Arc<[u8]>>,
}

impl ShaderTable {
    fn intern(&mut self, key: Vec<u8>) -> u32 {
        let key: Arc<[u8]> = key.into();
        if let Some(&index) = self.map.get(&key) {
            return index;
        }
        let index = self.list.len() as u32;
        self.list.push(Arc::clone(&key));
        self.map.insert(key, index);
        index
    }

    fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

/// Write handle a [`ShaderPatcher`] uses to add specialized shaders to one
/// backend's shader table
pub struct ShaderRecorder<'a> {
    table: &'a mut ShaderTable,
}

impl ShaderRecorder<'_> {
    /// Deduplicates the shader by content and returns its table index.
    ///
    /// Two calls with byte-identical description and payload return the same
    /// index; the table stores the shader once.
    pub fn serialize_shader(&mut self, ci: &ShaderCreateInfo, payload: &[u8]) -> Result<u32> {
        let prefix = encode::shader_create_info(ci)?;
        let mut key = Vec::with_capacity(prefix.len() + payload.len());
        key.extend_from_slice(&prefix);
        key.extend_from_slice(payload);
        Ok(self.table.intern(key))
    }
}

#[derive(Debug)]
struct PendingSignature {
    shared: Vec<u8>,
    /// Normalized: the macOS slot is always `None`
    backend_data: [Option<Vec<u8>>; BACKEND_COUNT],
}

#[derive(Debug)]
struct PendingRenderPass {
    shared: Vec<u8>,
}

#[derive(Debug)]
struct PendingPipeline {
    shared: Vec<u8>,
    backend_data: [Option<Vec<u8>>; BACKEND_COUNT],
}

/// Buffers assembled during serialization, before offsets are known
#[derive(Default)]
struct PendingData {
    chunk_bodies: [Option<Vec<u8>>; CHUNK_KIND_COUNT],
    /// Named chunks only: byte position of the data-offset parallel array
    /// within the chunk body, plus the entry count, for back-patching
    offset_patches: [Option<(usize, usize)>; CHUNK_KIND_COUNT],
    shared: Vec<u8>,
    per_backend: [Vec<u8>; BACKEND_COUNT],
}

/// Accumulates device objects and serializes them into one archive
pub struct Archiver {
    patcher: Arc<dyn ShaderPatcher>,
    build_commit: Option<String>,
    signatures: BTreeMap<String, PendingSignature>,
    /// Content digest of every registered signature, for coalescing repeated
    /// additions from different pipelines without byte comparisons
    signature_content: HashMap<[u8; 32], String>,
    render_passes: BTreeMap<String, PendingRenderPass>,
    graphics: BTreeMap<String, PendingPipeline>,
    compute: BTreeMap<String, PendingPipeline>,
    tile: BTreeMap<String, PendingPipeline>,
    ray_tracing: BTreeMap<String, PendingPipeline>,
    shaders: [ShaderTable; BACKEND_COUNT],
}

impl Archiver {
    pub fn new(patcher: Arc<dyn ShaderPatcher>) -> Self {
        Archiver {
            patcher,
            build_commit: None,
            signatures: BTreeMap::new(),
            signature_content: HashMap::new(),
            render_passes: BTreeMap::new(),
            graphics: BTreeMap::new(),
            compute: BTreeMap::new(),
            tile: BTreeMap::new(),
            ray_tracing: BTreeMap::new(),
            shaders: Default::default(),
        }
    }

    /// Optional build identifier recorded in the debug-info chunk
    pub fn set_build_commit(&mut self, commit: impl Into<String>) {
        self.build_commit = Some(commit.into());
    }

    /// Registers a resource signature under its name.
    ///
    /// Re-adding a signature with identical contents is a no-op; a different
    /// signature under an existing name is a [`ArchiveError::NameConflict`].
    pub fn add_resource_signature(&mut self, sig: &SignatureArchiveData) -> Result<()> {
        if sig.desc.name.is_empty() {
            return Err(ArchiveError::invalid("resource signature name must not be empty"));
        }

        let shared = encode::signature_desc(&sig.desc)?;
        let backend_data = Self::normalize_signature_slots(&sig.backend_data);
        let digest = Self::signature_digest(&shared, &backend_data);

        if let Some(existing) = self.signatures.get(&sig.desc.name) {
            // Fast path: the digest map already links this exact content to a name.
            let identical = match self.signature_content.get(&digest) {
                Some(name) => *name == sig.desc.name,
                None => existing.shared == shared && existing.backend_data == backend_data,
            };
            if identical {
                return Ok(());
            }
            return Err(ArchiveError::NameConflict {
                kind: ChunkKind::ResourceSignature.label(),
                name: sig.desc.name.clone(),
            });
        }

        self.signature_content
            .entry(digest)
            .or_insert_with(|| sig.desc.name.clone());
        self.signatures
            .insert(sig.desc.name.clone(), PendingSignature { shared, backend_data });
        Ok(())
    }

    /// Registers a render pass under its name, with the same duplicate
    /// semantics as [`Archiver::add_resource_signature`]
    pub fn add_render_pass(&mut self, desc: &crate::types::RenderPassDesc) -> Result<()> {
        if desc.name.is_empty() {
            return Err(ArchiveError::invalid("render pass name must not be empty"));
        }

        let shared = encode::render_pass_desc(desc)?;
        if let Some(existing) = self.render_passes.get(&desc.name) {
            if existing.shared == shared {
                return Ok(());
            }
            return Err(ArchiveError::NameConflict {
                kind: ChunkKind::RenderPass.label(),
                name: desc.name.clone(),
            });
        }

        self.render_passes
            .insert(desc.name.clone(), PendingRenderPass { shared });
        Ok(())
    }

    pub fn add_graphics_pipeline(
        &mut self,
        info: &GraphicsPipelineArchiveInfo,
        backends: BackendFlags,
    ) -> Result<()> {
        let mut desc = info.desc.clone();
        if let Some(render_pass) = &info.render_pass {
            self.add_render_pass(render_pass)?;
            desc.render_pass = Some(render_pass.name.clone());
        } else if let Some(name) = &desc.render_pass {
            if !self.render_passes.contains_key(name) {
                return Err(ArchiveError::invalid(format!(
                    "graphics pipeline '{}' references unknown render pass '{name}'",
                    info.name
                )));
            }
        }

        self.register_pipeline(
            PipelineType::Graphics,
            &info.name,
            info.flags,
            &info.signatures,
            &info.shader_stages,
            backends,
            |common| encode::graphics_shared(common, &desc),
        )
    }

    pub fn add_compute_pipeline(
        &mut self,
        info: &ComputePipelineArchiveInfo,
        backends: BackendFlags,
    ) -> Result<()> {
        self.register_pipeline(
            PipelineType::Compute,
            &info.name,
            info.flags,
            &info.signatures,
            &info.shader_stages,
            backends,
            encode::compute_shared,
        )
    }

    pub fn add_tile_pipeline(
        &mut self,
        info: &TilePipelineArchiveInfo,
        backends: BackendFlags,
    ) -> Result<()> {
        let desc = info.desc.clone();
        self.register_pipeline(
            PipelineType::Tile,
            &info.name,
            info.flags,
            &info.signatures,
            &info.shader_stages,
            backends,
            |common| encode::tile_shared(common, &desc),
        )
    }

    pub fn add_ray_tracing_pipeline(
        &mut self,
        info: &RayTracingPipelineArchiveInfo,
        backends: BackendFlags,
    ) -> Result<()> {
        let desc = info.desc.clone();
        self.register_pipeline(
            PipelineType::RayTracing,
            &info.name,
            info.flags,
            &info.signatures,
            &info.shader_stages,
            backends,
            |common| encode::ray_tracing_shared(common, &desc),
        )
    }

    /// Serializes all registered objects into `sink`
    pub fn serialize_to_stream<W: ByteSink>(&self, sink: &mut W) -> Result<()> {
        let mut pending = PendingData::default();

        self.write_debug_chunk(&mut pending)?;
        self.write_shaders_chunk(&mut pending)?;
        self.write_named_chunks(&mut pending)?;

        let (header, chunk_headers, total_size) = self.update_offsets(&mut pending)?;

        let mut written = 0u64;
        let header_bytes = header.to_bytes()?;
        written += header_bytes.len() as u64;
        sink.write_all(&header_bytes)?;
        for chunk_header in &chunk_headers {
            let bytes = chunk_header.to_bytes()?;
            written += bytes.len() as u64;
            sink.write_all(&bytes)?;
        }
        for body in pending.chunk_bodies.iter().flatten() {
            written += body.len() as u64;
            sink.write_all(body)?;
        }
        written += pending.shared.len() as u64;
        sink.write_all(&pending.shared)?;
        for block in pending.per_backend.iter().filter(|b| !b.is_empty()) {
            written += block.len() as u64;
            sink.write_all(block)?;
        }

        debug_assert_eq!(written, total_size, "emitted size must match computed layout");
        Ok(())
    }

    /// Serializes all registered objects into an in-memory blob
    pub fn serialize_to_blob(&self) -> Result<Vec<u8>> {
        let mut blob = Vec::new();
        self.serialize_to_stream(&mut blob)?;
        Ok(blob)
    }

    fn normalize_signature_slots(
        slots: &[Option<Vec<u8>>; BACKEND_COUNT],
    ) -> [Option<Vec<u8>>; BACKEND_COUNT] {
        let mut normalized = slots.clone();
        normalized[Backend::MetalMacos.index()] = None;
        normalized
    }

    fn signature_digest(
        shared: &[u8],
        backend_data: &[Option<Vec<u8>>; BACKEND_COUNT],
    ) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update((shared.len() as u64).to_le_bytes());
        hasher.update(shared);
        for slot in backend_data {
            match slot {
                Some(data) => {
                    hasher.update((data.len() as u64).to_le_bytes());
                    hasher.update(data);
                }
                None => hasher.update(u64::MAX.to_le_bytes()),
            }
        }
        hasher.finalize().into()
    }

    fn pipeline_map(&mut self, kind: PipelineType) -> &mut BTreeMap<String, PendingPipeline> {
        match kind {
            PipelineType::Graphics => &mut self.graphics,
            PipelineType::Compute => &mut self.compute,
            PipelineType::Tile => &mut self.tile,
            PipelineType::RayTracing => &mut self.ray_tracing,
        }
    }

    fn chunk_kind_of(kind: PipelineType) -> ChunkKind {
        match kind {
            PipelineType::Graphics => ChunkKind::GraphicsPipeline,
            PipelineType::Compute => ChunkKind::ComputePipeline,
            PipelineType::Tile => ChunkKind::TilePipeline,
            PipelineType::RayTracing => ChunkKind::RayTracingPipeline,
        }
    }

    /// Unique name for a synthesized default signature: the base name with a
    /// trailing integer when the base collides
    fn default_signature_name(&self, pipeline_name: &str) -> String {
        let base = format!("Default Signature of PSO '{pipeline_name}'");
        if !self.signatures.contains_key(&base) {
            return base;
        }
        let mut index = 1u32;
        loop {
            let candidate = format!("{base}{index}");
            if !self.signatures.contains_key(&candidate) {
                return candidate;
            }
            index += 1;
        }
    }

    fn validate_signatures(
        name: &str,
        signatures: &[SignatureArchiveData],
    ) -> Result<()> {
        let mut seen = [false; MAX_RESOURCE_SIGNATURES];
        for sig in signatures {
            if sig.desc.name.is_empty() {
                return Err(ArchiveError::invalid(format!(
                    "pipeline '{name}': resource signature name must not be empty"
                )));
            }
            let index = sig.desc.binding_index as usize;
            if index >= MAX_RESOURCE_SIGNATURES {
                return Err(ArchiveError::invalid(format!(
                    "pipeline '{name}': binding index {index} is out of range"
                )));
            }
            if seen[index] {
                return Err(ArchiveError::invalid(format!(
                    "pipeline '{name}': binding index {index} is used more than once"
                )));
            }
            seen[index] = true;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn register_pipeline(
        &mut self,
        kind: PipelineType,
        name: &str,
        flags: u32,
        signatures: &[SignatureArchiveData],
        stages: &[ShaderStageData],
        backends: BackendFlags,
        build_shared: impl FnOnce(&PipelineCommonData) -> Result<Vec<u8>>,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(ArchiveError::invalid("pipeline name must not be empty"));
        }
        backends.validate()?;
        Self::validate_signatures(name, signatures)?;

        let chunk_kind = Self::chunk_kind_of(kind);
        if self.pipeline_map(kind).contains_key(name) {
            return Err(ArchiveError::NameConflict {
                kind: chunk_kind.label(),
                name: name.to_string(),
            });
        }

        let use_default_signature = signatures.is_empty();
        let default_name = self.default_signature_name(name);

        // Ray tracing group members index the pipeline's shader list by
        // position, which must agree across backends; every other kind stores
        // its indices sorted.
        let sort_indices = kind != PipelineType::RayTracing;

        let patcher = Arc::clone(&self.patcher);
        let mut backend_data: [Option<Vec<u8>>; BACKEND_COUNT] = Default::default();
        let mut default_signature: Option<SignatureArchiveData> = None;

        for backend in backends.iter() {
            let mut recorder = ShaderRecorder {
                table: &mut self.shaders[backend.index()],
            };
            let output = patcher.patch_pipeline(
                backend,
                kind,
                name,
                stages,
                use_default_signature.then_some(default_name.as_str()),
                &mut recorder,
            )?;

            let mut indices = output.shader_indices;
            if sort_indices {
                indices.sort_unstable();
            }
            backend_data[backend.index()] = Some(encode::shader_indices(&indices)?);

            if let Some(synthesized) = output.default_signature {
                if !use_default_signature {
                    return Err(ArchiveError::invalid(format!(
                        "pipeline '{name}': patcher synthesized a default signature for a \
                         pipeline with explicit signatures"
                    )));
                }
                let entry = default_signature.get_or_insert_with(|| {
                    let mut desc = synthesized.desc.clone();
                    desc.name = default_name.clone();
                    SignatureArchiveData::new(desc)
                });
                let slot = backend.signature_source().index();
                entry.backend_data[slot].get_or_insert(synthesized.data);
            }
        }

        let mut signature_names = Vec::new();
        if use_default_signature {
            let Some(default_sig) = &default_signature else {
                return Err(ArchiveError::FactoryFailed(format!(
                    "pipeline '{name}' declares no resource signatures and the patcher \
                     synthesized no default"
                )));
            };
            self.add_resource_signature(default_sig)?;
            signature_names.push(default_sig.desc.name.clone());
            debug!(pipeline = name, signature = %default_sig.desc.name, "registered default signature");
        } else {
            for sig in signatures {
                self.add_resource_signature(sig)?;
                signature_names.push(sig.desc.name.clone());
            }
        }

        let common = PipelineCommonData {
            pipeline_type: kind,
            flags,
            signature_names,
        };
        let shared = build_shared(&common)?;

        self.pipeline_map(kind).insert(
            name.to_string(),
            PendingPipeline { shared, backend_data },
        );
        Ok(())
    }

    fn write_debug_chunk(&self, pending: &mut PendingData) -> Result<()> {
        let info = ArchiveDebugInfo {
            api_version: API_VERSION,
            commit: self.build_commit.clone(),
        };
        pending.chunk_bodies[ChunkKind::DebugInfo as usize] = Some(encode::debug_info(&info)?);
        Ok(())
    }

    /// Emits the shader preamble and payloads at the start of each backend
    /// block, and the [`DataHeader`] locating them as the chunk body
    fn write_shaders_chunk(&self, pending: &mut PendingData) -> Result<()> {
        if self.shaders.iter().all(ShaderTable::is_empty) {
            return Ok(());
        }

        let mut header = DataHeader::new(ChunkKind::Shaders);
        for backend in Backend::ALL {
            let table = &self.shaders[backend.index()];
            if table.is_empty() {
                continue;
            }

            let block = &mut pending.per_backend[backend.index()];
            debug_assert!(block.is_empty(), "shaders must be written before pipeline data");

            let preamble_offset = block.len();
            let preamble_size = table.list.len() * FileOffsetAndSize::SIZE;
            let mut payload_offset = preamble_offset + preamble_size;
            for shader in &table.list {
                let record = FileOffsetAndSize {
                    offset: u32::try_from(payload_offset)
                        .map_err(|_| ArchiveError::invalid("backend block exceeds 4 GiB"))?,
                    size: shader.len() as u32,
                };
                block.extend_from_slice(&record.offset.to_le_bytes());
                block.extend_from_slice(&record.size.to_le_bytes());
                payload_offset += shader.len();
            }
            for shader in &table.list {
                block.extend_from_slice(shader);
            }

            header.set_backend(backend, preamble_offset as u32, preamble_size as u32);
        }

        pending.chunk_bodies[ChunkKind::Shaders as usize] = Some(header.to_bytes()?);
        Ok(())
    }

    fn write_named_chunks(&self, pending: &mut PendingData) -> Result<()> {
        if !self.signatures.is_empty() {
            let entries = self.signatures.iter().map(|(name, sig)| {
                let mut slots: [Option<&[u8]>; BACKEND_COUNT] = [None; BACKEND_COUNT];
                for backend in Backend::ALL {
                    // macOS reuses the iOS signature bytes but still gets its
                    // own entry in its own block.
                    slots[backend.index()] =
                        sig.backend_data[backend.signature_source().index()].as_deref();
                }
                (name.as_str(), sig.shared.as_slice(), slots)
            });
            Self::build_named_chunk(ChunkKind::ResourceSignature, entries, pending)?;
        }

        if !self.render_passes.is_empty() {
            let entries = self.render_passes.iter().map(|(name, rp)| {
                let slots: [Option<&[u8]>; BACKEND_COUNT] = [None; BACKEND_COUNT];
                (name.as_str(), rp.shared.as_slice(), slots)
            });
            Self::build_named_chunk(ChunkKind::RenderPass, entries, pending)?;
        }

        for (kind, map) in [
            (ChunkKind::GraphicsPipeline, &self.graphics),
            (ChunkKind::ComputePipeline, &self.compute),
            (ChunkKind::RayTracingPipeline, &self.ray_tracing),
            (ChunkKind::TilePipeline, &self.tile),
        ] {
            if map.is_empty() {
                continue;
            }
            let entries = map.iter().map(|(name, pso)| {
                let mut slots: [Option<&[u8]>; BACKEND_COUNT] = [None; BACKEND_COUNT];
                for backend in Backend::ALL {
                    slots[backend.index()] = pso.backend_data[backend.index()].as_deref();
                }
                (name.as_str(), pso.shared.as_slice(), slots)
            });
            Self::build_named_chunk(kind, entries, pending)?;
        }

        Ok(())
    }

    /// Assembles one named-resource chunk body and the shared/per-backend
    /// bytes of its entries.
    ///
    /// Data offsets recorded in the chunk body are relative to the shared
    /// buffer until [`Archiver::update_offsets`] rebases them.
    fn build_named_chunk<'e>(
        kind: ChunkKind,
        entries: impl Iterator<Item = (&'e str, &'e [u8], [Option<&'e [u8]>; BACKEND_COUNT])>,
        pending: &mut PendingData,
    ) -> Result<()> {
        let mut names: Vec<&str> = Vec::new();
        let mut data_sizes: Vec<u32> = Vec::new();
        let mut data_offsets: Vec<u32> = Vec::new();

        for (name, shared_blob, slots) in entries {
            let mut header = DataHeader::new(kind);
            for backend in Backend::ALL {
                let Some(data) = slots[backend.index()] else {
                    continue;
                };
                let block = &mut pending.per_backend[backend.index()];
                let offset = u32::try_from(block.len())
                    .map_err(|_| ArchiveError::invalid("backend block exceeds 4 GiB"))?;
                block.extend_from_slice(data);
                header.set_backend(backend, offset, data.len() as u32);
            }

            let header_offset = u32::try_from(pending.shared.len())
                .map_err(|_| ArchiveError::invalid("shared data exceeds 4 GiB"))?;
            pending.shared.extend_from_slice(&header.to_bytes()?);
            pending.shared.extend_from_slice(shared_blob);

            names.push(name);
            data_sizes.push((DataHeader::SIZE + shared_blob.len()) as u32);
            data_offsets.push(header_offset);
        }

        let count = names.len();
        let mut body = Vec::new();
        body.extend_from_slice(&(count as u32).to_le_bytes());
        for name in &names {
            body.extend_from_slice(&(name.len() as u32 + 1).to_le_bytes());
        }
        for size in &data_sizes {
            body.extend_from_slice(&size.to_le_bytes());
        }
        let offsets_pos = body.len();
        for offset in &data_offsets {
            body.extend_from_slice(&offset.to_le_bytes());
        }
        for name in &names {
            body.extend_from_slice(name.as_bytes());
            body.push(0);
        }

        pending.chunk_bodies[kind as usize] = Some(body);
        pending.offset_patches[kind as usize] = Some((offsets_pos, count));
        Ok(())
    }

    /// Computes the absolute position of every region, rebases the chunk
    /// directories onto the shared-data base and produces the file header
    fn update_offsets(
        &self,
        pending: &mut PendingData,
    ) -> Result<(ArchiveHeader, Vec<ChunkHeader>, u64)> {
        let chunk_count = pending.chunk_bodies.iter().flatten().count();
        let mut offset = (ArchiveHeader::SIZE + chunk_count * ChunkHeader::SIZE) as u64;

        let mut chunk_headers = Vec::with_capacity(chunk_count);
        for (index, body) in pending.chunk_bodies.iter().enumerate() {
            let Some(body) = body else {
                continue;
            };
            let kind = ChunkKind::from_raw(index as u32)
                .ok_or_else(|| ArchiveError::corrupt("invalid pending chunk slot"))?;
            chunk_headers.push(ChunkHeader {
                kind,
                size: body.len() as u32,
                offset: to_file_offset(offset)?,
            });
            offset += body.len() as u64;
        }

        // Rebase every named chunk's data-offset array onto the final
        // position of the shared-data region.
        let shared_base = to_file_offset(offset)?;
        for (index, patch) in pending.offset_patches.iter().enumerate() {
            let (Some((offsets_pos, count)), Some(body)) =
                (patch, pending.chunk_bodies[index].as_mut())
            else {
                continue;
            };
            for slot in 0..*count {
                let pos = offsets_pos + slot * 4;
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(&body[pos..pos + 4]);
                let relative = u32::from_le_bytes(bytes);
                if relative == INVALID_OFFSET {
                    continue;
                }
                let absolute = relative
                    .checked_add(shared_base)
                    .ok_or_else(|| ArchiveError::invalid("archive exceeds 4 GiB"))?;
                body[pos..pos + 4].copy_from_slice(&absolute.to_le_bytes());
            }
        }
        offset += pending.shared.len() as u64;

        let mut header = ArchiveHeader {
            chunk_count: chunk_count as u32,
            ..Default::default()
        };
        for backend in Backend::ALL {
            let block = &pending.per_backend[backend.index()];
            if block.is_empty() {
                header.backend_base_offsets[backend.index()] = INVALID_OFFSET;
            } else {
                header.backend_base_offsets[backend.index()] = to_file_offset(offset)?;
                offset += block.len() as u64;
            }
        }

        Ok((header, chunk_headers, offset))
    }
}

fn to_file_offset(offset: u64) -> Result<u32> {
    // INVALID_OFFSET is reserved, so the archive must stay strictly below it.
    if offset >= INVALID_OFFSET as u64 {
        return Err(ArchiveError::invalid("archive exceeds 4 GiB"));
    }
    Ok(offset as u32)
}
