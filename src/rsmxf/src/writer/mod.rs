//! The writer orchestrator (C8): drives the KLV codec, partition list,
//! header-metadata engine, index engine and multiplexer end-to-end for
//! one output file.
//!
//! State machine (§4.8):
//! `Init -> PrepHeaderMeta -> OpenHeaderPartition -> WriteHeaderMeta ->
//! (OpenBodyPartition -> WriteCPs)* -> OpenFooterPartition ->
//! WriteFooterIndexOrMeta -> WriteRIP -> RepairHeaderPartitionAndMeta ->
//! Done`. This crate's writer always carries its index segments in the
//! footer partition (the "minimal partitions" flavour of the index
//! placement rule, applied uniformly rather than branching per flavour
//! flag) -- see DESIGN.md.

use crate::error::{MxfError, Result};
use crate::index::engine::{EditUnitInput, IndexEngine};
use crate::index::segment::FLAG_RANDOM_ACCESS;
use crate::io::MxfIo;
use crate::klv::kag::{fill_payload_for_total, FillKeyVariant};
use crate::klv::Id16;
use crate::metadata::value::{ProductVersionRecord, Timestamp};
use crate::metadata::{Metadata, Rational};
use crate::model::DataModel;
use crate::multiplex::{Multiplexer, SystemMetadataPack};
use crate::partition::{Partition, PartitionList, PartitionRole, Rip, RipEntry, CLOSED_COMPLETE, OPEN_COMPLETE, OPEN_INCOMPLETE};

/// SMPTE-377-2004 vs -2011 fill-key flavour, a `WriterConfig` field per
/// §9's resolution of the source's process-wide fill-key variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MxfEdition {
    Smpte377_2004,
    Smpte377_2011,
}

impl MxfEdition {
    fn fill_key_variant(self) -> FillKeyVariant {
        match self {
            MxfEdition::Smpte377_2004 => FillKeyVariant::Legacy,
            MxfEdition::Smpte377_2011 => FillKeyVariant::Compliant,
        }
    }
}

/// SMPTE 12M start timecode, as accepted by `WriterConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartTimecode {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
    pub drop_frame: bool,
}

/// Every tunable named in §6's "Writer configuration" paragraph. Fields
/// that drive the orchestrator's own control flow (edit rate, reserve
/// bytes, partition interval, flavour flags, body/index SIDs) are read
/// directly by `Writer`. Fields that only describe header-metadata
/// content (clip name, product identification, timestamps, package
/// UIDs, start timecode) are carried here for API completeness but are
/// the caller's to weave into the `Metadata` graph passed to `open()` --
/// the writer does not itself synthesize Identification or Package sets.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub edit_rate: Rational,
    pub start_timecode: StartTimecode,
    pub clip_name: String,
    pub company_name: String,
    pub product_name: String,
    pub product_version: ProductVersionRecord,
    pub product_uid: Id16,
    pub creation_timestamp: Timestamp,
    pub material_package_uid: Id16,
    pub file_source_package_uid: Id16,
    pub reserve_bytes: u64,
    /// Edit units between body-partition boundaries; 0 disables
    /// mid-stream body partitions (everything after the header lands in
    /// one body partition).
    pub partition_interval: u64,
    pub output_start_offset: i64,
    pub output_end_offset: i64,
    pub input_duration_hint: Option<i64>,
    pub edition: MxfEdition,
    pub minimal_partitions: bool,
    pub paged_output: bool,
    pub md5_checksum_sidecar: bool,
    /// Reproduces the source's `NO_BODY_PART_UPDATE_FLAVOUR`: body
    /// partition packs are left untouched by the final `update_partitions`
    /// rewrite pass.
    pub skip_body_partition_update: bool,
    pub kag_size: u32,
    pub min_llen: u8,
    pub body_sid: u32,
    pub index_sid: u32,
    pub operational_pattern: Id16,
    pub essence_containers: Vec<Id16>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            edit_rate: Rational { numerator: 25, denominator: 1 },
            start_timecode: StartTimecode::default(),
            clip_name: String::new(),
            company_name: String::new(),
            product_name: String::new(),
            product_version: ProductVersionRecord { major: 0, minor: 0, patch: 0, build: 0, release: 0 },
            product_uid: Id16::new([0u8; 16]),
            creation_timestamp: Timestamp { year: 0, month: 1, day: 1, hour: 0, minute: 0, second: 0, qmsec: 0 },
            material_package_uid: Id16::new([0u8; 16]),
            file_source_package_uid: Id16::new([0u8; 16]),
            reserve_bytes: 16 * 1024,
            partition_interval: 0,
            output_start_offset: 0,
            output_end_offset: 0,
            input_duration_hint: None,
            edition: MxfEdition::Smpte377_2011,
            minimal_partitions: true,
            paged_output: false,
            md5_checksum_sidecar: false,
            skip_body_partition_update: false,
            kag_size: 512,
            min_llen: 4,
            body_sid: 1,
            index_sid: 2,
            operational_pattern: crate::labels::OP_1A,
            essence_containers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Init,
    HeaderOpen,
    WritingBody,
    Closed,
}

/// Per-edit-unit picture-coding metadata an essence parser (an external
/// collaborator per §1) reports for the index engine: whether this edit
/// unit is a random-access point, its displayed-vs-coded temporal offset
/// (`None` until a later I/P-frame resolves it, the C6-delay mechanism),
/// and its signed offset to the nearest prior random-access point.
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    pub flags: u8,
    pub key_frame_offset: i8,
    pub temporal_offset: Option<i8>,
}

impl Default for FrameInfo {
    fn default() -> Self {
        FrameInfo { flags: FLAG_RANDOM_ACCESS, key_frame_offset: 0, temporal_offset: Some(0) }
    }
}

/// Drives C1-C7 end-to-end for one output file (C8).
pub struct Writer<IO: MxfIo> {
    io: IO,
    config: WriterConfig,
    model: DataModel,
    metadata: Option<Metadata>,
    mux: Multiplexer,
    index: IndexEngine,
    partitions: PartitionList,
    state: WriterState,
    edit_units_since_partition: u64,
    header_metadata_offset: u64,
    header_metadata_reserved: u64,
    frame_info: std::collections::HashMap<i64, FrameInfo>,
}

impl<IO: MxfIo> Writer<IO> {
    pub fn new(io: IO, config: WriterConfig, model: DataModel) -> Self {
        let variant = config.edition.fill_key_variant();
        let mux = Multiplexer::new(config.kag_size, config.min_llen, variant);
        let index = IndexEngine::new(config.body_sid, config.index_sid, config.edit_rate);
        Writer {
            io,
            model,
            metadata: None,
            mux,
            index,
            partitions: PartitionList::new(),
            state: WriterState::Init,
            edit_units_since_partition: 0,
            header_metadata_offset: 0,
            header_metadata_reserved: 0,
            frame_info: std::collections::HashMap::new(),
            config,
        }
    }

    fn fill_variant(&self) -> FillKeyVariant {
        self.config.edition.fill_key_variant()
    }

    pub fn register_picture(&mut self, track_index: usize, element_key: Id16, frame_size: u32) -> Result<usize> {
        self.mux.register_picture(track_index, element_key, frame_size)
    }

    pub fn register_sound(
        &mut self,
        track_index: usize,
        element_key: Id16,
        sample_sequence: Vec<u32>,
        sample_size: u32,
    ) -> Result<usize> {
        self.mux.register_sound(track_index, element_key, sample_sequence, sample_size)
    }

    pub fn register_data(&mut self, track_index: usize, element_key: Id16, len: u32, is_max: bool) -> Result<usize> {
        self.mux.register_data(track_index, element_key, len, is_max)
    }

    pub fn register_system_item(&mut self, element_key: Id16) -> Result<usize> {
        self.mux.register_system_item(element_key)
    }

    /// Encodes `pack` and routes it through `write_samples` for the
    /// system item registered at `element_index`, one call per edit
    /// unit (the pack's continuity count and user timecode advance on
    /// every content package, so it cannot be fixed at registration).
    pub fn write_system_item(&mut self, element_index: usize, pack: &SystemMetadataPack) -> Result<()> {
        let bytes = pack.encode(&crate::multiplex::package_metadata_set_key(), self.config.min_llen)?;
        self.write_samples(element_index, bytes, 1)
    }

    /// PrepHeaderMeta: fixes the multiplexer's element order and feeds the
    /// index engine in that exact order (§4.7's sort happens only here,
    /// so index registration must follow it, not precede it).
    pub fn prepare_write(&mut self) -> Result<()> {
        self.mux.prepare_write();
        for (track_index, timing) in self.mux.element_registrations() {
            self.index.register_element(track_index, timing);
        }
        self.index.prepare();
        Ok(())
    }

    /// OpenHeaderPartition + WriteHeaderMeta: validates `metadata`, writes
    /// the header partition pack (`OpenIncomplete`) and the reserved-size
    /// header metadata that follows it.
    pub fn open(&mut self, metadata: Metadata) -> Result<()> {
        if self.state != WriterState::Init {
            return Err(MxfError::state("open called more than once"));
        }
        metadata.validate(&self.model)?;
        self.metadata = Some(metadata);

        let mut header = Partition::new(PartitionRole::Header, OPEN_INCOMPLETE, self.config.operational_pattern);
        header.kag_size = self.config.kag_size;
        header.essence_containers = self.config.essence_containers.clone();
        self.partitions.append_new_partition(header);
        self.partitions.write_partition_pack(&mut self.io, 0, self.config.min_llen)?;

        self.header_metadata_offset = self.io.tell()?;
        self.write_header_metadata()?;
        let variant = self.fill_variant();
        let min_llen = self.config.min_llen;
        self.partitions.fill_to_kag(&mut self.io, 0, variant, min_llen)?;

        self.state = WriterState::HeaderOpen;
        Ok(())
    }

    /// Encodes the header-metadata graph into a reserved byte envelope
    /// (`reserve_bytes`, floored to the actual encoded size), padding the
    /// remainder with a KLV-Fill so the envelope can be rewritten in
    /// place at `close()` without moving anything after it (§8 property
    /// 8, §9 "in-place rewrite of header metadata").
    fn write_header_metadata(&mut self) -> Result<()> {
        let metadata = self
            .metadata
            .as_ref()
            .ok_or_else(|| MxfError::state("write_header_metadata called before open"))?;
        let mut buf = Vec::new();
        metadata.write(&mut buf, &self.model, self.config.min_llen)?;

        let reserve = self.config.reserve_bytes.max(buf.len() as u64);
        let extra = reserve - buf.len() as u64;
        self.io.write_all_mxf(&buf)?;
        if extra > 0 {
            let payload_len = fill_payload_for_total(extra, self.config.min_llen)?;
            let mut fill = Vec::new();
            crate::klv::kag::write_fill(&mut fill, payload_len, self.config.min_llen, self.fill_variant())?;
            self.io.write_all_mxf(&fill)?;
        }
        self.header_metadata_reserved = reserve;
        self.partitions.partitions[0].header_byte_count = reserve;
        Ok(())
    }

    /// Rewrites the header-metadata envelope in place with `metadata`'s
    /// current contents, e.g. to record a duration only known once all
    /// essence has been written. Must fit within the envelope reserved at
    /// `open()`.
    pub fn rewrite_header_metadata(&mut self, metadata: Metadata) -> Result<()> {
        metadata.validate(&self.model)?;
        let mut buf = Vec::new();
        metadata.write(&mut buf, &self.model, self.config.min_llen)?;
        if buf.len() as u64 > self.header_metadata_reserved {
            return Err(MxfError::state("rewritten header metadata exceeds the reserved byte budget"));
        }
        let pad = self.header_metadata_reserved - buf.len() as u64;
        self.io.seek(self.header_metadata_offset as i64, crate::io::Whence::Start)?;
        self.io.write_all_mxf(&buf)?;
        if pad > 0 {
            let payload_len = fill_payload_for_total(pad, self.config.min_llen)?;
            let mut fill = Vec::new();
            crate::klv::kag::write_fill(&mut fill, payload_len, self.config.min_llen, self.fill_variant())?;
            self.io.write_all_mxf(&fill)?;
        }
        self.metadata = Some(metadata);
        Ok(())
    }

    /// Records the picture-coding metadata for the content package the
    /// multiplexer is currently assembling, to be picked up once that
    /// package drains. Call before the `write_samples` call that
    /// completes the package; a package that drains with no entry here
    /// falls back to `FrameInfo::default()` (a random-access frame with
    /// no temporal offset).
    pub fn set_frame_info(&mut self, flags: u8, key_frame_offset: i8, temporal_offset: Option<i8>) {
        let pos = self.mux.current_position();
        self.frame_info.insert(pos, FrameInfo { flags, key_frame_offset, temporal_offset });
    }

    /// Routes one element's sample write through the multiplexer, then
    /// drains whatever content packages that completed straight to disk.
    pub fn write_samples(&mut self, element_index: usize, bytes: Vec<u8>, sample_count: u32) -> Result<()> {
        if self.state != WriterState::HeaderOpen && self.state != WriterState::WritingBody {
            return Err(MxfError::state("write_samples called before open() or after close()"));
        }
        if self.state == WriterState::HeaderOpen {
            self.open_body_partition()?;
        }
        self.mux.write_samples(element_index, bytes, sample_count)?;
        self.drain_ready_packages()
    }

    /// B-frame temporal offsets resolve only once a later I/P-frame is
    /// seen (C6-delay); callers update them here once known.
    pub fn update_temporal_offset(&mut self, position: i64, temporal_offset: i8) -> Result<()> {
        self.index.update_index_entry(position, temporal_offset)
    }

    fn drain_ready_packages(&mut self) -> Result<()> {
        let mut count = 0u64;
        {
            let index = &mut self.index;
            let io = &mut self.io;
            let frame_info = &mut self.frame_info;
            self.mux.drain_ready(&mut IoWriter(io), |cp| {
                count += 1;
                let sizes = Multiplexer::sub_element_sizes(cp);
                let info = frame_info.remove(&cp.position).unwrap_or_default();
                index.append_edit_unit(EditUnitInput {
                    sub_element_sizes: sizes,
                    temporal_offset: info.temporal_offset,
                    key_frame_offset: info.key_frame_offset,
                    flags: info.flags,
                })
            })?;
        }
        self.edit_units_since_partition += count;
        self.maybe_roll_body_partition()
    }

    fn maybe_roll_body_partition(&mut self) -> Result<()> {
        if self.config.partition_interval == 0 {
            return Ok(());
        }
        if self.edit_units_since_partition < self.config.partition_interval {
            return Ok(());
        }
        if !self.index.can_start_partition() {
            return Ok(());
        }
        self.open_body_partition()?;
        self.edit_units_since_partition = 0;
        Ok(())
    }

    /// OpenBodyPartition: a fresh Body partition pack carrying this
    /// writer's `body_sid`. Index segments are never placed here -- this
    /// writer always carries its index in the footer (see module doc).
    fn open_body_partition(&mut self) -> Result<()> {
        let header = self.partitions.partitions[0].clone();
        self.partitions.append_like(&header, PartitionRole::Body, OPEN_COMPLETE);
        let idx = self.partitions.partitions.len() - 1;
        self.partitions.partitions[idx].body_sid = self.config.body_sid;
        self.partitions.write_partition_pack(&mut self.io, idx, self.config.min_llen)?;
        let variant = self.fill_variant();
        let min_llen = self.config.min_llen;
        self.partitions.fill_to_kag(&mut self.io, idx, variant, min_llen)?;
        self.partitions.partitions[idx].body_offset = self.io.tell()?;
        self.state = WriterState::WritingBody;
        Ok(())
    }

    /// OpenFooterPartition -> WriteFooterIndexOrMeta -> WriteRIP ->
    /// RepairHeaderPartitionAndMeta.
    pub fn close(&mut self) -> Result<()> {
        if self.state == WriterState::Closed {
            return Err(MxfError::state("close called more than once"));
        }
        if self.state == WriterState::Init {
            return Err(MxfError::state("close called before open()"));
        }
        self.mux.flush()?;
        self.drain_ready_packages()?;

        let header = self.partitions.partitions[0].clone();
        self.partitions.append_like(&header, PartitionRole::Footer, CLOSED_COMPLETE);
        let footer_idx = self.partitions.partitions.len() - 1;
        self.partitions.write_partition_pack(&mut self.io, footer_idx, self.config.min_llen)?;

        let placeholder = IndexEngine::new(self.config.body_sid, self.config.index_sid, self.config.edit_rate);
        let segments = std::mem::replace(&mut self.index, placeholder).finalise()?;

        let index_start = self.io.tell()?;
        for seg in &segments {
            let mut buf = Vec::new();
            seg.write(&mut buf, self.config.min_llen)?;
            self.io.write_all_mxf(&buf)?;
        }
        let index_byte_count = self.io.tell()? - index_start;
        self.partitions.partitions[footer_idx].index_byte_count = index_byte_count;
        self.partitions.partitions[footer_idx].index_sid = if index_byte_count > 0 { self.config.index_sid } else { 0 };

        let mut rip = Rip::default();
        for p in &self.partitions.partitions {
            rip.entries.push(RipEntry { body_sid: p.body_sid, this_partition: p.this_partition });
        }
        let mut rip_buf = Vec::new();
        rip.write(&mut rip_buf, self.config.min_llen)?;
        self.io.write_all_mxf(&rip_buf)?;

        self.partitions.partitions[0].status = CLOSED_COMPLETE;
        self.partitions
            .update_partitions(&mut self.io, self.config.min_llen, self.config.skip_body_partition_update)?;

        self.state = WriterState::Closed;
        Ok(())
    }

    /// Unwraps the underlying backing store, e.g. to hand a closed
    /// in-memory file's bytes to a reader.
    pub fn into_inner(self) -> IO {
        self.io
    }
}

struct IoWriter<'a, T: MxfIo>(&'a mut T);
impl<'a, T: MxfIo> std::io::Write for IoWriter<'a, T> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .write_all_mxf(buf)
            .map(|_| buf.len())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{MemoryFile, MxfHandle};
    use crate::model::baseline;

    fn key(n: u8) -> Id16 {
        Id16::new([n; 16])
    }

    fn class_ul(group5: u8, group6: u8, group13: u8) -> Id16 {
        Id16::new([
            0x06, 0x0e, 0x2b, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0d, 0x01, group5, group6, 0x00, 0x00,
            0x00, group13,
        ])
    }

    fn item_ul(group13: u8, group14: u8, group15: u8) -> Id16 {
        Id16::new([
            0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x0a, 0x06, 0x01, 0x01, 0x00, group13,
            group14, group15, 0x00,
        ])
    }

    /// Builds the minimal valid Preface/ContentStorage/Package/Track/
    /// Sequence graph `baseline()`'s required-item set demands, the same
    /// way `metadata/mod.rs`'s own roundtrip test constructs one.
    fn build_metadata() -> (DataModel, Metadata) {
        use crate::metadata::value::ItemValue;
        use crate::model::instance_uid_item_ul;

        let model = baseline().unwrap();
        let mut metadata = Metadata::new();

        let sequence = metadata.new_set(class_ul(0x01, 0x06, 0x0f));
        metadata.set_item(sequence, instance_uid_item_ul(), ItemValue::Uuid(metadata.set(sequence).instance_uid));
        metadata.set_item(sequence, item_ul(0x06, 0x01, 0x01), ItemValue::Int64(0));

        let track = metadata.new_set(class_ul(0x01, 0x05, 0x3b));
        metadata.set_item(track, instance_uid_item_ul(), ItemValue::Uuid(metadata.set(track).instance_uid));
        metadata.set_item(track, item_ul(0x05, 0x01, 0x01), ItemValue::UInt32(1));
        metadata.set_item(
            track,
            item_ul(0x05, 0x01, 0x02),
            ItemValue::Rational(Rational { numerator: 25, denominator: 1 }),
        );
        metadata.set_item(track, item_ul(0x05, 0x01, 0x03), ItemValue::StrongRef(metadata.set(sequence).instance_uid));

        let package = metadata.new_set(class_ul(0x01, 0x04, 0x34));
        metadata.set_item(package, instance_uid_item_ul(), ItemValue::Uuid(metadata.set(package).instance_uid));
        metadata.set_item(package, item_ul(0x04, 0x01, 0x01), ItemValue::Umid(crate::klv::Umid([0u8; 32])));
        metadata.set_item(
            package,
            item_ul(0x04, 0x01, 0x02),
            ItemValue::Array(vec![ItemValue::StrongRef(metadata.set(track).instance_uid)]),
        );

        let content_storage = metadata.new_set(class_ul(0x01, 0x03, 0x18));
        metadata.set_item(
            content_storage,
            instance_uid_item_ul(),
            ItemValue::Uuid(metadata.set(content_storage).instance_uid),
        );
        metadata.set_item(
            content_storage,
            item_ul(0x03, 0x01, 0x01),
            ItemValue::Array(vec![ItemValue::StrongRef(metadata.set(package).instance_uid)]),
        );

        let preface = metadata.new_set(class_ul(0x01, 0x01, 0x2f));
        metadata.mark_preface(preface);
        metadata.set_item(preface, instance_uid_item_ul(), ItemValue::Uuid(metadata.set(preface).instance_uid));
        metadata.set_item(
            preface,
            item_ul(0x01, 0x02, 0x01),
            ItemValue::Array(Vec::new()),
        );
        metadata.set_item(
            preface,
            item_ul(0x01, 0x02, 0x02),
            ItemValue::StrongRef(metadata.set(content_storage).instance_uid),
        );
        metadata.set_item(preface, item_ul(0x01, 0x02, 0x03), ItemValue::Ul(crate::labels::OP_1A));

        (model, metadata)
    }

    #[test]
    fn writer_roundtrips_a_single_cbe_picture_track() {
        let model = baseline().unwrap();
        let (_model2, metadata) = build_metadata();
        let config = WriterConfig { reserve_bytes: 512, kag_size: 0x100, min_llen: 4, ..WriterConfig::default() };
        let io = MxfHandle::Memory(MemoryFile::new());
        let mut writer = Writer::new(io, config, model);
        let picture = writer.register_picture(0, key(9), 8).unwrap();
        writer.prepare_write().unwrap();
        writer.open(metadata).unwrap();
        for _ in 0..3 {
            writer.write_samples(picture, vec![0xABu8; 8], 1).unwrap();
        }
        writer.close().unwrap();
    }

    #[test]
    fn system_item_advances_continuity_count_per_edit_unit() {
        let model = baseline().unwrap();
        let (_model2, metadata) = build_metadata();
        let config = WriterConfig { reserve_bytes: 512, kag_size: 0x100, min_llen: 4, ..WriterConfig::default() };
        let io = MxfHandle::Memory(MemoryFile::new());
        let mut writer = Writer::new(io, config, model);
        let system = writer.register_system_item(key(3)).unwrap();
        let picture = writer.register_picture(0, key(9), 8).unwrap();
        writer.prepare_write().unwrap();
        writer.open(metadata).unwrap();
        for i in 0..3u16 {
            let pack = crate::multiplex::SystemMetadataPack { continuity_count: i, ..Default::default() };
            writer.write_system_item(system, &pack).unwrap();
            writer.write_samples(picture, vec![0xABu8; 8], 1).unwrap();
        }
        writer.close().unwrap();
    }

    #[test]
    fn set_frame_info_reaches_the_index_engine() {
        let model = baseline().unwrap();
        let (_model2, metadata) = build_metadata();
        let config = WriterConfig { reserve_bytes: 512, kag_size: 0x100, min_llen: 4, ..WriterConfig::default() };
        let io = MxfHandle::Memory(MemoryFile::new());
        let mut writer = Writer::new(io, config, model);
        let picture = writer.register_picture(0, key(9), 8).unwrap();
        writer.prepare_write().unwrap();
        writer.open(metadata).unwrap();
        for i in 0..3 {
            writer.set_frame_info(0, 0, if i == 0 { Some(0) } else { None });
            writer.write_samples(picture, vec![0xABu8; 8], 1).unwrap();
        }
        writer.update_temporal_offset(1, 1).unwrap();
        writer.update_temporal_offset(2, -1).unwrap();
        writer.close().unwrap();
    }
}
