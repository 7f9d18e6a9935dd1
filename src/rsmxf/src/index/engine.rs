use std::collections::VecDeque;

use crate::error::{MxfError, Result};
use crate::klv::Id16;
use crate::metadata::Rational;

use crate::index::segment::{is_random_access, DeltaEntry, IndexEntry, IndexTableSegment};

/// Bound on the entries byte size of one VBE segment, chosen so the
/// 16-bit item length in a segment's index-entry array tag never
/// overflows for any sane slice/pos-table count.
pub const MAX_INDEX_SEGMENT_SIZE: usize = 65_000;

/// Bound on unresolved (pending C6-delay) index entries; exceeding it is
/// a programming error rather than a format error.
pub const MAX_UNRESOLVED_ENTRIES: usize = 250;

/// How a registered sub-element's size behaves across edit units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementTiming {
    /// Constant byte count per edit unit.
    Cbe { size: u32 },
    /// Size varies per edit unit; `reordered` sets the delta entry's
    /// `pos_table_index` to -1 (the element carries temporally
    /// reordered frames, e.g. B-pictures).
    Vbe { reordered: bool },
}

#[derive(Debug, Clone, Copy)]
pub struct ElementRegistration {
    pub track_index: usize,
    pub timing: ElementTiming,
}

/// One edit unit's worth of per-sub-element sizes and (for VBE content
/// packages) picture-coding metadata, as the multiplexer observes it.
#[derive(Debug, Clone)]
pub struct EditUnitInput {
    pub sub_element_sizes: Vec<u32>,
    /// `None` until the next I/P-frame resolves it (C6-delay).
    pub temporal_offset: Option<i8>,
    pub key_frame_offset: i8,
    pub flags: u8,
}

/// Builds the delta-entry array from a sequence of sub-element
/// registrations: elements sharing one CBE run share a slice and
/// accumulate `element_delta`; each VBE element opens a fresh slice and
/// resets it, per §4.6's "Per-element registration".
fn build_delta_entries(elements: &[ElementRegistration]) -> (Vec<DeltaEntry>, u8) {
    let mut out = Vec::with_capacity(elements.len());
    let mut slice: u8 = 0;
    let mut running_delta: u32 = 0;
    let mut slice_opened = false;
    for (i, el) in elements.iter().enumerate() {
        match el.timing {
            ElementTiming::Cbe { size } => {
                if !slice_opened {
                    slice_opened = true;
                }
                out.push(DeltaEntry {
                    pos_table_index: 0,
                    slice,
                    element_delta: running_delta,
                });
                running_delta += size;
            }
            ElementTiming::Vbe { reordered } => {
                if i > 0 {
                    slice += 1;
                }
                running_delta = 0;
                slice_opened = true;
                out.push(DeltaEntry {
                    pos_table_index: if reordered { -1 } else { 0 },
                    slice,
                    element_delta: 0,
                });
            }
        }
    }
    let slice_count = if slice_opened { slice + 1 } else { 0 };
    (out, slice_count)
}

struct CbeAccumulator {
    first_size: Option<u64>,
    first_count: u64,
    steady_size: Option<u64>,
    steady_count: u64,
}

impl CbeAccumulator {
    fn new() -> Self {
        CbeAccumulator {
            first_size: None,
            first_count: 0,
            steady_size: None,
            steady_count: 0,
        }
    }

    fn append(&mut self, size: u64) -> Result<()> {
        if self.first_size.is_none() {
            self.first_size = Some(size);
            self.first_count = 1;
            return Ok(());
        }
        if self.steady_size.is_none() {
            if size == self.first_size.unwrap() {
                self.first_count += 1;
                return Ok(());
            }
            self.steady_size = Some(size);
            self.steady_count = 1;
            return Ok(());
        }
        if size != self.steady_size.unwrap() {
            return Err(MxfError::index("CBE sub-element size changed mid-stream"));
        }
        self.steady_count += 1;
        Ok(())
    }

    /// Builds the final segment list, collapsing the one-off-header
    /// pair into a single segment when every observed edit unit shared
    /// one size after all.
    fn finalise(
        &self,
        new_instance_uid: &mut impl FnMut() -> Id16,
        edit_rate: Rational,
        body_sid: u32,
        index_sid: u32,
    ) -> Vec<IndexTableSegment> {
        let Some(first_size) = self.first_size else {
            return Vec::new();
        };
        match self.steady_size {
            None => {
                let mut seg =
                    IndexTableSegment::new_cbe(new_instance_uid(), edit_rate, 0, body_sid, index_sid, first_size as u32);
                seg.index_duration = self.first_count as i64;
                vec![seg]
            }
            Some(steady) => {
                let mut first = IndexTableSegment::new_cbe(
                    new_instance_uid(),
                    edit_rate,
                    0,
                    body_sid,
                    index_sid,
                    first_size as u32,
                );
                first.index_duration = self.first_count as i64;
                let mut rest = IndexTableSegment::new_cbe(
                    new_instance_uid(),
                    edit_rate,
                    self.first_count as i64,
                    body_sid,
                    index_sid,
                    steady as u32,
                );
                rest.index_duration = self.steady_count as i64;
                vec![first, rest]
            }
        }
    }
}

struct VbeAccumulator {
    segments: Vec<IndexTableSegment>,
    open: Option<usize>,
    position: i64,
    stream_offset: u64,
    unresolved: VecDeque<(usize, usize)>,
    flushed_count: usize,
}

impl VbeAccumulator {
    fn new() -> Self {
        VbeAccumulator {
            segments: Vec::new(),
            open: None,
            position: 0,
            stream_offset: 0,
            unresolved: VecDeque::new(),
            flushed_count: 0,
        }
    }
}

/// The index-table engine for one `(body_sid, index_sid)` stream:
/// accumulates CBE or VBE segments from per-edit-unit sub-element sizes.
pub struct IndexEngine {
    body_sid: u32,
    index_sid: u32,
    edit_rate: Rational,
    elements: Vec<ElementRegistration>,
    delta_entries: Vec<DeltaEntry>,
    slice_count: u8,
    is_cbe: bool,
    cbe: CbeAccumulator,
    vbe: VbeAccumulator,
}

impl IndexEngine {
    pub fn new(body_sid: u32, index_sid: u32, edit_rate: Rational) -> Self {
        IndexEngine {
            body_sid,
            index_sid,
            edit_rate,
            elements: Vec::new(),
            delta_entries: Vec::new(),
            slice_count: 0,
            is_cbe: true,
            cbe: CbeAccumulator::new(),
            vbe: VbeAccumulator::new(),
        }
    }

    pub fn register_element(&mut self, track_index: usize, timing: ElementTiming) {
        self.elements.push(ElementRegistration { track_index, timing });
    }

    /// Finalises registration: builds the delta-entry array and decides
    /// whether the stream as a whole is CBE (every sub-element CBE) or
    /// VBE (any sub-element VBE).
    pub fn prepare(&mut self) {
        let (delta_entries, slice_count) = build_delta_entries(&self.elements);
        self.delta_entries = delta_entries;
        self.slice_count = slice_count;
        self.is_cbe = self
            .elements
            .iter()
            .all(|e| matches!(e.timing, ElementTiming::Cbe { .. }));
    }

    pub fn is_cbe(&self) -> bool {
        self.is_cbe
    }

    /// Appends one edit unit's worth of sub-element sizes. Dispatches to
    /// the CBE or VBE accumulator per `prepare()`'s decision.
    pub fn append_edit_unit(&mut self, input: EditUnitInput) -> Result<()> {
        if input.sub_element_sizes.len() != self.elements.len() {
            return Err(MxfError::state(
                "edit unit sub-element count does not match registered elements",
            ));
        }
        let content_package_size: u64 = input.sub_element_sizes.iter().map(|&s| s as u64).sum();
        if self.is_cbe {
            for (el, &size) in self.elements.iter().zip(&input.sub_element_sizes) {
                if let ElementTiming::Cbe { size: expected } = el.timing {
                    if size != expected {
                        return Err(MxfError::index("CBE sub-element size changed mid-stream"));
                    }
                }
            }
            self.cbe.append(content_package_size)
        } else {
            self.append_vbe(content_package_size, &input)
        }
    }

    fn append_vbe(&mut self, content_package_size: u64, input: &EditUnitInput) -> Result<()> {
        let can_start = is_random_access(input.flags);
        let entry_len_estimate = 1 + 1 + 1 + 8 + 4 * self.slice_count as usize;

        let needs_new_segment = match self.vbe.open {
            None => true,
            Some(idx) => {
                let seg = &self.vbe.segments[idx];
                can_start && seg.entries_byte_size() + entry_len_estimate > MAX_INDEX_SEGMENT_SIZE
            }
        };
        if needs_new_segment {
            let seg = IndexTableSegment::new_vbe(
                Id16::new(*uuid::Uuid::new_v4().as_bytes()),
                self.edit_rate,
                self.vbe.position,
                self.body_sid,
                self.index_sid,
                self.slice_count,
                0,
            );
            self.vbe.segments.push(seg);
            self.vbe.open = Some(self.vbe.segments.len() - 1);
        }

        let slice_offsets = self.compute_slice_offsets();
        let entry = IndexEntry {
            temporal_offset: input.temporal_offset.unwrap_or(0),
            key_frame_offset: input.key_frame_offset,
            flags: input.flags,
            stream_offset: self.vbe.stream_offset,
            slice_offsets,
            pos_table: Vec::new(),
        };

        let seg_idx = self.vbe.open.unwrap();
        let entry_idx = self.vbe.segments[seg_idx].index_entries.len();
        self.vbe.segments[seg_idx].index_entries.push(entry);
        self.vbe.segments[seg_idx].index_duration += 1;

        if input.temporal_offset.is_none() {
            if self.vbe.unresolved.len() >= MAX_UNRESOLVED_ENTRIES {
                return Err(MxfError::index("IndexBacklog: unresolved temporal-offset backlog exceeded"));
            }
            self.vbe.unresolved.push_back((seg_idx, entry_idx));
        }

        self.vbe.position += 1;
        self.vbe.stream_offset += content_package_size;
        Ok(())
    }

    fn compute_slice_offsets(&self) -> Vec<u32> {
        if self.slice_count == 0 {
            return Vec::new();
        }
        // Offset of slice N within the content package is the element
        // offset of the first sub-element assigned to that slice.
        let mut offsets = vec![0u32; self.slice_count as usize];
        let mut cumulative = 0u32;
        let mut last_slice = None;
        for (el, delta) in self.elements.iter().zip(&self.delta_entries) {
            if last_slice != Some(delta.slice) {
                offsets[delta.slice as usize] = cumulative;
                last_slice = Some(delta.slice);
            }
            if let ElementTiming::Cbe { size } = el.timing {
                cumulative += size;
            }
        }
        offsets
    }

    /// Locates the segment and entry containing `position` among
    /// not-yet-flushed segments and rewrites its `temporal_offset` in
    /// place (the C6-delay mechanism). Flushed segments are out of
    /// reach: the writer must not emit a VBE segment while any
    /// referenced B-frame's offset is still unresolved.
    pub fn update_index_entry(&mut self, position: i64, temporal_offset: i8) -> Result<()> {
        if self.is_cbe {
            // CBE entries carry no per-entry temporal offset field to
            // rewrite; a late-resolving essence parser reporting one
            // against a CBE stream has nothing to update.
            return Ok(());
        }
        for seg_idx in self.vbe.flushed_count..self.vbe.segments.len() {
            let seg = &mut self.vbe.segments[seg_idx];
            if position >= seg.index_start_position
                && position < seg.index_start_position + seg.index_duration
            {
                let entry_idx = (position - seg.index_start_position) as usize;
                seg.index_entries[entry_idx].temporal_offset = temporal_offset;
                self.vbe.unresolved.retain(|&(s, e)| !(s == seg_idx && e == entry_idx));
                return Ok(());
            }
        }
        Err(MxfError::index(format!(
            "update_index_entry: position {position} not found in any unflushed segment"
        )))
    }

    /// Whether the writer may open a new body partition at the edit
    /// unit just appended: always true for CBE, and for VBE only at the
    /// most recent entry's `can_start_partition` flag.
    pub fn can_start_partition(&self) -> bool {
        if self.is_cbe {
            return true;
        }
        self.vbe
            .open
            .and_then(|idx| self.vbe.segments[idx].index_entries.last())
            .map(|e| e.can_start_partition())
            .unwrap_or(false)
    }

    /// Drains segments safe to write now: for VBE, every segment except
    /// the currently open one, and only if it has no unresolved
    /// entries. Marks drained segments flushed (no longer updatable).
    pub fn drain_flushable(&mut self) -> Result<Vec<IndexTableSegment>> {
        if self.is_cbe {
            return Ok(Vec::new());
        }
        let open = self.vbe.open;
        let mut out = Vec::new();
        let start = self.vbe.flushed_count;
        let total = self.vbe.segments.len();
        let end = match total {
            0 => 0,
            n if open == Some(n - 1) => n - 1,
            n => n,
        };
        for idx in start..end {
            if self.vbe.unresolved.iter().any(|&(s, _)| s == idx) {
                return Err(MxfError::index(
                    "unresolved temporal-offset backlog at finalise",
                ));
            }
            out.push(self.vbe.segments[idx].clone());
            out[out.len() - 1].delta_entries = self.delta_entries.clone();
        }
        self.vbe.flushed_count = end;
        Ok(out)
    }

    /// Finalises the engine at writer close: for CBE, builds the (one
    /// or two, collapsed if identical) final segment(s); for VBE, drains
    /// every remaining segment including the still-open one.
    pub fn finalise(mut self) -> Result<Vec<IndexTableSegment>> {
        if self.is_cbe {
            let edit_rate = self.edit_rate;
            let body_sid = self.body_sid;
            let index_sid = self.index_sid;
            let delta_entries = self.delta_entries.clone();
            let mut make_uid = || Id16::new(*uuid::Uuid::new_v4().as_bytes());
            let mut segments = self.cbe.finalise(&mut make_uid, edit_rate, body_sid, index_sid);
            for seg in &mut segments {
                seg.delta_entries = delta_entries.clone();
            }
            Ok(segments)
        } else {
            if !self.vbe.unresolved.is_empty() {
                return Err(MxfError::index("unresolved temporal-offset backlog at finalise"));
            }
            for seg in &mut self.vbe.segments[self.vbe.flushed_count..] {
                seg.delta_entries = self.delta_entries.clone();
            }
            Ok(self.vbe.segments.split_off(self.vbe.flushed_count))
        }
    }
}

/// The absolute byte offset (and, for VBE, the decoded index entry) of
/// one edit unit, resolved by binary search over a stream's segments.
/// Supplements the distilled index engine with the read-side lookup
/// operation §2's data-flow paragraph implies but never names.
#[derive(Debug, Clone)]
pub struct EditUnitOffset {
    pub stream_offset: u64,
    pub entry: Option<IndexEntry>,
}

pub fn lookup(segments: &[IndexTableSegment], position: i64) -> Result<EditUnitOffset> {
    // Segments are appended in non-decreasing `index_start_position` order,
    // so the containing segment (if any) is found by bisecting on "does this
    // segment end at or before `position`" rather than scanning linearly.
    let idx = segments.partition_point(|seg| seg.index_start_position + seg.index_duration <= position);
    if let Some(seg) = segments.get(idx) {
        let end = seg.index_start_position + seg.index_duration;
        if position >= seg.index_start_position && position < end {
            if seg.is_cbe() {
                let n = (position - seg.index_start_position) as u64;
                return Ok(EditUnitOffset {
                    stream_offset: n * seg.edit_unit_byte_count as u64,
                    entry: None,
                });
            }
            let entry_idx = (position - seg.index_start_position) as usize;
            let entry = seg
                .index_entries
                .get(entry_idx)
                .ok_or_else(|| MxfError::index("index entry missing for in-range position"))?;
            return Ok(EditUnitOffset {
                stream_offset: entry.stream_offset,
                entry: Some(entry.clone()),
            });
        }
    }
    Err(MxfError::index(format!("position {position} not covered by any index segment")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cbe_stream_offset_matches_formula() {
        let mut engine = IndexEngine::new(1, 2, Rational { numerator: 25, denominator: 1 });
        engine.register_element(0, ElementTiming::Cbe { size: 288_000 });
        engine.prepare();
        for _ in 0..4 {
            engine
                .append_edit_unit(EditUnitInput {
                    sub_element_sizes: vec![288_000],
                    temporal_offset: None,
                    key_frame_offset: 0,
                    flags: 0,
                })
                .unwrap();
        }
        let segments = engine.finalise().unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].edit_unit_byte_count, 288_000);
        assert_eq!(segments[0].index_duration, 4);
        for n in 0..4u64 {
            let off = lookup(&segments, n as i64).unwrap();
            assert_eq!(off.stream_offset, n * 288_000);
        }
    }

    #[test]
    fn cbe_avci_header_collapses_into_two_segments() {
        let mut engine = IndexEngine::new(1, 2, Rational { numerator: 25, denominator: 1 });
        engine.register_element(0, ElementTiming::Cbe { size: 400_000 });
        engine.prepare();
        // AVCI: position 0 carries sequence/picture parameter sets, so
        // the first edit unit is larger than the steady-state size --
        // but `ElementTiming::Cbe` asserts a fixed size per element, so
        // the mismatch must be tolerated at the content-package level
        // instead; this is modelled by registering no fixed element size
        // and driving the CBE accumulator directly.
        let mut acc = CbeAccumulator::new();
        acc.append(420_000).unwrap();
        acc.append(400_000).unwrap();
        acc.append(400_000).unwrap();
        let mut uid = || Id16::new([9u8; 16]);
        let segs = acc.finalise(&mut uid, Rational { numerator: 25, denominator: 1 }, 1, 2);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].index_duration, 1);
        assert_eq!(segs[0].edit_unit_byte_count, 420_000);
        assert_eq!(segs[1].index_duration, 2);
        assert_eq!(segs[1].edit_unit_byte_count, 400_000);
    }

    #[test]
    fn cbe_uniform_stream_collapses_to_one_segment() {
        let mut acc = CbeAccumulator::new();
        for _ in 0..4 {
            acc.append(288_000).unwrap();
        }
        let mut uid = || Id16::new([1u8; 16]);
        let segs = acc.finalise(&mut uid, Rational { numerator: 25, denominator: 1 }, 1, 2);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].index_duration, 4);
    }

    #[test]
    fn scenario_s8_mismatched_cbe_sub_elements_errors() {
        let mut engine = IndexEngine::new(1, 2, Rational { numerator: 25, denominator: 1 });
        engine.register_element(0, ElementTiming::Cbe { size: 100 });
        engine.register_element(1, ElementTiming::Cbe { size: 200 });
        engine.prepare();
        engine
            .append_edit_unit(EditUnitInput {
                sub_element_sizes: vec![100, 200],
                temporal_offset: None,
                key_frame_offset: 0,
                flags: 0,
            })
            .unwrap();
        let err = engine
            .append_edit_unit(EditUnitInput {
                sub_element_sizes: vec![100, 250],
                temporal_offset: None,
                key_frame_offset: 0,
                flags: 0,
            })
            .unwrap_err();
        assert!(matches!(err, MxfError::Index(_)));
    }

    #[test]
    fn vbe_stream_offset_is_monotonic() {
        let mut engine = IndexEngine::new(1, 2, Rational { numerator: 25, denominator: 1 });
        engine.register_element(0, ElementTiming::Vbe { reordered: false });
        engine.prepare();
        let sizes = [10_000u32, 8_000, 9_500];
        let mut prev = None;
        for (i, &size) in sizes.iter().enumerate() {
            engine
                .append_edit_unit(EditUnitInput {
                    sub_element_sizes: vec![size],
                    temporal_offset: Some(0),
                    key_frame_offset: 0,
                    flags: if i == 0 { 0x80 } else { 0 },
                })
                .unwrap();
        }
        let segments = engine.finalise().unwrap();
        for seg in &segments {
            for e in &seg.index_entries {
                if let Some(p) = prev {
                    assert!(e.stream_offset >= p);
                }
                prev = Some(e.stream_offset);
            }
        }
    }

    #[test]
    fn lookup_resolves_positions_across_multiple_segments() {
        let mut acc = CbeAccumulator::new();
        acc.append(420_000).unwrap();
        acc.append(400_000).unwrap();
        acc.append(400_000).unwrap();
        let mut uid = || Id16::new([9u8; 16]);
        let segs = acc.finalise(&mut uid, Rational { numerator: 25, denominator: 1 }, 1, 2);
        assert_eq!(segs.len(), 2);

        assert_eq!(lookup(&segs, 0).unwrap().stream_offset, 0);
        assert_eq!(lookup(&segs, 1).unwrap().stream_offset, 0);
        assert_eq!(lookup(&segs, 2).unwrap().stream_offset, 400_000);
        assert!(lookup(&segs, 3).is_err());
    }

    #[test]
    fn drain_flushable_on_empty_vbe_engine_does_not_panic() {
        let mut engine = IndexEngine::new(1, 2, Rational { numerator: 25, denominator: 1 });
        engine.register_element(0, ElementTiming::Vbe { reordered: false });
        engine.prepare();
        assert!(engine.drain_flushable().unwrap().is_empty());
    }

    #[test]
    fn c6_delay_updates_unresolved_temporal_offset() {
        let mut engine = IndexEngine::new(1, 2, Rational { numerator: 25, denominator: 1 });
        engine.register_element(0, ElementTiming::Vbe { reordered: true });
        engine.prepare();
        engine
            .append_edit_unit(EditUnitInput {
                sub_element_sizes: vec![1000],
                temporal_offset: None,
                key_frame_offset: 0,
                flags: 0x80,
            })
            .unwrap();
        engine.update_index_entry(0, 2).unwrap();
        let segments = engine.finalise().unwrap();
        assert_eq!(segments[0].index_entries[0].temporal_offset, 2);
    }
}
