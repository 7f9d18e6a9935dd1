pub mod pool;
pub mod sequence;
pub mod system_item;

pub use pool::{ContentPackage, ContentPackagePool};
pub use sequence::SequenceTracker;
pub use system_item::{package_metadata_set_key, system_item_key, SystemMetadataPack, SYSTEM_METADATA_PACK_LEN};

use crate::error::{MxfError, Result};
use crate::klv::kag::FillKeyVariant;
use crate::klv::Id16;

/// The fixed output order the multiplexer sorts registered elements into
/// on `prepare_write`, per §4.7: system item first, then picture, sound,
/// data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ElementKind {
    System,
    Picture,
    Sound,
    Data,
}

/// How a registered element's payload size behaves across edit units.
enum ElementSizing {
    /// Picture elements and data elements declared with a constant
    /// length: every write must be exactly this many bytes.
    Fixed(u32),
    /// Data elements declared with a maximum length: writes may be
    /// shorter, padded out with a trailing KLV-Fill to the slot size.
    UpToMax(u32),
    /// Sound elements: `sample_size` bytes per sample, sample count per
    /// edit unit following a `SequenceTracker`-resolved phase.
    Sound { sample_size: u32, sequence: SequenceTracker },
}

struct RegisteredElement {
    /// The handle returned to the caller at registration time, stable
    /// across `prepare_write`'s canonical-order sort. `write_samples` and
    /// friends take this handle, not a position in `elements`.
    handle: usize,
    track_index: usize,
    kind: ElementKind,
    key: Id16,
    sizing: ElementSizing,
}

/// The content-package multiplexer (C7): accumulates per-track sample
/// writes into KAG-aligned content packages and emits them FIFO in the
/// canonical system/picture/sound/data order.
pub struct Multiplexer {
    elements: Vec<RegisteredElement>,
    /// `handle -> elements` index, populated by `prepare_write` once the
    /// canonical-order sort has settled. Registration returns a handle,
    /// not a raw `elements` position, precisely because that sort moves
    /// elements around; this is the translation table callers' later
    /// `write_samples(handle, ..)` calls go through.
    index_by_handle: Vec<usize>,
    next_handle: usize,
    pool: ContentPackagePool,
    position: i64,
    current: Option<ContentPackage>,
    ready: std::collections::VecDeque<ContentPackage>,
    prepared: bool,
    min_llen: u8,
    kag: u32,
    fill_variant: FillKeyVariant,
}

impl Multiplexer {
    pub fn new(kag: u32, min_llen: u8, fill_variant: FillKeyVariant) -> Self {
        Multiplexer {
            elements: Vec::new(),
            index_by_handle: Vec::new(),
            next_handle: 0,
            pool: ContentPackagePool::new(),
            position: 0,
            current: None,
            ready: std::collections::VecDeque::new(),
            prepared: false,
            min_llen,
            kag,
            fill_variant,
        }
    }

    fn require_unprepared(&self) -> Result<()> {
        if self.prepared {
            return Err(MxfError::state("cannot register elements after prepare_write"));
        }
        Ok(())
    }

    fn next_handle(&mut self) -> usize {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    pub fn register_picture(&mut self, track_index: usize, element_key: Id16, frame_size: u32) -> Result<usize> {
        self.require_unprepared()?;
        let handle = self.next_handle();
        self.elements.push(RegisteredElement {
            handle,
            track_index,
            kind: ElementKind::Picture,
            key: element_key,
            sizing: ElementSizing::Fixed(frame_size),
        });
        Ok(handle)
    }

    pub fn register_sound(
        &mut self,
        track_index: usize,
        element_key: Id16,
        sample_sequence: Vec<u32>,
        sample_size: u32,
    ) -> Result<usize> {
        self.require_unprepared()?;
        let handle = self.next_handle();
        self.elements.push(RegisteredElement {
            handle,
            track_index,
            kind: ElementKind::Sound,
            key: element_key,
            sizing: ElementSizing::Sound {
                sample_size,
                sequence: SequenceTracker::new(sample_sequence),
            },
        });
        Ok(handle)
    }

    pub fn register_data(&mut self, track_index: usize, element_key: Id16, constant_len_or_max_len: u32, is_max: bool) -> Result<usize> {
        self.require_unprepared()?;
        let sizing = if is_max {
            ElementSizing::UpToMax(constant_len_or_max_len)
        } else {
            ElementSizing::Fixed(constant_len_or_max_len)
        };
        let handle = self.next_handle();
        self.elements.push(RegisteredElement {
            handle,
            track_index,
            kind: ElementKind::Data,
            key: element_key,
            sizing,
        });
        Ok(handle)
    }

    /// Reserves a slot for the system item: a fixed-size element carrying
    /// whatever `SystemMetadataPack` the caller encodes (via
    /// `SystemMetadataPack::encode`) and writes through `write_samples`
    /// once per edit unit, since its continuity count and user timecode
    /// advance on every content package rather than staying constant.
    pub fn register_system_item(&mut self, element_key: Id16) -> Result<usize> {
        self.require_unprepared()?;
        let handle = self.next_handle();
        self.elements.push(RegisteredElement {
            handle,
            track_index: usize::MAX,
            kind: ElementKind::System,
            key: element_key,
            sizing: ElementSizing::Fixed(SystemMetadataPack::encoded_len(self.min_llen) as u32),
        });
        Ok(handle)
    }

    /// Stably sorts registered elements to the canonical system/picture/
    /// sound/data order, rebuilds the handle-to-position table so
    /// already-issued handles keep resolving to the right element, and
    /// starts accepting sample writes.
    pub fn prepare_write(&mut self) {
        self.elements.sort_by_key(|e| e.kind);
        self.index_by_handle = vec![usize::MAX; self.next_handle];
        for (i, element) in self.elements.iter().enumerate() {
            self.index_by_handle[element.handle] = i;
        }
        self.prepared = true;
    }

    fn ensure_current(&mut self) -> &mut ContentPackage {
        if self.current.is_none() {
            let cp = self.pool.acquire(self.position, self.elements.len());
            self.current = Some(cp);
        }
        self.current.as_mut().unwrap()
    }

    /// Routes `bytes` into the current incomplete package's slot for the
    /// element registered as `handle`. For sound, `sample_count` is
    /// checked against the registered sequence's (possibly
    /// still-unresolved) phase.
    pub fn write_samples(&mut self, handle: usize, bytes: Vec<u8>, sample_count: u32) -> Result<()> {
        if !self.prepared {
            return Err(MxfError::state("write_samples before prepare_write"));
        }
        let position = self.position;
        let element_index = *self
            .index_by_handle
            .get(handle)
            .filter(|&&i| i != usize::MAX)
            .ok_or_else(|| MxfError::state("write_samples: unknown element handle"))?;
        let element = &mut self.elements[element_index];
        match &mut element.sizing {
            ElementSizing::Fixed(expected) => {
                if bytes.len() as u32 != *expected {
                    return Err(MxfError::state(format!(
                        "element {element_index}: expected {expected} bytes, got {}",
                        bytes.len()
                    )));
                }
            }
            ElementSizing::UpToMax(max) => {
                if bytes.len() as u32 > *max {
                    return Err(MxfError::state(format!(
                        "element {element_index}: {} bytes exceeds max {max}",
                        bytes.len()
                    )));
                }
            }
            ElementSizing::Sound { sample_size, sequence } => {
                sequence.observe(position, sample_count)?;
                let expected_bytes = *sample_size * sample_count;
                if bytes.len() as u32 != expected_bytes {
                    return Err(MxfError::state(format!(
                        "sound element {element_index}: expected {expected_bytes} bytes for {sample_count} samples, got {}",
                        bytes.len()
                    )));
                }
            }
        }

        self.ensure_current().elements[element_index] = Some(bytes);
        self.try_complete_current()
    }

    fn try_complete_current(&mut self) -> Result<()> {
        let is_complete = self.current.as_ref().map(ContentPackage::is_complete).unwrap_or(false);
        if is_complete {
            let cp = self.current.take().unwrap();
            self.ready.push_back(cp);
            self.position += 1;
        }
        Ok(())
    }

    /// Commits the best-match sample-sequence phase for every registered
    /// sound element and closes out a still-incomplete current package
    /// for elements that never received a final write (only valid if
    /// every required element did in fact complete; otherwise the
    /// package is simply abandoned, matching "callers close and discard
    /// partially-written files explicitly").
    pub fn flush(&mut self) -> Result<()> {
        for element in &mut self.elements {
            if let ElementSizing::Sound { sequence, .. } = &mut element.sizing {
                sequence.commit_best_match()?;
            }
        }
        Ok(())
    }

    pub fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    fn emit_one(&self, w: &mut impl std::io::Write, cp: &ContentPackage) -> Result<u64> {
        let mut written = 0u64;
        for (element, payload) in self.elements.iter().zip(cp.elements.iter()) {
            let Some(bytes) = payload else {
                continue;
            };
            let mut framed = Vec::new();
            crate::klv::write_klv(&mut framed, &element.key, bytes, self.min_llen)?;
            if let ElementSizing::UpToMax(max) = &element.sizing {
                let shortfall = *max as u64 - bytes.len() as u64;
                if shortfall > 0 {
                    crate::klv::kag::write_fill(&mut framed, shortfall, self.min_llen, self.fill_variant)?;
                }
            }
            w.write_all(&framed)?;
            written += framed.len() as u64;
        }
        Ok(written)
    }

    /// Emits the next ready content package: each element framed as
    /// `(key, BER-length, payload)`, followed by a KLV-Fill when the
    /// payload is shorter than the element's fixed KAG-aligned slot.
    pub fn emit_next(&mut self, w: &mut impl std::io::Write) -> Result<Option<u64>> {
        let Some(cp) = self.ready.pop_front() else {
            return Ok(None);
        };
        let written = self.emit_one(w, &cp)?;
        self.pool.release(cp);
        Ok(Some(written))
    }

    /// Drains every ready content package in FIFO order, invoking
    /// `on_package` immediately before each one's bytes are written (so a
    /// caller can feed the index engine in emission order before the
    /// bytes themselves hit the file).
    pub fn drain_ready(
        &mut self,
        w: &mut impl std::io::Write,
        mut on_package: impl FnMut(&ContentPackage) -> Result<()>,
    ) -> Result<u64> {
        let mut written = 0u64;
        while let Some(cp) = self.ready.pop_front() {
            on_package(&cp)?;
            written += self.emit_one(w, &cp)?;
            self.pool.release(cp);
        }
        Ok(written)
    }

    pub fn kag(&self) -> u32 {
        self.kag
    }

    /// The edit-unit position the current (possibly still-incomplete)
    /// content package will occupy once it completes. Lets a caller
    /// attach per-edit-unit frame metadata (flags, offsets) before the
    /// package is known to be ready.
    pub fn current_position(&self) -> i64 {
        self.position
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Per-element sizing snapshot for this edit unit, for the index
    /// engine: sub-element sizes in emission order.
    pub fn sub_element_sizes(cp: &ContentPackage) -> Vec<u32> {
        cp.elements
            .iter()
            .map(|e| e.as_ref().map(|b| b.len() as u32).unwrap_or(0))
            .collect()
    }

    /// One element's index-engine timing, derived from its sizing. Only
    /// meaningful after `prepare_write` has fixed the final element order.
    fn element_timing(element: &RegisteredElement) -> crate::index::engine::ElementTiming {
        use crate::index::engine::ElementTiming;
        match &element.sizing {
            ElementSizing::Fixed(size) => ElementTiming::Cbe { size: *size },
            ElementSizing::UpToMax(_) => ElementTiming::Vbe { reordered: false },
            ElementSizing::Sound { sample_size, sequence } => {
                if sequence.is_trivial() {
                    let count = sequence.expected_at(0).unwrap_or(0);
                    ElementTiming::Cbe { size: sample_size * count }
                } else {
                    ElementTiming::Vbe { reordered: false }
                }
            }
        }
    }

    /// `(track_index, timing)` for every registered element, in the final
    /// post-sort emission order. Callers must invoke this after
    /// `prepare_write` and feed it to the index engine's
    /// `register_element` in the same order, so delta-entry slice
    /// assignment matches the bytes the multiplexer actually emits.
    pub fn element_registrations(&self) -> Vec<(usize, crate::index::engine::ElementTiming)> {
        self.elements
            .iter()
            .map(|e| (e.track_index, Self::element_timing(e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::klv::Id16;

    fn key(n: u8) -> Id16 {
        Id16::new([n; 16])
    }

    #[test]
    fn scenario_s6_sound_sequence_phase_inferred_from_zero() {
        let mut mux = Multiplexer::new(0x200, 4, FillKeyVariant::Compliant);
        let picture = mux.register_picture(0, key(1), 4).unwrap();
        let sound = mux
            .register_sound(1, key(2), vec![1602, 1601, 1602, 1601, 1602], 4)
            .unwrap();
        mux.prepare_write();

        let counts = [1602u32, 1601, 1602, 1601, 1602];
        for &c in &counts {
            mux.write_samples(picture, vec![0u8; 4], 1).unwrap();
            mux.write_samples(sound, vec![0u8; 4 * c as usize], c).unwrap();
        }
        assert_eq!(mux.ready.len(), 5);
    }

    #[test]
    fn fixed_element_rejects_wrong_length() {
        let mut mux = Multiplexer::new(0x200, 4, FillKeyVariant::Compliant);
        let picture = mux.register_picture(0, key(1), 4).unwrap();
        mux.prepare_write();
        assert!(mux.write_samples(picture, vec![0u8; 3], 1).is_err());
    }

    /// Registering sound before picture (out of the canonical
    /// system/picture/sound/data order) must not scramble which
    /// `write_samples` handle reaches which element once `prepare_write`
    /// sorts `elements` into canonical order underneath the returned
    /// handles.
    #[test]
    fn write_samples_routes_correctly_when_registered_out_of_canonical_order() {
        let mut mux = Multiplexer::new(0x200, 1, FillKeyVariant::Compliant);
        let sound = mux.register_sound(1, key(2), vec![1602], 4).unwrap();
        let picture = mux.register_picture(0, key(1), 8).unwrap();
        mux.prepare_write();

        mux.write_samples(sound, vec![0xAAu8; 4 * 1602], 1602).unwrap();
        mux.write_samples(picture, vec![0xBBu8; 8], 1).unwrap();

        let mut buf = Vec::new();
        mux.emit_next(&mut buf).unwrap().unwrap();
        // Canonical order is picture before sound, so the picture's key
        // (short-form BER length 8, then its payload) must appear first
        // in the emitted bytes.
        assert_eq!(&buf[..16], &key(1).0);
        assert_eq!(buf[16], 0x08);
        assert_eq!(&buf[17..25], &[0xBBu8; 8]);
    }

    #[test]
    fn content_package_emits_all_elements() {
        let mut mux = Multiplexer::new(0x100, 1, FillKeyVariant::Compliant);
        let picture = mux.register_picture(0, key(5), 8).unwrap();
        mux.prepare_write();
        mux.write_samples(picture, vec![0xAAu8; 8], 1).unwrap();
        let mut buf = Vec::new();
        let written = mux.emit_next(&mut buf).unwrap().unwrap();
        assert_eq!(written, buf.len() as u64);
        assert_eq!(&buf[..16], &key(5).0);
    }
}
