use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};

use crate::error::{MxfError, Result};
use crate::klv::{ber, Id16};
use crate::metadata::primer::{Primer, TagAllocator};
use crate::metadata::set::{Set, SetId};
use crate::metadata::value::ItemValue;
use crate::model::DataModel;

/// Callback deciding, before and after a set is read, whether it should
/// be retained. Skipped sets have their payload discarded.
pub type ReadFilter<'a> = dyn FnMut(&Id16) -> bool + 'a;

/// In-memory reference graph of typed sets: the header-metadata engine.
/// Sets live in an arena indexed by `SetId`; a side map resolves
/// InstanceUID to arena index in O(1) so strong/weak references never
/// need real pointers.
pub struct Metadata {
    arena: Vec<Set>,
    by_instance: HashMap<Id16, SetId>,
    preface: Option<SetId>,
}

impl Metadata {
    pub fn new() -> Self {
        Metadata {
            arena: Vec::new(),
            by_instance: HashMap::new(),
            preface: None,
        }
    }

    /// Creates a new set of `class_ul`, assigning it a fresh InstanceUID.
    pub fn new_set(&mut self, class_ul: Id16) -> SetId {
        let instance_uid = Id16::new(*uuid::Uuid::new_v4().as_bytes());
        self.insert_set(Set::new(class_ul, instance_uid))
    }

    fn insert_set(&mut self, set: Set) -> SetId {
        let id = SetId(self.arena.len());
        self.by_instance.insert(set.instance_uid, id);
        self.arena.push(set);
        id
    }

    pub fn mark_preface(&mut self, id: SetId) {
        self.preface = Some(id);
    }

    pub fn set(&self, id: SetId) -> &Set {
        &self.arena[id.0]
    }

    pub fn set_mut(&mut self, id: SetId) -> &mut Set {
        &mut self.arena[id.0]
    }

    pub fn set_item(&mut self, id: SetId, item_ul: Id16, value: ItemValue) {
        self.arena[id.0].items.insert(item_ul, value);
    }

    pub fn get_item(&self, id: SetId, item_ul: &Id16) -> Option<&ItemValue> {
        self.arena[id.0].items.get(item_ul)
    }

    /// Resolves a strong reference item to the set it points at.
    pub fn deref_strong(&self, owner: SetId, item_ul: &Id16) -> Result<SetId> {
        match self.get_item(owner, item_ul) {
            Some(ItemValue::StrongRef(target)) => self
                .by_instance
                .get(target)
                .copied()
                .ok_or_else(|| MxfError::graph(format!("dangling strong reference to {:02x?}", target.0))),
            _ => Err(MxfError::schema("item is not a strong reference")),
        }
    }

    /// Resolves a weak reference item, if it is not the null UUID.
    pub fn deref_weak(&self, owner: SetId, item_ul: &Id16) -> Result<Option<SetId>> {
        match self.get_item(owner, item_ul) {
            Some(ItemValue::WeakRef(target)) => {
                if target.0 == [0u8; 16] {
                    Ok(None)
                } else {
                    Ok(self.by_instance.get(target).copied())
                }
            }
            _ => Err(MxfError::schema("item is not a weak reference")),
        }
    }

    /// Positional variant of `deref_strong`: checks each `SetId` `hint`
    /// yields against the strong reference's target InstanceUID before
    /// falling back to the `by_instance` side-map lookup. A caller
    /// already walking sets in a known order (e.g. an array of strong
    /// references whose targets were written in that same order) can
    /// pass the remaining unvisited `SetId`s as `hint` and skip the
    /// hash lookup entirely when the order holds, which it usually does
    /// for metadata this crate itself wrote.
    pub fn deref_s(&self, owner: SetId, item_ul: &Id16, hint: impl Iterator<Item = SetId>) -> Result<SetId> {
        let target = match self.get_item(owner, item_ul) {
            Some(ItemValue::StrongRef(target)) => *target,
            _ => return Err(MxfError::schema("item is not a strong reference")),
        };
        for candidate in hint {
            if self.arena.get(candidate.0).is_some_and(|s| s.instance_uid == target) {
                return Ok(candidate);
            }
        }
        self.by_instance
            .get(&target)
            .copied()
            .ok_or_else(|| MxfError::graph(format!("dangling strong reference to {:02x?}", target.0)))
    }

    /// Deep-copies a set and recursively clones its strong references
    /// into `self`; weak references are preserved as InstanceUID values
    /// only (not retargeted).
    pub fn clone_set_into(&self, src: SetId, dst: &mut Metadata) -> SetId {
        let mut cloned = HashMap::new();
        self.clone_set_into_tracked(src, dst, &mut cloned)
    }

    /// `cloned` maps a source `SetId` to the `SetId` it was already cloned
    /// to in `dst`, so a strong-reference cycle or diamond reuses that
    /// clone instead of recursing forever or duplicating the target set.
    fn clone_set_into_tracked(&self, src: SetId, dst: &mut Metadata, cloned: &mut HashMap<usize, SetId>) -> SetId {
        if let Some(existing) = cloned.get(&src.0) {
            return *existing;
        }
        let source = self.set(src).clone();
        let new_id = dst.insert_set(Set::new(source.class_ul, source.instance_uid));
        cloned.insert(src.0, new_id);
        let mut items = HashMap::new();
        for (item_ul, value) in &source.items {
            let cloned_value = self.clone_item_value(value, dst, cloned);
            items.insert(*item_ul, cloned_value);
        }
        dst.set_mut(new_id).items = items;
        new_id
    }

    /// Retargets a `StrongRef` (top-level or nested inside an `Array`) to
    /// its clone in `dst`, recursing through `clone_set_into_tracked` the
    /// same way a top-level reference does.
    fn clone_item_value(&self, value: &ItemValue, dst: &mut Metadata, cloned: &mut HashMap<usize, SetId>) -> ItemValue {
        match value {
            ItemValue::StrongRef(target) => {
                if let Some(target_id) = self.by_instance.get(target) {
                    let cloned_target = self.clone_set_into_tracked(*target_id, dst, cloned);
                    ItemValue::StrongRef(dst.set(cloned_target).instance_uid)
                } else {
                    value.clone()
                }
            }
            ItemValue::Array(values) => {
                ItemValue::Array(values.iter().map(|v| self.clone_item_value(v, dst, cloned)).collect())
            }
            other => other.clone(),
        }
    }

    /// Validates that the graph has exactly one Preface, no dangling
    /// strong references, and no strong-reference cycles.
    pub fn validate(&self, model: &DataModel) -> Result<()> {
        if self.preface.is_none() {
            return Err(MxfError::graph("metadata has no Preface set"));
        }
        for set in &self.arena {
            for item_def in model.all_items_for(&set.class_ul)? {
                if item_def.required && !set.items.contains_key(&item_def.item_ul) {
                    return Err(MxfError::schema(format!(
                        "set {:02x?} missing required item {}",
                        set.class_ul.0, item_def.name
                    )));
                }
            }
            for value in set.items.values() {
                for target in strong_ref_targets(value) {
                    if !self.by_instance.contains_key(target) {
                        return Err(MxfError::graph(format!(
                            "dangling strong reference to {:02x?}",
                            target.0
                        )));
                    }
                }
            }
        }
        self.check_acyclic()
    }

    fn check_acyclic(&self) -> Result<()> {
        let mut visiting = HashSet::new();
        let mut visited = HashSet::new();
        for id in 0..self.arena.len() {
            self.visit(SetId(id), &mut visiting, &mut visited)?;
        }
        Ok(())
    }

    fn visit(&self, id: SetId, visiting: &mut HashSet<usize>, visited: &mut HashSet<usize>) -> Result<()> {
        if visited.contains(&id.0) {
            return Ok(());
        }
        if !visiting.insert(id.0) {
            return Err(MxfError::graph("cyclic strong reference"));
        }
        for value in self.arena[id.0].items.values() {
            for target in strong_ref_targets(value) {
                if let Some(target_id) = self.by_instance.get(target) {
                    self.visit(*target_id, visiting, visited)?;
                }
            }
        }
        visiting.remove(&id.0);
        visited.insert(id.0);
        Ok(())
    }

    /// Builds a primer by walking every non-default item across every
    /// set, assigning a fresh dynamic tag to any item UL without a
    /// statically registered tag below 0x8000.
    fn build_primer(&self, model: &DataModel) -> Result<Primer> {
        let mut primer = Primer::new();
        let mut allocator = TagAllocator::default();
        for set in &self.arena {
            let def = model.find_set_def(&set.class_ul)?;
            for item_ul in set.items.keys() {
                if primer.tag_for(item_ul).is_some() {
                    continue;
                }
                let static_tag = def
                    .items
                    .get(item_ul)
                    .map(|d| d.local_tag)
                    .filter(|tag| *tag < 0x8000);
                let tag = match static_tag {
                    Some(tag) => tag,
                    None => allocator.allocate()?,
                };
                primer.insert(tag, *item_ul);
            }
        }
        Ok(primer)
    }

    /// Returns the write order: Preface first, then a topological
    /// pre-order walk of its strong references.
    fn write_order(&self) -> Vec<SetId> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        if let Some(preface) = self.preface {
            self.walk_strong(preface, &mut order, &mut seen);
        }
        for id in 0..self.arena.len() {
            if !seen.contains(&id) {
                order.push(SetId(id));
                seen.insert(id);
            }
        }
        order
    }

    fn walk_strong(&self, id: SetId, order: &mut Vec<SetId>, seen: &mut HashSet<usize>) {
        if !seen.insert(id.0) {
            return;
        }
        order.push(id);
        let mut refs = Vec::new();
        let mut keys: Vec<&Id16> = self.arena[id.0].items.keys().collect();
        keys.sort_by_key(|k| k.0);
        for item_ul in keys {
            if let Some(ItemValue::StrongRef(target)) = self.arena[id.0].items.get(item_ul) {
                if let Some(target_id) = self.by_instance.get(target) {
                    refs.push(*target_id);
                }
            }
            if let Some(ItemValue::Array(values)) = self.arena[id.0].items.get(item_ul) {
                for v in values {
                    if let ItemValue::StrongRef(target) = v {
                        if let Some(target_id) = self.by_instance.get(target) {
                            refs.push(*target_id);
                        }
                    }
                }
            }
        }
        for target_id in refs {
            self.walk_strong(target_id, order, seen);
        }
    }

    /// Writes the primer pack followed by every set, each KLV-framed with
    /// its class UL as key and a `{(local_tag, item_len, bytes)*}`
    /// payload. Unknown/default items are never present since only
    /// explicitly-set items exist in the arena.
    pub fn write(&self, w: &mut impl Write, model: &DataModel, min_llen: u8) -> Result<()> {
        let primer = self.build_primer(model)?;
        crate::klv::write_klv(w, &primer_pack_key(), &{
            let mut buf = Vec::new();
            primer.write(&mut buf)?;
            buf
        }, min_llen)?;

        for id in self.write_order() {
            let set = &self.arena[id.0];
            let mut payload = Vec::new();
            let mut tags: Vec<(u16, &Id16)> = set
                .items
                .keys()
                .map(|ul| (primer.tag_for(ul).unwrap(), ul))
                .collect();
            tags.sort_by_key(|(tag, _)| *tag);
            for (tag, item_ul) in tags {
                let value = &set.items[item_ul];
                let bytes = value.encode()?;
                ber::write_u16(&mut payload, tag)?;
                ber::write_u16(&mut payload, bytes.len() as u16)?;
                payload.extend_from_slice(&bytes);
            }
            crate::klv::write_klv(w, &set.class_ul, &payload, min_llen)?;
        }
        Ok(())
    }

    /// Reads a primer pack followed by sets until `header_byte_count`
    /// bytes have been consumed from `r`. Unknown local tags are dropped
    /// with a warning; a set the filter rejects has its payload
    /// discarded but its bytes are still counted against the budget.
    pub fn read(
        r: &mut impl Read,
        model: &DataModel,
        header_byte_count: u64,
        mut filter: Option<&mut ReadFilter>,
    ) -> Result<(Metadata, Primer)> {
        let mut counted = std::io::Cursor::new(Vec::new());
        let mut limited = (&mut *r).take(header_byte_count);
        std::io::copy(&mut limited, &mut counted)?;
        let mut cursor = std::io::Cursor::new(counted.into_inner());

        let primer_klv = crate::klv::read_klv(&mut cursor)?;
        if !crate::klv::ids_eq(&primer_klv.key, &primer_pack_key()) {
            return Err(MxfError::format("expected primer pack as first header-metadata KLV"));
        }
        let primer = Primer::read(&mut std::io::Cursor::new(primer_klv.value))?;

        let mut metadata = Metadata::new();
        while (cursor.position() as usize) < cursor.get_ref().len() {
            let klv = crate::klv::read_klv(&mut cursor)?;
            let keep = filter.as_mut().map(|f| f(&klv.key)).unwrap_or(true);
            if !keep {
                continue;
            }
            let set_def_known = model.find_set_def(&klv.key).is_ok();
            if !set_def_known {
                log::warn!("skipping unknown set class {:02x?}", klv.key.0);
                continue;
            }
            let def = model.find_set_def(&klv.key)?;
            let mut payload = std::io::Cursor::new(klv.value);
            let mut instance_uid = None;
            let mut items = Vec::new();
            while (payload.position() as usize) < payload.get_ref().len() {
                let tag = ber::read_u16(&mut payload)?;
                let len = ber::read_u16(&mut payload)? as usize;
                let mut bytes = vec![0u8; len];
                payload.read_exact(&mut bytes)?;
                let Some(item_ul) = primer.ul_for(tag) else {
                    log::warn!("dropping item with unknown local tag {tag:#06x}");
                    continue;
                };
                let item_def = model.find_item_def_by_ul(&klv.key, &item_ul).ok();
                let type_id = item_def.map(|d| d.type_id.clone());
                let value = match type_id {
                    Some(t) => ItemValue::decode(&t, &bytes).unwrap_or(ItemValue::Raw(bytes)),
                    None => ItemValue::Raw(bytes),
                };
                if item_ul == crate::model::instance_uid_item_ul() {
                    if let ItemValue::Uuid(id) = &value {
                        instance_uid = Some(*id);
                    }
                }
                items.push((item_ul, value));
            }
            let instance_uid = instance_uid
                .ok_or_else(|| MxfError::schema("set is missing required InstanceUID item"))?;
            let mut set = Set::new(klv.key, instance_uid);
            for (ul, value) in items {
                set.items.insert(ul, value);
            }
            let is_preface = def.name == "Preface";
            let id = metadata.insert_set(set);
            if is_preface {
                metadata.mark_preface(id);
            }
        }

        Ok((metadata, primer))
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Every `StrongRef` target reachable from `value`, including ones nested
/// inside an `Array`/`Batch` element -- a strong reference there is exactly
/// as live an edge as a top-level one (see `write_order`'s `walk_strong`,
/// which already walks arrays for the same reason).
fn strong_ref_targets(value: &ItemValue) -> Vec<&Id16> {
    match value {
        ItemValue::StrongRef(target) => vec![target],
        ItemValue::Array(values) => values.iter().flat_map(strong_ref_targets).collect(),
        _ => Vec::new(),
    }
}

/// SMPTE Primer Pack key.
pub fn primer_pack_key() -> Id16 {
    Id16::new([
        0x06, 0x0e, 0x2b, 0x34, 0x02, 0x05, 0x01, 0x01, 0x0d, 0x01, 0x02, 0x01, 0x01, 0x05, 0x01,
        0x00,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ul(last: u8) -> Id16 {
        let mut bytes = [0x07u8; 16];
        bytes[15] = last;
        Id16::new(bytes)
    }

    #[test]
    fn dangling_strong_ref_inside_array_is_caught() {
        let mut metadata = Metadata::new();
        let set_id = metadata.new_set(ul(1));
        metadata.mark_preface(set_id);
        let missing_target = ul(99);
        metadata.set_item(set_id, ul(2), ItemValue::Array(vec![ItemValue::StrongRef(missing_target)]));

        let model = crate::model::baseline().unwrap();
        let err = metadata.validate(&model).unwrap_err();
        assert!(matches!(err, MxfError::Graph(_)));
    }

    #[test]
    fn deref_s_resolves_via_hint_and_falls_back_without_one() {
        let mut metadata = Metadata::new();
        let owner = metadata.new_set(ul(1));
        let target = metadata.new_set(ul(2));
        let target_uid = metadata.set(target).instance_uid;
        metadata.set_item(owner, ul(3), ItemValue::StrongRef(target_uid));

        // A hint that actually contains the target resolves without
        // touching the side-map.
        let resolved = metadata.deref_s(owner, &ul(3), [target].into_iter()).unwrap();
        assert_eq!(resolved, target);

        // An empty (or non-matching) hint still resolves correctly via
        // the `by_instance` fallback.
        let resolved = metadata.deref_s(owner, &ul(3), std::iter::empty()).unwrap();
        assert_eq!(resolved, target);
    }

    #[test]
    fn deref_s_ignores_out_of_range_hint_instead_of_panicking() {
        let mut metadata = Metadata::new();
        let owner = metadata.new_set(ul(1));
        let target = metadata.new_set(ul(2));
        let target_uid = metadata.set(target).instance_uid;
        metadata.set_item(owner, ul(3), ItemValue::StrongRef(target_uid));

        // A hint containing a SetId past the end of the arena (as any
        // caller holding a raw `SetId(usize)` could construct) must not
        // panic; it should simply fail to match and fall through to the
        // side-map lookup.
        let out_of_range = SetId(metadata.arena.len() + 5);
        let resolved = metadata.deref_s(owner, &ul(3), [out_of_range].into_iter()).unwrap();
        assert_eq!(resolved, target);
    }

    #[test]
    fn deref_s_reports_dangling_reference() {
        let mut metadata = Metadata::new();
        let owner = metadata.new_set(ul(1));
        metadata.set_item(owner, ul(3), ItemValue::StrongRef(ul(99)));
        let err = metadata.deref_s(owner, &ul(3), std::iter::empty()).unwrap_err();
        assert!(matches!(err, MxfError::Graph(_)));
    }

    #[test]
    fn clone_set_into_retargets_strong_ref_nested_in_array() {
        let mut src = Metadata::new();
        let parent = src.new_set(ul(1));
        let child = src.new_set(ul(2));
        let child_instance_uid = src.set(child).instance_uid;
        src.set_item(parent, ul(3), ItemValue::Array(vec![ItemValue::StrongRef(child_instance_uid)]));

        let mut dst = Metadata::new();
        let cloned_parent = src.clone_set_into(parent, &mut dst);
        match dst.get_item(cloned_parent, &ul(3)) {
            Some(ItemValue::Array(values)) => {
                let ItemValue::StrongRef(target) = &values[0] else {
                    panic!("expected a StrongRef element");
                };
                // InstanceUIDs are preserved across the clone (it's a deep
                // copy, not a re-identified graph), so the retargeted
                // reference still resolves inside `dst`.
                assert_eq!(*target, child_instance_uid);
                assert!(dst.by_instance.contains_key(target));
            }
            other => panic!("expected an Array item, got {other:?}"),
        }
    }

    #[test]
    fn clone_set_into_does_not_recurse_forever_on_a_cycle() {
        let mut src = Metadata::new();
        let a = src.new_set(ul(1));
        let b = src.new_set(ul(2));
        let a_uid = src.set(a).instance_uid;
        let b_uid = src.set(b).instance_uid;
        src.set_item(a, ul(3), ItemValue::StrongRef(b_uid));
        src.set_item(b, ul(3), ItemValue::StrongRef(a_uid));

        let mut dst = Metadata::new();
        src.clone_set_into(a, &mut dst);
        assert_eq!(dst.arena.len(), 2);
    }
}
