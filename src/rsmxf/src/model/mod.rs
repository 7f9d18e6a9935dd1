mod baseline;

pub use baseline::{baseline, instance_uid_item_ul, INSTANCE_UID_LOCAL_TAG};

use std::collections::HashMap;

use crate::error::{MxfError, Result};
use crate::klv::Id16;

/// The minimum set of wire type kinds a header-metadata item value can
/// carry. See the header-metadata engine's item-encoding operation for
/// the per-kind wire format.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeId {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Rational,
    VersionRecord,
    ProductVersionRecord,
    Timestamp,
    Boolean,
    Ul,
    Uuid,
    Umid,
    Utf16String,
    Utf8String,
    Iso7String,
    RawBytes,
    StrongRef,
    WeakRef,
    Array(Box<TypeId>),
    Batch(Box<TypeId>),
}

#[derive(Debug, Clone)]
pub struct ItemDefinition {
    pub name: String,
    pub item_ul: Id16,
    pub local_tag: u16,
    pub type_id: TypeId,
    pub required: bool,
}

#[derive(Debug, Clone)]
pub struct SetDefinition {
    pub name: String,
    pub class_ul: Id16,
    pub parent: Option<Id16>,
    pub items: HashMap<Id16, ItemDefinition>,
}

/// Registry of set classes and item definitions. Built once via
/// `register_set_def`/`register_item_def`, then `finalise`d before any
/// query is served.
#[derive(Default)]
pub struct DataModel {
    sets: HashMap<Id16, SetDefinition>,
    finalised: bool,
}

impl DataModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_set_def(
        &mut self,
        name: impl Into<String>,
        class_ul: Id16,
        parent_ul: Option<Id16>,
    ) -> Result<()> {
        if self.sets.contains_key(&class_ul) {
            return Err(MxfError::schema(format!(
                "duplicate set definition for class {:02x?}",
                class_ul.0
            )));
        }
        self.sets.insert(
            class_ul,
            SetDefinition {
                name: name.into(),
                class_ul,
                parent: parent_ul,
                items: HashMap::new(),
            },
        );
        Ok(())
    }

    pub fn register_item_def(
        &mut self,
        name: impl Into<String>,
        class_ul: Id16,
        item_ul: Id16,
        local_tag: u16,
        type_id: TypeId,
        required: bool,
    ) -> Result<()> {
        let set = self.sets.get_mut(&class_ul).ok_or_else(|| {
            MxfError::schema(format!("register_item_def: unknown class {:02x?}", class_ul.0))
        })?;
        if set.items.contains_key(&item_ul) {
            return Err(MxfError::schema(format!(
                "duplicate item definition for {:02x?}",
                item_ul.0
            )));
        }
        set.items.insert(
            item_ul,
            ItemDefinition {
                name: name.into(),
                item_ul,
                local_tag,
                type_id,
                required,
            },
        );
        Ok(())
    }

    /// Resolves parent pointers, rejecting any set whose declared parent
    /// was never registered.
    pub fn finalise(&mut self) -> Result<()> {
        for set in self.sets.values() {
            if let Some(parent) = set.parent {
                if !self.sets.contains_key(&parent) {
                    return Err(MxfError::schema(format!(
                        "set {} has unknown parent {:02x?}",
                        set.name, parent.0
                    )));
                }
            }
        }
        self.finalised = true;
        Ok(())
    }

    fn require_finalised(&self) -> Result<()> {
        if !self.finalised {
            return Err(MxfError::state("data model queried before finalise()"));
        }
        Ok(())
    }

    pub fn find_set_def(&self, class_ul: &Id16) -> Result<&SetDefinition> {
        self.require_finalised()?;
        self.sets
            .get(class_ul)
            .ok_or_else(|| MxfError::schema(format!("unknown set class {:02x?}", class_ul.0)))
    }

    /// Walks the parent chain looking for an item registered under the
    /// given local tag.
    pub fn find_item_def_by_tag(&self, class_ul: &Id16, local_tag: u16) -> Result<&ItemDefinition> {
        self.require_finalised()?;
        let mut current = Some(*class_ul);
        while let Some(ul) = current {
            let set = self
                .sets
                .get(&ul)
                .ok_or_else(|| MxfError::schema(format!("unknown set class {:02x?}", ul.0)))?;
            if let Some(item) = set.items.values().find(|i| i.local_tag == local_tag) {
                return Ok(item);
            }
            current = set.parent;
        }
        Err(MxfError::schema(format!(
            "no item registered under local tag {local_tag:#06x} for class {:02x?}",
            class_ul.0
        )))
    }

    /// Walks the parent chain looking for an item registered under the
    /// given item UL.
    pub fn find_item_def_by_ul(&self, class_ul: &Id16, item_ul: &Id16) -> Result<&ItemDefinition> {
        self.require_finalised()?;
        let mut current = Some(*class_ul);
        while let Some(ul) = current {
            let set = self
                .sets
                .get(&ul)
                .ok_or_else(|| MxfError::schema(format!("unknown set class {:02x?}", ul.0)))?;
            if let Some(item) = set.items.get(item_ul) {
                return Ok(item);
            }
            current = set.parent;
        }
        Err(MxfError::schema(format!(
            "item {:02x?} not registered for class {:02x?}",
            item_ul.0, class_ul.0
        )))
    }

    /// All item definitions in scope for `class_ul`, walking the parent
    /// chain so items declared only on an ancestor class are included.
    pub fn all_items_for(&self, class_ul: &Id16) -> Result<Vec<&ItemDefinition>> {
        self.require_finalised()?;
        let mut out = Vec::new();
        let mut current = Some(*class_ul);
        while let Some(ul) = current {
            let set = self
                .sets
                .get(&ul)
                .ok_or_else(|| MxfError::schema(format!("unknown set class {:02x?}", ul.0)))?;
            out.extend(set.items.values());
            current = set.parent;
        }
        Ok(out)
    }

    pub fn is_subclass_of(&self, class_ul: &Id16, ancestor_ul: &Id16) -> bool {
        let mut current = self.sets.get(class_ul);
        while let Some(set) = current {
            if &set.class_ul == ancestor_ul {
                return true;
            }
            current = set.parent.and_then(|p| self.sets.get(&p));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ul(last: u8) -> Id16 {
        let mut bytes = [0x06u8; 16];
        bytes[15] = last;
        Id16::new(bytes)
    }

    #[test]
    fn query_before_finalise_fails() {
        let model = DataModel::new();
        assert!(model.find_set_def(&ul(1)).is_err());
    }

    #[test]
    fn unknown_parent_rejected() {
        let mut model = DataModel::new();
        model.register_set_def("Child", ul(2), Some(ul(1))).unwrap();
        assert!(model.finalise().is_err());
    }

    #[test]
    fn subclass_walks_parent_chain() {
        let mut model = DataModel::new();
        model.register_set_def("Base", ul(1), None).unwrap();
        model.register_set_def("Mid", ul(2), Some(ul(1))).unwrap();
        model.register_set_def("Leaf", ul(3), Some(ul(2))).unwrap();
        model.finalise().unwrap();
        assert!(model.is_subclass_of(&ul(3), &ul(1)));
        assert!(!model.is_subclass_of(&ul(1), &ul(3)));
    }
}
