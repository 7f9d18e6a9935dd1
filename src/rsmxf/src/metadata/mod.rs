pub mod graph;
pub mod primer;
pub mod set;
pub mod value;

pub use graph::{primer_pack_key, Metadata, ReadFilter};
pub use primer::{Primer, TagAllocator};
pub use set::{Set, SetId};
pub use value::{ItemValue, ProductVersionRecord, Rational, Timestamp, VersionRecord};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::klv::Id16;
    use crate::model::baseline;

    #[test]
    fn write_then_read_roundtrips_a_preface() {
        let model = baseline().unwrap();
        let mut metadata = Metadata::new();
        let preface_class = model.find_set_def(&preface_ul()).unwrap().class_ul;
        let preface = metadata.new_set(preface_class);
        metadata.mark_preface(preface);
        metadata.set_item(
            preface,
            crate::model::instance_uid_item_ul(),
            ItemValue::Uuid(metadata.set(preface).instance_uid),
        );

        let mut buf = Vec::new();
        metadata.write(&mut buf, &model, 4).unwrap();

        let mut cursor = std::io::Cursor::new(buf.clone());
        let (read_back, _primer) = Metadata::read(&mut cursor, &model, buf.len() as u64, None).unwrap();
        assert_eq!(read_back.set(SetId(0)).class_ul, preface_class);
    }

    fn preface_ul() -> Id16 {
        // Matches the Preface UL registered by `baseline()`.
        Id16::new([
            0x06, 0x0e, 0x2b, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0d, 0x01, 0x01, 0x01, 0x00, 0x00,
            0x00, 0x2f,
        ])
    }

    fn ul(last: u8) -> Id16 {
        let mut bytes = [0x06u8; 16];
        bytes[15] = last;
        Id16::new(bytes)
    }

    /// An item required only on a registered parent class must still be
    /// enforced by `validate`, and resolved to its real type by `read`,
    /// rather than silently falling back to `ItemValue::Raw` because the
    /// child class's own item map never declared it.
    #[test]
    fn inherited_required_item_is_enforced_and_typed() {
        use crate::model::DataModel;

        let base = ul(1);
        let child = ul(2);
        let item_ul = ul(3);
        let mut model = DataModel::new();
        model.register_set_def("Base", base, None).unwrap();
        model.register_set_def("Child", child, Some(base)).unwrap();
        model
            .register_item_def("Flag", base, item_ul, 0x0101, crate::model::TypeId::Boolean, true)
            .unwrap();
        model
            .register_item_def(
                "InstanceUID",
                base,
                crate::model::instance_uid_item_ul(),
                crate::model::INSTANCE_UID_LOCAL_TAG,
                crate::model::TypeId::Uuid,
                true,
            )
            .unwrap();
        model.finalise().unwrap();

        let mut metadata = Metadata::new();
        let set_id = metadata.new_set(child);
        metadata.mark_preface(set_id);
        metadata.set_item(
            set_id,
            crate::model::instance_uid_item_ul(),
            ItemValue::Uuid(metadata.set(set_id).instance_uid),
        );

        // Missing the parent-declared required item fails validate().
        assert!(metadata.validate(&model).is_err());

        metadata.set_item(set_id, item_ul, ItemValue::Boolean(true));
        metadata.validate(&model).unwrap();

        let mut buf = Vec::new();
        metadata.write(&mut buf, &model, 4).unwrap();
        let mut cursor = std::io::Cursor::new(buf.clone());
        let (read_back, _primer) = Metadata::read(&mut cursor, &model, buf.len() as u64, None).unwrap();
        assert_eq!(read_back.get_item(set_id, &item_ul), Some(&ItemValue::Boolean(true)));
    }
}
