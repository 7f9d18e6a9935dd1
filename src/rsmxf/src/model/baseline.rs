use crate::klv::Id16;
use crate::model::{DataModel, TypeId};

fn ul(group5: u8, group6: u8, group13: u8) -> Id16 {
    // SMPTE-pattern UL: 06.0e.2b.34 prefix, category/registry octets fixed
    // for metadata-set/item ULs, varying only the octets that distinguish
    // one set or item from another. This is a closed, test-scoped
    // catalogue, not a registry dictionary.
    Id16::new([
        0x06, 0x0e, 0x2b, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0d, 0x01, group5, group6, 0x00, 0x00,
        0x00, group13,
    ])
}

fn item_ul(group13: u8, group14: u8, group15: u8) -> Id16 {
    Id16::new([
        0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x0a, 0x06, 0x01, 0x01, 0x00, group13, group14,
        group15, 0x00,
    ])
}

/// `InstanceUID` is required on every set; every baseline class carries it
/// under the same local tag, matching the universal-item convention.
pub const INSTANCE_UID_LOCAL_TAG: u16 = 0x3c0a;

pub fn instance_uid_item_ul() -> Id16 {
    item_ul(0x01, 0x01, 0x15)
}

/// Seeds a `DataModel` with the closed set of classes and items this
/// crate's own multiplexer and header-metadata tests exercise: Preface,
/// Identification, ContentStorage, a generic Package, Track, Sequence and
/// a generic essence descriptor. Not a full application-specific
/// dictionary (that remains an external collaborator's concern).
pub fn baseline() -> crate::error::Result<DataModel> {
    let mut m = DataModel::new();

    let preface = ul(0x01, 0x01, 0x2f);
    let identification = ul(0x01, 0x02, 0x30);
    let content_storage = ul(0x01, 0x03, 0x18);
    let package = ul(0x01, 0x04, 0x34);
    let track = ul(0x01, 0x05, 0x3b);
    let sequence = ul(0x01, 0x06, 0x0f);
    let descriptor = ul(0x01, 0x07, 0x24);

    m.register_set_def("Preface", preface, None)?;
    m.register_set_def("Identification", identification, None)?;
    m.register_set_def("ContentStorage", content_storage, None)?;
    m.register_set_def("Package", package, None)?;
    m.register_set_def("Track", track, None)?;
    m.register_set_def("Sequence", sequence, None)?;
    m.register_set_def("GenericDescriptor", descriptor, None)?;

    for class in [preface, identification, content_storage, package, track, sequence, descriptor] {
        m.register_item_def(
            "InstanceUID",
            class,
            instance_uid_item_ul(),
            INSTANCE_UID_LOCAL_TAG,
            TypeId::Uuid,
            true,
        )?;
    }

    m.register_item_def(
        "Identifications",
        preface,
        item_ul(0x01, 0x02, 0x01),
        0x3b06,
        TypeId::Array(Box::new(TypeId::StrongRef)),
        true,
    )?;
    m.register_item_def(
        "ContentStorageObject",
        preface,
        item_ul(0x01, 0x02, 0x02),
        0x3b03,
        TypeId::StrongRef,
        true,
    )?;
    m.register_item_def(
        "OperationalPattern",
        preface,
        item_ul(0x01, 0x02, 0x03),
        0x3b09,
        TypeId::Ul,
        true,
    )?;

    m.register_item_def(
        "CompanyName",
        identification,
        item_ul(0x02, 0x01, 0x01),
        0x3c01,
        TypeId::Utf16String,
        false,
    )?;
    m.register_item_def(
        "ProductName",
        identification,
        item_ul(0x02, 0x01, 0x02),
        0x3c02,
        TypeId::Utf16String,
        false,
    )?;
    m.register_item_def(
        "ProductVersion",
        identification,
        item_ul(0x02, 0x01, 0x03),
        0x3c03,
        TypeId::ProductVersionRecord,
        false,
    )?;
    m.register_item_def(
        "GenerationUID",
        identification,
        item_ul(0x02, 0x01, 0x04),
        0x3c09,
        TypeId::Uuid,
        true,
    )?;

    m.register_item_def(
        "Packages",
        content_storage,
        item_ul(0x03, 0x01, 0x01),
        0x1901,
        TypeId::Array(Box::new(TypeId::StrongRef)),
        true,
    )?;

    m.register_item_def(
        "PackageUID",
        package,
        item_ul(0x04, 0x01, 0x01),
        0x4401,
        TypeId::Umid,
        true,
    )?;
    m.register_item_def(
        "Tracks",
        package,
        item_ul(0x04, 0x01, 0x02),
        0x4403,
        TypeId::Array(Box::new(TypeId::StrongRef)),
        true,
    )?;
    m.register_item_def(
        "PackageDescriptor",
        package,
        item_ul(0x04, 0x01, 0x03),
        0x4701,
        TypeId::StrongRef,
        false,
    )?;

    m.register_item_def(
        "TrackID",
        track,
        item_ul(0x05, 0x01, 0x01),
        0x4801,
        TypeId::UInt32,
        true,
    )?;
    m.register_item_def(
        "EditRate",
        track,
        item_ul(0x05, 0x01, 0x02),
        0x4b01,
        TypeId::Rational,
        true,
    )?;
    m.register_item_def(
        "Sequence",
        track,
        item_ul(0x05, 0x01, 0x03),
        0x4803,
        TypeId::StrongRef,
        true,
    )?;

    m.register_item_def(
        "Duration",
        sequence,
        item_ul(0x06, 0x01, 0x01),
        0x0202,
        TypeId::Int64,
        true,
    )?;

    m.finalise()?;
    Ok(m)
}
