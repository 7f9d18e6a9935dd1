use std::collections::HashMap;

use crate::klv::Id16;
use crate::metadata::value::ItemValue;

/// Index of a set within a `Metadata` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SetId(pub usize);

/// A single typed record in the header-metadata graph.
#[derive(Debug, Clone)]
pub struct Set {
    pub class_ul: Id16,
    pub instance_uid: Id16,
    pub items: HashMap<Id16, ItemValue>,
}

impl Set {
    pub fn new(class_ul: Id16, instance_uid: Id16) -> Self {
        Set {
            class_ul,
            instance_uid,
            items: HashMap::new(),
        }
    }
}
