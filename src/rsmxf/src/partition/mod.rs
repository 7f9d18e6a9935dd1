pub mod list;
pub mod pack;
pub mod rip;

pub use list::PartitionList;
pub use pack::{
    classify_partition_key, is_partition_pack_key, partition_pack_key, Partition, PartitionRole,
    PartitionStatus, CLOSED_COMPLETE, CLOSED_INCOMPLETE, OPEN_COMPLETE, OPEN_INCOMPLETE,
};
pub use rip::{rip_key, Rip, RipEntry};
