// Atomic API modules
pub mod client;
pub mod compute;
pub mod dns;

// Re-export commonly used items
pub use client::{set_silent, GcpClient};
pub use compute::{
    delete_instance, get_instance, insert_instance, wait_for_operation, Instance, InstanceLookup,
    Operation, OperationKind,
};
pub use dns::{plan_record_replacement, replace_a_record, Change, ResourceRecordSet};
