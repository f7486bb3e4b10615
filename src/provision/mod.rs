// Declarative provisioning: resource shapes and the composed stack
pub mod resources;
pub mod stack;

pub use resources::{Bucket, BucketObject, Disk, Function, IamMember, ImageLookup};
pub use stack::{PanelStack, ResourceSummary, StackParams};
