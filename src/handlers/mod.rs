pub mod toggle;

pub use toggle::toggle_trigger;
