pub mod event_bus;
pub mod inbox;

pub use event_bus::*;
pub use inbox::*;
