pub mod coordinator;
pub mod events;

pub use coordinator::{HubCoordinator, RunOptions};
pub use events::{HudEvent, HudEventSink, HudPayload, StatusSnapshot};
