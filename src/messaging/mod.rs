// Module messaging - outbound event path from the scheduler to the host

pub mod channels;
pub mod event;

pub use channels::{EventConsumer, EventProducer, create_event_channel};
pub use event::EngineEvent;
