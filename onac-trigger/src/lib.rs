pub mod port;

pub use port::{list_ports, NullTrigger, RecordingTrigger, SerialTrigger, TriggerPort};
