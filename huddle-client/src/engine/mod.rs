mod engine_event;
mod peer_engine;
mod rtc;

pub use engine_event::*;
pub use peer_engine::*;
pub use rtc::*;
