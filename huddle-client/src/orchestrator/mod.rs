mod event_loop;
mod orchestrator_state;
mod protocol;
mod signaling_orchestrator;

pub use signaling_orchestrator::*;
