mod negotiation_state;
mod session_handler;

pub use negotiation_state::*;
pub use session_handler::*;
