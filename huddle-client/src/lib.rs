mod callback;
mod engine;
mod error;
mod orchestrator;
mod roster;
mod session;
mod signaling;

pub use callback::*;
pub use engine::*;
pub use error::*;
pub use orchestrator::*;
pub use roster::*;
pub use session::*;
pub use signaling::*;
