mod signaling_channel;
mod signaling_link;
mod websocket_channel;

pub use signaling_channel::*;
pub use signaling_link::*;
pub use websocket_channel::*;
