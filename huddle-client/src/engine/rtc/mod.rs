mod data_channel_configuration;
mod data_channel_hub;
mod session_worker;
mod webrtc_engine;

pub use data_channel_configuration::*;
pub use data_channel_hub::*;
pub use webrtc_engine::*;
