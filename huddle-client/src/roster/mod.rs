mod room_roster;

pub use room_roster::*;
