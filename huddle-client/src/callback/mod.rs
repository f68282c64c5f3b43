mod callback_dispatcher;

pub use callback_dispatcher::*;
