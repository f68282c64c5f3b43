pub mod model;

pub use model::ParseError;
