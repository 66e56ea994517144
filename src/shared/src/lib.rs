pub mod error;
pub mod text_processing;
pub mod types;

pub use error::{Error, Result};
