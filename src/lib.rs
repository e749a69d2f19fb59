pub mod aggregate;
pub mod error;
pub mod fetch;
pub mod layout;
pub mod pipeline;
pub mod process;

pub use error::{PipelineError, Result};
