pub mod batch;
pub mod chapter;
pub mod cli;
pub mod config;
pub mod error;
pub mod logger;
pub mod pipeline;
pub mod tool;
pub mod utils;
pub mod workspace;

pub use batch::{Batch, partition};
pub use chapter::{Chapter, ChapterLayout, ChapterNumber, Series};
pub use cli::Args;
pub use config::{RunConfig, Settings};
pub use error::{EnumerationError, Error, Result};
pub use pipeline::{Pipeline, RunReport};
pub use tool::{Invocation, ProcessRunner, Tool, ToolOutput, ToolRunner};
pub use utils::format_elapsed;
pub use workspace::Workspace;
