use std::path::PathBuf;

use thiserror::Error;

use crate::chapter::ChapterNumber;
use crate::tool::Tool;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad arguments, bad settings or a missing tool. Raised before any side effect.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("workspace error at {}: {source}", path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: Tool,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {}{}", display_code(*code), display_stderr(stderr))]
    Subprocess {
        tool: Tool,
        code: Option<i32>,
        stderr: String,
    },

    #[error(transparent)]
    Enumeration(#[from] EnumerationError),
}

#[derive(Debug, Error)]
pub enum EnumerationError {
    #[error("no chapters found in {}", dir.display())]
    NoChapters { dir: PathBuf },

    #[error("expected one series directory in {}, found: {}", dir.display(), candidates.join(", "))]
    AmbiguousSeries {
        dir: PathBuf,
        candidates: Vec<String>,
    },

    #[error("cannot parse chapter number from {name:?}")]
    Unparseable { name: String },

    #[error("chapter {number} appears twice: {first:?} and {second:?}")]
    Duplicate {
        number: ChapterNumber,
        first: String,
        second: String,
    },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    pub fn workspace(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Workspace {
            path: path.into(),
            source,
        }
    }

    /// Name of the pipeline stage this error belongs to.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "configuration",
            Error::Workspace { .. } => "workspace",
            Error::Spawn { tool, .. } | Error::Subprocess { tool, .. } => match tool {
                Tool::Downloader => "download",
                Tool::Converter => "convert",
            },
            Error::Enumeration(_) => "enumerate",
        }
    }
}

fn display_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

fn display_stderr(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}
