use std::num::{NonZeroU32, NonZeroUsize};
use std::path::PathBuf;

use clap::Parser;

use crate::chapter::ChapterNumber;

pub const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(20).unwrap();
pub const DEFAULT_CUSTOM_WIDTH: NonZeroU32 = NonZeroU32::new(1264).unwrap();
pub const DEFAULT_CUSTOM_HEIGHT: NonZeroU32 = NonZeroU32::new(1680).unwrap();

/// Download manga chapters, batch them, and convert each batch to EPUB.
///
/// Chapters are fetched with gallery-dl, grouped into fixed-size batches and
/// handed to KCC (Kindle Comic Converter), producing one EPUB per batch.
#[derive(Parser, Debug, Clone)]
#[command(name = "manga-pipeline")]
#[command(author, version, about)]
pub struct Args {
    /// URL of the manga series (e.g. https://weebcentral.com/series/...)
    #[arg(short = 'u', long)]
    pub manga_url: String,

    /// Path to the KCC (Kindle Comic Converter) executable
    #[arg(short = 'k', long = "kcc")]
    pub kcc: PathBuf,

    /// Run KCC through Wine
    #[arg(long)]
    pub wine: bool,

    /// Number of chapters per EPUB
    #[arg(short = 'b', long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: NonZeroUsize,

    /// Minimum chapter number to download (inclusive)
    #[arg(short = 'm', long)]
    pub min_chapter: Option<ChapterNumber>,

    /// Maximum chapter number to download (inclusive)
    #[arg(short = 'x', long)]
    pub max_chapter: Option<ChapterNumber>,

    /// Output page width in pixels
    #[arg(short = 'w', long, default_value_t = DEFAULT_CUSTOM_WIDTH)]
    pub custom_width: NonZeroU32,

    /// Output page height in pixels
    #[arg(short = 'e', long, default_value_t = DEFAULT_CUSTOM_HEIGHT)]
    pub custom_height: NonZeroU32,

    /// Settings file (defaults to ./manga-pipeline.toml when present)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Keep the download directory after a successful run
    #[arg(long)]
    pub keep_downloads: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// 日志级别：quiet 优先，其次 verbose，默认 info
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}
