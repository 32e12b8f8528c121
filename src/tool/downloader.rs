use std::path::PathBuf;

use tracing::{info, instrument};

use super::{Invocation, Stdout, Tool, ToolRunner};
use crate::chapter::ChapterNumber;
use crate::config::RunConfig;
use crate::error::Result;

/// gallery-dl 适配器：一次调用下载整个章节范围
#[derive(Debug, Clone)]
pub struct Downloader {
    program: PathBuf,
    download_dir: PathBuf,
    url: String,
    range: Option<String>,
}

impl Downloader {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            program: config.downloader.clone(),
            download_dir: config.download_dir.clone(),
            url: config.url.to_string(),
            range: chapter_range(config.min_chapter.as_ref(), config.max_chapter.as_ref()),
        }
    }

    pub fn invocation(&self) -> Invocation {
        let mut invocation = Invocation::new(Tool::Downloader, &self.program)
            .arg("-d")
            .arg(&self.download_dir)
            .stdout(Stdout::Inherit);
        if let Some(range) = &self.range {
            invocation = invocation.arg("--chapter-range").arg(range);
        }
        invocation.arg(&self.url)
    }

    #[instrument(skip_all)]
    pub async fn download<R: ToolRunner>(&self, runner: &R) -> Result<()> {
        match &self.range {
            Some(range) => info!("开始下载 {}，章节范围 {}", self.url, range),
            None => info!("开始下载 {}，全部章节", self.url),
        }
        runner.run(&self.invocation()).await?.check(Tool::Downloader)?;
        info!("下载完成");
        Ok(())
    }
}

/// `min-max`、`min-` 或 `-max`；两端都未设置时不加过滤
pub fn chapter_range(min: Option<&ChapterNumber>, max: Option<&ChapterNumber>) -> Option<String> {
    match (min, max) {
        (Some(min), Some(max)) => Some(format!("{min}-{max}")),
        (Some(min), None) => Some(format!("{min}-")),
        (None, Some(max)) => Some(format!("-{max}")),
        (None, None) => None,
    }
}
