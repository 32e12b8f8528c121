use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::batch::partition;
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::tool::{Converter, Downloader, ProcessRunner, ToolRunner};
use crate::workspace::Workspace;

/// 一次成功运行的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub title: String,
    pub chapters: usize,
    pub epubs: Vec<PathBuf>,
}

/// 重置目录 → 下载 → 枚举章节 → 分批 → 逐批转换 → 清理下载目录
///
/// 各阶段顺序执行，任何错误立即返回；已生成的 EPUB 不回滚。
pub struct Pipeline<R = ProcessRunner> {
    config: RunConfig,
    workspace: Workspace,
    downloader: Downloader,
    converter: Converter,
    runner: R,
}

impl Pipeline<ProcessRunner> {
    pub fn new(config: RunConfig) -> Self {
        Self::with_runner(config, ProcessRunner)
    }
}

impl<R: ToolRunner> Pipeline<R> {
    pub fn with_runner(config: RunConfig, runner: R) -> Self {
        Self {
            workspace: Workspace::new(&config.download_dir, &config.epub_dir),
            downloader: Downloader::new(&config),
            converter: Converter::new(&config),
            config,
            runner,
        }
    }

    #[cfg(test)]
    fn runner(&self) -> &R {
        &self.runner
    }

    #[instrument(skip_all)]
    pub async fn run(&self) -> Result<RunReport> {
        info!("--- 清理工作目录 ---");
        self.workspace.reset().await?;

        info!("--- 下载章节 ---");
        self.downloader.download(&self.runner).await?;

        info!("--- 整理章节 ---");
        let series = self
            .config
            .layout
            .enumerate(self.workspace.download_dir())
            .await?;
        info!(
            "{} 页图片，位于 {}",
            series.page_count(),
            series.dir.display()
        );
        let title = series.title;
        let chapters = series.chapters.len();
        let batches = partition(series.chapters, self.config.batch_size);
        info!(
            "{} 共 {} 个章节，分为 {} 批，每批最多 {} 章",
            title,
            chapters,
            batches.len(),
            self.config.batch_size
        );

        info!("--- KCC 转换 ---");
        let mut epubs = Vec::with_capacity(batches.len());
        for batch in &batches {
            let stem = batch.file_stem(&title);
            info!(
                "第 {}/{} 批: 章节 {} - {}",
                batch.index + 1,
                batches.len(),
                batch.first(),
                batch.last()
            );
            let input = self.workspace.stage_batch(batch, &stem).await?;
            let output = self.workspace.epub_path(&batch.epub_file_name(&title));
            self.converter
                .convert(&self.runner, &absolute(&input)?, &absolute(&output)?)
                .await?;
            epubs.push(output);
        }

        if self.config.keep_downloads {
            info!("保留下载目录: {}", self.workspace.download_dir().display());
        } else {
            self.workspace.discard_downloads().await?;
        }

        info!("完成，EPUB 位于 {}", self.workspace.epub_dir().display());
        Ok(RunReport {
            title,
            chapters,
            epubs,
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| Error::workspace(path, e))
}
