use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, instrument};

use crate::batch::Batch;
use crate::error::{Error, Result};

static BATCHES_DIR: &str = "batches";

/// 下载暂存目录与 EPUB 输出目录
#[derive(Debug, Clone)]
pub struct Workspace {
    download_dir: PathBuf,
    epub_dir: PathBuf,
}

impl Workspace {
    pub fn new(download_dir: impl Into<PathBuf>, epub_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            epub_dir: epub_dir.into(),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn epub_dir(&self) -> &Path {
        &self.epub_dir
    }

    /// 清空并重建两个目录，上次运行的结果会被直接丢弃
    #[instrument(skip_all)]
    pub async fn reset(&self) -> Result<()> {
        for dir in [&self.download_dir, &self.epub_dir] {
            info!("正在重置目录: {}", dir.display());
            remove_dir_if_exists(dir).await?;
            fs::create_dir_all(dir)
                .await
                .map_err(|e| Error::workspace(dir, e))?;
        }
        Ok(())
    }

    pub fn batch_dir(&self, stem: &str) -> PathBuf {
        self.download_dir.join(BATCHES_DIR).join(stem)
    }

    pub fn epub_path(&self, file_name: &str) -> PathBuf {
        self.epub_dir.join(file_name)
    }

    /// 把批次内的章节目录移入单独的批次目录
    ///
    /// 章节目录重命名为 `<序号:04>_<原名>`，使目录内的字典序与章节顺序一致。
    #[instrument(skip_all)]
    pub async fn stage_batch(&self, batch: &Batch, stem: &str) -> Result<PathBuf> {
        let dir = self.batch_dir(stem);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::workspace(&dir, e))?;

        for (position, chapter) in batch.chapters.iter().enumerate() {
            let target = dir.join(format!("{:04}_{}", position, chapter.dir_name()));
            fs::rename(&chapter.dir, &target)
                .await
                .map_err(|e| Error::workspace(&chapter.dir, e))?;
        }
        info!("批次目录已创建: {} ({} 个章节)", dir.display(), batch.len());
        Ok(dir)
    }

    /// 运行成功后删除下载暂存目录，EPUB 保留
    #[instrument(skip_all)]
    pub async fn discard_downloads(&self) -> Result<()> {
        info!("正在删除下载目录: {}", self.download_dir.display());
        remove_dir_if_exists(&self.download_dir).await
    }
}

async fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::workspace(dir, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapter::{Chapter, ChapterNumber};
    use tempfile::TempDir;

    fn workspace(root: &Path) -> Workspace {
        Workspace::new(root.join("manga_downloads"), root.join("epubs"))
    }

    fn is_empty_dir(dir: &Path) -> bool {
        dir.is_dir() && std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn reset_creates_missing_directories() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace(tmp.path());
        ws.reset().await.unwrap();
        assert!(is_empty_dir(ws.download_dir()));
        assert!(is_empty_dir(ws.epub_dir()));
    }

    #[tokio::test]
    async fn reset_discards_previous_contents() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace(tmp.path());
        std::fs::create_dir_all(ws.download_dir().join("site").join("Series")).unwrap();
        std::fs::create_dir_all(ws.epub_dir()).unwrap();
        std::fs::write(ws.epub_dir().join("Old_001_020.epub"), b"old").unwrap();

        ws.reset().await.unwrap();
        assert!(is_empty_dir(ws.download_dir()));
        assert!(is_empty_dir(ws.epub_dir()));
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace(tmp.path());
        ws.reset().await.unwrap();
        ws.reset().await.unwrap();
        assert!(is_empty_dir(ws.download_dir()));
        assert!(is_empty_dir(ws.epub_dir()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reset_fails_when_a_file_blocks_the_path() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"not a dir").unwrap();
        let ws = Workspace::new(blocker.join("downloads"), tmp.path().join("epubs"));

        let err = ws.reset().await.unwrap_err();
        assert_eq!(err.stage(), "workspace");
    }

    #[tokio::test]
    async fn stage_batch_moves_chapters_in_order() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace(tmp.path());
        ws.reset().await.unwrap();

        let series = ws.download_dir().join("site").join("Series");
        let mut chapters = Vec::new();
        for n in [9u32, 10] {
            let dir = series.join(format!("c{n}"));
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("01.jpg"), b"img").unwrap();
            chapters.push(Chapter {
                number: ChapterNumber::new(n),
                pages: vec![dir.join("01.jpg")],
                dir,
            });
        }
        let batch = Batch { index: 0, chapters };

        let staged = ws.stage_batch(&batch, "Series_009_010").await.unwrap();
        assert_eq!(staged, ws.batch_dir("Series_009_010"));
        let mut names: Vec<String> = std::fs::read_dir(&staged)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, ["0000_c9", "0001_c10"]);
        assert!(staged.join("0001_c10").join("01.jpg").is_file());
        assert!(!series.join("c9").exists());
    }

    #[tokio::test]
    async fn discard_downloads_keeps_epubs() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace(tmp.path());
        ws.reset().await.unwrap();
        std::fs::write(ws.epub_path("S_001_002.epub"), b"epub").unwrap();

        ws.discard_downloads().await.unwrap();
        ws.discard_downloads().await.unwrap();
        assert!(!ws.download_dir().exists());
        assert!(ws.epub_path("S_001_002.epub").is_file());
    }
}
