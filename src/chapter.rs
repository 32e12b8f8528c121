pub mod enumerator;
pub mod number;

pub use enumerator::ChapterLayout;
pub use number::{ChapterNumber, ParseChapterNumberError};

use std::path::PathBuf;

/// 一个章节目录
///
/// `pages` 只用于日志与空章节告警；转换时 KCC 拿到的是整理后的批次目录，自行读取图片。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub number: ChapterNumber,
    pub dir: PathBuf,
    pub pages: Vec<PathBuf>, // 按文件名排序
}

impl Chapter {
    /// 下载器写出的目录名
    pub fn dir_name(&self) -> String {
        self.dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// 已下载的系列：标题与按序号升序排列的章节
#[derive(Debug, Clone)]
pub struct Series {
    pub title: String,
    pub dir: PathBuf,
    pub chapters: Vec<Chapter>,
}

impl Series {
    pub fn page_count(&self) -> usize {
        self.chapters.iter().map(|c| c.pages.len()).sum()
    }
}
