use std::num::NonZeroUsize;

use crate::chapter::{Chapter, ChapterNumber};

/// 连续的一组章节，对应一个输出 EPUB
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub index: usize,
    pub chapters: Vec<Chapter>,
}

impl Batch {
    pub fn first(&self) -> &ChapterNumber {
        &self.chapters[0].number
    }

    pub fn last(&self) -> &ChapterNumber {
        &self.chapters[self.chapters.len() - 1].number
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// `<Title>_<first:03>_<last:03>`
    pub fn file_stem(&self, title: &str) -> String {
        format!("{}_{}_{}", title, self.first().padded(), self.last().padded())
    }

    pub fn epub_file_name(&self, title: &str) -> String {
        format!("{}.epub", self.file_stem(title))
    }
}

/// 按顺序切分章节，每批 `size` 个，最后一批为余数
///
/// 所有批次首尾相接即为原序列，不重不漏；空输入得到空结果。
pub fn partition(chapters: Vec<Chapter>, size: NonZeroUsize) -> Vec<Batch> {
    let size = size.get();
    let mut batches = Vec::with_capacity(chapters.len().div_ceil(size));
    let mut chapters = chapters.into_iter().peekable();

    while chapters.peek().is_some() {
        let chunk: Vec<Chapter> = chapters.by_ref().take(size).collect();
        batches.push(Batch {
            index: batches.len(),
            chapters: chunk,
        });
    }
    batches
}
