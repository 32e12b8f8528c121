use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use super::{Chapter, ChapterNumber, Series};
use crate::error::{EnumerationError, Error, Result};

pub static DEFAULT_CHAPTER_PATTERN: &str = r"(?i)^c(\d+(?:\.\d+)?)";

static IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif", "bmp"];

/// 下载器输出目录的约定：`<download_dir>/<site>/<series>/<chapter>/<pages>`
///
/// 章节目录名由 `pattern` 的第一个捕获组给出序号，不匹配的条目忽略。
#[derive(Debug, Clone)]
pub struct ChapterLayout {
    pattern: Regex,
    site: Option<String>,
}

impl ChapterLayout {
    pub fn new(pattern: &str, site: Option<String>) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::config(format!("invalid chapter pattern {pattern:?}: {e}")))?;
        if pattern.captures_len() < 2 {
            return Err(Error::config(format!(
                "chapter pattern {:?} needs a capture group for the chapter number",
                pattern.as_str()
            )));
        }
        Ok(Self { pattern, site })
    }

    /// 从目录名中提取章节序号；不是章节目录时返回 `None`
    pub fn chapter_number(
        &self,
        name: &str,
    ) -> std::result::Result<Option<ChapterNumber>, EnumerationError> {
        let Some(captures) = self.pattern.captures(name) else {
            return Ok(None);
        };
        let raw = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        raw.parse()
            .map(Some)
            .map_err(|_| EnumerationError::Unparseable {
                name: name.to_string(),
            })
    }

    #[instrument(skip_all)]
    pub async fn enumerate(&self, download_dir: &Path) -> Result<Series> {
        let site_dir = match &self.site {
            Some(site) => download_dir.join(site),
            None => single_subdirectory(download_dir).await?,
        };
        let series_dir = single_subdirectory(&site_dir).await?;
        let title = file_name(&series_dir);
        info!("找到系列: {} ({})", title, series_dir.display());

        let mut by_number: BTreeMap<ChapterNumber, Chapter> = BTreeMap::new();
        for (name, dir) in subdirectories(&series_dir).await? {
            let Some(number) = self.chapter_number(&name)? else {
                debug!("跳过非章节目录: {}", name);
                continue;
            };
            if let Some(existing) = by_number.get(&number) {
                return Err(EnumerationError::Duplicate {
                    number,
                    first: existing.dir_name(),
                    second: name,
                }
                .into());
            }

            let pages = pages(&dir).await?;
            if pages.is_empty() {
                warn!("章节 {} 中没有图片", name);
            }
            by_number.insert(number.clone(), Chapter { number, dir, pages });
        }

        if by_number.is_empty() {
            return Err(EnumerationError::NoChapters { dir: series_dir }.into());
        }

        let chapters: Vec<Chapter> = by_number.into_values().collect();
        info!("共找到 {} 个章节", chapters.len());
        Ok(Series {
            title,
            dir: series_dir,
            chapters,
        })
    }
}

impl Default for ChapterLayout {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_CHAPTER_PATTERN).expect("默认章节正则无效"),
            site: None,
        }
    }
}

async fn single_subdirectory(dir: &Path) -> Result<PathBuf> {
    if !fs::try_exists(dir)
        .await
        .map_err(|e| Error::workspace(dir, e))?
    {
        return Err(EnumerationError::NoChapters {
            dir: dir.to_path_buf(),
        }
        .into());
    }

    let mut dirs = subdirectories(dir).await?;
    match dirs.len() {
        0 => Err(EnumerationError::NoChapters {
            dir: dir.to_path_buf(),
        }
        .into()),
        1 => Ok(dirs.remove(0).1),
        _ => Err(EnumerationError::AmbiguousSeries {
            dir: dir.to_path_buf(),
            candidates: dirs.into_iter().map(|(name, _)| name).collect(),
        }
        .into()),
    }
}

/// 按名称排序的子目录列表
async fn subdirectories(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| Error::workspace(dir, e))?;

    let mut dirs = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::workspace(dir, e))?
    {
        let path = entry.path();
        if fs::metadata(&path)
            .await
            .map_err(|e| Error::workspace(&path, e))?
            .is_dir()
        {
            dirs.push((entry.file_name().to_string_lossy().into_owned(), path));
        }
    }
    dirs.sort();
    Ok(dirs)
}

async fn pages(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| Error::workspace(dir, e))?;

    let mut pages = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::workspace(dir, e))?
    {
        let path = entry.path();
        if !is_image(&path) {
            continue;
        }
        if fs::metadata(&path)
            .await
            .map_err(|e| Error::workspace(&path, e))?
            .is_file()
        {
            pages.push(path);
        }
    }
    pages.sort();
    Ok(pages)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
