use std::num::{NonZeroU32, NonZeroUsize};
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::chapter::enumerator::DEFAULT_CHAPTER_PATTERN;
use crate::chapter::{ChapterLayout, ChapterNumber};
use crate::cli::Args;
use crate::error::{Error, Result};
use crate::tool::converter::DEFAULT_OPTIONS;

pub static DEFAULT_SETTINGS_FILE: &str = "manga-pipeline.toml";

static ENV_PREFIX: &str = "MANGA_PIPELINE";

/// 配置文件内容，所有字段均可省略
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub download_dir: PathBuf,
    pub epub_dir: PathBuf,
    pub keep_downloads: bool,
    pub downloader: DownloaderSettings,
    pub converter: ConverterSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DownloaderSettings {
    pub program: String,
    pub site: Option<String>,
    pub chapter_pattern: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConverterSettings {
    pub options: Vec<String>,
    pub wine: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("manga_downloads"),
            epub_dir: PathBuf::from("epubs"),
            keep_downloads: false,
            downloader: DownloaderSettings::default(),
            converter: ConverterSettings::default(),
        }
    }
}

impl Default for DownloaderSettings {
    fn default() -> Self {
        Self {
            program: "gallery-dl".to_string(),
            site: None,
            chapter_pattern: DEFAULT_CHAPTER_PATTERN.to_string(),
        }
    }
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            options: DEFAULT_OPTIONS.iter().map(|s| s.to_string()).collect(),
            wine: "wine".to_string(),
        }
    }
}

impl Settings {
    /// 读取配置文件与 `MANGA_PIPELINE__*` 环境变量
    ///
    /// 显式指定的文件必须存在；未指定时当前目录下的默认文件可有可无。
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path)
                .format(config::FileFormat::Toml)
                .required(true),
            None => {
                config::File::new(DEFAULT_SETTINGS_FILE, config::FileFormat::Toml).required(false)
            }
        };

        config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::config(format!("failed to load settings: {e}")))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::config(format!("invalid settings: {e}")))
    }
}

/// 一次运行的全部参数，启动时构造并校验，之后只读
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub url: Url,
    pub downloader: PathBuf,
    pub kcc: PathBuf,
    pub wine: Option<PathBuf>,
    pub batch_size: NonZeroUsize,
    pub min_chapter: Option<ChapterNumber>,
    pub max_chapter: Option<ChapterNumber>,
    pub width: NonZeroU32,
    pub height: NonZeroU32,
    pub download_dir: PathBuf,
    pub epub_dir: PathBuf,
    pub layout: ChapterLayout,
    pub converter_options: Vec<String>,
    pub keep_downloads: bool,
}

impl RunConfig {
    /// 合并命令行与配置文件并校验；任何文件系统副作用发生之前调用
    pub fn resolve(args: Args, settings: Settings) -> Result<Self> {
        let url = Url::parse(args.manga_url.trim())
            .map_err(|e| Error::config(format!("invalid manga URL {:?}: {e}", args.manga_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "manga URL must be http or https, got {:?}",
                url.scheme()
            )));
        }

        if let (Some(min), Some(max)) = (&args.min_chapter, &args.max_chapter) {
            if min > max {
                return Err(Error::config(format!(
                    "min chapter {min} is greater than max chapter {max}"
                )));
            }
        }

        if !args.kcc.is_file() {
            return Err(Error::config(format!(
                "KCC executable not found at {}",
                args.kcc.display()
            )));
        }

        check_directories(&settings.download_dir, &settings.epub_dir)?;

        let downloader = locate(&settings.downloader.program)?;
        let wine = if args.wine {
            Some(locate(&settings.converter.wine)?)
        } else {
            None
        };
        let layout = ChapterLayout::new(
            &settings.downloader.chapter_pattern,
            settings.downloader.site.clone(),
        )?;

        let config = Self {
            url,
            downloader,
            kcc: args.kcc,
            wine,
            batch_size: args.batch_size,
            min_chapter: args.min_chapter,
            max_chapter: args.max_chapter,
            width: args.custom_width,
            height: args.custom_height,
            download_dir: settings.download_dir,
            epub_dir: settings.epub_dir,
            layout,
            converter_options: settings.converter.options,
            keep_downloads: args.keep_downloads || settings.keep_downloads,
        };
        debug!(?config, "运行配置");
        Ok(config)
    }
}

/// 两个目录互不包含，否则重置其中一个会删掉另一个
fn check_directories(download_dir: &Path, epub_dir: &Path) -> Result<()> {
    if download_dir.as_os_str().is_empty() || epub_dir.as_os_str().is_empty() {
        return Err(Error::config("download and epub directories must not be empty"));
    }
    let (download, epub) = (normalized(download_dir)?, normalized(epub_dir)?);
    if download.starts_with(&epub) || epub.starts_with(&download) {
        return Err(Error::config(format!(
            "download directory {} and epub directory {} must not contain each other",
            download_dir.display(),
            epub_dir.display()
        )));
    }
    Ok(())
}

/// 转为绝对路径并按字面消去 `.` 与 `..`，不解析符号链接
fn normalized(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)
        .map_err(|e| Error::config(format!("cannot resolve {}: {e}", path.display())))?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}

/// 带路径的程序直接检查文件，否则在 PATH 中查找
fn locate(program: &str) -> Result<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 || path.is_absolute() {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(Error::config(format!("{program} not found")))
        };
    }
    which::which(program)
        .map_err(|_| Error::config(format!("{program} command not found, please install it")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        kcc: PathBuf,
        settings: Settings,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let kcc = tmp.path().join("kcc-c2e");
        let gallery_dl = tmp.path().join("gallery-dl");
        let wine = tmp.path().join("wine");
        for tool in [&kcc, &gallery_dl, &wine] {
            std::fs::write(tool, b"#!/bin/sh\n").unwrap();
        }

        let mut settings = Settings::default();
        settings.download_dir = tmp.path().join("manga_downloads");
        settings.epub_dir = tmp.path().join("epubs");
        settings.downloader.program = gallery_dl.to_string_lossy().into_owned();
        settings.converter.wine = wine.to_string_lossy().into_owned();
        Fixture {
            _tmp: tmp,
            kcc,
            settings,
        }
    }

    fn args(fixture: &Fixture, extra: &[&str]) -> Args {
        let kcc = fixture.kcc.to_string_lossy().into_owned();
        let mut argv = vec!["manga-pipeline", "-u", "https://weebcentral.com/series/abc", "-k"];
        argv.push(&kcc);
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn resolves_defaults() {
        let f = fixture();
        let config = RunConfig::resolve(args(&f, &[]), f.settings.clone()).unwrap();
        assert_eq!(config.url.as_str(), "https://weebcentral.com/series/abc");
        assert_eq!(config.kcc, f.kcc);
        assert_eq!(config.wine, None);
        assert_eq!(config.batch_size.get(), 20);
        assert_eq!(config.width.get(), 1264);
        assert_eq!(config.height.get(), 1680);
        assert_eq!(config.converter_options.len(), DEFAULT_OPTIONS.len());
        assert!(!config.keep_downloads);
    }

    #[test]
    fn wine_is_located_when_requested() {
        let f = fixture();
        let config = RunConfig::resolve(args(&f, &["--wine"]), f.settings.clone()).unwrap();
        assert_eq!(config.wine, Some(PathBuf::from(&f.settings.converter.wine)));
    }

    #[test]
    fn min_greater_than_max_is_rejected() {
        let f = fixture();
        let err = RunConfig::resolve(args(&f, &["-m", "20", "-x", "10"]), f.settings.clone())
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("min chapter 20")));
        assert!(!f.settings.download_dir.exists());

        let ok = RunConfig::resolve(args(&f, &["-m", "10", "-x", "10"]), f.settings.clone());
        assert!(ok.is_ok());
    }

    #[test]
    fn missing_kcc_is_rejected() {
        let f = fixture();
        let mut a = args(&f, &[]);
        a.kcc = f.kcc.with_file_name("missing-kcc");
        let err = RunConfig::resolve(a, f.settings.clone()).unwrap_err();
        assert_eq!(err.stage(), "configuration");
    }

    #[test]
    fn missing_tools_are_rejected() {
        let f = fixture();
        let mut settings = f.settings.clone();
        settings.downloader.program = "/nonexistent/gallery-dl".to_string();
        assert!(RunConfig::resolve(args(&f, &[]), settings).is_err());

        let mut settings = f.settings.clone();
        settings.converter.wine = "definitely-not-a-real-wine-binary-xyz".to_string();
        assert!(RunConfig::resolve(args(&f, &[]), settings.clone()).is_ok());
        assert!(RunConfig::resolve(args(&f, &["--wine"]), settings).is_err());
    }

    #[test]
    fn bad_urls_are_rejected() {
        let f = fixture();
        let mut a = args(&f, &[]);
        a.manga_url = "not a url".to_string();
        assert!(RunConfig::resolve(a.clone(), f.settings.clone()).is_err());
        a.manga_url = "ftp://example.com/series".to_string();
        assert!(RunConfig::resolve(a, f.settings.clone()).is_err());
    }

    #[test]
    fn nested_directories_are_rejected() {
        let f = fixture();
        let mut settings = f.settings.clone();
        settings.epub_dir = settings.download_dir.join("epubs");
        assert!(RunConfig::resolve(args(&f, &[]), settings).is_err());

        let mut settings = f.settings.clone();
        settings.epub_dir = settings.download_dir.clone();
        assert!(RunConfig::resolve(args(&f, &[]), settings).is_err());
    }

    #[test]
    fn nested_directories_are_rejected_however_spelled() {
        let f = fixture();
        let cwd = std::env::current_dir().unwrap();
        let spellings = [
            ("dl", "./dl/epubs"),
            ("dl", "./dl"),
            ("./dl/", "dl/sub/.."),
            ("other/../dl", "dl/epubs"),
        ];
        for (download, epub) in spellings {
            let mut settings = f.settings.clone();
            settings.download_dir = PathBuf::from(download);
            settings.epub_dir = PathBuf::from(epub);
            let err = RunConfig::resolve(args(&f, &[]), settings).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "{download} / {epub}");
        }

        let mut settings = f.settings.clone();
        settings.download_dir = PathBuf::from("dl");
        settings.epub_dir = cwd.join("dl").join("epubs");
        assert!(RunConfig::resolve(args(&f, &[]), settings).is_err());

        let mut settings = f.settings.clone();
        settings.download_dir = cwd.join("dl");
        settings.epub_dir = PathBuf::from("./dl");
        assert!(RunConfig::resolve(args(&f, &[]), settings).is_err());

        let mut settings = f.settings.clone();
        settings.download_dir = PathBuf::from("./dl");
        settings.epub_dir = PathBuf::from("dlx/epubs");
        assert!(RunConfig::resolve(args(&f, &[]), settings).is_ok());
    }

    #[test]
    fn invalid_chapter_pattern_is_rejected() {
        let f = fixture();
        let mut settings = f.settings.clone();
        settings.downloader.chapter_pattern = "^c\\d+".to_string();
        assert!(RunConfig::resolve(args(&f, &[]), settings).is_err());
    }

    #[test]
    fn keep_downloads_from_flag_or_settings() {
        let f = fixture();
        let config =
            RunConfig::resolve(args(&f, &["--keep-downloads"]), f.settings.clone()).unwrap();
        assert!(config.keep_downloads);

        let mut settings = f.settings.clone();
        settings.keep_downloads = true;
        let config = RunConfig::resolve(args(&f, &[]), settings).unwrap();
        assert!(config.keep_downloads);
    }

    #[test]
    fn settings_from_toml_override_defaults() {
        let settings = Settings::from_toml(
            r#"
            epub_dir = "out"

            [downloader]
            site = "weebcentral"

            [converter]
            options = ["--manga-style", "--format=EPUB"]
            "#,
        )
        .unwrap();
        assert_eq!(settings.epub_dir, PathBuf::from("out"));
        assert_eq!(settings.download_dir, PathBuf::from("manga_downloads"));
        assert_eq!(settings.downloader.site.as_deref(), Some("weebcentral"));
        assert_eq!(settings.downloader.program, "gallery-dl");
        assert_eq!(settings.converter.options, ["--manga-style", "--format=EPUB"]);
        assert_eq!(settings.converter.wine, "wine");
    }

    #[test]
    fn empty_settings_are_defaults() {
        assert_eq!(Settings::from_toml("").unwrap(), Settings::default());
    }

    #[test]
    fn explicit_settings_file_must_exist() {
        let tmp = TempDir::new().unwrap();
        assert!(Settings::load(Some(&tmp.path().join("missing.toml"))).is_err());

        let path = tmp.path().join("settings.toml");
        std::fs::write(&path, "keep_downloads = true\n").unwrap();
        assert!(Settings::load(Some(&path)).unwrap().keep_downloads);
    }
}
