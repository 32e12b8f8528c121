use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use super::{Invocation, Stdout, Tool, ToolRunner};
use crate::config::RunConfig;
use crate::error::Result;

/// KCC 的固定参数，可在配置文件中替换
pub static DEFAULT_OPTIONS: &[&str] = &[
    "--manga-style",
    "--profile=OTHER",
    "--splitter=2",
    "--cropping=2",
    "--format=EPUB",
    "--stretch",
];

/// KCC 适配器：每个批次调用一次
#[derive(Debug, Clone)]
pub struct Converter {
    kcc: PathBuf,
    wine: Option<PathBuf>,
    options: Vec<String>,
    width: NonZeroU32,
    height: NonZeroU32,
}

impl Converter {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            kcc: config.kcc.clone(),
            wine: config.wine.clone(),
            options: config.converter_options.clone(),
            width: config.width,
            height: config.height,
        }
    }

    /// `input` 为已按章节、页码排好序的批次目录，`output` 为目标 EPUB 文件
    pub fn invocation(&self, input: &Path, output: &Path) -> Invocation {
        let invocation = match &self.wine {
            Some(wine) => Invocation::new(Tool::Converter, wine)
                .arg(&self.kcc)
                .env("WINEDEBUG", "-all"),
            None => Invocation::new(Tool::Converter, &self.kcc),
        };

        invocation
            .args(&self.options)
            .arg(format!("--customwidth={}", self.width))
            .arg(format!("--customheight={}", self.height))
            .arg("-o")
            .arg(output)
            .arg(input)
            .stdout(Stdout::Discard)
    }

    #[instrument(skip_all)]
    pub async fn convert<R: ToolRunner>(
        &self,
        runner: &R,
        input: &Path,
        output: &Path,
    ) -> Result<()> {
        info!("正在转换: {}", output.display());
        runner
            .run(&self.invocation(input, output))
            .await?
            .check(Tool::Converter)?;
        info!("EPUB 已生成: {}", output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter(wine: Option<&str>) -> Converter {
        Converter {
            kcc: PathBuf::from("/opt/kcc/kcc-c2e"),
            wine: wine.map(PathBuf::from),
            options: DEFAULT_OPTIONS.iter().map(|s| s.to_string()).collect(),
            width: NonZeroU32::new(1264).unwrap(),
            height: NonZeroU32::new(1680).unwrap(),
        }
    }

    #[test]
    fn native_invocation() {
        let invocation = converter(None).invocation(
            Path::new("/dl/batches/Title_001_010"),
            Path::new("/epubs/Title_001_010.epub"),
        );
        assert_eq!(invocation.tool, Tool::Converter);
        assert_eq!(invocation.stdout, Stdout::Discard);
        assert!(invocation.envs.is_empty());
        assert_eq!(
            invocation.command_line(),
            "/opt/kcc/kcc-c2e --manga-style --profile=OTHER --splitter=2 --cropping=2 \
             --format=EPUB --stretch --customwidth=1264 --customheight=1680 \
             -o /epubs/Title_001_010.epub /dl/batches/Title_001_010"
        );
    }

    #[test]
    fn wine_invocation_prefixes_launcher() {
        let invocation = converter(Some("wine")).invocation(Path::new("in"), Path::new("out.epub"));
        assert_eq!(invocation.program, PathBuf::from("wine"));
        assert_eq!(invocation.args[0], "/opt/kcc/kcc-c2e");
        assert_eq!(
            invocation.envs,
            vec![("WINEDEBUG".to_string(), "-all".to_string())]
        );
        assert_eq!(invocation.args.last().unwrap(), "in");
    }
}
