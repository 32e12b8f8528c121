use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info};

use manga_pipeline::{Args, Pipeline, RunConfig, Settings, format_elapsed, logger};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 先解析参数，--help 不输出日志
    let args = Args::parse();
    logger::init(args.log_level());
    debug!(?args, "命令行参数");

    let start = Instant::now();
    let settings = Settings::load(args.config.as_deref()).map_err(stage_failed)?;
    let config = RunConfig::resolve(args, settings).map_err(stage_failed)?;

    let report = Pipeline::new(config).run().await.map_err(stage_failed)?;

    info!(
        "✅ {} 处理完成：{} 个章节，生成 {} 个 EPUB，耗时 {}",
        report.title,
        report.chapters,
        report.epubs.len(),
        format_elapsed(start.elapsed())
    );
    for epub in &report.epubs {
        info!("  {}", epub.display());
    }
    Ok(())
}

fn stage_failed(err: manga_pipeline::Error) -> anyhow::Error {
    let stage = err.stage();
    error!(stage, "{}", err);
    anyhow::Error::new(err).context(format!("{stage} stage failed"))
}
