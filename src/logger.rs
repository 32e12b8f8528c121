use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// RUST_LOG 优先，否则使用命令行给出的级别
pub fn init(default_level: &str) {
    let tracing_subscriber = tracing_subscriber::registry();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(ChronoLocal::new("%H:%M:%S".to_owned()))
        .with_target(false);
    tracing_subscriber.with(filter).with(fmt).init();
}
