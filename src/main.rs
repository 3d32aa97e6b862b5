use academic_insight_hub::cli::Cli;
use academic_insight_hub::{logger, App, Config};
use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let mut config = Config::from_env();
    if let Some(database) = &cli.database {
        config.database_url = database.clone();
    }

    // 初始化日志
    logger::init(config.verbose_logging);

    App::initialize(config)?.run(cli).await
}
