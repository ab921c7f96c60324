use curriculum_service::{config::Config, start_server, utils::init_logger};
use log::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger(Config::log_level()?)?;
    let config = Config::load()?;

    info!(
        "Configuration: port={}, database={}, log_level={}",
        config.port,
        config.database_path.display(),
        config.log_level
    );

    start_server(config).await
}
