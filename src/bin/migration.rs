use stateset_lot_returns::{config, db};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config()?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    info!(environment = %cfg.environment, "Starting database migration");

    let pool = db::establish_connection_from_app_config(&cfg).await?;
    if let Err(e) = db::run_migrations(&pool).await {
        error!("Migration failed: {}", e);
        return Err(e.into());
    }

    info!("Migration completed successfully");
    Ok(())
}
