use std::sync::Arc;

use charge_core::{config::Config, service::ChargeService};

#[tokio::main]
async fn main() -> Result<(), charge_core::Error> {
    charge_core::logging::init("charge-bot")?;

    let cfg = Arc::new(Config::load()?);
    let service = Arc::new(ChargeService::from_config(&cfg)?);

    tracing::info!("charge-bot starting");

    charge_telegram::router::run_polling(cfg, service)
        .await
        .map_err(|e| charge_core::Error::External(format!("telegram bot failed: {e}")))?;

    tracing::info!("charge-bot stopped");
    Ok(())
}
