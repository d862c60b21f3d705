use anyhow::Result;
use auction_group::{config::Config, service};
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let svc_ctr = service::ServiceControl::new();

    ctrlc::set_handler({
        let svc_ctr = svc_ctr.clone();
        move || {
            info!("Stopping all services...");
            svc_ctr.stop_all();
        }
    })?;

    svc_ctr
        .spawn_loop(service::Frontend::new(config)?)
        .join()
}
