use std::io::{self, Write};

use log::info;
use tokio::signal;

use node::{GroupEnv, RunConfig, launcher, run, run_node};

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let group = GroupEnv::from_env()?;
    let cfg = RunConfig::from_env()?;

    if group.is_launcher() {
        info!(world_size = group.world_size.get(); "launching local ranks");
        launcher::launch(&group).await?;
        return Ok(());
    }

    info!(
        rank = group.rank.unwrap_or_default(),
        world_size = group.world_size.get(),
        exchange = cfg.exchange.as_str();
        "starting node"
    );

    let mut out = io::BufWriter::new(io::stdout());
    run::until_interrupted(run_node(&group, &cfg, &mut out), signal::ctrl_c()).await?;
    out.flush()?;

    info!("wrapping up, disconnecting...");
    Ok(())
}
