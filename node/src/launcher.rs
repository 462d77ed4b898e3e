use std::env;

use log::{info, warn};
use tokio::process::Command;

use crate::{GroupEnv, NodeErr, Result};

/// Runs every rank of `group` as a child process of this binary and waits for all of them.
///
/// Children inherit this process's environment and standard streams, with `RANK`,
/// `WORLD_SIZE`, `MASTER_ADDR` and `MASTER_PORT` set for their rank.
///
/// # Errors
/// `ChildFailed` with the lowest failed rank if any child does not exit successfully.
pub async fn launch(group: &GroupEnv) -> Result<()> {
    let exe = env::current_exe()?;
    let world_size = group.world_size.get();
    let mut children = Vec::with_capacity(world_size);

    for rank in 0..world_size {
        let child = Command::new(&exe)
            .env("RANK", rank.to_string())
            .env("WORLD_SIZE", world_size.to_string())
            .env("MASTER_ADDR", group.master.ip().to_string())
            .env("MASTER_PORT", group.master.port().to_string())
            .kill_on_drop(true)
            .spawn()?;

        info!(rank = rank, pid = child.id().unwrap_or_default(); "spawned rank");
        children.push((rank, child));
    }

    let mut failed = None;

    for (rank, mut child) in children {
        let status = child.wait().await?;

        if !status.success() {
            warn!(rank = rank; "rank exited with {status}");
            failed.get_or_insert(NodeErr::ChildFailed {
                rank,
                code: status.code(),
            });
        }
    }

    match failed {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
