use std::{io, net::SocketAddr, time::Duration};

use comms::msg::{Command, Msg};
use dsvgd::StarGroup;
use log::{debug, info};
use tokio::{
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    time,
};

use crate::{NodeErr, Result};

const CONNECT_ATTEMPTS: usize = 100;
const CONNECT_BACKOFF: Duration = Duration::from_millis(100);

/// Room for the message header and for control and error frames.
const FRAME_SLACK: usize = 1 << 16;

/// A process group whose ranks talk over TCP through rank 0.
pub type TcpGroup = StarGroup<OwnedReadHalf, OwnedWriteHalf>;

/// The largest frame any rank can legitimately receive, which is every rank's
/// positions and scores gathered into a single message.
pub fn max_frame_len(world_size: usize, nparticles: usize, dim: usize) -> usize {
    world_size
        .saturating_mul(nparticles)
        .saturating_mul(dim)
        .saturating_mul(2 * size_of::<f32>())
        .saturating_add(FRAME_SLACK)
}

/// Brings up this rank's end of the group.
///
/// Rank 0 listens at `master` until every other rank has joined, any other rank
/// connects to it and announces itself.
///
/// # Arguments
/// * `master` - The address rank 0 listens at.
/// * `rank` - This process's rank.
/// * `world_size` - The amount of ranks in the group.
/// * `max_frame_len` - The cap on the frames received from peers, see `max_frame_len`.
pub async fn connect(
    master: SocketAddr,
    rank: usize,
    world_size: usize,
    max_frame_len: usize,
) -> Result<TcpGroup> {
    if rank == 0 {
        let listener = TcpListener::bind(master).await?;
        info!("listening at {master}");
        accept_leaves(listener, world_size, max_frame_len).await
    } else {
        let stream = connect_with_retry(master).await?;
        info!(rank = rank; "connected to root at {master}");
        join_root(stream, rank, world_size, max_frame_len).await
    }
}

/// Accepts a connection from every leaf of the group and waits for their `Join`.
///
/// # Errors
/// `Handshake` if a leaf announces an invalid or taken rank, or a different group size,
/// and `InvalidData` if a frame exceeds `max_frame_len`.
pub async fn accept_leaves(
    listener: TcpListener,
    world_size: usize,
    max_frame_len: usize,
) -> Result<TcpGroup> {
    let mut peers: Vec<(usize, _, _)> = Vec::with_capacity(world_size.saturating_sub(1));
    let mut rx_buf: Vec<f32> = Vec::new();

    while peers.len() + 1 < world_size {
        let (stream, addr) = listener.accept().await?;
        stream.set_nodelay(true)?;

        let (rx, tx) = stream.into_split();
        let (rx, tx) = comms::framed(rx, tx);
        let mut rx = rx.with_max_frame_len(max_frame_len);

        let rank = match rx.recv_into(&mut rx_buf).await? {
            Msg::Control(Command::Join {
                rank,
                world_size: theirs,
            }) if theirs == world_size => rank,
            Msg::Control(Command::Join {
                rank,
                world_size: theirs,
            }) => {
                return Err(NodeErr::Handshake(format!(
                    "rank {rank} at {addr} expects a group of {theirs}, this one has {world_size}"
                )));
            }
            other => {
                return Err(NodeErr::Handshake(format!(
                    "expected a join from {addr}, got {}",
                    other.kind()
                )));
            }
        };

        if rank == 0 || rank >= world_size || peers.iter().any(|(taken, ..)| *taken == rank) {
            return Err(NodeErr::Handshake(format!(
                "{addr} asked for rank {rank}, which is invalid or taken"
            )));
        }

        info!(rank = rank; "rank joined from {addr}");
        peers.push((rank, rx, tx));
    }

    Ok(StarGroup::root(peers)?)
}

/// Announces `rank` to the root on `stream`.
pub async fn join_root(
    stream: TcpStream,
    rank: usize,
    world_size: usize,
    max_frame_len: usize,
) -> Result<TcpGroup> {
    stream.set_nodelay(true)?;

    let (rx, tx) = stream.into_split();
    let (rx, mut tx) = comms::framed(rx, tx);
    let rx = rx.with_max_frame_len(max_frame_len);

    tx.send(&Msg::Control(Command::Join { rank, world_size }))
        .await?;

    Ok(StarGroup::leaf(rank, world_size, rx, tx)?)
}

/// Connects to `addr`, waiting for the root to start listening.
async fn connect_with_retry(addr: SocketAddr) -> Result<TcpStream> {
    let mut attempt = 1;

    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused && attempt < CONNECT_ATTEMPTS => {
                debug!(attempt = attempt; "root at {addr} not ready yet");
                attempt += 1;
                time::sleep(CONNECT_BACKOFF).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_cap_fits_a_gathered_population() {
        let floats = 3 * 10 * 2 * 4;
        assert_eq!(max_frame_len(3, 10, 4), floats * 4 + FRAME_SLACK);
        assert_eq!(max_frame_len(usize::MAX, 2, 2), usize::MAX);
    }
}
