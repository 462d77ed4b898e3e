use comms::{
    FrameReceiver, FrameSender,
    msg::{Command, Msg, Payload},
};
use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use super::Communicator;
use crate::{Result, SamplerErr};

struct Peer<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    rank: usize,
    rx: FrameReceiver<R>,
    tx: FrameSender<W>,
}

enum Role<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Rank 0, connected to every other rank, ordered by rank.
    Root { peers: Vec<Peer<R, W>> },
    /// Any other rank, connected to the root only.
    Leaf { root: Peer<R, W> },
}

/// A process group over framed channels where rank 0 relays every collective.
///
/// On each all-gather every leaf sends its contribution to the root, the root waits for
/// all of them in rank order and then sends the concatenation back to every leaf.
pub struct StarGroup<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    rank: usize,
    world_size: usize,
    collective: usize,
    role: Role<R, W>,
    rx_buf: Vec<f32>,
}

impl<R, W> StarGroup<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Creates the root end of the group.
    ///
    /// # Arguments
    /// * `peers` - A channel per leaf tagged with the leaf's rank, in any order.
    ///
    /// # Errors
    /// `InvalidConfig` if the ranks are not exactly `1..=peers.len()`.
    pub fn root(mut peers: Vec<(usize, FrameReceiver<R>, FrameSender<W>)>) -> Result<Self> {
        peers.sort_by_key(|(rank, ..)| *rank);

        if let Some((i, (rank, ..))) = peers
            .iter()
            .enumerate()
            .find(|(i, (rank, ..))| *rank != i + 1)
        {
            return Err(SamplerErr::InvalidConfig(format!(
                "peer at position {i} has rank {rank}, expected {}",
                i + 1
            )));
        }

        let world_size = peers.len() + 1;
        let peers = peers
            .into_iter()
            .map(|(rank, rx, tx)| Peer { rank, rx, tx })
            .collect();

        Ok(Self {
            rank: 0,
            world_size,
            collective: 0,
            role: Role::Root { peers },
            rx_buf: Vec::new(),
        })
    }

    /// Creates a leaf end of the group, connected to the root through `rx` and `tx`.
    ///
    /// # Errors
    /// `InvalidConfig` if `rank` is zero or not below `world_size`.
    pub fn leaf(
        rank: usize,
        world_size: usize,
        rx: FrameReceiver<R>,
        tx: FrameSender<W>,
    ) -> Result<Self> {
        if rank == 0 || rank >= world_size {
            return Err(SamplerErr::InvalidConfig(format!(
                "leaf rank {rank} is out of range for a group of {world_size}"
            )));
        }

        Ok(Self {
            rank,
            world_size,
            collective: 0,
            role: Role::Leaf {
                root: Peer { rank: 0, rx, tx },
            },
            rx_buf: Vec::new(),
        })
    }

    async fn gather_at_root(
        peers: &mut [Peer<R, W>],
        rx_buf: &mut Vec<f32>,
        collective: usize,
        local: &[f32],
        gathered: &mut Vec<f32>,
    ) -> Result<()> {
        let len = local.len();

        gathered.clear();
        gathered.resize(len * (peers.len() + 1), 0.0);
        gathered[..len].copy_from_slice(local);

        for peer in peers.iter_mut() {
            let nums = match peer.rx.recv_into(&mut *rx_buf).await? {
                Msg::Data(Payload::Contribution(nums)) => nums,
                Msg::Err(detail) => {
                    return Err(SamplerErr::PeerFailed {
                        rank: peer.rank,
                        detail: detail.into_owned(),
                    });
                }
                other => {
                    return Err(SamplerErr::UnexpectedMessage {
                        step: collective,
                        got: other.kind(),
                    });
                }
            };

            if nums.len() != len {
                return Err(SamplerErr::PayloadLengthMismatch {
                    step: collective,
                    got: nums.len(),
                    expected: len,
                });
            }

            let start = peer.rank * len;
            gathered[start..start + len].copy_from_slice(nums);
        }

        let msg = Msg::Data(Payload::Gathered(gathered.as_slice()));
        for peer in peers.iter_mut() {
            peer.tx.send(&msg).await?;
        }

        Ok(())
    }

    async fn gather_at_leaf(
        root: &mut Peer<R, W>,
        rx_buf: &mut Vec<f32>,
        collective: usize,
        world_size: usize,
        local: &[f32],
        gathered: &mut Vec<f32>,
    ) -> Result<()> {
        root.tx
            .send(&Msg::Data(Payload::Contribution(local)))
            .await?;

        match root.rx.recv_into(&mut *rx_buf).await? {
            Msg::Data(Payload::Gathered(nums)) if nums.len() == world_size * local.len() => {
                gathered.clear();
                gathered.extend_from_slice(nums);
                Ok(())
            }
            Msg::Data(Payload::Gathered(nums)) => Err(SamplerErr::PayloadLengthMismatch {
                step: collective,
                got: nums.len(),
                expected: world_size * local.len(),
            }),
            Msg::Err(detail) => Err(SamplerErr::PeerFailed {
                rank: root.rank,
                detail: detail.into_owned(),
            }),
            other => Err(SamplerErr::UnexpectedMessage {
                step: collective,
                got: other.kind(),
            }),
        }
    }
}

/// Waits for a `Disconnect` from `peer`, skipping anything else it still had in flight.
async fn await_disconnect<R, W>(peer: &mut Peer<R, W>, rx_buf: &mut Vec<f32>) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        match peer.rx.recv_into(&mut *rx_buf).await? {
            Msg::Control(Command::Disconnect) => return Ok(()),
            other => warn!(rank = peer.rank; "expected disconnect, got {}", other.kind()),
        }
    }
}

impl<R, W> Communicator for StarGroup<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    async fn all_gather(&mut self, local: &[f32], gathered: &mut Vec<f32>) -> Result<()> {
        let Self {
            world_size,
            collective,
            role,
            rx_buf,
            ..
        } = self;

        let res = match role {
            Role::Root { peers } => {
                let res = Self::gather_at_root(peers, rx_buf, *collective, local, gathered).await;

                if let Err(e) = &res {
                    // Leaves would otherwise wait on the gathered buffer forever.
                    let msg = Msg::Err(e.to_string().into());
                    for peer in peers.iter_mut() {
                        if let Err(send_err) = peer.tx.send(&msg).await {
                            warn!(rank = peer.rank; "failed to report error: {send_err}");
                        }
                    }
                }

                res
            }
            Role::Leaf { root } => {
                Self::gather_at_leaf(root, rx_buf, *collective, *world_size, local, gathered).await
            }
        };

        debug!(rank = self.rank, collective = self.collective; "star all-gather done");
        self.collective += 1;
        res
    }

    async fn finish(&mut self) -> Result<()> {
        let Self { role, rx_buf, .. } = self;
        let msg = Msg::Control(Command::Disconnect);

        match role {
            Role::Root { peers } => {
                for peer in peers.iter_mut() {
                    await_disconnect(peer, rx_buf).await?;
                }

                for peer in peers.iter_mut() {
                    peer.tx.send(&msg).await?;
                }
            }
            Role::Leaf { root } => {
                root.tx.send(&msg).await?;
                await_disconnect(root, rx_buf).await?;
            }
        }

        info!(rank = self.rank; "group finished");
        Ok(())
    }
}
