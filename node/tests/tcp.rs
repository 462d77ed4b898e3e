use std::io;

use comms::msg::{Command, Msg};
use dsvgd::{ExchangeMode, LocalGroup};
use futures::future;
use node::{
    DatasetConfig, NodeErr, RunConfig,
    bootstrap::{self, TcpGroup},
};
use tokio::net::{TcpListener, TcpStream};

fn config(exchange: ExchangeMode) -> RunConfig {
    RunConfig {
        nparticles: 4,
        niter: 10,
        stepsize: 1e-2,
        exchange,
        wasserstein: true,
        dataset: DatasetConfig::Synthetic {
            samples: 60,
            weights: vec![0.5, 2.0],
            seed: 9,
        },
        ..RunConfig::default()
    }
}

async fn tcp_group(world_size: usize) -> Vec<TcpGroup> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let max_frame_len = bootstrap::max_frame_len(world_size, 4, 3);

    let root = bootstrap::accept_leaves(listener, world_size, max_frame_len);
    let leaves = future::try_join_all((1..world_size).map(|rank| async move {
        let stream = TcpStream::connect(addr).await?;
        bootstrap::join_root(stream, rank, world_size, max_frame_len).await
    }));

    let (root, leaves) = tokio::try_join!(root, leaves).unwrap();

    let mut groups = vec![root];
    groups.extend(leaves);
    groups
}

#[tokio::test]
async fn tcp_group_runs_like_the_local_group() {
    for exchange in ExchangeMode::ALL {
        let cfg = &config(exchange);

        let over_tcp = future::try_join_all(
            tcp_group(3)
                .await
                .into_iter()
                .map(|group| async move { node::run(cfg, group, &mut io::sink()).await }),
        )
        .await
        .unwrap();

        let in_process = future::try_join_all(
            LocalGroup::new(3)
                .unwrap()
                .into_iter()
                .map(|group| async move { node::run(cfg, group, &mut io::sink()).await }),
        )
        .await
        .unwrap();

        assert_eq!(over_tcp, in_process, "mode {exchange}");
    }
}

#[tokio::test]
async fn root_rejects_a_mismatched_group_size() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let root = bootstrap::accept_leaves(listener, 2, bootstrap::max_frame_len(2, 4, 3));
    let leaf = async {
        let stream = TcpStream::connect(addr).await?;
        let (rx, tx) = stream.into_split();
        let (_rx, mut tx) = comms::framed(rx, tx);

        let join = Msg::Control(Command::Join {
            rank: 1,
            world_size: 3,
        });
        tx.send(&join).await?;
        Ok::<_, io::Error>(())
    };

    let (root, leaf) = tokio::join!(root, leaf);

    leaf.unwrap();
    assert!(matches!(root, Err(NodeErr::Handshake(_))));
}

#[tokio::test]
async fn root_rejects_frames_over_the_cap() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let root = bootstrap::accept_leaves(listener, 2, 8);
    let leaf = async {
        let stream = TcpStream::connect(addr).await?;
        let (rx, tx) = stream.into_split();
        let (_rx, mut tx) = comms::framed(rx, tx);

        let join = Msg::Control(Command::Join {
            rank: 1,
            world_size: 2,
        });
        tx.send(&join).await?;
        Ok::<_, io::Error>(())
    };

    let (root, leaf) = tokio::join!(root, leaf);

    leaf.unwrap();
    assert!(matches!(root, Err(NodeErr::Io(e)) if e.kind() == io::ErrorKind::InvalidData));
}
