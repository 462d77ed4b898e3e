use std::{
    io::{self, Write},
    num::NonZeroUsize,
    sync::Arc,
};

use dsvgd::{
    Communicator, DistSampler, LocalGroup, LogDensity, LogisticPosterior, ParticleRow, Particles,
    Rbf, ShardSpec,
};
use log::info;
use rand::{SeedableRng, rngs::StdRng};

use crate::{GroupEnv, NodeErr, Result, RunConfig, bootstrap};

/// Runs this process's rank of the group described by `group`, writing its rows to `out`.
pub async fn run_node<W: Write>(group: &GroupEnv, cfg: &RunConfig, out: &mut W) -> Result<Particles> {
    let rank = group.rank.unwrap_or_default();
    let world_size = group.world_size.get();

    if world_size == 1 {
        return run(cfg, LocalGroup::solo(), out).await;
    }

    let dim = cfg.dataset.n_features() + 1;
    let max_frame_len = bootstrap::max_frame_len(world_size, cfg.nparticles, dim);

    let comm = bootstrap::connect(group.master, rank, world_size, max_frame_len).await?;
    run(cfg, comm, out).await
}

/// Samples the posterior of this rank's shard for `cfg.niter` iterations.
///
/// The population is written to `out` as JSON lines right before every iteration
/// with `timestep` set to the iteration, then once more after the last one.
///
/// # Returns
/// The final local population.
pub async fn run<C, W>(cfg: &RunConfig, comm: C, out: &mut W) -> Result<Particles>
where
    C: Communicator,
    W: Write,
{
    cfg.validate()?;

    let rank = comm.rank();
    let num_shards = NonZeroUsize::new(comm.world_size())
        .ok_or_else(|| NodeErr::Config("the group has no ranks".into()))?;

    let dataset = Arc::new(cfg.dataset.build()?);
    let shard = ShardSpec::new(rank, num_shards)?;
    let target = LogisticPosterior::new(dataset, shard)?;
    let dim = NonZeroUsize::new(target.dim())
        .ok_or_else(|| NodeErr::Config("the dataset has no features".into()))?;

    let mut rng = StdRng::seed_from_u64(cfg.seed.wrapping_add(rank as u64));
    let particles = Particles::standard_normal(&mut rng, cfg.nparticles()?, dim);

    info!(
        rank = rank,
        shard_start = target.shard_range().start,
        shard_end = target.shard_range().end;
        "shard bound"
    );

    let mut sampler =
        DistSampler::new(comm, target, Rbf::new(), particles, cfg.exchange, cfg.wasserstein)?;

    for l in 0..cfg.niter {
        if rank == 0 {
            info!(iteration = l; "iteration {l}");
        }

        write_rows(out, &sampler.rows(l))?;
        sampler.step(cfg.stepsize, cfg.bandwidth).await?;
    }

    write_rows(out, &sampler.rows(cfg.niter))?;

    if let Some(last) = sampler.wasserstein().last() {
        info!(rank = rank, wasserstein = *last; "final transport distance");
    }

    sampler.finish().await?;
    Ok(sampler.into_particles())
}

/// Drives `run` to completion unless `interrupt` resolves first.
///
/// # Errors
/// `Interrupted` if `interrupt` wins, whatever `interrupt` or `run` fail with otherwise.
pub async fn until_interrupted<F, I, T>(run: F, interrupt: I) -> Result<T>
where
    F: Future<Output = Result<T>>,
    I: Future<Output = io::Result<()>>,
{
    tokio::select! {
        ret = run => ret,
        res = interrupt => {
            res?;
            info!("received ctrl-c");
            Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted by ctrl-c").into())
        }
    }
}

fn write_rows<W: Write>(out: &mut W, rows: &[ParticleRow]) -> Result<()> {
    for row in rows {
        let line = serde_json::to_string(row).map_err(io::Error::from)?;
        writeln!(out, "{line}")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::future::{pending, ready};

    use futures::future;

    use super::*;
    use crate::DatasetConfig;

    fn small_config() -> RunConfig {
        RunConfig {
            nparticles: 3,
            niter: 4,
            dataset: DatasetConfig::Synthetic {
                samples: 40,
                weights: vec![1.0, -1.0],
                seed: 5,
            },
            ..RunConfig::default()
        }
    }

    #[tokio::test]
    async fn writes_a_row_per_particle_and_timestep() {
        let cfg = small_config();
        let mut out = Vec::new();

        let particles = run(&cfg, LocalGroup::solo(), &mut out).await.unwrap();
        assert_eq!(particles.len(), 3);
        assert_eq!(particles.dim(), 3);

        let rows: Vec<serde_json::Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(rows.len(), 3 * 5);
        assert_eq!(rows[0]["timestep"], 0);
        assert_eq!(rows[14]["timestep"], 4);
        assert_eq!(rows[14]["index"], 2);
        assert_eq!(rows[14]["rank"], 0);
        assert_eq!(rows[14]["value"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn interrupt_aborts_the_run() {
        let res = until_interrupted(pending::<Result<()>>(), ready(Ok::<_, io::Error>(()))).await;

        match res {
            Err(NodeErr::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::Interrupted),
            other => panic!("expected an interrupted run, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn finished_run_is_not_interrupted() {
        let res = until_interrupted(ready(Ok::<_, NodeErr>(7)), pending::<io::Result<()>>()).await;
        assert_eq!(res.unwrap(), 7);
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn output_failures_are_io_errors() {
        let res = run(&small_config(), LocalGroup::solo(), &mut Broken).await;
        assert!(matches!(res, Err(NodeErr::Io(e)) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[tokio::test]
    async fn ranks_start_from_different_seeds() {
        let cfg = RunConfig {
            niter: 1,
            ..small_config()
        };
        let groups = LocalGroup::new(2).unwrap();

        let cfg = &cfg;
        let runs = groups
            .into_iter()
            .map(|group| async move { run(cfg, group, &mut io::sink()).await });

        let out = future::try_join_all(runs).await.unwrap();
        assert_ne!(out[0], out[1]);
    }

    #[tokio::test]
    async fn rejects_more_ranks_than_rows() {
        let cfg = RunConfig {
            dataset: DatasetConfig::Inline {
                features: vec![vec![1.0]],
                labels: vec![1.0],
            },
            ..small_config()
        };
        let cfg = &cfg;
        let groups = LocalGroup::new(2).unwrap();

        let results = future::join_all(
            groups
                .into_iter()
                .map(|group| async move { run(cfg, group, &mut io::sink()).await }),
        )
        .await;

        assert!(results.iter().all(|res| res.is_err()));
    }
}
