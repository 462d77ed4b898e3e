use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use tokio::sync::Barrier;

use super::Communicator;
use crate::{Result, SamplerErr};

struct Shared {
    barrier: Barrier,
    slots: Mutex<Vec<Vec<f32>>>,
}

/// An in-process group whose ranks exchange through shared memory.
///
/// Each rank writes its contribution into its own slot, then every rank waits on a
/// barrier, reads every slot and waits on the barrier once more so no slot is
/// overwritten before all ranks have read it.
pub struct LocalGroup {
    rank: usize,
    world_size: usize,
    collective: usize,
    shared: Arc<Shared>,
}

impl LocalGroup {
    /// Creates the handles of a group of `world_size` ranks, ordered by rank.
    ///
    /// # Errors
    /// `InvalidConfig` if `world_size` is zero.
    pub fn new(world_size: usize) -> Result<Vec<Self>> {
        if world_size == 0 {
            return Err(SamplerErr::InvalidConfig(
                "a group needs at least one rank".into(),
            ));
        }

        let shared = Arc::new(Shared {
            barrier: Barrier::new(world_size),
            slots: Mutex::new(vec![Vec::new(); world_size]),
        });

        let handles = (0..world_size)
            .map(|rank| Self {
                rank,
                world_size,
                collective: 0,
                shared: Arc::clone(&shared),
            })
            .collect();

        Ok(handles)
    }

    /// A group of a single rank, where every collective is local.
    pub fn solo() -> Self {
        Self {
            rank: 0,
            world_size: 1,
            collective: 0,
            shared: Arc::new(Shared {
                barrier: Barrier::new(1),
                slots: Mutex::new(vec![Vec::new()]),
            }),
        }
    }

    fn read_slots(&self, expected: usize, gathered: &mut Vec<f32>) -> Result<()> {
        let slots = self.shared.slots.lock();

        if let Some(slot) = slots.iter().find(|slot| slot.len() != expected) {
            return Err(SamplerErr::PayloadLengthMismatch {
                step: self.collective,
                got: slot.len(),
                expected,
            });
        }

        gathered.clear();
        gathered.extend(slots.iter().flatten());
        Ok(())
    }
}

impl Communicator for LocalGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    async fn all_gather(&mut self, local: &[f32], gathered: &mut Vec<f32>) -> Result<()> {
        {
            let mut slots = self.shared.slots.lock();
            let slot = &mut slots[self.rank];
            slot.clear();
            slot.extend_from_slice(local);
        }

        self.shared.barrier.wait().await;
        let read = self.read_slots(local.len(), gathered);
        self.shared.barrier.wait().await;

        debug!(rank = self.rank, collective = self.collective; "local all-gather done");
        self.collective += 1;
        read
    }

    async fn finish(&mut self) -> Result<()> {
        self.shared.barrier.wait().await;
        Ok(())
    }
}
