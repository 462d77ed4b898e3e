use crate::Result;

/// Rank-addressed collective exchange between the workers of a process group.
///
/// Every operation is synchronous for the whole group: it returns on a rank only once
/// every rank of the group has contributed.
#[allow(unused)]
#[trait_variant::make(Communicator: Send)]
pub trait CommunicatorTemplate {
    /// This worker's rank, in `0..world_size()`.
    fn rank(&self) -> usize;

    /// The amount of workers in the group.
    fn world_size(&self) -> usize;

    /// Concatenates every rank's `local` buffer, in rank order, into `gathered`.
    ///
    /// # Arguments
    /// * `local` - This rank's contribution, every rank must contribute the same length.
    /// * `gathered` - Cleared and filled with `world_size() * local.len()` values.
    ///
    /// # Returns
    /// An error on transport failures, unexpected messages or mismatched lengths.
    async fn all_gather(&mut self, local: &[f32], gathered: &mut Vec<f32>) -> Result<()>;

    /// Waits until every rank of the group has finished.
    async fn finish(&mut self) -> Result<()>;
}
