//! Length-prefixed framing of sampler messages over async byte streams.
//!
//! Every frame is a big-endian `u64` byte length followed by that many bytes, which
//! hold an encoded `msg::Msg`.

mod align;
mod codec;
pub mod msg;
mod receiver;
mod sender;

use tokio::io::{AsyncRead, AsyncWrite};

pub use align::{Align1, Align4};
pub use codec::{Decode, Encode};
pub use receiver::FrameReceiver;
pub use sender::FrameSender;

type LenType = u64;
const LEN_TYPE_SIZE: usize = size_of::<LenType>();

/// Frames larger than this are rejected by default, see `FrameReceiver::with_max_frame_len`.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1 << 30;

/// Wraps both halves of a stream into a framed receiver and sender.
///
/// # Arguments
/// * `rx` - An async readable.
/// * `tx` - An async writable.
pub fn framed<R, W>(rx: R, tx: W) -> (FrameReceiver<R>, FrameSender<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    (FrameReceiver::new(rx), FrameSender::new(tx))
}
