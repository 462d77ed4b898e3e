use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{Encode, LEN_TYPE_SIZE, LenType};

/// The writing half of a framed stream.
///
/// Holds a scratch buffer for the length prefix and the owned part of each message, so
/// steady state sends don't allocate.
pub struct FrameSender<W>
where
    W: AsyncWrite + Unpin,
{
    tx: W,
    head: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> FrameSender<W> {
    pub(super) fn new(tx: W) -> Self {
        Self {
            tx,
            head: Vec::new(),
        }
    }

    /// Writes `msg` as a single frame and flushes the stream.
    ///
    /// # Errors
    /// `InvalidInput` if the frame length does not fit the prefix, plus any encode or
    /// write failure.
    pub async fn send<'a, T: Encode<'a>>(&mut self, msg: &'a T) -> io::Result<()> {
        let Self { tx, head } = self;

        head.clear();
        head.resize(LEN_TYPE_SIZE, 0);

        let tail = msg.encode(head)?;
        let body_len = head.len() - LEN_TYPE_SIZE + tail.map_or(0, <[u8]>::len);
        let prefix = LenType::try_from(body_len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame too large"))?;

        head[..LEN_TYPE_SIZE].copy_from_slice(&prefix.to_be_bytes());
        tx.write_all(head).await?;

        if let Some(tail) = tail {
            tx.write_all(tail).await?;
        }

        tx.flush().await
    }
}
