use core::fmt::Debug;

/// A command payload longer than the 12 bytes a frame can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid payload: {len} bytes exceeds the 12-byte limit")]
pub struct InvalidPayload {
    pub len: usize,
}

/// Errors surfaced by the sensor session and the monitor loop.
///
/// `E` is the error type of the underlying serial transport.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error<E = ()>
where
    E: Debug,
{
    /// Underlying transport failure while writing or reading.
    #[error("transport error: {0:?}")]
    Io(E),

    #[error(transparent)]
    InvalidPayload(#[from] InvalidPayload),

    /// Working period outside of the 0-30 minute range.
    #[error("invalid working period: {0} (expected 0-30)")]
    InvalidWorkingPeriod(u8),

    /// The stop flag was raised while waiting on the sensor.
    #[error("operation cancelled")]
    Cancelled,
}

/// Outcome of a failed header search on the byte stream.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SyncError<E>
where
    E: Debug,
{
    #[error("no frame header after {attempts} read attempts")]
    Timeout { attempts: usize },

    #[error("header search cancelled")]
    Cancelled,

    #[error("transport error: {0:?}")]
    Io(E),
}

/// Reasons a response frame could not be read off the wire.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum FrameError<E>
where
    E: Debug,
{
    /// The resync budget ran out before a header byte was seen.
    #[error("lost sync: no header after {attempts} attempts")]
    NoSync { attempts: usize },

    /// Fewer than the 9 body bytes arrived after the header.
    #[error("short read: got {received} of 9 body bytes")]
    ShortRead { received: usize },

    /// Only reported when strict checksum validation is enabled.
    #[error("bad checksum: frame carries {expected:#04x}, calculated {calculated:#04x}")]
    BadChecksum { expected: u8, calculated: u8 },

    /// Only reported when strict validation is enabled.
    #[error("bad frame tail: {0:#04x}")]
    BadTail(u8),

    #[error("frame read cancelled")]
    Cancelled,

    #[error("transport error: {0:?}")]
    Io(E),
}

impl<E: Debug> From<SyncError<E>> for FrameError<E> {
    fn from(e: SyncError<E>) -> Self {
        match e {
            SyncError::Timeout { attempts } => FrameError::NoSync { attempts },
            SyncError::Cancelled => FrameError::Cancelled,
            SyncError::Io(e) => FrameError::Io(e),
        }
    }
}
