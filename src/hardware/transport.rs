//! Byte transport trait consumed by the protocol engine

use crate::hardware::CommResult;
use std::time::Duration;

/// Hardware abstraction for an already-open byte link
///
/// Opening, configuring and closing the link is the owner's job. The engine
/// only borrows a transport for the duration of a transaction.
pub trait Transport {
    /// Discard any buffered input and output, then write the whole buffer
    fn write(&mut self, bytes: &[u8]) -> CommResult<()>;

    /// Block until exactly `count` bytes arrive or `timeout` elapses
    ///
    /// A read that collects fewer than `count` bytes before the deadline
    /// fails with [`CommError::Timeout`](crate::hardware::CommError::Timeout);
    /// partial data is never returned.
    fn read(&mut self, count: usize, timeout: Duration) -> CommResult<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, bytes: &[u8]) -> CommResult<()> {
        (**self).write(bytes)
    }

    fn read(&mut self, count: usize, timeout: Duration) -> CommResult<Vec<u8>> {
        (**self).read(count, timeout)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> CommResult<()> {
        (**self).write(bytes)
    }

    fn read(&mut self, count: usize, timeout: Duration) -> CommResult<Vec<u8>> {
        (**self).read(count, timeout)
    }
}
