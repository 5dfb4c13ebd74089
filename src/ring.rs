//! Wrap-around cursor arithmetic over a fixed capacity byte buffer.
//!
//! [`read`] and [`write`] copy through a cursor and return the advanced cursor, modulo the buffer
//! length. They keep no length themselves: the caller has to make sure unread bytes are never
//! overwritten. [`Fifo`] adds that bookkeeping on top.
//!
//! Nothing here is synchronized. Sharing a buffer between an interrupt handler and the main loop
//! requires a critical section around every call.

use crate::error::Error;
#[cfg(feature = "defmt")]
use defmt::trace;

/// Copies `dest.len()` bytes out of `buffer`, starting at `cursor` and wrapping at most once.
///
/// Returns the cursor following the last byte read.
pub fn read(buffer: &[u8], cursor: usize, dest: &mut [u8]) -> Result<usize, Error> {
    let capacity = buffer.len();
    let count = dest.len();
    if count > capacity || cursor >= capacity {
        return Err(Error::Overflow);
    }

    Ok(copy_out(buffer, cursor, dest))
}

/// Copies `src` into `buffer`, starting at `cursor` and wrapping at most once.
///
/// Returns the cursor following the last byte written.
pub fn write(buffer: &mut [u8], cursor: usize, src: &[u8]) -> Result<usize, Error> {
    let capacity = buffer.len();
    let count = src.len();
    if count > capacity || cursor >= capacity {
        return Err(Error::Overflow);
    }

    Ok(copy_in(buffer, cursor, src))
}

/// Unchecked core of [`read`]: `dest.len() <= buffer.len()` and `cursor < buffer.len()`.
fn copy_out(buffer: &[u8], cursor: usize, dest: &mut [u8]) -> usize {
    let capacity = buffer.len();
    let count = dest.len();
    debug_assert!(count <= capacity && cursor < capacity);

    if cursor + count >= capacity {
        let before_wrap = capacity - cursor;
        let after_wrap = count - before_wrap;
        dest[..before_wrap].copy_from_slice(&buffer[cursor..]);
        dest[before_wrap..].copy_from_slice(&buffer[..after_wrap]);
        after_wrap
    } else {
        dest.copy_from_slice(&buffer[cursor..cursor + count]);
        cursor + count
    }
}

/// Unchecked core of [`write`]: `src.len() <= buffer.len()` and `cursor < buffer.len()`.
fn copy_in(buffer: &mut [u8], cursor: usize, src: &[u8]) -> usize {
    let capacity = buffer.len();
    let count = src.len();
    debug_assert!(count <= capacity && cursor < capacity);

    if cursor + count >= capacity {
        let before_wrap = capacity - cursor;
        let after_wrap = count - before_wrap;
        buffer[cursor..].copy_from_slice(&src[..before_wrap]);
        buffer[..after_wrap].copy_from_slice(&src[before_wrap..]);
        after_wrap
    } else {
        buffer[cursor..cursor + count].copy_from_slice(src);
        cursor + count
    }
}

/// Byte FIFO over an owned `N` byte buffer.
///
/// One slot always stays empty so a full buffer can be told apart from an empty one, leaving room
/// for `N - 1` bytes.
pub struct Fifo<const N: usize> {
    buffer: [u8; N],
    write_index: usize,
    read_index: usize,
}

impl<const N: usize> Default for Fifo<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Fifo<N> {
    pub const fn new() -> Self {
        assert!(N > 1);
        Self {
            buffer: [0; N],
            write_index: 0,
            read_index: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Number of bytes waiting to be read.
    pub fn read_available(&self) -> usize {
        let write_index = self.write_index;
        if write_index < self.read_index {
            N - self.read_index + write_index
        } else {
            write_index - self.read_index
        }
    }

    /// Number of bytes that can be written without overwriting unread data.
    pub fn write_available(&self) -> usize {
        self.capacity() - self.read_available()
    }

    /// Reads up to `dest.len()` bytes and returns how many were read.
    pub fn read(&mut self, dest: &mut [u8]) -> usize {
        let count = dest.len().min(self.read_available());
        self.read_index = copy_out(&self.buffer, self.read_index, &mut dest[..count]);
        count
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        if self.read_available() == 0 {
            return None;
        }
        let byte = self.buffer[self.read_index];
        self.read_index = (self.read_index + 1) % N;
        Some(byte)
    }

    /// Writes all of `data` or nothing.
    pub fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        if data.len() > self.write_available() {
            #[cfg(feature = "defmt")]
            trace!("fifo: overflow, {} bytes dropped", data.len());
            return Err(Error::Overflow);
        }
        self.write_index = copy_in(&mut self.buffer, self.write_index, data);
        Ok(())
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<(), Error> {
        if self.write_available() == 0 {
            return Err(Error::Overflow);
        }
        self.buffer[self.write_index] = byte;
        self.write_index = (self.write_index + 1) % N;
        Ok(())
    }

    /// Discards all unread bytes.
    pub fn clear(&mut self) {
        self.read_index = self.write_index;
    }
}
