//! Collaborator contracts the stores are built on. Chip support code implements these traits,
//! tests implement them over plain memory.

use crate::error::Error;
use embedded_storage::nor_flash::NorFlash;

/// Directly addressable, page-erasable flash.
///
/// `PAGE_SIZE` is the erase granularity and `ROW_SIZE` the programming granularity. Both mirror
/// `NorFlash::ERASE_SIZE` and `NorFlash::WRITE_SIZE`, but rows are programmed one at a time and
/// completion is observed through [`Nvm::is_busy`].
pub trait Nvm {
    type Error;

    const PAGE_SIZE: usize;
    const ROW_SIZE: usize;

    /// Starts erasing the page at `address`. `address` must be page aligned.
    fn page_erase(&mut self, address: u32) -> Result<(), Self::Error>;

    /// Starts programming one row at `address`. `row.len()` equals `ROW_SIZE`.
    fn row_write(&mut self, address: u32, row: &[u8]) -> Result<(), Self::Error>;

    /// True while an erase or row write is still in progress.
    fn is_busy(&mut self) -> bool;

    fn read(&mut self, address: u32, bytes: &mut [u8]) -> Result<(), Self::Error>;
}

impl<T: Nvm> Nvm for &mut T {
    type Error = T::Error;

    const PAGE_SIZE: usize = T::PAGE_SIZE;
    const ROW_SIZE: usize = T::ROW_SIZE;

    fn page_erase(&mut self, address: u32) -> Result<(), Self::Error> {
        (*self).page_erase(address)
    }

    fn row_write(&mut self, address: u32, row: &[u8]) -> Result<(), Self::Error> {
        (*self).row_write(address, row)
    }

    fn is_busy(&mut self) -> bool {
        (*self).is_busy()
    }

    fn read(&mut self, address: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        (*self).read(address, bytes)
    }
}

/// Byte level I2C master. One call per bus condition or byte, so callers can implement
/// acknowledge polling and page splitting themselves.
pub trait I2cBus {
    type Error;

    fn start(&mut self) -> Result<(), Self::Error>;

    fn stop(&mut self) -> Result<(), Self::Error>;

    /// Sends a byte and returns true if the client acknowledged it.
    fn send(&mut self, byte: u8) -> Result<bool, Self::Error>;

    /// Receives a byte and answers with ACK (`true`) or NACK (`false`).
    fn receive(&mut self, ack: bool) -> Result<u8, Self::Error>;
}

impl<T: I2cBus> I2cBus for &mut T {
    type Error = T::Error;

    fn start(&mut self) -> Result<(), Self::Error> {
        (*self).start()
    }

    fn stop(&mut self) -> Result<(), Self::Error> {
        (*self).stop()
    }

    fn send(&mut self, byte: u8) -> Result<bool, Self::Error> {
        (*self).send(byte)
    }

    fn receive(&mut self, ack: bool) -> Result<u8, Self::Error> {
        (*self).receive(ack)
    }
}

/// Free running, monotonically increasing tick counter.
pub trait TickSource {
    fn ticks(&mut self) -> u64;

    fn ticks_per_second(&self) -> u64;
}

impl<T: TickSource> TickSource for &mut T {
    fn ticks(&mut self) -> u64 {
        (*self).ticks()
    }

    fn ticks_per_second(&self) -> u64 {
        (**self).ticks_per_second()
    }
}

/// A point in time, `timeout_ms` after creation, measured in ticks of one [`TickSource`].
pub(crate) struct Deadline(u64);

impl Deadline {
    pub(crate) fn after_ms<T: TickSource>(ticks: &mut T, timeout_ms: u32) -> Self {
        let timeout = (timeout_ms as u64).saturating_mul(ticks.ticks_per_second()) / 1000;
        Self(ticks.ticks().saturating_add(timeout))
    }

    pub(crate) fn expired<T: TickSource>(&self, ticks: &mut T) -> bool {
        ticks.ticks() > self.0
    }
}

/// Reads shorter than `READ_SIZE` are bounced through a stack buffer of this size.
const MAX_READ_SIZE: usize = 32;

/// Runs a [`crate::PageStore`] on top of any `embedded-storage` [`NorFlash`].
///
/// `NorFlash` operations block until done, so [`Nvm::is_busy`] always reports false. Each page
/// is programmed in `ROW_SIZE` chunks.
pub struct NorFlashNvm<F, const ROW_SIZE: usize> {
    inner: F,
}

impl<F: NorFlash, const ROW_SIZE: usize> NorFlashNvm<F, ROW_SIZE> {
    pub fn new(inner: F) -> Result<Self, Error> {
        if ROW_SIZE == 0
            || !ROW_SIZE.is_multiple_of(F::WRITE_SIZE)
            || !F::ERASE_SIZE.is_multiple_of(ROW_SIZE)
            || F::READ_SIZE > MAX_READ_SIZE
        {
            return Err(Error::InvalidGeometry);
        }
        Ok(Self { inner })
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

impl<F: NorFlash, const ROW_SIZE: usize> Nvm for NorFlashNvm<F, ROW_SIZE> {
    type Error = F::Error;

    const PAGE_SIZE: usize = F::ERASE_SIZE;
    const ROW_SIZE: usize = ROW_SIZE;

    fn page_erase(&mut self, address: u32) -> Result<(), Self::Error> {
        self.inner.erase(address, address + F::ERASE_SIZE as u32)
    }

    fn row_write(&mut self, address: u32, row: &[u8]) -> Result<(), Self::Error> {
        self.inner.write(address, row)
    }

    fn is_busy(&mut self) -> bool {
        false
    }

    fn read(&mut self, address: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let aligned = bytes.len() / F::READ_SIZE * F::READ_SIZE;
        let (head, tail) = bytes.split_at_mut(aligned);
        if !head.is_empty() {
            self.inner.read(address, head)?;
        }
        if !tail.is_empty() {
            let mut bounce = [0u8; MAX_READ_SIZE];
            let bounce = &mut bounce[..F::READ_SIZE];
            self.inner.read(address + aligned as u32, bounce)?;
            tail.copy_from_slice(&bounce[..tail.len()]);
        }
        Ok(())
    }
}
