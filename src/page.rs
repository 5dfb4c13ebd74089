//! A single flash page used as application NVM, typically the last page of program flash.
//!
//! Flash endurance is in the order of 10,000 erase/write cycles. Data that rarely changes should
//! go through [`PageStore::update`], which skips the erase/write cycle if the page already holds
//! the data.

use crate::config::PageStoreConfig;
use crate::error::Error;
use crate::platform::{Deadline, Nvm, TickSource};
use crate::print::{LINE_LENGTH, is_blank, write_ellipsis_line, write_line};
use core::fmt::Write;
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

/// Outcome of a write-if-changed operation.
#[derive(strum::Display, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Committed {
    /// The stored data already matched, nothing was erased or written
    Unchanged,
    /// The data was erased and written
    Written,
}

/// Returns the address of the last page of a flash region. The linker script has to reserve
/// this page so that no code is placed there.
pub const fn last_page_address(flash_start: u32, flash_size: u32, page_size: u32) -> u32 {
    flash_start + flash_size - page_size
}

/// Owns one page of flash and a page sized scratch buffer used to stage writes and compare
/// updates.
pub struct PageStore<N: Nvm, T: TickSource, const PAGE_SIZE: usize> {
    nvm: N,
    ticks: T,
    base_address: u32,
    config: PageStoreConfig,
    buffer: [u8; PAGE_SIZE],
}

impl<N: Nvm, T: TickSource, const PAGE_SIZE: usize> PageStore<N, T, PAGE_SIZE> {
    pub fn new(
        nvm: N,
        ticks: T,
        base_address: u32,
        config: PageStoreConfig,
    ) -> Result<Self, Error> {
        if PAGE_SIZE != N::PAGE_SIZE
            || N::ROW_SIZE == 0
            || !PAGE_SIZE.is_multiple_of(N::ROW_SIZE)
            || !PAGE_SIZE.is_multiple_of(LINE_LENGTH)
            || PAGE_SIZE == 0
        {
            return Err(Error::InvalidGeometry);
        }

        if !(base_address as usize).is_multiple_of(PAGE_SIZE)
            || base_address.checked_add(PAGE_SIZE as u32).is_none()
        {
            return Err(Error::InvalidAddress);
        }

        Ok(Self {
            nvm,
            ticks,
            base_address,
            config,
            buffer: [0xFF; PAGE_SIZE],
        })
    }

    pub fn base_address(&self) -> u32 {
        self.base_address
    }

    /// Gives back the collaborators.
    pub fn release(self) -> (N, T) {
        (self.nvm, self.ticks)
    }

    /// Reads `destination.len()` bytes from the start of the page.
    pub fn read(&mut self, destination: &mut [u8]) -> Result<(), Error> {
        if destination.len() > PAGE_SIZE {
            return Err(Error::InvalidLength);
        }

        self.nvm
            .read(self.base_address, destination)
            .map_err(|_| Error::NvmError)
    }

    /// Erases the page and writes `data` to its start. The remainder of the page reads as 0xFF.
    pub fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        if data.len() > PAGE_SIZE {
            return Err(Error::InvalidLength);
        }

        self.erase()?;

        self.buffer.fill(0xFF);
        self.buffer[..data.len()].copy_from_slice(data);

        for offset in (0..PAGE_SIZE).step_by(N::ROW_SIZE) {
            let address = self.base_address + offset as u32;

            #[cfg(feature = "defmt")]
            trace!("row_write: @{:#08x}", address);

            #[cfg(feature = "debug-logs")]
            println!("  PageStore: row_write {address:#010x}");

            self.nvm
                .row_write(address, &self.buffer[offset..offset + N::ROW_SIZE])
                .map_err(|_| Error::NvmError)?;
            wait_until_ready(&mut self.nvm, &mut self.ticks, self.config.busy_timeout_ms)?;
        }

        Ok(())
    }

    /// Writes `data` only if it differs from what the page currently holds.
    pub fn update(&mut self, data: &[u8]) -> Result<Committed, Error> {
        if data.len() > PAGE_SIZE {
            return Err(Error::InvalidLength);
        }

        self.nvm
            .read(self.base_address, &mut self.buffer)
            .map_err(|_| Error::NvmError)?;

        let committed = if self.buffer[..data.len()] == *data {
            Committed::Unchanged
        } else {
            self.write(data)?;
            Committed::Written
        };

        #[cfg(feature = "defmt")]
        trace!("update: @{:#08x} {}", self.base_address, committed);

        #[cfg(feature = "debug-logs")]
        println!("  PageStore: update {committed}");

        Ok(committed)
    }

    pub fn erase(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("page_erase: @{:#08x}", self.base_address);

        #[cfg(feature = "debug-logs")]
        println!("  PageStore: page_erase {:#010x}", self.base_address);

        self.nvm
            .page_erase(self.base_address)
            .map_err(|_| Error::NvmError)?;
        wait_until_ready(&mut self.nvm, &mut self.ticks, self.config.busy_timeout_ms)
    }

    /// Dumps the page. The first and last line are always printed, every run of blank lines in
    /// between is collapsed into a single ellipsis line.
    pub fn print<W: Write>(&mut self, out: &mut W) -> Result<(), Error> {
        self.nvm
            .read(self.base_address, &mut self.buffer)
            .map_err(|_| Error::NvmError)?;

        let last_line = PAGE_SIZE - LINE_LENGTH;
        let mut print_ellipsis = true;
        for (index, line) in self.buffer.chunks(LINE_LENGTH).enumerate() {
            let offset = index * LINE_LENGTH;

            if offset == 0 || offset == last_line || !is_blank(line) {
                write_line(out, self.base_address + offset as u32, line)?;
                print_ellipsis = true;
                continue;
            }

            if print_ellipsis {
                write_ellipsis_line(out, line)?;
                print_ellipsis = false;
            }
        }

        Ok(())
    }
}

fn wait_until_ready<N: Nvm, T: TickSource>(
    nvm: &mut N,
    ticks: &mut T,
    timeout_ms: u32,
) -> Result<(), Error> {
    let deadline = Deadline::after_ms(ticks, timeout_ms);
    while nvm.is_busy() {
        if deadline.expired(ticks) {
            #[cfg(feature = "defmt")]
            warn!("nvm busy for more than {} ms", timeout_ms);

            return Err(Error::BusyTimeout);
        }
    }
    Ok(())
}
