//! Driver for Microchip 24xx32 to 24xx512 I2C EEPROM.
//!
//! The device only buffers writes within one page and its internal address pointer wraps at the
//! page end, so writes are split into one bus transaction per page. While a page is committed the
//! device does not acknowledge its address; every transaction starts with acknowledge polling
//! instead of waiting a fixed worst case write time.

use crate::config::{ByteStoreConfig, MAX_EEPROM_PAGE_SIZE};
use crate::error::Error;
use crate::platform::{Deadline, I2cBus, TickSource};
use crate::print::{LINE_LENGTH, is_blank, write_line};
use core::fmt::Write;
#[cfg(feature = "defmt")]
use defmt::{trace, warn};
use embedded_storage::{ReadStorage, Storage};

/// Address byte for a write transfer.
pub const fn client_address_write(address: u8) -> u8 {
    address << 1
}

/// Address byte for a read transfer.
pub const fn client_address_read(address: u8) -> u8 {
    (address << 1) | 1
}

pub struct ByteStore<B: I2cBus, T: TickSource> {
    bus: B,
    ticks: T,
    config: ByteStoreConfig,
}

impl<B: I2cBus, T: TickSource> ByteStore<B, T> {
    pub fn new(bus: B, ticks: T, config: ByteStoreConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self { bus, ticks, config })
    }

    pub fn config(&self) -> &ByteStoreConfig {
        &self.config
    }

    /// Gives back the collaborators.
    pub fn release(self) -> (B, T) {
        (self.bus, self.ticks)
    }

    /// Reads `destination.len()` bytes starting at `address`.
    ///
    /// The address pointer is set in a write transaction of its own, the data is then clocked
    /// out in a second transaction. The last byte is NACKed to end the transfer. A NACK of the
    /// read address is reported as `Error::AcknowledgeTimeout` as well.
    pub fn read(&mut self, address: u32, destination: &mut [u8]) -> Result<(), Error> {
        self.check_range(address, destination.len())?;
        if destination.is_empty() {
            return Ok(());
        }

        let mut acknowledged = self.transaction(|store| store.start_sequence(address))?;

        let control = client_address_read(self.config.client_address);
        acknowledged &= self.transaction(|store| {
            store.start()?;
            let acknowledged = store.send(control)?;
            let last = destination.len() - 1;
            for (index, byte) in destination.iter_mut().enumerate() {
                *byte = store.receive(index < last)?;
            }
            Ok(acknowledged)
        })?;

        if acknowledged {
            Ok(())
        } else {
            Err(Error::AcknowledgeTimeout { address })
        }
    }

    /// Writes `data` starting at `address`, one bus transaction per touched page.
    ///
    /// If the device does not acknowledge within the acknowledge-poll timeout the data is still
    /// sent, and `Error::AcknowledgeTimeout` is returned once the write is done.
    pub fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        self.check_range(address, data.len())?;

        let mut unacknowledged = None;
        let mut address = address;
        let mut remaining = data;
        while !remaining.is_empty() {
            let to_page_end = (self.config.page_size - address % self.config.page_size) as usize;
            let (chunk, rest) = remaining.split_at(to_page_end.min(remaining.len()));

            #[cfg(feature = "defmt")]
            trace!("write: @{:#06x}[{}]", address, chunk.len());

            #[cfg(feature = "debug-logs")]
            println!("  ByteStore: write {address:#06x}[{}]", chunk.len());

            let acknowledged = self.transaction(|store| {
                let acknowledged = store.start_sequence(address)?;
                for &byte in chunk {
                    store.send(byte)?;
                }
                Ok(acknowledged)
            })?;
            if !acknowledged {
                unacknowledged.get_or_insert(address);
            }

            address += chunk.len() as u32;
            remaining = rest;
        }

        finish(unacknowledged)
    }

    /// Writes `data` page by page, skipping every page chunk that already holds the data.
    ///
    /// Returns the number of page chunks actually written.
    pub fn update(&mut self, address: u32, data: &[u8]) -> Result<usize, Error> {
        self.check_range(address, data.len())?;

        let mut unacknowledged = None;
        let mut written = 0;
        let mut address = address;
        let mut remaining = data;
        let mut current = [0u8; MAX_EEPROM_PAGE_SIZE as usize];
        while !remaining.is_empty() {
            let to_page_end = (self.config.page_size - address % self.config.page_size) as usize;
            let (chunk, rest) = remaining.split_at(to_page_end.min(remaining.len()));
            let current = &mut current[..chunk.len()];

            note(self.read(address, current), &mut unacknowledged)?;
            if current != chunk {
                note(self.write(address, chunk), &mut unacknowledged)?;
                written += 1;
            }

            address += chunk.len() as u32;
            remaining = rest;
        }

        #[cfg(feature = "defmt")]
        trace!("update: {} page(s) written", written);

        finish(unacknowledged).map(|()| written)
    }

    /// Sets every byte to 0xFF, one page write at a time.
    pub fn erase_all(&mut self) -> Result<(), Error> {
        let blank = [0xFFu8; MAX_EEPROM_PAGE_SIZE as usize];
        let blank = &blank[..self.config.page_size as usize];

        let mut unacknowledged = None;
        for address in (0..self.config.size).step_by(self.config.page_size as usize) {
            note(self.write(address, blank), &mut unacknowledged)?;
        }
        finish(unacknowledged)
    }

    /// True if every byte reads as 0xFF.
    pub fn is_blank(&mut self) -> Result<bool, Error> {
        let mut page = [0u8; MAX_EEPROM_PAGE_SIZE as usize];
        let page = &mut page[..self.config.page_size as usize];

        let mut unacknowledged = None;
        for address in (0..self.config.size).step_by(page.len()) {
            note(self.read(address, page), &mut unacknowledged)?;
            if !is_blank(page) {
                return finish(unacknowledged).map(|()| false);
            }
        }
        finish(unacknowledged).map(|()| true)
    }

    /// Dumps the whole device, one line per 32 bytes.
    pub fn print<W: Write>(&mut self, out: &mut W) -> Result<(), Error> {
        let mut page = [0u8; MAX_EEPROM_PAGE_SIZE as usize];
        let page = &mut page[..self.config.page_size as usize];

        let mut unacknowledged = None;
        for address in (0..self.config.size).step_by(page.len()) {
            note(self.read(address, page), &mut unacknowledged)?;
            for (index, line) in page.chunks(LINE_LENGTH).enumerate() {
                write_line(out, address + (index * LINE_LENGTH) as u32, line)?;
            }
        }
        finish(unacknowledged)
    }

    /// Start condition and write address with acknowledge polling, followed by the two address
    /// bytes. Returns false if the device never acknowledged before the timeout; the address is
    /// sent regardless.
    fn start_sequence(&mut self, address: u32) -> Result<bool, Error> {
        let control = client_address_write(self.config.client_address);
        let deadline = Deadline::after_ms(&mut self.ticks, self.config.ack_timeout_ms);
        let acknowledged = loop {
            self.start()?;
            if self.send(control)? {
                break true;
            }
            if deadline.expired(&mut self.ticks) {
                #[cfg(feature = "defmt")]
                warn!("no acknowledge within {} ms @{:#06x}", self.config.ack_timeout_ms, address);

                #[cfg(feature = "debug-logs")]
                println!("  ByteStore: acknowledge timeout {address:#06x}");

                break false;
            }
        };

        self.send((address >> 8) as u8)?;
        self.send(address as u8)?;
        Ok(acknowledged)
    }

    /// Runs `body`, then sends a stop condition even if `body` failed. The first error wins.
    fn transaction<R>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let result = body(self);
        let stopped = self.stop();
        let value = result?;
        stopped?;
        Ok(value)
    }

    fn check_range(&self, address: u32, len: usize) -> Result<(), Error> {
        if address as u64 + len as u64 > self.config.size as u64 {
            return Err(Error::OutOfRange);
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), Error> {
        self.bus.start().map_err(|_| Error::BusError)
    }

    fn stop(&mut self) -> Result<(), Error> {
        self.bus.stop().map_err(|_| Error::BusError)
    }

    fn send(&mut self, byte: u8) -> Result<bool, Error> {
        self.bus.send(byte).map_err(|_| Error::BusError)
    }

    fn receive(&mut self, ack: bool) -> Result<u8, Error> {
        self.bus.receive(ack).map_err(|_| Error::BusError)
    }
}

/// Remembers the first unacknowledged address and lets every other error through.
fn note(result: Result<(), Error>, unacknowledged: &mut Option<u32>) -> Result<(), Error> {
    match result {
        Err(Error::AcknowledgeTimeout { address }) => {
            unacknowledged.get_or_insert(address);
            Ok(())
        }
        other => other,
    }
}

fn finish(unacknowledged: Option<u32>) -> Result<(), Error> {
    match unacknowledged {
        Some(address) => Err(Error::AcknowledgeTimeout { address }),
        None => Ok(()),
    }
}

impl<B: I2cBus, T: TickSource> ReadStorage for ByteStore<B, T> {
    type Error = Error;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        ByteStore::read(self, offset, bytes)
    }

    fn capacity(&self) -> usize {
        self.config.size as usize
    }
}

impl<B: I2cBus, T: TickSource> Storage for ByteStore<B, T> {
    /// Only pages whose content differs are written.
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.update(offset, bytes).map(|_| ())
    }
}
