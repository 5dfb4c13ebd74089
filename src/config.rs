//! Device geometry and timing used by the stores.

use crate::error::Error;
use crate::print::LINE_LENGTH;

/// Largest address space reachable with two address bytes.
const MAX_EEPROM_SIZE: u32 = 0x1_0000;

/// Largest page a [`crate::ByteStore`] can stage on the stack.
pub(crate) const MAX_EEPROM_PAGE_SIZE: u32 = 128;

/// Geometry and timing of an I2C EEPROM with two byte addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ByteStoreConfig {
    /// 7-bit client address
    pub client_address: u8,
    /// Size in bytes, a multiple of `page_size`
    pub size: u32,
    /// Write page size in bytes
    pub page_size: u32,
    /// How long to keep polling for an acknowledge while the device commits a page
    pub ack_timeout_ms: u32,
}

impl ByteStoreConfig {
    /// Default client address with all address pins tied low.
    pub const DEFAULT_CLIENT_ADDRESS: u8 = 0x50;

    /// Covers the worst case page write time of the 24xx family.
    pub const DEFAULT_ACK_TIMEOUT_MS: u32 = 5;

    pub const fn new(size: u32, page_size: u32) -> Self {
        Self {
            client_address: Self::DEFAULT_CLIENT_ADDRESS,
            size,
            page_size,
            ack_timeout_ms: Self::DEFAULT_ACK_TIMEOUT_MS,
        }
    }

    pub const fn for_24xx32() -> Self {
        Self::new(0x1000, 32)
    }

    pub const fn for_24xx64() -> Self {
        Self::new(0x2000, 32)
    }

    pub const fn for_24xx128() -> Self {
        Self::new(0x4000, 64)
    }

    pub const fn for_24xx256() -> Self {
        Self::new(0x8000, 64)
    }

    pub const fn for_24xx512() -> Self {
        Self::new(0x1_0000, 128)
    }

    pub const fn with_client_address(mut self, client_address: u8) -> Self {
        self.client_address = client_address;
        self
    }

    pub const fn with_ack_timeout_ms(mut self, ack_timeout_ms: u32) -> Self {
        self.ack_timeout_ms = ack_timeout_ms;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.client_address > 0x7F {
            return Err(Error::InvalidAddress);
        }
        if self.page_size == 0
            || self.page_size > MAX_EEPROM_PAGE_SIZE
            || !self.page_size.is_multiple_of(LINE_LENGTH as u32)
            || self.size == 0
            || self.size > MAX_EEPROM_SIZE
            || !self.size.is_multiple_of(self.page_size)
        {
            return Err(Error::InvalidGeometry);
        }
        Ok(())
    }
}

impl Default for ByteStoreConfig {
    fn default() -> Self {
        Self::for_24xx32()
    }
}

/// Timing of a [`crate::PageStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PageStoreConfig {
    /// Upper bound for a single page erase or row write to complete
    pub busy_timeout_ms: u32,
}

impl PageStoreConfig {
    pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 100;
}

impl Default for PageStoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: Self::DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}
