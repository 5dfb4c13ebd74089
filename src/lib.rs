#![doc = include_str ! ("../README.md")]
#![cfg_attr(not(any(test, target_arch = "x86_64")), no_std)]

pub mod bitbang;
pub mod config;
pub mod eeprom;
pub mod error;
pub mod page;
pub mod platform;
pub mod print;
pub mod ring;

pub use bitbang::BitBangI2c;
pub use config::{ByteStoreConfig, PageStoreConfig};
pub use eeprom::ByteStore;
pub use error::Error;
pub use page::{Committed, PageStore, last_page_address};
pub use platform::{I2cBus, NorFlashNvm, Nvm, TickSource};
pub use ring::Fifo;
