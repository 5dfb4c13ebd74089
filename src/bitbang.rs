//! Software I2C master on two open-drain GPIOs.
//!
//! Both lines must be configured as open-drain with pull-ups, so that driving a pin high
//! releases the line. SCL clock stretching is not supported.

use crate::platform::I2cBus;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin, PinState};

/// The line whose pin reported an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinError {
    Scl,
    Sda,
}

pub struct BitBangI2c<SCL, SDA, D> {
    scl: SCL,
    sda: SDA,
    delay: D,
    half_period_us: u32,
}

impl<SCL, SDA, D> BitBangI2c<SCL, SDA, D>
where
    SCL: OutputPin,
    SDA: OutputPin + InputPin,
    D: DelayNs,
{
    /// Roughly 250 kHz once pin toggling overhead is added.
    pub const DEFAULT_HALF_PERIOD_US: u32 = 2;

    pub fn new(scl: SCL, sda: SDA, delay: D) -> Self {
        Self {
            scl,
            sda,
            delay,
            half_period_us: Self::DEFAULT_HALF_PERIOD_US,
        }
    }

    pub fn with_half_period_us(mut self, half_period_us: u32) -> Self {
        self.half_period_us = half_period_us;
        self
    }

    pub fn release(self) -> (SCL, SDA, D) {
        (self.scl, self.sda, self.delay)
    }

    /// Clocks SCL up to nine times until a client holding SDA low lets go of it.
    pub fn bus_clear(&mut self) -> Result<(), PinError> {
        for _ in 0..9 {
            self.wait();
            // stop as soon as SDA is released, it may get stuck again otherwise
            if self.sda_is_high()? {
                break;
            }
            self.set_scl(false)?;
            self.wait();
            self.set_scl(true)?;
        }
        Ok(())
    }

    pub fn repeated_start(&mut self) -> Result<(), PinError> {
        self.set_scl(false)?;
        self.set_sda(true)?;
        self.wait();
        self.set_scl(true)?;
        self.wait();
        self.set_sda(false)?;
        self.wait();
        self.set_scl(false)
    }

    fn wait(&mut self) {
        self.delay.delay_us(self.half_period_us);
    }

    fn set_scl(&mut self, high: bool) -> Result<(), PinError> {
        self.scl
            .set_state(PinState::from(high))
            .map_err(|_| PinError::Scl)
    }

    fn set_sda(&mut self, high: bool) -> Result<(), PinError> {
        self.sda
            .set_state(PinState::from(high))
            .map_err(|_| PinError::Sda)
    }

    fn sda_is_high(&mut self) -> Result<bool, PinError> {
        self.sda.is_high().map_err(|_| PinError::Sda)
    }
}

impl<SCL, SDA, D> I2cBus for BitBangI2c<SCL, SDA, D>
where
    SCL: OutputPin,
    SDA: OutputPin + InputPin,
    D: DelayNs,
{
    type Error = PinError;

    fn start(&mut self) -> Result<(), Self::Error> {
        self.set_scl(true)?;
        self.set_sda(true)?;
        self.wait();
        self.set_sda(false)?;
        self.wait();
        self.set_scl(false)
    }

    fn stop(&mut self) -> Result<(), Self::Error> {
        self.set_sda(false)?;
        self.wait();
        self.set_scl(true)?;
        self.wait();
        self.set_sda(true)
    }

    fn send(&mut self, byte: u8) -> Result<bool, Self::Error> {
        for bit in (0..8).rev() {
            self.set_sda(byte & (1 << bit) != 0)?;
            self.wait();
            self.set_scl(true)?;
            self.wait();
            self.set_scl(false)?;
        }

        // release SDA and sample the acknowledge
        self.set_sda(true)?;
        self.wait();
        self.set_scl(true)?;
        self.wait();
        let ack = !self.sda_is_high()?;
        self.set_scl(false)?;
        self.set_sda(false)?;
        Ok(ack)
    }

    fn receive(&mut self, ack: bool) -> Result<u8, Self::Error> {
        self.set_sda(true)?;
        let mut byte = 0;
        for bit in (0..8).rev() {
            self.wait();
            self.set_scl(true)?;
            self.wait();
            if self.sda_is_high()? {
                byte |= 1 << bit;
            }
            self.set_scl(false)?;
        }

        self.set_sda(!ack)?;
        self.wait();
        self.set_scl(true)?;
        self.wait();
        self.set_scl(false)?;
        Ok(byte)
    }
}
