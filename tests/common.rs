#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};
use nvm_store::platform::{I2cBus, Nvm, TickSource};

pub const TICKS_PER_SECOND: u64 = 1_000_000;

/// Microsecond ticks advancing by `step` on every read.
pub struct Ticks {
    pub now: u64,
    pub step: u64,
}

impl Ticks {
    pub fn new() -> Self {
        Self { now: 0, step: 10 }
    }
}

impl TickSource for Ticks {
    fn ticks(&mut self) -> u64 {
        let now = self.now;
        self.now += self.step;
        now
    }

    fn ticks_per_second(&self) -> u64 {
        TICKS_PER_SECOND
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Read { address: u32, len: usize },
    RowWrite { address: u32, len: usize },
    PageErase { address: u32 },
}

/// Flash with `PAGE` byte pages and `ROW` byte rows. Every erase and row write keeps the flash
/// busy for `busy_polls` calls to `is_busy`, or forever if `stuck` is set. Once
/// `fail_after_operation` operations are logged every further operation fails.
pub struct Flash<const PAGE: usize, const ROW: usize> {
    pub buf: Vec<u8>,
    pub operations: Vec<Operation>,
    pub busy_polls: usize,
    pub stuck: bool,
    pub busy_checks: usize,
    pub fail_after_operation: usize,
    busy: usize,
}

impl<const PAGE: usize, const ROW: usize> Flash<PAGE, ROW> {
    pub fn new(pages: usize) -> Self {
        Self::new_with_fault(pages, usize::MAX)
    }

    pub fn new_with_fault(pages: usize, fail_after_operation: usize) -> Self {
        Self {
            buf: vec![0xFF; PAGE * pages],
            operations: Vec::new(),
            busy_polls: 0,
            stuck: false,
            busy_checks: 0,
            fail_after_operation,
            busy: 0,
        }
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
    }

    fn fault(&self) -> Result<(), FlashError> {
        if self.operations.len() >= self.fail_after_operation {
            println!("    flash: FAULT");
            return Err(FlashError);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn last_page(&self) -> u32 {
        (self.buf.len() - PAGE) as u32
    }

    pub fn erases(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::PageErase { .. }))
            .count()
    }

    pub fn row_writes(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::RowWrite { .. }))
            .count()
    }

    fn start_busy(&mut self) {
        self.busy = self.busy_polls;
    }
}

#[derive(Debug)]
pub struct FlashError;

impl<const PAGE: usize, const ROW: usize> Nvm for Flash<PAGE, ROW> {
    type Error = FlashError;

    const PAGE_SIZE: usize = PAGE;
    const ROW_SIZE: usize = ROW;

    fn page_erase(&mut self, address: u32) -> Result<(), Self::Error> {
        assert!((address as usize).is_multiple_of(PAGE));
        assert_eq!(self.busy, 0, "erase while busy");

        println!("    flash: erase: 0x{address:04X} #{:>2}", self.operations.len());
        self.fault()?;
        self.operations.push(Operation::PageErase { address });

        let address = address as usize;
        self.buf[address..address + PAGE].fill(0xFF);
        self.start_busy();
        Ok(())
    }

    fn row_write(&mut self, address: u32, row: &[u8]) -> Result<(), Self::Error> {
        assert!((address as usize).is_multiple_of(ROW));
        assert_eq!(row.len(), ROW);
        assert_eq!(self.busy, 0, "write while busy");

        println!(
            "    flash: write: 0x{address:04X}[0x{:04X}] #{:>2}",
            row.len(),
            self.operations.len()
        );
        self.fault()?;
        self.operations.push(Operation::RowWrite {
            address,
            len: row.len(),
        });

        let address = address as usize;
        for (i, &val) in row.iter().enumerate() {
            // flash bits can only be flipped from 1 to 0
            self.buf[address + i] &= val;
        }
        self.start_busy();
        Ok(())
    }

    fn is_busy(&mut self) -> bool {
        self.busy_checks += 1;
        if self.stuck {
            return true;
        }
        if self.busy > 0 {
            self.busy -= 1;
            return true;
        }
        false
    }

    fn read(&mut self, address: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.fault()?;
        self.operations.push(Operation::Read {
            address,
            len: bytes.len(),
        });

        let address = address as usize;
        bytes.copy_from_slice(&self.buf[address..address + bytes.len()]);
        Ok(())
    }
}

pub const NOR_SECTOR_SIZE: usize = 256;
pub const NOR_WORD_SIZE: usize = 4;

/// Word aligned NOR flash behind the `embedded-storage` traits.
#[derive(Default)]
pub struct NorFlashMock {
    pub buf: Vec<u8>,
    pub erases: usize,
}

impl NorFlashMock {
    pub fn new(sectors: usize) -> Self {
        Self {
            buf: vec![0xFF; NOR_SECTOR_SIZE * sectors],
            erases: 0,
        }
    }
}

#[derive(Debug)]
pub struct NorError;

impl NorFlashError for NorError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

impl ErrorType for NorFlashMock {
    type Error = NorError;
}

impl ReadNorFlash for NorFlashMock {
    const READ_SIZE: usize = NOR_WORD_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::READ_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::READ_SIZE));

        let offset = offset as usize;
        bytes.copy_from_slice(&self.buf[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl NorFlash for NorFlashMock {
    const WRITE_SIZE: usize = NOR_WORD_SIZE;

    const ERASE_SIZE: usize = NOR_SECTOR_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        assert!(from.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(to.is_multiple_of(Self::ERASE_SIZE as _));

        self.erases += 1;
        self.buf[from as usize..to as usize].fill(0xFF);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::WRITE_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::WRITE_SIZE));

        let offset = offset as usize;
        for (i, &val) in bytes.iter().enumerate() {
            self.buf[offset + i] &= val;
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum BusOperation {
    Start,
    Stop,
    Send { byte: u8, ack: bool },
    Receive { byte: u8, ack: bool },
}

#[derive(Debug, PartialEq, Clone, Copy)]
enum State {
    Idle,
    Control,
    AddressHigh,
    AddressLow,
    Write,
    Read,
    Ignored,
}

/// A 24xx EEPROM on the bus. Bytes written in one transaction are buffered and committed on
/// stop, wrapping inside the addressed page. After each commit the device refuses its address
/// for `busy_polls` attempts, or forever if `stuck` is set. `refuse_reads` makes it NACK the read
/// address only.
///
/// Once `fail_after_operation` bus operations are logged, every further byte transfer fails.
/// Start and stop conditions keep working, like a data line fault during a transfer.
pub struct Eeprom {
    pub memory: Vec<u8>,
    pub page_size: usize,
    pub client_address: u8,
    pub operations: Vec<BusOperation>,
    pub busy_polls: usize,
    pub stuck: bool,
    pub refuse_reads: bool,
    pub page_writes: usize,
    pub fail_after_operation: usize,
    busy: usize,
    state: State,
    pointer: usize,
    pending: Vec<(usize, u8)>,
}

impl Eeprom {
    pub fn new(size: usize, page_size: usize) -> Self {
        Self::new_with_fault(size, page_size, usize::MAX)
    }

    pub fn new_with_fault(size: usize, page_size: usize, fail_after_operation: usize) -> Self {
        Self {
            memory: vec![0xFF; size],
            page_size,
            client_address: 0x50,
            operations: Vec::new(),
            busy_polls: 0,
            stuck: false,
            refuse_reads: false,
            page_writes: 0,
            fail_after_operation,
            busy: 0,
            state: State::Idle,
            pointer: 0,
            pending: Vec::new(),
        }
    }

    pub fn starts(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| **op == BusOperation::Start)
            .count()
    }

    pub fn stops(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| **op == BusOperation::Stop)
            .count()
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
    }

    fn fault(&self) -> Result<(), BusFault> {
        if self.operations.len() >= self.fail_after_operation {
            println!("    eeprom: FAULT");
            return Err(BusFault);
        }
        Ok(())
    }

    fn accept(&mut self, byte: u8) -> bool {
        match self.state {
            State::Control => {
                if byte >> 1 != self.client_address || self.stuck {
                    self.state = State::Ignored;
                    return false;
                }
                if self.busy > 0 {
                    self.busy -= 1;
                    self.state = State::Ignored;
                    return false;
                }
                if byte & 1 == 1 && self.refuse_reads {
                    self.state = State::Ignored;
                    return false;
                }
                self.state = if byte & 1 == 0 {
                    State::AddressHigh
                } else {
                    State::Read
                };
                true
            }
            State::AddressHigh => {
                self.pointer = (byte as usize) << 8;
                self.state = State::AddressLow;
                true
            }
            State::AddressLow => {
                self.pointer = (self.pointer | byte as usize) % self.memory.len();
                self.state = State::Write;
                true
            }
            State::Write => {
                self.pending.push((self.pointer, byte));
                let page_start = self.pointer - self.pointer % self.page_size;
                self.pointer = page_start + (self.pointer + 1) % self.page_size;
                true
            }
            State::Idle | State::Read | State::Ignored => false,
        }
    }
}

#[derive(Debug)]
pub struct BusFault;

impl I2cBus for Eeprom {
    type Error = BusFault;

    fn start(&mut self) -> Result<(), Self::Error> {
        // a start without stop aborts a pending page write
        self.pending.clear();
        self.state = State::Control;
        self.operations.push(BusOperation::Start);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Self::Error> {
        if self.state == State::Write && !self.pending.is_empty() {
            for (address, byte) in self.pending.drain(..) {
                self.memory[address] = byte;
            }
            self.page_writes += 1;
            self.busy = self.busy_polls;
        }
        self.state = State::Idle;
        self.operations.push(BusOperation::Stop);
        Ok(())
    }

    fn send(&mut self, byte: u8) -> Result<bool, Self::Error> {
        self.fault()?;
        let ack = self.accept(byte);
        self.operations.push(BusOperation::Send { byte, ack });
        Ok(ack)
    }

    fn receive(&mut self, ack: bool) -> Result<u8, Self::Error> {
        self.fault()?;
        let byte = if self.state == State::Read {
            let byte = self.memory[self.pointer];
            self.pointer = (self.pointer + 1) % self.memory.len();
            byte
        } else {
            0xFF
        };
        self.operations.push(BusOperation::Receive { byte, ack });
        Ok(byte)
    }
}

/// Formatter sink that accepts `limit` bytes and fails on the first write past that.
pub struct FailingWriter {
    pub limit: usize,
    pub written: String,
}

impl FailingWriter {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            written: String::new(),
        }
    }
}

impl core::fmt::Write for FailingWriter {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        if self.written.len() + s.len() > self.limit {
            return Err(core::fmt::Error);
        }
        self.written.push_str(s);
        Ok(())
    }
}

/// Deterministic filler so tests do not depend on a random number generator.
pub fn pattern(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (state >> 16) as u8
        })
        .collect()
}
