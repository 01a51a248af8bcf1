//! Register-map I2C bus and no-op delay for driver tests.

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorType, I2c, Operation};

/// A single device whose registers live in a flat 256-byte map.
///
/// Writes set the register pointer from their first byte and store any
/// following bytes; reads return consecutive registers from the pointer.
/// `pointer_mask` strips command bits some devices fold into the address.
pub struct FakeI2c {
    pub address: u8,
    pub registers: [u8; 256],
    pub pointer_mask: u8,
    pub writes: Vec<(u8, u8)>,
    pointer: u8,
}

impl FakeI2c {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            registers: [0; 256],
            pointer_mask: 0xFF,
            writes: Vec::new(),
            pointer: 0,
        }
    }

    pub fn set(&mut self, register: u8, bytes: &[u8]) {
        let start = register as usize;
        self.registers[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Last value written to `register`, if any.
    pub fn written(&self, register: u8) -> Option<u8> {
        self.writes
            .iter()
            .rev()
            .find(|(reg, _)| *reg == register)
            .map(|(_, value)| *value)
    }
}

impl ErrorType for FakeI2c {
    type Error = Infallible;
}

impl I2c for FakeI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        assert_eq!(address, self.address, "unexpected I2C address");

        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    let Some((first, data)) = bytes.split_first() else {
                        continue;
                    };
                    self.pointer = first & self.pointer_mask;
                    for value in data {
                        self.registers[self.pointer as usize] = *value;
                        self.writes.push((self.pointer, *value));
                        self.pointer = self.pointer.wrapping_add(1);
                    }
                }
                Operation::Read(buffer) => {
                    for slot in buffer.iter_mut() {
                        *slot = self.registers[self.pointer as usize];
                        self.pointer = self.pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

pub struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}
