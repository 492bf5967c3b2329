//! CRC-16 checksum carried in every packet trailer.
//!
//! CRC-16/CCITT-FALSE: polynomial 0x1021, initial value 0xFFFF, no
//! reflection, no final XOR.
//!
//! # Example
//!
//! ```rust
//! use gimbalcomm::Crc16;
//!
//! let checksum = Crc16::compute(b"123456789");
//! assert_eq!(checksum, 0x29B1);
//! assert!(Crc16::verify(b"123456789", checksum));
//! ```

const CRC16_POLYNOMIAL: u16 = 0x1021;

const CRC16_INIT: u16 = 0xFFFF;

/// Lookup table generated at compile time.
const CRC16_TABLE: [u16; 256] = generate_crc16_table();

const fn generate_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut j = 0;

        while j < 8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ CRC16_POLYNOMIAL;
            } else {
                crc <<= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Incremental CRC-16 calculator.
///
/// The packet assembler feeds it one byte at a time as bytes arrive, so a
/// complete packet is verified without a second pass over the buffer.
#[derive(Debug, Clone, Copy)]
pub struct Crc16 {
    state: u16,
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc16 {
    /// Creates a calculator in its initial state.
    #[inline]
    pub const fn new() -> Self {
        Self { state: CRC16_INIT }
    }

    /// Folds a single byte into the checksum.
    #[inline]
    pub fn update_byte(&mut self, byte: u8) {
        let index = ((self.state >> 8) ^ byte as u16) & 0xFF;
        self.state = (self.state << 8) ^ CRC16_TABLE[index as usize];
    }

    /// Folds a slice into the checksum.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.update_byte(byte);
        }
    }

    /// Returns the checksum of everything fed so far.
    #[inline]
    pub const fn finalize(self) -> u16 {
        self.state
    }

    /// Computes the checksum of `data` in one call.
    #[inline]
    pub fn compute(data: &[u8]) -> u16 {
        let mut crc = Self::new();
        crc.update(data);
        crc.finalize()
    }

    /// Verifies that `data` matches `expected`.
    #[inline]
    pub fn verify(data: &[u8], expected: u16) -> bool {
        Self::compute(data) == expected
    }

    /// Returns the calculator to its initial state.
    #[inline]
    pub fn reset(&mut self) {
        self.state = CRC16_INIT;
    }
}
