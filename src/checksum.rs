/// Calculates the 8-bit additive checksum appended to RPLIDAR command frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct Checksum {
    current: u8,
}

impl Checksum {
    /// Creates a new `Checksum` instance, initialized to 0.
    #[inline]
    pub fn new() -> Checksum {
        Checksum { current: 0 }
    }

    /// Adds a slice of bytes to the running sum, wrapping at 256.
    #[inline]
    pub fn push_slice(&mut self, data: &[u8]) {
        for d in data {
            self.current = self.current.wrapping_add(*d);
        }
    }

    /// Returns the calculated checksum value.
    #[inline]
    pub fn checksum(&self) -> u8 {
        self.current
    }
}

/// XOR of all bytes, the integrity check embedded in dense measurement frames.
#[inline]
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, d| acc ^ d)
}
