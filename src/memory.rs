use util::Endian;
use byteorder::ByteOrder;

/// Represents a memory storage unit with basic read and write operations.
pub trait Storage {
    /// Returns the total length of the storage in bytes.
    ///
    /// It is not guaranteed that every address within the range `[0..length]` is accessible.
    /// Use [`check_range`] to test if a certain address range is addressable.
    ///
    /// # Examples
    /// ```
    /// use m20_sim::{Storage, Memory};
    ///
    /// let memory = Memory::new(16);
    /// assert_eq!(memory.length(), 16);
    /// ```
    /// [`check_range`]: ./trait.Storage.html#tymethod.check_range
    fn length(&self) -> u32;

    /// Checks whether the range `[address..address+length]` is addressable within the storage.
    ///
    /// # Examples
    /// ```
    /// use m20_sim::{Storage, Memory};
    ///
    /// let memory = Memory::new(16);
    /// assert_eq!(memory.check_range(4, 12), true);
    /// assert_eq!(memory.check_range(10, 20), false);
    /// ```
    fn check_range(&self, address: u32, length: u32) -> bool;

    /// Immutably borrows a slice from the address range specified by `address` and `length`.
    ///
    /// # Errors
    /// Returns an error if the range `[address..address+length]` is not addressable.
    ///
    /// # Examples
    /// ```
    /// use m20_sim::{Storage, Memory};
    ///
    /// let memory = Memory::from(&[1, 2, 3, 4][..]);
    /// assert_eq!(memory.borrow_slice(1, 2), Ok(&[2, 3][..]));
    /// assert_eq!(memory.borrow_slice(2, 4), Err(()));
    /// ```
    fn borrow_slice(&self, address: u32, length: u32) -> Result<&[u8], ()>;

    /// Mutably borrows a slice from the address range specified by `address` and `length`.
    ///
    /// # Errors
    /// Returns an error if the range `[address..address+length]` is not addressable.
    ///
    /// # Examples
    /// ```
    /// use m20_sim::{Storage, Memory};
    ///
    /// let mut memory = Memory::from(&[1, 2, 3, 4][..]);
    /// assert_eq!(memory.borrow_slice_mut(2, 2), Ok(&mut[3, 4][..]));
    /// assert_eq!(memory.borrow_slice_mut(0, 5), Err(()));
    /// ```
    fn borrow_slice_mut(&mut self, address: u32, length: u32) -> Result<&mut [u8], ()>;

    /// Reads the amount of bytes specified by `size` starting at the specified address, and
    /// converts the result to an unsigned integer.
    ///
    /// The conversion is always performed with the endianness defined by [`util::Endian`]
    /// (big-endian, §6.2/§4.5).
    ///
    /// # Panics
    /// Panics if `size < 1` or `size > 4`.
    ///
    /// # Errors
    /// Returns an error if the range `[address..address+length]` is not addressable.
    fn read(&self, address: u32, size: u32) -> Result<u32, ()> {
        assert!(size >= 1 && size <= 4);
        Ok(Endian::read_uint(self.borrow_slice(address, size)?, size as usize) as u32)
    }

    /// Reads one byte at `address`.
    fn read_byte(&self, address: u32) -> Result<u8, ()> {
        Ok(self.borrow_slice(address, 1)?[0])
    }

    /// Reads a big-endian 16-bit half-word at `address`.
    fn read_half(&self, address: u32) -> Result<u16, ()> {
        Ok(Endian::read_u16(self.borrow_slice(address, 2)?))
    }

    /// Reads a big-endian 32-bit word at `address`. Callers needing the
    /// simulator's alignment rule (§4.5: "misaligned word access → Data
    /// Abort") must check `address % 4 == 0` themselves; this trait does not
    /// enforce it so non-word accesses stay usable.
    fn read_word(&self, address: u32) -> Result<u32, ()> {
        Ok(Endian::read_u32(self.borrow_slice(address, 4)?))
    }

    /// Takes `size` bytes from `value` (starting at the least significant byte) and writes them
    /// to the specified `address`.
    ///
    /// # Errors
    /// Returns an error if the range `[address..address+size]` is not addressable.
    ///
    /// # Panics
    /// Panics if `size < 1` or `size > 4`, or if `value` is not representable with `size` bytes.
    fn write(&mut self, address: u32, size: u32, value: u32) -> Result<(), ()> {
        assert!(size >= 1 && size <= 4);
        Endian::write_uint(self.borrow_slice_mut(address, size)?, u64::from(value), size as usize);
        Ok(())
    }

    /// Writes one byte to `address`.
    fn write_byte(&mut self, address: u32, value: u8) -> Result<(), ()> {
        self.borrow_slice_mut(address, 1)?[0] = value;
        Ok(())
    }

    /// Writes a big-endian 16-bit half-word to `address`.
    fn write_half(&mut self, address: u32, value: u16) -> Result<(), ()> {
        Endian::write_u16(self.borrow_slice_mut(address, 2)?, value);
        Ok(())
    }

    /// Writes a big-endian 32-bit word to `address`.
    fn write_word(&mut self, address: u32, value: u32) -> Result<(), ()> {
        Endian::write_u32(self.borrow_slice_mut(address, 4)?, value);
        Ok(())
    }
}

/// A basic default implementation of the `Storage` trait: a contiguous flat
/// block of memory, the "fixed-size flat memory buffer" of §4.5.
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Constructs a new `Memory` of `length` bytes, all zeroed.
    pub fn new(length: u32) -> Memory {
        Memory { data: vec![0; length as usize] }
    }

    /// Loads an executable image at address 0, zero-extending if the image
    /// is shorter than the backing buffer.
    ///
    /// # Panics
    /// Panics if `image` is longer than the backing buffer.
    pub fn load_image(length: u32, image: &[u8]) -> Memory {
        let mut data = vec![0; length as usize];
        data[..image.len()].copy_from_slice(image);
        Memory { data }
    }

    /// Returns the internal block of memory as an immutable slice.
    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }
}

impl Storage for Memory {
    fn length(&self) -> u32 {
        self.data.len() as u32
    }

    fn check_range(&self, address: u32, length: u32) -> bool {
        let len = self.data.len() as u32;
        address <= len && (address + length) <= len
    }

    fn borrow_slice(&self, address: u32, length: u32) -> Result<&[u8], ()> {
        if self.check_range(address, length) {
            Ok(&self.data[address as usize..(address + length) as usize])
        } else {
            Err(())
        }
    }

    fn borrow_slice_mut(&mut self, address: u32, length: u32) -> Result<&mut [u8], ()> {
        if self.check_range(address, length) {
            Ok(&mut self.data[address as usize..(address + length) as usize])
        } else {
            Err(())
        }
    }
}

impl<'a> From<&'a [u8]> for Memory {
    fn from(s: &'a [u8]) -> Memory {
        Memory { data: Vec::from(s) }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn read_write_word_roundtrip() {
        let mut memory = Memory::new(8);
        memory.write_word(4, 0xDEAD_BEEF).unwrap();
        assert_eq!(memory.read_word(4), Ok(0xDEAD_BEEF));
    }

    #[test]
    fn out_of_range_access_is_an_error() {
        let memory = Memory::new(4);
        assert_eq!(memory.read_word(1), Err(()));
        assert_eq!(memory.read_byte(4), Err(()));
    }

    #[test]
    fn load_image_zero_extends_short_images() {
        let memory = Memory::load_image(8, &[1, 2, 3, 4]);
        assert_eq!(memory.data(), &[1, 2, 3, 4, 0, 0, 0, 0]);
    }
}
