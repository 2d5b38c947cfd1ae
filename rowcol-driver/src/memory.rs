//! Memory mapping of the aperture control FPGA
//!
//! The FPGA exposes its control registers and the
//! pattern RAM through a single device node
//! (/dev/aperture-control). We map 16 pages of it:
//!
//! 0x0000 - 0x7fff : control registers
//! 0x8000 - 0xffff : pattern RAM
//!
//! All accesses are 32bit and volatile.

extern crate memmap;

use std::fs::File;
use std::ptr;

use memmap::{MmapMut,
             MmapOptions};

use rowcol_lib::constants::{
  PATTERN_RAM_OFFSET,
  PATTERN_RAM_WORDS,
  SIZEOF_U32,
  WINDOW_SIZE,
};
use rowcol_lib::DriverError;

pub const DEFAULT_DEVICE : &'static str = "/dev/aperture-control";

/// Owner of the mapped hardware window
///
/// There is exactly one of these per device. Dropping
/// it unmaps the window and then closes the file,
/// `close` does the same but reports problems.
pub struct FpgaMemoryMap {
  // field order matters: the mapping is dropped
  // before the file is closed
  mmap : MmapMut,
  file : File,
  path : String,
}

impl FpgaMemoryMap {

  /// Open the device read-write and map the
  /// whole window at offset 0
  pub fn open(path : &str) -> Result<Self, DriverError> {
    let file = match File::options()
      .read(true)
      .write(true)
      .open(path) {
      Err(err) => {
        error!("Cannot open device file {path}! {err}");
        return Err(DriverError::OpenFailed);
      }
      Ok(file) => file
    };
    let mmap = unsafe {
      MmapOptions::new()
        .offset(0)
        .len(WINDOW_SIZE)
        .map_mut(&file)
    };
    match mmap {
      Err(err) => {
        error!("mmap of {path} failed! {err}");
        drop(file);
        Err(DriverError::MapFailed)
      }
      Ok(mmap) => {
        info!("Mapped {} bytes of {path}", WINDOW_SIZE);
        Ok(Self {
          mmap,
          file,
          path : String::from(path),
        })
      }
    }
  }

  /// Unmap the window and close the device
  ///
  /// The mapping gets synced (msync, MS_ASYNC) before
  /// it is released. UnmapFailed means that this sync
  /// failed; the window is still unmapped and the file
  /// closed. A failing munmap itself can not be seen
  /// here, memmap drops the mapping without reporting.
  pub fn close(self) -> Result<(), DriverError> {
    let FpgaMemoryMap { mmap, file, path } = self;
    let synced = mmap.flush_async();
    drop(mmap);
    drop(file);
    match synced {
      Err(err) => {
        error!("Teardown of the mapping of {path} failed! {err}");
        Err(DriverError::UnmapFailed)
      }
      Ok(_) => {
        info!("Unmapped {path}");
        Ok(())
      }
    }
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  /// Registers are 32bit wide and 4 byte aligned and
  /// live below the pattern RAM
  fn check_register(offset : u32) -> Result<usize, DriverError> {
    let offset = offset as usize;
    if offset % SIZEOF_U32 != 0 || offset + SIZEOF_U32 > PATTERN_RAM_OFFSET {
      error!("Register offset {offset:#x} is not a register!");
      return Err(DriverError::OutOfBounds);
    }
    Ok(offset)
  }

  /// Get a single value from a 32bit (1 word) register
  ///
  /// # Arguments:
  ///
  /// * offset : byte offset of the register from
  ///            the start of the window
  pub fn read_register(&self, offset : u32) -> Result<u32, DriverError> {
    let offset = Self::check_register(offset)?;
    let value : u32;
    unsafe {
      let p = self.mmap.as_ptr().add(offset) as *const u32;
      value = ptr::read_volatile(p);
    }
    Ok(value)
  }

  pub fn write_register(&mut self, offset : u32, value : u32) -> Result<(), DriverError> {
    let offset = Self::check_register(offset)?;
    trace!("Write {value:#010x} to register {offset:#x}");
    unsafe {
      let p = self.mmap.as_mut_ptr().add(offset) as *mut u32;
      ptr::write_volatile(p, value);
    }
    Ok(())
  }

  /// Word view on the pattern RAM half of the window
  pub fn pattern_region(&mut self) -> PatternRegion<'_> {
    PatternRegion {
      ram : &mut self.mmap[PATTERN_RAM_OFFSET..],
    }
  }
}

/// Bounds checked 32bit access to pattern RAM
pub struct PatternRegion<'a> {
  ram : &'a mut [u8],
}

impl<'a> PatternRegion<'a> {

  /// Capacity in 32bit words
  pub fn len(&self) -> usize {
    self.ram.len() / SIZEOF_U32
  }

  pub fn is_empty(&self) -> bool {
    self.ram.is_empty()
  }

  fn check_index(&self, index : usize) -> Result<(), DriverError> {
    if index >= self.len() {
      error!("Pattern RAM word {index} beyond the {} words of the window!", PATTERN_RAM_WORDS);
      return Err(DriverError::OutOfBounds);
    }
    Ok(())
  }

  pub fn read_word(&self, index : usize) -> Result<u32, DriverError> {
    self.check_index(index)?;
    let value : u32;
    unsafe {
      let p = self.ram.as_ptr() as *const u32;
      value = ptr::read_volatile(p.add(index));
    }
    Ok(value)
  }

  pub fn write_word(&mut self, index : usize, value : u32) -> Result<(), DriverError> {
    self.check_index(index)?;
    unsafe {
      let p = self.ram.as_mut_ptr() as *mut u32;
      ptr::write_volatile(p.add(index), value);
    }
    Ok(())
  }

  /// Check that words [offset, offset + n_words) are
  /// all inside the region
  pub fn check_block(&self, offset : usize, n_words : usize) -> Result<(), DriverError> {
    match offset.checked_add(n_words) {
      Some(end) if end <= self.len() => Ok(()),
      _ => {
        error!("Block of {n_words} words at word {offset} does not fit into {} words of pattern RAM!", self.len());
        Err(DriverError::OutOfBounds)
      }
    }
  }

  /// Write a block of words starting at word `offset`.
  /// Nothing is written unless the whole block fits.
  pub fn write_block(&mut self, offset : usize, words : &[u32]) -> Result<(), DriverError> {
    self.check_block(offset, words.len())?;
    for (k, word) in words.iter().enumerate() {
      self.write_word(offset + k, *word)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  /// A regular file of window size stands in
  /// for the device node
  fn fake_device() -> tempfile::NamedTempFile {
    let device = tempfile::NamedTempFile::new().unwrap();
    device.as_file().set_len(WINDOW_SIZE as u64).unwrap();
    device
  }

  #[test]
  fn open_missing_device() {
    let result = FpgaMemoryMap::open("/nonexistent/aperture-control");
    assert_eq!(result.err(), Some(DriverError::OpenFailed));
  }

  #[cfg(target_os = "linux")]
  #[test]
  fn unmappable_device() {
    // /dev/null can be opened but not mapped
    let result = FpgaMemoryMap::open("/dev/null");
    assert_eq!(result.err(), Some(DriverError::MapFailed));
  }

  #[test]
  fn register_write_read() {
    let device  = fake_device();
    let mut map = FpgaMemoryMap::open(device.path().to_str().unwrap()).unwrap();
    map.write_register(0x14, 7200).unwrap();
    map.write_register(0x7ffc, 0xdead_beef).unwrap();
    assert_eq!(map.read_register(0x14).unwrap(), 7200);
    assert_eq!(map.read_register(0x7ffc).unwrap(), 0xdead_beef);
    assert_eq!(map.read_register(0x0).unwrap(), 0);
    map.close().unwrap();
  }

  #[test]
  fn register_bounds() {
    let device  = fake_device();
    let mut map = FpgaMemoryMap::open(device.path().to_str().unwrap()).unwrap();
    assert_eq!(map.read_register(0x8000).err(),   Some(DriverError::OutOfBounds));
    assert_eq!(map.read_register(0x2).err(),      Some(DriverError::OutOfBounds));
    assert_eq!(map.write_register(0x1_0000, 1).err(), Some(DriverError::OutOfBounds));
    map.close().unwrap();
  }

  #[test]
  fn pattern_region_is_behind_the_registers() {
    let device  = fake_device();
    let mut map = FpgaMemoryMap::open(device.path().to_str().unwrap()).unwrap();
    {
      let mut region = map.pattern_region();
      assert_eq!(region.len(), PATTERN_RAM_WORDS);
      region.write_word(0, 0xff00_ff00).unwrap();
      region.write_word(PATTERN_RAM_WORDS - 1, 0x0100_0100).unwrap();
      assert_eq!(region.read_word(0).unwrap(), 0xff00_ff00);
      assert_eq!(region.write_word(PATTERN_RAM_WORDS, 1).err(), Some(DriverError::OutOfBounds));
    }
    // registers are untouched
    assert_eq!(map.read_register(0x7ffc).unwrap(), 0);
    map.close().unwrap();

    // and the data ended up at the pattern RAM offset of the device
    let content = std::fs::read(device.path()).unwrap();
    let first   = u32::from_ne_bytes(content[PATTERN_RAM_OFFSET..PATTERN_RAM_OFFSET + 4].try_into().unwrap());
    assert_eq!(first, 0xff00_ff00);
  }

  #[test]
  fn block_write_is_all_or_nothing() {
    let device  = fake_device();
    let mut map = FpgaMemoryMap::open(device.path().to_str().unwrap()).unwrap();
    {
      let mut region = map.pattern_region();
      region.write_block(100, &[0x0100, 0x0200, 0x0300]).unwrap();
      assert_eq!(region.read_word(99).unwrap(),  0);
      assert_eq!(region.read_word(100).unwrap(), 0x0100);
      assert_eq!(region.read_word(102).unwrap(), 0x0300);
      assert_eq!(region.read_word(103).unwrap(), 0);
      // the tail does not fit, so the head is not written either
      let last = PATTERN_RAM_WORDS - 1;
      assert_eq!(region.write_block(last, &[0xffff_ffff, 0xffff_ffff]).err(), Some(DriverError::OutOfBounds));
      assert_eq!(region.read_word(last).unwrap(), 0);
      assert_eq!(region.write_block(usize::MAX, &[1]).err(), Some(DriverError::OutOfBounds));
    }
    map.close().unwrap();
  }
}
