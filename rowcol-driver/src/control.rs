//! Convenience functions to read/write
//!  the various control registers and to
//!  move patterns in and out of pattern RAM
//!
//!  For the mapping of registers/addresses,
//!  see `registers.rs`
//!

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use indicatif::ProgressBar;

use rowcol_lib::{
  DriverError,
  PatternBuffer,
  RegisterSettings,
};

use crate::memory::FpgaMemoryMap;
use crate::registers::*;

/// The FPGA needs at least this long between two
/// pattern RAM writes to settle
pub const MIN_WRITE_PACING : Duration = Duration::from_micros(25);

/// Pacing from the configured value, never below
/// the hardware minimum
pub fn write_pacing(pacing_us : u64) -> Duration {
  let pacing = Duration::from_micros(pacing_us);
  if pacing < MIN_WRITE_PACING {
    warn!("Write pacing of {pacing_us}us is below the hardware minimum, using {:?}", MIN_WRITE_PACING);
    return MIN_WRITE_PACING;
  }
  pacing
}

/// Read-modify-write: set a single control bit
pub fn set_control_bit(map : &mut FpgaMemoryMap, bit : ControlBit) -> Result<(), DriverError> {
  trace!("Set {bit}");
  let value = map.read_register(bit.register())?;
  map.write_register(bit.register(), value | bit.mask())?;
  Ok(())
}

/// Read-modify-write: clear a single control bit
pub fn clear_control_bit(map : &mut FpgaMemoryMap, bit : ControlBit) -> Result<(), DriverError> {
  trace!("Clear {bit}");
  let value = map.read_register(bit.register())?;
  map.write_register(bit.register(), value & !bit.mask())?;
  Ok(())
}

pub fn control_bit_is_set(map : &FpgaMemoryMap, bit : ControlBit) -> Result<bool, DriverError> {
  let value = map.read_register(bit.register())?;
  Ok((value & bit.mask()) > 0)
}

/// Set a control bit given by name.
/// Unknown names fail before the register is touched.
pub fn set_control_bit_by_name(map : &mut FpgaMemoryMap, name : &str) -> Result<(), DriverError> {
  let bit = name.parse::<ControlBit>()?;
  set_control_bit(map, bit)
}

/// Clear a control bit given by name.
/// Unknown names fail before the register is touched.
pub fn clear_control_bit_by_name(map : &mut FpgaMemoryMap, name : &str) -> Result<(), DriverError> {
  let bit = name.parse::<ControlBit>()?;
  clear_control_bit(map, bit)
}

pub fn enable_continuous_drive(map : &mut FpgaMemoryMap) -> Result<(), DriverError> {
  info!("Enable continuous drive");
  set_control_bit(map, ControlBit::ContinuousDriveEnable)
}

pub fn disable_continuous_drive(map : &mut FpgaMemoryMap) -> Result<(), DriverError> {
  info!("Disable continuous drive");
  clear_control_bit(map, ControlBit::ContinuousDriveEnable)
}

/// Get the firmware version
pub fn get_version(map : &FpgaMemoryMap) -> Result<u32, DriverError> {
  map.read_register(VERSION)
}

/// Bring the control registers into their
/// operational state
///
/// Procedure
/// clear the irq (0 to CONIFER_ISR)
/// write the timing values, starting with the control register
/// write the row select masks
/// write the data valid delay
pub fn initialize_registers(map : &mut FpgaMemoryMap, settings : &RegisterSettings) -> Result<(), DriverError> {
  info!("Initializing aperture control registers");
  map.write_register(CONIFER_ISR, 0)?;

  map.write_register(CTRL_REG,                    settings.ctrl_reg)?;
  map.write_register(STX_CLK_MATCH_VAL,           settings.stx_clk_match_val)?;
  map.write_register(SUPPLY_SWITCH_DLY_MATCH_VAL, settings.supply_switch_dly_match_val)?;
  map.write_register(GATE_DLY_MATCH_VAL,          settings.gate_dly_match_val)?;
  map.write_register(TOTAL_SHIFT_AMT,             settings.total_shift_amt)?;
  map.write_register(START_CYCLE_DLY_MATCH_VAL,   settings.start_cycle_dly_match_val)?;
  map.write_register(SCK_MATCH_VAL,               settings.sck_match_val)?;

  for (reg, value) in ROW_SEL.iter().zip(settings.row_sel.iter()) {
    map.write_register(*reg, *value)?;
  }
  map.write_register(WAIT_FOR_DATA_VALID_MATCH_VAL, settings.wait_for_data_valid_match_val)?;

  let version = get_version(map)?;
  let start   = map.read_register(START_CYCLE_DLY_MATCH_VAL)?;
  info!("Firmware version {version:#x}, start_cycle_dly_match_val = {start}");
  Ok(())
}

/// Write 0 into every word of pattern RAM
pub fn zero_pattern_ram(map : &mut FpgaMemoryMap) -> Result<(), DriverError> {
  debug!("Zeroing pattern RAM");
  let mut region = map.pattern_region();
  for k in 0..region.len() {
    region.write_word(k, 0)?;
  }
  Ok(())
}

/// Read back the first n_words of pattern RAM
pub fn read_pattern_ram(map : &mut FpgaMemoryMap, n_words : usize) -> Result<Vec<u32>, DriverError> {
  let region = map.pattern_region();
  if n_words > region.len() {
    error!("Can't read {n_words} words, pattern RAM has {}!", region.len());
    return Err(DriverError::OutOfBounds);
  }
  let mut words = Vec::<u32>::with_capacity(n_words);
  for k in 0..n_words {
    words.push(region.read_word(k)?);
  }
  Ok(words)
}

/// Copy words into pattern RAM starting at word
/// `offset`, one word at a time with a pause after
/// each word.
///
/// The block is bounds checked before the first
/// write. The stop flag is only checked between two
/// words, a started word write always completes.
///
/// # Arguments
///
/// * offset   : first pattern RAM word to write
/// * words    : the block
/// * pacing   : pause after every word, at least MIN_WRITE_PACING
/// * stop     : abort the transfer when set
/// * progress : optional bar, advanced by one per word
///
/// Returns the number of words written.
pub fn write_pattern_block(map      : &mut FpgaMemoryMap,
                           offset   : usize,
                           words    : &[u32],
                           pacing   : Duration,
                           stop     : &AtomicBool,
                           progress : Option<&ProgressBar>) -> Result<usize, DriverError> {
  let pacing     = pacing.max(MIN_WRITE_PACING);
  let mut region = map.pattern_region();
  region.check_block(offset, words.len())?;
  debug!("Writing {} words into pattern RAM at word {offset}, pacing {:?}", words.len(), pacing);
  for (k, word) in words.iter().enumerate() {
    if stop.load(Ordering::Relaxed) {
      warn!("Pattern RAM write interrupted after {k} of {} words!", words.len());
      return Err(DriverError::WriteInterrupted);
    }
    region.write_word(offset + k, *word)?;
    if let Some(bar) = progress {
      bar.inc(1);
    }
    thread::sleep(pacing);
  }
  Ok(words.len())
}

/// Copy a packed buffer into pattern RAM from word 0,
/// paced like `write_pattern_block`
pub fn commit_pattern_buffer(map      : &mut FpgaMemoryMap,
                             buffer   : &PatternBuffer,
                             pacing   : Duration,
                             stop     : &AtomicBool,
                             progress : Option<&ProgressBar>) -> Result<usize, DriverError> {
  write_pattern_block(map, 0, buffer.words(), pacing, stop, progress)
}

#[cfg(test)]
mod tests {
  use super::*;
  use rowcol_lib::constants::{
    PATTERN_RAM_WORDS,
    WINDOW_SIZE,
  };

  fn fake_device() -> tempfile::NamedTempFile {
    let device = tempfile::NamedTempFile::new().unwrap();
    device.as_file().set_len(WINDOW_SIZE as u64).unwrap();
    device
  }

  #[test]
  fn pacing_never_below_minimum() {
    assert_eq!(write_pacing(0),   MIN_WRITE_PACING);
    assert_eq!(write_pacing(10),  MIN_WRITE_PACING);
    assert_eq!(write_pacing(100), Duration::from_micros(100));
  }

  #[test]
  fn drive_enable_read_modify_write() {
    let device  = fake_device();
    let mut map = FpgaMemoryMap::open(device.path().to_str().unwrap()).unwrap();
    map.write_register(CTRL_REG, 0xa5a5_0000).unwrap();
    enable_continuous_drive(&mut map).unwrap();
    assert_eq!(map.read_register(CTRL_REG).unwrap(), 0xa5a5_0001);
    assert!(control_bit_is_set(&map, ControlBit::ContinuousDriveEnable).unwrap());
    disable_continuous_drive(&mut map).unwrap();
    assert_eq!(map.read_register(CTRL_REG).unwrap(), 0xa5a5_0000);
    assert!(!control_bit_is_set(&map, ControlBit::ContinuousDriveEnable).unwrap());
    map.close().unwrap();
  }

  #[test]
  fn unknown_control_bit_leaves_register_alone() {
    let device  = fake_device();
    let mut map = FpgaMemoryMap::open(device.path().to_str().unwrap()).unwrap();
    map.write_register(CTRL_REG, 0x0000_00f0).unwrap();
    assert_eq!(set_control_bit_by_name(&mut map, "Diagonal"),   Err(DriverError::UnknownControlBit));
    assert_eq!(clear_control_bit_by_name(&mut map, "Diagonal"), Err(DriverError::UnknownControlBit));
    assert_eq!(map.read_register(CTRL_REG).unwrap(), 0x0000_00f0);
    set_control_bit_by_name(&mut map, "ContinuousDriveEnable").unwrap();
    assert_eq!(map.read_register(CTRL_REG).unwrap(), 0x0000_00f1);
    map.close().unwrap();
  }

  #[test]
  fn initialize_writes_register_settings() {
    let device   = fake_device();
    let mut map  = FpgaMemoryMap::open(device.path().to_str().unwrap()).unwrap();
    let settings = RegisterSettings::new();
    map.write_register(CONIFER_ISR, 1).unwrap();
    initialize_registers(&mut map, &settings).unwrap();
    assert_eq!(map.read_register(CONIFER_ISR).unwrap(), 0);
    assert_eq!(map.read_register(GATE_DLY_MATCH_VAL).unwrap(), 119);
    assert_eq!(map.read_register(START_CYCLE_DLY_MATCH_VAL).unwrap(), 7200);
    assert_eq!(map.read_register(ROW_SEL_3).unwrap(), 0xff00_0000);
    assert_eq!(map.read_register(WAIT_FOR_DATA_VALID_MATCH_VAL).unwrap(), 2399);
    map.close().unwrap();
  }

  #[test]
  fn commit_and_read_back() {
    let device  = fake_device();
    let mut map = FpgaMemoryMap::open(device.path().to_str().unwrap()).unwrap();
    let buffer  = PatternBuffer::from_words((0..40u32).map(|k| k << 8).collect());
    let stop    = AtomicBool::new(false);
    let written = commit_pattern_buffer(&mut map, &buffer, MIN_WRITE_PACING, &stop, None).unwrap();
    assert_eq!(written, 40);
    let readback = read_pattern_ram(&mut map, 40).unwrap();
    assert!(buffer.mismatches(&readback).is_empty());
    zero_pattern_ram(&mut map).unwrap();
    assert!(read_pattern_ram(&mut map, 40).unwrap().iter().all(|w| *w == 0));
    assert_eq!(read_pattern_ram(&mut map, PATTERN_RAM_WORDS + 1).err(), Some(DriverError::OutOfBounds));
    map.close().unwrap();
  }

  #[test]
  fn stop_flag_interrupts_commit() {
    let device  = fake_device();
    let mut map = FpgaMemoryMap::open(device.path().to_str().unwrap()).unwrap();
    let buffer  = PatternBuffer::from_words(vec![0xffff_ffff; 8]);
    let stop    = AtomicBool::new(true);
    let result  = commit_pattern_buffer(&mut map, &buffer, MIN_WRITE_PACING, &stop, None);
    assert_eq!(result, Err(DriverError::WriteInterrupted));
    // nothing written, the flag was set before the first word
    assert_eq!(read_pattern_ram(&mut map, 1).unwrap(), vec![0]);
    map.close().unwrap();
  }

  #[test]
  fn oversized_buffer_is_rejected() {
    let device  = fake_device();
    let mut map = FpgaMemoryMap::open(device.path().to_str().unwrap()).unwrap();
    let buffer  = PatternBuffer::new(PATTERN_RAM_WORDS + 1);
    let stop    = AtomicBool::new(false);
    let result  = commit_pattern_buffer(&mut map, &buffer, MIN_WRITE_PACING, &stop, None);
    assert_eq!(result, Err(DriverError::OutOfBounds));
    map.close().unwrap();
  }

  #[test]
  fn commit_pauses_after_every_word() {
    let device  = fake_device();
    let mut map = FpgaMemoryMap::open(device.path().to_str().unwrap()).unwrap();
    let buffer  = PatternBuffer::from_words(vec![0x0100_0100; 200]);
    let stop    = AtomicBool::new(false);
    let start   = std::time::Instant::now();
    commit_pattern_buffer(&mut map, &buffer, MIN_WRITE_PACING, &stop, None).unwrap();
    assert!(start.elapsed() >= MIN_WRITE_PACING * 200);
    // a shorter pacing is raised to the minimum
    let start   = std::time::Instant::now();
    commit_pattern_buffer(&mut map, &buffer, Duration::ZERO, &stop, None).unwrap();
    assert!(start.elapsed() >= MIN_WRITE_PACING * 200);
    map.close().unwrap();
  }

  #[test]
  fn block_write_at_offset() {
    let device  = fake_device();
    let mut map = FpgaMemoryMap::open(device.path().to_str().unwrap()).unwrap();
    let stop    = AtomicBool::new(false);
    let written = write_pattern_block(&mut map, 10, &[0xff00_0000, 0x0000_ff00], MIN_WRITE_PACING, &stop, None).unwrap();
    assert_eq!(written, 2);
    let words   = read_pattern_ram(&mut map, 13).unwrap();
    assert_eq!(&words[9..], &[0u32, 0xff00_0000, 0x0000_ff00, 0][..]);
    let result = write_pattern_block(&mut map, PATTERN_RAM_WORDS - 1, &[1, 2], MIN_WRITE_PACING, &stop, None);
    assert_eq!(result, Err(DriverError::OutOfBounds));
    assert_eq!(read_pattern_ram(&mut map, PATTERN_RAM_WORDS).unwrap()[PATTERN_RAM_WORDS - 1], 0);
    map.close().unwrap();
  }
}
