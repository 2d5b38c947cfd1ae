//! Higher level functions, to get a pattern
//! from a name or steering angles all the way
//! into pattern RAM.
//!
//! `RowColDriver` owns the board tables, the
//! settings and the (optional) mapping of the
//! device. All hardware access goes through
//! its mutex, so it can be shared between threads.

use std::path::{Path,
                PathBuf};
use std::sync::{Arc,
                Mutex,
                MutexGuard};
use std::sync::atomic::AtomicBool;

use indicatif::ProgressBar;
use ndarray::Array2;

use rowcol_lib::io::{
  write_matrix_csv,
  write_wave_csv,
  write_words_csv,
  MASK_CSV,
  MATRIX_CSV,
  WAVE_CSV,
  DESIRED_PATTERN_CSV,
  ACTUAL_PATTERN_CSV,
};
use rowcol_lib::{
  BoardConfig,
  DriverError,
  DriverSettings,
  MatrixBuilder,
  ModulationCalculator,
  PatternBuffer,
  PatternFormatter,
  PatternKind,
  PatternSelection,
  WaveModulation,
  build_mask,
};

use crate::control;
use crate::memory::FpgaMemoryMap;
use crate::registers::ControlBit;

/// Everything which is computed for a pattern
/// before the hardware gets touched
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedPattern {
  pub selection : PatternSelection,
  pub matrix    : Array2<u8>,
  pub buffer    : PatternBuffer,
  /// only for wave equation patterns
  pub wave      : Option<WaveModulation>,
}

pub struct RowColDriver {
  settings : DriverSettings,
  board    : BoardConfig,
  hw       : Mutex<Option<FpgaMemoryMap>>,
  last     : Mutex<Option<PreparedPattern>>,
  stop     : Arc<AtomicBool>,
}

impl RowColDriver {

  pub fn new(settings : DriverSettings, board : BoardConfig) -> Result<Self, DriverError> {
    board.validate()?;
    Ok(Self {
      settings,
      board,
      hw   : Mutex::new(None),
      last : Mutex::new(None),
      stop : Arc::new(AtomicBool::new(false)),
    })
  }

  /// Load the board tables given in the settings
  pub fn from_settings(settings : DriverSettings) -> Result<Self, DriverError> {
    let board = BoardConfig::from_json_file(Path::new(&settings.board_config))?;
    Self::new(settings, board)
  }

  pub fn settings(&self) -> &DriverSettings {
    &self.settings
  }

  pub fn board(&self) -> &BoardConfig {
    &self.board
  }

  /// Setting this flag aborts a running commit
  /// at the next word
  pub fn stop_flag(&self) -> Arc<AtomicBool> {
    Arc::clone(&self.stop)
  }

  fn hw(&self) -> MutexGuard<'_, Option<FpgaMemoryMap>> {
    match self.hw.lock() {
      Ok(guard) => guard,
      Err(poisoned) => {
        warn!("Hardware lock was poisoned, continuing with the current mapping!");
        poisoned.into_inner()
      }
    }
  }

  fn last(&self) -> MutexGuard<'_, Option<PreparedPattern>> {
    match self.last.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner()
    }
  }

  /// Run f on the mapped device
  fn with_map<T, F>(&self, f : F) -> Result<T, DriverError>
    where F : FnOnce(&mut FpgaMemoryMap) -> Result<T, DriverError> {
    match self.hw().as_mut() {
      None => {
        error!("The device is not mapped!");
        Err(DriverError::NotMapped)
      }
      Some(map) => f(map)
    }
  }

  pub fn is_mapped(&self) -> bool {
    self.hw().is_some()
  }

  /// Map the device given in the settings.
  /// Mapping twice keeps the first mapping.
  pub fn map_memory(&self) -> Result<(), DriverError> {
    let mut hw = self.hw();
    if hw.is_some() {
      warn!("{} is already mapped!", self.settings.device_path);
      return Ok(());
    }
    *hw = Some(FpgaMemoryMap::open(&self.settings.device_path)?);
    Ok(())
  }

  pub fn unmap_memory(&self) -> Result<(), DriverError> {
    match self.hw().take() {
      None => {
        error!("Can't unmap, the device is not mapped!");
        Err(DriverError::NotMapped)
      }
      Some(map) => map.close()
    }
  }

  /// Compute matrix and packed buffer for a selection.
  /// Does not need the hardware.
  pub fn prepare(&self, selection : PatternSelection) -> Result<PreparedPattern, DriverError> {
    let builder = MatrixBuilder::new(&self.board)?;
    let (matrix, wave) = match selection {
      PatternSelection::Canned(kind) => (builder.build_matrix(kind), None),
      PatternSelection::WaveEquation { theta, phi, phase } => {
        let calc   = ModulationCalculator::new(&self.board, &self.settings.wave)?;
        let wave   = calc.compute(theta, phi, phase)?;
        let matrix = builder.build_from_levels(&wave.levels)?;
        (matrix, Some(wave))
      }
    };
    let buffer = PatternFormatter::new(&self.board)?.format(&matrix)?;
    debug!("Prepared pattern {selection} with {} active cells on", matrix.iter().filter(|v| **v > 0).count());
    Ok(PreparedPattern { selection, matrix, buffer, wave })
  }

  /// Like `prepare`, from a pattern name
  /// ("all on", "all off", "checkerboard", "wave equation")
  pub fn prepare_named(&self,
                       name   : &str,
                       angles : Option<(f64, f64, f64)>) -> Result<PreparedPattern, DriverError> {
    self.prepare(PatternSelection::from_name(name, angles)?)
  }

  /// Write a prepared pattern into pattern RAM
  pub fn commit(&self,
                prepared : &PreparedPattern,
                progress : Option<&ProgressBar>) -> Result<usize, DriverError> {
    let pacing = control::write_pacing(self.settings.write_pacing_us);
    let written = self.with_map(|map| {
      control::commit_pattern_buffer(map, &prepared.buffer, pacing, &self.stop, progress)
    })?;
    info!("Committed pattern {} ({written} words)", prepared.selection);
    Ok(written)
  }

  /// Prepare, commit and remember a pattern. All
  /// validation is done before pattern RAM gets
  /// touched.
  pub fn apply(&self,
               selection : PatternSelection,
               progress  : Option<&ProgressBar>) -> Result<PreparedPattern, DriverError> {
    if !self.is_mapped() {
      error!("Can't apply {selection}, the device is not mapped!");
      return Err(DriverError::NotMapped);
    }
    let prepared = self.prepare(selection)?;
    self.commit(&prepared, progress)?;
    if self.settings.dump_dir.is_some() {
      self.dump(&prepared);
    }
    *self.last() = Some(prepared.clone());
    Ok(prepared)
  }

  pub fn apply_named(&self,
                     name     : &str,
                     angles   : Option<(f64, f64, f64)>,
                     progress : Option<&ProgressBar>) -> Result<PreparedPattern, DriverError> {
    let selection = PatternSelection::from_name(name, angles)?;
    self.apply(selection, progress)
  }

  /// The pattern which was last written
  /// successfully, if any
  pub fn last_pattern(&self) -> Option<PreparedPattern> {
    self.last().clone()
  }

  pub fn set_control_bit(&self, name : &str) -> Result<(), DriverError> {
    let bit = name.parse::<ControlBit>()?;
    self.with_map(|map| control::set_control_bit(map, bit))
  }

  pub fn clear_control_bit(&self, name : &str) -> Result<(), DriverError> {
    let bit = name.parse::<ControlBit>()?;
    self.with_map(|map| control::clear_control_bit(map, bit))
  }

  pub fn control_bit_is_set(&self, bit : ControlBit) -> Result<bool, DriverError> {
    self.with_map(|map| control::control_bit_is_set(map, bit))
  }

  pub fn enable_drive(&self) -> Result<(), DriverError> {
    self.with_map(control::enable_continuous_drive)
  }

  pub fn disable_drive(&self) -> Result<(), DriverError> {
    self.with_map(control::disable_continuous_drive)
  }

  pub fn read_register(&self, offset : u32) -> Result<u32, DriverError> {
    self.with_map(|map| map.read_register(offset))
  }

  pub fn write_register(&self, offset : u32, value : u32) -> Result<(), DriverError> {
    self.with_map(|map| map.write_register(offset, value))
  }

  pub fn initialize_registers(&self) -> Result<(), DriverError> {
    self.with_map(|map| control::initialize_registers(map, &self.settings.registers))
  }

  pub fn zero_pattern_ram(&self) -> Result<(), DriverError> {
    self.with_map(control::zero_pattern_ram)
  }

  pub fn read_pattern_ram(&self, n_words : usize) -> Result<Vec<u32>, DriverError> {
    self.with_map(|map| control::read_pattern_ram(map, n_words))
  }

  /// Read the pattern back and return the indices
  /// of all words which differ from the buffer
  pub fn verify(&self, prepared : &PreparedPattern) -> Result<Vec<usize>, DriverError> {
    let actual     = self.read_pattern_ram(prepared.buffer.len())?;
    let mismatches = prepared.buffer.mismatches(&actual);
    if mismatches.is_empty() {
      info!("Pattern RAM matches {}", prepared.selection);
    } else {
      warn!("{} words of pattern RAM differ from {}!", mismatches.len(), prepared.selection);
    }
    Ok(mismatches)
  }

  /// Like `verify`, but any differing word is an error
  pub fn check_readback(&self, prepared : &PreparedPattern) -> Result<(), DriverError> {
    let mismatches = self.verify(prepared)?;
    if !mismatches.is_empty() {
      error!("Pattern RAM readback differs in {} of {} words, first at word {}!",
             mismatches.len(), prepared.buffer.len(), mismatches[0]);
      return Err(DriverError::VerifyFailed);
    }
    Ok(())
  }

  /// Write a block of words into pattern RAM at
  /// word `offset`, with the configured pacing
  pub fn write_pattern_block(&self, offset : usize, words : &[u32]) -> Result<usize, DriverError> {
    let pacing = control::write_pacing(self.settings.write_pacing_us);
    self.with_map(|map| {
      control::write_pattern_block(map, offset, words, pacing, &self.stop, None)
    })
  }

  /// Bring the panel up from scratch
  ///
  /// map the device (if needed), zero pattern RAM,
  /// write the startup registers, commit the
  /// all off pattern and enable continuous drive
  pub fn initialize(&self, progress : Option<&ProgressBar>) -> Result<(), DriverError> {
    self.map_memory()?;
    self.zero_pattern_ram()?;
    self.initialize_registers()?;
    self.apply(PatternSelection::Canned(PatternKind::AllOff), progress)?;
    self.enable_drive()?;
    info!("Aperture initialized, continuous drive enabled");
    Ok(())
  }

  /// csv diagnostics of a committed pattern.
  /// Failures are only logged.
  fn dump(&self, prepared : &PreparedPattern) {
    let dir = match &self.settings.dump_dir {
      None      => return,
      Some(dir) => PathBuf::from(dir),
    };
    let mut results = vec![
      build_mask(&self.board).and_then(|mask| write_matrix_csv(&dir.join(MASK_CSV), &mask)),
      write_matrix_csv(&dir.join(MATRIX_CSV), &prepared.matrix),
      write_words_csv(&dir.join(DESIRED_PATTERN_CSV), prepared.buffer.words()),
    ];
    if let Some(wave) = &prepared.wave {
      results.push(write_wave_csv(&dir.join(WAVE_CSV), wave));
    }
    match self.read_pattern_ram(prepared.buffer.len()) {
      Err(err)   => results.push(Err(err)),
      Ok(actual) => results.push(write_words_csv(&dir.join(ACTUAL_PATTERN_CSV), &actual)),
    }
    for result in results {
      if let Err(err) = result {
        warn!("Diagnostic dump into {} incomplete! {err}", dir.display());
      }
    }
  }
}
