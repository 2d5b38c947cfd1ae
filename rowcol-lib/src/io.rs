//! Diagnostic csv dumps
//!
//! Plain text files for cross checks against
//! the python reference implementation. Not
//! needed to drive the hardware.
//!

use std::fs::File;
use std::io::{
  self,
  BufWriter,
  Write,
};
use std::path::Path;

use ndarray::Array2;

use crate::errors::DriverError;
use crate::modulation::WaveModulation;

pub const MASK_CSV            : &str = "modMask.csv";
pub const MATRIX_CSV          : &str = "modBuffer.csv";
pub const WAVE_CSV            : &str = "waveModulation.csv";
pub const DESIRED_PATTERN_CSV : &str = "desiredPatternBuffer.csv";
pub const ACTUAL_PATTERN_CSV  : &str = "actualPatternBuffer.csv";

fn write_with<F>(path : &Path, fill : F) -> Result<(), DriverError>
  where F : FnOnce(&mut BufWriter<File>) -> io::Result<()> {
  let file = match File::create(path) {
    Err(err) => {
      error!("Unable to create {}! {}", path.display(), err);
      return Err(DriverError::IoError);
    }
    Ok(file) => file
  };
  let mut writer = BufWriter::new(file);
  match fill(&mut writer).and_then(|_| writer.flush()) {
    Err(err) => {
      error!("Unable to write {}! {}", path.display(), err);
      Err(DriverError::IoError)
    }
    Ok(_) => {
      debug!("Wrote {}", path.display());
      Ok(())
    }
  }
}

/// One matrix row per line, comma separated
pub fn write_matrix_csv(path : &Path, matrix : &Array2<u8>) -> Result<(), DriverError> {
  write_with(path, |writer| {
    for row in matrix.rows() {
      let line : Vec<String> = row.iter().map(|v| v.to_string()).collect();
      writeln!(writer, "{}", line.join(","))?;
    }
    Ok(())
  })
}

/// One word per line as 8 digit hex
pub fn write_words_csv(path : &Path, words : &[u32]) -> Result<(), DriverError> {
  write_with(path, |writer| {
    for word in words {
      writeln!(writer, "{:08x}", word)?;
    }
    Ok(())
  })
}

/// Raw amplitude and level for every active cell
pub fn write_wave_csv(path : &Path, wave : &WaveModulation) -> Result<(), DriverError> {
  write_with(path, |writer| {
    writeln!(writer, "cell,raw,level")?;
    for (k, (raw, level)) in wave.raw.iter().zip(&wave.levels).enumerate() {
      writeln!(writer, "{},{:.9},{}", k, raw, level)?;
    }
    Ok(())
  })
}

/// Read a hex word dump back in, e.g. to compare
/// a saved pattern RAM readback
pub fn read_words_csv(path : &Path) -> Result<Vec<u32>, DriverError> {
  let content = match std::fs::read_to_string(path) {
    Err(err) => {
      error!("Unable to read {}! {}", path.display(), err);
      return Err(DriverError::ConfigDecodingError);
    }
    Ok(content) => content
  };
  let mut words = Vec::<u32>::new();
  for (n, line) in content.lines().enumerate() {
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    match u32::from_str_radix(line, 16) {
      Err(err) => {
        error!("Line {} of {} is not a hex word! {}", n + 1, path.display(), err);
        return Err(DriverError::ConfigDecodingError);
      }
      Ok(word) => words.push(word)
    }
  }
  Ok(words)
}
