use std::error::Error;
use std::fmt;

/// Everything which can go wrong when building
/// a pattern or talking to the aperture control
/// FPGA.
///
/// The underlying OS/io errors are logged where they
/// occur, the variants only tell what failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum DriverError {
  /// The device file could not be opened
  OpenFailed,
  /// Mapping the hardware window failed
  MapFailed,
  /// Tearing down the mapping failed
  UnmapFailed,
  /// The name does not refer to a known control bit
  UnknownControlBit,
  /// Unrecognized pattern name or malformed input
  InvalidArgument,
  /// The wave computation degenerated (e.g. zero peak amplitude)
  InvalidGeometry,
  /// Pattern RAM/register access without a mapped window
  NotMapped,
  /// Register offset or word index outside of the mapped window
  OutOfBounds,
  /// Board tables are inconsistent with each other
  InvalidBoardConfig,
  /// A paced pattern RAM write was stopped between two words
  WriteInterrupted,
  /// Pattern RAM read back differs from what was written
  VerifyFailed,
  /// A settings or board file could not be read or parsed
  ConfigDecodingError,
  /// Writing a diagnostic file failed
  IoError,
}

impl DriverError {
  pub fn as_str(&self) -> &'static str {
    match self {
      DriverError::OpenFailed          => "OpenFailed",
      DriverError::MapFailed           => "MapFailed",
      DriverError::UnmapFailed         => "UnmapFailed",
      DriverError::UnknownControlBit   => "UnknownControlBit",
      DriverError::InvalidArgument     => "InvalidArgument",
      DriverError::InvalidGeometry     => "InvalidGeometry",
      DriverError::NotMapped           => "NotMapped",
      DriverError::OutOfBounds         => "OutOfBounds",
      DriverError::InvalidBoardConfig  => "InvalidBoardConfig",
      DriverError::WriteInterrupted    => "WriteInterrupted",
      DriverError::VerifyFailed        => "VerifyFailed",
      DriverError::ConfigDecodingError => "ConfigDecodingError",
      DriverError::IoError             => "IoError",
    }
  }
}

impl fmt::Display for DriverError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "<DriverError : {}>", self.as_str())
  }
}

impl Error for DriverError {
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_names_the_variant() {
    assert_eq!(DriverError::NotMapped.to_string(), "<DriverError : NotMapped>");
    assert_eq!(DriverError::InvalidGeometry.as_str(), "InvalidGeometry");
    assert_eq!(DriverError::VerifyFailed.to_string(), "<DriverError : VerifyFailed>");
  }
}
