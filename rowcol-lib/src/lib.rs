//! rowcol-lib - the hardware independent part of the
//! row and column driver for the KDK metamaterial
//! antenna panel.
//!
//! * board tables (geometry, active cell mask, column layout)
//! * wave equation modulation
//! * modulation mask and matrix
//! * packing into the FPGA pattern RAM format
//! * settings and diagnostic csv dumps
//!
//! The pipeline is
//! angles -> `ModulationCalculator` -> levels ->
//! `MatrixBuilder` -> matrix -> `PatternFormatter` ->
//! `PatternBuffer`, which the driver crate then writes
//! into pattern RAM.

pub mod constants;
pub mod errors;
pub mod board;
pub mod settings;
pub mod modulation;
pub mod matrix;
pub mod pattern;
pub mod io;

use std::io::Write;

use colored::{Colorize, ColoredString};
use log::Level;

#[macro_use] extern crate log;
extern crate env_logger;

pub use crate::errors::DriverError;
pub use crate::board::{
  BoardConfig,
  CellGeometry,
  ActiveCell,
  ColumnLayout,
};
pub use crate::settings::{
  DriverSettings,
  WaveSettings,
  RegisterSettings,
};
pub use crate::modulation::{
  ModulationCalculator,
  WaveModulation,
};
pub use crate::matrix::{
  MatrixBuilder,
  PatternKind,
  PatternSelection,
  build_mask,
};
pub use crate::pattern::{
  PatternBuffer,
  PatternFormatter,
};

/// Make sure that the loglevel is in color, even though not using pretty_env logger
pub fn color_log(level : &Level) -> ColoredString {
  match level {
    Level::Error    => String::from(" ERROR!").red(),
    Level::Warn     => String::from(" WARN  ").yellow(),
    Level::Info     => String::from(" Info  ").green(),
    Level::Debug    => String::from(" debug ").blue(),
    Level::Trace    => String::from(" trace ").cyan(),
  }
}

/// Set up the environmental (env) logger
/// with our format
///
/// Ensure that the lines and module paths
/// are printed in the logging output
pub fn init_env_logger() {
  env_logger::builder()
    .format(|buf, record| {
    writeln!( buf, "[{level}][{module_path}:{line}] {args}",
      level = color_log(&record.level()),
      module_path = record.module_path().unwrap_or("<unknown>"),
      line = record.line().unwrap_or(0),
      args = record.args()
      )
    }).init();
}
