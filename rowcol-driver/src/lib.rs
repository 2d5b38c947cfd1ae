//! Hardware facing part of the row and column driver.
//!
//! * `memory`    - mapping of /dev/aperture-control
//! * `registers` - register map of the aperture control FPGA
//! * `control`   - register and pattern RAM primitives
//! * `api`       - `RowColDriver`, from pattern name to pattern RAM
pub mod registers;
pub mod memory;
pub mod control;
pub mod api;

#[macro_use] extern crate log;

pub use crate::api::{
  RowColDriver,
  PreparedPattern,
};
pub use crate::memory::{
  FpgaMemoryMap,
  DEFAULT_DEVICE,
};
pub use crate::registers::ControlBit;
