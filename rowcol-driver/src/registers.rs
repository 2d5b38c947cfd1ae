//! Registers of the aperture control FPGA.
//!
//! Registers are accessed through the mapped window
//! by byte offset (Addr8). Each register is 32bit,
//! so the next register is the previous one + 4.
//! If two names share an offset, the register holds
//! different fields in different bits.
//!
//! The pattern RAM follows at 0x8000.

use std::fmt;
use std::str::FromStr;

use rowcol_lib::DriverError;

//========== Control Registers ==========

pub const CTRL_REG                      : u32 = 0x00; // [0] continuous drive enable
pub const STX_CLK_MATCH_VAL             : u32 = 0x04;
pub const SUPPLY_SWITCH_DLY_MATCH_VAL   : u32 = 0x08;
pub const GATE_DLY_MATCH_VAL            : u32 = 0x0c;
pub const TOTAL_SHIFT_AMT               : u32 = 0x10; // number of rows shifted out per cycle
pub const START_CYCLE_DLY_MATCH_VAL     : u32 = 0x14;
pub const VERSION                       : u32 = 0x18; // read only, firmware version
pub const SCK_MATCH_VAL                 : u32 = 0x1c;
pub const CONIFER_ISR                   : u32 = 0x20; // write 0 to clear the irq

//========== Row Select =================
// 5 words of row select bits, one bit per row

pub const ROW_SEL_0                     : u32 = 0x2c;
pub const ROW_SEL_1                     : u32 = 0x30;
pub const ROW_SEL_2                     : u32 = 0x34;
pub const ROW_SEL_3                     : u32 = 0x38;
pub const ROW_SEL_4                     : u32 = 0x3c;
pub const ROW_SEL                       : [u32;5] = [ROW_SEL_0, ROW_SEL_1, ROW_SEL_2, ROW_SEL_3, ROW_SEL_4];

pub const WAIT_FOR_DATA_VALID_MATCH_VAL : u32 = 0x40;

/// Start of the pattern RAM within the window
pub const PATTERN_RAM                   : u32 = 0x8000;

/// Named bits of the control register at CTRL_REG
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ControlBit {
  /// Drive the panel continuously from pattern RAM
  ContinuousDriveEnable,
}

impl ControlBit {
  pub fn bit(&self) -> u32 {
    match self {
      ControlBit::ContinuousDriveEnable => 0,
    }
  }

  pub fn mask(&self) -> u32 {
    1u32 << self.bit()
  }

  /// The register this bit lives in
  pub fn register(&self) -> u32 {
    match self {
      ControlBit::ContinuousDriveEnable => CTRL_REG,
    }
  }
}

impl FromStr for ControlBit {
  type Err = DriverError;

  fn from_str(name : &str) -> Result<Self, Self::Err> {
    match name {
      "ContinuousDriveEnable" => Ok(ControlBit::ContinuousDriveEnable),
      _ => {
        error!("Unknown control bit {name}!");
        Err(DriverError::UnknownControlBit)
      }
    }
  }
}

impl fmt::Display for ControlBit {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      ControlBit::ContinuousDriveEnable => write!(f, "ContinuousDriveEnable"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn control_bit_names() {
    let bit = "ContinuousDriveEnable".parse::<ControlBit>().unwrap();
    assert_eq!(bit, ControlBit::ContinuousDriveEnable);
    assert_eq!(bit.mask(), 1);
    assert_eq!(bit.register(), CTRL_REG);
    assert_eq!(bit.to_string(), "ContinuousDriveEnable");
    assert_eq!("DriveEverything".parse::<ControlBit>(), Err(DriverError::UnknownControlBit));
  }
}
