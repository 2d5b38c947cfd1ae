//! Aggregate settings for the row and column driver
//!
//! Everything which is not a board table: where
//! the device lives, how fast pattern RAM may be
//! written, the physical constants of the wave
//! equation and the register values the FPGA gets
//! at startup.
//!

use std::fs::File;
use std::io::{
    Write,
    Read,
};
use std::fmt;

extern crate toml;

use crate::errors::DriverError;

/// Physical constants entering the wave equation
/// modulation
#[derive(Debug, Copy, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct WaveSettings {
  /// RF frequency [GHz]
  pub frequency_ghz       : f64,
  /// index of refraction of the feed substrate
  pub index_of_refraction : f64,
  /// linear polarization angle [deg]
  pub linear_pol_angle    : f64,
  /// gamma applied to the normalized modulation
  pub mod_power           : f64,
  /// theta field element response (divisor)
  pub e_theta_element     : f64,
  /// phi field element response (divisor)
  pub e_phi_element       : f64,
}

impl WaveSettings {
  pub fn new() -> Self {
    Self {
      frequency_ghz       : 29.75,
      index_of_refraction : 1.565,
      linear_pol_angle    : 45.0,
      mod_power           : 1.0,
      e_theta_element     : 1.0,
      e_phi_element       : 1.0,
    }
  }
}

impl Default for WaveSettings {
  fn default() -> Self {
    Self::new()
  }
}

/// Values written into the aperture control
/// registers when the board gets initialized
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RegisterSettings {
  pub ctrl_reg                      : u32,
  pub stx_clk_match_val             : u32,
  pub supply_switch_dly_match_val   : u32,
  pub gate_dly_match_val            : u32,
  pub total_shift_amt               : u32,
  pub start_cycle_dly_match_val     : u32,
  pub sck_match_val                 : u32,
  /// row select masks, row_sel_0 .. row_sel_4
  pub row_sel                       : [u32;5],
  pub wait_for_data_valid_match_val : u32,
}

impl RegisterSettings {
  pub fn new() -> Self {
    Self {
      ctrl_reg                      : 0,
      stx_clk_match_val             : 8,
      supply_switch_dly_match_val   : 10,
      gate_dly_match_val            : 119,
      total_shift_amt               : 105,
      start_cycle_dly_match_val     : 7200,
      sck_match_val                 : 0,
      row_sel                       : [0xffff_ffff,
                                       0xffff_ffff,
                                       0x0000_ffff,
                                       0xff00_0000,
                                       0x0001_ffff],
      wait_for_data_valid_match_val : 2399,
    }
  }
}

impl Default for RegisterSettings {
  fn default() -> Self {
    Self::new()
  }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct DriverSettings {
  /// device node of the aperture control FPGA
  pub device_path     : String,
  /// json file with the board tables
  pub board_config    : String,
  /// pause after each pattern RAM word [us].
  /// Values below the hardware minimum of 25us
  /// are raised to the minimum.
  pub write_pacing_us : u64,
  /// write csv diagnostics of every pattern
  /// into this directory
  pub dump_dir        : Option<String>,
  pub wave            : WaveSettings,
  pub registers       : RegisterSettings,
}

impl DriverSettings {
  pub fn new() -> Self {
    Self {
      device_path     : String::from("/dev/aperture-control"),
      board_config    : String::from("/opt/kymeta/rowandcolumndriver/kdk-board.json"),
      write_pacing_us : 25,
      dump_dir        : None,
      wave            : WaveSettings::new(),
      registers       : RegisterSettings::new(),
    }
  }

  /// Write the settings to a toml file
  pub fn to_toml(&self, mut filename : String) -> Result<(), DriverError> {
    if !filename.ends_with(".toml") {
      filename += ".toml";
    }
    info!("Will write to file {}!", filename);
    let toml_string = match toml::to_string_pretty(&self) {
      Err(err) => {
        error!("Unable to serialize toml! {err}");
        return Err(DriverError::IoError);
      }
      Ok(toml_string) => toml_string
    };
    match File::create(&filename) {
      Err(err) => {
        error!("Unable to open file {}! {}", filename, err);
        Err(DriverError::IoError)
      }
      Ok(mut file) => {
        match file.write_all(toml_string.as_bytes()) {
          Err(err) => {
            error!("Unable to write to file {}! {}", filename, err);
            Err(DriverError::IoError)
          }
          Ok(_) => {
            debug!("Wrote settings to {}!", filename);
            Ok(())
          }
        }
      }
    }
  }

  /// Read settings from a toml file
  pub fn from_toml(filename : &str) -> Result<DriverSettings, DriverError> {
    match File::open(filename) {
      Err(err) => {
        error!("Unable to open {}! {}", filename, err);
        Err(DriverError::ConfigDecodingError)
      }
      Ok(mut file) => {
        let mut toml_string = String::from("");
        match file.read_to_string(&mut toml_string) {
          Err(err) => {
            error!("Unable to read {}! {}", filename, err);
            Err(DriverError::ConfigDecodingError)
          }
          Ok(_) => {
            match toml::from_str(&toml_string) {
              Err(err) => {
                error!("Can't interpret toml! {}", err);
                Err(DriverError::ConfigDecodingError)
              }
              Ok(settings) => Ok(settings)
            }
          }
        }
      }
    }
  }
}

impl Default for DriverSettings {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for DriverSettings {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let disp : String;
    match toml::to_string(self) {
      Err(err) => {
        error!("Deserialization error! {err}");
        disp = String::from("-- DESERIALIZATION ERROR! --");
      }
      Ok(_disp) => {
        disp = _disp;
      }
    }
    write!(f, "<DriverSettings :\n{}>", disp)
  }
}
