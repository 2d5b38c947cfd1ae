//! Print the control registers of the aperture
//! control FPGA and the first words of pattern RAM
extern crate rowcol_driver;

use std::process::exit;

use rowcol_driver::FpgaMemoryMap;
use rowcol_driver::DEFAULT_DEVICE;
use rowcol_driver::control::read_pattern_ram;
use rowcol_driver::registers::*;

const REGISTERS : [(&str, u32);15] = [
  ("CTRL_REG",                      CTRL_REG),
  ("STX_CLK_MATCH_VAL",             STX_CLK_MATCH_VAL),
  ("SUPPLY_SWITCH_DLY_MATCH_VAL",   SUPPLY_SWITCH_DLY_MATCH_VAL),
  ("GATE_DLY_MATCH_VAL",            GATE_DLY_MATCH_VAL),
  ("TOTAL_SHIFT_AMT",               TOTAL_SHIFT_AMT),
  ("START_CYCLE_DLY_MATCH_VAL",     START_CYCLE_DLY_MATCH_VAL),
  ("VERSION",                       VERSION),
  ("SCK_MATCH_VAL",                 SCK_MATCH_VAL),
  ("CONIFER_ISR",                   CONIFER_ISR),
  ("ROW_SEL_0",                     ROW_SEL_0),
  ("ROW_SEL_1",                     ROW_SEL_1),
  ("ROW_SEL_2",                     ROW_SEL_2),
  ("ROW_SEL_3",                     ROW_SEL_3),
  ("ROW_SEL_4",                     ROW_SEL_4),
  ("WAIT_FOR_DATA_VALID_MATCH_VAL", WAIT_FOR_DATA_VALID_MATCH_VAL),
];

fn main () {
  rowcol_lib::init_env_logger();
  let device  = std::env::args().nth(1).unwrap_or(String::from(DEFAULT_DEVICE));
  let mut map = match FpgaMemoryMap::open(&device) {
    Err(err) => {
      println!("=> Can not map {device}! {err}");
      exit(1);
    }
    Ok(map) => map
  };

  println!("=> Registers of {device}");
  for (name, offset) in REGISTERS {
    match map.read_register(offset) {
      Err(err)  => println!("  {name:<30} [{offset:#04x}] : {err}"),
      Ok(value) => println!("  {name:<30} [{offset:#04x}] : {value:#010x} ({value})"),
    }
  }
  let drive = ControlBit::ContinuousDriveEnable;
  if let Ok(value) = map.read_register(drive.register()) {
    println!("=> {drive} : {}", value & drive.mask() > 0);
  }

  println!("=> First 20 words of pattern RAM");
  match read_pattern_ram(&mut map, 20) {
    Err(err)  => println!("  {err}"),
    Ok(words) => {
      for (k, word) in words.iter().enumerate() {
        println!("  {k:>4} : {word:08x}");
      }
    }
  }
  if let Err(err) = map.close() {
    println!("=> Teardown failed! {err}");
  }
}
