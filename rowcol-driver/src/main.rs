//! # Row and column driver for the KDK aperture
//!
//! Command line front end: bring the aperture
//! control FPGA up, write canned or steered
//! patterns into pattern RAM and switch the
//! continuous drive on and off.
//!
use std::path::Path;
use std::process::exit;

#[macro_use] extern crate log;

extern crate clap;
use clap::{Parser,
           Subcommand};

use indicatif::{ProgressBar,
                ProgressStyle};
use signal_hook::consts::{SIGINT,
                          SIGTERM};

use rowcol_driver::RowColDriver;
use rowcol_lib::io::write_words_csv;
use rowcol_lib::{
  init_env_logger,
  DriverError,
  DriverSettings,
  PatternSelection,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
  /// Settings file (.toml). Without it, the built-in
  /// defaults are used
  #[arg(short, long)]
  config : Option<String>,
  /// Device node of the aperture control FPGA,
  /// overrides the settings
  #[arg(short, long)]
  device : Option<String>,
  /// Board file (.json) with geometry, mask and
  /// column layout, overrides the settings
  #[arg(short, long)]
  board : Option<String>,
  /// Show a progress bar while pattern RAM gets written
  #[arg(long, default_value_t = false)]
  show_progress : bool,
  #[command(subcommand)]
  command : Command,
}

#[derive(Debug, Clone, Subcommand, PartialEq)]
enum Command {
  /// Zero pattern RAM, write the startup registers,
  /// write the all off pattern and enable drive
  Init,
  /// Write a canned pattern ("all on", "all off", "checkerboard")
  Pattern {
    name : String,
  },
  /// Steer the beam with the wave equation pattern
  Steer {
    /// azimuth [deg]
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    theta : f64,
    /// elevation [deg]
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    phi   : f64,
    /// polarization reference phase [deg]
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    phase : f64,
  },
  /// Enable continuous drive
  DriveOn,
  /// Disable continuous drive
  DriveOff,
  /// Dump pattern RAM as hex words into a file
  ReadPattern {
    file : String,
  },
  /// Write the current settings to a .toml file
  WriteConfig {
    file : String,
  },
}

fn progress_bar(show : bool, n_words : usize) -> ProgressBar {
  if !show {
    return ProgressBar::hidden();
  }
  let bar = ProgressBar::new(n_words as u64);
  let bar_template = "[{elapsed_precise}] {prefix} {msg} {bar:60.blue/grey} {pos:>7}/{len:7}";
  match ProgressStyle::with_template(bar_template) {
    Err(err) => warn!("Unable to set progressbar style! {err}"),
    Ok(style) => bar.set_style(style),
  }
  bar.set_prefix("\u{1F4E1}");
  bar.set_message("Writing pattern RAM");
  bar
}

fn run(driver : &RowColDriver, command : &Command, bar : &ProgressBar) -> Result<(), DriverError> {
  if *command == Command::Init {
    return driver.initialize(Some(bar));
  }
  driver.map_memory()?;
  match command {
    Command::Pattern { name } => {
      let prepared = driver.apply_named(name, None, Some(bar))?;
      driver.check_readback(&prepared)?;
    }
    Command::Steer { theta, phi, phase } => {
      let selection = PatternSelection::WaveEquation {
        theta : *theta,
        phi   : *phi,
        phase : *phase,
      };
      let prepared = driver.apply(selection, Some(bar))?;
      driver.check_readback(&prepared)?;
    }
    Command::DriveOn  => driver.enable_drive()?,
    Command::DriveOff => driver.disable_drive()?,
    Command::ReadPattern { file } => {
      let words = driver.read_pattern_ram(driver.board().pattern_words())?;
      write_words_csv(Path::new(file), &words)?;
      println!("=> Wrote {} words of pattern RAM to {file}", words.len());
    }
    Command::Init | Command::WriteConfig { .. } => ()
  }
  Ok(())
}

fn main() {
  init_env_logger();
  let args = Args::parse();

  let mut settings = match &args.config {
    None => DriverSettings::new(),
    Some(config) => {
      match DriverSettings::from_toml(config) {
        Err(err) => {
          error!("Unable to load settings from {config}! {err}");
          exit(1);
        }
        Ok(settings) => settings
      }
    }
  };
  if let Some(device) = &args.device {
    settings.device_path = device.clone();
  }
  if let Some(board) = &args.board {
    settings.board_config = board.clone();
  }

  if let Command::WriteConfig { file } = &args.command {
    match settings.to_toml(file.clone()) {
      Err(err) => {
        error!("Unable to write settings! {err}");
        exit(1);
      }
      Ok(_) => {
        println!("=> Settings written to {file}");
        return;
      }
    }
  }

  println!("-----------------------------------------------");
  println!(" ** rowcol-driver, KDK aperture control");
  println!(" => Device : {}", settings.device_path);
  println!(" => Board  : {}", settings.board_config);
  println!("-----------------------------------------------");

  let driver = match RowColDriver::from_settings(settings) {
    Err(err) => {
      error!("Unable to set up the driver! {err}");
      exit(1);
    }
    Ok(driver) => driver
  };

  // SIGINT/SIGTERM stop a running pattern RAM write
  // at the next word
  for signal in [SIGINT, SIGTERM] {
    if let Err(err) = signal_hook::flag::register(signal, driver.stop_flag()) {
      warn!("Unable to register handler for signal {signal}! {err}");
    }
  }

  let bar    = progress_bar(args.show_progress, driver.board().pattern_words());
  let result = run(&driver, &args.command, &bar);
  bar.finish_and_clear();

  if driver.is_mapped() {
    if let Err(err) = driver.unmap_memory() {
      error!("Teardown failed! {err}");
    }
  }
  match result {
    Err(err) => {
      error!("{:?} failed! {err}", args.command);
      exit(1);
    }
    Ok(_) => info!("{:?} done", args.command)
  }
}
