//! Wave equation modulation
//!
//! For a given beam direction, every active cell
//! gets a drive level from the interference of
//! the feed wave travelling radially through the
//! substrate ("incoming") and the plane wave we
//! want to radiate ("outgoing").
//!
//! The real part of the superposition is mapped
//! into [0,1] with the peak amplitude over the
//! panel and then quantized to the number of
//! gray shades of the board.
//!

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::board::{
  BoardConfig,
  CellGeometry,
};
use crate::errors::DriverError;
use crate::settings::WaveSettings;

/// [m/s]
pub const SPEED_OF_LIGHT : f64 = 2.99792458e8;

/// Radii get truncated to this resolution before
/// entering the phase of the feed wave, so float
/// jitter in the geometry tables does not show
/// up as phase noise.
const RADIUS_RESOLUTION : f64 = 10000.0;

/// Result of a wave equation run, one entry per
/// active cell in the order of the geometry table
#[derive(Debug, Clone, PartialEq)]
pub struct WaveModulation {
  /// real part of the superposition
  pub raw     : Vec<f64>,
  /// largest |raw| over the panel
  pub max_abs : f64,
  /// quantized drive level
  pub levels  : Vec<u8>,
}

/// Map a normalized modulation value in [0,1]
/// to one of `gray_shades` equally wide levels
pub fn quantize(normalized : f64, gray_shades : u8) -> u8 {
  let top   = (gray_shades - 1) as f64;
  let level = (normalized * gray_shades as f64).floor();
  level.clamp(0.0, top) as u8
}

#[derive(Debug, Clone)]
pub struct ModulationCalculator<'a> {
  geometry    : &'a [CellGeometry],
  gray_shades : u8,
  settings    : WaveSettings,
}

impl<'a> ModulationCalculator<'a> {

  /// Fails with InvalidBoardConfig unless the
  /// board tables are consistent
  pub fn new(board : &'a BoardConfig, settings : &WaveSettings) -> Result<Self, DriverError> {
    board.validate()?;
    Ok(Self {
      geometry    : &board.geometry,
      gray_shades : board.gray_shades,
      settings    : *settings,
    })
  }

  /// Wave numbers in free space and in the substrate [1/m]
  pub fn wave_numbers(&self) -> (f64, f64) {
    let freq = self.settings.frequency_ghz * 1e9;
    let kf   = 2.0 * PI * freq / SPEED_OF_LIGHT;
    let ks   = kf * self.settings.index_of_refraction;
    (kf, ks)
  }

  /// Complex modulation of a single cell
  ///
  /// # Arguments
  ///
  /// * theta, phi, phase : steering angles [rad]
  fn cell_modulation(&self,
                     cell  : &CellGeometry,
                     theta : f64,
                     phi   : f64,
                     phase : f64) -> Complex64 {
    let (kf, ks)  = self.wave_numbers();
    let pol       = self.settings.linear_pol_angle.to_radians();
    let theta_mag = pol.cos();
    let phi_mag   = pol.sin();

    let e_theta   = (phi + cell.rotation).sin() / self.settings.e_theta_element;
    let e_phi     = (phi + cell.rotation).cos() / self.settings.e_phi_element;

    let rho       = (cell.radius() * RADIUS_RESOLUTION).floor() / RADIUS_RESOLUTION;
    let wave_in   = Complex64::from_polar(1.0, ks * rho);

    let out_angle = kf * (cell.x * theta.sin() * phi.cos()
                        + cell.y * theta.sin() * phi.sin());
    let out_wave  = Complex64::from_polar(1.0, out_angle);
    let out_theta = out_wave * theta_mag;
    let out_phi   = Complex64::from_polar(1.0, phase) * out_wave * phi_mag;

    wave_in * out_theta * e_theta + wave_in * out_phi * e_phi
  }

  /// Run the wave equation for all active cells
  ///
  /// # Arguments
  ///
  /// * theta : azimuth [deg]
  /// * phi   : elevation [deg]
  /// * phase : polarization reference phase [deg]
  pub fn compute(&self,
                 theta : f64,
                 phi   : f64,
                 phase : f64) -> Result<WaveModulation, DriverError> {
    if self.geometry.is_empty() {
      error!("No active cells in the geometry table!");
      return Err(DriverError::InvalidGeometry);
    }
    let theta = theta.to_radians();
    let phi   = phi.to_radians();
    let phase = phase.to_radians();

    let mut raw     = Vec::<f64>::with_capacity(self.geometry.len());
    let mut max_abs = 0.0f64;
    for cell in self.geometry {
      let re  = self.cell_modulation(cell, theta, phi, phase).re;
      max_abs = max_abs.max(re.abs());
      raw.push(re);
    }
    if !(max_abs > 0.0) || !max_abs.is_finite() {
      error!("Peak modulation amplitude is {max_abs}, can't normalize!");
      return Err(DriverError::InvalidGeometry);
    }

    let levels = raw.iter()
      .map(|re| {
        let normalized = ((re + max_abs) / (2.0 * max_abs)).powf(self.settings.mod_power);
        quantize(normalized, self.gray_shades)
      })
      .collect();
    debug!("Computed wave modulation for {} cells, peak amplitude {:.4}", raw.len(), max_abs);
    Ok(WaveModulation { raw, max_abs, levels })
  }

  /// Per cell drive levels for the given steering angles [deg]
  pub fn compute_levels(&self,
                        theta : f64,
                        phi   : f64,
                        phase : f64) -> Result<Vec<u8>, DriverError> {
    Ok(self.compute(theta, phi, phase)?.levels)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  /// Ring of cells with 4-fold point symmetry
  fn symmetric_board() -> BoardConfig {
    let mut board = BoardConfig::new(8, 8, 1, 2);
    let points = [(0.004, 0.001), (0.013, 0.007), (0.021, 0.002), (0.009, 0.030)];
    let mut row = 0u16;
    for (x, y) in points {
      board.add_cell(row, 0, CellGeometry::new( x,  y, 0.3));
      board.add_cell(row, 1, CellGeometry::new(-x, -y, 0.3));
      row += 1;
    }
    board
  }

  #[test]
  fn quantize_binary() {
    assert_eq!(quantize(0.0, 2),   0);
    assert_eq!(quantize(0.49, 2),  0);
    assert_eq!(quantize(0.5, 2),   1);
    assert_eq!(quantize(1.0, 2),   1);
  }

  #[test]
  fn quantize_four_shades() {
    assert_eq!(quantize(0.1, 4),  0);
    assert_eq!(quantize(0.3, 4),  1);
    assert_eq!(quantize(0.6, 4),  2);
    assert_eq!(quantize(0.99, 4), 3);
    assert_eq!(quantize(1.0, 4),  3);
  }

  #[test]
  fn wave_numbers_for_ka_band() {
    let board    = symmetric_board();
    let settings = WaveSettings::new();
    let calc     = ModulationCalculator::new(&board, &settings).unwrap();
    let (kf, ks) = calc.wave_numbers();
    // lambda ~ 1cm at 29.75 GHz
    assert!((2.0 * PI / kf - 0.010077).abs() < 1e-5);
    assert!((ks / kf - 1.565).abs() < 1e-12);
  }

  #[test]
  fn broadside_mirrored_cells_get_equal_levels() {
    let board    = symmetric_board();
    let settings = WaveSettings::new();
    let calc     = ModulationCalculator::new(&board, &settings).unwrap();
    let result   = calc.compute(0.0, 0.0, 0.0).unwrap();
    assert_eq!(result.levels.len(), board.n_active_cells());
    for pair in 0..4 {
      assert_eq!(result.levels[2*pair], result.levels[2*pair + 1]);
      assert!((result.raw[2*pair] - result.raw[2*pair + 1]).abs() < 1e-12);
    }
  }

  #[test]
  fn raw_amplitudes_are_bounded_by_peak() {
    let board    = symmetric_board();
    let settings = WaveSettings::new();
    let calc     = ModulationCalculator::new(&board, &settings).unwrap();
    let result   = calc.compute(30.0, 45.0, 10.0).unwrap();
    assert!(result.max_abs > 0.0);
    assert!(result.raw.iter().all(|re| re.abs() <= result.max_abs));
    assert!(result.raw.iter().any(|re| re.abs() == result.max_abs));
    assert!(result.levels.iter().all(|l| *l < board.gray_shades));
  }

  #[test]
  fn zero_amplitude_is_invalid_geometry() {
    // pure theta polarization, no rotation and phi = 0
    // make every element response vanish exactly
    let mut board = BoardConfig::new(2, 2, 1, 2);
    board.add_cell(0, 0, CellGeometry::new(0.01, 0.02, 0.0));
    board.add_cell(1, 1, CellGeometry::new(0.03, 0.00, 0.0));
    let mut settings = WaveSettings::new();
    settings.linear_pol_angle = 0.0;
    let calc = ModulationCalculator::new(&board, &settings).unwrap();
    assert_eq!(calc.compute_levels(0.0, 0.0, 0.0), Err(DriverError::InvalidGeometry));
  }

  #[test]
  fn empty_geometry_is_invalid() {
    let board    = BoardConfig::new(2, 2, 1, 2);
    let settings = WaveSettings::new();
    let calc     = ModulationCalculator::new(&board, &settings).unwrap();
    assert_eq!(calc.compute_levels(10.0, 0.0, 0.0), Err(DriverError::InvalidGeometry));
  }

  #[test]
  fn inconsistent_board_is_rejected() {
    let mut board = BoardConfig::new(2, 16, 1, 0);
    board.add_cell(0, 3, CellGeometry::new(0.01, 0.01, 0.0));
    let settings = WaveSettings::new();
    assert_eq!(ModulationCalculator::new(&board, &settings).err(), Some(DriverError::InvalidBoardConfig));
  }
}
