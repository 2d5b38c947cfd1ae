//! Modulation mask and modulation matrix
//!
//! Both are dense (num_rows x num_cols) matrices.
//! The mask has a 1 wherever the board has an
//! active cell, the modulation matrix holds the
//! drive level of every cell and is forced to 0
//! outside of the mask.

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;

use crate::board::BoardConfig;
use crate::errors::DriverError;

/// Canned test patterns
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PatternKind {
  AllOn,
  AllOff,
  Checkerboard,
}

impl PatternKind {
  /// Values for cells with (both even, both odd, mixed)
  /// row/column parity
  pub fn parity_values(&self) -> (u8, u8, u8) {
    match self {
      PatternKind::AllOn        => (1, 1, 1),
      PatternKind::AllOff       => (0, 0, 0),
      PatternKind::Checkerboard => (1, 1, 0),
    }
  }
}

impl FromStr for PatternKind {
  type Err = DriverError;

  fn from_str(name : &str) -> Result<Self, Self::Err> {
    match name {
      "all on"       => Ok(PatternKind::AllOn),
      "all off"      => Ok(PatternKind::AllOff),
      "checkerboard" => Ok(PatternKind::Checkerboard),
      _ => {
        error!("Unknown pattern {name}!");
        Err(DriverError::InvalidArgument)
      }
    }
  }
}

impl fmt::Display for PatternKind {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let repr = match self {
      PatternKind::AllOn        => "all on",
      PatternKind::AllOff       => "all off",
      PatternKind::Checkerboard => "checkerboard",
    };
    write!(f, "{}", repr)
  }
}

/// What should go into pattern RAM
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PatternSelection {
  Canned(PatternKind),
  /// Steering angles in degrees
  WaveEquation {
    theta : f64,
    phi   : f64,
    phase : f64,
  },
}

impl PatternSelection {

  /// Resolve a pattern name
  ///
  /// "wave equation" needs the steering angles
  /// (theta, phi, phase), the canned patterns
  /// ignore them.
  pub fn from_name(name   : &str,
                   angles : Option<(f64, f64, f64)>) -> Result<Self, DriverError> {
    if name == "wave equation" {
      match angles {
        None => {
          error!("Pattern 'wave equation' requires steering angles!");
          Err(DriverError::InvalidArgument)
        }
        Some((theta, phi, phase)) => Ok(PatternSelection::WaveEquation { theta, phi, phase })
      }
    } else {
      Ok(PatternSelection::Canned(name.parse::<PatternKind>()?))
    }
  }
}

impl fmt::Display for PatternSelection {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      PatternSelection::Canned(kind) => write!(f, "{}", kind),
      PatternSelection::WaveEquation { theta, phi, phase } => {
        write!(f, "wave equation (theta {theta}, phi {phi}, phase {phase})")
      }
    }
  }
}

pub fn is_even(value : usize) -> bool {
  value % 2 == 0
}

/// A 1 for every active cell of the board, 0 elsewhere.
/// The board gets validated first.
pub fn build_mask(board : &BoardConfig) -> Result<Array2<u8>, DriverError> {
  board.validate()?;
  let mut mask = Array2::<u8>::zeros((board.num_rows, board.num_cols));
  for cell in &board.mask {
    mask[[cell.row as usize, cell.col as usize]] = 1;
  }
  Ok(mask)
}

/// Builds modulation matrices for a single board
#[derive(Debug, Clone)]
pub struct MatrixBuilder<'a> {
  board : &'a BoardConfig,
  mask  : Array2<u8>,
}

impl<'a> MatrixBuilder<'a> {

  pub fn new(board : &'a BoardConfig) -> Result<Self, DriverError> {
    Ok(Self {
      board,
      mask : build_mask(board)?,
    })
  }

  pub fn mask(&self) -> &Array2<u8> {
    &self.mask
  }

  /// Matrix for one of the canned patterns
  pub fn build_matrix(&self, kind : PatternKind) -> Array2<u8> {
    let (even_cell, odd_cell, other_cell) = kind.parity_values();
    Array2::from_shape_fn(self.mask.dim(), |(row, col)| {
      let value = match (is_even(row), is_even(col)) {
        (true,  true)  => even_cell,
        (false, false) => odd_cell,
        _              => other_cell,
      };
      value * self.mask[[row, col]]
    })
  }

  /// Scatter per cell levels (geometry table order)
  /// into the matrix
  pub fn build_from_levels(&self, levels : &[u8]) -> Result<Array2<u8>, DriverError> {
    if levels.len() != self.board.n_active_cells() {
      error!("Got {} levels for {} active cells!", levels.len(), self.board.n_active_cells());
      return Err(DriverError::InvalidArgument);
    }
    let mut matrix = Array2::<u8>::zeros(self.mask.dim());
    for (cell, level) in self.board.mask.iter().zip(levels) {
      let idx     = [cell.row as usize, cell.col as usize];
      matrix[idx] = level * self.mask[idx];
    }
    Ok(matrix)
  }

  /// Overwrite `matrix` with the named canned pattern.
  ///
  /// The name is resolved before anything is written,
  /// so an unknown name leaves the matrix untouched.
  pub fn populate_named(&self, name : &str, matrix : &mut Array2<u8>) -> Result<(), DriverError> {
    let kind = name.parse::<PatternKind>()?;
    *matrix  = self.build_matrix(kind);
    Ok(())
  }
}
