//! Board specific tables
//!
//! The geometry of every active cell, the mapping
//! of active cells to matrix (row, col) and the
//! column layout of the FPGA pattern RAM are
//! static data of a given board. They are read
//! once at startup from a json file and are not
//! modified afterwards.
//!

use std::collections::HashSet;
use std::fs::File;
use std::io::{
  BufReader,
  BufWriter,
};
use std::path::Path;

use crate::constants::*;
use crate::errors::DriverError;

/// Position and orientation of a single active cell
#[derive(Debug, Copy, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CellGeometry {
  /// x position on the panel [m]
  pub x        : f64,
  /// y position on the panel [m]
  pub y        : f64,
  /// rotation of the cell [rad]
  pub rotation : f64,
}

impl CellGeometry {
  pub fn new(x : f64, y : f64, rotation : f64) -> Self {
    Self { x, y, rotation }
  }

  /// Distance to the panel center
  pub fn radius(&self) -> f64 {
    (self.x.powi(2) + self.y.powi(2)).sqrt()
  }
}

/// Matrix coordinates of an active cell
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
pub struct ActiveCell {
  pub row : u16,
  pub col : u16,
}

impl ActiveCell {
  pub fn new(row : u16, col : u16) -> Self {
    Self { row, col }
  }
}

/// Where the bit of a matrix column goes in the
/// row group of the pattern RAM
///
/// The bit of (row, col) lives in word
/// `byte_offset + row * row_group_size` at bit
/// position `base_bit + bit_shift`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct ColumnLayout {
  /// word offset within the row group
  pub byte_offset : u8,
  /// start of the byte lane, 8 or 24
  pub base_bit    : u8,
  /// bit within the lane, 0-7
  pub bit_shift   : u8,
}

impl ColumnLayout {
  pub fn new(byte_offset : u8, base_bit : u8, bit_shift : u8) -> Self {
    Self { byte_offset, base_bit, bit_shift }
  }

  /// Bit position in the 32bit pattern word
  pub fn bit(&self) -> u32 {
    self.base_bit as u32 + self.bit_shift as u32
  }

  pub fn mask(&self) -> u32 {
    1u32 << self.bit()
  }

  /// Fill the two usable lanes of each word in order:
  /// 16 columns per word, first lane 1 (bits 8-15),
  /// then lane 3 (bits 24-31).
  pub fn sequential_lanes(num_cols : usize) -> Vec<ColumnLayout> {
    let mut layout = Vec::<ColumnLayout>::with_capacity(num_cols);
    for col in 0..num_cols {
      let byte_offset = (col / 16) as u8;
      let base_bit    = if (col % 16) < 8 { LANE_1_START } else { LANE_3_START };
      let bit_shift   = (col % 8) as u8;
      layout.push(ColumnLayout::new(byte_offset, base_bit, bit_shift));
    }
    layout
  }
}

/// The complete static description of a board
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct BoardConfig {
  pub num_rows       : usize,
  pub num_cols       : usize,
  /// words per matrix row in pattern RAM
  pub row_group_size : usize,
  /// number of modulation levels
  pub gray_shades    : u8,
  /// one entry per active cell
  pub geometry       : Vec<CellGeometry>,
  /// one entry per active cell, same order as geometry
  pub mask           : Vec<ActiveCell>,
  /// one entry per column
  pub layout         : Vec<ColumnLayout>,
}

impl BoardConfig {

  /// An empty board with the given dimensions and
  /// the sequential column layout
  pub fn new(num_rows       : usize,
             num_cols       : usize,
             row_group_size : usize,
             gray_shades    : u8) -> Self {
    Self {
      num_rows,
      num_cols,
      row_group_size,
      gray_shades,
      geometry : Vec::<CellGeometry>::new(),
      mask     : Vec::<ActiveCell>::new(),
      layout   : ColumnLayout::sequential_lanes(num_cols),
    }
  }

  /// A board with the KDK dimensions
  pub fn kdk(geometry : Vec<CellGeometry>, mask : Vec<ActiveCell>) -> Self {
    let mut board = Self::new(NUM_ROWS, NUM_COLS, ROW_GROUP_SIZE, GRAY_SHADES);
    board.geometry = geometry;
    board.mask     = mask;
    board
  }

  /// Register an active cell at (row, col)
  pub fn add_cell(&mut self, row : u16, col : u16, geometry : CellGeometry) {
    self.mask.push(ActiveCell::new(row, col));
    self.geometry.push(geometry);
  }

  pub fn n_active_cells(&self) -> usize {
    self.mask.len()
  }

  /// Size of the packed pattern buffer in words
  pub fn pattern_words(&self) -> usize {
    self.num_rows * self.row_group_size
  }

  /// Check that all tables agree with each other
  /// and with the pattern RAM window.
  pub fn validate(&self) -> Result<(), DriverError> {
    if self.num_rows == 0 || self.num_rows > MAX_ROWS
      || self.num_cols == 0 || self.num_cols > MAX_COLS {
      error!("Board dimensions {}x{} outside of {}x{}!", self.num_rows, self.num_cols, MAX_ROWS, MAX_COLS);
      return Err(DriverError::InvalidBoardConfig);
    }
    if self.gray_shades < 2 {
      error!("Need at least 2 gray shades, got {}!", self.gray_shades);
      return Err(DriverError::InvalidBoardConfig);
    }
    if self.pattern_words() * SIZEOF_U32 > PATTERN_RAM_SIZE {
      error!("Pattern buffer of {} words does not fit into pattern RAM!", self.pattern_words());
      return Err(DriverError::InvalidBoardConfig);
    }
    if self.geometry.len() != self.mask.len() {
      error!("Geometry table has {} cells, but the mask has {}!", self.geometry.len(), self.mask.len());
      return Err(DriverError::InvalidBoardConfig);
    }
    let mut seen_cells = HashSet::<ActiveCell>::with_capacity(self.mask.len());
    for cell in &self.mask {
      if cell.row as usize >= self.num_rows || cell.col as usize >= self.num_cols {
        error!("Active cell {:?} outside of the {}x{} matrix!", cell, self.num_rows, self.num_cols);
        return Err(DriverError::InvalidBoardConfig);
      }
      if !seen_cells.insert(*cell) {
        error!("Active cell {:?} appears twice in the mask!", cell);
        return Err(DriverError::InvalidBoardConfig);
      }
    }
    if self.layout.len() != self.num_cols {
      error!("Layout table has {} entries for {} columns!", self.layout.len(), self.num_cols);
      return Err(DriverError::InvalidBoardConfig);
    }
    let mut seen_bits = HashSet::<(u8, u32)>::with_capacity(self.num_cols);
    for (col, entry) in self.layout.iter().enumerate() {
      if entry.byte_offset as usize >= self.row_group_size {
        error!("Column {col} has byte offset {} beyond the row group of {}!", entry.byte_offset, self.row_group_size);
        return Err(DriverError::InvalidBoardConfig);
      }
      if (entry.base_bit != LANE_1_START && entry.base_bit != LANE_3_START) || entry.bit_shift > 7 {
        error!("Column {col} maps to bit {}+{}, which is not in a usable lane!", entry.base_bit, entry.bit_shift);
        return Err(DriverError::InvalidBoardConfig);
      }
      if !seen_bits.insert((entry.byte_offset, entry.bit())) {
        error!("Column {col} shares word {} bit {} with another column!", entry.byte_offset, entry.bit());
        return Err(DriverError::InvalidBoardConfig);
      }
    }
    Ok(())
  }

  /// Load and validate a board file
  pub fn from_json_file(path : &Path) -> Result<Self, DriverError> {
    let file = match File::open(path) {
      Err(err) => {
        error!("Unable to open board file {}! {}", path.display(), err);
        return Err(DriverError::ConfigDecodingError);
      }
      Ok(file) => file
    };
    let board : BoardConfig = match serde_json::from_reader(BufReader::new(file)) {
      Err(err) => {
        error!("Can't interpret board file {}! {}", path.display(), err);
        return Err(DriverError::ConfigDecodingError);
      }
      Ok(board) => board
    };
    board.validate()?;
    info!("Loaded board {} with {}x{} matrix and {} active cells", path.display(), board.num_rows, board.num_cols, board.n_active_cells());
    Ok(board)
  }

  pub fn to_json_file(&self, path : &Path) -> Result<(), DriverError> {
    let file = match File::create(path) {
      Err(err) => {
        error!("Unable to create {}! {}", path.display(), err);
        return Err(DriverError::IoError);
      }
      Ok(file) => file
    };
    match serde_json::to_writer_pretty(BufWriter::new(file), self) {
      Err(err) => {
        error!("Unable to serialize board to {}! {}", path.display(), err);
        Err(DriverError::IoError)
      }
      Ok(_) => {
        debug!("Wrote board tables to {}", path.display());
        Ok(())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn small_board() -> BoardConfig {
    let mut board = BoardConfig::new(4, 20, 2, 2);
    board.add_cell(0, 0, CellGeometry::new(0.01, 0.0, 0.0));
    board.add_cell(3, 19, CellGeometry::new(-0.01, 0.0, 0.0));
    board
  }

  #[test]
  fn sequential_lanes_fill_both_lanes() {
    let layout = ColumnLayout::sequential_lanes(NUM_COLS);
    assert_eq!(layout[0],  ColumnLayout::new(0, 8, 0));
    assert_eq!(layout[7],  ColumnLayout::new(0, 8, 7));
    assert_eq!(layout[8],  ColumnLayout::new(0, 24, 0));
    assert_eq!(layout[15], ColumnLayout::new(0, 24, 7));
    assert_eq!(layout[16], ColumnLayout::new(1, 8, 0));
    // 158 columns fill exactly one row group of 10 words
    assert_eq!(layout[NUM_COLS - 1].byte_offset as usize, ROW_GROUP_SIZE - 1);
  }

  #[test]
  fn kdk_dimensions_validate() {
    let board = BoardConfig::kdk(vec![CellGeometry::new(0.0, 0.1, 0.0)], vec![ActiveCell::new(104, 157)]);
    assert!(board.validate().is_ok());
    assert_eq!(board.pattern_words(), PATTERN_BUFFER_WORDS);
  }

  #[test]
  fn validate_rejects_inconsistent_tables() {
    let mut board = small_board();
    board.geometry.pop();
    assert_eq!(board.validate(), Err(DriverError::InvalidBoardConfig));

    let mut board = small_board();
    board.add_cell(4, 0, CellGeometry::new(0.0, 0.0, 0.0));
    assert_eq!(board.validate(), Err(DriverError::InvalidBoardConfig));

    let mut board = small_board();
    board.add_cell(0, 0, CellGeometry::new(0.0, 0.0, 0.0));
    assert_eq!(board.validate(), Err(DriverError::InvalidBoardConfig));

    let mut board = small_board();
    board.layout[3].base_bit = 16;
    assert_eq!(board.validate(), Err(DriverError::InvalidBoardConfig));

    let mut board = small_board();
    board.layout[1] = board.layout[0];
    assert_eq!(board.validate(), Err(DriverError::InvalidBoardConfig));

    let mut board = small_board();
    board.row_group_size = 1;
    assert_eq!(board.validate(), Err(DriverError::InvalidBoardConfig));

    let mut board = small_board();
    board.gray_shades = 1;
    assert_eq!(board.validate(), Err(DriverError::InvalidBoardConfig));
  }

  #[test]
  fn json_file_round_trip() {
    let dir   = tempfile::tempdir().unwrap();
    let path  = dir.path().join("board.json");
    let board = small_board();
    board.to_json_file(&path).unwrap();
    let loaded = BoardConfig::from_json_file(&path).unwrap();
    assert_eq!(loaded, board);
  }

  #[test]
  fn missing_board_file() {
    let result = BoardConfig::from_json_file(Path::new("/nonexistent/board.json"));
    assert_eq!(result, Err(DriverError::ConfigDecodingError));
  }
}
