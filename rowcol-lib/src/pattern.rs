//! Packing of the modulation matrix into the
//! FPGA pattern RAM format
//!
//! The pattern RAM holds one row group of
//! `row_group_size` 32bit words per matrix row.
//! Every column owns a single bit in its row
//! group, given by the layout table of the board.
//! Only the byte lanes starting at bit 8 and bit
//! 24 are used, the other two lanes stay zero.
//!

use ndarray::Array2;

use crate::board::BoardConfig;
use crate::errors::DriverError;

/// The packed words as they go into pattern RAM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternBuffer {
  words : Vec<u32>,
}

impl PatternBuffer {
  /// An all zero buffer of n_words
  pub fn new(n_words : usize) -> Self {
    Self {
      words : vec![0u32; n_words],
    }
  }

  pub fn from_words(words : Vec<u32>) -> Self {
    Self { words }
  }

  pub fn zero(&mut self) {
    self.words.iter_mut().for_each(|w| *w = 0);
  }

  pub fn words(&self) -> &[u32] {
    &self.words
  }

  pub fn len(&self) -> usize {
    self.words.len()
  }

  pub fn is_empty(&self) -> bool {
    self.words.is_empty()
  }

  /// Indices of the words which differ from `other`.
  /// Words missing in `other` count as different.
  pub fn mismatches(&self, other : &[u32]) -> Vec<usize> {
    self.words.iter()
      .enumerate()
      .filter(|(k, w)| other.get(*k) != Some(*w))
      .map(|(k, _)| k)
      .collect()
  }
}

#[derive(Debug, Copy, Clone)]
pub struct PatternFormatter<'a> {
  board : &'a BoardConfig,
}

impl<'a> PatternFormatter<'a> {

  /// Fails with InvalidBoardConfig if the layout
  /// table does not fit the board
  pub fn new(board : &'a BoardConfig) -> Result<Self, DriverError> {
    board.validate()?;
    Ok(Self { board })
  }

  /// Index of the pattern RAM word holding (row, col)
  pub fn word_index(&self, row : usize, col : usize) -> usize {
    self.board.layout[col].byte_offset as usize + row * self.board.row_group_size
  }

  pub fn bit_mask(&self, col : usize) -> u32 {
    self.board.layout[col].mask()
  }

  /// Pack the matrix into a fresh buffer
  pub fn format(&self, matrix : &Array2<u8>) -> Result<PatternBuffer, DriverError> {
    let mut buffer = PatternBuffer::new(self.board.pattern_words());
    self.format_into(matrix, &mut buffer)?;
    Ok(buffer)
  }

  /// Pack the matrix into an existing buffer.
  ///
  /// The buffer gets zeroed first, so rows which
  /// are not covered by the layout read as zero
  /// and nothing survives from a previous pattern.
  pub fn format_into(&self,
                     matrix : &Array2<u8>,
                     buffer : &mut PatternBuffer) -> Result<(), DriverError> {
    if matrix.dim() != (self.board.num_rows, self.board.num_cols) {
      error!("Matrix has shape {:?}, board is {}x{}!", matrix.dim(), self.board.num_rows, self.board.num_cols);
      return Err(DriverError::InvalidArgument);
    }
    if buffer.len() != self.board.pattern_words() {
      error!("Pattern buffer has {} words, board needs {}!", buffer.len(), self.board.pattern_words());
      return Err(DriverError::InvalidArgument);
    }
    buffer.zero();
    for ((row, col), value) in matrix.indexed_iter() {
      let idx  = self.word_index(row, col);
      let mask = self.bit_mask(col);
      if *value == 1 {
        buffer.words[idx] |= mask;
      } else {
        buffer.words[idx] &= !mask;
      }
    }
    Ok(())
  }

  /// Recover the on/off matrix from packed words,
  /// e.g. a pattern RAM readback
  pub fn unpack(&self, words : &[u32]) -> Result<Array2<u8>, DriverError> {
    if words.len() < self.board.pattern_words() {
      error!("Need {} words to unpack, got {}!", self.board.pattern_words(), words.len());
      return Err(DriverError::InvalidArgument);
    }
    let matrix = Array2::from_shape_fn((self.board.num_rows, self.board.num_cols), |(row, col)| {
      let word = words[self.word_index(row, col)];
      if word & self.bit_mask(col) != 0 { 1 } else { 0 }
    });
    Ok(matrix)
  }
}
