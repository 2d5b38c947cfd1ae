//! Board and hardware constants of the KDK
//! row and column driver.
//!
//! The board specific tables (geometry, active
//! cell mask, column layout) are loaded from a
//! board file, see `board.rs`. The numbers here
//! are the dimensions those tables have to agree
//! with on the reference board.

/// Upper bound for the rows of the dense modulation matrix
pub const MAX_ROWS        : usize = 160;
/// Upper bound for the columns of the dense modulation matrix
pub const MAX_COLS        : usize = 160;

/// Rows of the KDK radial feed panel
pub const NUM_ROWS        : usize = 105;
/// Columns of the KDK radial feed panel
pub const NUM_COLS        : usize = 158;
/// Number of 32bit words in pattern RAM which
/// are dedicated to a single matrix row
pub const ROW_GROUP_SIZE  : usize = 10;
/// Number of active (radiating) cells on the KDK board
pub const ACTV_CELLS      : usize = 8208;
/// Modulation levels per cell (2 = binary on/off)
pub const GRAY_SHADES     : u8    = 2;

/// Words in the packed pattern buffer on the
/// reference board (NUM_ROWS * ROW_GROUP_SIZE)
pub const PATTERN_BUFFER_WORDS : usize = NUM_ROWS * ROW_GROUP_SIZE;

// memory map of the aperture control device
pub const PAGE_SIZE          : usize = 4096;
pub const NUM_PAGES          : usize = 16;
/// Size of the mapped hardware window in bytes
pub const WINDOW_SIZE        : usize = PAGE_SIZE * NUM_PAGES;
/// Pattern RAM starts 8 pages into the window
pub const PATTERN_RAM_OFFSET : usize = 8 * PAGE_SIZE;
/// Size of the pattern RAM in bytes
pub const PATTERN_RAM_SIZE   : usize = WINDOW_SIZE - PATTERN_RAM_OFFSET;
/// The size of a 32bit unsigned int in byte
/// (all registers and pattern RAM words are u32)
pub const SIZEOF_U32         : usize = 4;
/// Number of 32bit words in pattern RAM
pub const PATTERN_RAM_WORDS  : usize = PATTERN_RAM_SIZE / SIZEOF_U32;

/// Start bits of the two usable byte lanes in a pattern
/// RAM word. Lanes 0 (bits 0-7) and 2 (bits 16-23)
/// are unused and always zero.
pub const LANE_1_START : u8 = 8;
pub const LANE_3_START : u8 = 24;
