//! ST7789 TFT Display Driver
//!
//! Streams the 240x240 panel as a sequence of horizontal fragments so that
//! pixel generation for one fragment overlaps the DMA transfer of the
//! previous one.
//!
//! ### Usage
//! The driver does not hide that you are rendering into a raw RGB565 buffer.
//! To put something on the screen you:
//!
//! 1. create a [`driver::Display`] with a fill callback that writes one
//!    fragment worth of pixels for a given start row,
//! 1. call [`driver::Display::advance`] in a loop; each call renders and
//!    transmits one fragment and returns `true` whenever a full frame just
//!    finished,
//! 1. drop the display to release the SPI device, the bus and both
//!    DMA buffers.

pub mod bus;
pub mod cmd;
pub mod driver;
pub mod flag;
pub mod interface;
pub mod sequence;

/// Display width, pixels horizontally
pub const DISPLAY_WIDTH: u16 = 240;

/// Display height, pixels vertically
pub const DISPLAY_HEIGHT: u16 = 240;

/// Width of one fragment, always the full panel width
pub const FRAGMENT_WIDTH: u16 = DISPLAY_WIDTH;

/// Height of one fragment; must divide the display height evenly or the
/// row cursor would never wrap
pub const FRAGMENT_HEIGHT: u16 = 24;

/// Number of fragments per full frame
pub const FRAGMENT_COUNT: u16 = DISPLAY_HEIGHT / FRAGMENT_HEIGHT;

/// Size of one fragment buffer in bytes (RGB565, two bytes per pixel)
pub const FRAGMENT_BYTES: usize = FRAGMENT_WIDTH as usize * FRAGMENT_HEIGHT as usize * 2;

const _: () = assert!(
    DISPLAY_HEIGHT % FRAGMENT_HEIGHT == 0,
    "fragment height is not a factor of the display height"
);

/// The side of the display the ribbon cable protrudes from, used to specify
/// display rotation.
///
/// Only two orientations are supported: they can be expressed purely through
/// the memory access control command. The other two would require shifting
/// the write window, because only 240 of the controller's 320 RAM rows are
/// visible and which 80 rows are hidden depends on the orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// Ribbon at the bottom of the panel
    RibbonBottom,
    /// Ribbon at the right of the panel
    RibbonRight,
}

impl Rotation {
    /// The memory access control operand for this orientation.
    pub(crate) fn madctl(self) -> u8 {
        match self {
            Rotation::RibbonBottom => 0,
            Rotation::RibbonRight => {
                flag::Flag::MADCTL_PAGE_COLUMN_SWAP | flag::Flag::MADCTL_COLUMN_RIGHT_TO_LEFT
            }
        }
    }
}
