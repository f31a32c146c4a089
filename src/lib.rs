//! Double-buffered DMA fragment streaming for ST7789 TFT displays on
//! ESP-IDF.
//!
//! The 240x240 panel is streamed as horizontal fragments: while the SPI
//! peripheral clocks one fragment out via DMA, the caller's fill callback
//! renders the next one into the second buffer. One `advance` call per
//! fragment is all the API there is; ten of them make a frame.
//!
//! ```no_run
//! use st7789_stream::{Display, Rotation, SpiBus};
//!
//! let bus = SpiBus::encode(1, 0, 12, 13, 11); // SPI2, CS strapped low
//! let mut display = Display::new(bus, 4, 5, Rotation::RibbonBottom, |buffer, _y0| {
//!     // fill one fragment of RGB565 pixels starting at image row _y0
//!     buffer.fill(0);
//! })?;
//!
//! for _ in 0..st7789_stream::FRAGMENT_COUNT {
//!     let frame_done = display.advance()?;
//!     if frame_done {
//!         log::info!("frame done, {} fps", display.fps());
//!     }
//! }
//! # Ok::<(), esp_idf_svc::sys::EspError>(())
//! ```

pub mod st7789;

pub use crate::st7789::bus::SpiBus;
pub use crate::st7789::driver::Display;
pub use crate::st7789::{
    Rotation, DISPLAY_HEIGHT, DISPLAY_WIDTH, FRAGMENT_BYTES, FRAGMENT_COUNT, FRAGMENT_HEIGHT,
    FRAGMENT_WIDTH,
};
