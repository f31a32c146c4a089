use embedded_graphics::pixelcolor::raw::ToBytes;
use embedded_graphics::pixelcolor::Rgb565;

use st7789_stream::{Display, Rotation, SpiBus, FRAGMENT_HEIGHT, FRAGMENT_WIDTH};

// Wiring for the reference board: display on SPI2 with its CS pin strapped
// to ground. Adjust for other boards.
const DISPLAY_BUS: SpiBus = SpiBus::encode(1, 0, 12, 13, 11);
const PIN_DC: u8 = 4;
const PIN_RESET: u8 = 5;

// https://docs.esp-rs.org/esp-idf-svc/esp_idf_svc/
fn main() -> anyhow::Result<()> {
    // It is necessary to call this function once. Otherwise some patches to the runtime
    // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_svc::sys::link_patches();

    // Bind the log crate to the ESP Logging facilities
    esp_idf_svc::log::EspLogger::initialize_default();

    let mut phase: u16 = 0;
    let mut display = Display::new(
        DISPLAY_BUS,
        PIN_DC,
        PIN_RESET,
        Rotation::RibbonBottom,
        move |buffer, y0| {
            // One scrolling diagonal color wash, advanced once per frame.
            if y0 == 0 {
                phase = phase.wrapping_add(1);
            }
            let mut at = 0;
            for y in y0..y0 + FRAGMENT_HEIGHT {
                for x in 0..FRAGMENT_WIDTH {
                    let wave = x.wrapping_add(y).wrapping_add(phase);
                    let color = Rgb565::new(
                        (wave & 0x1f) as u8,
                        ((wave >> 1) & 0x3f) as u8,
                        ((y >> 3) & 0x1f) as u8,
                    );
                    let [low, high] = color.to_le_bytes();
                    buffer[at] = low;
                    buffer[at + 1] = high;
                    at += 2;
                }
            }
        },
    )?;

    log::info!("streaming test pattern");

    let mut frames: u32 = 0;
    loop {
        if display.advance()? {
            frames += 1;
            if frames % 256 == 0 {
                log::info!("{} frames, {} fps", frames, display.fps());
            }
        }
    }
}
