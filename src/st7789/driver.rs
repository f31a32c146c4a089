//! The fragment rendering pipeline.
//!
//! A frame is produced as `FRAGMENT_COUNT` horizontal strips. Each
//! [`Display::advance`] call fills the free fragment buffer through the
//! caller's render callback while the other buffer is still being clocked
//! out by DMA, then swaps the two. Pipeline depth is exactly one fragment:
//! deep enough to overlap compute with transfer, shallow enough that two
//! buffers and no locks suffice.

use esp_idf_svc::hal::delay::{Delay, TickType};
use esp_idf_svc::sys::{xTaskGetTickCount, EspError};

use crate::st7789::bus::SpiBus;
use crate::st7789::interface::{DisplayLink, SpiInterface};
use crate::st7789::{sequence, Rotation, DISPLAY_HEIGHT, FRAGMENT_COUNT, FRAGMENT_HEIGHT};

/// Milliseconds on the FreeRTOS tick clock.
fn now_ms() -> u32 {
    TickType(unsafe { xTaskGetTickCount() }).as_millis_u32()
}

/// A streaming display context.
///
/// Construction blocks until the controller is fully initialized and
/// streaming-ready; afterwards the only way the context changes is through
/// [`Display::advance`]. Dropping it releases the SPI device, the bus and
/// both fragment buffers.
///
/// One task owns and drives a context. Sharing it across tasks is not
/// serialized internally and is outside the contract.
pub struct Display<L, R>
where
    L: DisplayLink,
    R: FnMut(&mut [u8], u16),
{
    link: L,
    render: R,

    /// Buffer index the DMA engine may still be reading; `None` only
    /// before the first fragment. The other index is always the writable
    /// backbuffer.
    inflight: Option<usize>,

    /// Next fragment's top row; multiple of `FRAGMENT_HEIGHT`, wraps at
    /// `DISPLAY_HEIGHT`.
    current_y: u16,

    stats: FpsCounter,
}

impl<R> Display<SpiInterface, R>
where
    R: FnMut(&mut [u8], u16),
{
    /// Bring up the display on `bus` and return a streaming-ready context.
    ///
    /// Runs the whole bring-up sequence at the low clock, then reattaches
    /// the bus device at the streaming clock. Fails with `ESP_ERR_NO_MEM`
    /// when the DMA fragment buffers cannot be allocated; nothing stays
    /// attached in that case.
    ///
    /// `render` is called once per fragment with the backbuffer and the
    /// fragment's top row. It must fill exactly
    /// `FRAGMENT_WIDTH * FRAGMENT_HEIGHT` RGB565 pixels, row-major,
    /// little-endian byte order.
    pub fn new(
        bus: SpiBus,
        pin_dc: u8,
        pin_reset: u8,
        rotation: Rotation,
        render: R,
    ) -> Result<Self, EspError> {
        let mut link = SpiInterface::new(bus, pin_dc, pin_reset)?;

        log::info!("running display bring-up sequence");
        let mut delay = Delay::default();
        sequence::run(&mut link, &mut delay, sequence::BRING_UP, rotation)?;
        link.upgrade()?;
        log::info!(
            "display streaming-ready, {} fragments per frame",
            FRAGMENT_COUNT
        );

        Ok(Self::from_link(link, render))
    }
}

impl<L, R> Display<L, R>
where
    L: DisplayLink,
    R: FnMut(&mut [u8], u16),
{
    fn from_link(link: L, render: R) -> Self {
        Display {
            link,
            render,
            inflight: None,
            current_y: 0,
            stats: FpsCounter::new(now_ms()),
        }
    }

    /// Render and transmit the next fragment.
    ///
    /// Returns `Ok(true)` exactly when the fragment just queued completes
    /// a frame. An `Err` means the hardware failed a transaction; the
    /// pipeline has no recovery path and the context must not be used
    /// further.
    pub fn advance(&mut self) -> Result<bool, EspError> {
        // Select the free fragment; the inflight one may still be feeding
        // the DMA engine.
        let backbuffer = match self.inflight {
            Some(0) => 1,
            _ => 0,
        };

        let y0 = self.current_y;
        (self.render)(self.link.fragment_mut(backbuffer), y0);

        // Wait for the previous transactions (none on the very first
        // call). The overlap ends here: the callback above ran while the
        // previous fragment was on the wire.
        if self.inflight.is_some() {
            self.link.wait_fragment()?;
        }

        self.inflight = Some(backbuffer);
        self.link.send_fragment(backbuffer, y0)?;

        self.current_y += FRAGMENT_HEIGHT;
        if self.current_y == DISPLAY_HEIGHT {
            self.current_y = 0;
            self.stats.frame_done(now_ms());
            return Ok(true);
        }
        Ok(false)
    }

    /// Frames per second over the last closed one-second window; 0 until
    /// the first window closes.
    pub fn fps(&self) -> u16 {
        self.stats.rate()
    }
}

/// Frame-rate statistic over one-second measurement windows.
struct FpsCounter {
    window_start: u32,
    frames: u16,
    rate: u16,
}

impl FpsCounter {
    fn new(now_ms: u32) -> Self {
        FpsCounter {
            window_start: now_ms,
            frames: 0,
            rate: 0,
        }
    }

    /// Record a completed frame. Once more than a second has elapsed the
    /// window closes: the measured rate is published and the counters
    /// restart.
    fn frame_done(&mut self, now_ms: u32) {
        self.frames += 1;
        let elapsed = now_ms.wrapping_sub(self.window_start);
        if elapsed > 1000 {
            self.rate = (1000 * self.frames as u32 / elapsed) as u16;
            self.frames = 0;
            self.window_start = now_ms;
        }
    }

    fn rate(&self) -> u16 {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::st7789::interface::test_spy::{Event, SpyLink};
    use crate::st7789::FRAGMENT_BYTES;

    fn test_display() -> Display<SpyLink, impl FnMut(&mut [u8], u16)> {
        Display::from_link(SpyLink::new(FRAGMENT_BYTES), |buffer, y0| {
            buffer[0] = (y0 / FRAGMENT_HEIGHT) as u8;
        })
    }

    #[test]
    fn frame_completes_on_the_last_fragment_only() {
        let mut display = test_display();

        // 240 rows in 24-row fragments: ten advances per frame, and only
        // the tenth reports a completed frame.
        for frame in 0..3 {
            for i in 0..FRAGMENT_COUNT {
                let done = display.advance().unwrap();
                assert_eq!(
                    done,
                    i == FRAGMENT_COUNT - 1,
                    "frame {} call {}",
                    frame,
                    i
                );
            }
            assert_eq!(display.current_y, 0);
        }
    }

    #[test]
    fn row_cursor_cycles_and_wraps() {
        let mut display = test_display();
        for _ in 0..2 * FRAGMENT_COUNT {
            display.advance().unwrap();
        }

        let rows: Vec<u16> = display.link.queued().iter().map(|(_, y0)| *y0).collect();
        let one_frame: Vec<u16> = (0..FRAGMENT_COUNT).map(|i| i * FRAGMENT_HEIGHT).collect();
        let expected: Vec<u16> = one_frame.iter().chain(one_frame.iter()).copied().collect();
        assert_eq!(rows, expected);
    }

    #[test]
    fn backbuffer_is_never_the_inflight_buffer() {
        let mut display = test_display();
        for _ in 0..3 {
            display.advance().unwrap();
        }

        // First call fills buffer 0 with nothing inflight, so there is no
        // wait. Every later call fills the other buffer than the one still
        // on the wire, and only waits after that fill.
        assert_eq!(
            display.link.events,
            vec![
                Event::Fill { index: 0 },
                Event::Queue { index: 0, y0: 0 },
                Event::Fill { index: 1 },
                Event::Wait,
                Event::Queue { index: 1, y0: 24 },
                Event::Fill { index: 0 },
                Event::Wait,
                Event::Queue { index: 0, y0: 48 },
            ]
        );
    }

    #[test]
    fn fill_alternates_between_the_two_buffers() {
        let mut display = test_display();
        for _ in 0..2 * FRAGMENT_COUNT {
            display.advance().unwrap();
        }

        let mut queued_before = None;
        for event in &display.link.events {
            match event {
                Event::Fill { index } => {
                    assert_ne!(Some(*index), queued_before, "filling the inflight buffer");
                }
                Event::Queue { index, .. } => queued_before = Some(*index),
                _ => {}
            }
        }
    }

    #[test]
    fn fps_is_zero_until_the_first_window_closes() {
        let mut fps = FpsCounter::new(0);
        for i in 1..=30u32 {
            fps.frame_done(i * 33); // completions up to t=990
        }
        assert_eq!(fps.rate(), 0);
    }

    #[test]
    fn fps_window_publishes_and_resets() {
        let mut fps = FpsCounter::new(0);

        // ~30 frames per second; the completion that crosses the one
        // second boundary closes the window.
        for i in 1..=30u32 {
            fps.frame_done(i * 33);
        }
        fps.frame_done(1023);
        assert_eq!(fps.rate(), 30);

        // Counters restarted: further completions inside the new window
        // leave the published rate untouched.
        for i in 1..=10u32 {
            fps.frame_done(1023 + i * 33);
        }
        assert_eq!(fps.rate(), 30);

        // A slower second window replaces the rate once it closes.
        fps.frame_done(1023 + 1100);
        assert_eq!(fps.rate(), 10); // 11 frames in 1100ms
    }
}
