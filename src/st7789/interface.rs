//! Display transport over the ESP-IDF SPI master driver.
//!
//! Two send paths share one bus device:
//!
//! - a blocking path (`command`/`data`) used only while the bring-up
//!   sequence runs, built on `spi_device_polling_transmit`;
//! - a queued path (`send_fragment`/`wait_fragment`) used for steady-state
//!   streaming: four pre-built transactions per fragment are handed to
//!   `spi_device_queue_trans` and complete via DMA while the CPU renders
//!   the next fragment.
//!
//! The safe `SpiDeviceDriver` API cannot express this protocol (queued
//! transactions plus a pre-transfer callback toggling the data/command
//! GPIO), so the raw `spi_master` bindings are used directly.

use core::ffi::c_void;
use core::ptr;

use esp_idf_svc::hal::delay::BLOCK;
use esp_idf_svc::sys::*;

use crate::st7789::bus::SpiBus;
use crate::st7789::cmd::Cmd;
use crate::st7789::{FRAGMENT_BYTES, FRAGMENT_HEIGHT};

/// Clock used while the bring-up sequence runs.
const BRING_UP_CLOCK_HZ: i32 = 40_000_000;

/// Clock used for fragment streaming once the controller is configured.
const STREAM_CLOCK_HZ: i32 = 80_000_000;

/// In-flight transaction slots on the SPI device queue. One fragment needs
/// four; seven leaves headroom without growing the driver's ISR workload.
const QUEUE_DEPTH: i32 = 7;

/// Largest parameter run staged through DRAM in one transmission.
const STAGE_BYTES: usize = 16;

/// Seam between the rendering pipeline / sequence interpreter and the SPI
/// hardware. The production implementation is [`SpiInterface`]; tests
/// substitute a recording spy.
pub trait DisplayLink {
    /// Send one opcode byte as a command-phase transmission, blocking.
    fn command(&mut self, opcode: u8) -> Result<(), EspError>;

    /// Send parameter bytes as a data-phase transmission, blocking.
    fn data(&mut self, bytes: &[u8]) -> Result<(), EspError>;

    /// Drive the controller reset line.
    fn set_reset(&mut self, high: bool) -> Result<(), EspError>;

    /// Swap the bring-up clock for the streaming clock.
    fn upgrade(&mut self) -> Result<(), EspError>;

    /// Writable access to one of the two fragment buffers.
    fn fragment_mut(&mut self, index: usize) -> &mut [u8];

    /// Queue the asynchronous transactions for one fragment covering image
    /// rows `[y0, y0 + FRAGMENT_HEIGHT)` and return immediately.
    fn send_fragment(&mut self, index: usize, y0: u16) -> Result<(), EspError>;

    /// Block until every transaction of the queued fragment has completed.
    fn wait_fragment(&mut self) -> Result<(), EspError>;
}

/// Whether the bytes of a transaction are a command opcode or data, which
/// decides the level of the D/C GPIO while they are on the wire.
#[derive(Clone, Copy)]
enum MessageKind {
    Command = 0,
    Data = 1,
}

/// The transaction `user` field carries `(kind << 7) | dc_pin` as a plain
/// integer. The dispatch callback below runs in the SPI driver's
/// completion context and must not follow pointers, allocate or block.
fn tag(pin_dc: gpio_num_t, kind: MessageKind) -> *mut c_void {
    (((kind as usize) << 7) | pin_dc as usize) as *mut c_void
}

/// Sets the data/command GPIO immediately before each transaction is
/// clocked out. Registered as the device's `pre_cb`.
extern "C" fn dispatch_data_command(transaction: *mut spi_transaction_t) {
    if let Some(transaction) = unsafe { transaction.as_ref() } {
        let user = transaction.user as usize;
        let pin = (user & 0x7f) as gpio_num_t;
        let level = (user >> 7) as u32;
        unsafe {
            gpio_set_level(pin, level);
        }
    }
}

/// One fragment's worth of DMA-capable RAM. Freeing is tied to `Drop` so a
/// failed second allocation releases the first on the way out.
struct DmaBuffer {
    data: *mut u8,
    len: usize,
}

impl DmaBuffer {
    fn new(len: usize) -> Result<Self, EspError> {
        let data = unsafe { heap_caps_malloc(len, MALLOC_CAP_DMA) } as *mut u8;
        if data.is_null() {
            return Err(EspError::from_infallible::<{ ESP_ERR_NO_MEM }>());
        }
        unsafe { ptr::write_bytes(data, 0, len) };
        Ok(Self { data, len })
    }

    fn as_ptr(&self) -> *const u8 {
        self.data
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.data, self.len) }
    }
}

impl Drop for DmaBuffer {
    fn drop(&mut self) {
        unsafe { heap_caps_free(self.data as *mut c_void) };
    }
}

/// The SPI transport for one display: bus, device, the two fragment
/// buffers and the four reused fragment transactions.
pub struct SpiInterface {
    host: spi_host_device_t,
    device: spi_device_handle_t,
    transactions: [spi_transaction_t; 4],
    fragments: [DmaBuffer; 2],
    pin_dc: gpio_num_t,
    pin_reset: gpio_num_t,
    cs: i32,
    mode: u8,
}

impl SpiInterface {
    /// Claim the control pins, allocate the fragment buffers, initialize
    /// the SPI bus and attach the display device at the bring-up clock.
    ///
    /// Fragment allocation is the only failure callers are expected to
    /// recover from; it reports `ESP_ERR_NO_MEM` and leaves nothing
    /// attached.
    pub fn new(bus: SpiBus, pin_dc: u8, pin_reset: u8) -> Result<Self, EspError> {
        let pin_dc = pin_dc as gpio_num_t;
        let pin_reset = pin_reset as gpio_num_t;

        // Claim the control pins first; this matters even when one of them
        // doubles as a native SPI pin of the chosen host.
        esp!(unsafe { gpio_reset_pin(pin_dc) })?;
        esp!(unsafe { gpio_reset_pin(pin_reset) })?;
        esp!(unsafe { gpio_set_direction(pin_dc, gpio_mode_t_GPIO_MODE_OUTPUT) })?;
        esp!(unsafe { gpio_set_direction(pin_reset, gpio_mode_t_GPIO_MODE_OUTPUT) })?;

        let fragments = [
            DmaBuffer::new(FRAGMENT_BYTES)?,
            DmaBuffer::new(FRAGMENT_BYTES)?,
        ];

        let host = bus.host() as spi_host_device_t;

        #[allow(clippy::needless_update)]
        let bus_config = spi_bus_config_t {
            flags: SPICOMMON_BUSFLAG_MASTER,
            sclk_io_num: bus.sclk() as i32,
            data4_io_num: -1,
            data5_io_num: -1,
            data6_io_num: -1,
            data7_io_num: -1,
            __bindgen_anon_1: spi_bus_config_t__bindgen_ty_1 {
                mosi_io_num: bus.mosi() as i32,
            },
            __bindgen_anon_2: spi_bus_config_t__bindgen_ty_2 {
                // the panel never drives data back
                miso_io_num: -1,
            },
            __bindgen_anon_3: spi_bus_config_t__bindgen_ty_3 { quadwp_io_num: -1 },
            __bindgen_anon_4: spi_bus_config_t__bindgen_ty_4 { quadhd_io_num: -1 },
            max_transfer_sz: (FRAGMENT_BYTES + 8) as i32,
            ..Default::default()
        };

        // 3 == SPI_DMA_CH_AUTO
        esp!(unsafe { spi_bus_initialize(host, &bus_config, 3) })?;

        // A zero CS field means the display's CS pin is strapped to ground
        // on the board: no hardware CS, and the controller then expects
        // SPI mode 3.
        let (mode, cs) = if bus.cs() == 0 {
            (3u8, -1)
        } else {
            (0u8, bus.cs() as i32)
        };

        let device = match add_device(host, cs, mode, BRING_UP_CLOCK_HZ) {
            Ok(device) => device,
            Err(err) => {
                esp!(unsafe { spi_bus_free(host) }).ok();
                return Err(err);
            }
        };

        let mut interface = Self {
            host,
            device,
            transactions: [spi_transaction_t::default(); 4],
            fragments,
            pin_dc,
            pin_reset,
            cs,
            mode,
        };
        interface.prepare_fragment_transactions();

        log::debug!(
            "display SPI ready: host={} sclk={} mosi={} cs={} mode={}",
            bus.host(),
            bus.sclk(),
            bus.mosi(),
            cs,
            mode
        );

        Ok(interface)
    }

    /// Build the four transactions reused for every fragment. Only the row
    /// range operand and the pixel payload pointer change per fragment.
    fn prepare_fragment_transactions(&mut self) {
        let transactions = &mut self.transactions;

        // Row Address Set - command
        transactions[0].flags = SPI_TRANS_USE_TXDATA;
        transactions[0].length = 8;
        transactions[0].__bindgen_anon_1.tx_data = [Cmd::RASET, 0, 0, 0];
        transactions[0].user = tag(self.pin_dc, MessageKind::Command);

        // Row Address Set - start/end rows, patched per fragment
        transactions[1].flags = SPI_TRANS_USE_TXDATA;
        transactions[1].length = 8 * 4;
        transactions[1].user = tag(self.pin_dc, MessageKind::Data);

        // Memory Write - command
        transactions[2].flags = SPI_TRANS_USE_TXDATA;
        transactions[2].length = 8;
        transactions[2].__bindgen_anon_1.tx_data = [Cmd::RAMWR, 0, 0, 0];
        transactions[2].user = tag(self.pin_dc, MessageKind::Command);

        // Memory Write - pixel payload, buffer pointer patched per fragment
        transactions[3].flags = 0;
        transactions[3].length = (FRAGMENT_BYTES * 8) as _;
        transactions[3].user = tag(self.pin_dc, MessageKind::Data);
    }

    fn transmit(&mut self, bytes: &[u8], kind: MessageKind) -> Result<(), EspError> {
        if bytes.is_empty() {
            return Ok(());
        }

        let mut transaction = spi_transaction_t {
            flags: 0,
            length: (bytes.len() * 8) as _,
            user: tag(self.pin_dc, kind),
            __bindgen_anon_1: spi_transaction_t__bindgen_ty_1 {
                tx_buffer: bytes.as_ptr() as *const c_void,
            },
            ..Default::default()
        };

        esp!(unsafe { spi_device_polling_transmit(self.device, &mut transaction) })
    }
}

fn add_device(
    host: spi_host_device_t,
    cs: i32,
    mode: u8,
    clock_speed_hz: i32,
) -> Result<spi_device_handle_t, EspError> {
    let config = spi_device_interface_config_t {
        clock_speed_hz,
        mode,
        spics_io_num: cs,
        queue_size: QUEUE_DEPTH,
        pre_cb: Some(dispatch_data_command),
        ..Default::default()
    };

    let mut handle: spi_device_handle_t = ptr::null_mut();
    esp!(unsafe { spi_bus_add_device(host, &config, &mut handle as *mut _) })?;
    Ok(handle)
}

impl DisplayLink for SpiInterface {
    fn command(&mut self, opcode: u8) -> Result<(), EspError> {
        self.transmit(&[opcode], MessageKind::Command)
    }

    fn data(&mut self, bytes: &[u8]) -> Result<(), EspError> {
        // Parameter tables live in flash, which DMA cannot read; stage
        // through a small stack buffer in DRAM.
        let mut stage = [0u8; STAGE_BYTES];
        for chunk in bytes.chunks(STAGE_BYTES) {
            stage[..chunk.len()].copy_from_slice(chunk);
            self.transmit(&stage[..chunk.len()], MessageKind::Data)?;
        }
        Ok(())
    }

    fn set_reset(&mut self, high: bool) -> Result<(), EspError> {
        esp!(unsafe { gpio_set_level(self.pin_reset, high as u32) })
    }

    fn upgrade(&mut self) -> Result<(), EspError> {
        // Replace the bring-up device with an identically configured one at
        // the streaming clock. The controller keeps its state; only the
        // host-side device changes.
        esp!(unsafe { spi_bus_remove_device(self.device) })?;
        self.device = add_device(self.host, self.cs, self.mode, STREAM_CLOCK_HZ)?;
        log::debug!("display SPI device upgraded to {} Hz", STREAM_CLOCK_HZ);
        Ok(())
    }

    fn fragment_mut(&mut self, index: usize) -> &mut [u8] {
        self.fragments[index].as_mut_slice()
    }

    fn send_fragment(&mut self, index: usize, y0: u16) -> Result<(), EspError> {
        let y1 = y0 + FRAGMENT_HEIGHT - 1;
        self.transactions[1].__bindgen_anon_1.tx_data =
            [(y0 >> 8) as u8, (y0 & 0xff) as u8, (y1 >> 8) as u8, (y1 & 0xff) as u8];
        self.transactions[3].__bindgen_anon_1.tx_buffer =
            self.fragments[index].as_ptr() as *const c_void;

        for transaction in self.transactions.iter_mut() {
            esp!(unsafe { spi_device_queue_trans(self.device, transaction as *mut _, BLOCK) })?;
        }
        Ok(())
    }

    fn wait_fragment(&mut self) -> Result<(), EspError> {
        for _ in 0..self.transactions.len() {
            let mut finished: *mut spi_transaction_t = ptr::null_mut();
            esp!(unsafe { spi_device_get_trans_result(self.device, &mut finished, BLOCK) })?;
        }
        Ok(())
    }
}

impl Drop for SpiInterface {
    fn drop(&mut self) {
        esp!(unsafe { spi_bus_remove_device(self.device) }).unwrap();
        esp!(unsafe { spi_bus_free(self.host) }).unwrap();
    }
}

#[cfg(test)]
pub mod test_spy {
    //! A link implementation for unit tests that records everything the
    //! pipeline and the sequence interpreter do to it.

    use super::DisplayLink;
    use esp_idf_svc::sys::EspError;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Event {
        Command(u8),
        Data(Vec<u8>),
        Reset(bool),
        Upgrade,
        Fill { index: usize },
        Queue { index: usize, y0: u16 },
        Wait,
    }

    pub struct SpyLink {
        pub events: Vec<Event>,
        fragments: [Vec<u8>; 2],
    }

    impl SpyLink {
        pub fn new(fragment_len: usize) -> Self {
            SpyLink {
                events: Vec::new(),
                fragments: [vec![0; fragment_len], vec![0; fragment_len]],
            }
        }

        pub fn queued(&self) -> Vec<(usize, u16)> {
            self.events
                .iter()
                .filter_map(|event| match event {
                    Event::Queue { index, y0 } => Some((*index, *y0)),
                    _ => None,
                })
                .collect()
        }
    }

    impl DisplayLink for SpyLink {
        fn command(&mut self, opcode: u8) -> Result<(), EspError> {
            self.events.push(Event::Command(opcode));
            Ok(())
        }

        fn data(&mut self, bytes: &[u8]) -> Result<(), EspError> {
            self.events.push(Event::Data(bytes.to_vec()));
            Ok(())
        }

        fn set_reset(&mut self, high: bool) -> Result<(), EspError> {
            self.events.push(Event::Reset(high));
            Ok(())
        }

        fn upgrade(&mut self) -> Result<(), EspError> {
            self.events.push(Event::Upgrade);
            Ok(())
        }

        fn fragment_mut(&mut self, index: usize) -> &mut [u8] {
            self.events.push(Event::Fill { index });
            &mut self.fragments[index]
        }

        fn send_fragment(&mut self, index: usize, y0: u16) -> Result<(), EspError> {
            self.events.push(Event::Queue { index, y0 });
            Ok(())
        }

        fn wait_fragment(&mut self) -> Result<(), EspError> {
            self.events.push(Event::Wait);
            Ok(())
        }
    }
}
