//! Controller bring-up as a compact command bytecode.
//!
//! The sequence taking the ST7789 from hardware reset to its first pixel is
//! data, not code: a flat byte stream of `[opcode][param_count][params...]`
//! records, plus three pseudo-operations that never reach the bus. The
//! interpreter walks it front-to-back, blocking the caller throughout;
//! bring-up is one-time setup latency and simplicity wins over speed here.
//!
//! Tables are trusted input, correct by construction. A missing terminator
//! or an overrunning parameter count is a contract violation that the
//! reader's slice indexing catches only as a best-effort panic.

use embedded_hal::delay::DelayNs;
use esp_idf_svc::sys::EspError;

use crate::st7789::cmd::Cmd;
use crate::st7789::flag::Flag;
use crate::st7789::interface::DisplayLink;
use crate::st7789::{Rotation, DISPLAY_WIDTH};

// Pseudo-operation opcodes, 2-byte records except the bare terminator.
//
// These byte values sit in gaps of the ST7789 command map. That makes the
// flat encoding unambiguous for this controller family only: a controller
// that assigns real commands at 0xfd..0xff could not share this format.
const OP_DONE: u8 = 0xfd;
const OP_RESET_PIN: u8 = 0xfe;
const OP_WAIT: u8 = 0xff;

/// Bring-up sequence for the 240x240 ST7789 panel.
///
/// The memory access control operand is a placeholder: the interpreter
/// substitutes the value derived from the requested [`Rotation`]. The
/// column window is set once here for the full panel width; the row window
/// is sent per fragment by the streaming transport.
#[rustfmt::skip]
pub static BRING_UP: &[u8] = &[
    OP_RESET_PIN,  0,
    OP_WAIT,       1,
    OP_RESET_PIN,  1,
    OP_WAIT,       6,
    Cmd::MADCTL,   1,  0, // placeholder, operand comes from the rotation
    Cmd::COLMOD,   1,  Flag::COLMOD_FORMAT_65K | Flag::COLMOD_WIDTH_16BIT,
    Cmd::RAMCTRL,  2,
        Flag::RAMCTRL_1,
        Flag::RAMCTRL_2 | Flag::RAMCTRL_2_ENDIAN_LITTLE | Flag::RAMCTRL_2_TRANS_MSB,
    Cmd::PORCTRL,  5,  0x0c, 0x0c, 0x00, 0x33, 0x33,
    Cmd::GCTRL,    1,  0x45, // Vgh=13.65V, Vgl=-10.43V
    Cmd::VCOMS,    1,  0x2b, // VCOM=1.175V
    Cmd::LCMCTRL,  1,  Flag::LCMCTRL_XBGR | Flag::LCMCTRL_XMX | Flag::LCMCTRL_XMH,
    Cmd::VDVVRHEN, 2,  0x01, 0xff,
    Cmd::VRHS,     1,  0x11, // Vap=4.4+
    Cmd::VDVS,     1,  0x20, // VDV=0
    Cmd::FRCTRL2,  1,  Flag::FRCTRL2_60HZ,
    Cmd::PWCTRL1,  2,
        Flag::PWCTRL1_1,
        Flag::PWCTRL1_2_AVDD_6_8 | Flag::PWCTRL1_2_AVCL_4_8 | Flag::PWCTRL1_2_VDS_2_3,
    Cmd::PVGAMCTRL, 14,
        0xd0, 0x00, 0x05, 0x0e, 0x15, 0x0d, 0x37, 0x43, 0x47, 0x09,
        0x15, 0x12, 0x16, 0x19,
    Cmd::NVGAMCTRL, 14,
        0xd0, 0x00, 0x05, 0x0d, 0x0c, 0x06, 0x2d, 0x44, 0x40, 0x0e,
        0x1c, 0x18, 0x16, 0x19,
    Cmd::SLPOUT,   0,
    OP_WAIT,       6, // sleep-out needs 5ms before the next command
    Cmd::DISPON,   0,
    Cmd::INVON,    0,
    Cmd::NORON,    0,
    Cmd::CASET,    4,
        0,
        0,
        ((DISPLAY_WIDTH - 1) >> 8) as u8,
        ((DISPLAY_WIDTH - 1) & 0xff) as u8,
    OP_DONE,
];

/// One decoded record of a bring-up table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqOp<'a> {
    /// A real controller command and its parameter bytes.
    Command { opcode: u8, params: &'a [u8] },
    /// Block the caller for `ms` milliseconds, no bus activity.
    Wait { ms: u8 },
    /// Drive the reset GPIO to the given level.
    ResetPin { high: bool },
    /// End of sequence.
    Done,
}

/// Cursor over the flat record encoding. Yields nothing past `Done`.
pub struct SeqReader<'a> {
    table: &'a [u8],
    at: usize,
    finished: bool,
}

impl<'a> SeqReader<'a> {
    pub fn new(table: &'a [u8]) -> Self {
        SeqReader {
            table,
            at: 0,
            finished: false,
        }
    }
}

impl<'a> Iterator for SeqReader<'a> {
    type Item = SeqOp<'a>;

    fn next(&mut self) -> Option<SeqOp<'a>> {
        if self.finished {
            return None;
        }
        let opcode = *self.table.get(self.at)?;
        self.at += 1;

        Some(match opcode {
            OP_DONE => {
                self.finished = true;
                SeqOp::Done
            }
            OP_WAIT => {
                let ms = self.table[self.at];
                self.at += 1;
                SeqOp::Wait { ms }
            }
            OP_RESET_PIN => {
                let level = self.table[self.at];
                self.at += 1;
                SeqOp::ResetPin { high: level != 0 }
            }
            _ => {
                let count = self.table[self.at] as usize;
                self.at += 1;
                let params = &self.table[self.at..self.at + count];
                self.at += count;
                SeqOp::Command { opcode, params }
            }
        })
    }
}

/// Walk `table` and drive the controller from hardware reset to the
/// first-pixel-ready state, blocking until the terminator.
///
/// Commands are sent as one command-phase byte followed by their parameter
/// bytes as a data-phase transmission. The memory access control command is
/// the single exception: its operand is computed from `rotation` and
/// overrides whatever byte the table holds at that position.
pub fn run<L, D>(
    link: &mut L,
    delay: &mut D,
    table: &[u8],
    rotation: Rotation,
) -> Result<(), EspError>
where
    L: DisplayLink,
    D: DelayNs,
{
    for op in SeqReader::new(table) {
        match op {
            SeqOp::Wait { ms } => delay.delay_ms(ms as u32),
            SeqOp::ResetPin { high } => link.set_reset(high)?,
            SeqOp::Done => break,
            SeqOp::Command { opcode, params } => {
                link.command(opcode)?;
                if opcode == Cmd::MADCTL {
                    link.data(&[rotation.madctl()])?;
                } else if !params.is_empty() {
                    link.data(params)?;
                }
            }
        }
    }
    Ok(())
}
