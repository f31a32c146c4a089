/// Parameter components for the ST7789 commands this driver sends.
///
/// Grouped by the command whose operand byte they belong to; values are
/// OR-ed together to form the transmitted operand.
pub struct Flag;
#[allow(missing_docs)]
impl Flag {
    // Memory Data Access Control (0x36) operand bits
    pub const MADCTL_PAGE_BOTTOM_TO_TOP: u8 = 1 << 7;
    pub const MADCTL_COLUMN_RIGHT_TO_LEFT: u8 = 1 << 6;
    pub const MADCTL_PAGE_COLUMN_SWAP: u8 = 1 << 5;
    pub const MADCTL_LINE_BOTTOM_TO_TOP: u8 = 1 << 4;
    pub const MADCTL_BGR: u8 = 1 << 3;
    pub const MADCTL_LATCH_RIGHT_TO_LEFT: u8 = 1 << 2;

    // Interface Pixel Format (0x3a) operand components
    pub const COLMOD_FORMAT_65K: u8 = 0x50;
    pub const COLMOD_FORMAT_262K: u8 = 0x30;
    pub const COLMOD_WIDTH_12BIT: u8 = 0x03;
    pub const COLMOD_WIDTH_16BIT: u8 = 0x05;
    pub const COLMOD_WIDTH_18BIT: u8 = 0x06;

    // RAM Control (0xb0), two operands; the second selects how 16-bit
    // pixels are picked apart on the wire
    pub const RAMCTRL_1: u8 = 0x00;
    pub const RAMCTRL_2: u8 = 0xf0;
    pub const RAMCTRL_2_ENDIAN_LITTLE: u8 = 0x08;
    pub const RAMCTRL_2_TRANS_MSB: u8 = 0x04;

    // LCM Control (0xc0) operand bits
    pub const LCMCTRL_XMY: u8 = 1 << 6;
    pub const LCMCTRL_XBGR: u8 = 1 << 5;
    pub const LCMCTRL_XREV: u8 = 1 << 4;
    pub const LCMCTRL_XMX: u8 = 1 << 3;
    pub const LCMCTRL_XMH: u8 = 1 << 2;
    pub const LCMCTRL_XMV: u8 = 1 << 1;
    pub const LCMCTRL_XGS: u8 = 1 << 0;

    // Frame Rate Control (0xc6)
    pub const FRCTRL2_60HZ: u8 = 0x0f;

    // Power Control 1 (0xd0), two operands
    pub const PWCTRL1_1: u8 = 0xa4;
    pub const PWCTRL1_2_AVDD_6_8: u8 = 0x80;
    pub const PWCTRL1_2_AVCL_4_8: u8 = 0x20;
    pub const PWCTRL1_2_VDS_2_3: u8 = 0x01;
}
