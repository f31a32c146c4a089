/// ST7789 command opcodes used by this driver.
pub struct Cmd;
impl Cmd {
    pub const NOP: u8 = 0x00;
    pub const SWRESET: u8 = 0x01;
    pub const SLPOUT: u8 = 0x11;
    pub const NORON: u8 = 0x13;

    pub const INVOFF: u8 = 0x20;
    pub const INVON: u8 = 0x21;
    pub const DISPON: u8 = 0x29;

    pub const CASET: u8 = 0x2a;
    pub const RASET: u8 = 0x2b;
    pub const RAMWR: u8 = 0x2c;

    pub const MADCTL: u8 = 0x36;
    pub const COLMOD: u8 = 0x3a;

    pub const RAMCTRL: u8 = 0xb0;
    pub const PORCTRL: u8 = 0xb2;
    pub const GCTRL: u8 = 0xb7;
    pub const VCOMS: u8 = 0xbb;

    pub const LCMCTRL: u8 = 0xc0;
    pub const VDVVRHEN: u8 = 0xc2;
    pub const VRHS: u8 = 0xc3;
    pub const VDVS: u8 = 0xc4;
    pub const FRCTRL2: u8 = 0xc6;

    pub const PWCTRL1: u8 = 0xd0;

    pub const PVGAMCTRL: u8 = 0xe0;
    pub const NVGAMCTRL: u8 = 0xe1;
}
