//! Packed SPI bus descriptors.
//!
//! A bus assignment (host plus the four SPI pins) is carried around as one
//! packed integer so that board configurations stay plain numeric constants.
//! Five fields of six bits each, wide enough for every GPIO number on the
//! supported chips:
//!
//! ```text
//! bit 29..24  host index
//! bit 23..18  CS pin
//! bit 17..12  SCLK pin
//! bit 11..6   MISO pin
//! bit  5..0   MOSI pin
//! ```
//!
//! Displays frequently have their CS pin strapped to ground on the board; a
//! descriptor with a zero CS field means exactly that, and
//! [`SpiBus::without_cs`] derives the strapped variant of a wired one.

const FIELD_WIDTH: u32 = 6;
const FIELD_MASK: u32 = (1 << FIELD_WIDTH) - 1;

const HOST_OFFSET: u32 = 24;
const CS_OFFSET: u32 = 18;
const SCLK_OFFSET: u32 = 12;
const MISO_OFFSET: u32 = 6;
const MOSI_OFFSET: u32 = 0;

/// A SPI host and pin assignment packed into one integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiBus(u32);

impl SpiBus {
    /// Pack a host index and four pin numbers into a descriptor.
    ///
    /// Values wider than six bits are truncated to their low six bits.
    pub const fn encode(host: u8, cs: u8, sclk: u8, miso: u8, mosi: u8) -> Self {
        SpiBus(
            field(host, HOST_OFFSET)
                | field(cs, CS_OFFSET)
                | field(sclk, SCLK_OFFSET)
                | field(miso, MISO_OFFSET)
                | field(mosi, MOSI_OFFSET),
        )
    }

    /// The same bus with the CS field cleared, for displays whose CS pin is
    /// tied to ground externally.
    pub const fn without_cs(self) -> Self {
        SpiBus(self.0 & !(FIELD_MASK << CS_OFFSET))
    }

    /// Unpack into `(host, cs, sclk, miso, mosi)`.
    pub const fn decode(self) -> (u8, u8, u8, u8, u8) {
        (self.host(), self.cs(), self.sclk(), self.miso(), self.mosi())
    }

    pub const fn host(self) -> u8 {
        unfield(self.0, HOST_OFFSET)
    }

    pub const fn cs(self) -> u8 {
        unfield(self.0, CS_OFFSET)
    }

    pub const fn sclk(self) -> u8 {
        unfield(self.0, SCLK_OFFSET)
    }

    pub const fn miso(self) -> u8 {
        unfield(self.0, MISO_OFFSET)
    }

    pub const fn mosi(self) -> u8 {
        unfield(self.0, MOSI_OFFSET)
    }

    /// The raw packed value, the form persisted in board configuration.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Rebuild a descriptor from its raw packed value.
    pub const fn from_raw(raw: u32) -> Self {
        SpiBus(raw)
    }
}

const fn field(value: u8, offset: u32) -> u32 {
    (value as u32 & FIELD_MASK) << offset
}

const fn unfield(packed: u32, offset: u32) -> u8 {
    ((packed >> offset) & FIELD_MASK) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_exact() {
        // Every field value that fits its six-bit slot must survive.
        for value in 0..=63u8 {
            assert_eq!(SpiBus::encode(value, 0, 0, 0, 0).host(), value);
            assert_eq!(SpiBus::encode(0, value, 0, 0, 0).cs(), value);
            assert_eq!(SpiBus::encode(0, 0, value, 0, 0).sclk(), value);
            assert_eq!(SpiBus::encode(0, 0, 0, value, 0).miso(), value);
            assert_eq!(SpiBus::encode(0, 0, 0, 0, value).mosi(), value);
        }
    }

    #[test]
    fn decode_inverts_encode() {
        for host in [0u8, 1, 2, 63] {
            for pin in [0u8, 1, 11, 13, 45, 48, 63] {
                let bus = SpiBus::encode(host, pin, 63 - pin, pin ^ 0x15, pin.wrapping_add(7) & 63);
                assert_eq!(
                    bus.decode(),
                    (host, pin, 63 - pin, pin ^ 0x15, pin.wrapping_add(7) & 63)
                );
            }
        }
    }

    #[test]
    fn fields_do_not_bleed_into_neighbours() {
        // Adjacent low/high field values must not disturb each other.
        let bus = SpiBus::encode(1, 13, 63, 0, 63);
        assert_eq!(bus.host(), 1);
        assert_eq!(bus.cs(), 13);
        assert_eq!(bus.sclk(), 63);
        assert_eq!(bus.miso(), 0);
        assert_eq!(bus.mosi(), 63);
    }

    #[test]
    fn cs_variants_differ_only_in_cs_field() {
        let wired = SpiBus::encode(1, 45, 12, 13, 11);
        let strapped = wired.without_cs();

        assert_eq!(strapped.cs(), 0);
        assert_eq!(strapped, SpiBus::encode(1, 0, 12, 13, 11));

        let difference = wired.raw() ^ strapped.raw();
        assert_eq!(difference & !(0x3f << 18), 0);
    }

    #[test]
    fn raw_round_trip() {
        let bus = SpiBus::encode(2, 5, 18, 19, 23);
        assert_eq!(SpiBus::from_raw(bus.raw()), bus);
    }
}
