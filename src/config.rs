//! Baud rate divisor and line control calculation.

use core::fmt;
use core::num::NonZeroU32;
use core::str::FromStr;

use crate::Error;

/// Crystal fitted to the X16 serial cards.
pub const CRYSTAL_HZ: u32 = 14_745_600;

/// The UART samples each bit 16 times.
pub const OVERSAMPLING: u32 = 16;

/// [`CRYSTAL_HZ`] divided by the oversampling factor, the clock every divisor
/// calculation in this crate expects.
pub const DEFAULT_CLOCK: u32 = CRYSTAL_HZ / OVERSAMPLING;

/// Parity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    /// No parity bit.
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

impl Parity {
    /// The conventional single letter, as in `8N1`.
    pub const fn as_char(self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        }
    }
}

impl TryFrom<char> for Parity {
    type Error = Error;

    fn try_from(c: char) -> Result<Self, Error> {
        match c.to_ascii_uppercase() {
            'N' => Ok(Parity::None),
            'O' => Ok(Parity::Odd),
            'E' => Ok(Parity::Even),
            _ => Err(Error::InvalidParity(c)),
        }
    }
}

/// A baud rate, either one of the standard rates or a custom one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BaudRate {
    /// 300 baud.
    B300,
    /// 600 baud.
    B600,
    /// 1200 baud.
    B1200,
    /// 2400 baud.
    B2400,
    /// 4800 baud.
    B4800,
    /// 9600 baud.
    B9600,
    /// 14400 baud.
    B14400,
    /// 19200 baud.
    B19200,
    /// 28800 baud.
    B28800,
    /// 38400 baud.
    B38400,
    /// 57600 baud.
    B57600,
    /// 115200 baud.
    B115200,
    /// 230400 baud.
    B230400,
    /// 460800 baud.
    B460800,
    /// 921600 baud.
    B921600,
    /// Any other rate. The literal rate is kept here.
    Custom(u32),
}

const STANDARD_RATES: [(BaudRate, u32); 15] = [
    (BaudRate::B300, 300),
    (BaudRate::B600, 600),
    (BaudRate::B1200, 1200),
    (BaudRate::B2400, 2400),
    (BaudRate::B4800, 4800),
    (BaudRate::B9600, 9600),
    (BaudRate::B14400, 14400),
    (BaudRate::B19200, 19200),
    (BaudRate::B28800, 28800),
    (BaudRate::B38400, 38400),
    (BaudRate::B57600, 57600),
    (BaudRate::B115200, 115_200),
    (BaudRate::B230400, 230_400),
    (BaudRate::B460800, 460_800),
    (BaudRate::B921600, 921_600),
];

impl BaudRate {
    /// Maps a numeric rate onto the standard table, falling back to
    /// [`BaudRate::Custom`].
    pub fn from_rate(rate: u32) -> BaudRate {
        STANDARD_RATES
            .iter()
            .find(|&&(_, r)| r == rate)
            .map_or(BaudRate::Custom(rate), |&(baud, _)| baud)
    }

    /// The rate in bits per second.
    pub fn rate(self) -> u32 {
        match self {
            BaudRate::Custom(rate) => rate,
            standard => STANDARD_RATES
                .iter()
                .find(|&&(b, _)| b == standard)
                .map_or(0, |&(_, r)| r),
        }
    }
}

impl From<u32> for BaudRate {
    fn from(rate: u32) -> Self {
        BaudRate::from_rate(rate)
    }
}

/// Divides the pre-divided `clock` by the baud rate.
///
/// `clock` must already include the 16x oversampling division, see
/// [`DEFAULT_CLOCK`]. The result is zero when `baud` exceeds `clock`, which
/// callers must not program into the divisor latch.
#[inline]
pub const fn compute_divisor(clock: u32, baud: NonZeroU32) -> u32 {
    clock / baud.get()
}

/// Checked divisor for the 16-bit divisor latch.
pub fn divisor(clock: u32, baud: u32) -> Result<u16, Error> {
    let baud = NonZeroU32::new(baud).ok_or(Error::ZeroBaudRate)?;
    match compute_divisor(clock, baud) {
        0 => Err(Error::ZeroDivisor),
        d => u16::try_from(d).map_err(|_| Error::DivisorOverflow(d)),
    }
}

const WORD_LENGTH_MASK: u8 = 0b0_0011;
const TWO_STOP_BITS: u8 = 0b0_0100;
const PARITY_ENABLE: u8 = 0b0_1000;
const EVEN_PARITY: u8 = 0b1_0000;

/// Encodes the word format into the low five bits of the Line Control
/// Register.
///
/// Bits 0-1 hold `data_bits - 5`, bit 2 selects two stop bits, bit 3 enables
/// parity and bit 4 selects even parity.
pub fn encode_line_control(data_bits: u8, parity: Parity, stop_bits: u8) -> Result<u8, Error> {
    if !(5..=8).contains(&data_bits) {
        return Err(Error::InvalidDataBits(data_bits));
    }
    let stop = match stop_bits {
        1 => 0,
        2 => TWO_STOP_BITS,
        _ => return Err(Error::InvalidStopBits(stop_bits)),
    };
    let parity = match parity {
        Parity::None => 0,
        Parity::Odd => PARITY_ENABLE,
        Parity::Even => PARITY_ENABLE | EVEN_PARITY,
    };
    Ok((data_bits - 5) | stop | parity)
}

/// Decodes the word format from a Line Control Register value.
///
/// Bits above the word format (break, DLAB) are ignored. With five data bits
/// the hardware sends 1.5 stop bits when two are selected; this reports 2.
pub fn decode_line_control(lcr: u8) -> Framing {
    let parity = match (lcr & PARITY_ENABLE != 0, lcr & EVEN_PARITY != 0) {
        (false, _) => Parity::None,
        (true, false) => Parity::Odd,
        (true, true) => Parity::Even,
    };
    Framing {
        data_bits: (lcr & WORD_LENGTH_MASK) + 5,
        parity,
        stop_bits: if lcr & TWO_STOP_BITS != 0 { 2 } else { 1 },
    }
}

/// Word format: data bits, parity and stop bits.
///
/// Parses from and displays as the usual `8N1` notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Framing {
    /// Data bits, 5 to 8.
    pub data_bits: u8,
    /// Parity mode.
    pub parity: Parity,
    /// Stop bits, 1 or 2.
    pub stop_bits: u8,
}

impl Framing {
    /// Eight data bits, no parity, one stop bit.
    pub const EIGHT_N_ONE: Framing = Framing {
        data_bits: 8,
        parity: Parity::None,
        stop_bits: 1,
    };

    /// Validates and encodes this framing, see [`encode_line_control`].
    pub fn line_control(&self) -> Result<u8, Error> {
        encode_line_control(self.data_bits, self.parity, self.stop_bits)
    }
}

impl Default for Framing {
    fn default() -> Self {
        Framing::EIGHT_N_ONE
    }
}

impl FromStr for Framing {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let mut chars = s.chars();
        let (Some(data), Some(parity), Some(stop), None) =
            (chars.next(), chars.next(), chars.next(), chars.next())
        else {
            return Err(Error::InvalidFraming);
        };
        let data_bits = data.to_digit(10).ok_or(Error::InvalidFraming)? as u8;
        let stop_bits = stop.to_digit(10).ok_or(Error::InvalidFraming)? as u8;
        let framing = Framing {
            data_bits,
            parity: Parity::try_from(parity)?,
            stop_bits,
        };
        framing.line_control()?;
        Ok(framing)
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.data_bits,
            self.parity.as_char(),
            self.stop_bits
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn nz(v: u32) -> NonZeroU32 {
        NonZeroU32::new(v).unwrap()
    }

    #[test]
    fn divisor_is_integer_division() {
        assert_eq!(compute_divisor(921_600, nz(9600)), 96);
        assert_eq!(compute_divisor(DEFAULT_CLOCK, nz(115_200)), 8);
        assert_eq!(compute_divisor(115_200, nz(7)), 115_200 / 7);
        assert_eq!(compute_divisor(1_843_200 / 16, nz(9600)), 12);
    }

    #[test]
    fn checked_divisor() {
        assert_eq!(divisor(DEFAULT_CLOCK, 9600), Ok(96));
        assert_eq!(divisor(DEFAULT_CLOCK, 0), Err(Error::ZeroBaudRate));
        assert_eq!(divisor(DEFAULT_CLOCK, 1_000_000), Err(Error::ZeroDivisor));
        assert_eq!(divisor(u32::MAX, 1), Err(Error::DivisorOverflow(u32::MAX)));
        assert_eq!(divisor(65_535, 1), Ok(u16::MAX));
    }

    #[test]
    fn line_control_documented_values() {
        assert_eq!(encode_line_control(8, Parity::None, 1), Ok(0x03));
        assert_eq!(encode_line_control(8, Parity::Even, 2), Ok(0x1F));
        assert_eq!(encode_line_control(7, Parity::Odd, 1), Ok(0x0A));
        assert_eq!(encode_line_control(5, Parity::None, 1), Ok(0x00));
    }

    #[test]
    fn line_control_is_injective_and_decodes() {
        let mut seen = [false; 32];
        for data_bits in 5..=8 {
            for stop_bits in 1..=2 {
                for parity in [Parity::None, Parity::Odd, Parity::Even] {
                    let lcr = encode_line_control(data_bits, parity, stop_bits).unwrap();
                    assert!(lcr < 32);
                    assert!(!seen[lcr as usize], "duplicate encoding {lcr:#x}");
                    seen[lcr as usize] = true;
                    assert_eq!(
                        decode_line_control(lcr),
                        Framing {
                            data_bits,
                            parity,
                            stop_bits
                        }
                    );
                }
            }
        }
        assert_eq!(seen.iter().filter(|&&s| s).count(), 24);
    }

    #[test]
    fn line_control_rejects_out_of_range() {
        assert_eq!(
            encode_line_control(9, Parity::None, 1),
            Err(Error::InvalidDataBits(9))
        );
        assert_eq!(
            encode_line_control(4, Parity::None, 1),
            Err(Error::InvalidDataBits(4))
        );
        assert_eq!(
            encode_line_control(8, Parity::None, 0),
            Err(Error::InvalidStopBits(0))
        );
        assert_eq!(
            encode_line_control(8, Parity::None, 3),
            Err(Error::InvalidStopBits(3))
        );
        assert_eq!(Parity::try_from('X'), Err(Error::InvalidParity('X')));
        assert_eq!(Parity::try_from('e'), Ok(Parity::Even));
    }

    #[test]
    fn baud_table_lookup() {
        assert_eq!(BaudRate::from_rate(9600), BaudRate::B9600);
        assert_eq!(BaudRate::from_rate(921_600), BaudRate::B921600);
        assert_eq!(BaudRate::from_rate(31_250), BaudRate::Custom(31_250));
        assert_eq!(BaudRate::Custom(31_250).rate(), 31_250);
        assert_eq!(BaudRate::B57600.rate(), 57_600);
        for &(baud, rate) in STANDARD_RATES.iter() {
            assert_eq!(BaudRate::from(rate), baud);
            assert_eq!(baud.rate(), rate);
        }
    }

    #[test]
    fn framing_notation() {
        assert_eq!("8N1".parse::<Framing>(), Ok(Framing::EIGHT_N_ONE));
        let f: Framing = "7e2".parse().unwrap();
        assert_eq!(f.line_control(), Ok(0x1E));
        assert_eq!("9N1".parse::<Framing>(), Err(Error::InvalidDataBits(9)));
        assert_eq!("8X1".parse::<Framing>(), Err(Error::InvalidParity('X')));
        assert_eq!("8N".parse::<Framing>(), Err(Error::InvalidFraming));
        assert_eq!("8N12".parse::<Framing>(), Err(Error::InvalidFraming));

        use core::fmt::Write;
        let mut s = std::string::String::new();
        write!(s, "{}", Framing::default()).unwrap();
        assert_eq!(s, "8N1");
    }
}
