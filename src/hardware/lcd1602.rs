//! HD44780 16x2 character LCD behind a PCF8574 I2C backpack.
//!
//! The `lcd` crate drives the controller; [`Pcf8574`] maps its pin-level
//! interface onto the backpack: P0 = RS, P2 = EN, P3 = backlight,
//! P4..P7 = D4..D7. RW (P1) stays low, the display is write-only.

use core::fmt::Write;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use lcd::{Delay, Display, Hardware};

use super::traits::CharDisplay;

const RS_BIT: u8 = 0;
const EN_BIT: u8 = 2;
const BACKLIGHT_BIT: u8 = 3;

/// Pin-level adapter for the backpack's I/O expander.
///
/// `lcd::Hardware` has no error channel, so the first bus error is latched
/// and further transfers are skipped until [`Pcf8574::take_error`] clears it.
pub struct Pcf8574<I2C: I2c, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    data: u8,
    error: Option<I2C::Error>,
}

impl<I2C: I2c, D: DelayNs> Pcf8574<I2C, D> {
    pub fn new(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            data: 1 << BACKLIGHT_BIT, // backlight on by default
            error: None,
        }
    }

    pub fn take_error(&mut self) -> Result<(), I2C::Error> {
        self.error.take().map_or(Ok(()), Err)
    }

    fn set_bit(&mut self, offset: u8, bit: bool) {
        if bit {
            self.data |= 1 << offset;
        } else {
            self.data &= !(1 << offset);
        }
    }
}

impl<I2C: I2c, D: DelayNs> Delay for Pcf8574<I2C, D> {
    fn delay_us(&mut self, delay_usec: u32) {
        self.delay.delay_us(delay_usec);
    }
}

impl<I2C: I2c, D: DelayNs> Hardware for Pcf8574<I2C, D> {
    fn rs(&mut self, bit: bool) {
        self.set_bit(RS_BIT, bit);
    }

    fn enable(&mut self, bit: bool) {
        self.set_bit(EN_BIT, bit);
    }

    fn data(&mut self, bits: u8) {
        self.data = (self.data & 0x0F) | ((bits & 0x0F) << 4);
    }

    fn apply(&mut self) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.i2c.write(self.address, &[self.data]) {
            self.error = Some(e);
        }
    }
}

// `Display` takes its hardware by value; lending the adapter keeps the
// latched error reachable after each command.
impl<I2C: I2c, D: DelayNs> Delay for &mut Pcf8574<I2C, D> {
    fn delay_us(&mut self, delay_usec: u32) {
        Delay::delay_us(&mut **self, delay_usec);
    }
}

impl<I2C: I2c, D: DelayNs> Hardware for &mut Pcf8574<I2C, D> {
    fn rs(&mut self, bit: bool) {
        Hardware::rs(&mut **self, bit);
    }

    fn enable(&mut self, bit: bool) {
        Hardware::enable(&mut **self, bit);
    }

    fn data(&mut self, bits: u8) {
        Hardware::data(&mut **self, bits);
    }

    fn apply(&mut self) {
        Hardware::apply(&mut **self);
    }
}

pub struct Lcd1602<I2C: I2c, D> {
    backpack: Pcf8574<I2C, D>,
}

impl<I2C: I2c, D: DelayNs> Lcd1602<I2C, D> {
    pub fn new(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            backpack: Pcf8574::new(i2c, delay, address),
        }
    }

    /// 4-bit, two lines, display on, cursor off, cleared.
    pub fn init(&mut self) -> Result<(), I2C::Error> {
        let mut display = Display::new(&mut self.backpack);
        display.init(lcd::FunctionLine::Line2, lcd::FunctionDots::Dots5x8);
        display.display(
            lcd::DisplayMode::DisplayOn,
            lcd::DisplayCursor::CursorOff,
            lcd::DisplayBlink::BlinkOff,
        );
        display.clear();
        self.backpack.take_error()
    }

    pub fn release(self) -> (I2C, D) {
        (self.backpack.i2c, self.backpack.delay)
    }
}

impl<I2C: I2c, D: DelayNs> CharDisplay for Lcd1602<I2C, D> {
    type Error = I2C::Error;

    /// Characters outside ASCII show as `?`.
    fn draw(&mut self, top: &str, bottom: &str) -> Result<(), Self::Error> {
        let mut display = Display::new(&mut self.backpack);
        for (row, text) in [(0, top), (1, bottom)] {
            display.position(0, row);
            for c in text.chars() {
                let _ = display.write_char(if c.is_ascii() { c } else { '?' });
            }
        }
        self.backpack.take_error()
    }
}
