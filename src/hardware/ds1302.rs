//! DS1302 real-time clock over its 3-wire interface (CE, SCLK, bidirectional I/O).
//!
//! Bytes go LSB first. The chip samples I/O on the rising SCLK edge and drives
//! it after the falling edge, so a read starts right after the command byte's
//! last clock without an extra pulse.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use super::traits::{DataLine, RealTimeClock};

const CMD_SECONDS_WRITE: u8 = 0x80;
const CMD_SECONDS_READ: u8 = 0x81;
const CMD_WRITE_PROTECT: u8 = 0x8E;
const CMD_CLOCK_BURST_WRITE: u8 = 0xBE;
const CMD_CLOCK_BURST_READ: u8 = 0xBF;

/// Clock-halt flag in the seconds register.
const CLOCK_HALT: u8 = 0x80;
/// 12-hour mode flag in the hours register.
const HOUR_12: u8 = 0x80;
const HOUR_PM: u8 = 0x20;

pub const CLOCK_BURST_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ds1302Error<E> {
    Pin(E),
    /// Registers do not hold a valid date, or the date is outside 2000..=2099.
    InvalidTime,
}

pub struct Ds1302<CE, SCLK, IO, D> {
    ce: CE,
    sclk: SCLK,
    io: IO,
    delay: D,
}

impl<CE, SCLK, IO, D, E> Ds1302<CE, SCLK, IO, D>
where
    CE: OutputPin<Error = E>,
    SCLK: OutputPin<Error = E>,
    IO: DataLine,
    D: DelayNs,
{
    pub fn new(ce: CE, sclk: SCLK, io: IO, delay: D) -> Self {
        Self { ce, sclk, io, delay }
    }

    /// Clears write protection and starts the oscillator if it is halted.
    pub fn init(&mut self) -> Result<(), Ds1302Error<E>> {
        self.write_register(CMD_WRITE_PROTECT, 0x00)?;
        let seconds = self.read_register(CMD_SECONDS_READ)?;
        if seconds & CLOCK_HALT != 0 {
            debug!("ds1302 clock was halted");
            self.write_register(CMD_SECONDS_WRITE, seconds & !CLOCK_HALT)?;
        }
        Ok(())
    }

    pub fn read_time(&mut self) -> Result<NaiveDateTime, Ds1302Error<E>> {
        let mut regs = [0u8; CLOCK_BURST_LEN];
        self.begin()?;
        self.write_byte(CMD_CLOCK_BURST_READ)?;
        for reg in regs.iter_mut() {
            *reg = self.read_byte()?;
        }
        self.end()?;
        decode_clock_burst(&regs).ok_or(Ds1302Error::InvalidTime)
    }

    pub fn set_time(&mut self, time: &NaiveDateTime) -> Result<(), Ds1302Error<E>> {
        let regs = encode_clock_burst(time).ok_or(Ds1302Error::InvalidTime)?;
        self.write_register(CMD_WRITE_PROTECT, 0x00)?;
        self.begin()?;
        self.write_byte(CMD_CLOCK_BURST_WRITE)?;
        for reg in regs {
            self.write_byte(reg)?;
        }
        self.end()
    }

    pub fn release(self) -> (CE, SCLK, IO, D) {
        (self.ce, self.sclk, self.io, self.delay)
    }

    fn read_register(&mut self, command: u8) -> Result<u8, Ds1302Error<E>> {
        self.begin()?;
        self.write_byte(command)?;
        let value = self.read_byte()?;
        self.end()?;
        Ok(value)
    }

    fn write_register(&mut self, command: u8, value: u8) -> Result<(), Ds1302Error<E>> {
        self.begin()?;
        self.write_byte(command)?;
        self.write_byte(value)?;
        self.end()
    }

    fn begin(&mut self) -> Result<(), Ds1302Error<E>> {
        self.sclk.set_low().map_err(Ds1302Error::Pin)?;
        self.ce.set_high().map_err(Ds1302Error::Pin)?;
        self.delay.delay_us(4);
        Ok(())
    }

    fn end(&mut self) -> Result<(), Ds1302Error<E>> {
        self.ce.set_low().map_err(Ds1302Error::Pin)?;
        self.io.set_as_input();
        self.delay.delay_us(4);
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Ds1302Error<E>> {
        self.io.set_as_output();
        for bit in 0..8 {
            self.io.set_level(byte & (1 << bit) != 0);
            self.delay.delay_us(1);
            self.clock_pulse()?;
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, Ds1302Error<E>> {
        self.io.set_as_input();
        let mut byte = 0;
        for bit in 0..8 {
            if self.io.is_high() {
                byte |= 1 << bit;
            }
            self.clock_pulse()?;
        }
        Ok(byte)
    }

    fn clock_pulse(&mut self) -> Result<(), Ds1302Error<E>> {
        self.sclk.set_high().map_err(Ds1302Error::Pin)?;
        self.delay.delay_us(1);
        self.sclk.set_low().map_err(Ds1302Error::Pin)?;
        self.delay.delay_us(1);
        Ok(())
    }
}

impl<CE, SCLK, IO, D, E> RealTimeClock for Ds1302<CE, SCLK, IO, D>
where
    CE: OutputPin<Error = E>,
    SCLK: OutputPin<Error = E>,
    IO: DataLine,
    D: DelayNs,
{
    type Error = Ds1302Error<E>;

    fn read_time(&mut self) -> Result<NaiveDateTime, Self::Error> {
        Ds1302::read_time(self)
    }
}

fn from_bcd(value: u8) -> Option<u32> {
    let (tens, ones) = (value >> 4, value & 0x0F);
    (tens <= 9 && ones <= 9).then(|| u32::from(tens * 10 + ones))
}

fn to_bcd(value: u32) -> u8 {
    (((value / 10) << 4) | (value % 10)) as u8
}

/// Decodes seconds, minutes, hours, date, month, weekday, year, control.
pub fn decode_clock_burst(regs: &[u8; CLOCK_BURST_LEN]) -> Option<NaiveDateTime> {
    let second = from_bcd(regs[0] & !CLOCK_HALT)?;
    let minute = from_bcd(regs[1] & 0x7F)?;
    let hour = if regs[2] & HOUR_12 != 0 {
        let hour = from_bcd(regs[2] & 0x1F)? % 12;
        if regs[2] & HOUR_PM != 0 { hour + 12 } else { hour }
    } else {
        from_bcd(regs[2] & 0x3F)?
    };
    let day = from_bcd(regs[3] & 0x3F)?;
    let month = from_bcd(regs[4] & 0x1F)?;
    let year = 2000 + from_bcd(regs[6])? as i32;

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

/// Register image for a burst write, 24-hour mode, write protection off.
pub fn encode_clock_burst(time: &NaiveDateTime) -> Option<[u8; CLOCK_BURST_LEN]> {
    let year = u32::try_from(time.year() - 2000).ok().filter(|y| *y < 100)?;

    Some([
        to_bcd(time.second()),
        to_bcd(time.minute()),
        to_bcd(time.hour()),
        to_bcd(time.day()),
        to_bcd(time.month()),
        to_bcd(time.weekday().number_from_monday()),
        to_bcd(year),
        0x00,
    ])
}
