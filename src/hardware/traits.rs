use chrono::NaiveDateTime;

use crate::compensation::EnvironmentReading;

pub trait Button {
    fn is_pressed(&mut self) -> bool;
}

/// Two-phase rotary encoder; returns `(clk, dt)` levels.
pub trait QuadratureEncoder {
    fn phases(&mut self) -> (bool, bool);
}

pub trait EnvironmentSensor {
    type Error;

    fn read(&mut self) -> Result<EnvironmentReading, Self::Error>;
}

pub trait LightSensor {
    type Error;

    /// Light level, 0 (dark) to 100 (bright).
    fn read_percent(&mut self) -> Result<u8, Self::Error>;
}

pub trait RealTimeClock {
    type Error;

    fn read_time(&mut self) -> Result<NaiveDateTime, Self::Error>;
}

/// Two-line character display.
pub trait CharDisplay {
    type Error;

    fn draw(&mut self, top: &str, bottom: &str) -> Result<(), Self::Error>;
}

/// Append-only file sink for the CSV log.
pub trait LogStorage {
    type Error;

    fn open(&mut self, name: &str) -> Result<(), Self::Error>;

    /// Returns the number of bytes actually written.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    fn close(&mut self) -> Result<(), Self::Error>;
}

/// One ADC channel, sampled on demand.
pub trait AnalogInput {
    fn read_raw(&mut self) -> u16;
}

/// Bidirectional open line, as used by 3-wire serial devices.
pub trait DataLine {
    fn set_as_input(&mut self);
    fn set_as_output(&mut self);
    fn is_high(&mut self) -> bool;
    fn set_level(&mut self, high: bool);
}
