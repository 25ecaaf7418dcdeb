//! Compile-time configuration.
//!
//! The firmware has no configuration file; everything tunable lives here and is
//! passed to the components that need it at construction time.

/// 7-bit I2C address of the BME280 (SDO tied to GND).
pub const BME280_ADDRESS: u8 = 0x76;

/// 7-bit I2C address of the PCF8574 LCD backpack.
pub const LCD_ADDRESS: u8 = 0x27;

/// Size of the CSV log RAM buffer in bytes.
pub const LOG_BUFFER_CAPACITY: usize = 256;

/// The log buffer is written out once it holds at least this many bytes.
pub const LOG_FLUSH_THRESHOLD: usize = 128;

/// Scheduler timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoggerConfig {
    /// Period of the sampling task in milliseconds.
    pub sample_interval_ms: u32,
    /// Minimum time between two accepted button presses in milliseconds.
    pub debounce_ms: u32,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 1000,
            debounce_ms: 200,
        }
    }
}

/// Photoresistor calibration points, in raw ADC counts.
///
/// `dark` is the reading in complete darkness, `bright` the reading under
/// maximum light. Either may be the larger one, depending on which side of the
/// voltage divider the photoresistor sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LightCalibration {
    pub dark: u16,
    pub bright: u16,
}

impl Default for LightCalibration {
    // 12-bit ADC on the STM32F1
    fn default() -> Self {
        Self {
            dark: 0,
            bright: 4095,
        }
    }
}
