use embedded_hal::i2c::I2c;

use super::traits::EnvironmentSensor;
use crate::compensation::{
    BURST_LEN, CalibrationSet, Compensated, EnvironmentReading, HUMIDITY_CALIB_LEN, RawSample,
    TEMP_PRESS_CALIB_LEN,
};

const REG_CHIP_ID: u8 = 0xD0;
const REG_CALIB_TEMP_PRESS: u8 = 0x88;
const REG_CALIB_HUMIDITY: u8 = 0xE1;
const REG_CTRL_HUM: u8 = 0xF2;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_DATA: u8 = 0xF7;

const CHIP_ID: u8 = 0x60;

/// Humidity oversampling x1.
const CTRL_HUM_VALUE: u8 = 0x01;
/// Temperature x1, pressure x1, normal mode.
const CTRL_MEAS_VALUE: u8 = 0x27;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bme280Error<E> {
    Bus(E),
    /// `read` before a successful `init`.
    NotInitialized,
}

/// BME280 on I2C in normal mode, compensated with the integer formulas.
pub struct Bme280<I2C> {
    i2c: I2C,
    address: u8,
    calibration: Option<CalibrationSet>,
}

impl<I2C: I2c> Bme280<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            calibration: None,
        }
    }

    /// Checks the chip id register.
    pub fn probe(&mut self) -> Result<bool, Bme280Error<I2C::Error>> {
        let mut id = [0u8];
        self.i2c
            .write_read(self.address, &[REG_CHIP_ID], &mut id)
            .map_err(Bme280Error::Bus)?;
        debug!("bme280 chip id {}", id[0]);
        Ok(id[0] == CHIP_ID)
    }

    /// Loads the factory calibration and starts continuous measurement.
    pub fn init(&mut self) -> Result<(), Bme280Error<I2C::Error>> {
        let mut temp_press = [0u8; TEMP_PRESS_CALIB_LEN];
        let mut humidity = [0u8; HUMIDITY_CALIB_LEN];
        self.i2c
            .write_read(self.address, &[REG_CALIB_TEMP_PRESS], &mut temp_press)
            .map_err(Bme280Error::Bus)?;
        self.i2c
            .write_read(self.address, &[REG_CALIB_HUMIDITY], &mut humidity)
            .map_err(Bme280Error::Bus)?;

        // ctrl_hum only takes effect after the following ctrl_meas write
        self.i2c
            .write(self.address, &[REG_CTRL_HUM, CTRL_HUM_VALUE])
            .map_err(Bme280Error::Bus)?;
        self.i2c
            .write(self.address, &[REG_CTRL_MEAS, CTRL_MEAS_VALUE])
            .map_err(Bme280Error::Bus)?;

        self.calibration = Some(CalibrationSet::from_registers(&temp_press, &humidity));
        Ok(())
    }

    pub fn calibration(&self) -> Option<&CalibrationSet> {
        self.calibration.as_ref()
    }

    /// One burst read of all three ADC values, compensated.
    pub fn measure(&mut self) -> Result<Compensated, Bme280Error<I2C::Error>> {
        let calibration = self.calibration.ok_or(Bme280Error::NotInitialized)?;
        let mut burst = [0u8; BURST_LEN];
        self.i2c
            .write_read(self.address, &[REG_DATA], &mut burst)
            .map_err(Bme280Error::Bus)?;
        Ok(calibration.compensate(RawSample::from_burst(&burst)))
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> EnvironmentSensor for Bme280<I2C> {
    type Error = Bme280Error<I2C::Error>;

    fn read(&mut self) -> Result<EnvironmentReading, Self::Error> {
        self.measure().map(|c| c.reading())
    }
}
