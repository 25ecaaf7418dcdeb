use core::convert::Infallible;

use super::traits::{AnalogInput, LightSensor};
use crate::config::LightCalibration;

/// Photoresistor in a voltage divider on an ADC channel.
pub struct Photoresistor<A> {
    input: A,
    calibration: LightCalibration,
}

impl<A: AnalogInput> Photoresistor<A> {
    pub fn new(input: A, calibration: LightCalibration) -> Self {
        Self { input, calibration }
    }

    pub fn read_raw(&mut self) -> u16 {
        self.input.read_raw()
    }
}

impl<A: AnalogInput> LightSensor for Photoresistor<A> {
    type Error = Infallible;

    fn read_percent(&mut self) -> Result<u8, Infallible> {
        Ok(light_percent(self.read_raw(), self.calibration))
    }
}

/// Maps a raw reading linearly from `dark` (0 %) to `bright` (100 %), clamped.
/// Equal calibration points give 0 %.
pub fn light_percent(raw: u16, calibration: LightCalibration) -> u8 {
    let dark = i32::from(calibration.dark);
    let bright = i32::from(calibration.bright);
    if dark == bright {
        return 0;
    }
    let percent = (i32::from(raw) - dark) * 100 / (bright - dark);
    percent.clamp(0, 100) as u8
}
