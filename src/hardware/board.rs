//! STM32 adapters for the hardware traits.

use embassy_stm32::adc::{Adc, AdcChannel, Instance};
use embassy_stm32::gpio::{Flex, Level, Pull, Speed};

use super::traits::{AnalogInput, DataLine};

/// GPIO pin switched between input and push-pull output at run time.
pub struct FlexLine<'d> {
    pin: Flex<'d>,
}

impl<'d> FlexLine<'d> {
    pub fn new(mut pin: Flex<'d>) -> Self {
        pin.set_as_input(Pull::None);
        Self { pin }
    }
}

impl DataLine for FlexLine<'_> {
    fn set_as_input(&mut self) {
        self.pin.set_as_input(Pull::None);
    }

    fn set_as_output(&mut self) {
        self.pin.set_as_output(Speed::Low);
    }

    fn is_high(&mut self) -> bool {
        self.pin.is_high()
    }

    fn set_level(&mut self, high: bool) {
        self.pin.set_level(Level::from(high));
    }
}

/// One ADC channel. A conversion takes a few microseconds, so it is awaited
/// in place.
pub struct AdcInput<'d, T: Instance, P: AdcChannel<T>> {
    adc: Adc<'d, T>,
    pin: P,
}

impl<'d, T: Instance, P: AdcChannel<T>> AdcInput<'d, T, P> {
    pub fn new(adc: Adc<'d, T>, pin: P) -> Self {
        Self { adc, pin }
    }
}

impl<T: Instance, P: AdcChannel<T>> AnalogInput for AdcInput<'_, T, P> {
    fn read_raw(&mut self) -> u16 {
        embassy_futures::block_on(self.adc.read(&mut self.pin))
    }
}
