use super::traits::Button;
use embedded_hal::digital::InputPin;

/// Active-low push button (pressed pulls the pin to ground).
pub struct GpioButton<P> {
    pin: P,
}

impl<P: InputPin> GpioButton<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }
}

impl<P: InputPin> Button for GpioButton<P> {
    fn is_pressed(&mut self) -> bool {
        // a read error counts as released
        self.pin.is_low().unwrap_or(false)
    }
}
