use super::traits::QuadratureEncoder;
use embedded_hal::digital::InputPin;

/// KY-040 style encoder on two pulled-up GPIO inputs.
pub struct GpioEncoder<CLK, DT> {
    clk: CLK,
    dt: DT,
}

impl<CLK: InputPin, DT: InputPin> GpioEncoder<CLK, DT> {
    pub fn new(clk: CLK, dt: DT) -> Self {
        Self { clk, dt }
    }
}

impl<CLK: InputPin, DT: InputPin> QuadratureEncoder for GpioEncoder<CLK, DT> {
    fn phases(&mut self) -> (bool, bool) {
        // idle level of a pulled-up line on read error
        (
            self.clk.is_high().unwrap_or(true),
            self.dt.is_high().unwrap_or(true),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction};

    #[test]
    fn reads_clk_then_dt() {
        let clk = PinMock::new(&[Transaction::get(State::Low), Transaction::get(State::High)]);
        let dt = PinMock::new(&[Transaction::get(State::High), Transaction::get(State::Low)]);
        let mut encoder = GpioEncoder::new(clk, dt);

        assert_eq!(encoder.phases(), (false, true));
        assert_eq!(encoder.phases(), (true, false));

        encoder.clk.done();
        encoder.dt.done();
    }
}
