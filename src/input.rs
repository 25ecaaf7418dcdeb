//! Rotary encoder decoding and push-button debouncing.

/// Direction of one encoder detent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

/// Both phases high: where a KY-040 style encoder rests between detents.
const DETENT: u8 = 0b11;

/// Net quarter steps needed at rest to count a detent. A full detent is four;
/// a reading missed while the loop was busy costs two, so two still counts.
const MIN_STEPS_AT_DETENT: i8 = 2;

/// Quadrature decoder state: last CLK/DT reading and quarter-step accumulator.
///
/// Gray-code transitions add or subtract one quarter step; jumps where both
/// phases changed carry no direction and add nothing. A detent is reported by
/// the sign of the accumulator when the encoder comes to rest, so contact
/// bounce inside a detent nets out to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncoderState {
    previous: u8,
    accumulator: i8,
}

impl EncoderState {
    pub fn new(clk: bool, dt: bool) -> Self {
        Self {
            previous: phases(clk, dt),
            accumulator: 0,
        }
    }

    /// Feeds one pin reading; returns a rotation once a full detent completes.
    pub fn update(&mut self, clk: bool, dt: bool) -> Option<Rotation> {
        let current = phases(clk, dt);
        if current == self.previous {
            return None;
        }

        // CLK leading DT: 11 -> 01 -> 00 -> 10 -> 11
        self.accumulator += match (self.previous, current) {
            (0b11, 0b01) | (0b01, 0b00) | (0b00, 0b10) | (0b10, 0b11) => -1,
            (0b11, 0b10) | (0b10, 0b00) | (0b00, 0b01) | (0b01, 0b11) => 1,
            _ => 0,
        };
        self.previous = current;

        if current != DETENT {
            return None;
        }

        let rotation = if self.accumulator >= MIN_STEPS_AT_DETENT {
            Some(Rotation::Clockwise)
        } else if self.accumulator <= -MIN_STEPS_AT_DETENT {
            Some(Rotation::CounterClockwise)
        } else {
            None
        };
        self.accumulator = 0;
        rotation
    }
}

impl Default for EncoderState {
    fn default() -> Self {
        Self {
            previous: DETENT,
            accumulator: 0,
        }
    }
}

fn phases(clk: bool, dt: bool) -> u8 {
    (u8::from(clk) << 1) | u8::from(dt)
}

/// Edge-triggered debouncer for an active-low push button.
///
/// A press is accepted on the released-to-pressed edge, and only when at
/// least `window_ms` have passed since the previously accepted press. Presses
/// inside the window are dropped, not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonDebouncer {
    window_ms: u32,
    last_accepted: Option<u32>,
    was_pressed: bool,
}

impl ButtonDebouncer {
    pub fn new(window_ms: u32) -> Self {
        Self {
            window_ms,
            last_accepted: None,
            was_pressed: false,
        }
    }

    /// Returns `true` when this reading is an accepted press.
    pub fn update(&mut self, pressed: bool, now_ms: u32) -> bool {
        let edge = pressed && !self.was_pressed;
        self.was_pressed = pressed;
        if !edge {
            return false;
        }

        let outside_window = self
            .last_accepted
            .is_none_or(|last| now_ms.wrapping_sub(last) >= self.window_ms);
        if outside_window {
            self.last_accepted = Some(now_ms);
        }
        outside_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(encoder: &mut EncoderState, sequence: &[(bool, bool)]) -> Vec<Rotation> {
        sequence
            .iter()
            .filter_map(|&(clk, dt)| encoder.update(clk, dt))
            .collect()
    }

    #[test]
    fn one_detent_is_exactly_one_step() {
        let mut encoder = EncoderState::new(true, true);
        let steps = feed(
            &mut encoder,
            &[(false, true), (false, false), (true, false), (true, true)],
        );
        assert_eq!(steps, [Rotation::CounterClockwise]);
    }

    #[test]
    fn reverse_detent_steps_the_other_way() {
        let mut encoder = EncoderState::new(true, true);
        let steps = feed(
            &mut encoder,
            &[(true, false), (false, false), (false, true), (true, true)],
        );
        assert_eq!(steps, [Rotation::Clockwise]);
    }

    #[test]
    fn repeated_readings_do_nothing() {
        let mut encoder = EncoderState::new(true, true);
        let steps = feed(
            &mut encoder,
            &[
                (true, true),
                (false, true),
                (false, true),
                (false, false),
                (false, false),
                (true, false),
                (true, true),
                (true, true),
            ],
        );
        assert_eq!(steps, [Rotation::CounterClockwise]);
    }

    #[test]
    fn bounce_back_to_detent_is_ignored() {
        let mut encoder = EncoderState::new(true, true);
        let steps = feed(
            &mut encoder,
            &[(false, true), (true, true), (false, true), (true, true)],
        );
        assert!(steps.is_empty());
    }

    #[test]
    fn missed_reading_still_counts_detent() {
        let mut encoder = EncoderState::new(true, true);
        // (false, false) never seen
        let steps = feed(&mut encoder, &[(false, true), (true, false), (true, true)]);
        assert_eq!(steps, [Rotation::CounterClockwise]);

        let steps = feed(&mut encoder, &[(true, false), (false, true), (true, true)]);
        assert_eq!(steps, [Rotation::Clockwise]);
    }

    #[test]
    fn two_detents_two_steps() {
        let mut encoder = EncoderState::default();
        let detent = [(false, true), (false, false), (true, false), (true, true)];
        let steps = feed(&mut encoder, &[detent, detent].concat());
        assert_eq!(steps, [Rotation::CounterClockwise, Rotation::CounterClockwise]);
    }

    #[test]
    fn button_accepts_first_press() {
        let mut button = ButtonDebouncer::new(200);
        assert!(button.update(true, 5));
    }

    #[test]
    fn held_button_fires_once() {
        let mut button = ButtonDebouncer::new(200);
        assert!(button.update(true, 0));
        for now in (10..2000).step_by(10) {
            assert!(!button.update(true, now));
        }
    }

    #[test]
    fn press_inside_window_is_dropped() {
        let mut button = ButtonDebouncer::new(200);
        assert!(button.update(true, 1000));
        assert!(!button.update(false, 1020));
        // contact bounce
        assert!(!button.update(true, 1040));
        assert!(!button.update(false, 1100));
        assert!(button.update(true, 1200));
    }

    #[test]
    fn window_survives_counter_wrap() {
        let mut button = ButtonDebouncer::new(200);
        assert!(button.update(true, u32::MAX - 50));
        assert!(!button.update(false, u32::MAX - 10));
        assert!(!button.update(true, 100));
        assert!(!button.update(false, 120));
        assert!(button.update(true, 150));
    }
}
