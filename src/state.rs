//! Shared state between the super-loop tasks, and the millisecond counter.
//!
//! Both live behind critical sections: the counter because the tick task writes
//! it, the state so that every multi-field update (a whole sample, selector
//! plus redraw flag, ...) is observed as one unit.

use core::cell::{Cell, RefCell};

use chrono::NaiveDateTime;
use embassy_sync::blocking_mutex::CriticalSectionMutex;

use crate::compensation::EnvironmentReading;
use crate::input::Rotation;

/// One complete set of readings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhysicalSample {
    /// °C
    pub temperature: f32,
    /// hPa
    pub pressure: f32,
    /// %RH
    pub humidity: f32,
    /// 0..=100 %
    pub light: u8,
}

impl PhysicalSample {
    pub fn new(environment: EnvironmentReading, light: u8) -> Self {
        Self {
            temperature: environment.temperature,
            pressure: environment.pressure,
            humidity: environment.humidity,
            light,
        }
    }
}

/// Quantity shown on the LCD, cycled by the rotary encoder.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Quantity {
    #[default]
    Temperature = 0,
    Pressure = 1,
    Humidity = 2,
    Light = 3,
}

impl Quantity {
    pub const COUNT: u8 = 4;

    pub fn from_index(index: u8) -> Self {
        match index % Self::COUNT {
            0 => Self::Temperature,
            1 => Self::Pressure,
            2 => Self::Humidity,
            _ => Self::Light,
        }
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn next(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub fn previous(self) -> Self {
        Self::from_index(self.index() + Self::COUNT - 1)
    }

    pub fn step(self, rotation: Rotation) -> Self {
        match rotation {
            Rotation::Clockwise => self.next(),
            Rotation::CounterClockwise => self.previous(),
        }
    }
}

/// Everything the display and the log writer read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub sample: PhysicalSample,
    pub time: NaiveDateTime,
    pub selected: Quantity,
    /// Display needs a redraw.
    pub redraw: bool,
    /// Button asked for logging to start or stop.
    pub toggle_requested: bool,
    pub logging: bool,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            sample: PhysicalSample::default(),
            time: NaiveDateTime::default(),
            selected: Quantity::default(),
            // first pass of the loop draws the screen
            redraw: true,
            toggle_requested: false,
            logging: false,
        }
    }
}

/// Process-wide state, guarded by one critical-section mutex.
pub struct SharedState {
    inner: CriticalSectionMutex<RefCell<Snapshot>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            inner: CriticalSectionMutex::new(RefCell::new(Snapshot::default())),
        }
    }

    /// Runs `f` on the state with interrupts masked.
    pub fn update<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Consistent copy of the whole state.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock(|cell| *cell.borrow())
    }

    /// Replaces all four sample fields at once.
    pub fn publish_sample(&self, sample: PhysicalSample) {
        self.update(|state| state.sample = sample);
    }

    pub fn set_time(&self, time: NaiveDateTime) {
        self.update(|state| state.time = time);
    }

    pub fn step_selection(&self, rotation: Rotation) -> Quantity {
        self.update(|state| {
            state.selected = state.selected.step(rotation);
            state.redraw = true;
            state.selected
        })
    }

    /// Clears a pending redraw and returns the state to draw, in one lock.
    pub fn take_redraw(&self) -> Option<Snapshot> {
        self.update(|state| core::mem::take(&mut state.redraw).then_some(*state))
    }

    pub fn request_toggle(&self) {
        self.update(|state| {
            state.toggle_requested = true;
            state.redraw = true;
        });
    }

    /// Returns whether a toggle was pending and clears the request.
    pub fn take_toggle(&self) -> bool {
        self.update(|state| core::mem::take(&mut state.toggle_requested))
    }

    pub fn set_logging(&self, active: bool) {
        self.update(|state| {
            state.logging = active;
            state.redraw = true;
        });
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Free-running millisecond counter, advanced by the tick task.
///
/// Reads and writes happen inside a critical section, so a reader never sees
/// a half-updated value even where a 32-bit load is not atomic.
pub struct MillisCounter {
    millis: critical_section::Mutex<Cell<u32>>,
}

impl MillisCounter {
    pub const fn new() -> Self {
        Self {
            millis: critical_section::Mutex::new(Cell::new(0)),
        }
    }

    /// Advances the counter by one millisecond, wrapping after ~49.7 days.
    pub fn tick(&self) {
        self.advance(1);
    }

    pub fn advance(&self, ms: u32) {
        critical_section::with(|cs| {
            let millis = self.millis.borrow(cs);
            millis.set(millis.get().wrapping_add(ms));
        });
    }

    pub fn now(&self) -> u32 {
        critical_section::with(|cs| self.millis.borrow(cs).get())
    }
}

impl Default for MillisCounter {
    fn default() -> Self {
        Self::new()
    }
}
