//! Cooperative super-loop.
//!
//! [`Scheduler::run_once`] evaluates four tasks in a fixed order: input poll,
//! display refresh, periodic sample, logging toggle. None of them blocks or
//! fails; peripheral errors are logged and the loop carries on with the last
//! good values.

use crate::config::LoggerConfig;
use crate::csv_log::LogWriter;
use crate::hardware::traits::{
    Button, CharDisplay, EnvironmentSensor, LightSensor, LogStorage, QuadratureEncoder,
    RealTimeClock,
};
use crate::input::{ButtonDebouncer, EncoderState};
use crate::state::{MillisCounter, PhysicalSample, SharedState};
use crate::view;

/// Peripherals driven by the loop.
pub struct Devices<E, L, R, C, Q, B> {
    pub environment: E,
    pub light: L,
    pub rtc: R,
    pub display: C,
    pub encoder: Q,
    pub button: B,
}

pub struct Scheduler<'a, E, L, R, C, Q, B, S> {
    config: LoggerConfig,
    clock: &'a MillisCounter,
    state: &'a SharedState,
    devices: Devices<E, L, R, C, Q, B>,
    logger: LogWriter<S>,
    encoder: EncoderState,
    button: ButtonDebouncer,
    last_sample: u32,
}

impl<'a, E, L, R, C, Q, B, S> Scheduler<'a, E, L, R, C, Q, B, S>
where
    E: EnvironmentSensor,
    L: LightSensor,
    R: RealTimeClock,
    C: CharDisplay,
    Q: QuadratureEncoder,
    B: Button,
    S: LogStorage,
{
    pub fn new(
        config: LoggerConfig,
        clock: &'a MillisCounter,
        state: &'a SharedState,
        devices: Devices<E, L, R, C, Q, B>,
        logger: LogWriter<S>,
    ) -> Self {
        Self {
            config,
            clock,
            state,
            devices,
            logger,
            encoder: EncoderState::default(),
            button: ButtonDebouncer::new(config.debounce_ms),
            last_sample: 0,
        }
    }

    pub fn devices(&self) -> &Devices<E, L, R, C, Q, B> {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut Devices<E, L, R, C, Q, B> {
        &mut self.devices
    }

    pub fn logger(&self) -> &LogWriter<S> {
        &self.logger
    }

    /// One pass over all tasks.
    pub fn run_once(&mut self) {
        self.poll_input();
        self.refresh_display();
        self.sample_if_due();
        self.toggle_logging();
    }

    fn poll_input(&mut self) {
        let (clk, dt) = self.devices.encoder.phases();
        if let Some(rotation) = self.encoder.update(clk, dt) {
            let selected = self.state.step_selection(rotation);
            debug!("showing quantity {}", selected.index());
        }

        let pressed = self.devices.button.is_pressed();
        if self.button.update(pressed, self.clock.now()) {
            debug!("button press");
            self.state.request_toggle();
        }
    }

    fn refresh_display(&mut self) {
        let Some(snapshot) = self.state.take_redraw() else {
            return;
        };

        let (top, bottom) = view::render(&snapshot);
        if self.devices.display.draw(&top, &bottom).is_err() {
            warn!("lcd update failed");
        }
    }

    fn sample_if_due(&mut self) {
        let now = self.clock.now();
        if now.wrapping_sub(self.last_sample) < self.config.sample_interval_ms {
            return;
        }
        // fixed cadence: a late pass does not shift later deadlines
        self.last_sample = self.last_sample.wrapping_add(self.config.sample_interval_ms);
        self.sample();
    }

    fn sample(&mut self) {
        let environment = self.devices.environment.read();
        let light = self.devices.light.read_percent();
        let time = self.devices.rtc.read_time();

        let snapshot = self.state.update(|state| {
            if let Ok(time) = &time {
                state.time = *time;
            }
            if let Ok(environment) = &environment {
                let light = *light.as_ref().unwrap_or(&state.sample.light);
                state.sample = PhysicalSample::new(*environment, light);
            }
            state.redraw = true;
            *state
        });

        if time.is_err() {
            warn!("rtc read failed");
        }
        if light.is_err() {
            warn!("light sensor read failed");
        }
        if environment.is_err() {
            warn!("bme280 read failed, sample skipped");
            return;
        }

        let sample = snapshot.sample;
        debug!(
            "T {} C, P {} hPa, H {} %, L {} %",
            sample.temperature,
            sample.pressure,
            sample.humidity,
            sample.light
        );

        if self.logger.is_active() && self.logger.append(&sample, snapshot.time).is_err() {
            self.state.set_logging(false);
        }
    }

    fn toggle_logging(&mut self) {
        if !self.state.take_toggle() {
            return;
        }

        if self.logger.is_active() {
            if self.logger.stop().is_err() {
                error!("closing the log failed");
            }
            self.state.set_logging(false);
        } else {
            let time = self.state.snapshot().time;
            let started = self.logger.start(time).is_ok();
            if !started {
                error!("could not open the log file");
            }
            self.state.set_logging(started);
        }
    }
}
