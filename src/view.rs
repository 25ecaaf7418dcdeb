//! 16x2 LCD screen layout.
//!
//! ```text
//! Temp       14:05
//!  23.45 C       *
//! ```
//!
//! Line 1 holds the selected quantity and the time, line 2 the value with its
//! unit and, in the last column, `*` while logging is active.

use core::fmt::Write;

use chrono::Timelike;
use heapless::String;

use crate::state::{Quantity, Snapshot};

pub const COLUMNS: usize = 16;

pub type Line = String<COLUMNS>;

impl Quantity {
    pub fn label(self) -> &'static str {
        match self {
            Quantity::Temperature => "Temp",
            Quantity::Pressure => "Pressure",
            Quantity::Humidity => "Humidity",
            Quantity::Light => "Light",
        }
    }
}

/// Renders both display lines, each exactly [`COLUMNS`] characters wide.
pub fn render(snapshot: &Snapshot) -> (Line, Line) {
    let mut top = Line::new();
    // 11 + 5 columns always fit
    let _ = write!(
        top,
        "{:<11}{:02}:{:02}",
        snapshot.selected.label(),
        snapshot.time.hour(),
        snapshot.time.minute()
    );

    let sample = &snapshot.sample;
    let mut bottom = Line::new();
    // An out-of-range value is cut at the column limit rather than dropped.
    let _ = match snapshot.selected {
        Quantity::Temperature => write!(bottom, "{:6.2} C", sample.temperature),
        Quantity::Pressure => write!(bottom, "{:7.2} hPa", sample.pressure),
        Quantity::Humidity => write!(bottom, "{:6.2} %", sample.humidity),
        Quantity::Light => write!(bottom, "{:3} %", sample.light),
    };
    pad(&mut bottom, COLUMNS - 1);
    let indicator = if snapshot.logging { '*' } else { ' ' };
    let _ = bottom.push(indicator);

    (top, bottom)
}

fn pad(line: &mut Line, width: usize) {
    while line.len() > width {
        line.pop();
    }
    while line.len() < width {
        let _ = line.push(' ');
    }
}
