//! BME280 raw-to-physical compensation.
//!
//! Integer formulas from the Bosch BME280 datasheet (section 4.2.3 and 8.2).
//! Shift amounts and intermediate widths are part of the sensor's fixed-point
//! contract and must not be "simplified". Intermediates wrap like the
//! two's-complement reference so that garbage calibration from an absent
//! device yields garbage numbers instead of a panic.

/// Length of the temperature/pressure calibration block, registers 0x88..=0xA1.
pub const TEMP_PRESS_CALIB_LEN: usize = 26;

/// Length of the humidity calibration block, registers 0xE1..=0xE7.
pub const HUMIDITY_CALIB_LEN: usize = 7;

/// Length of the data burst, registers 0xF7..=0xFE.
pub const BURST_LEN: usize = 8;

/// Upper clamp of the humidity intermediate (100 %RH in Q22.10, shifted by 12).
const HUMIDITY_MAX: i32 = 419_430_400;

/// Factory trimming parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationSet {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,

    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,

    pub h1: u8,
    pub h2: i16,
    pub h3: u8,
    pub h4: i16,
    pub h5: i16,
    pub h6: i8,
}

/// One burst of uncompensated ADC values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    /// 20-bit
    pub pressure: u32,
    /// 20-bit
    pub temperature: u32,
    /// 16-bit
    pub humidity: u32,
}

/// Fixed-point compensation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Compensated {
    /// Q8 intermediate shared by the pressure and humidity formulas.
    pub fine_temperature: i32,
    /// Hundredths of a degree Celsius.
    pub temperature: i32,
    /// Pascal in Q24.8.
    pub pressure: i64,
    /// %RH in Q22.10.
    pub humidity: u32,
}

/// Compensated reading in physical units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EnvironmentReading {
    /// °C
    pub temperature: f32,
    /// hPa
    pub pressure: f32,
    /// %RH
    pub humidity: f32,
}

impl CalibrationSet {
    /// Unpacks the two calibration register blocks.
    ///
    /// `temp_press` starts at 0x88, `humidity` starts at 0xE1. Words are
    /// little-endian. H4 and H5 share register 0xE5, one nibble each.
    pub fn from_registers(
        temp_press: &[u8; TEMP_PRESS_CALIB_LEN],
        humidity: &[u8; HUMIDITY_CALIB_LEN],
    ) -> Self {
        let unsigned = |i: usize| u16::from_le_bytes([temp_press[i], temp_press[i + 1]]);
        let signed = |i: usize| i16::from_le_bytes([temp_press[i], temp_press[i + 1]]);

        let e4 = i16::from(humidity[3]);
        let e5 = i16::from(humidity[4]);
        let e6 = i16::from(humidity[5]);

        Self {
            t1: unsigned(0),
            t2: signed(2),
            t3: signed(4),

            p1: unsigned(6),
            p2: signed(8),
            p3: signed(10),
            p4: signed(12),
            p5: signed(14),
            p6: signed(16),
            p7: signed(18),
            p8: signed(20),
            p9: signed(22),

            // 0xA0 is reserved
            h1: temp_press[25],
            h2: i16::from_le_bytes([humidity[0], humidity[1]]),
            h3: humidity[2],
            h4: (e4 << 4) | (e5 & 0x0F),
            h5: (e6 << 4) | (e5 >> 4),
            h6: humidity[6] as i8,
        }
    }

    /// Runs all three formulas. Temperature goes first because its fine value
    /// feeds the other two.
    pub fn compensate(&self, raw: RawSample) -> Compensated {
        let fine_temperature = self.fine_temperature(raw.temperature);

        Compensated {
            fine_temperature,
            temperature: temperature_centi(fine_temperature),
            pressure: self.pressure_q24_8(raw.pressure, fine_temperature),
            humidity: self.humidity_q22_10(raw.humidity, fine_temperature),
        }
    }

    pub fn fine_temperature(&self, adc_t: u32) -> i32 {
        let adc_t = adc_t as i32;
        let t1 = i32::from(self.t1);

        let var1 = ((adc_t >> 3) - (t1 << 1)).wrapping_mul(i32::from(self.t2)) >> 11;
        let delta = (adc_t >> 4) - t1;
        let var2 = (delta.wrapping_mul(delta) >> 12).wrapping_mul(i32::from(self.t3)) >> 14;

        var1.wrapping_add(var2)
    }

    /// Pressure in Pa as Q24.8, or 0 when the formula's denominator is zero.
    pub fn pressure_q24_8(&self, adc_p: u32, fine_temperature: i32) -> i64 {
        let mut var1 = i64::from(fine_temperature) - 128_000;
        let mut var2 = var1.wrapping_mul(var1).wrapping_mul(i64::from(self.p6));
        var2 = var2.wrapping_add(var1.wrapping_mul(i64::from(self.p5)) << 17);
        var2 = var2.wrapping_add(i64::from(self.p4) << 35);
        var1 = (var1.wrapping_mul(var1).wrapping_mul(i64::from(self.p3)) >> 8)
            .wrapping_add(var1.wrapping_mul(i64::from(self.p2)) << 12);
        var1 = (1_i64 << 47).wrapping_add(var1).wrapping_mul(i64::from(self.p1)) >> 33;

        if var1 == 0 {
            return 0;
        }

        let mut p = 1_048_576 - i64::from(adc_p);
        p = (p << 31).wrapping_sub(var2).wrapping_mul(3125).wrapping_div(var1);
        var1 = i64::from(self.p9).wrapping_mul(p >> 13).wrapping_mul(p >> 13) >> 25;
        var2 = i64::from(self.p8).wrapping_mul(p) >> 19;

        (p.wrapping_add(var1).wrapping_add(var2) >> 8).wrapping_add(i64::from(self.p7) << 4)
    }

    /// Relative humidity as Q22.10, always within 0..=102400 (0..=100 %RH).
    pub fn humidity_q22_10(&self, adc_h: u32, fine_temperature: i32) -> u32 {
        let adc_h = adc_h as i32;
        let x = fine_temperature.wrapping_sub(76_800);

        let offset = (adc_h << 14)
            .wrapping_sub(i32::from(self.h4) << 20)
            .wrapping_sub(i32::from(self.h5).wrapping_mul(x))
            .wrapping_add(16_384)
            >> 15;
        let scale = ((x.wrapping_mul(i32::from(self.h6)) >> 10)
            .wrapping_mul((x.wrapping_mul(i32::from(self.h3)) >> 11).wrapping_add(32_768))
            >> 10)
            .wrapping_add(2_097_152)
            .wrapping_mul(i32::from(self.h2))
            .wrapping_add(8_192)
            >> 14;

        let mut v = offset.wrapping_mul(scale);
        v = v.wrapping_sub(((v >> 15).wrapping_mul(v >> 15) >> 7).wrapping_mul(i32::from(self.h1)) >> 4);

        (v.clamp(0, HUMIDITY_MAX) >> 12) as u32
    }
}

/// Hundredths of a degree from the fine temperature.
pub fn temperature_centi(fine_temperature: i32) -> i32 {
    fine_temperature.wrapping_mul(5).wrapping_add(128) >> 8
}

impl RawSample {
    /// Splits a 0xF7..=0xFE burst into the three ADC values.
    pub fn from_burst(data: &[u8; BURST_LEN]) -> Self {
        let wide = |msb: u8, lsb: u8, xlsb: u8| {
            (u32::from(msb) << 12) | (u32::from(lsb) << 4) | (u32::from(xlsb) >> 4)
        };

        Self {
            pressure: wide(data[0], data[1], data[2]),
            temperature: wide(data[3], data[4], data[5]),
            humidity: (u32::from(data[6]) << 8) | u32::from(data[7]),
        }
    }
}

impl Compensated {
    pub fn celsius(&self) -> f32 {
        self.temperature as f32 / 100.0
    }

    pub fn hectopascal(&self) -> f32 {
        self.pressure as f32 / 25_600.0
    }

    pub fn relative_humidity(&self) -> f32 {
        self.humidity as f32 / 1024.0
    }

    pub fn reading(&self) -> EnvironmentReading {
        EnvironmentReading {
            temperature: self.celsius(),
            pressure: self.hectopascal(),
            humidity: self.relative_humidity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMP_PRESS_BLOCK: [u8; TEMP_PRESS_CALIB_LEN] = [
        0x70, 0x6B, 0x43, 0x67, 0x18, 0xFC, 0x7D, 0x8E, 0x43, 0xD6, 0xD0, 0x0B, 0x27, 0x0B, 0x8C,
        0x00, 0xF9, 0xFF, 0x8C, 0x3C, 0xF8, 0xC6, 0x70, 0x17, 0x00, 0x4B,
    ];
    const HUMIDITY_BLOCK: [u8; HUMIDITY_CALIB_LEN] = [0x6A, 0x01, 0x00, 0x13, 0x29, 0x03, 0x1E];

    // adc_P = 415148, adc_T = 519888, adc_H = 30000
    const DATASHEET_BURST: [u8; BURST_LEN] = [0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x75, 0x30];

    fn datasheet_calibration() -> CalibrationSet {
        CalibrationSet {
            t1: 27504,
            t2: 26435,
            t3: -1000,
            p1: 36477,
            p2: -10685,
            p3: 3024,
            p4: 2855,
            p5: 140,
            p6: -7,
            p7: 15500,
            p8: -14600,
            p9: 6000,
            h1: 75,
            h2: 362,
            h3: 0,
            h4: 313,
            h5: 50,
            h6: 30,
        }
    }

    #[test]
    fn unpacks_calibration_registers() {
        let calibration = CalibrationSet::from_registers(&TEMP_PRESS_BLOCK, &HUMIDITY_BLOCK);
        assert_eq!(calibration, datasheet_calibration());
    }

    #[test]
    fn h6_is_signed() {
        let mut humidity = HUMIDITY_BLOCK;
        humidity[6] = 0xE2;
        let calibration = CalibrationSet::from_registers(&TEMP_PRESS_BLOCK, &humidity);
        assert_eq!(calibration.h6, -30);
    }

    #[test]
    fn splits_burst_into_raw_values() {
        let raw = RawSample::from_burst(&DATASHEET_BURST);
        assert_eq!(raw.pressure, 415_148);
        assert_eq!(raw.temperature, 519_888);
        assert_eq!(raw.humidity, 30_000);
    }

    #[test]
    fn zero_calibration_golden_vector() {
        let raw = RawSample::from_burst(&[0x80, 0x00, 0x00, 0x80, 0x00, 0x00, 0x80, 0x00]);
        assert_eq!(raw.pressure, 524_288);
        assert_eq!(raw.temperature, 524_288);
        assert_eq!(raw.humidity, 32_768);

        let out = CalibrationSet::default().compensate(raw);
        assert_eq!(out.fine_temperature, 0);
        assert_eq!(out.temperature, 0);
        // P1 == 0 makes the denominator vanish
        assert_eq!(out.pressure, 0);
        assert_eq!(out.humidity, 0);

        let reading = out.reading();
        assert_eq!(reading.temperature, 0.0);
        assert_eq!(reading.pressure, 0.0);
        assert_eq!(reading.humidity, 0.0);
    }

    #[test]
    fn datasheet_vector() {
        let out = datasheet_calibration().compensate(RawSample::from_burst(&DATASHEET_BURST));

        assert_eq!(out.fine_temperature, 128_422);
        assert_eq!(out.temperature, 2508);
        assert_eq!(out.pressure, 25_767_233);
        assert_eq!(out.humidity, 56_317);

        let reading = out.reading();
        assert!((reading.temperature - 25.08).abs() < 1e-4);
        assert!((reading.pressure - 1006.5325).abs() < 1e-3);
        assert_eq!(reading.humidity, 54.997_070_312_5);
    }

    #[test]
    fn compensation_is_deterministic() {
        let calibration = datasheet_calibration();
        let raw = RawSample::from_burst(&DATASHEET_BURST);
        assert_eq!(calibration.compensate(raw), calibration.compensate(raw));
    }

    #[test]
    fn pressure_zero_denominator_returns_zero() {
        let calibration = CalibrationSet {
            p1: 0,
            ..datasheet_calibration()
        };
        let out = calibration.compensate(RawSample::from_burst(&DATASHEET_BURST));
        assert_eq!(out.pressure, 0);
        assert_eq!(out.hectopascal(), 0.0);
        // the other two formulas are unaffected
        assert_eq!(out.temperature, 2508);
        assert_eq!(out.humidity, 56_317);
    }

    #[test]
    fn humidity_saturates_at_both_ends() {
        let calibration = datasheet_calibration();
        let fine = calibration.fine_temperature(519_888);

        assert_eq!(calibration.humidity_q22_10(0xFFFF, fine), 102_400);
        assert_eq!(calibration.humidity_q22_10(0x0000, fine), 0);

        for adc_h in [0_u32, 1, 12_345, 30_000, 45_000, 60_000, 0xFFFF] {
            let rh = calibration.humidity_q22_10(adc_h, fine) as f32 / 1024.0;
            assert!((0.0..=100.0).contains(&rh), "adc_h {adc_h} gave {rh}");
        }
    }

    #[test]
    fn garbage_calibration_does_not_panic() {
        let calibration =
            CalibrationSet::from_registers(&[0xFF; TEMP_PRESS_CALIB_LEN], &[0xFF; HUMIDITY_CALIB_LEN]);
        let out = calibration.compensate(RawSample::from_burst(&[0xFF; BURST_LEN]));
        assert!(out.humidity <= 102_400);
    }
}
