//! STM32F103 Blue Pill Environmental Data Logger
//! =============================================================================================
//!
//! Samples a BME280 and a photoresistor once per second, shows one quantity
//! at a time on a 16x2 LCD and, on demand, appends CSV lines to an SD card.
//!
//! Hardware Connections:
//!   I2C1 (BME280 @0x76, LCD1602 PCF8574 backpack @0x27):
//!      SCL  -> PB6
//!      SDA  -> PB7
//!
//!   Rotary Encoder:
//!      CLK  -> PA8 (pull-up)
//!      DT   -> PA9 (pull-up)
//!      SW   -> PB15 (pull-up, active low)
//!
//!   DS1302 RTC:
//!      CE   -> PB12
//!      IO   -> PB13
//!      SCLK -> PB14
//!
//!   Photoresistor divider -> PA0 (ADC1_IN0)
//!
//!   SD card (SPI1):
//!      SCK  -> PA5
//!      MISO -> PA6
//!      MOSI -> PA7
//!      CS   -> PA4
//!
//! Controls:
//! 1. Turn the encoder to cycle temperature, pressure, humidity, light
//! 2. Press it to start or stop logging (`*` in the corner while active)

#![no_std]
#![no_main]

use core::cell::RefCell;

use chrono::NaiveDate;
use defmt::{info, warn};
use defmt_rtt as _; // Global logger
use embassy_executor::Spawner;
use embassy_futures::yield_now;
use embassy_stm32::{
    adc::Adc,
    gpio::{Flex, Input, Level, Output, Pull, Speed},
    i2c::I2c,
    mode::Blocking,
    spi::{self, Spi},
    time::Hertz,
};
use embassy_time::{Delay, Duration, Ticker};
use embedded_hal_bus::{i2c::RefCellDevice, spi::ExclusiveDevice};
use embedded_sdmmc::SdCard;
use panic_probe as _; // Panic handler
use static_cell::StaticCell;

use data_logger::{
    config::{BME280_ADDRESS, LCD_ADDRESS, LightCalibration, LoggerConfig},
    csv_log::LogWriter,
    hardware::{
        bme280::Bme280,
        board::{AdcInput, FlexLine},
        bus_scan::{self, ADDRESS_RANGE},
        ds1302::Ds1302,
        gpio_button::GpioButton,
        gpio_encoder::GpioEncoder,
        lcd1602::Lcd1602,
        photoresistor::Photoresistor,
        sd_storage::{SdCardStorage, SharedClock},
        traits::CharDisplay,
    },
    scheduler::{Devices, Scheduler},
    state::{MillisCounter, SharedState},
};

static CLOCK: MillisCounter = MillisCounter::new();
static STATE: StaticCell<SharedState> = StaticCell::new();
static I2C_BUS: StaticCell<RefCell<I2c<'static, Blocking>>> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_stm32::init(Default::default());
    info!("environmental logger starting");

    spawner.spawn(millis_tick(&CLOCK)).unwrap();
    let state: &'static SharedState = STATE.init(SharedState::new());

    // Shared I2C bus at 100kHz: BME280 and LCD backpack
    let i2c = I2C_BUS.init(RefCell::new(I2c::new_blocking(
        p.I2C1,
        p.PB6,
        p.PB7,
        Hertz::khz(100),
        Default::default(),
    )));
    let i2c: &'static RefCell<_> = i2c;
    bus_scan::scan(&mut *i2c.borrow_mut(), ADDRESS_RANGE);

    let mut lcd = Lcd1602::new(RefCellDevice::new(i2c), Delay, LCD_ADDRESS);
    if lcd.init().is_err() {
        warn!("lcd not responding");
    }
    let _ = lcd.draw("Env. logger", "Starting...");

    let mut bme280 = Bme280::new(RefCellDevice::new(i2c), BME280_ADDRESS);
    match bme280.probe() {
        Ok(true) => info!("bme280 found"),
        Ok(false) => warn!("unexpected chip id at bme280 address"),
        Err(_) => warn!("bme280 not found"),
    }
    match bme280.init() {
        Ok(()) => info!("bme280 initialized"),
        Err(_) => warn!("bme280 init failed"),
    }

    let mut rtc = Ds1302::new(
        Output::new(p.PB12, Level::Low, Speed::Low),
        Output::new(p.PB14, Level::Low, Speed::Low),
        FlexLine::new(Flex::new(p.PB13)),
        Delay,
    );
    if rtc.init().is_err() {
        warn!("rtc init failed");
    }
    match rtc.read_time() {
        Ok(time) => state.set_time(time),
        Err(_) => {
            warn!("rtc holds no valid time, seeding 2025-01-01");
            let seed = NaiveDate::from_ymd_opt(2025, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
            if let Some(seed) = seed {
                if rtc.set_time(&seed).is_err() {
                    warn!("rtc write failed");
                }
                state.set_time(seed);
            }
        }
    }

    let light = Photoresistor::new(
        AdcInput::new(Adc::new(p.ADC1), p.PA0),
        LightCalibration::default(),
    );

    // SD card starts at 400kHz for the card's identification phase
    let mut spi_config = spi::Config::default();
    spi_config.frequency = Hertz::khz(400);
    let spi = Spi::new_blocking(p.SPI1, p.PA5, p.PA7, p.PA6, spi_config);
    let cs = Output::new(p.PA4, Level::High, Speed::Low);
    let card = SdCard::new(ExclusiveDevice::new(spi, cs, Delay).unwrap(), Delay);
    // First access runs the card's init sequence; the bus may speed up afterwards
    match card.num_bytes() {
        Ok(bytes) => {
            info!("sd card: {} MiB", bytes / (1024 * 1024));
            let mut fast = spi::Config::default();
            fast.frequency = Hertz::mhz(8);
            if card.spi(|dev| dev.bus_mut().set_config(&fast)).is_err() {
                warn!("sd spi clock unchanged");
            }
        }
        Err(_) => warn!("sd card not responding"),
    }
    let storage = SdCardStorage::new(card, SharedClock::new(state));

    let devices = Devices {
        environment: bme280,
        light,
        rtc,
        display: lcd,
        encoder: GpioEncoder::new(Input::new(p.PA8, Pull::Up), Input::new(p.PA9, Pull::Up)),
        button: GpioButton::new(Input::new(p.PB15, Pull::Up)),
    };
    let mut scheduler = Scheduler::new(
        LoggerConfig::default(),
        &CLOCK,
        state,
        devices,
        LogWriter::new(storage),
    );

    info!("entering main loop");
    loop {
        scheduler.run_once();
        yield_now().await;
    }
}

/// Millisecond time base for the super-loop.
#[embassy_executor::task]
async fn millis_tick(clock: &'static MillisCounter) {
    let mut ticker = Ticker::every(Duration::from_millis(1));
    loop {
        ticker.next().await;
        clock.tick();
    }
}
