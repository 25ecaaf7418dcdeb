pub mod traits;

pub mod bme280;
pub mod bus_scan;
pub mod ds1302;
pub mod gpio_button;
pub mod gpio_encoder;
pub mod lcd1602;
pub mod photoresistor;
pub mod sd_storage;

#[cfg(feature = "firmware")]
pub mod board;
