use core::ops::RangeInclusive;

use embedded_hal::i2c::I2c;
use heapless::Vec;

/// Non-reserved 7-bit addresses.
pub const ADDRESS_RANGE: RangeInclusive<u8> = 0x08..=0x77;

pub type Found = Vec<u8, 112>;

/// Addresses in `range` that acknowledge an empty write.
pub fn scan<I2C: I2c>(i2c: &mut I2C, range: RangeInclusive<u8>) -> Found {
    let mut found = Found::new();
    for address in range {
        if i2c.write(address, &[]).is_ok() {
            info!("i2c device at {}", address);
            if found.push(address).is_err() {
                break;
            }
        }
    }
    if found.is_empty() {
        warn!("no i2c devices found");
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal::i2c::NoAcknowledgeSource;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    #[test]
    fn lists_acknowledging_addresses() {
        let nack = ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address);
        let expectations = [
            Transaction::write(0x25, vec![]).with_error(nack),
            Transaction::write(0x26, vec![]).with_error(nack),
            Transaction::write(0x27, vec![]),
            Transaction::write(0x28, vec![]).with_error(nack),
        ];
        let mut i2c = I2cMock::new(&expectations);
        assert_eq!(scan(&mut i2c, 0x25..=0x28).as_slice(), &[0x27]);
        i2c.done();
    }

    #[test]
    fn empty_bus() {
        let expectations: std::vec::Vec<_> = (0x76..=0x77)
            .map(|a| Transaction::write(a, vec![]).with_error(ErrorKind::Other))
            .collect();
        let mut i2c = I2cMock::new(&expectations);
        assert!(scan(&mut i2c, 0x76..=0x77).is_empty());
        i2c.done();
    }
}
