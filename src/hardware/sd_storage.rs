//! Log storage on a FAT-formatted SD card (first partition, root directory).

use chrono::{Datelike, NaiveDateTime, Timelike};
use embedded_sdmmc::{
    BlockDevice, Error, Mode, RawDirectory, RawFile, RawVolume, TimeSource, Timestamp,
    VolumeIdx, VolumeManager,
};

use super::traits::LogStorage;
use crate::state::SharedState;

/// FAT timestamps from the time in the shared state.
pub struct SharedClock<'a> {
    state: &'a SharedState,
}

impl<'a> SharedClock<'a> {
    pub fn new(state: &'a SharedState) -> Self {
        Self { state }
    }
}

impl TimeSource for SharedClock<'_> {
    fn get_timestamp(&self) -> Timestamp {
        fat_timestamp(&self.state.snapshot().time)
    }
}

/// FAT dates start in 1980; earlier times are pinned there.
pub fn fat_timestamp(time: &NaiveDateTime) -> Timestamp {
    Timestamp {
        year_since_1970: (time.year() - 1970).clamp(10, 255) as u8,
        zero_indexed_month: time.month0() as u8,
        zero_indexed_day: time.day0() as u8,
        hours: time.hour() as u8,
        minutes: time.minute() as u8,
        seconds: time.second() as u8,
    }
}

#[derive(Clone, Copy)]
struct OpenFile {
    volume: RawVolume,
    dir: RawDirectory,
    file: RawFile,
}

pub struct SdCardStorage<D: BlockDevice, T: TimeSource> {
    volumes: VolumeManager<D, T>,
    open: Option<OpenFile>,
}

impl<D: BlockDevice, T: TimeSource> SdCardStorage<D, T> {
    pub fn new(device: D, clock: T) -> Self {
        Self {
            volumes: VolumeManager::new(device, clock),
            open: None,
        }
    }
}

impl<D: BlockDevice, T: TimeSource> LogStorage for SdCardStorage<D, T> {
    type Error = Error<D::Error>;

    /// Opens `name` in the root directory, creating it or appending to it.
    fn open(&mut self, name: &str) -> Result<(), Self::Error> {
        if self.open.is_some() {
            self.close()?;
        }

        let volume = self.volumes.open_raw_volume(VolumeIdx(0))?;
        let dir = match self.volumes.open_root_dir(volume) {
            Ok(dir) => dir,
            Err(e) => {
                let _ = self.volumes.close_volume(volume);
                return Err(e);
            }
        };
        let file = match self
            .volumes
            .open_file_in_dir(dir, name, Mode::ReadWriteCreateOrAppend)
        {
            Ok(file) => file,
            Err(e) => {
                let _ = self.volumes.close_dir(dir);
                let _ = self.volumes.close_volume(volume);
                return Err(e);
            }
        };

        debug!("sd file open");
        self.open = Some(OpenFile { volume, dir, file });
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        let open = self.open.ok_or(Error::BadHandle)?;
        self.volumes.write(open.file, data)?;
        Ok(data.len())
    }

    /// Closing the file flushes its directory entry.
    fn close(&mut self) -> Result<(), Self::Error> {
        let Some(open) = self.open.take() else {
            return Ok(());
        };
        let file = self.volumes.close_file(open.file);
        let dir = self.volumes.close_dir(open.dir);
        let volume = self.volumes.close_volume(open.volume);
        file.and(dir).and(volume)
    }
}
