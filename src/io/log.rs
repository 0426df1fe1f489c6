//! Simulator log sink. Monitor lines are printed as they are written; file
//! lines are buffered and written out once the run completes.

use std::fs;
use std::path::PathBuf;

use super::LogSetting;

use crate::error::{Result, SimError};
use crate::kernel::Timer;

pub struct Log {
    setting: LogSetting,
    path: PathBuf,
    timer: Timer,
    buffer: Vec<String>,
}

impl Log {
    pub fn new(setting: LogSetting, path: PathBuf) -> Log {
        Log {
            setting,
            path,
            timer: Timer::start(),
            buffer: Vec::new(),
        }
    }

    /// Resets the timestamp origin. Called when the simulation starts.
    pub fn start(&mut self) {
        self.timer = Timer::start();
    }

    pub fn write_line(&mut self, line: &str) {
        if self.setting.to_monitor() {
            println!("{line}");
        }
        if self.setting.to_file() {
            self.buffer.push(line.to_string());
        }
    }

    pub fn write_with_timestamp(&mut self, message: &str) {
        let line = format!("{:.6} - {message}", self.timer.elapsed_secs());
        self.write_line(&line);
    }

    pub fn write_with_address(&mut self, message: &str, address: u64) {
        self.write_with_timestamp(&format!("{message}0x{address:08x}"));
    }

    /// Lines buffered for the log file so far.
    #[cfg(test)]
    pub fn buffered(&self) -> &[String] {
        &self.buffer
    }

    pub fn stream_to_file(&mut self) -> Result<()> {
        if !self.setting.to_file() {
            return Ok(());
        }

        let mut contents = self.buffer.join("\n");
        contents.push('\n');
        fs::write(&self.path, contents)
            .map_err(|err| SimError::io("could not write log file", &self.path, err))
    }
}
