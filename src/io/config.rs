//! Simulator configuration file.
//!
//! The file is a fixed preamble, a version line, the meta-data file path, a run
//! of `Key: value` timing and resource lines, the logging destination, the log
//! file path and a fixed postamble. Keys are validated against a closed
//! vocabulary and stored with a lower-case first letter, so later lookups can
//! match on descriptor names such as `hard drive`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::Code;
use super::Descriptor;

use crate::error::{Result, SimError};

const PREAMBLE: &str = "Start Simulator Configuration File";
const POSTAMBLE: &str = "End Simulator Configuration File";
const META_DATA_EXTENSION: &str = ".mdf";

const VALUE_KEYS: [&str; 15] = [
    "Monitor display time {msec}",
    "Processor cycle time {msec}",
    "Scanner cycle time {msec}",
    "Hard drive cycle time {msec}",
    "Keyboard cycle time {msec}",
    "Memory cycle time {msec}",
    "Projector cycle time {msec}",
    "System memory {kbytes}",
    "System memory {Mbytes}",
    "System memory {Gbytes}",
    "Memory block size {kbytes}",
    "Memory block size {Mbytes}",
    "Memory block size {Gbytes}",
    "Projector quantity",
    "Hard drive quantity",
];

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSetting {
    Monitor,
    File,
    Both,
}

impl LogSetting {
    fn parse(value: &str) -> Result<LogSetting> {
        match value {
            "Log to Monitor" => Ok(LogSetting::Monitor),
            "Log to File" => Ok(LogSetting::File),
            "Log to Both" => Ok(LogSetting::Both),
            other => Err(SimError::Config(format!("'{other}' is not a valid logging type"))),
        }
    }

    pub fn to_monitor(self) -> bool {
        matches!(self, LogSetting::Monitor | LogSetting::Both)
    }

    pub fn to_file(self) -> bool {
        matches!(self, LogSetting::File | LogSetting::Both)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub version: String,
    pub meta_data_path: PathBuf,
    pub log_setting: LogSetting,
    pub log_path: PathBuf,
    /// Timing and resource entries in file order, keyed by their lower-cased
    /// name (e.g. `hard drive cycle time {msec}`).
    entries: Vec<(String, u64)>,
}

impl Config {
    /// Reads and validates a configuration file. Relative paths inside it are
    /// resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path)
            .map_err(|err| SimError::io("could not read configuration file", path, err))?;

        let mut config = Config::parse(&text)?;
        if let Some(dir) = path.parent() {
            config.meta_data_path = dir.join(&config.meta_data_path);
            config.log_path = dir.join(&config.log_path);
        }

        debug!(
            version = %config.version,
            meta_data = %config.meta_data_path.display(),
            log = ?config.log_setting,
            entries = config.entries().len(),
            "loaded configuration"
        );
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Config> {
        let mut lines = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty());

        match lines.next() {
            Some(PREAMBLE) => {}
            other => {
                return Err(SimError::Config(format!(
                    "expected '{PREAMBLE}', found '{}'",
                    other.unwrap_or("")
                )))
            }
        }

        let version = expect_key(lines.next(), "Version/Phase")?.to_string();

        let meta_data_path = expect_key(lines.next(), "File Path")?;
        if !meta_data_path.ends_with(META_DATA_EXTENSION) || meta_data_path.len() <= META_DATA_EXTENSION.len() {
            return Err(SimError::Config(format!(
                "meta-data file '{meta_data_path}' must have the {META_DATA_EXTENSION} extension"
            )));
        }
        let meta_data_path = PathBuf::from(meta_data_path);

        let mut entries = Vec::new();
        let log_setting = loop {
            let line = lines
                .next()
                .ok_or_else(|| SimError::Config("missing 'Log:' line".to_string()))?;
            let (key, value) = split_key(line)?;

            if key == "Log" {
                break LogSetting::parse(value)?;
            }
            if !VALUE_KEYS.contains(&key) {
                return Err(SimError::Config(format!("'{key}' is not a recognised configuration key")));
            }
            let value = value.parse::<u64>().map_err(|err| {
                SimError::Config(format!("value '{value}' for '{key}' is not a non-negative integer: {err}"))
            })?;
            entries.push((lower_first(key), value));
        };

        let log_path = PathBuf::from(expect_key(lines.next(), "Log File Path")?);

        match lines.next() {
            Some(line) if line.starts_with(POSTAMBLE) => {}
            other => {
                return Err(SimError::Config(format!(
                    "expected '{POSTAMBLE}', found '{}'",
                    other.unwrap_or("")
                )))
            }
        }

        Ok(Config {
            version,
            meta_data_path,
            log_setting,
            log_path,
            entries,
        })
    }

    pub fn entries(&self) -> &[(String, u64)] {
        &self.entries
    }

    /// Finds the first entry whose key starts with `prefix`.
    pub fn entry(&self, prefix: &str) -> Option<(&str, u64)> {
        self.entries
            .iter()
            .find(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.as_str(), *value))
    }

    /// Milliseconds per cycle for an operation. Processing and memory codes
    /// use their own timings, every other code is looked up by descriptor.
    pub fn time_per_cycle(&self, code: Code, descriptor: Descriptor) -> Result<u64> {
        let prefix = match code {
            Code::Processing => "processor cycle time".to_string(),
            Code::Memory => "memory cycle time".to_string(),
            _ => format!("{descriptor} "),
        };

        self.entries
            .iter()
            .find(|(key, _)| key.starts_with(&prefix) && key.contains("time"))
            .map(|(_, value)| *value)
            .ok_or_else(|| {
                SimError::Config(format!(
                    "no cycle time configured for {}{{{descriptor}}}",
                    code.as_char()
                ))
            })
    }
}

fn split_key(line: &str) -> Result<(&str, &str)> {
    line.split_once(':')
        .map(|(key, value)| (key.trim(), value.trim()))
        .ok_or_else(|| SimError::Config(format!("line '{line}' is not a 'key: value' pair")))
}

fn expect_key<'a>(line: Option<&'a str>, expected: &str) -> Result<&'a str> {
    let line = line.ok_or_else(|| SimError::Config(format!("missing '{expected}' line")))?;
    let (key, value) = split_key(line)?;
    if key != expected {
        return Err(SimError::Config(format!("expected '{expected}', found '{key}'")));
    }
    Ok(value)
}

fn lower_first(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
