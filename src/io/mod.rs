pub mod config;
pub mod instruction;
pub mod loader;
pub mod log;

pub use config::{Config, LogSetting};
pub use instruction::{Code, Descriptor, Instruction};
pub use log::Log;
