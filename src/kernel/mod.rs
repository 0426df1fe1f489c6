mod lock;
mod long_term_scheduler;
mod process_control_block;
pub(crate) mod resource_manager;
mod short_term_scheduler;
pub mod timer;

use long_term_scheduler::LongTermScheduler;
use short_term_scheduler::ShortTermScheduler;

pub(crate) use process_control_block::ProcessControlBlock;
pub(crate) use resource_manager::ResourceManager;

pub mod driver;

pub use driver::Driver;
pub use process_control_block::ProcessState;
pub use timer::Timer;
