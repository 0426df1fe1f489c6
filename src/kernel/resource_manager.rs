use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::lock::{LockTable, Unit};
use super::Timer;

use crate::error::{Result, SimError};
use crate::io::Config;

pub(crate) const MEMORY_SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on memory blocks, one semaphore each.
pub(crate) const MAX_MEMORY_BLOCKS: u64 = 1 << 20;

const SYSTEM_MEMORY: &str = "system memory";
const MEMORY_BLOCK_SIZE: &str = "memory block size";
const PROJECTOR_QUANTITY: &str = "projector quantity";
const HARD_DRIVE_QUANTITY: &str = "hard drive quantity";

/// Resource quantities derived from configuration. Memory sizes are in kbytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceQuantities {
    pub projectors: usize,
    pub hard_drives: usize,
    pub memory_kb: u64,
    pub block_size_kb: u64,
}

impl ResourceQuantities {
    pub fn from_config(config: &Config) -> Result<ResourceQuantities> {
        let memory_kb = sized_entry(config, SYSTEM_MEMORY)?;
        let block_size_kb = sized_entry(config, MEMORY_BLOCK_SIZE)?;
        let count = |prefix: &str| config.entry(prefix).map_or(0, |(_, value)| value as usize);

        Ok(ResourceQuantities {
            projectors: count(PROJECTOR_QUANTITY),
            hard_drives: count(HARD_DRIVE_QUANTITY),
            memory_kb,
            block_size_kb,
        })
    }

    pub fn memory_blocks(&self) -> usize {
        (self.memory_kb / self.block_size_kb) as usize
    }
}

/// Looks up a `<prefix> {kbytes|Mbytes|Gbytes}` entry and scales it to kbytes.
/// The unit character sits right after the opening brace.
fn sized_entry(config: &Config, prefix: &str) -> Result<u64> {
    let (key, value) = config
        .entry(prefix)
        .ok_or_else(|| SimError::Config(format!("missing '{prefix}' entry")))?;

    let suffix = key.chars().nth(prefix.len() + 2);
    let scale = match suffix {
        Some('k') => 1,
        Some('M') => 1_000,
        Some('G') => 1_000_000,
        _ => {
            return Err(SimError::Config(format!(
                "could not determine {prefix} in kbytes, Mbytes, or Gbytes from '{key}'"
            )))
        }
    };

    value.checked_mul(scale).ok_or_else(|| {
        SimError::Config(format!("{prefix} of {value} in '{key}' is too large to express in kbytes"))
    })
}

#[derive(Debug, Default)]
struct DeviceCursors {
    projector: usize,
    hard_drive: usize,
}

/// Granted memory block and its address offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryGrant {
    pub block: usize,
    pub address: u64,
}

/// Hands out device and memory units. Device numbering is round-robin under
/// the device mutex; memory blocks are exclusive through the lock table.
pub(crate) struct ResourceManager {
    quantities: ResourceQuantities,
    locks: LockTable,
    devices: Mutex<DeviceCursors>,
    memory_cursor: Mutex<usize>,
    search_timeout: Duration,
}

impl ResourceManager {
    pub fn new(quantities: ResourceQuantities) -> Result<ResourceManager> {
        if quantities.block_size_kb == 0 {
            return Err(SimError::Config("memory block size must be greater than zero".to_string()));
        }
        if quantities.block_size_kb > quantities.memory_kb {
            return Err(SimError::Config(format!(
                "memory block size ({} kB) exceeds system memory ({} kB)",
                quantities.block_size_kb, quantities.memory_kb
            )));
        }
        let blocks = quantities.memory_kb / quantities.block_size_kb;
        if blocks > MAX_MEMORY_BLOCKS {
            return Err(SimError::Config(format!(
                "{blocks} memory blocks exceeds the limit of {MAX_MEMORY_BLOCKS}; use a larger block size"
            )));
        }

        debug!(?quantities, blocks = quantities.memory_blocks(), "initialised resources");

        Ok(ResourceManager {
            locks: LockTable::new(quantities.projectors, quantities.hard_drives, quantities.memory_blocks()),
            quantities,
            devices: Mutex::new(DeviceCursors::default()),
            memory_cursor: Mutex::new(0),
            search_timeout: MEMORY_SEARCH_TIMEOUT,
        })
    }

    pub fn from_config(config: &Config) -> Result<ResourceManager> {
        ResourceManager::new(ResourceQuantities::from_config(config)?)
    }

    #[cfg(test)]
    pub fn with_search_timeout(mut self, timeout: Duration) -> ResourceManager {
        self.search_timeout = timeout;
        self
    }

    #[cfg(test)]
    pub fn quantities(&self) -> &ResourceQuantities {
        &self.quantities
    }

    /// Takes the device mutex. Hold the guard only while picking a unit and
    /// composing its log line.
    pub fn lock_devices(&self) -> DeviceGuard<'_> {
        DeviceGuard {
            cursors: self.devices.lock().unwrap_or_else(PoisonError::into_inner),
            quantities: &self.quantities,
        }
    }

    /// Marks a device unit in use for the length of a device wait. Round-robin
    /// numbering does not guarantee exclusivity, so overlap is only reported.
    pub fn hold_device(&self, unit: Unit) -> Result<()> {
        if self.locks.test_and_set(unit)? {
            warn!(?unit, "device unit already in use; round-robin numbering overlapped");
        }
        Ok(())
    }

    pub fn release_device(&self, unit: Unit) -> Result<()> {
        self.locks.release(unit)
    }

    /// Finds a free memory block starting at the cursor, wrapping around.
    /// Fails once the search has run longer than the search timeout.
    pub fn check_set_memory(&self) -> Result<MemoryGrant> {
        let timer = Timer::start();
        let blocks = self.locks.memory_block_count();
        let mut cursor = self.memory_cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let mut probes = 0usize;

        loop {
            let block = *cursor % blocks;
            *cursor = (block + 1) % blocks;

            if !self.locks.test_and_set(Unit::MemoryBlock(block))? {
                let address = (block as u64 * self.quantities.block_size_kb) % self.quantities.memory_kb;
                return Ok(MemoryGrant { block, address });
            }

            if timer.elapsed() > self.search_timeout {
                return Err(SimError::MemoryTimeout(self.search_timeout));
            }

            probes += 1;
            if probes % blocks == 0 {
                thread::sleep(Duration::from_millis(1));
            }
        }
    }

    pub fn release_memory(&self, block: usize) -> Result<()> {
        let unit = Unit::MemoryBlock(block);
        if !self.locks.is_held(unit)? {
            warn!(block, "releasing a memory block that is not held");
        }
        self.locks.release(unit)
    }

    #[cfg(test)]
    pub fn is_memory_held(&self, block: usize) -> Result<bool> {
        self.locks.is_held(Unit::MemoryBlock(block))
    }
}

/// Device mutex guard exposing the round-robin cursors.
pub(crate) struct DeviceGuard<'a> {
    cursors: MutexGuard<'a, DeviceCursors>,
    quantities: &'a ResourceQuantities,
}

impl DeviceGuard<'_> {
    pub fn check_set_projector(&mut self) -> Result<usize> {
        next_unit(&mut self.cursors.projector, self.quantities.projectors, "projector")
    }

    pub fn check_set_hard_drive(&mut self) -> Result<usize> {
        next_unit(&mut self.cursors.hard_drive, self.quantities.hard_drives, "hard drive")
    }
}

fn next_unit(cursor: &mut usize, quantity: usize, kind: &'static str) -> Result<usize> {
    if quantity == 0 {
        return Err(SimError::NoDevice(kind));
    }
    let index = *cursor % quantity;
    *cursor += 1;
    Ok(index)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::io::config::tests::sample_config;

    fn quantities(projectors: usize, hard_drives: usize, memory_kb: u64, block_size_kb: u64) -> ResourceQuantities {
        ResourceQuantities {
            projectors,
            hard_drives,
            memory_kb,
            block_size_kb,
        }
    }

    fn memory_kb_for(line: &str) -> Result<u64> {
        let config = Config::parse(&sample_config(line))?;
        Ok(ResourceQuantities::from_config(&config)?.memory_kb)
    }

    #[test]
    fn test_resource_quantities_unit_suffix_scaling() {
        assert_eq!(memory_kb_for("System memory {kbytes}: 10000").unwrap(), 10_000);
        assert_eq!(memory_kb_for("System memory {Mbytes}: 10").unwrap(), 10_000);
        assert_eq!(memory_kb_for("System memory {Gbytes}: 1").unwrap(), 1_000_000);
    }

    #[test]
    fn test_resource_quantities_scaling_overflow_is_config_error() {
        let err = memory_kb_for("System memory {Gbytes}: 18446744073709551").unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_resource_quantities_from_config() {
        let config = Config::parse(&sample_config("System memory {kbytes}: 2048")).unwrap();
        let q = ResourceQuantities::from_config(&config).unwrap();

        assert_eq!(q, quantities(4, 2, 2048, 128));
        assert_eq!(q.memory_blocks(), 16);
    }

    #[test]
    fn test_resource_manager_rejects_oversized_block() {
        assert!(matches!(ResourceManager::new(quantities(1, 1, 64, 128)), Err(SimError::Config(_))));
        assert!(matches!(ResourceManager::new(quantities(1, 1, 64, 0)), Err(SimError::Config(_))));
    }

    #[test]
    fn test_resource_manager_rejects_too_many_blocks() {
        let err = ResourceManager::new(quantities(1, 1, 1_000_000_000, 1)).err().unwrap();
        assert!(matches!(err, SimError::Config(_)));

        let at_limit = ResourceManager::new(quantities(1, 1, MAX_MEMORY_BLOCKS * 2, 2)).unwrap();
        assert_eq!(at_limit.quantities().memory_blocks(), MAX_MEMORY_BLOCKS as usize);
    }

    #[test]
    fn test_resource_manager_round_robin_wraps() {
        let rm = ResourceManager::new(quantities(3, 2, 1024, 128)).unwrap();
        let mut devices = rm.lock_devices();

        let projectors: Vec<usize> = (0..7).map(|_| devices.check_set_projector().unwrap()).collect();
        assert_eq!(projectors, vec![0, 1, 2, 0, 1, 2, 0]);

        assert_eq!(devices.check_set_hard_drive().unwrap(), 0);
        assert_eq!(devices.check_set_hard_drive().unwrap(), 1);
        assert_eq!(devices.check_set_hard_drive().unwrap(), 0);
    }

    #[test]
    fn test_resource_manager_no_device() {
        let rm = ResourceManager::new(quantities(0, 1, 1024, 128)).unwrap();
        let err = rm.lock_devices().check_set_projector().unwrap_err();
        assert!(matches!(err, SimError::NoDevice("projector")));
    }

    #[test]
    fn test_resource_manager_memory_addresses() {
        let rm = ResourceManager::new(quantities(1, 1, 512, 128)).unwrap();

        let addresses: Vec<u64> = (0..4).map(|_| rm.check_set_memory().unwrap().address).collect();
        assert_eq!(addresses, vec![0, 128, 256, 384]);
    }

    #[test]
    fn test_resource_manager_memory_exhaustion_times_out() {
        let rm = ResourceManager::new(quantities(1, 1, 256, 128))
            .unwrap()
            .with_search_timeout(Duration::from_millis(30));

        let first = rm.check_set_memory().unwrap();
        let second = rm.check_set_memory().unwrap();
        assert_ne!(first.block, second.block);

        let timer = Timer::start();
        let err = rm.check_set_memory().unwrap_err();
        assert!(matches!(err, SimError::MemoryTimeout(_)));
        assert!(timer.elapsed() >= Duration::from_millis(30));

        assert!(rm.is_memory_held(first.block).unwrap());
        assert!(rm.is_memory_held(second.block).unwrap());
    }

    #[test]
    fn test_resource_manager_release_memory() {
        let rm = ResourceManager::new(quantities(1, 1, 256, 128))
            .unwrap()
            .with_search_timeout(Duration::from_millis(30));

        let first = rm.check_set_memory().unwrap();
        rm.check_set_memory().unwrap();
        rm.release_memory(first.block).unwrap();

        let again = rm.check_set_memory().unwrap();
        assert_eq!(again, first);
    }

    #[test]
    fn test_resource_manager_hold_and_release_device() {
        let rm = ResourceManager::new(quantities(2, 1, 256, 128)).unwrap();
        rm.hold_device(Unit::Projector(1)).unwrap();
        rm.hold_device(Unit::Projector(1)).unwrap();
        rm.release_device(Unit::Projector(1)).unwrap();
        assert!(rm.hold_device(Unit::Projector(2)).is_err());
    }

    proptest! {
        #[test]
        fn test_resource_manager_round_robin_law(quantity in 1usize..8, requests in 1usize..40) {
            let rm = ResourceManager::new(quantities(quantity, quantity, 256, 128)).unwrap();
            let mut devices = rm.lock_devices();

            let mut previous = devices.check_set_hard_drive().unwrap();
            prop_assert_eq!(previous, 0);
            for _ in 1..requests {
                let next = devices.check_set_hard_drive().unwrap();
                prop_assert_eq!(next, (previous + 1) % quantity);
                previous = next;
            }
        }
    }
}
