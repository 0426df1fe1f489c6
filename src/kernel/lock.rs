use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Result, SimError};

/// A lockable unit of a contended resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Unit {
    Projector(usize),
    HardDrive(usize),
    MemoryBlock(usize),
}

impl Unit {
    fn kind(self) -> &'static str {
        match self {
            Unit::Projector(_) => "projector",
            Unit::HardDrive(_) => "hard drive",
            Unit::MemoryBlock(_) => "memory block",
        }
    }
}

/// One binary semaphore per device instance and per memory block. All
/// semaphores start free.
pub(crate) struct LockTable {
    projectors: Vec<AtomicBool>,
    hard_drives: Vec<AtomicBool>,
    memory_blocks: Vec<AtomicBool>,
}

impl LockTable {
    pub fn new(projectors: usize, hard_drives: usize, memory_blocks: usize) -> LockTable {
        let free = |n: usize| -> Vec<AtomicBool> { (0..n).map(|_| AtomicBool::new(false)).collect() };

        LockTable {
            projectors: free(projectors),
            hard_drives: free(hard_drives),
            memory_blocks: free(memory_blocks),
        }
    }

    fn semaphore(&self, unit: Unit) -> Result<&AtomicBool> {
        let (locks, index) = match unit {
            Unit::Projector(i) => (&self.projectors, i),
            Unit::HardDrive(i) => (&self.hard_drives, i),
            Unit::MemoryBlock(i) => (&self.memory_blocks, i),
        };

        locks.get(index).ok_or(SimError::UnitOutOfRange {
            kind: unit.kind(),
            index,
        })
    }

    /// Marks the unit held. Returns whether it was already held.
    pub fn test_and_set(&self, unit: Unit) -> Result<bool> {
        Ok(self.semaphore(unit)?.swap(true, Ordering::AcqRel))
    }

    pub fn release(&self, unit: Unit) -> Result<()> {
        self.semaphore(unit)?.store(false, Ordering::Release);
        Ok(())
    }

    pub fn is_held(&self, unit: Unit) -> Result<bool> {
        Ok(self.semaphore(unit)?.load(Ordering::Acquire))
    }

    pub fn memory_block_count(&self) -> usize {
        self.memory_blocks.len()
    }
}
