use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::lock::Unit;
use super::{timer, ResourceManager};

use crate::error::{Result, SimError};
use crate::io::{Code, Config, Descriptor, Instruction, Log};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Start,
    Ready,
    Running,
    Waiting,
    Exit,
}

impl ProcessState {
    /// Whether a process may move from `self` to `to`.
    pub fn can_become(self, to: ProcessState) -> bool {
        use ProcessState::*;

        match to {
            Ready => matches!(self, Start | Waiting | Running),
            Running => matches!(self, Ready | Waiting),
            Waiting => self == Running,
            Exit => self == Running,
            Start => false,
        }
    }
}

/// One step of a process, derived from a meta-data record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Operation {
    pub code: Code,
    pub descriptor: Descriptor,
    pub cycles: u64,
    pub duration: Duration,
}

impl Operation {
    pub fn new(instruction: &Instruction, config: &Config) -> Result<Operation> {
        let per_cycle = config.time_per_cycle(instruction.code, instruction.descriptor)?;
        let millis = instruction.cycles.checked_mul(per_cycle).ok_or_else(|| {
            SimError::Config(format!(
                "duration of {instruction} at {per_cycle} ms per cycle does not fit in 64 bits"
            ))
        })?;

        Ok(Operation {
            code: instruction.code,
            descriptor: instruction.descriptor,
            cycles: instruction.cycles,
            duration: Duration::from_millis(millis),
        })
    }

    pub fn kind(&self) -> &'static str {
        self.code.kind()
    }

    #[cfg(test)]
    pub fn duration_ms(&self) -> u128 {
        self.duration.as_millis()
    }
}

#[derive(Debug)]
pub(crate) struct ProcessControlBlock {
    id: usize,
    state: ProcessState,
    operations: Vec<Operation>,
    scheduled: bool,
    num_io: usize,
    allocated_blocks: Vec<usize>,
}

impl ProcessControlBlock {
    pub fn new(id: usize) -> ProcessControlBlock {
        ProcessControlBlock {
            id,
            state: ProcessState::Start,
            operations: Vec::new(),
            scheduled: false,
            num_io: 0,
            allocated_blocks: Vec::new(),
        }
    }

    pub fn add_operation(&mut self, operation: Operation) {
        if operation.code.is_io() {
            self.num_io += 1;
        }
        self.operations.push(operation);
    }

    pub fn get_id(&self) -> usize {
        self.id
    }

    /// Process number as it appears in the log.
    pub fn get_number(&self) -> usize {
        self.id + 1
    }

    pub fn get_state(&self) -> ProcessState {
        self.state
    }

    pub fn get_num_io(&self) -> usize {
        self.num_io
    }

    pub fn get_num_ops(&self) -> usize {
        self.operations.len()
    }

    #[cfg(test)]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    pub fn set_scheduled(&mut self) {
        self.scheduled = true;
    }

    #[cfg(test)]
    pub fn allocated_blocks(&self) -> &[usize] {
        &self.allocated_blocks
    }

    /// Hands back the memory blocks this process holds, leaving it with none.
    pub fn take_allocated_blocks(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.allocated_blocks)
    }

    pub fn change_state(&mut self, to: ProcessState) -> Result<()> {
        if !self.state.can_become(to) {
            return Err(SimError::InvalidTransition {
                process: self.get_number(),
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Executes every operation in program order. Stops at the first
    /// operation that fails.
    pub fn run(&mut self, resources: &Arc<ResourceManager>, log: &mut Log) -> Result<()> {
        for i in 0..self.operations.len() {
            let operation = self.operations[i].clone();

            match operation.code {
                Code::Input | Code::Output => self.run_io(&operation, resources, log)?,
                Code::Processing => self.run_burst(&operation, operation.kind(), log),
                Code::Memory if operation.descriptor == Descriptor::Allocate => {
                    self.allocate_memory(resources, log)?
                }
                Code::Memory => self.run_burst(&operation, "memory blocking", log),
                Code::System | Code::Application => {
                    return Err(SimError::Sequence(format!(
                        "process {} cannot execute {}{{{}}}",
                        self.get_number(),
                        operation.code.as_char(),
                        operation.descriptor
                    )))
                }
            }
        }

        Ok(())
    }

    fn run_burst(&self, operation: &Operation, label: &str, log: &mut Log) {
        log.write_with_timestamp(&format!("Process {}: start {label}", self.get_number()));
        timer::wait(operation.duration);
        log.write_with_timestamp(&format!("Process {}: end {label}", self.get_number()));
    }

    fn run_io(&mut self, operation: &Operation, resources: &Arc<ResourceManager>, log: &mut Log) -> Result<()> {
        let number = self.get_number();
        self.change_state(ProcessState::Waiting)?;

        let unit = {
            let mut devices = resources.lock_devices();
            let (unit, suffix) = match operation.descriptor {
                Descriptor::Projector => {
                    let index = devices.check_set_projector()?;
                    (Some(Unit::Projector(index)), format!(" on PROJ {index}"))
                }
                Descriptor::HardDrive => {
                    let index = devices.check_set_hard_drive()?;
                    (Some(Unit::HardDrive(index)), format!(" on HDD {index}"))
                }
                _ => (None, String::new()),
            };
            log.write_with_timestamp(&format!(
                "Process {number}: start {} {}{suffix}",
                operation.descriptor,
                operation.kind()
            ));
            unit
        };

        if let Some(unit) = unit {
            resources.hold_device(unit)?;
        }

        let worker_resources = Arc::clone(resources);
        let duration = operation.duration;
        let worker = thread::Builder::new()
            .name(format!("process-{number}-io"))
            .spawn(move || -> Result<()> {
                timer::wait(duration);
                if let Some(unit) = unit {
                    worker_resources.release_device(unit)?;
                }
                Ok(())
            })
            .map_err(|source| SimError::Spawn { process: number, source })?;

        worker.join().map_err(|_| SimError::WorkerPanicked(number))??;

        log.write_with_timestamp(&format!(
            "Process {number}: end {} {}",
            operation.descriptor,
            operation.kind()
        ));
        self.change_state(ProcessState::Running)
    }

    fn allocate_memory(&mut self, resources: &ResourceManager, log: &mut Log) -> Result<()> {
        let number = self.get_number();
        log.write_with_timestamp(&format!("Process {number}: allocating memory"));

        self.change_state(ProcessState::Waiting)?;
        let grant = resources.check_set_memory()?;
        self.change_state(ProcessState::Running)?;

        self.allocated_blocks.push(grant.block);
        log.write_with_address(&format!("Process {number}: memory allocated at "), grant.address);
        Ok(())
    }
}
