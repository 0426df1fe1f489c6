use tracing::debug;

use super::process_control_block::Operation;
use super::ProcessControlBlock;

use crate::error::{Result, SimError};
use crate::io::{Code, Config, Descriptor, Instruction};

/// Admits meta-data into the system. Tracks system and application
/// begin/finish nesting and turns everything between `A{begin}` and
/// `A{finish}` into operations of a new process.
pub(crate) struct LongTermScheduler<'a> {
    config: &'a Config,
    processes: Vec<ProcessControlBlock>,
    system_started: bool,
    system_exited: bool,
    reading_application: bool,
}

impl<'a> LongTermScheduler<'a> {
    pub fn new(config: &'a Config) -> LongTermScheduler<'a> {
        LongTermScheduler {
            config,
            processes: Vec::new(),
            system_started: false,
            system_exited: false,
            reading_application: false,
        }
    }

    pub fn step(&mut self, instruction: &Instruction) -> Result<()> {
        if self.system_exited {
            return Err(SimError::Sequence(format!("{instruction} follows S{{finish}}")));
        }

        if !self.system_started {
            if instruction.is(Code::System, Descriptor::Begin) {
                self.system_started = true;
                return Ok(());
            }
            return Err(SimError::Sequence(format!(
                "cannot execute {instruction} before the system has been started"
            )));
        }

        match (instruction.code, instruction.descriptor) {
            (Code::System, Descriptor::Finish) => {
                if self.reading_application {
                    return Err(SimError::Sequence(
                        "cannot finish the system while an application is still open".to_string(),
                    ));
                }
                self.system_started = false;
                self.system_exited = true;
            }
            (Code::System, _) => {
                return Err(SimError::Sequence(format!("unexpected system instruction {instruction}")));
            }
            (Code::Application, Descriptor::Begin) => {
                if self.reading_application {
                    return Err(SimError::Sequence(
                        "cannot begin a new application before the previous one has finished".to_string(),
                    ));
                }
                self.processes.push(ProcessControlBlock::new(self.processes.len()));
                self.reading_application = true;
            }
            (Code::Application, Descriptor::Finish) => {
                if !self.reading_application {
                    return Err(SimError::Sequence(
                        "cannot finish an application before one begins".to_string(),
                    ));
                }
                self.reading_application = false;
            }
            (Code::Application, _) => {
                return Err(SimError::Sequence(format!(
                    "unexpected application instruction {instruction}"
                )));
            }
            _ => {
                let operation = Operation::new(instruction, self.config)?;
                match self.processes.last_mut() {
                    Some(process) if self.reading_application => process.add_operation(operation),
                    _ => {
                        return Err(SimError::Sequence(format!(
                            "{instruction} is outside of an application"
                        )))
                    }
                }
            }
        }

        Ok(())
    }

    /// Admits the whole stream and returns the built processes. Nothing is
    /// returned unless every instruction is accepted and the system finished.
    pub fn batch_step(mut self, instructions: &[Instruction]) -> Result<Vec<ProcessControlBlock>> {
        for instruction in instructions {
            self.step(instruction)?;
        }

        if !self.system_exited {
            return Err(SimError::Sequence("meta-data ended without S{finish}".to_string()));
        }

        for process in &self.processes {
            debug!(
                process = process.get_number(),
                operations = process.get_num_ops(),
                io = process.get_num_io(),
                "built process"
            );
        }
        Ok(self.processes)
    }
}
