use std::sync::Arc;

use tracing::{debug, error, info};

use super::*;

use crate::error::{Result, SimError};
use crate::io::{loader, Config, Instruction, Log};

/// Holds the simulated system and runs its processes to completion.
pub struct Driver {
    config: Config,
    processes: Vec<ProcessControlBlock>,
    sts: ShortTermScheduler,
    resources: Arc<ResourceManager>,
    log: Log,
    meta_data_processed: bool,
}

impl Driver {
    pub fn new(config: Config) -> Result<Driver> {
        let resources = ResourceManager::from_config(&config)?;
        Ok(Driver::with_resources(config, resources))
    }

    fn with_resources(config: Config, resources: ResourceManager) -> Driver {
        let log = Log::new(config.log_setting, config.log_path.clone());

        Driver {
            config,
            processes: Vec::new(),
            sts: ShortTermScheduler::new(),
            resources: Arc::new(resources),
            log,
            meta_data_processed: false,
        }
    }

    /// Reads the meta-data file named by the configuration, builds a process
    /// per application and computes the execution order.
    pub fn load(&mut self) -> Result<()> {
        let instructions = loader::load_meta_data(&self.config.meta_data_path)?;
        self.load_instructions(&instructions)
    }

    pub fn load_instructions(&mut self, instructions: &[Instruction]) -> Result<()> {
        let processes = LongTermScheduler::new(&self.config).batch_step(instructions)?;
        debug!(processes = processes.len(), "admitted meta-data");

        self.processes = processes;
        self.sts.schedule_processes(&mut self.processes);
        self.meta_data_processed = true;
        Ok(())
    }

    /// Runs every process in scheduled order, then writes the log file.
    pub fn start(&mut self) -> Result<()> {
        if !self.meta_data_processed {
            return Err(SimError::Sequence(
                "meta-data must be loaded before the simulation starts".to_string(),
            ));
        }

        info!(processes = self.processes.len(), "simulation starting");
        let timer = Timer::start();
        self.log.start();
        self.log.write_with_timestamp("Simulator program starting");

        while let Some(index) = self.sts.schedule_next() {
            self.run_process(index)?;
        }

        self.log.write_with_timestamp("Simulator program ending");
        info!(
            processes = self.processes.len(),
            elapsed_ms = timer.elapsed_ms() as u64,
            "simulation finished"
        );

        self.log.stream_to_file()
    }

    fn run_process(&mut self, index: usize) -> Result<()> {
        let timer = Timer::start();
        let process = &mut self.processes[index];
        let number = process.get_number();

        self.log.write_with_timestamp(&format!("OS: preparing process {number}"));
        process.change_state(ProcessState::Ready)?;

        self.log.write_with_timestamp(&format!("OS: starting process {number}"));
        process.change_state(ProcessState::Running)?;

        if let Err(err) = process.run(&self.resources, &mut self.log) {
            error!(process = number, %err, "process failed");
            return Err(SimError::ProcessFailed {
                process: number,
                source: Box::new(err),
            });
        }

        self.log.write_with_timestamp(&format!("OS: removing process {number}"));
        for block in process.take_allocated_blocks() {
            self.resources.release_memory(block)?;
        }
        process.change_state(ProcessState::Exit)?;

        debug!(
            process = number,
            state = ?process.get_state(),
            elapsed_us = timer.elapsed_us() as u64,
            "process removed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;

    const FAST_CONFIG: &str = "Start Simulator Configuration File
Version/Phase: 4.0
File Path: run.mdf
Monitor display time {msec}: 1
Processor cycle time {msec}: 1
Scanner cycle time {msec}: 1
Hard drive cycle time {msec}: 2
Keyboard cycle time {msec}: 1
Memory cycle time {msec}: 1
Projector cycle time {msec}: 2
System memory {kbytes}: 256
Memory block size {kbytes}: 128
Projector quantity: 2
Hard drive quantity: 1
Log: Log to File
Log File Path: run.lgf
End Simulator Configuration File
";

    fn setup(records: &str) -> (TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("run.conf"), FAST_CONFIG).unwrap();
        fs::write(
            dir.path().join("run.mdf"),
            format!("Start Program Meta-Data Code:\n{records}\nEnd Program Meta-Data Code.\n"),
        )
        .unwrap();

        let config = Config::load(&dir.path().join("run.conf")).unwrap();
        (dir, config)
    }

    fn driver_with_timeout(config: Config, timeout: Duration) -> Driver {
        let resources = ResourceManager::from_config(&config)
            .unwrap()
            .with_search_timeout(timeout);
        Driver::with_resources(config, resources)
    }

    fn log_messages(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| line.split_once(" - ").unwrap().1.to_string())
            .collect()
    }

    #[test]
    fn test_driver_end_to_end_runs_io_light_process_first() {
        let (dir, config) = setup(
            "S{begin}0; A{begin}0; I{hard drive}2; O{projector}2; P{run}3; A{finish}0;
             A{begin}0; P{run}2; M{allocate}1; M{block}2; A{finish}0; S{finish}0.",
        );

        let mut driver = Driver::new(config).unwrap();
        driver.load().unwrap();
        driver.start().unwrap();

        assert_eq!(
            log_messages(&dir.path().join("run.lgf")),
            vec![
                "Simulator program starting",
                "OS: preparing process 2",
                "OS: starting process 2",
                "Process 2: start processing action",
                "Process 2: end processing action",
                "Process 2: allocating memory",
                "Process 2: memory allocated at 0x00000000",
                "Process 2: start memory blocking",
                "Process 2: end memory blocking",
                "OS: removing process 2",
                "OS: preparing process 1",
                "OS: starting process 1",
                "Process 1: start hard drive input on HDD 0",
                "Process 1: end hard drive input",
                "Process 1: start projector output on PROJ 0",
                "Process 1: end projector output",
                "Process 1: start processing action",
                "Process 1: end processing action",
                "OS: removing process 1",
                "Simulator program ending",
            ]
        );
        assert!(driver
            .processes
            .iter()
            .all(|pcb| pcb.get_state() == ProcessState::Exit));
    }

    #[test]
    fn test_driver_start_requires_loaded_meta_data() {
        let (_dir, config) = setup("S{begin}0; S{finish}0.");
        let mut driver = Driver::new(config).unwrap();

        assert!(matches!(driver.start(), Err(SimError::Sequence(_))));
    }

    #[test]
    fn test_driver_invalid_code_creates_no_process() {
        let (_dir, config) = setup("S{begin}0; A{begin}0; X{run}1; A{finish}0; S{finish}0.");
        let mut driver = Driver::new(config).unwrap();

        assert!(matches!(driver.load(), Err(SimError::MetaData { record: 3, .. })));
        assert!(driver.processes.is_empty());
        assert!(driver.start().is_err());
    }

    #[test]
    fn test_driver_sequence_error_creates_no_process() {
        let (_dir, config) = setup("S{begin}0; A{begin}0; P{run}1; A{begin}0; A{finish}0; S{finish}0.");
        let mut driver = Driver::new(config).unwrap();

        assert!(matches!(driver.load(), Err(SimError::Sequence(_))));
        assert!(driver.processes.is_empty());
    }

    #[test]
    fn test_driver_releases_memory_on_exit() {
        let (_dir, config) = setup(
            "S{begin}0; A{begin}0; M{allocate}1; M{allocate}1; A{finish}0;
             A{begin}0; M{allocate}1; M{allocate}1; A{finish}0; S{finish}0.",
        );

        let mut driver = driver_with_timeout(config, Duration::from_millis(50));
        driver.load().unwrap();
        driver.start().unwrap();

        let blocks = driver.resources.quantities().memory_blocks();
        assert_eq!(blocks, 2);
        for block in 0..blocks {
            assert!(!driver.resources.is_memory_held(block).unwrap());
        }
    }

    #[test]
    fn test_driver_memory_timeout_fails_process() {
        let (dir, config) = setup(
            "S{begin}0; A{begin}0; M{allocate}1; M{allocate}1; M{allocate}1; A{finish}0; S{finish}0.",
        );

        let mut driver = driver_with_timeout(config, Duration::from_millis(20));
        driver.load().unwrap();

        let err = driver.start().unwrap_err();
        match err {
            SimError::ProcessFailed { process, source } => {
                assert_eq!(process, 1);
                assert!(matches!(*source, SimError::MemoryTimeout(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.path().join("run.lgf").exists());
    }
}
