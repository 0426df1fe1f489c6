use std::collections::VecDeque;

use tracing::debug;

use super::ProcessControlBlock;

/// Fixes the execution order once, before any process runs. Processes with
/// fewer I/O operations go first; ties keep creation order.
pub(crate) struct ShortTermScheduler {
    ready_queue: VecDeque<usize>,
}

impl ShortTermScheduler {
    pub fn new() -> ShortTermScheduler {
        ShortTermScheduler {
            ready_queue: VecDeque::new(),
        }
    }

    /// Runs the scheduling pass over every unscheduled process.
    pub fn schedule_processes(&mut self, processes: &mut [ProcessControlBlock]) {
        while let Some(index) = Self::priority_index(processes) {
            processes[index].set_scheduled();
            self.ready_queue.push_back(index);
        }

        debug!(order = ?self.order(), "computed schedule");
    }

    /// Index of the unscheduled process that should run next.
    fn priority_index(processes: &[ProcessControlBlock]) -> Option<usize> {
        processes
            .iter()
            .enumerate()
            .filter(|(_, pcb)| !pcb.is_scheduled())
            .min_by_key(|(_, pcb)| (pcb.get_num_io(), pcb.get_id()))
            .map(|(index, _)| index)
    }

    pub fn schedule_next(&mut self) -> Option<usize> {
        self.ready_queue.pop_front()
    }

    pub fn order(&self) -> Vec<usize> {
        self.ready_queue.iter().copied().collect()
    }
}
