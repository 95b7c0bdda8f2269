use std::collections::BTreeSet;
use std::fmt;

use log::{debug, info};

use crate::constants::*;
use crate::device::{ConsoleId, Io};
use crate::error::LoadError;
use crate::io::ProgramSource;
use crate::manager::MemoryManager;
use crate::translation::VirtualAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Created, not yet handed to the scheduler
    Fresh,
    Ready,
    Running,
    Blocked,
    Idle,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::Fresh => "fresh",
            ProcessState::Ready => "ready",
            ProcessState::Running => "running",
            ProcessState::Blocked => "blocked",
            ProcessState::Idle => "idle",
        };
        f.write_str(name)
    }
}

/// CPU state saved with a process while it is off the CPU
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterSet {
    /// `None` only for the idle process, which has no program
    pub program_counter: Option<VirtualAddress>,
    pub register1: String,
    pub register2: String,
    pub console: Option<ConsoleId>,
}

/// Process control block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pcb {
    pub pid: Pid,
    pub priority: u32,
    pub state: ProcessState,
    pub registers: RegisterSet,
    /// Key of the page and allocation tables, set once a program is loaded
    pub space: Option<Pid>,
}

impl Pcb {
    pub fn new(pid: Pid) -> Self {
        Pcb {
            pid,
            priority: 0,
            state: ProcessState::Fresh,
            registers: RegisterSet::default(),
            space: None,
        }
    }

    /// The pseudo-process that holds the CPU when nothing else can run
    pub fn idle() -> Self {
        Pcb { state: ProcessState::Idle, ..Pcb::new(IDLE_PID) }
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.pid == IDLE_PID
    }
}

impl fmt::Display for Pcb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[pid {} priority {} state {}", self.pid, self.priority, self.state)?;
        match self.space {
            Some(space) => write!(f, " space {}]", space),
            None => write!(f, " no space]"),
        }
    }
}

/// Hands out pids and builds and tears down processes.
///
/// Records themselves travel through the scheduler's queues; the table
/// keeps track of which pids are alive.
#[derive(Debug)]
pub struct ProcessTable {
    next_pid: Pid,
    live: BTreeSet<Pid>,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable {
    pub fn new() -> Self {
        ProcessTable { next_pid: INIT_PID, live: BTreeSet::new() }
    }

    /// Load `source` into a fresh process. Every process but init inherits
    /// the console of its creator. A failed load consumes no pid.
    pub fn create(
        &mut self,
        source: &ProgramSource,
        manager: &mut MemoryManager,
        io: &mut Io,
        parent_console: Option<ConsoleId>,
    ) -> Result<Pcb, LoadError> {
        let pid = self.next_pid;
        let mut pcb = Pcb::new(pid);
        manager.load_program(source, &mut pcb)?;
        self.next_pid += 1;

        if pid != INIT_PID {
            if let Some(console) = parent_console {
                io.retain(console);
                pcb.registers.console = Some(console);
            }
        }

        self.live.insert(pid);
        info!("process {} created from {}: {}", pid, source.name(), pcb);
        Ok(pcb)
    }

    /// Reclaim a process's tables and its console reference
    pub fn destroy(&mut self, pcb: Pcb, manager: &mut MemoryManager, io: &mut Io) {
        info!("destroying process {}", pcb);

        io.cancel(pcb.pid);
        if let Some(console) = pcb.registers.console {
            if io.release(console) {
                debug!("console {} closed with process {}", console, pcb.pid);
            }
        }
        if let Some(space) = pcb.space {
            manager.release(space);
        }
        self.live.remove(&pcb.pid);
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.live.contains(&pid)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.live.iter().copied()
    }
}
