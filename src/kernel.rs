//! The simulated machine's core: memory, scheduling, processes and consoles
//! wired together behind the calls an instruction interpreter makes.

use std::path::Path;

use log::{debug, info, warn};

use crate::config::Config;
use crate::constants::*;
use crate::device::{ConsoleId, InputHandle, Io};
use crate::error::{ConfigError, LoadError, MemoryError};
use crate::event::Event;
use crate::io::ProgramSource;
use crate::manager::MemoryManager;
use crate::process::{Pcb, ProcessTable};
use crate::scheduler::Scheduler;
use crate::translation::{Mmu, VirtualAddress};

/// Whether the machine keeps running after a process left the CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    Running,
    ShuttingDown,
}

pub struct Kernel {
    config: Config,
    mmu: Mmu,
    scheduler: Scheduler,
    processes: ProcessTable,
    io: Io,
}

impl Kernel {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            "kernel: {} frames of {} cells, {} pages per process, {} swap slots",
            config.frame_count(),
            config.page_size,
            config.address_space_size,
            config.swap_capacity
        );
        Ok(Kernel {
            config,
            mmu: Mmu::new(MemoryManager::new(config)),
            scheduler: Scheduler::new(),
            processes: ProcessTable::new(),
            io: Io::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Instructions per time slice
    pub fn timeslice(&self) -> usize {
        self.config.timeslice
    }

    pub fn mmu(&self) -> &Mmu {
        &self.mmu
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.processes
    }

    pub fn io(&self) -> &Io {
        &self.io
    }

    pub fn input_handle(&self) -> InputHandle {
        self.io.input_handle()
    }

    /// Start the init process and put it on the CPU
    pub fn boot(&mut self, source: &ProgramSource) -> Result<Pid, LoadError> {
        info!("kernel: booting {}", source.name());
        let pid = self.create_process(source)?;
        self.scheduler.timeslice_over();
        Ok(pid)
    }

    /// Load a program as a new process and queue it as ready
    pub fn create_process(&mut self, source: &ProgramSource) -> Result<Pid, LoadError> {
        let parent_console = self.scheduler.running().registers.console;
        let pcb = self.processes.create(
            source,
            self.mmu.manager_mut(),
            &mut self.io,
            parent_console,
        )?;
        let pid = pcb.pid;
        self.scheduler.add_process(pcb);
        Ok(pid)
    }

    pub fn create_process_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Pid, LoadError> {
        let source = ProgramSource::from_file(path)?;
        self.create_process(&source)
    }

    pub fn running_pid(&self) -> Pid {
        self.scheduler.running_pid()
    }

    /// The running process; `None` while idle
    pub fn running_mut(&mut self) -> Option<&mut Pcb> {
        self.scheduler.running_mut()
    }

    pub fn timeslice_over(&mut self) {
        self.scheduler.timeslice_over();
    }

    pub fn block(&mut self, event: Event) {
        self.scheduler.block(event);
    }

    pub fn unblock(&mut self, event: &Event) -> usize {
        self.scheduler.unblock(event)
    }

    /// End the running process and reclaim everything it owned
    pub fn end_process(&mut self) -> Option<Pid> {
        let pcb = self.scheduler.end_process()?;
        let pid = pcb.pid;
        self.processes.destroy(pcb, self.mmu.manager_mut(), &mut self.io);
        Some(pid)
    }

    /// Remove any process, running or not
    pub fn kill(&mut self, pid: Pid) -> bool {
        match self.scheduler.kill(pid) {
            Some(pcb) => {
                self.processes.destroy(pcb, self.mmu.manager_mut(), &mut self.io);
                true
            }
            None => false,
        }
    }

    /// Physical address of `address` in the running process
    pub fn resolve(&mut self, address: &str) -> Result<usize, MemoryError> {
        let space = self.running_space()?;
        self.mmu.resolve(space, address)
    }

    pub fn translate(&mut self, va: VirtualAddress) -> Result<usize, MemoryError> {
        let space = self.running_space()?;
        self.mmu.translate(space, va)
    }

    pub fn read_cell(&mut self, address: &str) -> Result<String, MemoryError> {
        let space = self.running_space()?;
        self.mmu.read_cell(space, address)
    }

    pub fn write_cell(&mut self, address: &str, value: impl Into<String>) -> Result<(), MemoryError> {
        let space = self.running_space()?;
        self.mmu.write_cell(space, address, value)
    }

    pub fn write_absolute(&mut self, physical: usize, value: impl Into<String>) {
        self.mmu.write_absolute(physical, value);
    }

    /// Open a console for the running process, dropping its old one
    pub fn create_console(&mut self) -> Option<ConsoleId> {
        let pid = self.scheduler.running_pid();
        let pcb = self.scheduler.running_mut()?;
        if let Some(old) = pcb.registers.console.take() {
            self.io.release(old);
        }
        let console = self.io.create_console(format!("Prozess {}", pid));
        pcb.registers.console = Some(console);
        Some(console)
    }

    /// Write to the running process's console, if it has one
    pub fn write_console(&mut self, text: &str) {
        if let Some(console) = self.scheduler.running().registers.console {
            self.io.write(console, text);
        }
    }

    /// Block the running process until a line of input arrives on its
    /// console. The destination is resolved now, so delivery writes to the
    /// physical cell without translating again.
    pub fn issue_read(&mut self, destination: VirtualAddress) -> Result<(), MemoryError> {
        let pa = self.translate(destination)?;
        let pcb = self.scheduler.running();
        let event = Event::read(pcb.pid, pa, pcb.registers.console);
        if event.console.is_none() {
            warn!("kernel: process {} reads without a console", pcb.pid);
        }
        self.io.read(event.clone());
        self.scheduler.block(event);
        Ok(())
    }

    /// Block the running process until `pid` ends. Returns false, without
    /// blocking, when there is no such process or it is the caller itself.
    pub fn wait_for(&mut self, pid: Pid) -> bool {
        if pid == self.running_pid() {
            debug!("kernel: process {} cannot wait for itself", pid);
            return false;
        }
        if !self.processes.contains(pid) {
            debug!("kernel: process {} waits for unknown process {}", self.running_pid(), pid);
            return false;
        }
        self.scheduler.block(Event::wait(pid));
        true
    }

    /// Hand completed reads to their processes: write the received text to
    /// the destination and wake the reader
    pub fn deliver_completions(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(event) = self.io.next_completion() {
            if !self.processes.contains(event.id) {
                debug!("kernel: dropping {} for a process that is gone", event);
                continue;
            }
            if let (Some(address), Some(content)) = (event.address, event.content.as_deref()) {
                self.mmu.write_absolute(address, content);
            }
            self.scheduler.unblock(&event);
            delivered += 1;
        }
        delivered
    }

    /// React to an access violation by the running process: report it on
    /// its console and end it. A faulting init process takes the system down.
    pub fn fault(&mut self) -> SystemState {
        warn!("kernel: access violation in process {}", self.running_pid());
        self.write_console("\nACCESS VIOLATION\n");
        self.quit()
    }

    /// The running process is done. When that is init the system shuts down.
    pub fn quit(&mut self) -> SystemState {
        if self.running_pid() == INIT_PID {
            info!("kernel: init process is done, shutting down");
            return SystemState::ShuttingDown;
        }
        self.end_process();
        SystemState::Running
    }

    /// Destroy every process
    pub fn shutdown(&mut self) {
        for pcb in self.scheduler.drain() {
            self.processes.destroy(pcb, self.mmu.manager_mut(), &mut self.io);
        }
        info!("kernel: shut down");
    }

    fn running_space(&self) -> Result<Pid, MemoryError> {
        let pcb = self.scheduler.running();
        pcb.space.ok_or(MemoryError::UnknownSpace(pcb.pid))
    }
}
