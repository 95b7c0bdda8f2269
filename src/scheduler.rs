use std::collections::VecDeque;

use log::{debug, info};

use crate::constants::*;
use crate::event::{Event, EventKind};
use crate::process::{Pcb, ProcessState};

/// Cooperative scheduler.
///
/// Exactly one record holds the CPU at any time: a real process or the
/// idle pseudo-process. Records are moved between the queues by value, so a
/// process is in exactly one place.
pub struct Scheduler {
    ready: VecDeque<Pcb>,
    blocked: Vec<(Event, Pcb)>,
    /// `None` while idle
    running: Option<Pcb>,
    idle: Pcb,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            ready: VecDeque::new(),
            blocked: Vec::new(),
            running: None,
            idle: Pcb::idle(),
        }
    }

    /// The record on the CPU, the idle one included
    pub fn running(&self) -> &Pcb {
        self.running.as_ref().unwrap_or(&self.idle)
    }

    /// Mutable access to the running process; `None` while idle
    pub fn running_mut(&mut self) -> Option<&mut Pcb> {
        self.running.as_mut()
    }

    pub fn running_pid(&self) -> Pid {
        self.running().pid
    }

    pub fn is_idle(&self) -> bool {
        self.running.is_none()
    }

    pub fn add_process(&mut self, mut pcb: Pcb) {
        pcb.priority = DEFAULT_PRIORITY;
        pcb.state = ProcessState::Ready;
        info!("scheduler: process {} added, {} ready", pcb.pid, self.ready.len() + 1);
        self.ready.push_back(pcb);
    }

    /// Preempt the running process if someone else is ready
    pub fn timeslice_over(&mut self) {
        if self.ready.is_empty() {
            if !self.is_idle() {
                debug!("scheduler: time slice over, nobody else is ready");
            }
            return;
        }

        if let Some(mut pcb) = self.running.take() {
            debug!("scheduler: process {} suspended", pcb.pid);
            pcb.state = ProcessState::Ready;
            self.ready.push_back(pcb);
        }
        self.dispatch();
    }

    /// Park the running process until `event` is unblocked
    pub fn block(&mut self, event: Event) {
        let Some(mut pcb) = self.running.take() else {
            debug!("scheduler: idle process cannot wait for {}", event);
            return;
        };
        debug!("scheduler: process {} waits for {}", pcb.pid, event);
        pcb.state = ProcessState::Blocked;
        self.blocked.push((event, pcb));
        self.dispatch();
    }

    /// Move every process blocked on a matching event to the ready queue.
    /// The running process keeps the CPU.
    pub fn unblock(&mut self, event: &Event) -> usize {
        debug!("scheduler: received {}", event);
        let woken = self.wake(|blocked| blocked.matches(event));
        if woken == 0 {
            debug!("scheduler: nobody waits for {}", event);
        }
        woken
    }

    /// Take the running process off the CPU for good, wake its waiters and
    /// dispatch the next one. The record is returned for destruction.
    pub fn end_process(&mut self) -> Option<Pcb> {
        let Some(pcb) = self.running.take() else {
            debug!("scheduler: idle process cannot end");
            return None;
        };
        info!("scheduler: process {} is ending", pcb.pid);
        self.wake_waiters(pcb.pid);
        self.dispatch();
        Some(pcb)
    }

    /// Remove a process wherever it is. Waiters on it are woken just as if
    /// it had ended on its own.
    pub fn kill(&mut self, pid: Pid) -> Option<Pcb> {
        if self.running.as_ref().is_some_and(|pcb| pcb.pid == pid) {
            return self.end_process();
        }

        let ready = self.ready.iter().position(|pcb| pcb.pid == pid);
        let blocked = self.blocked.iter().position(|(_, pcb)| pcb.pid == pid);
        let pcb = match (ready, blocked) {
            (Some(index), _) => self.ready.remove(index)?,
            (None, Some(index)) => self.blocked.remove(index).1,
            (None, None) => return None,
        };

        info!("scheduler: process {} killed", pid);
        self.wake_waiters(pid);
        Some(pcb)
    }

    /// Empty every queue and the CPU; used at shutdown
    pub fn drain(&mut self) -> Vec<Pcb> {
        let mut all: Vec<Pcb> = self.running.take().into_iter().collect();
        all.extend(self.ready.drain(..));
        all.extend(self.blocked.drain(..).map(|(_, pcb)| pcb));
        all
    }

    pub fn ready_pids(&self) -> Vec<Pid> {
        self.ready.iter().map(|pcb| pcb.pid).collect()
    }

    pub fn blocked_pids(&self) -> Vec<Pid> {
        self.blocked.iter().map(|(_, pcb)| pcb.pid).collect()
    }

    fn wake_waiters(&mut self, pid: Pid) {
        self.wake(|event| event.kind == EventKind::Wait && event.id == pid);
    }

    fn wake(&mut self, mut matches: impl FnMut(&Event) -> bool) -> usize {
        let mut woken = 0;
        let mut still_blocked = Vec::with_capacity(self.blocked.len());
        for (event, mut pcb) in self.blocked.drain(..) {
            if matches(&event) {
                debug!("scheduler: process {} returns from {}", pcb.pid, event);
                pcb.state = ProcessState::Ready;
                self.ready.push_back(pcb);
                woken += 1;
            } else {
                still_blocked.push((event, pcb));
            }
        }
        self.blocked = still_blocked;
        woken
    }

    /// Put the head of the ready queue on the CPU, or go idle
    fn dispatch(&mut self) {
        self.running = self.ready.pop_front().map(|mut pcb| {
            pcb.state = ProcessState::Running;
            pcb
        });
        match &self.running {
            Some(pcb) => debug!("scheduler: switching to process {}", pcb.pid),
            None => debug!("scheduler: switching to idle process"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_ready(pids: &[Pid]) -> Scheduler {
        let mut scheduler = Scheduler::new();
        for &pid in pids {
            scheduler.add_process(Pcb::new(pid));
        }
        scheduler
    }

    #[test]
    fn test_starts_idle() {
        let scheduler = Scheduler::new();
        assert!(scheduler.is_idle());
        assert_eq!(scheduler.running_pid(), IDLE_PID);
        assert_eq!(scheduler.running().state, ProcessState::Idle);
    }

    #[test]
    fn test_add_process_marks_ready() {
        let scheduler = with_ready(&[1]);
        assert_eq!(scheduler.ready_pids(), vec![1]);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_fifo_and_wait_wakeup() {
        let mut scheduler = with_ready(&[1, 2]);

        scheduler.timeslice_over();
        assert_eq!(scheduler.running_pid(), 1);
        assert_eq!(scheduler.running().state, ProcessState::Running);

        scheduler.block(Event::wait(2));
        assert_eq!(scheduler.running_pid(), 2);
        assert_eq!(scheduler.blocked_pids(), vec![1]);

        let ended = scheduler.end_process().unwrap();
        assert_eq!(ended.pid, 2);
        // 1 was woken and dispatched right away
        assert_eq!(scheduler.running_pid(), 1);
        assert!(scheduler.blocked_pids().is_empty());
    }

    #[test]
    fn test_woken_waiter_queues_behind_ready() {
        let mut scheduler = with_ready(&[1, 2, 3]);
        scheduler.timeslice_over();
        scheduler.block(Event::wait(2));

        scheduler.end_process();
        assert_eq!(scheduler.running_pid(), 3);
        assert_eq!(scheduler.ready_pids(), vec![1]);
    }

    #[test]
    fn test_timeslice_rotates_round_robin() {
        let mut scheduler = with_ready(&[1, 2, 3]);
        let mut order = Vec::new();
        for _ in 0..6 {
            scheduler.timeslice_over();
            order.push(scheduler.running_pid());
        }
        assert_eq!(order, vec![1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_timeslice_without_others_keeps_running() {
        let mut scheduler = with_ready(&[1]);
        scheduler.timeslice_over();
        scheduler.timeslice_over();
        assert_eq!(scheduler.running_pid(), 1);
        assert!(scheduler.ready_pids().is_empty());
    }

    #[test]
    fn test_idle_is_never_queued() {
        let mut scheduler = with_ready(&[1]);
        scheduler.timeslice_over();
        scheduler.block(Event::wait(5));
        assert!(scheduler.is_idle());

        scheduler.add_process(Pcb::new(2));
        scheduler.timeslice_over();
        assert_eq!(scheduler.running_pid(), 2);
        assert!(scheduler.ready_pids().is_empty());
    }

    #[test]
    fn test_block_switches_to_next_ready() {
        let mut scheduler = with_ready(&[1, 2]);
        scheduler.timeslice_over();
        scheduler.block(Event::read(1, 20, None));

        assert_eq!(scheduler.running_pid(), 2);
        assert!(scheduler.ready_pids().is_empty());
    }

    #[test]
    fn test_block_while_idle_is_ignored() {
        let mut scheduler = Scheduler::new();
        scheduler.block(Event::wait(1));
        assert!(scheduler.blocked_pids().is_empty());
        assert!(scheduler.end_process().is_none());
    }

    #[test]
    fn test_unblock_does_not_preempt() {
        let mut scheduler = with_ready(&[1, 2]);
        scheduler.timeslice_over();
        scheduler.block(Event::read(1, 20, None));

        assert_eq!(scheduler.unblock(&Event::read(1, 0, None)), 1);
        assert_eq!(scheduler.running_pid(), 2);
        assert_eq!(scheduler.ready_pids(), vec![1]);
    }

    #[test]
    fn test_unblock_wakes_every_match_in_order() {
        let mut scheduler = with_ready(&[1, 2, 3, 4]);
        scheduler.timeslice_over();
        scheduler.block(Event::wait(9));
        scheduler.block(Event::wait(9));
        scheduler.block(Event::wait(8));
        assert_eq!(scheduler.blocked_pids(), vec![1, 2, 3]);

        assert_eq!(scheduler.unblock(&Event::wait(9)), 2);
        assert_eq!(scheduler.ready_pids(), vec![1, 2]);
        assert_eq!(scheduler.blocked_pids(), vec![3]);
        assert_eq!(scheduler.unblock(&Event::read(8, 0, None)), 0);
    }

    #[test]
    fn test_end_process_goes_idle() {
        let mut scheduler = with_ready(&[1]);
        scheduler.timeslice_over();
        scheduler.end_process();
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_end_process_only_wakes_its_waiters() {
        let mut scheduler = with_ready(&[1, 2, 3]);
        scheduler.timeslice_over();
        scheduler.block(Event::wait(3));
        scheduler.block(Event::read(3, 0, None));

        assert_eq!(scheduler.running_pid(), 3);
        scheduler.end_process();
        assert_eq!(scheduler.running_pid(), 1);
        assert_eq!(scheduler.blocked_pids(), vec![2]);
    }

    #[test]
    fn test_kill() {
        let mut scheduler = with_ready(&[1, 2, 3]);
        scheduler.timeslice_over();
        scheduler.block(Event::wait(3));

        // 3 is ready, 1 waits on it
        let killed = scheduler.kill(3).unwrap();
        assert_eq!(killed.pid, 3);
        assert_eq!(scheduler.running_pid(), 2);
        assert_eq!(scheduler.ready_pids(), vec![1]);

        assert!(scheduler.kill(42).is_none());
        assert_eq!(scheduler.kill(2).unwrap().pid, 2);
        assert_eq!(scheduler.running_pid(), 1);
    }

    #[test]
    fn test_drain() {
        let mut scheduler = with_ready(&[1, 2, 3]);
        scheduler.timeslice_over();
        scheduler.block(Event::wait(7));

        let mut pids: Vec<Pid> = scheduler.drain().into_iter().map(|pcb| pcb.pid).collect();
        pids.sort();
        assert_eq!(pids, vec![1, 2, 3]);
        assert!(scheduler.is_idle());
    }
}
