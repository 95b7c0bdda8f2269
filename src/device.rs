//! Console devices.
//!
//! Consoles live outside the simulated machine. Whatever drives them (a
//! terminal, a test, another thread) submits finished input lines through
//! an [`InputHandle`]; the kernel drains them from its own loop, so all
//! bookkeeping happens on one thread.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};

use log::{debug, info, warn};

use crate::constants::Pid;
use crate::event::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConsoleId(pub u32);

impl fmt::Display for ConsoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One line of input typed into a console
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleInput {
    pub console: ConsoleId,
    pub text: String,
}

/// Sending side of the console input channel
#[derive(Debug, Clone)]
pub struct InputHandle {
    tx: Sender<ConsoleInput>,
}

impl InputHandle {
    /// Submit a line; false once the device is gone
    pub fn send(&self, console: ConsoleId, text: impl Into<String>) -> bool {
        self.tx.send(ConsoleInput { console, text: text.into() }).is_ok()
    }
}

#[derive(Debug)]
struct Console {
    title: String,
    /// Processes sharing this console
    refs: usize,
    output: String,
}

pub struct Io {
    consoles: BTreeMap<ConsoleId, Console>,
    next_id: u32,
    /// Reads waiting for input, oldest first
    pending: Vec<Event>,
    /// Reads that received their input, in arrival order
    results: VecDeque<Event>,
    tx: Sender<ConsoleInput>,
    rx: Receiver<ConsoleInput>,
}

impl Default for Io {
    fn default() -> Self {
        Self::new()
    }
}

impl Io {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Io {
            consoles: BTreeMap::new(),
            next_id: 1,
            pending: Vec::new(),
            results: VecDeque::new(),
            tx,
            rx,
        }
    }

    pub fn input_handle(&self) -> InputHandle {
        InputHandle { tx: self.tx.clone() }
    }

    /// Open a console with one reference held by its creator
    pub fn create_console(&mut self, title: impl Into<String>) -> ConsoleId {
        let id = ConsoleId(self.next_id);
        self.next_id += 1;
        let title = title.into();
        info!("console {} opened: {}", id, title);
        self.consoles.insert(id, Console { title, refs: 1, output: String::new() });
        id
    }

    pub fn retain(&mut self, console: ConsoleId) {
        if let Some(c) = self.consoles.get_mut(&console) {
            c.refs += 1;
        }
    }

    /// Drop one reference. Returns true when that was the last one and the
    /// console is gone, together with any reads still pending on it.
    pub fn release(&mut self, console: ConsoleId) -> bool {
        let Some(c) = self.consoles.get_mut(&console) else {
            return false;
        };
        c.refs = c.refs.saturating_sub(1);
        if c.refs > 0 {
            return false;
        }

        if let Some(closed) = self.consoles.remove(&console) {
            info!("console {} closed: {}", console, closed.title);
        }
        self.pending.retain(|event| event.console != Some(console));
        true
    }

    pub fn references(&self, console: ConsoleId) -> usize {
        self.consoles.get(&console).map_or(0, |c| c.refs)
    }

    pub fn is_open(&self, console: ConsoleId) -> bool {
        self.consoles.contains_key(&console)
    }

    pub fn write(&mut self, console: ConsoleId, text: &str) {
        match self.consoles.get_mut(&console) {
            Some(c) => c.output.push_str(text),
            None => warn!("write to closed console {}", console),
        }
    }

    pub fn writeln(&mut self, console: ConsoleId) {
        self.write(console, "\n");
    }

    /// Everything written to the console so far
    pub fn output(&self, console: ConsoleId) -> Option<&str> {
        self.consoles.get(&console).map(|c| c.output.as_str())
    }

    /// Register a read that waits for input on its console
    pub fn read(&mut self, event: Event) {
        debug!("io: read {} queued", event);
        self.pending.push(event);
    }

    /// Withdraw every read `pid` still waits on. Returns how many were dropped.
    pub fn cancel(&mut self, pid: Pid) -> usize {
        let before = self.pending.len();
        self.pending.retain(|event| event.id != pid);
        let cancelled = before - self.pending.len();
        if cancelled > 0 {
            debug!("io: {} read(s) of process {} cancelled", cancelled, pid);
        }
        cancelled
    }

    /// Attach a line of input to the youngest pending read on `console`.
    /// Input nobody is waiting for is dropped.
    pub fn receive(&mut self, console: ConsoleId, text: impl Into<String>) {
        let text = text.into();
        let youngest = self.pending.iter().rposition(|event| event.console == Some(console));
        match youngest {
            Some(index) => {
                let mut event = self.pending.remove(index);
                event.content = Some(text);
                debug!("io: read {} completed", event);
                self.results.push_back(event);
            }
            None => debug!("io: dropped input {:?} on console {}", text, console),
        }
    }

    /// Take in everything sent through input handles, then pop the oldest
    /// completed read
    pub fn next_completion(&mut self) -> Option<Event> {
        while let Ok(input) = self.rx.try_recv() {
            self.receive(input.console, input.text);
        }
        self.results.pop_front()
    }

    pub fn pending_reads(&self) -> usize {
        self.pending.len()
    }
}
