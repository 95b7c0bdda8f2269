use std::fmt;

use crate::constants::Pid;
use crate::device::ConsoleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Wait for the process `id` to end
    Wait,
    /// Wait for console input on behalf of process `id`
    Read,
}

/// Something a blocked process is waiting for.
///
/// Two events match when kind and id agree; the payload fields only matter
/// to whoever delivers the completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub id: Pid,
    /// Physical destination of a read, resolved when the read was issued
    pub address: Option<usize>,
    pub console: Option<ConsoleId>,
    /// Text received for a completed read
    pub content: Option<String>,
}

impl Event {
    pub fn wait(pid: Pid) -> Self {
        Event { kind: EventKind::Wait, id: pid, address: None, console: None, content: None }
    }

    pub fn read(pid: Pid, address: usize, console: Option<ConsoleId>) -> Self {
        Event {
            kind: EventKind::Read,
            id: pid,
            address: Some(address),
            console,
            content: None,
        }
    }

    #[inline]
    pub fn matches(&self, other: &Event) -> bool {
        self.kind == other.kind && self.id == other.id
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EventKind::Wait => write!(f, "wait({})", self.id),
            EventKind::Read => {
                write!(f, "read({}", self.id)?;
                if let Some(address) = self.address {
                    write!(f, " -> {}", address)?;
                }
                write!(f, ")")
            }
        }
    }
}
