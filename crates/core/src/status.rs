use std::sync::mpsc;

use crate::logger;

/// Publishing half of the status slot. Cheap to clone; every publish is
/// also written to the log under the sender's prefix.
#[derive(Debug, Clone)]
pub struct StatusSender {
    tx: mpsc::Sender<String>,
    prefix: &'static str,
}

impl StatusSender {
    /// Same slot, different log prefix.
    pub fn scoped(&self, prefix: &'static str) -> Self {
        Self { tx: self.tx.clone(), prefix }
    }

    pub fn publish(&self, msg: impl Into<String>) {
        let msg = msg.into();
        logger::info_p(self.prefix, &msg);
        self.tx.send(msg).ok();
    }
}

/// Reading half, owned by the interactive loop. Last write wins.
#[derive(Debug)]
pub struct StatusBoard {
    rx: mpsc::Receiver<String>,
    current: String,
}

impl StatusBoard {
    /// Pull every pending message; returns true if the status changed.
    pub fn drain(&mut self) -> bool {
        let mut changed = false;
        while let Ok(msg) = self.rx.try_recv() {
            self.current = msg;
            changed = true;
        }
        changed
    }

    pub fn current(&self) -> &str {
        &self.current
    }
}

pub fn channel() -> (StatusSender, StatusBoard) {
    let (tx, rx) = mpsc::channel();
    (
        StatusSender { tx, prefix: "" },
        StatusBoard { rx, current: "Idle".to_string() },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins() {
        let (tx, mut board) = channel();
        assert_eq!(board.current(), "Idle");
        assert!(!board.drain());
        tx.publish("one");
        tx.scoped("sched").publish("two");
        assert!(board.drain());
        assert_eq!(board.current(), "two");
    }
}
