// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded command/response queue pair.
//!
//! The transport feeds the command queue and drains the response queue; the
//! dispatch loop does the opposite. Handlers may also push follow-up commands
//! back onto the command queue.

use tokio::sync::mpsc;

use crate::packet::Packet;

/// Sending half of the channel pair. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CrChan {
    commands: mpsc::Sender<Packet>,
    responses: mpsc::Sender<Packet>,
}

/// Receiving halves of the channel pair, handed out exactly once.
#[derive(Debug)]
pub struct CrChanReceivers {
    pub commands: mpsc::Receiver<Packet>,
    pub responses: mpsc::Receiver<Packet>,
}

impl CrChan {
    /// Create both queues with `capacity` slots each.
    pub fn new(capacity: usize) -> (Self, CrChanReceivers) {
        let (commands, command_rx) = mpsc::channel(capacity.max(1));
        let (responses, response_rx) = mpsc::channel(capacity.max(1));
        let receivers = CrChanReceivers { commands: command_rx, responses: response_rx };
        (Self { commands, responses }, receivers)
    }

    pub fn commands(&self) -> &mpsc::Sender<Packet> {
        &self.commands
    }

    pub fn responses(&self) -> &mpsc::Sender<Packet> {
        &self.responses
    }

    /// Number of packets queued on (commands, responses).
    pub fn current_queue_size(&self) -> (usize, usize) {
        (queued(&self.commands), queued(&self.responses))
    }
}

fn queued<T>(tx: &mpsc::Sender<T>) -> usize {
    tx.max_capacity() - tx.capacity()
}

#[cfg(test)]
#[path = "chan_tests.rs"]
mod tests;
