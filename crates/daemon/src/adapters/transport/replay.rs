// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded buffer of outbound packets held across reconnects.

use std::collections::VecDeque;

use kagent_core::Packet;

/// FIFO of undelivered packets. When full, the oldest packet is evicted.
#[derive(Debug)]
pub struct ReplayBuffer {
    packets: VecDeque<Packet>,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { packets: VecDeque::with_capacity(capacity.min(64)), capacity }
    }

    /// Queue `packet`, returning the packet evicted to make room, if any.
    pub fn push(&mut self, packet: Packet) -> Option<Packet> {
        let evicted =
            if self.packets.len() >= self.capacity { self.packets.pop_front() } else { None };
        self.packets.push_back(packet);
        evicted
    }

    /// Put a packet that failed to send back at the head of the queue.
    pub fn push_front(&mut self, packet: Packet) {
        if self.packets.len() >= self.capacity {
            self.packets.pop_back();
        }
        self.packets.push_front(packet);
    }

    pub fn pop(&mut self) -> Option<Packet> {
        self.packets.pop_front()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

#[cfg(test)]
#[path = "replay_tests.rs"]
mod tests;
