//! The two bounded reply FIFOs (files, directories).
//!
//! Backpressure drops the *new* arrival on overflow, logging the drop —
//! every drop corresponds to a PCB that isn't currently blocked on that
//! reply, so losing the newest message is always safe, while losing an
//! older one that some PCB IS waiting on would not be. This type therefore
//! rejects pushes against a full queue instead of evicting the head (see
//! `DESIGN.md` for the tradeoff against an evict-oldest mailbox).

use std::collections::VecDeque;

use sfp::SfpMessage;

/// Bounded FIFO of at most `capacity` reply messages.
#[derive(Debug)]
pub struct ReplyQueue {
    queue: VecDeque<SfpMessage>,
    capacity: usize,
}

impl ReplyQueue {
    pub fn new(capacity: usize) -> Self {
        ReplyQueue { queue: VecDeque::with_capacity(capacity), capacity }
    }

    /// Enqueue a reply. Returns `false` (and leaves the queue unchanged) if
    /// the queue was already at capacity; the caller logs the drop.
    pub fn push(&mut self, message: SfpMessage) -> bool {
        if self.queue.len() >= self.capacity {
            return false;
        }
        self.queue.push_back(message);
        true
    }

    pub fn pop(&mut self) -> Option<SfpMessage> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfp::MsgType;

    fn msg(owner: u8) -> SfpMessage {
        SfpMessage::new(MsgType::RdRep, owner)
    }

    #[test]
    fn fifo_order_preserved() {
        let mut q = ReplyQueue::new(2);
        assert!(q.push(msg(1)));
        assert!(q.push(msg(2)));
        assert_eq!(q.pop().unwrap().owner, 1);
        assert_eq!(q.pop().unwrap().owner, 2);
        assert!(q.pop().is_none());
    }

    #[test]
    fn overflow_rejects_new_arrival_not_oldest() {
        let mut q = ReplyQueue::new(2);
        assert!(q.push(msg(1)));
        assert!(q.push(msg(2)));
        assert!(!q.push(msg(3)), "third push should be rejected, not evict owner 1");
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop().unwrap().owner, 1);
        assert_eq!(q.pop().unwrap().owner, 2);
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let mut q = ReplyQueue::new(5);
        for owner in 0..10u8 {
            q.push(msg(owner));
        }
        assert!(q.len() <= 5);
    }
}
