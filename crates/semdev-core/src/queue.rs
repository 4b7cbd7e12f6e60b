// Semdev event queue
// SPSC FIFO for outgoing semantic events

use std::collections::VecDeque;

use crate::event::Event;

/// FIFO of semantic events. The dispatch path produces, the caller drains
/// with repeated `pop` until empty; the sequence is not restartable.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceId;

    #[test]
    fn test_queue_fifo_order() {
        let mut q = EventQueue::new();
        q.push(Event::DeviceAdded {
            device: DeviceId(1),
        });
        q.push(Event::DeviceAdded {
            device: DeviceId(2),
        });
        assert_eq!(q.len(), 2);
        match q.pop() {
            Some(Event::DeviceAdded { device }) => assert_eq!(device, DeviceId(1)),
            other => panic!("unexpected event: {:?}", other),
        }
        match q.pop() {
            Some(Event::DeviceAdded { device }) => assert_eq!(device, DeviceId(2)),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(q.pop().is_none());
    }

    #[test]
    fn test_drained_queue_stays_usable() {
        let mut q = EventQueue::new();
        q.push(Event::DeviceAdded {
            device: DeviceId(1),
        });
        assert!(q.pop().is_some());
        assert!(q.is_empty());
        q.push(Event::DeviceRemoved {
            device: DeviceId(1),
        });
        assert_eq!(q.len(), 1);
    }
}
