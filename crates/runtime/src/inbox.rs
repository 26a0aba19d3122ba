use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Position of an item in an [`Inbox`]'s arrival order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(pub u64);

#[derive(Debug)]
struct Queue<T> {
    next_ticket: u64,
    items: VecDeque<(Ticket, T)>,
}

/// Shared single-threaded FIFO used to hand events from producers (view
/// adapters reporting clicks) to the one consumer that owns the state.
///
/// Key properties:
/// - Strict arrival order; tickets increase monotonically.
/// - Cloning yields another handle to the same queue.
/// - Pushing never borrows across a call into user code, so a producer may
///   push while the consumer is in the middle of draining.
#[derive(Debug)]
pub struct Inbox<T> {
    queue: Rc<RefCell<Queue<T>>>,
}

impl<T> Clone for Inbox<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Rc::clone(&self.queue),
        }
    }
}

impl<T> Default for Inbox<T> {
    fn default() -> Self {
        Self {
            queue: Rc::new(RefCell::new(Queue {
                next_ticket: 0,
                items: VecDeque::new(),
            })),
        }
    }
}

impl<T> Inbox<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: T) -> Ticket {
        let mut q = self.queue.borrow_mut();
        let ticket = Ticket(q.next_ticket);
        q.next_ticket = q.next_ticket.wrapping_add(1);
        q.items.push_back((ticket, item));
        ticket
    }

    /// Pops the oldest pending item.
    pub fn pop_next(&self) -> Option<(Ticket, T)> {
        self.queue.borrow_mut().items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::{Inbox, Ticket};

    #[test]
    fn pops_in_arrival_order() {
        let inbox = Inbox::new();
        inbox.push("a");
        inbox.push("b");
        inbox.push("c");

        let got: Vec<&str> = std::iter::from_fn(|| inbox.pop_next().map(|(_, v)| v)).collect();
        assert_eq!(got, vec!["a", "b", "c"]);
        assert!(inbox.is_empty());
    }

    #[test]
    fn clones_share_one_queue() {
        let consumer = Inbox::new();
        let producer = consumer.clone();
        assert_eq!(producer.push(1), Ticket(0));
        assert_eq!(producer.push(2), Ticket(1));
        assert_eq!(consumer.len(), 2);
        assert_eq!(consumer.pop_next(), Some((Ticket(0), 1)));
    }

    #[test]
    fn push_while_draining_lands_at_the_back() {
        let inbox = Inbox::new();
        inbox.push(1);
        let mut seen = Vec::new();
        while let Some((_, v)) = inbox.pop_next() {
            seen.push(v);
            if v == 1 {
                inbox.push(2);
            }
        }
        assert_eq!(seen, vec![1, 2]);
    }
}
