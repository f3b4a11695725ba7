//! # Scheduling Lanes
//!
//! Two bounded FIFO queues drained with strict priority: a worker only takes
//! from the normal lane when the priority lane is empty.

use std::collections::VecDeque;

use mesh_telemetry::LANE_DEPTH;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::report::{Lane, RejectReason};

struct Queues<T> {
    priority: VecDeque<T>,
    normal: VecDeque<T>,
    closed: bool,
}

impl<T> Queues<T> {
    fn lane_mut(&mut self, lane: Lane) -> &mut VecDeque<T> {
        match lane {
            Lane::Priority => &mut self.priority,
            Lane::Normal => &mut self.normal,
        }
    }
}

/// Priority and normal lanes sharing one wake-up signal.
pub(crate) struct Lanes<T> {
    queues: Mutex<Queues<T>>,
    ready: Notify,
    capacity: usize,
}

impl<T> Lanes<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            queues: Mutex::new(Queues {
                priority: VecDeque::new(),
                normal: VecDeque::new(),
                closed: false,
            }),
            ready: Notify::new(),
            capacity,
        }
    }

    /// Enqueue at the back of `lane`. Returns the item when the lane is full
    /// or closed.
    pub fn push(&self, lane: Lane, item: T) -> Result<(), (T, RejectReason)> {
        {
            let mut queues = self.queues.lock();
            if queues.closed {
                return Err((item, RejectReason::ShuttingDown));
            }
            let queue = queues.lane_mut(lane);
            if queue.len() >= self.capacity {
                return Err((item, RejectReason::LaneFull));
            }
            queue.push_back(item);
            LANE_DEPTH
                .with_label_values(&[lane.as_str()])
                .set(queue.len() as f64);
        }
        self.ready.notify_one();
        Ok(())
    }

    /// Take the next item, priority lane first.
    pub fn pop(&self) -> Option<(Lane, T)> {
        let mut queues = self.queues.lock();
        for lane in [Lane::Priority, Lane::Normal] {
            let queue = queues.lane_mut(lane);
            if let Some(item) = queue.pop_front() {
                LANE_DEPTH
                    .with_label_values(&[lane.as_str()])
                    .set(queue.len() as f64);
                return Some((lane, item));
            }
        }
        None
    }

    /// Wait for the next item. Returns `None` once the lanes are closed and
    /// empty.
    pub async fn next(&self) -> Option<(Lane, T)> {
        loop {
            let notified = self.ready.notified();
            if let Some(next) = self.pop() {
                return Some(next);
            }
            if self.queues.lock().closed {
                return None;
            }
            notified.await;
        }
    }

    /// Refuse new items and wake every waiting worker.
    pub fn close(&self) {
        self.queues.lock().closed = true;
        self.ready.notify_waiters();
    }

    /// Remove every queued item, priority lane first.
    pub fn drain(&self) -> Vec<T> {
        let mut queues = self.queues.lock();
        let mut items: Vec<T> = queues.priority.drain(..).collect();
        items.extend(queues.normal.drain(..));
        for lane in [Lane::Priority, Lane::Normal] {
            LANE_DEPTH.with_label_values(&[lane.as_str()]).set(0.0);
        }
        items
    }

    /// `(priority, normal)` queue depths.
    pub fn depths(&self) -> (usize, usize) {
        let queues = self.queues.lock();
        (queues.priority.len(), queues.normal.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_priority_drains_first() {
        let lanes = Lanes::new(10);
        lanes.push(Lane::Normal, 1).unwrap();
        lanes.push(Lane::Normal, 2).unwrap();
        lanes.push(Lane::Priority, 10).unwrap();
        lanes.push(Lane::Priority, 11).unwrap();

        let order: Vec<_> = std::iter::from_fn(|| lanes.pop()).map(|(_, v)| v).collect();
        assert_eq!(order, vec![10, 11, 1, 2]);
    }

    #[test]
    fn test_capacity_is_per_lane() {
        let lanes = Lanes::new(1);
        lanes.push(Lane::Normal, 1).unwrap();
        let (item, reason) = lanes.push(Lane::Normal, 2).unwrap_err();
        assert_eq!((item, reason), (2, RejectReason::LaneFull));
        assert!(lanes.push(Lane::Priority, 3).is_ok());
        assert_eq!(lanes.depths(), (1, 1));
    }

    #[test]
    fn test_closed_lanes_reject() {
        let lanes = Lanes::new(4);
        lanes.close();
        let (_, reason) = lanes.push(Lane::Priority, 1).unwrap_err();
        assert_eq!(reason, RejectReason::ShuttingDown);
    }

    #[tokio::test]
    async fn test_next_wakes_on_push() {
        let lanes = Arc::new(Lanes::new(4));
        let waiter = {
            let lanes = Arc::clone(&lanes);
            tokio::spawn(async move { lanes.next().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        lanes.push(Lane::Normal, 7).unwrap();
        assert_eq!(waiter.await.unwrap(), Some((Lane::Normal, 7)));
    }

    #[tokio::test]
    async fn test_close_releases_waiters_after_drain() {
        let lanes = Arc::new(Lanes::new(4));
        lanes.push(Lane::Normal, 1).unwrap();
        lanes.close();
        assert_eq!(lanes.next().await, Some((Lane::Normal, 1)));
        assert_eq!(lanes.next().await, None);
    }

    #[test]
    fn test_drain_empties_both_lanes() {
        let lanes = Lanes::new(4);
        lanes.push(Lane::Normal, 1).unwrap();
        lanes.push(Lane::Priority, 2).unwrap();
        assert_eq!(lanes.drain(), vec![2, 1]);
        assert_eq!(lanes.depths(), (0, 0));
    }
}
