//! Bounded inference queue
//!
//! Batches wait here for the provider. The queue never blocks and never
//! drops: pushing into a full queue evicts the oldest batch, which the
//! engine parks as `inference_deferred`.

use std::collections::VecDeque;

use memora_core::model::EvidenceBatch;

#[derive(Debug)]
pub struct InferenceQueue {
    capacity: usize,
    batches: VecDeque<EvidenceBatch>,
}

impl InferenceQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            batches: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueue a batch; returns the evicted oldest batch on overflow
    pub fn push(&mut self, batch: EvidenceBatch) -> Option<EvidenceBatch> {
        let evicted = if self.batches.len() >= self.capacity {
            self.batches.pop_front()
        } else {
            None
        };
        self.batches.push_back(batch);
        evicted
    }

    /// Oldest waiting batch
    pub fn pop(&mut self) -> Option<EvidenceBatch> {
        self.batches.pop_front()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn contains(&self, batch_id: &str) -> bool {
        self.batches.iter().any(|b| b.batch_id == batch_id)
    }

    /// Drop the named batches wherever they wait; returns how many were found
    pub fn remove_batches(&mut self, batch_ids: &[String]) -> usize {
        let before = self.batches.len();
        self.batches.retain(|b| !batch_ids.contains(&b.batch_id));
        before - self.batches.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use memora_core::model::Scope;

    fn batch(id: &str) -> EvidenceBatch {
        EvidenceBatch::new(
            id.to_string(),
            Scope::Repository("acme/api".to_string()),
            Vec::new(),
            Vec::new(),
            Utc::now(),
        )
    }

    #[test]
    fn test_fifo_order() {
        let mut q = InferenceQueue::new(4);
        assert!(q.push(batch("a")).is_none());
        assert!(q.push(batch("b")).is_none());
        assert_eq!(q.pop().map(|b| b.batch_id), Some("a".to_string()));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut q = InferenceQueue::new(2);
        q.push(batch("a"));
        q.push(batch("b"));
        let evicted = q.push(batch("c")).unwrap();
        assert_eq!(evicted.batch_id, "a");
        assert_eq!(q.len(), 2);
        assert!(q.contains("b") && q.contains("c"));
    }

    #[test]
    fn test_remove_batches_keeps_order_of_the_rest() {
        let mut q = InferenceQueue::new(4);
        for id in ["a", "b", "c"] {
            q.push(batch(id));
        }
        assert_eq!(q.remove_batches(&["b".to_string(), "zz".to_string()]), 1);
        assert_eq!(q.pop().map(|b| b.batch_id), Some("a".to_string()));
        assert_eq!(q.pop().map(|b| b.batch_id), Some("c".to_string()));
        assert!(q.is_empty());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut q = InferenceQueue::new(0);
        assert_eq!(q.capacity(), 1);
        assert!(q.push(batch("a")).is_none());
        assert!(q.push(batch("b")).is_some());
    }
}
