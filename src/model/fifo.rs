use crate::common::collections::VecDeque;
use crate::model::tree::StampId;

/// Live stamps in creation order, oldest first.
#[derive(Default, Debug, Clone)]
pub struct CreationFifo {
    queue: VecDeque<StampId>,
}

impl CreationFifo {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, stamp: StampId) { self.queue.push_back(stamp); }

    /// Returns whether the stamp was queued.
    pub fn remove(&mut self, stamp: StampId) -> bool {
        match self.queue.iter().position(|&s| s == stamp) {
            Some(idx) => {
                self.queue.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = StampId> + '_ { self.queue.iter().copied() }

    pub fn len(&self) -> usize { self.queue.len() }

    pub fn is_empty(&self) -> bool { self.queue.is_empty() }
}
