//! Job bookkeeping: an arena of job records and the FIFO of work waiting
//! for the vector unit.
//!
//! Records are addressed by [`JobId`], an index plus a generation count.
//! Disposing a record bumps the slot's generation, so a handle kept
//! across a dispose can never reach a recycled record.

use crate::JobError;

/// Lifecycle of a job record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum JobState {
    /// Allocated but not handed to the scheduler.
    #[default]
    Idle,
    /// In line behind other work.
    Queued,
    /// On the vector unit right now.
    Running,
    /// Completed; visible only inside the completion callback.
    Finished,
}

/// Handle to a job record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct JobId {
    index: u32,
    generation: u32,
}

pub(crate) type DoneFn = Box<dyn FnMut(JobId) + Send>;

pub(crate) struct JobRecord {
    pub entry: u32,
    pub args: Vec<u32>,
    pub state: JobState,
    pub done: Option<DoneFn>,
    next: Option<u32>,
    prev: Option<u32>,
}

struct Slot {
    generation: u32,
    job: Option<JobRecord>,
}

/// Arena of job records with an intrusive FIFO threaded through them.
/// All operations are constant time.
pub(crate) struct JobTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    head: Option<u32>,
    tail: Option<u32>,
}

impl JobTable {
    pub fn new() -> Self {
        JobTable {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }

    pub fn alloc(&mut self, entry: u32, args: &[u32]) -> JobId {
        let record = JobRecord {
            entry,
            args: args.to_vec(),
            state: JobState::Idle,
            done: None,
            next: None,
            prev: None,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].job = Some(record);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    job: Some(record),
                });
                (self.slots.len() - 1) as u32
            }
        };
        JobId {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    /// Frees an idle record and invalidates every handle to it.
    pub fn release(&mut self, id: JobId) -> Result<(), JobError> {
        let job = self.get(id).ok_or(JobError::Stale)?;
        if job.state != JobState::Idle {
            return Err(JobError::Busy);
        }
        let slot = &mut self.slots[id.index as usize];
        slot.job = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Ok(())
    }

    pub fn get(&self, id: JobId) -> Option<&JobRecord> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.job.as_ref()
    }

    pub fn get_mut(&mut self, id: JobId) -> Option<&mut JobRecord> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.job.as_mut()
    }

    /// Links a record at the back of the FIFO. The caller guarantees the
    /// record exists and is not already linked.
    pub fn enqueue(&mut self, id: JobId) {
        if self.get(id).is_none() {
            return;
        }
        let index = id.index;
        let tail = self.tail;
        if let Some(job) = self.slots[index as usize].job.as_mut() {
            job.prev = tail;
            job.next = None;
        }
        match tail {
            Some(t) => {
                if let Some(prev_tail) = self.slots[t as usize].job.as_mut() {
                    prev_tail.next = Some(index);
                }
            }
            None => self.head = Some(index),
        }
        self.tail = Some(index);
    }

    pub fn front(&self) -> Option<JobId> {
        let index = self.head?;
        Some(JobId {
            index,
            generation: self.slots[index as usize].generation,
        })
    }

    /// Unlinks and returns the front record.
    pub fn dequeue_front(&mut self) -> Option<JobId> {
        let index = self.head?;
        let next = self.slots[index as usize].job.as_ref().and_then(|j| j.next);
        self.head = next;
        match next {
            Some(n) => {
                if let Some(job) = self.slots[n as usize].job.as_mut() {
                    job.prev = None;
                }
            }
            None => self.tail = None,
        }
        if let Some(job) = self.slots[index as usize].job.as_mut() {
            job.next = None;
            job.prev = None;
        }
        Some(JobId {
            index,
            generation: self.slots[index as usize].generation,
        })
    }

    /// Unlinks a record from anywhere in the FIFO. Unlinked records are
    /// left untouched.
    pub fn unlink(&mut self, id: JobId) {
        if self.get(id).is_none() {
            return;
        }
        let index = id.index;
        let (prev, next) = match self.slots[index as usize].job.as_ref() {
            Some(job) => (job.prev, job.next),
            None => return,
        };
        if prev.is_none() && next.is_none() && self.head != Some(index) {
            return;
        }
        match prev {
            Some(p) => {
                if let Some(job) = self.slots[p as usize].job.as_mut() {
                    job.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(job) = self.slots[n as usize].job.as_mut() {
                    job.prev = prev;
                }
            }
            None => self.tail = prev,
        }
        if let Some(job) = self.slots[index as usize].job.as_mut() {
            job.next = None;
            job.prev = None;
        }
    }

    #[cfg(test)]
    fn queue_order(&self) -> Vec<JobId> {
        let mut order = Vec::new();
        let mut at = self.head;
        while let Some(index) = at {
            order.push(JobId {
                index,
                generation: self.slots[index as usize].generation,
            });
            at = self.slots[index as usize].job.as_ref().and_then(|j| j.next);
        }
        order
    }
}
