//! Driver for the vector half of the co-processor: microcode library
//! loading, module lookup, and a FIFO job scheduler driven by the break
//! interrupt.
//!
//! Microcode ships as an 8KB image, 4KB of data followed by 4KB of code.
//! The code half opens with a directory of named modules, each pointing
//! at a table of entry points; [`Rsp::module_entry`] resolves a name and
//! index to an entry PC. A job pairs an entry with up to [`MAX_JOB_ARGS`]
//! argument words, delivered to the top of the data half right before
//! the unit starts.
//!
//! The platform layer forwards the break interrupt through the cloneable
//! [`SpInterrupt`] handle; each break retires the front of the FIFO and
//! starts the next job without the CPU polling.

#![forbid(unsafe_code)]

mod sched;

use std::sync::{Arc, Condvar, Mutex};

use rcp_hw::sp::{
    dma_block_len, dma_len, SP_DMEM_LEN, SP_IMEM_OFFSET, SP_MEM_LEN, SP_MEM_OFFSET_MASK,
};
use rcp_hw::{SpPort, SpStatusWrite};
use thiserror::Error;

use crate::sched::JobTable;

pub use crate::sched::{JobId, JobState};

/// Argument words a job can carry.
pub const MAX_JOB_ARGS: usize = 16;

/// SP memory offset of the argument block: the top 64 bytes of the data
/// half, right below the code.
pub const JOB_ARGS_OFFSET: u32 = SP_DMEM_LEN - (MAX_JOB_ARGS as u32) * 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("job carries {0} argument words; the argument block holds {MAX_JOB_ARGS}")]
    TooManyArgs(usize),
    #[error("job is queued or running")]
    Busy,
    #[error("job handle is stale")]
    Stale,
}

struct RspCore<S> {
    sp: S,
    jobs: JobTable,
    closed: bool,
}

struct RspShared<S> {
    core: Mutex<RspCore<S>>,
    jobs_done: Condvar,
}

/// Break-interrupt handle for the job scheduler.
///
/// Cloneable and callable from any thread; the platform layer calls
/// [`SpInterrupt::raise`] from its interrupt context whenever the unit
/// stops on a break instruction. Raising after [`Rsp::close`] is a no-op.
pub struct SpInterrupt<S: SpPort> {
    shared: Arc<RspShared<S>>,
}

impl<S: SpPort> Clone for SpInterrupt<S> {
    fn clone(&self) -> Self {
        SpInterrupt {
            shared: self.shared.clone(),
        }
    }
}

impl<S: SpPort> SpInterrupt<S> {
    /// Retires the finished job and starts the next one.
    pub fn raise(&self) {
        let mut core = self.shared.core.lock().unwrap();
        if core.closed {
            return;
        }
        core.on_break();
        drop(core);
        self.shared.jobs_done.notify_all();
    }
}

/// Driver state for the vector unit.
pub struct Rsp<S: SpPort> {
    shared: Arc<RspShared<S>>,
}

impl<S: SpPort> Rsp<S> {
    /// Brings the unit up halted with any stale break acknowledged, waits
    /// out in-flight DMA, and unmasks the break interrupt.
    pub fn new(mut sp: S) -> (Self, SpInterrupt<S>) {
        sp.write_status(SpStatusWrite::halt_and_acknowledge());
        while sp.dma_busy() {}
        sp.set_interrupt(true);
        let shared = Arc::new(RspShared {
            core: Mutex::new(RspCore {
                sp,
                jobs: JobTable::new(),
                closed: false,
            }),
            jobs_done: Condvar::new(),
        });
        (
            Rsp {
                shared: shared.clone(),
            },
            SpInterrupt { shared },
        )
    }

    /// Halts the unit, drains the queue back to idle, and masks the break
    /// interrupt. Parked waiters wake with their jobs idle.
    pub fn close(self) {
        let mut core = self.shared.core.lock().unwrap();
        core.closed = true;
        core.sp.write_status(SpStatusWrite::halt_and_acknowledge());
        while core.sp.dma_busy() {}
        core.drain_queue();
        core.sp.set_interrupt(false);
        drop(core);
        self.shared.jobs_done.notify_all();
    }

    /// Replaces the resident microcode library with the 8KB image at
    /// `image_addr`: data half into the data memory, code half into the
    /// instruction memory. Queued jobs are drained back to idle first;
    /// their entry points are meaningless under the new library.
    ///
    /// The image must be 8-byte aligned and cache-coherent.
    pub fn load_library(&self, image_addr: u32) {
        tracing::debug!(image_addr, "loading microcode library");
        let mut core = self.shared.core.lock().unwrap();
        core.sp.write_status(SpStatusWrite::halt_and_acknowledge());
        while core.sp.dma_busy() {}
        core.drain_queue();
        core.sp.dma_read(0, image_addr, dma_len(SP_DMEM_LEN));
        while core.sp.dma_full() {}
        core.sp
            .dma_read(SP_IMEM_OFFSET, image_addr + SP_DMEM_LEN, dma_len(SP_DMEM_LEN));
        while core.sp.dma_busy() {}
        drop(core);
        self.shared.jobs_done.notify_all();
    }

    /// Looks up entry `index` of the named module in the resident
    /// library's directory. Returns `None` for an unknown module or an
    /// index outside the memory window.
    ///
    /// The directory sits at the start of the code half: pairs of
    /// `(name offset, entry table offset)` words, zero-terminated, with
    /// offsets interpreted inside the 8KB window.
    pub fn module_entry(&self, module: &str, index: usize) -> Option<u32> {
        let core = self.shared.core.lock().unwrap();
        let mut at = SP_IMEM_OFFSET;
        while at + 8 <= SP_MEM_LEN {
            let raw_name = read_u32(&core.sp, at);
            if raw_name == 0 {
                return None;
            }
            if name_matches(&core.sp, raw_name & SP_MEM_OFFSET_MASK, module) {
                let table_off = read_u32(&core.sp, at + 4) & SP_MEM_OFFSET_MASK;
                let entry_at = u32::try_from(index)
                    .ok()
                    .and_then(|i| i.checked_mul(4))
                    .and_then(|o| o.checked_add(table_off))?;
                if entry_at > SP_MEM_LEN - 4 {
                    return None;
                }
                return Some(read_u32(&core.sp, entry_at));
            }
            at += 8;
        }
        None
    }

    /// Allocates a job record. `entry` zero makes a placeholder that
    /// parks the queue when it reaches the front.
    pub fn new_job(&self, entry: u32, args: &[u32]) -> Result<JobId, JobError> {
        if args.len() > MAX_JOB_ARGS {
            return Err(JobError::TooManyArgs(args.len()));
        }
        let mut core = self.shared.core.lock().unwrap();
        Ok(core.jobs.alloc(entry, args))
    }

    /// Installs a completion callback, replacing any previous one. It
    /// runs on the interrupt thread with the scheduler locked every time
    /// the job completes; hand work off rather than calling back into the
    /// scheduler from it.
    pub fn on_done<F>(&self, id: JobId, callback: F) -> Result<(), JobError>
    where
        F: FnMut(JobId) + Send + 'static,
    {
        let mut core = self.shared.core.lock().unwrap();
        let job = core.jobs.get_mut(id).ok_or(JobError::Stale)?;
        job.done = Some(Box::new(callback));
        Ok(())
    }

    /// Appends the job to the FIFO. It starts immediately when the unit
    /// has nothing else to do.
    pub fn queue_job(&self, id: JobId) -> Result<(), JobError> {
        let mut core = self.shared.core.lock().unwrap();
        core.queue_job(id)
    }

    /// Blocks until the job has left the scheduler: completed, aborted,
    /// or drained.
    pub fn wait_job(&self, id: JobId) -> Result<(), JobError> {
        let mut core = self.shared.core.lock().unwrap();
        loop {
            match core.jobs.get(id) {
                None => return Err(JobError::Stale),
                Some(job) if job.state == JobState::Idle => return Ok(()),
                Some(_) => core = self.shared.jobs_done.wait(core).unwrap(),
            }
        }
    }

    /// [`Rsp::queue_job`] then [`Rsp::wait_job`].
    pub fn run_job(&self, id: JobId) -> Result<(), JobError> {
        self.queue_job(id)?;
        self.wait_job(id)
    }

    /// Takes the job out of the scheduler wherever it is. A queued job is
    /// unlinked; the running job is stopped on the spot and the next one
    /// started, with no completion callback for the aborted job.
    pub fn abort_job(&self, id: JobId) -> Result<(), JobError> {
        let mut core = self.shared.core.lock().unwrap();
        core.abort_job(id)?;
        drop(core);
        self.shared.jobs_done.notify_all();
        Ok(())
    }

    /// Frees an idle job record; its handles go stale.
    pub fn dispose_job(&self, id: JobId) -> Result<(), JobError> {
        let mut core = self.shared.core.lock().unwrap();
        core.jobs.release(id)
    }

    pub fn job_state(&self, id: JobId) -> Result<JobState, JobError> {
        let core = self.shared.core.lock().unwrap();
        core.jobs.get(id).map(|j| j.state).ok_or(JobError::Stale)
    }

    /// Moves `len` bytes from RDRAM into SP memory at `mem_offset`,
    /// returning once the engine accepts the transfer. Zero bytes is a
    /// no-op; the length register cannot express it.
    pub fn dma_to_sp(&self, mem_offset: u32, dram_addr: u32, len: u32) {
        if len == 0 {
            return;
        }
        let mut core = self.shared.core.lock().unwrap();
        while core.sp.dma_full() {}
        core.sp.dma_read(mem_offset, dram_addr, dma_len(len));
    }

    /// Moves `len` bytes from SP memory at `mem_offset` out to RDRAM.
    /// Zero bytes is a no-op.
    pub fn dma_to_dram(&self, mem_offset: u32, dram_addr: u32, len: u32) {
        if len == 0 {
            return;
        }
        let mut core = self.shared.core.lock().unwrap();
        while core.sp.dma_full() {}
        core.sp.dma_write(mem_offset, dram_addr, dma_len(len));
    }

    /// Strided variant of [`Rsp::dma_to_sp`]: `height` rows of `width`
    /// pixels at `bpp` bytes each out of a `pitch`-wide source, packed
    /// tight in SP memory. An empty block is a no-op.
    pub fn dma_to_sp_block(
        &self,
        mem_offset: u32,
        dram_addr: u32,
        pitch: u32,
        width: u32,
        height: u32,
        bpp: u32,
    ) {
        if width == 0 || height == 0 || bpp == 0 {
            return;
        }
        let mut core = self.shared.core.lock().unwrap();
        while core.sp.dma_full() {}
        core.sp
            .dma_read(mem_offset, dram_addr, dma_block_len(pitch, width, height, bpp));
    }

    /// Blocks until every accepted transfer has completed.
    pub fn wait_dma(&self) {
        let core = self.shared.core.lock().unwrap();
        while core.sp.dma_busy() {}
    }

    /// Claims the hardware semaphore arbitrating the DMA engine between
    /// the CPU and the microcode. Returns false when the microcode side
    /// holds it.
    pub fn try_lock_dma(&self) -> bool {
        self.shared.core.lock().unwrap().sp.semaphore_acquire()
    }

    pub fn unlock_dma(&self) {
        self.shared.core.lock().unwrap().sp.semaphore_release()
    }
}

impl<S: SpPort> RspCore<S> {
    /// The break handler: acknowledge, retire the front job, start the
    /// next one.
    fn on_break(&mut self) {
        self.sp.write_status(SpStatusWrite::halt_and_acknowledge());
        if let Some(id) = self.jobs.dequeue_front() {
            let done = match self.jobs.get_mut(id) {
                Some(job) => {
                    job.state = JobState::Finished;
                    job.done.take()
                }
                None => None,
            };
            if let Some(mut callback) = done {
                callback(id);
                if let Some(job) = self.jobs.get_mut(id) {
                    job.done = Some(callback);
                }
            }
            if let Some(job) = self.jobs.get_mut(id) {
                job.state = JobState::Idle;
            }
        }
        self.dispatch_head();
    }

    fn queue_job(&mut self, id: JobId) -> Result<(), JobError> {
        let job = self.jobs.get_mut(id).ok_or(JobError::Stale)?;
        if matches!(job.state, JobState::Queued | JobState::Running) {
            return Err(JobError::Busy);
        }
        job.state = JobState::Queued;
        self.jobs.enqueue(id);
        if self.sp.status().stopped() {
            self.dispatch_head();
        }
        Ok(())
    }

    /// Starts the front job if there is one and it is runnable. A zero
    /// entry parks the queue until the placeholder is aborted.
    fn dispatch_head(&mut self) {
        let Some(id) = self.jobs.front() else {
            return;
        };
        let (entry, block) = {
            let job = match self.jobs.get_mut(id) {
                Some(job) => job,
                None => return,
            };
            if job.entry == 0 {
                return;
            }
            let mut block = [0u8; MAX_JOB_ARGS * 4];
            for (i, arg) in job.args.iter().enumerate() {
                block[i * 4..(i + 1) * 4].copy_from_slice(&arg.to_be_bytes());
            }
            job.state = JobState::Running;
            (job.entry, block)
        };
        tracing::debug!(entry, "starting microcode job");
        self.sp.mem_write(JOB_ARGS_OFFSET, &block);
        self.sp.set_pc(entry);
        self.sp
            .write_status(SpStatusWrite::start_with_break_interrupt());
    }

    fn abort_job(&mut self, id: JobId) -> Result<(), JobError> {
        let state = self.jobs.get(id).ok_or(JobError::Stale)?.state;
        let was_stopped = self.sp.status().stopped();
        // Freeze the unit so the queue cannot move under the edit.
        self.sp.write_status(SpStatusWrite::SET_HALT);
        match state {
            JobState::Queued => {
                self.jobs.unlink(id);
                if was_stopped {
                    // Nothing was running; the front may be startable now.
                    self.dispatch_head();
                } else {
                    self.sp.write_status(SpStatusWrite::CLR_HALT);
                }
            }
            JobState::Running => {
                tracing::debug!("aborting the running microcode job");
                self.sp.write_status(SpStatusWrite::halt_and_acknowledge());
                let _ = self.jobs.dequeue_front();
                self.dispatch_head();
            }
            _ => {
                if !was_stopped {
                    self.sp.write_status(SpStatusWrite::CLR_HALT);
                }
            }
        }
        if let Some(job) = self.jobs.get_mut(id) {
            job.state = JobState::Idle;
        }
        Ok(())
    }

    fn drain_queue(&mut self) {
        while let Some(id) = self.jobs.dequeue_front() {
            if let Some(job) = self.jobs.get_mut(id) {
                job.state = JobState::Idle;
            }
        }
    }
}

fn read_u32(sp: &impl SpPort, offset: u32) -> u32 {
    let mut bytes = [0u8; 4];
    sp.mem_read(offset, &mut bytes);
    u32::from_be_bytes(bytes)
}

/// Compares the NUL-terminated name at `offset` against `module`.
fn name_matches(sp: &impl SpPort, offset: u32, module: &str) -> bool {
    let name = module.as_bytes();
    if offset + name.len() as u32 + 1 > SP_MEM_LEN {
        return false;
    }
    let mut bytes = vec![0u8; name.len() + 1];
    sp.mem_read(offset, &mut bytes);
    &bytes[..name.len()] == name && bytes[name.len()] == 0
}
