use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender};

/// Work handed to the thread that owns `C`.
pub type Job<C> = Box<dyn FnOnce(&mut C) + Send>;

/// FIFO of jobs produced on any thread and run on the owner's thread when it is idle.
pub struct IdleJobQueue<C: ?Sized> {
    tx: Sender<Job<C>>,
    rx: Receiver<Job<C>>,
    started: AtomicBool,
}

impl<C: ?Sized> Default for IdleJobQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> IdleJobQueue<C> {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            started: AtomicBool::new(false),
        }
    }

    pub fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn push_job(&self, job: impl FnOnce(&mut C) + Send + 'static) {
        // The receiver lives as long as the queue, so sending cannot fail here.
        let _ = self.tx.send(Box::new(job));
    }

    /// A producer handle for other threads.
    pub fn sender(&self) -> Sender<Job<C>> {
        self.tx.clone()
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Runs every queued job, including ones queued by the jobs themselves. Returns how
    /// many ran.
    pub fn run_jobs(&self, ctx: &mut C) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job(ctx);
            ran += 1;
        }
        ran
    }

    /// Stops accepting idle callbacks after one last synchronous drain.
    pub fn stop(&self, ctx: &mut C) -> usize {
        let ran = self.run_jobs(ctx);
        self.started.store(false, Ordering::SeqCst);
        ran
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn drains_jobs_from_other_threads_in_order() {
        let queue: IdleJobQueue<Vec<u32>> = IdleJobQueue::new();
        queue.start();
        let tx = queue.sender();
        thread::spawn(move || {
            for i in 0..5 {
                let _ = tx.send(Box::new(move |log: &mut Vec<u32>| log.push(i)));
            }
        })
        .join()
        .expect("producer");

        let mut log = Vec::new();
        assert_eq!(queue.run_jobs(&mut log), 5);
        assert_eq!(log, vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.run_jobs(&mut log), 0);
    }

    #[test]
    fn stop_runs_what_is_left() {
        let queue: IdleJobQueue<u32> = IdleJobQueue::new();
        queue.start();
        queue.push_job(|n| *n += 1);
        queue.push_job(|n| *n += 10);
        let mut n = 0;
        assert_eq!(queue.stop(&mut n), 2);
        assert_eq!(n, 11);
        assert!(!queue.is_started());
    }
}
