//! Bridge between worker threads and the UI thread.
//!
//! Work runs on a spawned thread; its continuation stays on the UI thread and
//! only runs from `pump`. Continuations therefore need not be `Send` and may
//! touch `Rc` state directly.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

type JobId = u64;
type Finished = (JobId, Box<dyn Any + Send>);
type Continuation = Box<dyn FnOnce(Box<dyn Any + Send>)>;

struct Inner {
    tx: Sender<Finished>,
    rx: Receiver<Finished>,
    waiting: RefCell<HashMap<JobId, Continuation>>,
    deferred: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    next_id: Cell<JobId>,
}

#[derive(Clone)]
pub struct JobQueue {
    inner: Rc<Inner>,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            inner: Rc::new(Inner {
                tx,
                rx,
                waiting: RefCell::new(HashMap::new()),
                deferred: RefCell::new(VecDeque::new()),
                next_id: Cell::new(1),
            }),
        }
    }

    /// Run `work` off the UI thread; `done` receives its output from `pump`.
    pub fn spawn<T, W, D>(&self, work: W, done: D)
    where
        T: Send + 'static,
        W: FnOnce() -> T + Send + 'static,
        D: FnOnce(T) + 'static,
    {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.waiting.borrow_mut().insert(
            id,
            Box::new(move |out: Box<dyn Any + Send>| match out.downcast::<T>() {
                Ok(v) => done(*v),
                Err(_) => log::warn!("jobs: result of job {id} had an unexpected type"),
            }),
        );
        let tx = self.inner.tx.clone();
        thread::spawn(move || {
            let out = work();
            let _ = tx.send((id, Box::new(out)));
        });
    }

    /// Queue a continuation for the next `pump`.
    pub fn defer(&self, done: impl FnOnce() + 'static) {
        self.inner.deferred.borrow_mut().push_back(Box::new(done));
    }

    pub fn pending(&self) -> usize {
        self.inner.waiting.borrow().len() + self.inner.deferred.borrow().len()
    }

    /// Run every continuation that is ready. Returns how many ran.
    pub fn pump(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.inner.deferred.borrow_mut().pop_front();
            match next {
                Some(job) => {
                    job();
                    ran += 1;
                }
                None => break,
            }
        }
        while let Ok((id, out)) = self.inner.rx.try_recv() {
            let cont = self.inner.waiting.borrow_mut().remove(&id);
            if let Some(cont) = cont {
                cont(out);
                ran += 1;
            }
            // continuations may defer more work
            loop {
                let next = self.inner.deferred.borrow_mut().pop_front();
                match next {
                    Some(job) => {
                        job();
                        ran += 1;
                    }
                    None => break,
                }
            }
        }
        ran
    }

    /// Pump until nothing is pending or `timeout` elapses. Returns whether the
    /// queue drained.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            self.pump();
            if self.pending() == 0 {
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }
}
