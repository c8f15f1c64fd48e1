//! Future support.

use std::{
    future::IntoFuture,
    pin::pin,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll, Wake, Waker},
    thread::{self, Thread},
};

struct KWaker {
    thread: Thread,
    woke: AtomicBool,
}

impl KWaker {
    fn new() -> Arc<Self> {
        Arc::new(KWaker {
            thread: thread::current(),
            woke: AtomicBool::new(false),
        })
    }
}

impl Wake for KWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.woke.store(true, Ordering::Release);
        self.thread.unpark();
    }
}

/// Blocks the current task until the given future is resolved.
///
/// The task is parked while the future is pending and runs again once the
/// future's waker fires. Spurious unparks are absorbed by the `woke` flag.
pub fn block_on<F: IntoFuture>(f: F) -> F::Output {
    let mut fut = pin!(f.into_future());

    let kwaker = KWaker::new();
    let waker = Waker::from(kwaker.clone());
    let mut cx = Context::from_waker(&waker);

    loop {
        match fut.as_mut().poll(&mut cx) {
            Poll::Pending => {
                while !kwaker.woke.swap(false, Ordering::Acquire) {
                    thread::park();
                }
            }
            Poll::Ready(output) => break output,
        }
    }
}
