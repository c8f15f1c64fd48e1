use std::{
    future,
    sync::{
        Arc, Once,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use kspin::SpinNoPreempt;

use crate::{self as thread, IrqContext, WaitQueue, future::block_on};

static INIT: Once = Once::new();

fn init() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
        thread::init_scheduler();
    });
}

struct Gate {
    state: SpinNoPreempt<GateState>,
    queue: WaitQueue,
}

#[derive(Default)]
struct GateState {
    tickets: usize,
    sleeping: usize,
    woken: usize,
}

impl Gate {
    fn new() -> Self {
        Self {
            state: SpinNoPreempt::new(GateState::default()),
            queue: WaitQueue::new(),
        }
    }

    fn pass(&self) {
        let mut state = self.state.lock();
        state.sleeping += 1;
        while state.tickets == 0 {
            state = self.queue.wait(state);
        }
        state.tickets -= 1;
        state.sleeping -= 1;
        state.woken += 1;
    }

    fn wait_for(&self, f: impl Fn(&GateState) -> bool) {
        while !f(&self.state.lock()) {
            thread::yield_now();
        }
    }
}

#[test]
fn ids_are_unique_and_stable() {
    init();

    let me = thread::current().id();
    assert_eq!(me, thread::current().id());
    assert_ne!(me.as_u64(), 0);

    let child = thread::spawn_raw(|| thread::current().id(), "child".into());
    let child_task = child.task().clone();
    let child_id = child.join();
    assert_eq!(child_id, child_task.id());
    assert_ne!(child_id, me);
    assert_eq!(child_task.name(), "child");
    assert!(child_task.id_name().contains("child"));
}

#[test]
#[should_panic(expected = "boom")]
fn join_resumes_panic() {
    init();
    thread::spawn(|| panic!("boom")).join();
}

#[test]
fn spinlock_disables_preemption() {
    init();

    let lock = SpinNoPreempt::new(0);
    assert_eq!(thread::preempt_count(), 0);
    {
        let _g = lock.lock();
        assert_eq!(thread::preempt_count(), 1);
    }
    assert_eq!(thread::preempt_count(), 0);
    thread::might_sleep();
}

#[test]
#[should_panic(expected = "preemption disabled")]
fn sleeping_with_spinlock_held_is_fatal() {
    init();

    let lock = SpinNoPreempt::new(());
    let _g = lock.lock();
    thread::might_sleep();
}

#[test]
#[should_panic(expected = "interrupt context")]
fn sleeping_in_interrupt_is_fatal() {
    init();

    let _irq = IrqContext::enter();
    thread::might_sleep();
}

#[test]
fn irq_context_nests() {
    init();

    let outer = IrqContext::enter();
    let inner = IrqContext::enter();
    drop(inner);
    assert!(thread::in_interrupt());
    drop(outer);
    assert!(!thread::in_interrupt());
    assert_eq!(thread::preempt_count(), 0);
}

#[test]
#[should_panic(expected = "preemption disabled")]
fn waiting_under_a_second_spinlock_is_fatal() {
    init();

    let outer = SpinNoPreempt::new(());
    let gate = Gate::new();
    let _o = outer.lock();
    let state = gate.state.lock();
    let _ = gate.queue.wait(state);
}

#[test]
fn notify_one_wakes_one() {
    init();

    const WAITERS: usize = 4;
    let gate = Arc::new(Gate::new());
    let handles: Vec<_> = (0..WAITERS)
        .map(|_| {
            let gate = gate.clone();
            thread::spawn(move || gate.pass())
        })
        .collect();

    gate.wait_for(|s| s.sleeping == WAITERS);
    {
        let mut state = gate.state.lock();
        state.tickets += 1;
        gate.queue.notify_one();
    }
    gate.wait_for(|s| s.woken == 1);
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(gate.state.lock().woken, 1);

    {
        let mut state = gate.state.lock();
        state.tickets += WAITERS - 1;
        gate.queue.notify_all();
    }
    for h in handles {
        h.join();
    }
    let state = gate.state.lock();
    assert_eq!(state.woken, WAITERS);
    assert_eq!(state.tickets, 0);
}

#[test]
fn back_to_back_notifies_are_not_lost() {
    init();

    const ROUNDS: usize = 200;
    let gate = Arc::new(Gate::new());
    let passed = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let gate = gate.clone();
            let passed = passed.clone();
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    gate.pass();
                    passed.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for _ in 0..ROUNDS {
        for _ in 0..2 {
            let mut state = gate.state.lock();
            state.tickets += 1;
            gate.queue.notify_one();
        }
        if fastrand::u8(0..3) == 0 {
            thread::yield_now();
        }
    }
    for h in handles {
        h.join();
    }
    assert_eq!(passed.load(Ordering::SeqCst), 2 * ROUNDS);
}

#[test]
fn block_on_ready_future() {
    init();
    assert_eq!(block_on(future::ready(7)), 7);
    assert_eq!(block_on(async { 40 + 2 }), 42);
}

#[cfg(feature = "watchdog")]
mod watchdog {
    use std::sync::{Arc, Barrier, mpsc::channel};

    use super::init;
    use crate::{self as thread, watchdog};

    #[test]
    fn free_lock_is_not_a_deadlock() {
        init();

        let lock = 0x1000usize;
        assert!(watchdog::wait(lock).is_ok());
        watchdog::acquired(lock);
        assert_eq!(watchdog::holder_of(lock), Some(thread::current().id()));
        watchdog::released(lock);
        assert_eq!(watchdog::holder_of(lock), None);
    }

    #[test]
    fn two_task_cycle_is_reported() {
        init();

        let (a, b) = (0x2000usize, 0x3000usize);
        let barrier = Arc::new(Barrier::new(2));
        let (tx, rx) = channel();

        let first = {
            let barrier = barrier.clone();
            thread::spawn(move || {
                watchdog::wait(a).unwrap();
                watchdog::acquired(a);
                barrier.wait();
                // Wait on `b` without ever getting it.
                watchdog::wait(b).unwrap();
                barrier.wait();
                barrier.wait();
                watchdog::acquired(b);
                watchdog::released(b);
                watchdog::released(a);
            })
        };

        let second = thread::spawn(move || {
            barrier.wait();
            watchdog::wait(b).unwrap();
            watchdog::acquired(b);
            barrier.wait();
            tx.send(watchdog::wait(a)).unwrap();
            watchdog::released(b);
            barrier.wait();
        });

        let cycle = rx.recv().unwrap().unwrap_err();
        assert_eq!(cycle.edges.len(), 2);
        assert_eq!(cycle.edges[0].1, a);
        assert_eq!(cycle.edges[1].1, b);
        assert!(cycle.to_string().contains("waits for"));
        second.join();
        first.join();
    }
}
