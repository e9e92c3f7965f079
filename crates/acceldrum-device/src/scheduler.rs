//! Single-threaded cooperative scheduler.
//!
//! Tasks never re-register themselves. Each invocation returns a
//! [`Schedule`] and the scheduler owns the actual re-scheduling. Every
//! invocation is timed; one that overruns the supervision timeout stops the
//! loop, standing in for a hardware watchdog reset.

use std::time::{Duration, Instant};

use crate::error::{DeviceError, Result};

/// What a task wants after an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Run again on the next pass.
    Immediate,
    /// Run again once the delay has elapsed.
    After(Duration),
    /// One-shot finished; drop the task.
    Done,
    /// Stop the whole loop. Terminal.
    Halt(String),
}

type TaskFn<S> = Box<dyn FnMut(&mut S) -> Schedule>;

struct Task<S> {
    name: String,
    run: TaskFn<S>,
    due: Instant,
}

/// Result of one [`Scheduler::run_once`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Task invocations performed.
    pub ran: usize,
    /// Earliest due time among the remaining tasks.
    pub next_due: Option<Instant>,
}

pub struct Scheduler<S> {
    tasks: Vec<Task<S>>,
    task_timeout: Duration,
    idle_cap: Duration,
}

/// Longest the loop sleeps in one go while waiting for a due task.
const DEFAULT_IDLE_CAP: Duration = Duration::from_millis(5);

impl<S> Scheduler<S> {
    pub fn new(task_timeout: Duration) -> Self {
        Self {
            tasks: Vec::new(),
            task_timeout,
            idle_cap: DEFAULT_IDLE_CAP,
        }
    }

    /// Upper bound on each idle sleep, so stop requests are noticed promptly.
    pub fn with_idle_cap(mut self, idle_cap: Duration) -> Self {
        self.idle_cap = idle_cap;
        self
    }

    pub fn task_timeout(&self) -> Duration {
        self.task_timeout
    }

    /// Register a task to run on the next pass.
    pub fn schedule<F>(&mut self, name: impl Into<String>, task: F)
    where
        F: FnMut(&mut S) -> Schedule + 'static,
    {
        self.schedule_after(name, Duration::ZERO, task);
    }

    /// Register a task to run once `delay` has elapsed.
    pub fn schedule_after<F>(&mut self, name: impl Into<String>, delay: Duration, task: F)
    where
        F: FnMut(&mut S) -> Schedule + 'static,
    {
        let name = name.into();
        tracing::trace!(task = %name, ?delay, "task scheduled");
        self.tasks.push(Task {
            name,
            run: Box::new(task),
            due: Instant::now() + delay,
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.tasks.iter().map(|t| t.name.as_str())
    }

    /// Invoke every task that is due, in registration order.
    pub fn run_once(&mut self, state: &mut S) -> Result<Tick> {
        let mut ran = 0;
        let mut index = 0;
        while index < self.tasks.len() {
            let started = Instant::now();
            if self.tasks[index].due > started {
                index += 1;
                continue;
            }

            let task = &mut self.tasks[index];
            let next = (task.run)(state);
            let elapsed = started.elapsed();
            ran += 1;

            if elapsed > self.task_timeout {
                tracing::error!(
                    task = %task.name,
                    ?elapsed,
                    timeout = ?self.task_timeout,
                    "supervision timeout"
                );
                return Err(DeviceError::SupervisionTimeout {
                    task: task.name.clone(),
                    elapsed,
                });
            }

            match next {
                Schedule::Immediate => {
                    task.due = Instant::now();
                    index += 1;
                }
                Schedule::After(delay) => {
                    task.due = Instant::now() + delay;
                    index += 1;
                }
                Schedule::Done => {
                    tracing::trace!(task = %task.name, "task done");
                    self.tasks.remove(index);
                }
                Schedule::Halt(reason) => {
                    tracing::error!(task = %task.name, %reason, "halt requested");
                    return Err(DeviceError::Halted(reason));
                }
            }
        }

        Ok(Tick {
            ran,
            next_due: self.tasks.iter().map(|t| t.due).min(),
        })
    }

    /// Run passes until `stop` returns true or no task is left.
    ///
    /// Sleeps while nothing is due, never longer than the idle cap.
    pub fn run_until(&mut self, state: &mut S, mut stop: impl FnMut(&S) -> bool) -> Result<()> {
        while !self.tasks.is_empty() && !stop(state) {
            let tick = self.run_once(state)?;
            if tick.ran > 0 {
                continue;
            }
            if let Some(due) = tick.next_due {
                let wait = due.saturating_duration_since(Instant::now());
                std::thread::sleep(wait.min(self.idle_cap));
            }
        }
        Ok(())
    }

    /// Run passes for at most `duration`.
    pub fn run_for(&mut self, state: &mut S, duration: Duration) -> Result<()> {
        let deadline = Instant::now() + duration;
        self.run_until(state, |_| Instant::now() >= deadline)
    }
}

impl<S> std::fmt::Debug for Scheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.task_names().collect::<Vec<_>>())
            .field("task_timeout", &self.task_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counters {
        a: u32,
        b: u32,
        log: Vec<&'static str>,
    }

    #[test]
    fn immediate_tasks_run_every_pass_in_order() {
        let mut scheduler = Scheduler::new(Duration::from_secs(1));
        scheduler.schedule("a", |s: &mut Counters| {
            s.a += 1;
            s.log.push("a");
            Schedule::Immediate
        });
        scheduler.schedule("b", |s: &mut Counters| {
            s.b += 1;
            s.log.push("b");
            Schedule::Immediate
        });

        let mut state = Counters::default();
        for _ in 0..3 {
            assert_eq!(scheduler.run_once(&mut state).expect("pass").ran, 2);
        }
        assert_eq!((state.a, state.b), (3, 3));
        assert_eq!(state.log, vec!["a", "b", "a", "b", "a", "b"]);
    }

    #[test]
    fn done_removes_one_shot() {
        let mut scheduler = Scheduler::new(Duration::from_secs(1));
        scheduler.schedule("once", |s: &mut Counters| {
            s.a += 1;
            Schedule::Done
        });
        let mut state = Counters::default();
        scheduler.run_once(&mut state).expect("pass");
        scheduler.run_once(&mut state).expect("pass");
        assert_eq!(state.a, 1);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn delayed_task_waits() {
        let mut scheduler = Scheduler::new(Duration::from_secs(1));
        scheduler.schedule_after("later", Duration::from_secs(3600), |s: &mut Counters| {
            s.a += 1;
            Schedule::Done
        });
        let mut state = Counters::default();
        let tick = scheduler.run_once(&mut state).expect("pass");
        assert_eq!(tick.ran, 0);
        assert!(tick.next_due.is_some());
        assert_eq!(state.a, 0);
    }

    #[test]
    fn after_reschedules_with_delay() {
        let mut scheduler = Scheduler::new(Duration::from_secs(1));
        scheduler.schedule("slow", |s: &mut Counters| {
            s.a += 1;
            Schedule::After(Duration::from_secs(3600))
        });
        let mut state = Counters::default();
        scheduler.run_once(&mut state).expect("pass");
        scheduler.run_once(&mut state).expect("pass");
        assert_eq!(state.a, 1);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn overrun_reports_supervision_timeout() {
        let mut scheduler = Scheduler::new(Duration::from_millis(5));
        scheduler.schedule("stuck", |_: &mut Counters| {
            std::thread::sleep(Duration::from_millis(30));
            Schedule::Immediate
        });
        let mut state = Counters::default();
        match scheduler.run_once(&mut state) {
            Err(DeviceError::SupervisionTimeout { task, elapsed }) => {
                assert_eq!(task, "stuck");
                assert!(elapsed >= Duration::from_millis(30));
            }
            other => panic!("expected supervision timeout, got {other:?}"),
        }
    }

    #[test]
    fn halt_stops_the_loop() {
        let mut scheduler = Scheduler::new(Duration::from_secs(1));
        scheduler.schedule("guard", |s: &mut Counters| {
            s.a += 1;
            if s.a == 3 {
                Schedule::Halt("integrity".into())
            } else {
                Schedule::Immediate
            }
        });
        let mut state = Counters::default();
        let err = scheduler
            .run_until(&mut state, |_| false)
            .expect_err("halt should end the loop");
        assert!(matches!(err, DeviceError::Halted(reason) if reason == "integrity"));
        assert_eq!(state.a, 3);
    }

    #[test]
    fn run_until_honours_stop() {
        let mut scheduler = Scheduler::new(Duration::from_secs(1));
        scheduler.schedule("count", |s: &mut Counters| {
            s.a += 1;
            Schedule::Immediate
        });
        let mut state = Counters::default();
        scheduler
            .run_until(&mut state, |s| s.a >= 10)
            .expect("loop should stop cleanly");
        assert_eq!(state.a, 10);
    }

    #[test]
    fn run_for_returns_after_deadline() {
        let mut scheduler = Scheduler::new(Duration::from_secs(1));
        scheduler.schedule("tick", |s: &mut Counters| {
            s.a += 1;
            Schedule::After(Duration::from_millis(1))
        });
        let mut state = Counters::default();
        let started = Instant::now();
        scheduler
            .run_for(&mut state, Duration::from_millis(20))
            .expect("loop should finish");
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(state.a >= 1);
    }
}
