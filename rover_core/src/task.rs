//! Supervised thread-backed tasks.
//!
//! A [`Task`] is a unit of work with a backing OS thread, driven through
//! the shared lifecycle table: `run()` performs the Started transition and
//! spawns the loop, `enable()`/`disable()` toggle the periodic work, and
//! `close()` is terminal. Idempotency of close is enforced by the state
//! machine itself — a second close is an illegal transition — so there is
//! no separate "already closing" flag.
//!
//! Shutdown joins the backing thread with a bounded per-attempt timeout,
//! logging each retry. An ordinary task that never terminates is logged
//! indefinitely; a safety-critical one forces process termination once the
//! retry budget is exhausted. The decision is factored into
//! [`shutdown_action`] so the policy is testable without killing the test
//! process.
//!
//! A [`Supervisor`] owns the task set, assigns sequence ordinals, and
//! enables/disables/closes tasks in priority order so shutdown behaviour
//! is uniform rather than duplicated per subsystem.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rover_common::config::TaskPolicyConfig;
use tracing::{debug, error, info, warn};

use crate::error::RuntimeError;
use crate::fsm::{State, StateMachine};
use crate::rate::Rate;

// ─── Shutdown Policy ────────────────────────────────────────────────

/// What to do after a failed join attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownAction {
    /// Retry the join after the timeout.
    KeepWaiting,
    /// Safety-critical task exceeded its budget: terminate the process.
    ForceTerminate,
}

/// Decide the shutdown action after `attempts` failed joins.
///
/// Ordinary tasks are waited on (and logged) indefinitely; only a
/// safety-critical task escalates once the budget is spent.
pub const fn shutdown_action(
    attempts: u32,
    retry_budget: u32,
    safety_critical: bool,
) -> ShutdownAction {
    if safety_critical && attempts >= retry_budget {
        ShutdownAction::ForceTerminate
    } else {
        ShutdownAction::KeepWaiting
    }
}

// ─── Task ───────────────────────────────────────────────────────────

/// Immutable description of a task.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    /// Task name, also used as the thread name.
    pub name: String,
    /// Urgency: lower is more urgent.
    pub priority: u8,
    /// Loop frequency of the periodic work [Hz].
    pub rate_hz: u32,
    /// Whether a hung shutdown must terminate the process.
    pub safety_critical: bool,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, priority: u8, rate_hz: u32) -> Self {
        Self {
            name: name.into(),
            priority,
            rate_hz,
            safety_critical: false,
        }
    }

    /// Mark this task as safety-critical.
    pub fn safety_critical(mut self) -> Self {
        self.safety_critical = true;
        self
    }
}

/// A supervised, thread-backed unit of work.
pub struct Task {
    spec: TaskSpec,
    policy: TaskPolicyConfig,
    /// Ordinal assigned on registration with a supervisor.
    sequence: u32,
    fsm: StateMachine,
    enabled: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Task {
    /// Create a task in the Initial state. The thread is not yet spawned.
    pub fn new(spec: TaskSpec, policy: TaskPolicyConfig) -> Self {
        let fsm = StateMachine::new(spec.name.clone());
        Self {
            spec,
            policy,
            sequence: 0,
            fsm,
            enabled: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicBool::new(true)),
            handle: None,
        }
    }

    /// Task name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Urgency: lower is more urgent.
    #[inline]
    pub const fn priority(&self) -> u8 {
        self.spec.priority
    }

    /// Registration ordinal.
    #[inline]
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    pub(crate) fn set_sequence(&mut self, sequence: u32) {
        self.sequence = sequence;
    }

    /// Current lifecycle state.
    #[inline]
    pub const fn state(&self) -> State {
        self.fsm.state()
    }

    /// Whether periodic work is currently enabled.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Whether the backing thread is running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    #[inline]
    pub const fn is_safety_critical(&self) -> bool {
        self.spec.safety_critical
    }

    /// Perform the Started transition and spawn the backing thread.
    ///
    /// `tick` is called once per loop iteration while the task is enabled;
    /// the loop paces itself at the spec's rate and exits when the task is
    /// closed.
    pub fn run<F>(&mut self, mut tick: F) -> Result<(), RuntimeError>
    where
        F: FnMut() + Send + 'static,
    {
        self.fsm.run()?;
        let name = self.spec.name.clone();
        let enabled = Arc::clone(&self.enabled);
        let active = Arc::clone(&self.active);
        let hertz = self.spec.rate_hz;
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                debug!(task = %name, "task loop started");
                let mut rate = Rate::new(hertz);
                while active.load(Ordering::Acquire) {
                    if enabled.load(Ordering::Acquire) {
                        tick();
                    }
                    rate.wait();
                }
                debug!(task = %name, "task loop exited");
            })
            .map_err(|e| RuntimeError::SpawnFailed {
                name: self.spec.name.clone(),
                reason: e.to_string(),
            })?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Enable periodic work.
    pub fn enable(&mut self) -> Result<(), RuntimeError> {
        self.fsm.enable()?;
        self.enabled.store(true, Ordering::Release);
        debug!(task = %self.spec.name, "enabled");
        Ok(())
    }

    /// Pause periodic work. The backing thread keeps polling.
    pub fn disable(&mut self) -> Result<(), RuntimeError> {
        self.fsm.disable()?;
        self.enabled.store(false, Ordering::Release);
        debug!(task = %self.spec.name, "disabled");
        Ok(())
    }

    /// Terminal: stop the loop and join the backing thread.
    ///
    /// Joins with a bounded per-attempt timeout, logging each retry. A
    /// safety-critical task that exceeds the retry budget terminates the
    /// process.
    pub fn close(&mut self) -> Result<(), RuntimeError> {
        self.fsm.close()?;
        self.enabled.store(false, Ordering::Release);
        self.active.store(false, Ordering::Release);

        let Some(handle) = self.handle.take() else {
            debug!(task = %self.spec.name, "closed without a backing thread");
            return Ok(());
        };

        let timeout = Duration::from_secs_f64(self.policy.join_timeout_sec);
        let mut attempts: u32 = 0;
        while !handle.is_finished() {
            attempts += 1;
            info!(
                task = %self.spec.name,
                attempts,
                timeout_sec = self.policy.join_timeout_sec,
                "waiting for task thread to terminate"
            );
            thread::sleep(timeout);
            if let ShutdownAction::ForceTerminate =
                shutdown_action(attempts, self.policy.retry_budget, self.spec.safety_critical)
            {
                error!(
                    task = %self.spec.name,
                    attempts,
                    "safety-critical task failed to terminate: forcing process exit"
                );
                std::process::exit(1);
            }
        }
        if handle.join().is_err() {
            warn!(task = %self.spec.name, "task thread panicked");
        }
        info!(task = %self.spec.name, "closed");
        Ok(())
    }
}

// ─── Supervisor ─────────────────────────────────────────────────────

/// Owns the task set and applies lifecycle operations uniformly.
#[derive(Default)]
pub struct Supervisor {
    tasks: Vec<Task>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task, assigning its sequence ordinal.
    pub fn register(&mut self, mut task: Task) {
        task.set_sequence(self.tasks.len() as u32);
        self.tasks.push(task);
    }

    /// Number of registered tasks.
    #[inline]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Registered tasks, in registration order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Enable all tasks, most urgent first.
    pub fn enable_all(&mut self) -> Result<(), RuntimeError> {
        for index in self.priority_order() {
            self.tasks[index].enable()?;
        }
        Ok(())
    }

    /// Disable all tasks, least urgent first.
    pub fn disable_all(&mut self) -> Result<(), RuntimeError> {
        for index in self.priority_order().into_iter().rev() {
            self.tasks[index].disable()?;
        }
        Ok(())
    }

    /// Close all tasks, least urgent first, so the most urgent subsystems
    /// stay alive longest. Failures are logged and do not stop the sweep.
    pub fn close_all(&mut self) {
        for index in self.priority_order().into_iter().rev() {
            let task = &mut self.tasks[index];
            if let Err(e) = task.close() {
                warn!(task = %task.name(), error = %e, "close failed");
            }
        }
    }

    /// Name and state of every task, for the shutdown summary.
    pub fn states(&self) -> Vec<(String, State)> {
        self.tasks
            .iter()
            .map(|t| (t.name().to_string(), t.state()))
            .collect()
    }

    /// Indices sorted by (priority, sequence), most urgent first.
    fn priority_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.tasks.len()).collect();
        order.sort_by_key(|&i| (self.tasks[i].priority(), self.tasks[i].sequence()));
        order
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
