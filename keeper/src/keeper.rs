//! Keeper cycle and lifecycle guard.
//!
//! The keeper polls the engine on an interval: refresh the pending queue,
//! ask the engine which actions are ready, surface them in queue order,
//! and (when execution is enabled) drive them through the submitter and
//! the engine. A single atomic state cell guards the loop: a tick that
//! arrives while the previous cycle is still running is dropped, never
//! queued, and a stop request wins over any further ticks.

use crate::action_queue::PendingQueue;
use crate::config::{format_address, Config};
use crate::submit::{Call, SubmitStatus, Submitter};
use anyhow::Result;
use folio::{Address, Engine, OracleSource};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPING: u8 = 2;

/// Keeper identity passed to the engine as the execution caller.
pub const KEEPER_CALLER: Address = [0xEE; 32];

pub struct Keeper<O: OracleSource> {
    engine: Arc<Mutex<Engine>>,
    oracle: O,
    submitter: Arc<dyn Submitter>,
    queue: Mutex<PendingQueue>,
    state: AtomicU8,
    poll_interval: Duration,
    max_surfaced: usize,
    execute: bool,
}

impl<O: OracleSource> Keeper<O> {
    pub fn new(
        engine: Arc<Mutex<Engine>>,
        oracle: O,
        submitter: Arc<dyn Submitter>,
        config: &Config,
    ) -> Self {
        Self {
            engine,
            oracle,
            submitter,
            queue: Mutex::new(PendingQueue::new()),
            state: AtomicU8::new(IDLE),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            max_surfaced: config.max_surfaced_per_cycle,
            execute: config.execute,
        }
    }

    /// Request a stop. The current cycle (if any) finishes; no further
    /// ticks run.
    pub fn stop(&self) {
        self.state.store(STOPPING, Ordering::SeqCst);
    }

    /// Immediate halt: same state transition as `stop()`, logged loudly.
    /// Engine state is never touched on the way down.
    pub fn emergency_stop(&self) {
        log::warn!("emergency stop requested");
        self.state.store(STOPPING, Ordering::SeqCst);
    }

    pub fn is_stopping(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STOPPING
    }

    /// Run one tick if the keeper is idle. Returns false when the tick
    /// was dropped (previous cycle still running, or stopping).
    pub fn try_tick(&self, now: u64) -> bool {
        if self
            .state
            .compare_exchange(IDLE, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("tick dropped: keeper busy or stopping");
            return false;
        }
        if let Err(e) = self.cycle(now) {
            log::error!("keeper cycle failed: {e}");
        }
        // A stop requested mid-cycle must not be clobbered back to idle
        let _ = self
            .state
            .compare_exchange(RUNNING, IDLE, Ordering::SeqCst, Ordering::SeqCst);
        true
    }

    fn cycle(&self, now: u64) -> Result<()> {
        let mut engine = self.engine.lock().expect("engine lock poisoned");
        let mut queue = self.queue.lock().expect("queue lock poisoned");

        queue.sync(engine.pending_actions().map(|a| (a.id, a.execute_after)));
        log::debug!("pending queue size: {}", queue.len());

        let ready = engine.get_ready_actions(&self.oracle, now);
        if ready.is_empty() {
            log::debug!("no actions ready");
            return Ok(());
        }

        let ordered = queue.order(&ready);
        let batch = self.max_surfaced.min(ordered.len());
        log::info!("{} actions ready, processing {}", ordered.len(), batch);

        for &id in ordered.iter().take(batch) {
            let action = engine.get_action(id)?;
            log::info!(
                "action {} ready: portfolio {} trigger {:?}",
                id,
                action.portfolio_id,
                action.trigger
            );
            if !self.execute {
                continue;
            }

            let handle = match self.submitter.submit(&[Call::execute_action(id)]) {
                Ok(h) => h,
                Err(e) => {
                    log::error!("failed to submit action {id}: {e}");
                    continue;
                }
            };
            if self.submitter.status(&handle) != SubmitStatus::Confirmed {
                log::warn!("submission #{} for action {id} not confirmed yet", handle.0);
                continue;
            }
            match engine.execute_action(KEEPER_CALLER, id, &self.oracle, now) {
                Ok(()) => {
                    queue.remove(id);
                    log::info!("action {id} executed");
                }
                // A ready check can go stale between surfacing and
                // execution; log and move on.
                Err(e) => log::warn!("action {id} execution failed: {e}"),
            }
        }
        Ok(())
    }

    /// Main loop. Ticks on the configured interval until `stop()`.
    pub async fn run(&self) {
        log::info!(
            "keeper started: poll every {:?}, execute={}, caller={}",
            self.poll_interval,
            self.execute,
            format_address(&KEEPER_CALLER)
        );
        let mut interval = time::interval(self.poll_interval);
        loop {
            interval.tick().await;
            if self.is_stopping() {
                log::info!("keeper stopping");
                break;
            }
            self.try_tick(unix_now());
        }
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
