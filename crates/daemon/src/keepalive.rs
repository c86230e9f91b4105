// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-server idle timers with in-flight refcounts.
//!
//! Every request brackets its server with [`KeepaliveManager::begin`] /
//! [`KeepaliveManager::end`]. While the refcount is positive no timer runs;
//! when it drops to zero a fresh sliding-window timer is armed. A timer
//! that fires closes the server's pool connection, and when the last timer
//! fires with nothing in flight the all-idle callback runs — the daemon
//! uses it to terminate itself.
//!
//! Timers carry a generation number. A reschedule bumps the generation, so
//! a stale expiry that lost the race against `begin` recognizes itself and
//! drops out instead of closing a connection that just became busy.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// The pool-facing half of keepalive: close one server's session.
#[async_trait]
pub trait SessionCloser: Send + Sync {
    async fn close_server(&self, server: &str);
}

/// Invoked (asynchronously) when every server is idle.
pub type IdleCallback = Arc<dyn Fn() + Send + Sync>;

pub struct KeepaliveManager {
    inner: Arc<Inner>,
}

struct Inner {
    idle_timeout: Duration,
    closer: Arc<dyn SessionCloser>,
    on_all_idle: Option<IdleCallback>,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    in_flight: HashMap<String, usize>,
    timers: HashMap<String, Timer>,
    next_generation: u64,
}

struct Timer {
    generation: u64,
    task: JoinHandle<()>,
}

impl KeepaliveManager {
    pub fn new(
        idle_timeout: Duration,
        closer: Arc<dyn SessionCloser>,
        on_all_idle: Option<IdleCallback>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                idle_timeout,
                closer,
                on_all_idle,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Mark a request in flight: cancels any pending timer for the server
    /// and bumps the refcount.
    ///
    /// Blocks while an expiry for any server is mid-close; new requests
    /// wait for a clean teardown rather than racing a half-closed session.
    pub async fn begin(&self, server: &str) {
        let mut state = self.inner.state.lock().await;
        if let Some(timer) = state.timers.remove(server) {
            timer.task.abort();
        }
        *state.in_flight.entry(server.to_string()).or_insert(0) += 1;
    }

    /// Mark a request finished. When the last in-flight request for the
    /// server ends, a fresh idle timer is armed.
    pub async fn end(&self, server: &str) {
        let mut state = self.inner.state.lock().await;
        match state.in_flight.get_mut(server) {
            Some(count) if *count > 1 => *count -= 1,
            _ => {
                state.in_flight.remove(server);
                Inner::start_timer_locked(&self.inner, &mut state, server);
            }
        }
    }

    /// Restart the idle timer without a begin/end bracket. Noop while
    /// requests are in flight.
    pub async fn touch(&self, server: &str) {
        let mut state = self.inner.state.lock().await;
        if state.in_flight.get(server).copied().unwrap_or(0) > 0 {
            return;
        }
        Inner::start_timer_locked(&self.inner, &mut state, server);
    }

    /// Cancel all timers and forget all refcounts. Used when the pool is
    /// reset against a new config.
    pub async fn stop(&self) {
        let mut state = self.inner.state.lock().await;
        for (_, timer) in state.timers.drain() {
            timer.task.abort();
        }
        state.in_flight.clear();
    }
}

impl Inner {
    fn start_timer_locked(inner: &Arc<Inner>, state: &mut State, server: &str) {
        if let Some(old) = state.timers.remove(server) {
            old.task.abort();
        }
        state.next_generation += 1;
        let generation = state.next_generation;

        let task_inner = Arc::clone(inner);
        let task_server = server.to_string();
        let task = tokio::spawn(async move {
            tokio::time::sleep(task_inner.idle_timeout).await;
            Inner::expire(&task_inner, &task_server, generation).await;
        });

        state.timers.insert(server.to_string(), Timer { generation, task });
    }

    async fn expire(inner: &Arc<Inner>, server: &str, generation: u64) {
        let mut state = inner.state.lock().await;

        // Stale if a reschedule overtook us or the server went busy again.
        match state.timers.get(server) {
            Some(timer) if timer.generation == generation => {}
            _ => return,
        }
        if state.in_flight.contains_key(server) {
            return;
        }
        state.timers.remove(server);

        debug!(server, "idle timeout expired, closing session");
        // Hold the lock across the close: begin() must wait for a clean
        // teardown before admitting new work for this server.
        inner.closer.close_server(server).await;

        if state.timers.is_empty() && state.in_flight.is_empty() {
            if let Some(callback) = &inner.on_all_idle {
                debug!("all servers idle");
                let callback = Arc::clone(callback);
                tokio::spawn(async move { callback() });
            }
        }
    }
}

#[cfg(test)]
#[path = "keepalive_tests.rs"]
mod tests;
