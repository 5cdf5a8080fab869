use std::collections::HashMap;
use std::time::Duration;

use callwire_signal::{SignalSubscription, SubscriptionId};
use flume::Sender;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use crate::updates::{CoreMsg, InternalEvent};

#[derive(Debug, Default)]
struct CallWorker {
    tasks: Vec<AbortHandle>,
    subscription: Option<SubscriptionId>,
}

/// Background work tied to one call: the signal forwarder and its timers.
///
/// Everything registered under a call id is cancelled by `on_call_ended`.
#[derive(Debug, Default)]
pub(super) struct CallRuntime {
    workers: HashMap<String, CallWorker>, // call_id -> worker
}

fn send_internal(tx: &Sender<CoreMsg>, ev: InternalEvent) -> bool {
    tx.send(CoreMsg::Internal(Box::new(ev))).is_ok()
}

impl CallRuntime {
    /// Forward every batch of `subscription` to the actor as `SignalBatch`.
    pub(super) fn forward_signals(
        &mut self,
        rt: &Handle,
        call_id: &str,
        subscription: SignalSubscription,
        tx: Sender<CoreMsg>,
    ) {
        let sub_id = subscription.id();
        let call = call_id.to_string();
        let task = rt.spawn(async move {
            while let Ok(records) = subscription.recv_async().await {
                let ev = InternalEvent::SignalBatch {
                    call_id: call.clone(),
                    records,
                };
                if !send_internal(&tx, ev) {
                    break;
                }
            }
            tracing::debug!(call_id = %call, "signal subscription closed");
        });
        let worker = self.workers.entry(call_id.to_string()).or_default();
        worker.tasks.push(task.abort_handle());
        worker.subscription = Some(sub_id);
    }

    /// Tick once per second until the call ends.
    pub(super) fn start_clock(&mut self, rt: &Handle, call_id: &str, tx: Sender<CoreMsg>) {
        let call = call_id.to_string();
        let task = rt.spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let ev = InternalEvent::ClockTick {
                    call_id: call.clone(),
                };
                if !send_internal(&tx, ev) {
                    break;
                }
            }
        });
        self.track(call_id, task.abort_handle());
    }

    pub(super) fn arm_auto_reject(
        &mut self,
        rt: &Handle,
        call_id: &str,
        delay: Duration,
        tx: Sender<CoreMsg>,
    ) {
        let call = call_id.to_string();
        let task = rt.spawn(async move {
            tokio::time::sleep(delay).await;
            send_internal(&tx, InternalEvent::AutoRejectElapsed { call_id: call });
        });
        self.track(call_id, task.abort_handle());
    }

    fn track(&mut self, call_id: &str, handle: AbortHandle) {
        self.workers
            .entry(call_id.to_string())
            .or_default()
            .tasks
            .push(handle);
    }

    /// Cancel all work for `call_id`. Returns the subscription to close, if any.
    pub(super) fn on_call_ended(&mut self, call_id: &str) -> Option<SubscriptionId> {
        let worker = self.workers.remove(call_id)?;
        for task in &worker.tasks {
            task.abort();
        }
        tracing::debug!(call_id, tasks = worker.tasks.len(), "call runtime stopped");
        worker.subscription
    }

    pub(super) fn is_tracking(&self, call_id: &str) -> bool {
        self.workers.contains_key(call_id)
    }
}
