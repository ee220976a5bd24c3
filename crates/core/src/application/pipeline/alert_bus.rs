// Alert Bus
//
// Fan-out sink: keeps a bounded history for polling clients, broadcasts
// live alerts to subscribers, and forwards to downstream sinks.

use super::constants::{ALERT_CHANNEL_CAPACITY, ALERT_HISTORY_CAPACITY};
use crate::domain::Alert;
use crate::port::AlertSink;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

pub struct AlertBus {
    history: Mutex<VecDeque<Alert>>,
    capacity: usize,
    tx: broadcast::Sender<Alert>,
    downstream: Vec<Arc<dyn AlertSink>>,
}

impl Default for AlertBus {
    fn default() -> Self {
        Self::new(ALERT_HISTORY_CAPACITY)
    }
}

impl AlertBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);
        Self {
            history: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            tx,
            downstream: Vec::new(),
        }
    }

    /// Forward every alert to `sink` as well
    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.downstream.push(sink);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.tx.subscribe()
    }

    /// Up to `limit` most recent alerts, oldest first
    pub fn recent(&self, limit: usize) -> Vec<Alert> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertSink for AlertBus {
    fn emit(&self, alert: Alert) {
        {
            let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
            if self.capacity > 0 && history.len() == self.capacity {
                history.pop_front();
            }
            if self.capacity > 0 {
                history.push_back(alert.clone());
            }
        }

        // No subscribers is fine
        let _ = self.tx.send(alert.clone());

        for sink in &self.downstream {
            sink.emit(alert.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;

    fn alert(n: i64) -> Alert {
        Alert::new(Severity::Error, format!("alert {}", n), n)
    }

    #[test]
    fn test_history_is_bounded() {
        let bus = AlertBus::new(3);
        for n in 0..5 {
            bus.emit(alert(n));
        }
        let recent = bus.recent(10);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].timestamp, 2);
        assert_eq!(recent[2].timestamp, 4);
        assert_eq!(bus.recent(1)[0].timestamp, 4);
    }

    #[tokio::test]
    async fn test_subscribers_receive_live_alerts() {
        let bus = AlertBus::default();
        let mut rx = bus.subscribe();
        bus.emit(alert(7).for_job("job-7"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.job_id.as_deref(), Some("job-7"));
    }

    #[test]
    fn test_forwards_downstream() {
        let inner = Arc::new(AlertBus::new(10));
        let bus = AlertBus::new(10).with_sink(inner.clone());
        bus.emit(alert(1));
        assert_eq!(inner.len(), 1);
    }
}
