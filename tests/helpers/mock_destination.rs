#![allow(dead_code)]
use alertrelay::core::{Alert, DeliveryError, Destination};
use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;
use tokio::sync::Notify;

/// A mock destination that counts and remembers the alerts it received.
#[derive(Clone, Debug)]
pub struct CountingDestination {
    name: String,
    pub count: Arc<AtomicUsize>,
    pub received: Arc<Mutex<Vec<String>>>,
    pub notifier: Arc<Notify>,
}

impl CountingDestination {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            count: Arc::new(AtomicUsize::new(0)),
            received: Arc::new(Mutex::new(Vec::new())),
            notifier: Arc::new(Notify::new()),
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Alert names in the order they arrived.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    pub async fn wait_for_count(&self, target_count: usize, timeout_duration: Duration) {
        let wait_future = async {
            while self.count() < target_count {
                self.notifier.notified().await;
            }
        };

        tokio::time::timeout(timeout_duration, wait_future)
            .await
            .expect("Timed out waiting for alerts");
    }
}

#[async_trait]
impl Destination for CountingDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "counting_mock"
    }

    async fn send(&self, alert: &Alert) -> Result<(), DeliveryError> {
        self.received
            .lock()
            .unwrap()
            .push(alert.alert_name().unwrap_or_default().to_string());
        self.count.fetch_add(1, Ordering::SeqCst);
        self.notifier.notify_one();
        Ok(())
    }
}

/// A mock destination whose every delivery is rejected.
#[derive(Clone, Debug, Default)]
pub struct FailingDestination {
    pub attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl Destination for FailingDestination {
    fn name(&self) -> &str {
        "failing"
    }

    fn kind(&self) -> &'static str {
        "failing_mock"
    }

    async fn send(&self, _alert: &Alert) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(DeliveryError::UnexpectedStatus { status: 500 })
    }
}

/// A mock destination that panics on every alert.
#[derive(Clone, Debug, Default)]
pub struct PanickingDestination;

#[async_trait]
impl Destination for PanickingDestination {
    fn name(&self) -> &str {
        "panicking"
    }

    fn kind(&self) -> &'static str {
        "panicking_mock"
    }

    async fn send(&self, _alert: &Alert) -> Result<(), DeliveryError> {
        panic!("destination exploded");
    }
}

/// A mock destination that takes `delay` before accepting an alert.
#[derive(Clone, Debug)]
pub struct SlowDestination {
    pub delay: Duration,
    pub completed: Arc<AtomicUsize>,
}

impl SlowDestination {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            completed: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Destination for SlowDestination {
    fn name(&self) -> &str {
        "slow"
    }

    fn kind(&self) -> &'static str {
        "slow_mock"
    }

    async fn send(&self, _alert: &Alert) -> Result<(), DeliveryError> {
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
