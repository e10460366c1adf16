//! One-way notifications from the scheduler to whoever displays or records
//! the intersection. Observers must return immediately; the scheduler never
//! waits on them.

use crate::control_system::traffic_light_controller::SignalState;
use crate::global_variables::{MOVEMENT_CLASS_COUNT, QUEUE_QUEUE_LENGTHS, QUEUE_SIGNAL_CHANGES};
use crate::shared_data::{current_timestamp, QueueLengthUpdate, SignalChange};
use amiquip::{Connection, Exchange, Publish, QueueDeclareOptions, Result as AmiquipResult};
use log::{debug, error, info};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub trait TrafficObserver: Send + Sync {
    /// Backlog per movement class after it changed.
    fn on_queue_lengths(&self, lengths: [usize; MOVEMENT_CLASS_COUNT]);
    /// The signal heads changed.
    fn on_signal(&self, signal: &SignalState);
}

/// Keeps the latest lengths and signal in `watch` channels. Readers see the
/// newest value and may skip intermediate ones.
pub struct WatchObserver {
    lengths: watch::Sender<[usize; MOVEMENT_CLASS_COUNT]>,
    signal: watch::Sender<SignalState>,
}

impl Default for WatchObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchObserver {
    pub fn new() -> Self {
        let (lengths, _) = watch::channel([0; MOVEMENT_CLASS_COUNT]);
        let (signal, _) = watch::channel(SignalState::AllRed);
        Self { lengths, signal }
    }

    pub fn subscribe_lengths(&self) -> watch::Receiver<[usize; MOVEMENT_CLASS_COUNT]> {
        self.lengths.subscribe()
    }

    pub fn subscribe_signal(&self) -> watch::Receiver<SignalState> {
        self.signal.subscribe()
    }
}

impl TrafficObserver for WatchObserver {
    fn on_queue_lengths(&self, lengths: [usize; MOVEMENT_CLASS_COUNT]) {
        self.lengths.send_replace(lengths);
    }

    fn on_signal(&self, signal: &SignalState) {
        self.signal.send_replace(signal.clone());
    }
}

#[derive(Debug)]
enum ObserverEvent {
    Lengths(QueueLengthUpdate),
    Signal(SignalChange),
}

/// Forwards updates to a background RabbitMQ publisher.
pub struct AmqpObserver {
    tx: mpsc::UnboundedSender<ObserverEvent>,
}

impl AmqpObserver {
    fn forward(&self, event: ObserverEvent) {
        if let Err(e) = self.tx.send(event) {
            debug!("Publisher gone, dropping update: {:?}", e.0);
        }
    }
}

impl TrafficObserver for AmqpObserver {
    fn on_queue_lengths(&self, lengths: [usize; MOVEMENT_CLASS_COUNT]) {
        self.forward(ObserverEvent::Lengths(QueueLengthUpdate {
            timestamp: current_timestamp(),
            lengths,
        }));
    }

    fn on_signal(&self, signal: &SignalState) {
        self.forward(ObserverEvent::Signal(signal.to_change(current_timestamp())));
    }
}

/// Starts the publisher on a blocking thread and returns the observer feeding it.
/// The task ends when the observer is dropped or the broker connection fails.
pub fn spawn_amqp_publisher(amqp_url: String) -> (AmqpObserver, JoinHandle<AmiquipResult<()>>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = tokio::task::spawn_blocking(move || -> AmiquipResult<()> {
        let mut connection = Connection::insecure_open(&amqp_url)?;
        let channel = connection.open_channel(None)?;
        let exchange = Exchange::direct(&channel);
        channel.queue_declare(QUEUE_QUEUE_LENGTHS, QueueDeclareOptions::default())?;
        channel.queue_declare(QUEUE_SIGNAL_CHANGES, QueueDeclareOptions::default())?;
        info!("Publishing scheduler updates to RabbitMQ.");

        while let Some(event) = rx.blocking_recv() {
            let (routing_key, payload) = match &event {
                ObserverEvent::Lengths(update) => (QUEUE_QUEUE_LENGTHS, serde_json::to_vec(update)),
                ObserverEvent::Signal(change) => (QUEUE_SIGNAL_CHANGES, serde_json::to_vec(change)),
            };
            match payload {
                Ok(payload) => exchange.publish(Publish::new(&payload, routing_key))?,
                Err(e) => error!("Failed to serialize {:?}: {}", event, e),
            }
        }
        connection.close()
    });
    (AmqpObserver { tx }, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation_engine::movements::MovementClass;

    #[test]
    fn watch_observer_keeps_latest_values() {
        let observer = WatchObserver::new();
        let lengths = observer.subscribe_lengths();
        let signal = observer.subscribe_signal();
        assert_eq!(*signal.borrow(), SignalState::AllRed);

        observer.on_queue_lengths([1, 0, 0, 0, 0, 0, 0, 0]);
        observer.on_queue_lengths([2, 0, 0, 0, 0, 0, 0, 3]);
        observer.on_signal(&SignalState::Yellow);

        assert_eq!(*lengths.borrow(), [2, 0, 0, 0, 0, 0, 0, 3]);
        assert_eq!(*signal.borrow(), SignalState::Yellow);
    }

    #[test]
    fn watch_observer_works_without_subscribers() {
        let observer = WatchObserver::new();
        observer.on_signal(&SignalState::Green(vec![MovementClass::ALL[0]]));
        assert!(observer
            .subscribe_signal()
            .borrow()
            .is_green(MovementClass::ALL[0]));
    }

    #[test]
    fn amqp_observer_never_blocks_without_publisher() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let observer = AmqpObserver { tx };
        observer.on_queue_lengths([0; MOVEMENT_CLASS_COUNT]);
        observer.on_signal(&SignalState::AllRed);
    }
}
