// arrivals.rs
//
// Turns arrival reports into queue insertions, and produces random reports
// for load generation.

use crate::global_variables::{
    MAX_ARRIVAL_GAP_SECS, MAX_ARRIVAL_WEIGHT, QUEUE_VEHICLE_ARRIVALS, ROAD_COUNT,
};
use crate::shared_data::{ArrivalReport, VehicleId};
use crate::simulation_engine::queues::MovementQueueStore;
use crate::simulation_engine::vehicles::VehicleRecord;

use amiquip::{
    Connection, ConsumerMessage, ConsumerOptions, Exchange, Publish, QueueDeclareOptions,
    Result as AmiquipResult,
};
use log::{debug, error, info, warn};
use rand::Rng;
use std::error::Error;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Stamps the report with its arrival time and hands it to the store.
/// The result is the store's success flag; nothing is retried.
pub fn register_arrival(store: &MovementQueueStore, report: ArrivalReport) -> bool {
    let record = VehicleRecord::from_report(report);
    let id = record.id.clone();
    let accepted = store.insert(record);
    if !accepted {
        warn!("Arrival of vehicle {} was rejected.", id);
    }
    accepted
}

/// Decodes one delivery body and registers it. Malformed bodies are dropped.
pub fn handle_arrival_message(store: &MovementQueueStore, body: &[u8]) -> bool {
    match serde_json::from_slice::<ArrivalReport>(body) {
        Ok(report) => {
            debug!(
                "Arrival: id:{}, from:{}, to:{}, weight:{}",
                report.id, report.from_road, report.to_road, report.weight
            );
            register_arrival(store, report)
        }
        Err(e) => {
            warn!(
                "Discarding malformed arrival report {:?}: {}",
                String::from_utf8_lossy(body),
                e
            );
            false
        }
    }
}

/// Consumes the `vehicle_arrivals` queue until the connection ends.
pub async fn listen_vehicle_arrivals(
    store: Arc<MovementQueueStore>,
    amqp_url: String,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    tokio::task::spawn_blocking(move || -> AmiquipResult<()> {
        let mut connection = Connection::insecure_open(&amqp_url)?;
        let channel = connection.open_channel(None)?;
        let queue = channel.queue_declare(QUEUE_VEHICLE_ARRIVALS, QueueDeclareOptions::default())?;
        let consumer = queue.consume(ConsumerOptions::default())?;
        info!("Waiting for vehicle arrivals on '{}'...", QUEUE_VEHICLE_ARRIVALS);
        for message in consumer.receiver() {
            match message {
                ConsumerMessage::Delivery(delivery) => {
                    handle_arrival_message(&store, &delivery.body);
                    consumer.ack(delivery)?;
                }
                other => {
                    info!("Arrival consumer ended: {:?}", other);
                    break;
                }
            }
        }
        connection.close()
    })
    .await??;
    Ok(())
}

/// A random report with distinct roads in `0..4`.
pub fn random_report<R: Rng + ?Sized>(rng: &mut R, id: u64) -> ArrivalReport {
    let from_road = rng.random_range(0..ROAD_COUNT);
    let mut to_road = rng.random_range(0..ROAD_COUNT);
    if to_road == from_road {
        to_road = (to_road + 1) % ROAD_COUNT;
    }
    ArrivalReport {
        id: VehicleId::Number(id),
        from_road,
        to_road,
        weight: rng.random_range(0..=MAX_ARRIVAL_WEIGHT),
    }
}

fn random_gap<R: Rng + ?Sized>(rng: &mut R) -> Duration {
    Duration::from_secs_f64(rng.random_range(0.0..MAX_ARRIVAL_GAP_SECS))
}

/// Publishes random arrival reports forever.
pub fn publish_random_arrivals(amqp_url: &str) -> AmiquipResult<()> {
    let mut connection = Connection::insecure_open(amqp_url)?;
    let channel = connection.open_channel(None)?;
    let exchange = Exchange::direct(&channel);
    channel.queue_declare(QUEUE_VEHICLE_ARRIVALS, QueueDeclareOptions::default())?;

    let mut rng = rand::rng();
    let mut next_id = 1;
    loop {
        let report = random_report(&mut rng, next_id);
        next_id += 1;
        match serde_json::to_vec(&report) {
            Ok(payload) => {
                exchange.publish(Publish::new(&payload, QUEUE_VEHICLE_ARRIVALS))?;
                info!(
                    "post: id:{}, from:{}, to:{}, weight:{}",
                    report.id, report.from_road, report.to_road, report.weight
                );
            }
            Err(e) => error!("Failed to serialize arrival report: {}", e),
        }
        std::thread::sleep(random_gap(&mut rng));
    }
}

/// Feeds random arrivals straight into the store, without a broker.
pub async fn run_demo_arrivals(store: Arc<MovementQueueStore>) {
    let mut next_id = 1;
    loop {
        let (report, gap) = {
            let mut rng = rand::rng();
            (random_report(&mut rng, next_id), random_gap(&mut rng))
        };
        next_id += 1;
        register_arrival(&store, report);
        sleep(gap).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn register_arrival_queues_classified_vehicle() {
        let store = MovementQueueStore::new();
        let report = ArrivalReport {
            id: VehicleId::Text("a".into()),
            from_road: 3,
            to_road: 1,
            weight: 0,
        };
        assert!(register_arrival(&store, report));
        assert_eq!(store.sizes().unwrap()[6], 1);
    }

    #[test]
    fn malformed_message_is_dropped() {
        let store = MovementQueueStore::new();
        assert!(!handle_arrival_message(&store, b"not json"));
        assert!(handle_arrival_message(
            &store,
            br#"{"id": 5, "from_road": 2, "to_road": 0, "weight": 1}"#
        ));
        assert_eq!(store.sizes().unwrap(), [0, 0, 0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn random_reports_use_distinct_valid_roads() {
        let mut rng = SmallRng::seed_from_u64(7);
        for id in 0..500 {
            let report = random_report(&mut rng, id);
            assert!(report.from_road < ROAD_COUNT);
            assert!(report.to_road < ROAD_COUNT);
            assert_ne!(report.from_road, report.to_road);
            assert!((0..=MAX_ARRIVAL_WEIGHT).contains(&report.weight));
            assert_eq!(report.id, VehicleId::Number(id));
        }
    }
}
