use intersection_scheduler::config::SchedulerConfig;
use intersection_scheduler::control_system::observers::{spawn_amqp_publisher, WatchObserver};
use intersection_scheduler::control_system::policy::SchedulingPolicy;
use intersection_scheduler::control_system::scheduler::Scheduler;
use intersection_scheduler::monitoring::dashboard::run_text_dashboard;
use intersection_scheduler::simulation_engine::arrivals::{listen_vehicle_arrivals, run_demo_arrivals};
use intersection_scheduler::simulation_engine::queues::MovementQueueStore;
use log::{error, info};
use std::path::Path;
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    env_logger::init();

    // Optional first argument: path to a JSON config file.
    let config = match std::env::args().nth(1) {
        Some(path) => match SchedulerConfig::load(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load config {}: {}", path, e);
                process::exit(2);
            }
        },
        None => SchedulerConfig::default(),
    };

    let policy = match SchedulingPolicy::from_config(&config) {
        Ok(policy) => policy,
        Err(e) => {
            error!("Invalid scheduler config: {}", e);
            process::exit(2);
        }
    };
    info!("Starting the {} traffic scheduler.", policy.name());

    let store = Arc::new(MovementQueueStore::new());
    let watch_observer = Arc::new(WatchObserver::new());
    tokio::spawn(run_text_dashboard(
        watch_observer.subscribe_lengths(),
        watch_observer.subscribe_signal(),
    ));

    let mut scheduler = Scheduler::new(Arc::clone(&store), policy).with_observer(watch_observer);

    if config.publish_updates {
        let (amqp_observer, publisher) = spawn_amqp_publisher(config.amqp_url.clone());
        scheduler = scheduler.with_observer(Arc::new(amqp_observer));
        tokio::spawn(async move {
            match publisher.await {
                Ok(Err(e)) => error!("Update publisher stopped: {}", e),
                Err(e) => error!("Update publisher panicked: {}", e),
                Ok(Ok(())) => info!("Update publisher finished."),
            }
        });
    }

    if config.demo_arrivals {
        tokio::spawn(run_demo_arrivals(Arc::clone(&store)));
    } else {
        let arrival_store = Arc::clone(&store);
        let amqp_url = config.amqp_url.clone();
        tokio::spawn(async move {
            if let Err(e) = listen_vehicle_arrivals(arrival_store, amqp_url).await {
                error!("Error in vehicle arrivals listener: {}", e);
            }
        });
    }

    if let Err(e) = scheduler.run().await {
        error!("Scheduler stopped: {}", e);
        process::exit(1);
    }
}
