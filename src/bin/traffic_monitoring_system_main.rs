use intersection_scheduler::global_variables::AMQP_URL;
use intersection_scheduler::monitoring::traffic_monitoring_system::{
    listen_queue_lengths, listen_signal_changes, run_cli,
};
use tokio::join;

#[tokio::main]
async fn main() {
    env_logger::init();

    // Record both scheduler feeds while the admin CLI runs.
    let queue_lengths_listener = tokio::spawn(async {
        if let Err(e) = listen_queue_lengths(AMQP_URL.to_string()).await {
            eprintln!("Error in queue lengths listener: {}", e);
        }
    });
    let signal_changes_listener = tokio::spawn(async {
        if let Err(e) = listen_signal_changes(AMQP_URL.to_string()).await {
            eprintln!("Error in signal changes listener: {}", e);
        }
    });

    let cli_handle = tokio::spawn(async {
        run_cli().await;
    });

    // The CLI exits on its own; the listeners are dropped with the runtime.
    let _ = cli_handle.await;
    queue_lengths_listener.abort();
    signal_changes_listener.abort();
    let _ = join!(queue_lengths_listener, signal_changes_listener);
}
