use intersection_scheduler::global_variables::AMQP_URL;
use intersection_scheduler::simulation_engine::arrivals::publish_random_arrivals;

fn main() {
    env_logger::init();
    let amqp_url = std::env::args().nth(1).unwrap_or_else(|| AMQP_URL.to_string());
    println!("Publishing random vehicle arrivals to {}...", amqp_url);
    if let Err(e) = publish_random_arrivals(&amqp_url) {
        eprintln!("Arrival generator error: {}", e);
    }
}
