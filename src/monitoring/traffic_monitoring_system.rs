use crate::global_variables::{
    CHART_QUEUE_LENGTHS, CSV_QUEUE_LENGTHS, CSV_SIGNAL_CHANGES, MOVEMENT_CLASS_COUNT,
    QUEUE_QUEUE_LENGTHS, QUEUE_SIGNAL_CHANGES,
};
use crate::shared_data::{QueueLengthUpdate, SignalChange};
use crate::simulation_engine::movements::MovementClass;
use amiquip::{
    Connection, ConsumerMessage, ConsumerOptions, QueueDeclareOptions, Result as AmiquipResult,
};
use log::{error, info, warn};
use plotters::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::{File, OpenOptions};
use std::io::{stdin, stdout, Write};
use std::path::Path;

/// One CSV row per published length vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueLengthRecord {
    pub timestamp: u64,
    pub q0: usize,
    pub q1: usize,
    pub q2: usize,
    pub q3: usize,
    pub q4: usize,
    pub q5: usize,
    pub q6: usize,
    pub q7: usize,
}

impl QueueLengthRecord {
    pub fn lengths(&self) -> [usize; MOVEMENT_CLASS_COUNT] {
        [
            self.q0, self.q1, self.q2, self.q3, self.q4, self.q5, self.q6, self.q7,
        ]
    }
}

impl From<&QueueLengthUpdate> for QueueLengthRecord {
    fn from(update: &QueueLengthUpdate) -> Self {
        let [q0, q1, q2, q3, q4, q5, q6, q7] = update.lengths;
        Self {
            timestamp: update.timestamp,
            q0,
            q1,
            q2,
            q3,
            q4,
            q5,
            q6,
            q7,
        }
    }
}

/// One CSV row per signal change. `green` holds space-separated class indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalChangeRecord {
    pub timestamp: u64,
    pub green: String,
    pub yellow: bool,
}

impl SignalChangeRecord {
    pub fn green_classes(&self) -> Vec<MovementClass> {
        self.green
            .split_whitespace()
            .filter_map(|s| s.parse::<u8>().ok())
            .filter_map(MovementClass::new)
            .collect()
    }
}

impl From<&SignalChange> for SignalChangeRecord {
    fn from(change: &SignalChange) -> Self {
        Self {
            timestamp: change.timestamp,
            green: change
                .green
                .iter()
                .map(u8::to_string)
                .collect::<Vec<_>>()
                .join(" "),
            yellow: change.yellow,
        }
    }
}

/// Per-class backlog statistics over a recording.
#[derive(Debug, Clone, PartialEq)]
pub struct BacklogSummary {
    pub samples: usize,
    pub peak: [usize; MOVEMENT_CLASS_COUNT],
    pub mean: [f64; MOVEMENT_CLASS_COUNT],
}

pub fn summarize_backlog(records: &[QueueLengthRecord]) -> BacklogSummary {
    let mut peak = [0; MOVEMENT_CLASS_COUNT];
    let mut sum = [0usize; MOVEMENT_CLASS_COUNT];
    for record in records {
        for (i, len) in record.lengths().into_iter().enumerate() {
            peak[i] = peak[i].max(len);
            sum[i] += len;
        }
    }
    let samples = records.len();
    let mean = sum.map(|s| if samples == 0 { 0.0 } else { s as f64 / samples as f64 });
    BacklogSummary {
        samples,
        peak,
        mean,
    }
}

/// How many times each class was switched to green.
pub fn count_green_grants(records: &[SignalChangeRecord]) -> [usize; MOVEMENT_CLASS_COUNT] {
    let mut counts = [0; MOVEMENT_CLASS_COUNT];
    for record in records {
        for class in record.green_classes() {
            counts[class.index()] += 1;
        }
    }
    counts
}

/// Generic helper to append a record to a CSV file, writing headers on creation.
fn log_to_csv<T: Serialize>(filename: &str, record: &T) -> Result<(), Box<dyn Error>> {
    let file_exists = Path::new(filename).exists();
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(filename)?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);
    wtr.serialize(record)?;
    wtr.flush()?;
    Ok(())
}

fn read_csv<T: DeserializeOwned>(filename: &str) -> Result<Vec<T>, Box<dyn Error>> {
    let file = File::open(filename)?;
    let mut rdr = csv::Reader::from_reader(file);
    let mut records = Vec::new();
    for result in rdr.deserialize() {
        records.push(result?);
    }
    Ok(records)
}

pub fn log_queue_lengths(update: &QueueLengthUpdate) {
    if let Err(e) = log_to_csv(CSV_QUEUE_LENGTHS, &QueueLengthRecord::from(update)) {
        error!("Error logging queue lengths: {}", e);
    }
}

pub fn log_signal_change(change: &SignalChange) {
    if let Err(e) = log_to_csv(CSV_SIGNAL_CHANGES, &SignalChangeRecord::from(change)) {
        error!("Error logging signal change: {}", e);
    }
}

// Consumes one queue, decoding each JSON body as `T` and handing it to `record`.
fn consume_updates<T: DeserializeOwned>(
    amqp_url: &str,
    queue_name: &str,
    record: fn(&T),
) -> AmiquipResult<()> {
    let mut connection = Connection::insecure_open(amqp_url)?;
    let channel = connection.open_channel(None)?;
    let queue = channel.queue_declare(queue_name, QueueDeclareOptions::default())?;
    let consumer = queue.consume(ConsumerOptions::default())?;
    info!("Listening for {}...", queue_name);
    for message in consumer.receiver() {
        match message {
            ConsumerMessage::Delivery(delivery) => {
                match serde_json::from_slice::<T>(&delivery.body) {
                    Ok(update) => record(&update),
                    Err(e) => warn!("Skipping malformed message on {}: {}", queue_name, e),
                }
                consumer.ack(delivery)?;
            }
            other => {
                info!("{} consumer ended: {:?}", queue_name, other);
                break;
            }
        }
    }
    connection.close()
}

// Listens to the "queue_lengths" queue and logs each incoming update.
pub async fn listen_queue_lengths(amqp_url: String) -> Result<(), Box<dyn Error + Send + Sync>> {
    tokio::task::spawn_blocking(move || {
        consume_updates::<QueueLengthUpdate>(&amqp_url, QUEUE_QUEUE_LENGTHS, log_queue_lengths)
    })
    .await??;
    Ok(())
}

// Listens to the "signal_changes" queue and logs each incoming change.
pub async fn listen_signal_changes(amqp_url: String) -> Result<(), Box<dyn Error + Send + Sync>> {
    tokio::task::spawn_blocking(move || {
        consume_updates::<SignalChange>(&amqp_url, QUEUE_SIGNAL_CHANGES, log_signal_change)
    })
    .await??;
    Ok(())
}

// Reads and displays records from "queue_lengths.csv".
pub fn show_queue_lengths() -> Result<(), Box<dyn Error>> {
    let records: Vec<QueueLengthRecord> = read_csv(CSV_QUEUE_LENGTHS)?;
    println!("Queue Lengths:");
    for record in records {
        println!("{} {:?}", record.timestamp, record.lengths());
    }
    Ok(())
}

// Reads and displays records from "signal_changes.csv".
pub fn show_signal_changes() -> Result<(), Box<dyn Error>> {
    let records: Vec<SignalChangeRecord> = read_csv(CSV_SIGNAL_CHANGES)?;
    println!("Signal Changes:");
    for record in records {
        if record.yellow {
            println!("{} yellow", record.timestamp);
        } else {
            println!("{} green: [{}]", record.timestamp, record.green);
        }
    }
    Ok(())
}

pub fn generate_report_summary() -> Result<(), Box<dyn Error>> {
    println!("Generating Report Summary...");
    let lengths: Vec<QueueLengthRecord> = read_csv(CSV_QUEUE_LENGTHS)?;
    let signals: Vec<SignalChangeRecord> = read_csv(CSV_SIGNAL_CHANGES)?;
    let backlog = summarize_backlog(&lengths);
    let grants = count_green_grants(&signals);
    let yellows = signals.iter().filter(|s| s.yellow).count();

    println!("Queue length samples: {}", backlog.samples);
    println!("Signal changes: {} ({} yellow)", signals.len(), yellows);
    println!("{:<12} {:>6} {:>8} {:>7}", "queue", "peak", "mean", "greens");
    for class in MovementClass::ALL {
        let i = class.index();
        println!(
            "{:<12} {:>6} {:>8.2} {:>7}",
            class.to_string(),
            backlog.peak[i],
            backlog.mean[i],
            grants[i]
        );
    }
    Ok(())
}

/// Draws every class's backlog over time as a line chart.
pub fn plot_queue_lengths(records: &[QueueLengthRecord], path: &str) -> Result<(), Box<dyn Error>> {
    let start = match records.iter().map(|r| r.timestamp).min() {
        Some(start) => start,
        None => return Err("no queue length data to plot".into()),
    };
    let end = records.iter().map(|r| r.timestamp).max().unwrap_or(start);
    let x_max = ((end - start) as f64 / 1000.0).max(1.0);
    let y_max = records
        .iter()
        .flat_map(|r| r.lengths())
        .max()
        .unwrap_or(0)
        .max(1) as f64;

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Vehicles Waiting per Movement Queue", ("sans-serif", 20))
        .margin(40)
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d(0f64..x_max, 0f64..y_max)?;

    chart
        .configure_mesh()
        .x_desc("seconds")
        .y_desc("vehicles")
        .draw()?;

    for class in MovementClass::ALL {
        let color = Palette99::pick(class.index()).to_rgba();
        chart
            .draw_series(LineSeries::new(
                records.iter().map(|r| {
                    (
                        (r.timestamp - start) as f64 / 1000.0,
                        r.lengths()[class.index()] as f64,
                    )
                }),
                &color,
            ))?
            .label(format!("queue {}", class))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

pub fn show_queue_length_chart() -> Result<(), Box<dyn Error>> {
    let records: Vec<QueueLengthRecord> = read_csv(CSV_QUEUE_LENGTHS)?;
    plot_queue_lengths(&records, CHART_QUEUE_LENGTHS)?;
    println!("Queue length chart saved to {}", CHART_QUEUE_LENGTHS);
    Ok(())
}

fn prompt(text: &str) -> Result<String, Box<dyn Error>> {
    print!("{}", text);
    stdout().flush()?;
    let mut input = String::new();
    stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Provides a simple CLI for admin operations.
pub async fn run_cli() {
    loop {
        println!("\nIntersection Monitoring Admin CLI");
        println!("1. Display Queue Lengths");
        println!("2. Display Signal Changes");
        println!("3. Generate Report Summary");
        println!("4. Save Queue Length Chart");
        println!("5. Exit");
        let choice = match prompt("Enter your choice: ") {
            Ok(input) => input.parse::<u32>().unwrap_or(0),
            Err(e) => {
                error!("Failed to read input: {}", e);
                break;
            }
        };
        let result = match choice {
            1 => show_queue_lengths(),
            2 => show_signal_changes(),
            3 => generate_report_summary(),
            4 => show_queue_length_chart(),
            5 => {
                println!("Exiting CLI.");
                break;
            }
            _ => {
                println!("Invalid choice. Try again.");
                Ok(())
            }
        };
        if let Err(e) = result {
            eprintln!("Error: {}", e);
        }
    }
}
