use crate::control_system::traffic_light_controller::SignalState;
use crate::global_variables::MOVEMENT_CLASS_COUNT;
use crate::simulation_engine::movements::MovementClass;
use log::info;
use tokio::sync::watch;

/// One line per refresh, e.g. `0G ### | 1R  | ...`.
pub fn render_lengths(lengths: &[usize; MOVEMENT_CLASS_COUNT], signal: &SignalState) -> String {
    MovementClass::ALL
        .iter()
        .map(|&class| {
            let light = match signal {
                SignalState::Yellow => 'Y',
                _ if signal.is_green(class) => 'G',
                _ => 'R',
            };
            format!(
                "{}{} {}",
                class.as_u8(),
                light,
                "#".repeat(lengths[class.index()])
            )
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Logs a bar line whenever the scheduler publishes new lengths. Ends when
/// the sending side is dropped.
pub async fn run_text_dashboard(
    mut lengths: watch::Receiver<[usize; MOVEMENT_CLASS_COUNT]>,
    signal: watch::Receiver<SignalState>,
) {
    while lengths.changed().await.is_ok() {
        let current = *lengths.borrow_and_update();
        let light = signal.borrow().clone();
        info!("{}", render_lengths(&current, &light));
    }
}
