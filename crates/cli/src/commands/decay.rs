//! `recall decay`: evaluate a decaying value.

use recall_config::AppConfig;
use recall_core::decay::{ValueClass, decay};

pub fn run(
    config: &AppConfig,
    value: f64,
    elapsed_hours: f64,
    half_life_hours: Option<f64>,
    class: ValueClass,
) {
    let half_life_secs = half_life_secs(config, half_life_hours, class);
    let decayed = decay(value, elapsed_hours * 3600.0, half_life_secs);
    println!("{decayed:.6}");
}

/// Explicit half-life wins over the configured one for `class`.
pub(crate) fn half_life_secs(
    config: &AppConfig,
    half_life_hours: Option<f64>,
    class: ValueClass,
) -> f64 {
    match half_life_hours {
        Some(hours) => hours * 3600.0,
        None => config.decay.half_life_secs(class),
    }
}
