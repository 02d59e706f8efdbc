//! Markdown status text for the `/status` command and post-action summaries.

use fleet_telemetry::VehicleSnapshot;

const NOT_AVAILABLE: &str = "N/A";
const BAR_TO_PSI: f64 = 14.5;

/// One block per vehicle, in store order, separated by a blank line.
pub fn render_full_status(snapshots: &[VehicleSnapshot]) -> String {
    if snapshots.is_empty() {
        return "No vehicle status recorded yet.".to_string();
    }
    snapshots
        .iter()
        .map(render_vehicle_block)
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn render_vehicle_block(snapshot: &VehicleSnapshot) -> String {
    let mut lines = vec![format!("🚗 *{}*", snapshot.label)];
    lines.extend(core_lines(snapshot));
    lines.push(format!(
        "🧑‍💻 Software: {}",
        snapshot.software_version.as_deref().unwrap_or(NOT_AVAILABLE)
    ));
    lines.push(format!(
        "🛞 Tire Pressure (psi): {}",
        format_tire_pressure(snapshot)
    ));
    lines.push(format!(
        "🚪 Doors: {}",
        summarize_open(&snapshot.doors.positions())
    ));
    lines.push(format!(
        "🪟 Windows: {}",
        summarize_open(&snapshot.windows.positions())
    ));
    lines.push(format!(
        "🧭 Heading: {}",
        snapshot
            .heading
            .map(|heading| format!("{heading}°"))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    ));
    if !snapshot.notifications.is_empty() {
        lines.push(format!("⚠️ Alerts: {}", snapshot.notifications.join(", ")));
    }
    lines.push(format!("📍 {}", or_not_available(&snapshot.address)));
    lines.push(format!("🕒 {}", or_not_available(&snapshot.timestamp)));
    if let Some(position) = snapshot.coordinates() {
        lines.push(format!(
            "[Google Maps](https://maps.google.com/?q={},{})",
            position.lat, position.lon
        ));
    }
    lines.join("\n")
}

/// Compact status sent after a vehicle action.
pub fn render_short_status(snapshot: &VehicleSnapshot) -> String {
    let mut lines = vec![format!("Status for {}:", snapshot.label)];
    lines.extend(core_lines(snapshot));
    lines.join("\n")
}

fn core_lines(snapshot: &VehicleSnapshot) -> [String; 4] {
    [
        format!(
            "🔋 Battery: {}   |   Odometer: {} mi",
            snapshot
                .battery
                .map(|battery| format!("{battery}%"))
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            format_odometer(snapshot.odometer)
        ),
        format!(
            "⚡ Charging: {} ({} kW)",
            snapshot.charging_state.as_deref().unwrap_or(NOT_AVAILABLE),
            snapshot
                .charger_power
                .map(|power| power.to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string())
        ),
        format!(
            "🌡️ Inside: {}   |   Outside: {}",
            format_temperature(snapshot.inside_temp),
            format_temperature(snapshot.outside_temp)
        ),
        format!(
            "🔒 Locked: {}   |   Sentry: {}",
            format_flag(snapshot.locked),
            format_flag(snapshot.sentry_mode)
        ),
    ]
}

fn or_not_available(value: &str) -> &str {
    if value.trim().is_empty() {
        NOT_AVAILABLE
    } else {
        value
    }
}

pub fn format_flag(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "Yes",
        Some(false) => "No",
        None => NOT_AVAILABLE,
    }
}

pub fn format_temperature(value: Option<f64>) -> String {
    match value.filter(|raw| raw.is_finite()) {
        Some(raw) => format!("{}°", raw.round() as i64),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Rounded miles with thousands separators, e.g. `12,346`.
pub fn format_odometer(value: Option<f64>) -> String {
    let Some(raw) = value.filter(|raw| raw.is_finite()) else {
        return NOT_AVAILABLE.to_string();
    };
    let rounded = raw.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        grouped.insert(0, '-');
    }
    grouped
}

/// `FL 42 | FR 42 | RL N/A | RR 43`, or `N/A` when no position reports a value.
pub fn format_tire_pressure(snapshot: &VehicleSnapshot) -> String {
    let readings = snapshot
        .tire_pressure
        .positions()
        .map(|(key, bar)| {
            let psi = bar
                .filter(|bar| bar.is_finite() && *bar > 0.0)
                .map(|bar| (bar * BAR_TO_PSI).round() as i64);
            (key, psi)
        });
    if readings.iter().all(|(_, psi)| psi.is_none()) {
        return NOT_AVAILABLE.to_string();
    }
    readings
        .iter()
        .map(|(key, psi)| match psi {
            Some(psi) => format!("{key} {psi}"),
            None => format!("{key} {NOT_AVAILABLE}"),
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// `All Closed`, or the open position keys followed by `Open`.
pub fn summarize_open(positions: &[(&'static str, Option<bool>); 4]) -> String {
    let open = positions
        .iter()
        .filter(|(_, state)| *state == Some(true))
        .map(|(key, _)| *key)
        .collect::<Vec<_>>();
    if open.is_empty() {
        "All Closed".to_string()
    } else {
        format!("{} Open", open.join(", "))
    }
}
