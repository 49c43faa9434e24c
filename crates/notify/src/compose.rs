//! Alert text composition.
//!
//! One place builds the subject/body/speech for every channel so the wire
//! format stays consistent across voice, SMS and the system log.

use crate::Alert;

/// Rendered notification text.
#[derive(Debug, Clone)]
pub struct AlertText {
    pub subject: String,
    pub body: String,
    /// Plain-words variant for voice/TTS providers.
    pub speech: String,
}

/// Compose the outbound text for one monitor's statuses.
pub fn compose(monitor: &str, alerts: &[Alert]) -> AlertText {
    let breached: Vec<&Alert> = alerts.iter().filter(|a| a.breach).collect();
    let tag = monitor.to_ascii_uppercase();

    if breached.is_empty() {
        let subject = format!("[{tag}] {} statuses OK", alerts.len());
        let body = alerts
            .iter()
            .map(|a| line(a))
            .collect::<Vec<_>>()
            .join("\n");
        let speech = format!("{monitor} monitor. All {} statuses OK.", alerts.len());
        return AlertText {
            subject,
            body,
            speech,
        };
    }

    let first = breached[0];
    let mut subject = format!("[{tag}] {} BREACH", first.label);
    if breached.len() > 1 {
        subject.push_str(&format!(" (+{} more)", breached.len() - 1));
    }
    let body = breached
        .iter()
        .map(|a| line(a))
        .collect::<Vec<_>>()
        .join("\n");
    let speech = match (first.value, first.threshold.as_deref()) {
        (Some(value), Some(threshold)) => format!(
            "{monitor} alert. {} breached. Value {} {} versus threshold {}.",
            first.label,
            num(value),
            spoken_unit(&first.unit),
            threshold
        ),
        _ => format!("{monitor} alert. {} breached.", first.label),
    };
    AlertText {
        subject,
        body,
        speech,
    }
}

fn line(alert: &Alert) -> String {
    let value = alert
        .value
        .map(|v| format!("{}{}", num(v), alert.unit))
        .unwrap_or_else(|| "n/a".to_string());
    let threshold = alert.threshold.as_deref().unwrap_or("n/a");
    format!(
        "{}: value={} threshold={} source={}",
        alert.label, value, threshold, alert.source
    )
}

fn num(v: f64) -> String {
    let rendered = format!("{v:.2}");
    rendered
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

fn spoken_unit(unit: &str) -> &str {
    match unit {
        "%" => "percent",
        "$" => "dollars",
        other => other,
    }
}
