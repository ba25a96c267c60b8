//! ==============================================================================
//! dashboard.rs - server-rendered dashboard page
//! ==============================================================================
//!
//! one card per metric: current value, ideal target and the span of the
//! history kept for it. chart drawing is left to whatever consumes
//! /api/history.
//!
//! ==============================================================================

use crate::domain::Metric;
use crate::history::RetentionPolicy;
use crate::poller::DashboardView;

use chrono::{DateTime, Local, Utc};
use std::fmt::Write;

pub fn render(view: &DashboardView) -> String {
    let current = view.current();

    let mut cards = String::new();
    for metric in Metric::ALL {
        let unit = metric.unit();
        let span = match view.history.time_range(metric) {
            Some((oldest, newest)) => {
                format!("{} &ndash; {}", clock_label(oldest), clock_label(newest))
            }
            None => "no data yet".to_string(),
        };
        let _ = write!(
            cards,
            r#"
    <div class="factor-card">
        <div class="factor-name">{name}</div>
        <div class="factor-values">
            <span class="current-value">{value:.1}{unit}</span>
            <span class="ideal-value">Ideal: {ideal}{unit}</span>
        </div>
        <div class="factor-history">{points} points, {span}</div>
    </div>"#,
            name = html_escape(metric.display_name()),
            value = current.value(metric),
            ideal = current.ideal(metric),
            unit = html_escape(unit),
            points = view.history.len(metric),
            span = span,
        );
    }

    let notice = match &view.notice {
        Some(msg) => format!(
            r#"
    <div class="error-notification">
        <p class="error-title">Note</p>
        <p>{}</p>
    </div>"#,
            html_escape(msg)
        ),
        None => String::new(),
    };

    let retention = match view.history.policy() {
        RetentionPolicy::FixedWindow { max_points } => format!("last {} points", max_points),
        RetentionPolicy::AgeTiered => "age-tiered, 10 minutes".to_string(),
    };

    format!(
        r#"<!doctype html>
<html>
<head>
    <meta charset="utf-8">
    <meta http-equiv="refresh" content="2">
    <title>Plant Environment Dashboard</title>
</head>
<body style="font-family: system-ui; padding: 2rem;">
    <h1 class="dashboard-title">Plant Environment Dashboard</h1>{notice}
    <div class="factors-grid">{cards}
    </div>
    <p style="color: #888;">history: {retention}</p>
</body>
</html>"#,
        notice = notice,
        cards = cards,
        retention = html_escape(&retention),
    )
}

/// local wall-clock time for a unix ms timestamp
fn clock_label(ms: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms as i64)
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "?".to_string())
}

/// escape html special characters to prevent xss
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SensorSnapshot;
    use crate::history::HistoryBuffer;

    fn view() -> DashboardView {
        DashboardView::new(HistoryBuffer::new(RetentionPolicy::default()))
    }

    #[test]
    fn test_placeholder_cards() {
        let html = render(&view());
        assert!(html.contains("Soil Temp"));
        assert!(html.contains("25.0°C"));
        assert!(html.contains("Ideal: 65%"));
        assert!(html.contains("no data yet"));
        assert!(!html.contains("error-notification"));
    }

    #[test]
    fn test_latest_values_and_notice() {
        let mut view = view();
        let snapshot = SensorSnapshot {
            air_temp: 18.25,
            ..SensorSnapshot::PLACEHOLDER
        };
        view.apply(1, Ok(snapshot), 1_700_000_000_000);
        view.notice = Some("<b>down</b>".to_string());

        let html = render(&view);
        assert!(html.contains("18.2°C") || html.contains("18.3°C"));
        assert!(html.contains("1 points"));
        assert!(html.contains("&lt;b&gt;down&lt;/b&gt;"));
        assert!(!html.contains("<b>down</b>"));
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape(r#"a<b>&"c""#), "a&lt;b&gt;&amp;&quot;c&quot;");
    }
}
