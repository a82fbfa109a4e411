//! Text report generation

use crate::scenario::ScenarioReport;
use chrono::{DateTime, Local};
use std::io::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────";

/// Write every scenario report as plain text
pub fn write_txt<W: Write>(
    out: &mut W,
    reports: &[ScenarioReport],
    generated_at: DateTime<Local>,
) -> io::Result<()> {
    writeln!(out, "{}", RULE)?;
    writeln!(out, "  Active State Report")?;
    writeln!(out, "  Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "{}", RULE)?;

    for report in reports {
        writeln!(out)?;
        write_scenario(out, report)?;
    }
    Ok(())
}

fn write_scenario<W: Write>(out: &mut W, report: &ScenarioReport) -> io::Result<()> {
    writeln!(out, "Scenario: {} ({})", report.name, report.source.display())?;
    writeln!(out, "{}", THIN_RULE)?;

    for (index, step) in report.steps.iter().enumerate() {
        let state = if step.state.is_empty() {
            "(root)"
        } else {
            step.state.as_str()
        };
        if index == 0 {
            writeln!(out, "[initial] {}", state)?;
        } else {
            writeln!(out, "[step {}] {} {}", index, state, step.params)?;
        }

        for tracker in &step.trackers {
            let markers = if tracker.markers.is_empty() {
                "-".to_string()
            } else {
                tracker.markers.join(", ")
            };
            writeln!(
                out,
                "  {:<20} markers: {:<30} class: {:<30} renders: {}",
                tracker.id,
                markers,
                format!("{:?}", tracker.class_name.as_deref().unwrap_or("")),
                tracker.render_requests
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{StepReport, TrackerSnapshot};
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn report() -> ScenarioReport {
        ScenarioReport {
            name: "nav".into(),
            source: PathBuf::from("nav.toml"),
            steps: vec![
                StepReport {
                    state: String::new(),
                    params: "{}".into(),
                    trackers: vec![TrackerSnapshot {
                        id: "home".into(),
                        markers: vec![],
                        class_name: None,
                        render_requests: 1,
                    }],
                },
                StepReport {
                    state: "home".into(),
                    params: "{}".into(),
                    trackers: vec![TrackerSnapshot {
                        id: "home".into(),
                        markers: vec!["active".into()],
                        class_name: Some("item active".into()),
                        render_requests: 2,
                    }],
                },
            ],
        }
    }

    #[test]
    fn test_txt_report() {
        let generated_at = Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let mut out = Vec::new();
        write_txt(&mut out, &[report()], generated_at).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Generated: 2024-05-01 12:30:00"));
        assert!(text.contains("Scenario: nav (nav.toml)"));
        assert!(text.contains("[initial] (root)"));
        assert!(text.contains("[step 1] home {}"));
        assert!(text.contains("\"item active\""));
        assert!(text.contains("renders: 2"));
    }
}
