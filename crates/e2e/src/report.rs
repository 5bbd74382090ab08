//! Run summary output

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};

use crate::error::E2eResult;
use crate::runner::{CaseResult, RunReport};
use crate::suite::CaseStatus;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// One line per case
    Plain,
}

fn status_label(status: CaseStatus) -> &'static str {
    match status {
        CaseStatus::Passed => "✓ passed",
        CaseStatus::Failed => "✗ failed",
        CaseStatus::Skipped => "- skipped",
        CaseStatus::Pending => "pending",
        CaseStatus::Running => "running",
    }
}

fn failure_cell(case: &CaseResult) -> String {
    match (&case.failure, case.status) {
        (Some(f), CaseStatus::Failed) => format!("[{}] {}", f.kind, f.message),
        (Some(f), CaseStatus::Skipped) => f.message.clone(),
        _ => String::new(),
    }
}

/// Render the report in `format`
pub fn render_summary(report: &RunReport, format: OutputFormat) -> E2eResult<String> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Yaml => serde_yaml::to_string(report)?,
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Suite", "Case", "Status", "Duration", "Failure"]);

            for suite in &report.suites {
                for case in &suite.cases {
                    table.add_row(vec![
                        suite.name.clone(),
                        case.name.clone(),
                        status_label(case.status).to_string(),
                        format!("{} ms", case.duration_ms),
                        failure_cell(case),
                    ]);
                }
                if let Some(error) = &suite.error {
                    table.add_row(vec![
                        suite.name.clone(),
                        format!("<{}>", error.phase),
                        "✗ failed".to_string(),
                        String::new(),
                        format!("[{}] {}", error.kind, error.message),
                    ]);
                }
            }

            format!("{table}\n{}", totals_line(report))
        }
        OutputFormat::Plain => {
            let mut out = String::new();
            for suite in &report.suites {
                for case in &suite.cases {
                    out.push_str(&format!(
                        "{}::{} {} ({} ms)",
                        suite.name,
                        case.name,
                        status_label(case.status),
                        case.duration_ms
                    ));
                    let failure = failure_cell(case);
                    if !failure.is_empty() {
                        out.push_str(&format!(" - {}", failure));
                    }
                    out.push('\n');
                }
            }
            out.push_str(&totals_line(report));
            out
        }
    };
    Ok(rendered)
}

fn totals_line(report: &RunReport) -> String {
    format!(
        "{} passed, {} failed, {} skipped ({} ms)",
        report.passed, report.failed, report.skipped, report.duration_ms
    )
}

/// Print the report to stdout
pub fn print_summary(report: &RunReport, format: OutputFormat) -> E2eResult<()> {
    println!("{}", render_summary(report, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{FailureRecord, SuiteResult};
    use chrono::Utc;

    fn report() -> RunReport {
        let case = |name: &str, status, failure: Option<FailureRecord>| CaseResult {
            suite: "authentication".into(),
            name: name.into(),
            description: None,
            priority: 1,
            status,
            duration_ms: 5,
            failure,
            artifacts: Vec::new(),
        };
        RunReport {
            started_at: Utc::now(),
            total: 2,
            passed: 1,
            failed: 1,
            skipped: 0,
            duration_ms: 10,
            suites: vec![SuiteResult {
                name: "authentication".into(),
                total: 2,
                passed: 1,
                failed: 1,
                skipped: 0,
                duration_ms: 10,
                error: None,
                cases: vec![
                    case("valid_login", CaseStatus::Passed, None),
                    case(
                        "invalid_credentials[0]",
                        CaseStatus::Failed,
                        Some(FailureRecord {
                            kind: "assertion".into(),
                            phase: "body".into(),
                            message: "Expected 401".into(),
                            expected: Some("401".into()),
                            actual: Some("200".into()),
                        }),
                    ),
                ],
            }],
        }
    }

    #[test]
    fn table_lists_every_case_and_totals() {
        let out = render_summary(&report(), OutputFormat::Table).unwrap();
        assert!(out.contains("valid_login"));
        assert!(out.contains("[assertion] Expected 401"));
        assert!(out.ends_with("1 passed, 1 failed, 0 skipped (10 ms)"));
    }

    #[test]
    fn plain_has_one_line_per_case() {
        let out = render_summary(&report(), OutputFormat::Plain).unwrap();
        assert_eq!(out.lines().count(), 3);
        assert!(out.starts_with("authentication::valid_login ✓ passed"));
    }

    #[test]
    fn structured_formats_carry_failures() {
        let json = render_summary(&report(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["suites"][0]["cases"][1]["status"], "failed");
        assert_eq!(value["suites"][0]["cases"][1]["failure"]["actual"], "200");

        let yaml = render_summary(&report(), OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("kind: assertion"));
    }
}
