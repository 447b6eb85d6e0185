//! Run summary formatting

use cohortml::cohort::CohortStats;
use cohortml::evaluation::EvaluationReport;
use cohortml::pipeline::PipelineReport;
use colored::Colorize;
use std::path::Path;

/// Print a section header
pub(crate) fn section(title: &str) {
    println!("\n{}", format!("=== {title} ===").cyan().bold());
}

/// Print a key-value pair
pub(crate) fn kv(key: &str, value: impl std::fmt::Display) {
    println!("  {}: {}", key.white().bold(), value);
}

/// Print a success message
pub(crate) fn success(msg: &str) {
    println!("{} {}", "[PASS]".green().bold(), msg);
}

/// Print a warning message
pub(crate) fn warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}

/// One cohort as a table row.
pub(crate) fn cohort_row(c: &CohortStats) -> String {
    format!(
        "{:<10} {:>6} {:>10} {:>10} {:>14.2}",
        c.label,
        c.count,
        optional(c.mean),
        optional(c.median),
        c.value_generated
    )
}

/// Human-readable run summary.
pub(crate) fn print_report(report: &PipelineReport, outputs: &Path) {
    section("Split");
    kv("Train rows", report.train_rows);
    kv("Test rows", report.test_rows);
    kv("Fingerprint", &report.fingerprint[..16.min(report.fingerprint.len())]);

    section("Folds");
    for (fold, loss) in report.final_valid_losses.iter().enumerate() {
        let marker = if fold == report.model_selected { " (selected)" } else { "" };
        kv(&format!("Fold {fold}"), format!("valid loss {loss:.6}{marker}"));
    }

    section("Held-out evaluation");
    match &report.evaluation {
        EvaluationReport::Classification { models } => {
            for m in models {
                kv(&format!("Model {}", m.model), format!("accuracy {:.4}", m.accuracy));
            }
        }
        EvaluationReport::Regression { models } => {
            for m in models {
                kv(
                    &format!("Model {}", m.model),
                    format!("mse {:.6}  mae {:.6}", m.mse, m.mae),
                );
            }
        }
    }

    section("Attribution");
    kv("Max additivity error", format!("{:.2e}", report.max_additivity_error));

    section("Cohorts");
    println!(
        "  {:<10} {:>6} {:>10} {:>10} {:>14}",
        "cohort", "users", "mean", "median", "value"
    );
    for c in &report.cohorts {
        println!("  {}", cohort_row(c));
    }
    kv("Scored users", report.scored_entities);

    section("Artifacts");
    for path in &report.artifacts {
        let shown = path.strip_prefix(outputs).unwrap_or(path);
        println!("  {}", shown.display());
    }

    if report.zkml_compiled {
        success("circuit compiled");
    } else {
        warning("circuit compilation skipped");
    }
}

/// Machine-readable run summary.
pub(crate) fn report_json(report: &PipelineReport) -> serde_json::Value {
    serde_json::json!({
        "train_rows": report.train_rows,
        "test_rows": report.test_rows,
        "fingerprint": report.fingerprint,
        "final_valid_losses": report.final_valid_losses,
        "model_selected": report.model_selected,
        "evaluation": report.evaluation,
        "max_additivity_error": report.max_additivity_error,
        "user_groups": report.cohorts,
        "scored_entities": report.scored_entities,
        "zkml_compiled": report.zkml_compiled,
        "artifacts": report.artifacts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cohort_row_marks_missing_statistics() {
        let c = CohortStats {
            label: "100+".to_string(),
            lower: 100.0,
            higher: 1e10,
            count: 0,
            mean: None,
            median: None,
            pct25: None,
            pct75: None,
            pct10: None,
            pct90: None,
            value_generated: 0.0,
            value_generated_mean: None,
            value_generated_median: None,
        };
        let row = cohort_row(&c);
        assert!(row.starts_with("100+"));
        assert!(row.contains(" - "));
    }
}
