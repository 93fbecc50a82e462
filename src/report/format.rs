//! Formatted terminal output.
//!
//! Formatting lives in one place so the engine stays free of presentation
//! concerns and output changes stay localized.

use std::fmt::Write as _;

use crate::app::pipeline::CategoryMetrics;
use crate::config::category_label;
use crate::data::SeriesRequest;
use crate::domain::{AiModel, ContributionReport, MetricRow, ReferenceRate};
use crate::error::MetricsError;
use crate::narrative::Narrative;

/// Header plus one summary line per loaded series.
pub fn format_run_summary(metrics: &[CategoryMetrics], request: &SeriesRequest, source: &str, window: usize) -> String {
    let mut out = String::new();

    out.push_str("=== cpi - CPI inflation metrics ===\n");
    out.push_str(&format!("Source: {source}\n"));
    out.push_str(&format!(
        "Range: {} .. {} | seasonal: {:?}\n\n",
        request.start.format("%Y-%m"),
        request.end.format("%Y-%m"),
        request.seasonal,
    ));

    let avg_header = format!("avg{window}m");
    out.push_str(
        format!(
            "{:<30} {:<3} {:<7} {:>9} {:>8} {:>8} {:>8} {:>7} {:>8} {:<14}",
            "category", "sa", "latest", "level", "mom", "yoy", "3m", "vol", avg_header, "trend"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<30} {:-<3} {:-<7} {:-<9} {:-<8} {:-<8} {:-<8} {:-<7} {:-<8} {:-<14}",
            "", "", "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for m in metrics {
        let label = truncate(category_label(&m.key.category_id), 30);
        let sa = if m.key.seasonally_adjusted { "SA" } else { "NSA" };
        let line = match &m.summary {
            Some(s) => format!(
                "{:<30} {:<3} {:<7} {:>9.3} {:>8} {:>8} {:>8} {:>7} {:>8} {:<14}",
                label,
                sa,
                s.latest_date.format("%Y-%m").to_string(),
                s.current_level,
                fmt_opt_pct(s.monthly_change),
                fmt_opt_pct(s.yearly_change),
                fmt_opt_pct(s.quarterly_change),
                s.volatility.map(|v| format!("{v:.2}")).unwrap_or_else(|| "n/a".into()),
                m.average_mom.as_ref().map(|v| fmt_pct(*v)).unwrap_or_else(|_| "n/a".into()),
                s.trend().map(|t| t.display_name()).unwrap_or("n/a"),
            ),
            None => format!("{label:<30} {sa:<3} (no data)"),
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

/// Per-date levels and changes for one series, optionally only the last `last_n` rows.
pub fn format_metrics_table(metrics: &CategoryMetrics, last_n: Option<usize>) -> String {
    let mut out = String::new();
    let sa = if metrics.key.seasonally_adjusted { "SA" } else { "NSA" };
    out.push_str(&format!("{} ({sa}):\n", category_label(&metrics.key.category_id)));
    out.push_str(&format!("{:<7} {:>9} {:>8} {:>8}\n", "date", "level", "mom", "yoy"));

    let skip = last_n.map_or(0, |n| metrics.table.len().saturating_sub(n));
    for row in metrics.table.iter().skip(skip) {
        out.push_str(&format_metric_row(row));
        out.push('\n');
    }
    out
}

fn format_metric_row(row: &MetricRow) -> String {
    format!(
        "{:<7} {:>9.3} {:>8} {:>8}",
        row.date.format("%Y-%m").to_string(),
        row.value,
        row.mom_pct.to_string(),
        row.yoy_pct.to_string(),
    )
}

/// One parent at one date: each child's weight, rate and contribution.
pub fn format_contribution(report: &ContributionReport, reference: Option<&ReferenceRate>) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "Contributions to {} ({}, {}): parent {}",
        category_label(&report.parent_id),
        report.period.label(),
        report.date.format("%Y-%m"),
        fmt_pct(report.parent_pct),
    );
    if let Some(r) = reference {
        let _ = write!(out, ", {} {}", category_label(&r.category_id), fmt_opt_pct(r.at(report.date)));
    }
    out.push('\n');
    out.push_str(
        format!(
            "{:<30} {:>7} {:>8} {:>12} {:<10}",
            "category", "weight", "rate", "contribution", "flags"
        )
        .trim_end(),
    );
    out.push('\n');

    for c in &report.contributions {
        let mut flags = Vec::new();
        if c.unweighted {
            flags.push("unweighted");
        }
        if c.rate_unavailable {
            flags.push("no-rate");
        }
        let line = format!(
            "{:<30} {:>7} {:>8} {:>12} {:<10}",
            truncate(category_label(&c.category_id), 30),
            c.weight.map(|w| format!("{w:.3}")).unwrap_or_else(|| "-".into()),
            fmt_opt_pct(c.child_pct),
            fmt_pp(c.contribution_pct),
            flags.join(","),
        );
        out.push_str(line.trim_end());
        out.push('\n');
    }

    let _ = writeln!(out, "Sum of contributions: {}", fmt_pp(report.children_sum));
    if let Some(w) = &report.warning {
        let _ = writeln!(out, "WARNING: {w}");
    }
    out
}

/// Contribution history as a date-by-child matrix, with the reference rate after the parent.
pub fn format_contribution_history(history: &[ContributionReport], reference: Option<&ReferenceRate>) -> String {
    let Some(first) = history.first() else {
        return "No contribution history in range.\n".to_string();
    };

    let mut out = String::new();
    let _ = writeln!(
        out,
        "Contribution history to {} ({}), {} periods:",
        category_label(&first.parent_id),
        first.period.label(),
        history.len()
    );

    let children: Vec<&str> = first.contributions.iter().map(|c| c.category_id.as_str()).collect();
    let mut header = format!("{:<7} {:>8}", "date", "parent");
    if let Some(r) = reference {
        let _ = write!(header, " {:>8}", truncate(&r.category_id, 8));
    }
    for id in &children {
        let _ = write!(header, " {:>14}", truncate(id, 14));
    }
    let _ = write!(header, " {:>8}", "sum");
    out.push_str(&header);
    out.push('\n');

    for report in history {
        let mut line = format!("{:<7} {:>8}", report.date.format("%Y-%m").to_string(), fmt_pct(report.parent_pct));
        if let Some(r) = reference {
            let _ = write!(line, " {:>8}", fmt_opt_pct(r.at(report.date)));
        }
        for id in &children {
            let cell = report
                .contributions
                .iter()
                .find(|c| c.category_id == *id)
                .map(|c| fmt_pp(c.contribution_pct))
                .unwrap_or_else(|| "-".into());
            let _ = write!(line, " {cell:>14}");
        }
        let _ = write!(line, " {:>8}", fmt_pp(report.children_sum));
        if report.warning.is_some() {
            line.push_str(" !");
        }
        out.push_str(&line);
        out.push('\n');
    }

    let warned = history.iter().filter(|r| r.warning.is_some()).count();
    if warned > 0 {
        let _ = writeln!(out, "! {warned} period(s) do not reconcile with the parent within tolerance.");
    }
    out
}

/// Shown in place of a breakdown that lacks data.
pub fn format_contribution_unavailable(parent_id: &str, history: bool, err: &MetricsError) -> String {
    let label = category_label(parent_id);
    match err {
        MetricsError::InsufficientData { required, available } if history => {
            format!("Contribution history for {label} unavailable: need {required} periods, have {available}.\n")
        }
        other => format!("Contribution breakdown for {label} unavailable: {other}.\n"),
    }
}

pub fn format_narrative(narrative: &Narrative, model: AiModel) -> String {
    match narrative {
        Narrative::Text(text) => format!("AI analysis ({model}):\n{text}\n"),
        Narrative::Unavailable(reason) => format!("AI analysis unavailable ({reason}).\n"),
    }
}

/// One heading per subject commentary.
pub fn format_subject_narratives(narratives: &[(String, Narrative)]) -> String {
    let mut out = String::new();
    for (name, narrative) in narratives {
        let _ = writeln!(out, "--- {name} ---");
        match narrative {
            Narrative::Text(text) => {
                let _ = writeln!(out, "{text}\n");
            }
            Narrative::Unavailable(reason) => {
                let _ = writeln!(out, "(unavailable: {reason})\n");
            }
        }
    }
    out
}

fn fmt_pct(v: f64) -> String {
    format!("{v:+.2}%")
}

fn fmt_opt_pct(v: Option<f64>) -> String {
    v.map(fmt_pct).unwrap_or_else(|| "n/a".into())
}

fn fmt_pp(v: f64) -> String {
    format!("{v:+.2}pp")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::data::SeriesKey;
    use crate::domain::{
        ChangePeriod, ContributionResult, InflationSummary, MetricResult, PctChange, ReconciliationWarning,
    };

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn contribution(id: &str, pct: f64, unweighted: bool) -> ContributionResult {
        ContributionResult {
            category_id: id.into(),
            date: d(2024, 6),
            contribution_pct: pct,
            weight: (!unweighted).then_some(0.5),
            child_pct: Some(pct * 2.0),
            unweighted,
            rate_unavailable: false,
        }
    }

    fn report(warning: bool) -> ContributionReport {
        ContributionReport {
            parent_id: "all_items".into(),
            date: d(2024, 6),
            period: ChangePeriod::Year,
            parent_pct: 3.0,
            children_sum: 2.0,
            contributions: vec![contribution("food", 2.0, false), contribution("energy", 0.0, true)],
            warning: warning.then(|| ReconciliationWarning {
                parent_id: "all_items".into(),
                date: d(2024, 6),
                parent_pct: 3.0,
                children_sum: 2.0,
                discrepancy: 1.0,
                tolerance: 0.5,
                unweighted: vec!["energy".into()],
                rate_unavailable: vec![],
            }),
        }
    }

    #[test]
    fn contribution_shows_flags_and_warning() {
        let out = format_contribution(&report(true), None);
        assert!(out.starts_with("Contributions to All items (YoY, 2024-06): parent +3.00%"));
        assert!(out.contains("unweighted"));
        assert!(out.contains("+2.00pp"));
        assert!(out.contains("WARNING: contributions to all_items"));
    }

    #[test]
    fn history_marks_unreconciled_periods() {
        let out = format_contribution_history(&[report(false), report(true)], None);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].contains("2 periods"));
        assert!(!lines[2].ends_with('!'));
        assert!(lines[3].ends_with('!'));
        assert!(out.contains("1 period(s) do not reconcile"));
    }

    #[test]
    fn empty_history_is_explicit() {
        assert_eq!(format_contribution_history(&[], None), "No contribution history in range.\n");
    }

    fn core_reference() -> ReferenceRate {
        ReferenceRate {
            category_id: "core".into(),
            period: ChangePeriod::Year,
            changes: vec![MetricResult {
                category_id: "core".into(),
                date: d(2024, 6),
                period: ChangePeriod::Year,
                change: PctChange::Value(3.3),
            }],
        }
    }

    #[test]
    fn reference_rate_column_follows_parent() {
        let reference = core_reference();
        let out = format_contribution_history(&[report(false)], Some(&reference));
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[1].starts_with("date      parent     core"));
        assert!(lines[2].starts_with("2024-06   +3.00%   +3.30%"));

        let single = format_contribution(&report(false), Some(&reference));
        assert!(single.lines().next().unwrap().ends_with("parent +3.00%, All items less food and energy +3.30%"));
    }

    #[test]
    fn unavailable_history_reports_the_gap() {
        let err = MetricsError::InsufficientData {
            required: 12,
            available: 6,
        };
        assert_eq!(
            format_contribution_unavailable("all_items", true, &err),
            "Contribution history for All items unavailable: need 12 periods, have 6.\n"
        );
        assert!(format_contribution_unavailable("all_items", false, &err).starts_with("Contribution breakdown for All items"));
    }

    #[test]
    fn subject_narratives_have_headings() {
        let out = format_subject_narratives(&[
            ("Food".into(), Narrative::Text("Steady.".into())),
            ("Energy".into(), Narrative::Unavailable("timeout".into())),
        ]);
        assert_eq!(out, "--- Food ---\nSteady.\n\n--- Energy ---\n(unavailable: timeout)\n\n");
    }

    #[test]
    fn summary_degrades_missing_values() {
        let metrics = CategoryMetrics {
            key: SeriesKey {
                category_id: "energy".into(),
                seasonally_adjusted: true,
            },
            table: vec![MetricRow {
                category_id: "energy".into(),
                seasonally_adjusted: true,
                date: d(2024, 1),
                value: 280.0,
                mom_pct: PctChange::NoBase,
                yoy_pct: PctChange::NoBase,
            }],
            summary: Some(InflationSummary {
                category_id: "energy".into(),
                seasonally_adjusted: true,
                latest_date: d(2024, 1),
                current_level: 280.0,
                monthly_change: None,
                yearly_change: None,
                quarterly_change: None,
                volatility: None,
            }),
            average_mom: Err(MetricsError::InsufficientData {
                required: 12,
                available: 0,
            }),
        };
        let request = SeriesRequest::new(vec!["energy".into()], d(2024, 1), d(2024, 1), crate::domain::SeasonalFilter::Adjusted);
        let out = format_run_summary(std::slice::from_ref(&metrics), &request, "static", 12);
        let last = out.lines().last().unwrap();
        assert!(last.starts_with("Energy"));
        assert!(last.contains("n/a"));

        let table = format_metrics_table(&metrics, Some(5));
        assert!(table.contains("2024-01   280.000      n/a      n/a"));
    }

    #[test]
    fn narrative_unavailable_is_shown() {
        let out = format_narrative(&Narrative::Unavailable("timeout".into()), AiModel::default());
        assert_eq!(out, "AI analysis unavailable (timeout).\n");
    }

    #[test]
    fn truncate_long_labels() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
