//! Prompt templates for economist-style CPI commentary.

use std::fmt::Write as _;

use clap::ValueEnum;

use crate::config::category_label;
use crate::domain::{ContributionReport, InflationSummary};

/// Which analysis angle to request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum PromptKind {
    /// Broad price-trend analysis across the selected categories.
    #[default]
    General,
    /// Short, category-specific commentary.
    Category,
    /// Monetary-policy implications.
    Policy,
}

impl PromptKind {
    fn instructions(self) -> &'static str {
        match self {
            PromptKind::General => {
                "Provide a professional economic analysis of the Consumer Price Index data below, \
                 written from an economist's point of view.\n\
                 \n\
                 Cover:\n\
                 1. Detailed price trends for each category\n\
                 2. The main drivers of the monthly moves\n\
                 3. The underlying sources of inflation pressure\n\
                 4. Implications for Federal Reserve policy\n\
                 5. The 3-6 month outlook and key risks\n\
                 \n\
                 Ground every claim in the numbers given. Keep it concise (under 600 words). \
                 Reference style: \"The X.X% month over month increase was caused by...\""
            }
            PromptKind::Category => {
                "Analyze the CPI moves of the category below.\n\
                 \n\
                 Focus on:\n\
                 1. Category-specific price dynamics\n\
                 2. Industry and market factors\n\
                 3. Impact on consumers\n\
                 4. Near-term expectations\n\
                 \n\
                 Answer in at most 150 words."
            }
            PromptKind::Policy => {
                "Analyze the CPI data below from a monetary-policy perspective.\n\
                 \n\
                 Address:\n\
                 1. Consequences for Federal Reserve policy\n\
                 2. The gap to the 2% inflation target\n\
                 3. What the data implies for interest rates\n\
                 4. Concrete policy recommendations\n\
                 \n\
                 Write for policy makers, under 600 words."
            }
        }
    }
}

/// Render the full prompt: instructions, a data block, and optional contributions.
pub fn render_prompt(
    kind: PromptKind,
    summaries: &[InflationSummary],
    contribution: Option<&ContributionReport>,
) -> String {
    let mut out = String::new();
    out.push_str(kind.instructions());
    out.push_str("\n\nLatest CPI data:\n");

    for s in summaries {
        let variant = if s.seasonally_adjusted { "SA" } else { "NSA" };
        let _ = writeln!(
            out,
            "[{} ({variant}), {}]\n- Current level: {:.1}\n- Year over year: {}\n- Month over month: {}",
            category_label(&s.category_id),
            s.latest_date.format("%Y-%m"),
            s.current_level,
            fmt_opt_pct(s.yearly_change),
            fmt_opt_pct(s.monthly_change),
        );
    }

    if let Some(report) = contribution {
        let _ = writeln!(
            out,
            "\nContributions to {} {} change at {} ({:+.2}%):",
            category_label(&report.parent_id),
            report.period.label(),
            report.date.format("%Y-%m"),
            report.parent_pct,
        );
        for c in &report.contributions {
            let _ = writeln!(
                out,
                "- {}: {:+.2}pp",
                category_label(&c.category_id),
                c.contribution_pct
            );
        }
        if let Some(w) = &report.warning {
            let _ = writeln!(out, "Note: {w}");
        }
    }

    out
}

fn fmt_opt_pct(v: Option<f64>) -> String {
    v.map(|x| format!("{x:+.2}%")).unwrap_or_else(|| "n/a".to_string())
}
