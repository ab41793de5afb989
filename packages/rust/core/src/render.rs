//! Markdown rendering of a report.
//!
//! Rendering is a pure function of the [`Report`]: no clock, no I/O, so the
//! same report always produces byte-identical output.

use std::fmt::Write;

use sourcescout_shared::{FormattedDocument, Report, ReportConfig, ReportEntry, domain_name};

/// Rendering switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Append a table of discarded sources with their reasons.
    pub include_discarded: bool,
}

impl From<&ReportConfig> for RenderOptions {
    fn from(config: &ReportConfig) -> Self {
        Self {
            include_discarded: config.include_discarded,
        }
    }
}

/// Render `report` as a Markdown document.
pub fn render(report: &Report, options: RenderOptions) -> FormattedDocument {
    let mut md = String::new();
    let industry = report.industry.display_name();
    let _ = writeln!(
        md,
        "# Report on information sources for the {industry} industry\n"
    );

    if report.is_empty() {
        md.push_str("_No data: no sources have been scored for this industry yet._\n");
        return FormattedDocument { markdown: md };
    }

    let kept: Vec<&ReportEntry> = report.kept().collect();
    let discarded: Vec<&ReportEntry> = report.discarded().collect();

    let _ = writeln!(
        md,
        "Selected {} of {} scored sources ({} discarded).\n",
        kept.len(),
        report.entries.len(),
        discarded.len()
    );

    if kept.is_empty() {
        md.push_str("_No sources were selected._\n");
    }

    for entry in &kept {
        let _ = writeln!(md, "## {}\n", domain_name(&entry.url));
        let _ = writeln!(md, "- **URL:** <{}>", entry.url);
        let _ = writeln!(md, "- **Reason for selection:** {}\n", single_line(&entry.rationale));
        let _ = writeln!(md, "{}\n", entry.summary_text.trim());
    }

    if options.include_discarded && !discarded.is_empty() {
        md.push_str("## Discarded sources\n\n");
        md.push_str("| Source | Reason |\n|---|---|\n");
        for entry in &discarded {
            let _ = writeln!(
                md,
                "| [{}]({}) | {} |",
                table_cell(&domain_name(&entry.url)),
                entry.url,
                table_cell(&entry.rationale)
            );
        }
        md.push('\n');
    }

    // Exactly one trailing newline.
    let trimmed_len = md.trim_end().len();
    md.truncate(trimmed_len);
    md.push('\n');

    FormattedDocument { markdown: md }
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn table_cell(text: &str) -> String {
    single_line(text).replace('|', "\\|")
}
