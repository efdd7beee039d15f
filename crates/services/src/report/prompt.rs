use std::fmt::Write as _;

use audit_core::model::AuditSession;
use audit_core::progress::{ClassifiedResponse, Classification};

pub const SYSTEM_PROMPT: &str = "You are a professional auditor assistant.";

const INSTRUCTIONS: &str = "\
You are an expert Audit Reporting AI. Based on the following audit findings, generate a professional, detailed audit report.
Use Markdown formatting.

Structure the report as follows:
1. **Executive Summary**: A brief overview of the audit performance.
2. **Key Findings**: Highlight the main non-compliances and warnings.
3. **Detailed Analysis**: Discuss the implications of the findings.
4. **Recommendations**: Actionable steps to address the non-compliances and warnings.
5. **Conclusion**: Final verdict and next steps.
";

/// A system/user message pair for the completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPrompt {
    pub system: String,
    pub user: String,
}

/// Assemble the full prompt for a session's classified responses.
#[must_use]
pub fn build_prompt(session: &AuditSession, buckets: &Classification) -> ReportPrompt {
    ReportPrompt {
        system: SYSTEM_PROMPT.to_owned(),
        user: format!("{INSTRUCTIONS}\n{}", build_context(session, buckets)),
    }
}

/// Header describing the audit followed by findings grouped by severity.
/// Empty groups are omitted.
#[must_use]
pub fn build_context(session: &AuditSession, buckets: &Classification) -> String {
    let mut out = String::from("Audit Report Context:\n");
    let _ = writeln!(out, "Audit Name: {}", session.template_name());
    let _ = writeln!(out, "Department: {}", session.department());
    let _ = writeln!(out, "Auditor: {}", session.auditor().name);
    let _ = writeln!(out, "Date: {}", session.created_at().format("%Y-%m-%d"));
    out.push_str("\nFindings:\n");

    push_group(&mut out, "Non-Compliances (CRITICAL)", &buckets.non_compliances);
    push_group(&mut out, "Warnings (Requires Attention)", &buckets.warnings);
    push_group(&mut out, "Compliant Areas", &buckets.compliant);
    out
}

fn push_group(out: &mut String, title: &str, entries: &[ClassifiedResponse]) {
    if entries.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{title}:");
    for entry in entries {
        out.push_str(&entry_line(entry));
        out.push('\n');
    }
}

fn entry_line(entry: &ClassifiedResponse) -> String {
    let status = entry
        .response
        .status
        .as_ref()
        .map_or("unanswered", |s| s.as_str());
    let mut line = format!(
        "- [{}] {}: {status}",
        entry.question.section, entry.question.question.text
    );
    if let Some(notes) = &entry.response.notes {
        let _ = write!(line, " (Notes: {notes})");
    }
    line
}
