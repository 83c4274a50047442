//! Export view of the active draft, plus JSON and Markdown renderings.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Draft, SectionContent};

/// Export output format shared by all clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

/// What a renderer needs: the draft's identity and its visible sections in
/// canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportView {
    pub id: String,
    pub lineage_id: String,
    pub name: String,
    pub template_id: String,
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_link: Option<String>,
    pub content_hash: String,
    pub updated_at: DateTime<Utc>,
    pub sections: Vec<SectionContent>,
}

/// Build the export view of a draft.
#[must_use]
pub fn export_view(draft: &Draft) -> ExportView {
    ExportView {
        id: draft.id.to_string(),
        lineage_id: draft.lineage_id.to_string(),
        name: draft.name.clone(),
        template_id: draft.template_id.clone(),
        version: draft.version,
        job_link: draft.job_link.clone(),
        content_hash: draft.content_hash.to_string(),
        updated_at: draft.updated_at,
        sections: draft
            .visible_sections()
            .into_iter()
            .map(|kind| draft.content.section(kind))
            .collect(),
    }
}

/// Render the view as pretty-printed JSON.
pub fn render_json_export(view: &ExportView) -> serde_json::Result<String> {
    serde_json::to_string_pretty(view)
}

/// Render the view as Markdown with a frontmatter block.
///
/// Empty sections are skipped.
#[must_use]
pub fn render_markdown_export(view: &ExportView) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "---");
    let _ = writeln!(output, "id: {}", view.id);
    let _ = writeln!(output, "version: {}", view.version);
    let _ = writeln!(output, "template: {}", view.template_id);
    if let Some(job_link) = &view.job_link {
        let _ = writeln!(output, "job_link: {job_link}");
    }
    let _ = writeln!(output, "updated_at: {}", view.updated_at.to_rfc3339());
    let _ = writeln!(output, "---");
    let _ = writeln!(output);
    let _ = writeln!(output, "# {}", view.name);

    for section in &view.sections {
        write_section(&mut output, section);
    }

    output
}

fn write_section(output: &mut String, section: &SectionContent) {
    match section {
        SectionContent::Summary(summary) => {
            if summary.trim().is_empty() {
                return;
            }
            let _ = writeln!(output, "\n## Summary\n\n{}", summary.trim());
        }
        SectionContent::Skills(skills) => {
            if skills.is_empty() {
                return;
            }
            let _ = writeln!(output, "\n## Skills\n\n{}", skills.join(", "));
        }
        SectionContent::Experience(entries) => {
            if entries.is_empty() {
                return;
            }
            let _ = writeln!(output, "\n## Experience");
            for entry in entries {
                let _ = writeln!(output, "\n### {}, {}", entry.title, entry.employer);
                let dates = date_range(entry.start_date.as_deref(), entry.end_date.as_deref());
                let details = [entry.location.clone(), dates]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>();
                if !details.is_empty() {
                    let _ = writeln!(output, "_{}_", details.join(" | "));
                }
                write_bullets(output, &entry.bullets);
            }
        }
        SectionContent::Education(entries) => {
            if entries.is_empty() {
                return;
            }
            let _ = writeln!(output, "\n## Education");
            for entry in entries {
                let degree = match &entry.field {
                    Some(field) => format!("{} in {field}", entry.degree),
                    None => entry.degree.clone(),
                };
                let _ = writeln!(output, "\n### {degree}, {}", entry.institution);
                if let Some(date) = &entry.graduation_date {
                    let _ = writeln!(output, "_{date}_");
                }
                write_bullets(output, &entry.details);
            }
        }
        SectionContent::Projects(entries) => {
            if entries.is_empty() {
                return;
            }
            let _ = writeln!(output, "\n## Projects");
            for entry in entries {
                match &entry.role {
                    Some(role) => {
                        let _ = writeln!(output, "\n### {} ({role})", entry.name);
                    }
                    None => {
                        let _ = writeln!(output, "\n### {}", entry.name);
                    }
                }
                if let Some(url) = &entry.url {
                    let _ = writeln!(output, "<{url}>");
                }
                write_bullets(output, &entry.bullets);
            }
        }
    }
}

fn write_bullets(output: &mut String, bullets: &[String]) {
    if bullets.is_empty() {
        return;
    }
    let _ = writeln!(output);
    for bullet in bullets {
        let _ = writeln!(output, "- {bullet}");
    }
}

fn date_range(start: Option<&str>, end: Option<&str>) -> Option<String> {
    match (start, end) {
        (Some(start), Some(end)) => Some(format!("{start} to {end}")),
        (Some(start), None) => Some(format!("{start} to present")),
        (None, Some(end)) => Some(end.to_string()),
        (None, None) => None,
    }
}
