//! Digest building and rendering.
//!
//! # Responsibility
//! - Turn query results into per-group sections for presentation.
//! - Render the email subject and HTML body.
//!
//! # Invariants
//! - Named groups are ordered alphabetically; unassigned tasks come last
//!   under [`NO_GROUP`].
//! - Entries keep their query order (next due date, then id) inside a section.
//! - Task text is HTML-escaped by the template engine.

use chrono::NaiveDate;
use minijinja::{context, Environment};
use peverel_core::{DueTask, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Section title for tasks without a group.
pub const NO_GROUP: &str = "no group";

const DIGEST_TEMPLATE_NAME: &str = "digest.html";
const DIGEST_TEMPLATE: &str = include_str!("../templates/digest.html");

/// One task line in the digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestEntry {
    pub task_id: TaskId,
    pub name: String,
    pub description: String,
    /// Resolved group name; `None` when unassigned.
    pub group: Option<String>,
    pub next_due: NaiveDate,
    /// Relative due text such as `3 days ago`.
    pub due_text: String,
}

impl DigestEntry {
    pub fn new(item: &DueTask, group: Option<String>) -> Self {
        Self {
            task_id: item.task.id,
            name: item.task.name.clone(),
            description: item.task.description.clone(),
            group,
            next_due: item.due.next_due,
            due_text: item.due.describe(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestSection {
    pub group: String,
    pub entries: Vec<DigestEntry>,
}

/// Overdue tasks (and optionally upcoming ones) grouped for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    pub overdue_count: usize,
    pub sections: Vec<DigestSection>,
    /// Tasks due after today but within the configured horizon.
    pub upcoming: Vec<DigestSection>,
}

/// Subject and HTML body ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDigest {
    pub subject: String,
    pub body: String,
}

/// Template failure while rendering a digest.
#[derive(Debug)]
pub struct RenderError(minijinja::Error);

impl Display for RenderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to render digest: {}", self.0)
    }
}

impl Error for RenderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl From<minijinja::Error> for RenderError {
    fn from(value: minijinja::Error) -> Self {
        Self(value)
    }
}

impl Digest {
    pub fn build(overdue: Vec<DigestEntry>, upcoming: Vec<DigestEntry>) -> Self {
        Self {
            overdue_count: overdue.len(),
            sections: group_sections(overdue),
            upcoming: group_sections(upcoming),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.overdue_count == 0
    }

    pub fn subject(&self) -> String {
        format!(
            "Peverel has something for you: {} overdue task(s)",
            self.overdue_count
        )
    }

    pub fn render(&self) -> Result<RenderedDigest, RenderError> {
        let subject = self.subject();

        let mut env = Environment::new();
        env.add_template(DIGEST_TEMPLATE_NAME, DIGEST_TEMPLATE)?;
        let body = env.get_template(DIGEST_TEMPLATE_NAME)?.render(context! {
            subject => &subject,
            overdue_count => self.overdue_count,
            sections => &self.sections,
            upcoming => &self.upcoming,
        })?;

        Ok(RenderedDigest { subject, body })
    }
}

fn group_sections(entries: Vec<DigestEntry>) -> Vec<DigestSection> {
    let mut named: BTreeMap<String, Vec<DigestEntry>> = BTreeMap::new();
    let mut unassigned = Vec::new();

    for entry in entries {
        match entry.group.clone() {
            Some(name) => named.entry(name).or_default().push(entry),
            None => unassigned.push(entry),
        }
    }

    let mut sections: Vec<DigestSection> = named
        .into_iter()
        .map(|(group, entries)| DigestSection { group, entries })
        .collect();
    if !unassigned.is_empty() {
        sections.push(DigestSection {
            group: NO_GROUP.to_string(),
            entries: unassigned,
        });
    }
    sections
}
