//! Document export collaborator boundary.
//!
//! Renders the structured summary into the final artifact. Export failure
//! is fatal to the run: if the document cannot be written, the run failed
//! even though upstream work succeeded.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::summarize::MeetingSummary;

/// Writes the final meeting document and returns its path.
pub trait Exporter: Send + Sync {
    fn export(&self, summary: &MeetingSummary) -> Result<PathBuf>;
}

/// Markdown document exporter with timestamped, collision-avoiding names.
pub struct MarkdownExporter {
    output_dir: PathBuf,
}

impl MarkdownExporter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    fn generate_path(&self) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let path = self.output_dir.join(format!("meeting_summary_{timestamp}.md"));

        if path.exists() {
            for i in 1..100 {
                let alt = self
                    .output_dir
                    .join(format!("meeting_summary_{timestamp}-{i}.md"));
                if !alt.exists() {
                    return alt;
                }
            }
        }

        path
    }

    fn render(summary: &MeetingSummary) -> String {
        let mut doc = String::new();
        doc.push_str(&format!("# {}\n\n", summary.title));
        doc.push_str(&format!(
            "_Generated on {}_\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M")
        ));

        Self::render_section(&mut doc, "Participants", &summary.participants);
        Self::render_section(&mut doc, "Key Discussion Points", &summary.key_points);
        Self::render_section(&mut doc, "Action Items", &summary.action_items);
        Self::render_section(&mut doc, "Decisions Taken", &summary.decisions);
        Self::render_section(&mut doc, "Follow-up Tasks", &summary.follow_ups);

        doc
    }

    fn render_section(doc: &mut String, heading: &str, items: &[String]) {
        doc.push_str(&format!("\n## {heading}\n\n"));
        if items.is_empty() {
            doc.push_str("_None recorded._\n");
            return;
        }
        for item in items {
            doc.push_str(&format!("- {item}\n"));
        }
    }
}

impl Exporter for MarkdownExporter {
    fn export(&self, summary: &MeetingSummary) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create output directory {:?}", self.output_dir))?;

        let path = self.generate_path();
        let document = Self::render(summary);

        std::fs::write(&path, document)
            .with_context(|| format!("Could not save document to {:?}", path))?;

        info!("Document saved: {:?}", path);
        Ok(absolute(&path))
    }
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_summary() -> MeetingSummary {
        MeetingSummary {
            title: "Sprint Planning".to_string(),
            participants: vec!["Asha".to_string(), "Ravi".to_string()],
            key_points: vec!["Release date moved".to_string()],
            action_items: vec!["Asha to update the roadmap".to_string()],
            decisions: vec![],
            follow_ups: vec!["Check vendor contract".to_string()],
        }
    }

    #[test]
    fn test_export_writes_markdown_document() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = MarkdownExporter::new(dir.path().to_path_buf());

        let path = exporter.export(&sample_summary()).unwrap();
        assert!(path.exists());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Sprint Planning"));
        assert!(content.contains("## Participants"));
        assert!(content.contains("- Asha"));
        assert!(content.contains("## Decisions Taken"));
        assert!(content.contains("_None recorded._"));
    }

    #[test]
    fn test_export_creates_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("docs").join("out");
        let exporter = MarkdownExporter::new(nested.clone());

        exporter.export(&sample_summary()).unwrap();
        assert!(nested.exists());
    }

    #[test]
    fn test_export_avoids_filename_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = MarkdownExporter::new(dir.path().to_path_buf());

        let first = exporter.export(&sample_summary()).unwrap();
        let second = exporter.export(&sample_summary()).unwrap();
        assert_ne!(first, second);
        assert!(first.exists() && second.exists());
    }

    #[test]
    fn test_export_to_unwritable_directory_fails() {
        let exporter = MarkdownExporter::new(PathBuf::from("/proc/meetdocs-unwritable"));
        assert!(exporter.export(&sample_summary()).is_err());
    }
}
