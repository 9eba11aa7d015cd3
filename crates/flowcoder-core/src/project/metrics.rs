//! Code-size report handed to the diagnostic agent after a failed build

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::tools::path_utils::walk_files;

const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "ts", "tsx", "js", "jsx", "mjs", "py", "go", "java", "kt", "c", "h", "cc", "cpp", "hpp",
    "cs", "rb", "php", "swift", "scala", "sh", "toml", "css", "html", "vue", "svelte",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileLines {
    pub file: String,
    pub lines: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsReport {
    pub total_lines: usize,
    pub per_file: Vec<FileLines>,
}

impl MetricsReport {
    /// Text summary: total plus the `top_n` largest files.
    pub fn render(&self, top_n: usize) -> String {
        let mut files: Vec<&FileLines> = self.per_file.iter().collect();
        files.sort_by(|a, b| b.lines.cmp(&a.lines).then_with(|| a.file.cmp(&b.file)));

        let mut out = format!(
            "Code metrics: {} lines across {} files\n",
            self.total_lines,
            self.per_file.len()
        );
        if !files.is_empty() {
            out.push_str("Largest files:\n");
            for f in files.into_iter().take(top_n) {
                out.push_str(&format!("  {} ({} lines)\n", f.file, f.lines));
            }
        }
        out
    }
}

#[async_trait]
pub trait CodeMetrics: Send + Sync {
    async fn collect(&self, root: &Path) -> Result<MetricsReport>;
}

/// Counts lines of recognised source files under the project root.
#[derive(Debug, Default)]
pub struct LineCountMetrics;

#[async_trait]
impl CodeMetrics for LineCountMetrics {
    async fn collect(&self, root: &Path) -> Result<MetricsReport> {
        let root: PathBuf = root.to_path_buf();
        let report = tokio::task::spawn_blocking(move || count_lines(&root)).await?;
        Ok(report)
    }
}

fn count_lines(root: &Path) -> MetricsReport {
    let mut report = MetricsReport::default();
    for path in walk_files(root) {
        let is_source = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext));
        if !is_source {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        let lines = content.lines().count();
        report.total_lines += lines;
        report.per_file.push(FileLines {
            file: path
                .strip_prefix(root)
                .unwrap_or(&path)
                .display()
                .to_string(),
            lines,
        });
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_source_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/big.rs"), "a\nb\nc\n").unwrap();
        std::fs::write(dir.path().join("src/small.py"), "x\n").unwrap();
        std::fs::write(dir.path().join("notes.md"), "1\n2\n3\n4\n").unwrap();
        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/dep.js"), "z\n".repeat(100)).unwrap();

        let report = LineCountMetrics.collect(dir.path()).await.unwrap();
        assert_eq!(report.total_lines, 4);
        assert_eq!(report.per_file.len(), 2);
    }

    #[test]
    fn render_lists_largest_first() {
        let report = MetricsReport {
            total_lines: 60,
            per_file: vec![
                FileLines { file: "a.rs".into(), lines: 10 },
                FileLines { file: "b.rs".into(), lines: 40 },
                FileLines { file: "c.rs".into(), lines: 10 },
            ],
        };
        let text = report.render(2);
        assert!(text.starts_with("Code metrics: 60 lines across 3 files"));
        let b = text.find("b.rs").unwrap();
        let a = text.find("a.rs").unwrap();
        assert!(b < a);
        assert!(!text.contains("c.rs"));
    }
}
