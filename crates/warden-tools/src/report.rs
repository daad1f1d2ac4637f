//! Report writer confined to one directory.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use warden_audit::{AuditEventType, AuditLog};
use warden_core::{Timestamp, ToolArgs};

use crate::adapter::ToolAdapter;
use crate::args::{optional_bool, optional_str, required_str};
use crate::error::{ToolError, ToolResult};
use crate::output::ToolOutput;

/// Registered name of the report writer.
pub const REPORT_WRITER_TOOL_NAME: &str = "write_report_file";

const FALLBACK_NAME: &str = "report";

/// Output format of a report file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportFormat {
    Text,
    Json,
    Html,
    Markdown,
}

impl ReportFormat {
    fn parse(value: Option<&str>) -> ToolResult<Self> {
        match value.map(str::to_ascii_lowercase).as_deref() {
            None | Some("txt" | "text") => Ok(Self::Text),
            Some("json") => Ok(Self::Json),
            Some("html") => Ok(Self::Html),
            Some("md" | "markdown") => Ok(Self::Markdown),
            Some(other) => Err(ToolError::InvalidArguments(format!(
                "file_format must be txt, json, html or md, got '{other}'"
            ))),
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Json => "json",
            Self::Html => "html",
            Self::Markdown => "md",
        }
    }

    fn render(self, content: &str, title: Option<&str>) -> String {
        match self {
            Self::Text => content.to_string(),
            Self::Json => serde_json::from_str::<Value>(content)
                .ok()
                .and_then(|v| serde_json::to_string_pretty(&v).ok())
                .unwrap_or_else(|| content.to_string()),
            Self::Html => {
                let head = content.trim_start().get(..5).map(str::to_ascii_lowercase);
                if matches!(head.as_deref(), Some("<!doc" | "<html")) {
                    return content.to_string();
                }
                let title = escape_html(title.unwrap_or("Report"));
                format!(
                    "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
                     <body>\n<h1>{title}</h1>\n<pre>{}</pre>\n</body>\n</html>\n",
                    escape_html(content)
                )
            },
            Self::Markdown => match title {
                Some(title) => format!("# {title}\n\n{content}"),
                None => content.to_string(),
            },
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Reduce an agent-supplied name to a single safe path component.
fn sanitize_filename(name: &str) -> String {
    let cleaned = name
        .replace("..", "_")
        .replace(['/', '\\', '\0', '<', '>', ':', '"', '|', '?', '*'], "_");
    let trimmed = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Writes agent-produced reports as files under one directory.
///
/// File names are sanitized to a single component and the resolved path
/// must sit directly inside the report directory.
#[derive(Debug)]
pub struct ReportWriterTool {
    dir: PathBuf,
    audit: Option<Arc<AuditLog>>,
}

impl ReportWriterTool {
    /// Write reports into `dir`, created on first use.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            audit: None,
        }
    }

    /// Record written files in `audit`.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Directory reports are confined to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(args: &ToolArgs, format: ReportFormat, stamp: bool) -> String {
        let name = sanitize_filename(optional_str(args, "filename").unwrap_or(FALLBACK_NAME));
        let ext = format.extension();
        let stem = name
            .strip_suffix(&format!(".{ext}"))
            .filter(|s| !s.is_empty())
            .unwrap_or(&name);
        if stamp {
            format!("{stem}_{}.{ext}", Timestamp::now().file_stamp())
        } else {
            format!("{stem}.{ext}")
        }
    }

    /// Resolve `name` inside the report directory, refusing anything that
    /// lands elsewhere.
    async fn confine(&self, name: &str) -> ToolResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let root = tokio::fs::canonicalize(&self.dir).await?;
        let path = root.join(name);

        let parent = match path.parent() {
            Some(parent) => tokio::fs::canonicalize(parent).await?,
            None => PathBuf::new(),
        };
        if parent != root {
            return Err(ToolError::InvalidArguments(format!(
                "report path escapes {}",
                self.dir.display()
            )));
        }
        if tokio::fs::symlink_metadata(&path)
            .await
            .is_ok_and(|m| m.file_type().is_symlink())
        {
            return Err(ToolError::InvalidArguments(format!(
                "refusing to write through symlink {name}"
            )));
        }
        Ok(path)
    }

    async fn write(&self, args: &ToolArgs) -> ToolResult<ToolOutput> {
        let content = required_str(args, "content")?;
        let format = ReportFormat::parse(optional_str(args, "file_format"))?;
        let append = optional_bool(args, "append")?.unwrap_or(false);
        let stamp = optional_bool(args, "create_timestamp")?.unwrap_or(true) && !append;

        let name = Self::file_name(args, format, stamp);
        let path = self.confine(&name).await?;
        let existed = tokio::fs::try_exists(&path).await.unwrap_or(false);

        let mut body = format.render(content, optional_str(args, "title"));
        if append && existed {
            body.insert(0, '\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)
            .await?;
        file.write_all(body.as_bytes()).await?;
        file.flush().await?;
        let size = file.metadata().await?.len();

        let mode = if append && existed { "appended" } else { "created" };
        info!(path = %path.display(), mode, size, "Report written");
        if let Some(audit) = &self.audit {
            let mut details = Map::new();
            details.insert("file_path".into(), path.display().to_string().into());
            details.insert("format".into(), format.extension().into());
            details.insert("mode".into(), mode.into());
            details.insert("size_bytes".into(), size.into());
            audit.log_event(
                AuditEventType::SystemChange,
                format!("Report file {mode}: {name}"),
                details,
                None,
                None,
            );
        }

        Ok(ToolOutput::success(Map::new())
            .with_field("file_path", path.display().to_string())
            .with_field("size_bytes", size)
            .with_field("mode", mode))
    }
}

#[async_trait]
impl ToolAdapter for ReportWriterTool {
    fn name(&self) -> &'static str {
        REPORT_WRITER_TOOL_NAME
    }

    fn description(&self) -> &'static str {
        "Write a report (txt, json, html or md) into the session's report directory."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": {"type": "string"},
                "filename": {"type": "string", "default": FALLBACK_NAME},
                "file_format": {"type": "string", "enum": ["txt", "json", "html", "md"], "default": "txt"},
                "append": {"type": "boolean", "default": false},
                "create_timestamp": {"type": "boolean", "default": true},
                "title": {"type": "string"}
            },
            "required": ["content"]
        })
    }

    async fn call(&self, args: &ToolArgs) -> ToolOutput {
        match self.write(args).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Report write failed");
                ToolOutput::from(e)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_audit::read_events;
    use warden_core::SessionId;

    fn args(value: Value) -> ToolArgs {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "____etc_passwd");
        assert_eq!(sanitize_filename("a<b>:c|d?e*f"), "a_b__c_d_e_f");
        assert_eq!(sanitize_filename(" .hidden. "), "hidden");
        assert_eq!(sanitize_filename("..."), "_");
        assert_eq!(sanitize_filename("  "), FALLBACK_NAME);
        assert_eq!(sanitize_filename("."), FALLBACK_NAME);
    }

    #[test]
    fn test_html_wraps_and_escapes_fragments() {
        let page = ReportFormat::Html.render("<script>x</script> & y", Some("Scan"));
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<title>Scan</title>"));
        assert!(page.contains("&lt;script&gt;x&lt;/script&gt; &amp; y"));

        let document = "<html><body>done</body></html>";
        assert_eq!(ReportFormat::Html.render(document, None), document);
    }

    #[test]
    fn test_json_is_pretty_printed_when_valid() {
        assert_eq!(
            ReportFormat::Json.render(r#"{"hosts":1}"#, None),
            "{\n  \"hosts\": 1\n}"
        );
        assert_eq!(ReportFormat::Json.render("not json", None), "not json");
    }

    #[tokio::test]
    async fn test_traversal_name_stays_in_report_dir() {
        let dir = tempfile::tempdir().unwrap();
        let reports = dir.path().join("reports");
        let tool = ReportWriterTool::new(&reports);

        let out = tool
            .call(&args(json!({
                "content": "findings",
                "filename": "../../outside",
                "create_timestamp": false
            })))
            .await;
        assert!(out.success, "{:?}", out.error);

        let written = PathBuf::from(out.fields["file_path"].as_str().unwrap());
        assert_eq!(
            written.parent().unwrap(),
            std::fs::canonicalize(&reports).unwrap()
        );
        assert_eq!(written.file_name().unwrap(), "____outside.txt");
        assert!(!dir.path().join("outside.txt").exists());
        assert_eq!(std::fs::read_to_string(written).unwrap(), "findings");
    }

    #[tokio::test]
    async fn test_append_adds_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReportWriterTool::new(dir.path());
        let first = args(json!({"content": "# Scan", "filename": "notes.md", "file_format": "md", "append": true}));

        let out = tool.call(&first).await;
        assert_eq!(out.fields["mode"], "created");
        let out = tool
            .call(&args(json!({"content": "- port 1433 open", "filename": "notes", "file_format": "md", "append": true})))
            .await;
        assert_eq!(out.fields["mode"], "appended");

        let text = std::fs::read_to_string(dir.path().join("notes.md")).unwrap();
        assert_eq!(text, "# Scan\n- port 1433 open");
        assert_eq!(out.fields["size_bytes"], text.len());
    }

    #[tokio::test]
    async fn test_timestamped_name_and_audit_record() {
        let dir = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditLog::create(dir.path().join("audit"), SessionId::new(), "alice").unwrap());
        let tool = ReportWriterTool::new(dir.path().join("reports")).with_audit(Arc::clone(&audit));

        let out = tool
            .call(&args(json!({"content": "{}", "filename": "summary", "file_format": "json"})))
            .await;
        assert!(out.success);
        let name = PathBuf::from(out.fields["file_path"].as_str().unwrap());
        let name = name.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("summary_") && name.ends_with(".json"), "{name}");

        let events = read_events(audit.path()).unwrap().events;
        let change = events.last().unwrap();
        assert_eq!(change.event_type, AuditEventType::SystemChange);
        assert_eq!(change.details["mode"], "created");
    }

    #[tokio::test]
    async fn test_unknown_format_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReportWriterTool::new(dir.path());
        let out = tool
            .call(&args(json!({"content": "x", "file_format": "pdf"})))
            .await;
        assert!(!out.success);
        assert!(out.error.unwrap().contains("file_format"));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
