//! PDF document assembly.
//!
//! The engine lays out an HTML page around the branded image; turning that
//! page into PDF bytes is delegated to a [`DocumentAssembler`]. No assembler
//! is bundled: [`CommandAssembler`] pipes the page through an external
//! converter such as `wkhtmltopdf - -` when one is configured.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use log::debug;
use std::io::Write;
use std::process::{Command, Stdio};

use crate::content::ContentType;
use crate::error::{Error, Result};
use crate::render::RenderedArtifact;
use crate::style::{ErrorCorrection, Layout};
use crate::svg::escape;

pub const CONTENT_PREVIEW_CHARS: usize = 50;

pub trait DocumentAssembler {
    fn name(&self) -> &str;
    fn assemble(&self, html: &str) -> Result<Vec<u8>>;
}

/// Details printed under the image
#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    pub content_type: ContentType,
    pub content: String,
    pub error_correction: ErrorCorrection,
    pub layout: Layout,
    pub generated_at: DateTime<Utc>,
}

/// First 50 characters, with `...` when anything was cut
pub fn truncate_content(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(CONTENT_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

pub fn build_html(image: &RenderedArtifact, meta: &DocumentMetadata) -> String {
    let src = format!("data:{};base64,{}", image.mime_type(), STANDARD.encode(image.bytes()));
    let rows = [
        ("Content type", meta.content_type.label().to_string()),
        ("Content", truncate_content(&meta.content)),
        ("Error correction", meta.error_correction.label().to_string()),
        ("Layout", meta.layout.label().to_string()),
        ("Generated", meta.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
    ];

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>QR Code</title>\n");
    html.push_str("<style>\n");
    html.push_str("body { font-family: Arial, Helvetica, sans-serif; margin: 40px; text-align: center; }\n");
    html.push_str("img { max-width: 100%; }\n");
    html.push_str("table { margin: 24px auto 0; border-collapse: collapse; font-size: 12px; color: #374151; }\n");
    html.push_str("th { text-align: right; padding: 2px 12px 2px 0; }\n");
    html.push_str("td { text-align: left; padding: 2px 0; }\n");
    html.push_str("</style>\n</head>\n<body>\n");
    html.push_str(&format!(
        "<img src=\"{}\" width=\"{}\" height=\"{}\" alt=\"QR code\">\n",
        src,
        image.width(),
        image.height()
    ));
    html.push_str("<table>\n");
    for (label, value) in rows {
        html.push_str(&format!("<tr><th>{}</th><td>{}</td></tr>\n", label, escape(&value)));
    }
    html.push_str("</table>\n</body>\n</html>\n");
    html
}

// === Command Assembler ===

/// Runs an external converter that reads HTML on stdin and writes PDF to stdout
#[derive(Debug, Clone)]
pub struct CommandAssembler {
    program: String,
    args: Vec<String>,
}

impl CommandAssembler {
    /// From a command array such as `["wkhtmltopdf", "--quiet", "-", "-"]`
    pub fn from_slice(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl DocumentAssembler for CommandAssembler {
    fn name(&self) -> &str {
        &self.program
    }

    fn assemble(&self, html: &str) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Export(format!("cannot start {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(html.as_bytes()) {
                drop(stdin);
                // Reap the child before reporting the failed write
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Export(format!(
                    "cannot write to {}: {}",
                    self.program, e
                )));
            }
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(Error::Export(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if !output.stdout.starts_with(b"%PDF") {
            return Err(Error::Export(format!("{} did not produce a PDF", self.program)));
        }
        debug!("{} assembled {} bytes", self.program, output.stdout.len());
        Ok(output.stdout)
    }
}
