use anyhow::{anyhow, bail, Context, Result};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

use crate::api::JobTrackerApi;
use crate::error::{ApiError, ApiResult};
use crate::models::ResumeAnalysis;

const TEXT_EXTENSIONS: [&str; 3] = ["txt", "md", "text"];
const WRAP_WIDTH: usize = 76;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResumeInput {
    pub resume_text: String,
    pub job_description: String,
}

impl ResumeInput {
    pub fn validate(&self) -> ApiResult<()> {
        match (self.resume_text.trim().is_empty(), self.job_description.trim().is_empty()) {
            (false, false) => Ok(()),
            (true, true) => Err(ApiError::validation("Please provide both resume and job description")),
            (true, false) => Err(ApiError::validation("Please provide your resume text")),
            (false, true) => Err(ApiError::validation("Please provide the job description")),
        }
    }
}

/// Reads an uploaded resume as text. Plain text is read as-is, PDF and DOCX
/// have their text extracted, anything else is refused.
pub fn load_resume_file(path: &Path) -> Result<String> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let text = match extension.as_deref() {
        None => return read_plain(path),
        Some(ext) if TEXT_EXTENSIONS.contains(&ext) => return read_plain(path),
        Some("pdf") => {
            let bytes = fs::read(path)
                .with_context(|| format!("Failed to read resume file: {}", path.display()))?;
            pdf_extract::extract_text_from_mem(&bytes)
                .map_err(|e| anyhow!("Failed to extract text from {}: {}", path.display(), e))?
        }
        Some("docx") => read_docx(path)?,
        Some(ext) => bail!(
            "Unsupported file format '.{}' (use .txt, .md, .pdf or .docx)",
            ext
        ),
    };
    let text = text.trim().to_string();
    if text.is_empty() {
        bail!("No text could be extracted from {}", path.display());
    }
    tracing::debug!(path = %path.display(), chars = text.len(), "resume text extracted");
    Ok(text)
}

fn read_plain(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read resume file: {}", path.display()))
}

fn read_docx(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("Failed to read resume file: {}", path.display()))?;
    let mut archive =
        ZipArchive::new(file).with_context(|| format!("Not a valid .docx file: {}", path.display()))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .with_context(|| format!("No document body in {}", path.display()))?
        .read_to_string(&mut xml)
        .context("Failed to read document body")?;
    Ok(document_text(&xml))
}

/// Visible text of a WordprocessingML body, one line per paragraph.
fn document_text(xml: &str) -> String {
    let mut out = String::new();
    let mut in_run = false;
    let mut in_text = false;
    let mut rest = xml;
    while let Some(start) = rest.find('<') {
        if in_text {
            out.push_str(&unescape(&rest[..start]));
        }
        let Some(len) = rest[start..].find('>') else {
            break;
        };
        let tag = &rest[start + 1..start + len];
        let closing = tag.starts_with('/');
        let empty = tag.ends_with('/');
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default();
        match name {
            "w:r" => in_run = !closing && !empty,
            "w:t" => in_text = !closing && !empty,
            // Tab stops in paragraph properties share the name; only runs carry text.
            "w:tab" if in_run => out.push('\t'),
            "w:br" | "w:cr" if in_run => out.push('\n'),
            "w:p" if closing || empty => out.push('\n'),
            _ => {}
        }
        rest = &rest[start + len + 1..];
    }
    out
}

fn unescape(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Validation happens first; an incomplete form never reaches the network.
pub fn analyze(api: &dyn JobTrackerApi, input: &ResumeInput) -> ApiResult<ResumeAnalysis> {
    input.validate()?;
    tracing::debug!(
        resume_chars = input.resume_text.len(),
        job_chars = input.job_description.len(),
        "submitting resume analysis"
    );
    api.analyze_resume(input)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AnalysisTab {
    Overview,
    Keywords,
    Suggestions,
    Format,
}

impl AnalysisTab {
    pub const ALL: [AnalysisTab; 4] = [
        AnalysisTab::Overview,
        AnalysisTab::Keywords,
        AnalysisTab::Suggestions,
        AnalysisTab::Format,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AnalysisTab::Overview => "Overview",
            AnalysisTab::Keywords => "Keywords",
            AnalysisTab::Suggestions => "Suggestions",
            AnalysisTab::Format => "Format",
        }
    }
}

fn push_wrapped(lines: &mut Vec<String>, marker: &str, text: &str) {
    let indent = " ".repeat(marker.len());
    let options = textwrap::Options::new(WRAP_WIDTH)
        .initial_indent(marker)
        .subsequent_indent(&indent);
    for line in textwrap::wrap(text, options) {
        lines.push(line.into_owned());
    }
}

fn push_section(lines: &mut Vec<String>, title: &str, marker: &str, items: &[String]) {
    lines.push(title.to_string());
    if items.is_empty() {
        lines.push("  (none)".to_string());
    }
    for item in items {
        push_wrapped(lines, marker, item);
    }
    lines.push(String::new());
}

fn score_bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * 30.0).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(30 - filled))
}

pub fn render_tab(analysis: &ResumeAnalysis, tab: AnalysisTab) -> Vec<String> {
    let mut lines = Vec::new();
    match tab {
        AnalysisTab::Overview => {
            lines.push("Overall Match Analysis".to_string());
            lines.push(format!(
                "  {} {:.1}%",
                score_bar(analysis.match_percentage),
                analysis.match_percentage
            ));
            lines.push(String::new());
            lines.push(format!("  Match Score     {:>6.1}%", analysis.match_percentage));
            lines.push(format!("  Skill Score     {:>6.1}%", analysis.skill_score));
            lines.push(format!("  Keyword Score   {:>6.1}%", analysis.keyword_score));
            lines.push(format!("  Format Score    {:>6.1}%", analysis.format_score));
            lines.push(format!(
                "  ATS Compatible  {}",
                if analysis.is_ats_compatible { "Yes" } else { "No" }
            ));
            if !analysis.industry_category.is_empty() {
                lines.push(format!("  Industry Match  {}", analysis.industry_category));
            }
            lines.push(String::new());
            if !analysis.quick_wins.is_empty() {
                push_section(&mut lines, "Quick Improvements", "  + ", &analysis.quick_wins);
            }
        }
        AnalysisTab::Keywords => {
            push_section(&mut lines, "Found Keywords", "  + ", &analysis.matching_keywords);
            push_section(&mut lines, "Missing Keywords", "  - ", &analysis.missing_keywords);
            if !analysis.industry_keywords.is_empty() {
                push_section(&mut lines, "Industry Keywords", "  * ", &analysis.industry_keywords);
            }
        }
        AnalysisTab::Suggestions => {
            push_section(&mut lines, "Priority Improvements", "  ! ", &analysis.priority_improvements);
            push_section(&mut lines, "Suggestions", "  - ", &analysis.suggestions);
        }
        AnalysisTab::Format => {
            lines.push("Format Checklist".to_string());
            if analysis.format_checklist.is_empty() {
                lines.push("  (none)".to_string());
            }
            for (item, passed) in &analysis.format_checklist {
                let mark = if *passed { "ok" } else { "!!" };
                lines.push(format!("  [{}] {}", mark, item));
            }
            lines.push(String::new());
            if !analysis.ats_optimization_tips.is_empty() {
                push_section(&mut lines, "ATS Optimization Tips", "  * ", &analysis.ats_optimization_tips);
            }
        }
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}
