use crate::error::OutlineError;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use super::types::{GlobalStyle, Outline, SlideSpec};

/// Heading keywords that mark the deck-wide style section
const STYLE_MARKERS: &[&str] = &[
    "global visual requirements",
    "visual style",
    "design standards",
];

struct Section {
    title: String,
    body: String,
}

/// Parse a markdown outline into slides and an optional global style.
///
/// Every `## ` heading starts a section; text before the first heading is
/// ignored. The first section whose title carries a style marker becomes the
/// [`GlobalStyle`]; style sections never become slides.
pub fn parse_outline(text: &str) -> Result<Outline, OutlineError> {
    let mut slides = Vec::new();
    let mut global_style = None;

    for section in split_sections(text) {
        if is_style_section(&section.title) {
            if global_style.is_none() {
                debug!("Using '{}' as global style section", section.title);
                global_style = Some(parse_global_style(&section.body));
            } else {
                debug!("Ignoring additional style section '{}'", section.title);
            }
            continue;
        }

        let (body, visual_hint) = extract_visual_hints(&section.body);
        let (body_text, bullet_items) = split_bullets(&body);

        slides.push(SlideSpec {
            index: slides.len() + 1,
            title: strip_slide_prefix(&section.title).to_string(),
            body_text,
            visual_hint,
            bullet_items,
            content: section.body,
        });
    }

    if slides.is_empty() {
        return Err(OutlineError::EmptyOutline);
    }

    Ok(Outline {
        slides,
        global_style,
    })
}

fn split_sections(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        if let Some(title) = heading_title(line) {
            if let Some((title, lines)) = current.take() {
                sections.push(finish_section(title, &lines));
            }
            current = Some((title.to_string(), Vec::new()));
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }
    if let Some((title, lines)) = current {
        sections.push(finish_section(title, &lines));
    }

    sections
}

fn finish_section(title: String, lines: &[&str]) -> Section {
    Section {
        title,
        body: lines.join("\n").trim().to_string(),
    }
}

/// `## Title` → `Title`; deeper headings are body text
fn heading_title(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("##")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let title = rest.trim();
    (!title.is_empty()).then_some(title)
}

fn is_style_section(title: &str) -> bool {
    let lower = title.to_lowercase();
    STYLE_MARKERS.iter().any(|m| lower.contains(m))
}

fn slide_prefix_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^slide\s*\d+\s*[:.\-–—]\s*").ok())
        .as_ref()
}

fn visual_hint_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\[\s*visual\s*:\s*([^\]]*)\]").ok())
        .as_ref()
}

fn bullet_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+(.*\S)\s*$").ok())
        .as_ref()
}

/// `Slide 3: Roadmap` → `Roadmap`
fn strip_slide_prefix(title: &str) -> &str {
    match slide_prefix_regex().and_then(|re| re.find(title)) {
        Some(m) if m.end() < title.len() => title[m.end()..].trim(),
        _ => title,
    }
}

/// Remove `[Visual: ...]` annotations, returning the cleaned body and the
/// joined hints
fn extract_visual_hints(body: &str) -> (String, Option<String>) {
    let Some(re) = visual_hint_regex() else {
        return (body.to_string(), None);
    };

    let hints: Vec<String> = re
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|h| !h.is_empty())
        .collect();

    if hints.is_empty() {
        return (body.to_string(), None);
    }

    // Drop lines left empty by the removal; keep intentional blank lines
    let cleaned = body
        .lines()
        .filter_map(|line| {
            let stripped = re.replace_all(line, "");
            if stripped.trim().is_empty() && !line.trim().is_empty() {
                None
            } else {
                Some(stripped.trim_end().to_string())
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    (cleaned, Some(hints.join("; ")))
}

fn is_thematic_break(line: &str) -> bool {
    let trimmed: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    trimmed.len() >= 3
        && (trimmed.chars().all(|c| c == '-')
            || trimmed.chars().all(|c| c == '*')
            || trimmed.chars().all(|c| c == '_'))
}

fn split_bullets(body: &str) -> (String, Vec<String>) {
    let mut text_lines = Vec::new();
    let mut bullets = Vec::new();

    for line in body.lines() {
        if is_thematic_break(line) {
            continue;
        }
        match bullet_regex().and_then(|re| re.captures(line)) {
            Some(caps) => {
                if let Some(item) = caps.get(1) {
                    bullets.push(item.as_str().to_string());
                }
            }
            None => text_lines.push(line.trim()),
        }
    }

    // Collapse blank runs left behind by removed bullets
    let mut body_text = String::new();
    let mut pending_blank = false;
    for line in text_lines {
        if line.is_empty() {
            pending_blank = !body_text.is_empty();
            continue;
        }
        if pending_blank {
            body_text.push('\n');
            pending_blank = false;
        }
        if !body_text.is_empty() {
            body_text.push('\n');
        }
        body_text.push_str(line);
    }

    (body_text, bullets)
}

fn parse_global_style(body: &str) -> GlobalStyle {
    let mut style = GlobalStyle {
        text: body.to_string(),
        ..GlobalStyle::default()
    };

    for line in body.lines() {
        let line = bullet_regex()
            .and_then(|re| re.captures(line))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .unwrap_or(line)
            .replace("**", "");
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        let slot = if key.contains("theme") {
            &mut style.theme
        } else if key.contains("palette") || key.contains("color") || key.contains("colour") {
            &mut style.palette
        } else if key.contains("font") || key.contains("typography") {
            &mut style.fonts
        } else {
            continue;
        };
        if slot.is_none() {
            *slot = Some(value.to_string());
        }
    }

    style
}
