//! Prompt rendering for slide generation requests.

use crate::outline::{GlobalStyle, Outline, SlideSpec};
use crate::provider::GenerationRequest;
use std::sync::Arc;

const PREVIEW_CHARS: usize = 200;

const DESIGN_STANDARDS: &str = "\
You are a senior presentation designer.
Render exactly one finished slide as a 1920x1080 (16:9, landscape) image.

# DESIGN STANDARDS
- Typography: clean sans-serif, titles at 60pt or larger, body text at 24pt or larger.
- Margins: keep a 5% safe area on every edge; nothing touches the border.
- Deck identity: this slide is one page of a larger deck and must look like it.";

const LAYOUT_GUIDE: &str = "\
# LAYOUTS
- Title: large centered title, strong background, minimal imagery.
- Split: text on one side, illustration or chart on the other.
- Grid: two to four content blocks for parallel points.
- Data: one dominant chart with a short takeaway.
- Statement: a single sentence or quote in the center.

# INTERPRETATION
- A visual direction given with the slide overrides your own imagery choices.
- Show the idea instead of pasting the text.
- Lists become clean bulleted or icon layouts; numbers become charts.

# AVOID
- Spelling mistakes, placeholder or lorem ipsum text.
- Walls of text: at most about 30 words unless the content is a list.
- Cropped elements and low-contrast text.
- Photorealistic human faces.";

const REFERENCE_STYLE: &str = "\
# STYLE REFERENCE IMAGE (follow strictly)
- Take the palette, background treatment, typography and grid from the attached image.
- Match its colors exactly so the new slide sits in the same deck.
- Keep the reference's look but replace its content with the slide below.";

const ADAPTIVE_STYLE: &str = "\
# STYLE (adaptive)
- Pick a professional palette suited to the subject matter.
- Clean solid or subtly graded background with high text contrast.
- Flat or semi-flat vector graphics, minimal shadows.";

const ARTICLE_NOTE: &str = "\
# SOURCE ARTICLE
Background article text is provided earlier in the conversation. Draw facts, \
figures and terminology from it so the slide stays accurate.";

/// Compact deck overview included in every slide's system prompt
pub fn outline_context(outline: &Outline) -> String {
    let mut out = String::from("# DECK OUTLINE (for visual continuity)");
    for slide in &outline.slides {
        out.push_str(&format!("\n- Slide {}: {}", slide.index, slide.title));
        out.push_str(&format!("\n  Content: {}", preview(&slide.content)));
    }
    out
}

fn preview(content: &str) -> String {
    let flat = content.replace('\n', " ");
    match flat.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}

fn style_instruction(global_style: Option<&GlobalStyle>, with_reference: bool) -> String {
    if with_reference {
        return REFERENCE_STYLE.to_string();
    }
    match global_style {
        Some(style) => {
            let mut out = String::from("# DECK STYLE (follow strictly)\n");
            out.push_str(style.text.trim());
            let named: Vec<String> = [
                ("Theme", &style.theme),
                ("Palette", &style.palette),
                ("Fonts", &style.fonts),
            ]
            .iter()
            .filter_map(|(label, value)| value.as_ref().map(|v| format!("- {label}: {v}")))
            .collect();
            if !named.is_empty() {
                out.push_str("\n\nKey settings:\n");
                out.push_str(&named.join("\n"));
            }
            out.push_str("\n\nMatch this theme, palette and typography exactly.");
            out
        }
        None => ADAPTIVE_STYLE.to_string(),
    }
}

pub fn system_prompt(
    outline_context: &str,
    global_style: Option<&GlobalStyle>,
    with_reference: bool,
    with_article: bool,
) -> String {
    let mut parts = vec![DESIGN_STANDARDS.to_string(), outline_context.to_string()];
    if with_article {
        parts.push(ARTICLE_NOTE.to_string());
    }
    parts.push(style_instruction(global_style, with_reference));
    parts.push(LAYOUT_GUIDE.to_string());
    parts.join("\n\n")
}

pub fn user_prompt(slide: &SlideSpec) -> String {
    let mut out = format!(
        "SLIDE {}\n**Title**: {}\n\n**Content**:\n{}\n",
        slide.index,
        slide.title,
        slide.content.trim()
    );
    if let Some(hint) = &slide.visual_hint {
        out.push_str(&format!("\n**Visual direction**: {hint}\n"));
    }
    out.push_str(
        "\n**Instructions**:\n\
         1. Choose the layout from the list above that fits this content best.\n\
         2. Make the title the most prominent text on the slide.\n\
         3. Render only this slide.\n",
    );
    out
}

/// Shared inputs for every request of one run
pub struct PromptInputs {
    pub outline_context: String,
    pub style_image: Option<Arc<[u8]>>,
    pub article_context: Option<Arc<str>>,
}

impl PromptInputs {
    pub fn new(
        outline: &Outline,
        style_image: Option<Arc<[u8]>>,
        article_context: Option<Arc<str>>,
    ) -> Self {
        Self {
            outline_context: outline_context(outline),
            style_image,
            article_context,
        }
    }

    pub fn request(&self, outline: &Outline, slide: &SlideSpec) -> GenerationRequest {
        GenerationRequest {
            slide_index: slide.index,
            system_prompt: system_prompt(
                &self.outline_context,
                outline.global_style.as_ref(),
                self.style_image.is_some(),
                self.article_context.is_some(),
            ),
            user_prompt: user_prompt(slide),
            reference_image: self.style_image.clone(),
            context: self.article_context.clone(),
        }
    }
}
