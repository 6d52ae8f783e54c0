use serde::Serialize;

/// One slide's generation intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlideSpec {
    /// 1-based, contiguous over one parse
    pub index: usize,
    pub title: String,
    pub body_text: String,
    pub visual_hint: Option<String>,
    pub bullet_items: Vec<String>,
    /// Raw section markdown, passed verbatim to prompts
    pub content: String,
}

/// Deck-wide style directives taken from the reserved style section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GlobalStyle {
    pub theme: Option<String>,
    pub palette: Option<String>,
    pub fonts: Option<String>,
    /// Full section body
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outline {
    pub slides: Vec<SlideSpec>,
    pub global_style: Option<GlobalStyle>,
}

impl Outline {
    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn slide(&self, index: usize) -> Option<&SlideSpec> {
        index.checked_sub(1).and_then(|i| self.slides.get(i))
    }
}
