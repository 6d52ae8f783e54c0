//! Page/range expressions such as `1,3-5,7` resolved against the slide count

use crate::error::SelectionError;
use std::collections::BTreeSet;
use std::fmt;

/// Ordered set of 1-based slide indices, each valid for the outline it was
/// resolved against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection(BTreeSet<usize>);

impl Selection {
    pub fn all(slide_count: usize) -> Self {
        Self((1..=slide_count).collect())
    }

    /// Resolve an optional expression against `slide_count` slides.
    /// `None` selects every slide.
    pub fn resolve(expr: Option<&str>, slide_count: usize) -> Result<Self, SelectionError> {
        match expr {
            None => Ok(Self::all(slide_count)),
            Some(expr) => parse_selection(expr, slide_count),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.contains(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for Selection {
    /// Compact form: consecutive runs collapse to `a-b`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        let mut iter = self.0.iter().copied().peekable();
        while let Some(start) = iter.next() {
            let mut end = start;
            while iter.peek() == Some(&(end + 1)) {
                end += 1;
                iter.next();
            }
            if start == end {
                parts.push(start.to_string());
            } else {
                parts.push(format!("{start}-{end}"));
            }
        }
        write!(f, "{}", parts.join(","))
    }
}

fn invalid(token: &str, reason: impl Into<String>) -> SelectionError {
    SelectionError::InvalidSelection {
        token: token.to_string(),
        reason: reason.into(),
    }
}

fn parse_page(raw: &str, token: &str) -> Result<usize, SelectionError> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(token, format!("'{raw}' is not a page number")));
    }
    let page: usize = raw
        .parse()
        .map_err(|_| invalid(token, format!("'{raw}' is not a page number")))?;
    if page == 0 {
        return Err(invalid(token, "page numbers start at 1"));
    }
    Ok(page)
}

/// Parse `expr` (comma-separated pages and inclusive `a-b` ranges).
///
/// Any token reaching outside `1..=slide_count` is an error; ranges are
/// never clamped.
pub fn parse_selection(expr: &str, slide_count: usize) -> Result<Selection, SelectionError> {
    let mut pages = BTreeSet::new();

    for token in expr.split(',') {
        let token = token.trim();
        if token.is_empty() {
            return Err(invalid(token, "empty page token"));
        }

        let (start, end) = match token.split_once('-') {
            Some((a, b)) => {
                let start = parse_page(a, token)?;
                let end = parse_page(b, token)?;
                if start > end {
                    return Err(invalid(
                        token,
                        format!("range start {start} is greater than end {end}"),
                    ));
                }
                (start, end)
            }
            None => {
                let page = parse_page(token, token)?;
                (page, page)
            }
        };

        if end > slide_count {
            return Err(invalid(
                token,
                format!("outline has {slide_count} slide(s)"),
            ));
        }
        pages.extend(start..=end);
    }

    Ok(Selection(pages))
}
