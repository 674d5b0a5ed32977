use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use ttf_parser::Face;

/// Width of an average glyph relative to the font size, used when no system
/// font matches the requested family.
const FALLBACK_CHAR_WIDTH: f32 = 0.56;

const ELLIPSIS: char = '\u{2026}';

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> = Lazy::new(|| Mutex::new(TextMeasurer::new()));

/// Advance width of `text` in the first installed font of `font_family`, or
/// `None` when no such font can be loaded.
pub fn measure_text_width(text: &str, font_size: f32, font_family: &str) -> Option<f32> {
    if text.is_empty() || font_size <= 0.0 {
        return Some(0.0);
    }
    let mut guard = TEXT_MEASURER.lock().ok()?;
    guard.measure(text, font_size, font_family)
}

/// Like [`measure_text_width`] but never fails: falls back to a fixed
/// per-character estimate.
pub fn text_width(text: &str, font_size: f32, font_family: &str) -> f32 {
    measure_text_width(text, font_size, font_family)
        .unwrap_or_else(|| text.chars().count() as f32 * font_size * FALLBACK_CHAR_WIDTH)
}

/// Greedy word wrap to `max_width`. Words wider than a line are broken
/// between characters.
pub fn wrap_text(text: &str, max_width: f32, font_size: f32, font_family: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if text_width(&candidate, font_size, font_family) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if text_width(word, font_size, font_family) <= max_width {
                current = word.to_string();
                continue;
            }
            for ch in word.chars() {
                current.push(ch);
                if current.chars().count() > 1 && text_width(&current, font_size, font_family) > max_width {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(ch);
                }
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

/// Keeps at most `max_lines`, ending the last kept line with an ellipsis when
/// anything was cut.
pub fn clamp_lines(
    mut lines: Vec<String>,
    max_lines: usize,
    max_width: f32,
    font_size: f32,
    font_family: &str,
) -> Vec<String> {
    if lines.len() <= max_lines {
        return lines;
    }
    lines.truncate(max_lines);
    if let Some(last) = lines.last_mut() {
        let mut text = last.trim_end().to_string();
        loop {
            let candidate = format!("{text}{ELLIPSIS}");
            if text.is_empty() || text_width(&candidate, font_size, font_family) <= max_width {
                *last = candidate;
                break;
            }
            text.pop();
            text.truncate(text.trim_end().len());
        }
    }
    lines
}

struct TextMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    cache: HashMap<String, Option<FontMetrics>>,
}

impl TextMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            cache: HashMap::new(),
        }
    }

    fn measure(&mut self, text: &str, font_size: f32, font_family: &str) -> Option<f32> {
        let key = normalize_family_key(font_family);
        if !self.cache.contains_key(&key) {
            let metrics = self.load_metrics(font_family);
            self.cache.insert(key.clone(), metrics);
        }
        let metrics = self.cache.get_mut(&key)?.as_mut()?;
        Some(metrics.measure_width(&text.replace('\t', "    "), font_size))
    }

    fn load_metrics(&mut self, font_family: &str) -> Option<FontMetrics> {
        let names: Vec<String> = font_family
            .split(',')
            .map(|part| part.trim().trim_matches('"').trim_matches('\'').to_string())
            .filter(|name| !name.is_empty())
            .collect();
        let mut families: Vec<Family<'_>> = names
            .iter()
            .map(|name| match name.to_ascii_lowercase().as_str() {
                "serif" => Family::Serif,
                "sans-serif" | "system-ui" | "-apple-system" | "ui-sans-serif" => Family::SansSerif,
                "monospace" | "ui-monospace" => Family::Monospace,
                _ => Family::Name(name.as_str()),
            })
            .collect();
        if families.is_empty() {
            families.push(Family::SansSerif);
        }

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }
        let query = Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        };
        let id = self.db.query(&query)?;
        self.db
            .with_face_data(id, |data, index| FontMetrics::new(data.to_vec(), index))
            .flatten()
    }
}

/// Horizontal advances of one font face. ASCII advances are read up front;
/// other characters are looked up in the face on demand and cached.
struct FontMetrics {
    data: Vec<u8>,
    index: u32,
    units_per_em: f32,
    ascii_advances: [u16; 128],
    advance_cache: HashMap<char, Option<u16>>,
}

impl FontMetrics {
    fn new(data: Vec<u8>, index: u32) -> Option<Self> {
        let face = Face::parse(&data, index).ok()?;
        let units_per_em = face.units_per_em().max(1) as f32;
        let mut ascii_advances = [0u16; 128];
        for byte in 0u8..=127 {
            if let Some(glyph) = face.glyph_index(byte as char) {
                ascii_advances[byte as usize] = face.glyph_hor_advance(glyph).unwrap_or(0);
            }
        }
        Some(Self {
            data,
            index,
            units_per_em,
            ascii_advances,
            advance_cache: HashMap::new(),
        })
    }

    fn measure_width(&mut self, text: &str, font_size: f32) -> f32 {
        let scale = font_size / self.units_per_em;
        let fallback = font_size * FALLBACK_CHAR_WIDTH;
        let mut face: Option<Face<'_>> = None;
        let mut width = 0.0f32;
        for ch in text.chars().filter(|ch| *ch != '\n') {
            let advance = if ch.is_ascii() {
                Some(self.ascii_advances[ch as usize]).filter(|advance| *advance > 0)
            } else if let Some(cached) = self.advance_cache.get(&ch) {
                *cached
            } else {
                if face.is_none() {
                    face = Face::parse(&self.data, self.index).ok();
                }
                let advance = face
                    .as_ref()
                    .and_then(|face| face.glyph_index(ch))
                    .and_then(|glyph| face.as_ref()?.glyph_hor_advance(glyph));
                self.advance_cache.insert(ch, advance);
                advance
            };
            width += advance.map_or(fallback, |advance| advance as f32 * scale);
        }
        width.max(0.0)
    }
}

fn normalize_family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAMILY: &str = "sans-serif";

    #[test]
    fn empty_text_has_no_width() {
        assert_eq!(measure_text_width("", 14.0, FAMILY), Some(0.0));
        assert_eq!(text_width("", 14.0, FAMILY), 0.0);
    }

    #[test]
    fn wide_box_keeps_one_line() {
        let lines = wrap_text("Search indexing rewrite", 10_000.0, 14.0, FAMILY);
        assert_eq!(lines, vec!["Search indexing rewrite".to_string()]);
    }

    #[test]
    fn narrow_box_wraps_every_word() {
        let lines = wrap_text("alpha beta gamma", 1.0, 14.0, FAMILY);
        assert!(lines.len() >= 3);
        assert!(lines.iter().all(|line| !line.contains(' ')));
    }

    #[test]
    fn clamped_lines_end_with_ellipsis() {
        let lines: Vec<String> = ["one", "two", "three", "four"].iter().map(|s| s.to_string()).collect();
        let clamped = clamp_lines(lines, 2, 10_000.0, 14.0, FAMILY);
        assert_eq!(clamped, vec!["one".to_string(), "two\u{2026}".to_string()]);
        let short = clamp_lines(vec!["one".to_string()], 2, 10_000.0, 14.0, FAMILY);
        assert_eq!(short, vec!["one".to_string()]);
    }
}
