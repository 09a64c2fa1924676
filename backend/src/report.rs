//! Localized, HTML-formatted text for the notification channel.

use crate::analysis::AssessmentReport;
use crate::locale::{self, Locale};

/// Telegram caps photo captions at 1024 characters.
pub const CAPTION_LIMIT: usize = 1024;

struct Labels {
    greeting: &'static str,
    quality: &'static str,
    defects: &'static str,
    defects_yes: &'static str,
    defects_no: &'static str,
    file_type: &'static str,
    size: &'static str,
    hue: &'static str,
    color: &'static str,
    brightness: &'static str,
}

const EN: Labels = Labels {
    greeting: "Hello, your analysis results are ready!",
    quality: "Quality class:",
    defects: "Defects:",
    defects_yes: "Yes",
    defects_no: "No",
    file_type: "Type:",
    size: "Size:",
    hue: "Hue:",
    color: "Color:",
    brightness: "Brightness:",
};

const RU: Labels = Labels {
    greeting: "Здравствуйте, результаты анализа готовы!",
    quality: "Класс качества:",
    defects: "Дефекты:",
    defects_yes: "Есть",
    defects_no: "Нет",
    file_type: "Тип:",
    size: "Размер:",
    hue: "Оттенок:",
    color: "Цвет:",
    brightness: "Яркость:",
};

fn labels(locale: Locale) -> &'static Labels {
    match locale {
        Locale::En => &EN,
        Locale::Ru => &RU,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedReport {
    text: String,
    split_at: Option<usize>,
}

impl FormattedReport {
    /// Splits after the last full line that fits into `limit` characters.
    /// Every line closes its own markup, so neither part ends up with a
    /// dangling tag or a cut entity.
    fn new(text: String, limit: usize) -> Self {
        let split_at = text.char_indices().nth(limit).map(|(cut, _)| {
            text[..cut].rfind('\n').map(|newline| newline + 1).unwrap_or(0)
        });
        Self { text, split_at }
    }

    pub fn full_text(&self) -> &str {
        &self.text
    }

    /// Whole lines of the text that fit the caption limit. Empty when even the
    /// first line is too long.
    pub fn caption(&self) -> &str {
        match self.split_at {
            Some(i) => &self.text[..i],
            None => &self.text,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.split_at.is_some()
    }

    /// Whatever did not fit into the caption.
    pub fn remainder(&self) -> Option<&str> {
        self.split_at.map(|i| &self.text[i..])
    }
}

pub fn format(report: &AssessmentReport, locale: Locale) -> FormattedReport {
    format_with_limit(report, locale, CAPTION_LIMIT)
}

pub fn format_with_limit(report: &AssessmentReport, locale: Locale, limit: usize) -> FormattedReport {
    let l = labels(locale);
    let color = report.color();
    let color_text = if color.is_undefined() {
        locale::hue_word(color.hue, locale).to_string()
    } else {
        format!(
            "{} {}",
            locale::brightness_word(color.brightness, locale),
            locale::hue_word(color.hue, locale)
        )
    };
    let (defect_marker, defect_word) = if report.defects().has_defects() {
        ("🔴", l.defects_yes)
    } else {
        ("-", l.defects_no)
    };

    let text = format!(
        "✅ <b>{}</b>\n\n\
         🟩<b>{}</b> {}\n\
         {} <b>{}</b> {}\n\
         - <b>{}</b> {}\n\
         - <b>{}</b> {}\n\
         - <b>{}</b> {}\n\
         - <b>{}</b> {}\n\
         - <b>{}</b> {}\n",
        l.greeting,
        l.quality,
        locale::quality_word(report.quality(), locale),
        defect_marker,
        l.defects,
        defect_word,
        l.file_type,
        escape_html(report.file_type()),
        l.size,
        report.size(),
        l.hue,
        locale::hue_word(color.hue, locale),
        l.color,
        color_text,
        l.brightness,
        locale::brightness_advisory(color.brightness, locale),
    );
    FormattedReport::new(text, limit)
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}
