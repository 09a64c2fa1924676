use std::str::FromStr;

use shared::{BrightnessBucket, HueBucket, QualityLabel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    En,
    #[default]
    Ru,
}

#[derive(Debug, thiserror::Error)]
#[error("Unsupported locale: {0}")]
pub struct UnknownLocale(String);

impl FromStr for Locale {
    type Err = UnknownLocale;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "en-us" | "en-gb" => Ok(Locale::En),
            "ru" | "ru-ru" => Ok(Locale::Ru),
            other => Err(UnknownLocale(other.to_string())),
        }
    }
}

pub fn quality_word(label: QualityLabel, locale: Locale) -> &'static str {
    match (locale, label) {
        (Locale::En, QualityLabel::Excellent) => "Excellent",
        (Locale::En, QualityLabel::Good) => "Good",
        (Locale::En, QualityLabel::Fair) => "Fair",
        (Locale::En, QualityLabel::Poor) => "Poor",
        (Locale::En, QualityLabel::Scrap) => "Scrap",
        (Locale::Ru, QualityLabel::Excellent) => "Отлично",
        (Locale::Ru, QualityLabel::Good) => "Хорошо",
        (Locale::Ru, QualityLabel::Fair) => "Неплохо",
        (Locale::Ru, QualityLabel::Poor) => "Плохо",
        (Locale::Ru, QualityLabel::Scrap) => "Отход",
    }
}

pub fn hue_word(hue: HueBucket, locale: Locale) -> &'static str {
    match (locale, hue) {
        (Locale::En, HueBucket::Red) => "Red",
        (Locale::En, HueBucket::Orange) => "Orange",
        (Locale::En, HueBucket::Yellow) => "Yellow",
        (Locale::En, HueBucket::Green) => "Green",
        (Locale::En, HueBucket::Cyan) => "Cyan",
        (Locale::En, HueBucket::Blue) => "Blue",
        (Locale::En, HueBucket::Undefined) => "Undefined",
        (Locale::Ru, HueBucket::Red) => "Красный",
        (Locale::Ru, HueBucket::Orange) => "Оранжевый",
        (Locale::Ru, HueBucket::Yellow) => "Жёлтый",
        (Locale::Ru, HueBucket::Green) => "Зелёный",
        (Locale::Ru, HueBucket::Cyan) => "Голубой",
        (Locale::Ru, HueBucket::Blue) => "Синий",
        (Locale::Ru, HueBucket::Undefined) => "Неопределённый",
    }
}

/// Adjective used when composing the display color ("Dark Red").
pub fn brightness_word(brightness: BrightnessBucket, locale: Locale) -> &'static str {
    match (locale, brightness) {
        (Locale::En, BrightnessBucket::Dark) => "Dark",
        (Locale::En, BrightnessBucket::Medium) => "Medium",
        (Locale::En, BrightnessBucket::Light) => "Light",
        (Locale::En, BrightnessBucket::Undefined) => "Undefined",
        (Locale::Ru, BrightnessBucket::Dark) => "Тёмный",
        (Locale::Ru, BrightnessBucket::Medium) => "Средний",
        (Locale::Ru, BrightnessBucket::Light) => "Светлый",
        (Locale::Ru, BrightnessBucket::Undefined) => "Неопределённый",
    }
}

/// Advisory shown next to the brightness value. The canonical report
/// carries the Russian phrase.
pub fn brightness_advisory(brightness: BrightnessBucket, locale: Locale) -> &'static str {
    match (locale, brightness) {
        (Locale::En, BrightnessBucket::Dark) => "Underexposed (better retake the photo)",
        (Locale::En, BrightnessBucket::Medium) => "Normal brightness",
        (Locale::En, BrightnessBucket::Light) => "Excellent brightness",
        (Locale::En, BrightnessBucket::Undefined) => "Undefined",
        (Locale::Ru, BrightnessBucket::Dark) => "Затемнённо (лучше переделать фото)",
        (Locale::Ru, BrightnessBucket::Medium) => "Нормальная яркость",
        (Locale::Ru, BrightnessBucket::Light) => "Отличная яркость",
        (Locale::Ru, BrightnessBucket::Undefined) => "Неопределённо",
    }
}
