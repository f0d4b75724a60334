use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::core::{DisplayStyle, Resource};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    pub prec: u32,
    pub always_show_sign: bool,
    pub capitalize: bool,
    /// Distance from one within which a count reads as singular.
    pub tolerance: Decimal,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            prec: 0,
            always_show_sign: false,
            capitalize: true,
            tolerance: Decimal::new(1, 3),
        }
    }
}

impl FormatOptions {
    /// Unknown keys are ignored; a malformed map falls back to the defaults.
    pub fn from_map(map: &serde_json::Map<String, serde_json::Value>) -> Self {
        serde_json::from_value(serde_json::Value::Object(map.clone())).unwrap_or_default()
    }
}

pub trait Formatter {
    fn format_count(&self, resource: &Resource, count: Decimal) -> String;
    fn format_rate(&self, resource: &Resource) -> String;
    fn format_name(&self, resource: &Resource, count: Decimal) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct PlainFormatter {
    pub options: FormatOptions,
}

impl PlainFormatter {
    pub fn new(options: FormatOptions) -> Self {
        Self { options }
    }

    fn number(&self, value: Decimal) -> String {
        let rounded = value.round_dp(self.options.prec);
        let text = format!("{:.*}", self.options.prec as usize, rounded);
        self.signed(text, !value.is_sign_negative())
    }

    fn signed(&self, text: String, non_negative: bool) -> String {
        if self.options.always_show_sign && non_negative && !text.starts_with(['+', '-']) {
            format!("+{text}")
        } else {
            text
        }
    }
}

impl Formatter for PlainFormatter {
    fn format_count(&self, resource: &Resource, count: Decimal) -> String {
        match resource.display {
            DisplayStyle::None => String::new(),
            DisplayStyle::Number => self.number(count),
            DisplayStyle::Percentage => format!("{}%", self.number(count * Decimal::ONE_HUNDRED)),
            DisplayStyle::Time => clock(count),
        }
    }

    fn format_rate(&self, resource: &Resource) -> String {
        format!("{}/s", self.format_count(resource, resource.rate()))
    }

    fn format_name(&self, resource: &Resource, count: Decimal) -> String {
        let singular = (count.abs() - Decimal::ONE).abs() <= self.options.tolerance;
        let word = if singular {
            resource.singular()
        } else {
            resource.plural()
        };
        if self.options.capitalize {
            capitalize_words(word)
        } else {
            word.to_string()
        }
    }
}

/// `H:MM:SS` for a count of seconds; negative durations read as `never`.
fn clock(seconds: Decimal) -> String {
    let Some(total) = seconds.floor().to_i64() else {
        return "never".to_string();
    };
    if total < 0 {
        return "never".to_string();
    }
    let (hours, minutes, secs) = (total / 3600, (total / 60) % 60, total % 60);
    format!("{hours}:{minutes:02}:{secs:02}")
}

fn capitalize_words(word: &str) -> String {
    word.split(['_', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
