use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::HeaderError;
use crate::params::MAX_PARAMETERS;

static HEADER_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*):").expect("header key pattern"));

static SLIDER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^slider(\d+):([^<]+)<([^,>]+),([^,>]+),?([^>]*)>(.*)$").expect("slider pattern")
});

const DEFAULT_STEP: f64 = 0.01;

/// Metadata declared before the first section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptInfo {
    pub description: String,
    pub author: String,
    pub tags: Vec<String>,
    pub in_pins: Vec<String>,
    pub out_pins: Vec<String>,
    /// Declared sliders, ordered by index.
    pub sliders: Vec<SliderInfo>,
}

/// One `sliderN:default<min,max,step>label` declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SliderInfo {
    /// Zero-based parameter slot.
    pub index: usize,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub label: String,
    /// Labels from a `{a,b,c}` list after the step, if any.
    pub enum_values: Vec<String>,
}

impl ScriptInfo {
    /// One past the highest declared slider slot.
    pub fn parameter_count(&self) -> usize {
        self.sliders.iter().map(|s| s.index + 1).max().unwrap_or(0)
    }

    pub fn slider(&self, index: usize) -> Option<&SliderInfo> {
        self.sliders.iter().find(|s| s.index == index)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn insert_slider(&mut self, slider: SliderInfo) {
        match self.sliders.binary_search_by_key(&slider.index, |s| s.index) {
            Ok(pos) => self.sliders[pos] = slider,
            Err(pos) => self.sliders.insert(pos, slider),
        }
    }
}

/// Split a script into header metadata and body.
///
/// `key:` lines before the first `@` line are metadata. They are blanked in
/// the returned body so that body line numbers still match the source.
pub fn parse_header(source: &str) -> Result<(ScriptInfo, String), HeaderError> {
    let mut info = ScriptInfo::default();
    let mut body = String::with_capacity(source.len());
    let mut in_header = true;

    for (index, raw) in source.split_inclusive('\n').enumerate() {
        let line_number = index + 1;
        let line = raw.trim_end_matches(['\n', '\r']);
        let trimmed = line.trim();

        if trimmed.starts_with('@') {
            in_header = false;
        }
        let key = if in_header {
            HEADER_KEY.captures(trimmed).and_then(|c| c.get(1)).map(|m| m.as_str())
        } else {
            None
        };

        match key {
            Some(key) => {
                apply_header_line(&mut info, key, trimmed, line_number)?;
                if raw.ends_with('\n') {
                    body.push('\n');
                }
            }
            None => body.push_str(raw),
        }
    }

    log::debug!(
        "header: '{}', {} slider(s), {} in / {} out pin(s)",
        info.description,
        info.sliders.len(),
        info.in_pins.len(),
        info.out_pins.len()
    );
    Ok((info, body))
}

fn apply_header_line(
    info: &mut ScriptInfo,
    key: &str,
    line: &str,
    line_number: usize,
) -> Result<(), HeaderError> {
    let value = line[key.len() + 1..].trim();
    match key {
        "desc" => info.description = value.to_string(),
        "author" => info.author = value.to_string(),
        "tags" => {
            info.tags = value
                .split_whitespace()
                .map(str::to_string)
                .collect();
        }
        "in_pin" => info.in_pins.push(value.to_string()),
        "out_pin" => info.out_pins.push(value.to_string()),
        _ if is_slider_key(key) => info.insert_slider(parse_slider(line, line_number)?),
        _ => log::debug!("ignoring header key '{key}' on line {line_number}"),
    }
    Ok(())
}

fn is_slider_key(key: &str) -> bool {
    key.strip_prefix("slider")
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

fn parse_slider(line: &str, line_number: usize) -> Result<SliderInfo, HeaderError> {
    let invalid = || HeaderError::InvalidSlider {
        line: line_number,
        text: line.to_string(),
    };
    let caps = SLIDER_LINE.captures(line).ok_or_else(invalid)?;
    let group = |i: usize| caps.get(i).map_or("", |m| m.as_str());

    let number: usize = group(1).parse().map_err(|_| invalid())?;
    if !(1..=MAX_PARAMETERS).contains(&number) {
        return Err(HeaderError::SliderIndexOutOfRange {
            line: line_number,
            index: number,
        });
    }

    let number_field = |field: &'static str, text: &str| {
        text.trim().parse::<f64>().map_err(|_| HeaderError::InvalidNumber {
            line: line_number,
            field,
            text: text.trim().to_string(),
        })
    };

    let (step_text, enum_values) = split_enum(group(5));
    let step = if step_text.trim().is_empty() {
        DEFAULT_STEP
    } else {
        number_field("step", step_text)?
    };

    Ok(SliderInfo {
        index: number - 1,
        default: number_field("default", group(2))?,
        min: number_field("min", group(3))?,
        max: number_field("max", group(4))?,
        step,
        label: group(6).trim().to_string(),
        enum_values,
    })
}

/// `1{Off,On}` → (`1`, [Off, On]).
fn split_enum(text: &str) -> (&str, Vec<String>) {
    let Some(open) = text.find('{') else {
        return (text, Vec::new());
    };
    let list = &text[open + 1..];
    let list = list.strip_suffix('}').unwrap_or(list);
    let values = list
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    (&text[..open], values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_header() {
        let source = "desc:Simple Gain\nauthor: someone\ntags: utility gain\nin_pin:left\nin_pin:right\nout_pin:left\nslider1:0.5<0,1,0.01>Gain\n@sample\nspl0 *= slider1;\n";
        let (info, body) = parse_header(source).unwrap();
        assert_eq!(info.description, "Simple Gain");
        assert_eq!(info.author, "someone");
        assert_eq!(info.tags, vec!["utility", "gain"]);
        assert_eq!(info.in_pins, vec!["left", "right"]);
        assert_eq!(info.out_pins, vec!["left"]);
        assert_eq!(info.sliders.len(), 1);
        let s = &info.sliders[0];
        assert_eq!(s.index, 0);
        assert_eq!((s.default, s.min, s.max, s.step), (0.5, 0.0, 1.0, 0.01));
        assert_eq!(s.label, "Gain");
        assert_eq!(info.parameter_count(), 1);

        // Header lines are blanked, line count preserved.
        assert_eq!(body.lines().count(), source.lines().count());
        assert!(!body.contains("desc"));
        assert!(body.contains("@sample\nspl0 *= slider1;"));
    }

    #[test]
    fn test_default_step() {
        let (info, _) = parse_header("slider2:100<20,20000>Freq (Hz)\n@init\n").unwrap();
        let s = info.slider(1).unwrap();
        assert_eq!(s.step, 0.01);
        assert_eq!(s.label, "Freq (Hz)");
        assert_eq!(info.parameter_count(), 2);
    }

    #[test]
    fn test_enum_labels() {
        let (info, _) = parse_header("slider1:0<0,2,1{Off, On,Auto}>Mode\n").unwrap();
        let s = &info.sliders[0];
        assert_eq!(s.step, 1.0);
        assert_eq!(s.enum_values, vec!["Off", "On", "Auto"]);
    }

    #[test]
    fn test_sliders_sorted_and_replaced() {
        let (info, _) =
            parse_header("slider3:1<0,2>C\nslider1:0<0,1>A\nslider3:2<0,4>C2\n").unwrap();
        let indices: Vec<usize> = info.sliders.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 2]);
        assert_eq!(info.sliders[1].label, "C2");
    }

    #[test]
    fn test_malformed_slider() {
        let err = parse_header("desc:x\nslider1:oops\n").unwrap_err();
        assert!(matches!(err, HeaderError::InvalidSlider { line: 2, .. }), "got {err:?}");
    }

    #[test]
    fn test_slider_index_range() {
        let err = parse_header("slider65:0<0,1>X\n").unwrap_err();
        assert_eq!(err, HeaderError::SliderIndexOutOfRange { line: 1, index: 65 });
        let err = parse_header("slider0:0<0,1>X\n").unwrap_err();
        assert_eq!(err, HeaderError::SliderIndexOutOfRange { line: 1, index: 0 });
    }

    #[test]
    fn test_invalid_number() {
        let err = parse_header("slider1:0<zero,1>X\n").unwrap_err();
        match err {
            HeaderError::InvalidNumber { field, text, .. } => {
                assert_eq!(field, "min");
                assert_eq!(text, "zero");
            }
            other => panic!("Expected InvalidNumber, got {other:?}"),
        }
    }

    #[test]
    fn test_key_lines_after_first_section_are_code() {
        let (info, body) = parse_header("@init\ndesc:nope\n").unwrap();
        assert_eq!(info.description, "");
        assert!(body.contains("desc:nope"));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let (info, body) = parse_header("options:gmem=foo\nx = 1;\n@init\n").unwrap();
        assert_eq!(info, ScriptInfo::default());
        assert_eq!(body, "\nx = 1;\n@init\n");
    }

    #[test]
    fn test_json() {
        let (info, _) = parse_header("desc:G\nslider1:1<0,2>Gain\n").unwrap();
        let json = info.to_json().unwrap();
        assert!(json.contains("\"description\":\"G\""));
        assert!(json.contains("\"enumValues\":[]"));
    }
}
