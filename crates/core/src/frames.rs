//! Stack frame normalization.
//!
//! Every producer of frames in this crate emits them outermost call first,
//! which is the order the store API displays them in. Native traces and
//! JavaScript `Error.stack` strings both arrive innermost first and are
//! reversed here.

use std::{collections::BTreeMap, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const UNKNOWN_FILE: &str = "<unknown file>";
pub const UNKNOWN_FUNCTION: &str = "<unknown function>";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub filename: String,
    pub function: String,
    pub lineno: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colno: Option<u32>,
    #[serde(default)]
    pub vars: BTreeMap<String, Value>,
}

/// One entry of a host call stack, as captured at the error site
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativeFrame {
    pub file: String,
    pub function: String,
    pub line: u32,
    pub locals: BTreeMap<String, Value>,
}

/// Convert an innermost-first native call stack into frames.
pub fn frames_from_native(trace: &[NativeFrame]) -> Vec<Frame> {
    trace
        .iter()
        .rev()
        .map(|frame| Frame {
            filename: frame.file.clone(),
            function: frame.function.clone(),
            lineno: frame.line,
            colno: None,
            vars: frame.locals.clone(),
        })
        .collect()
}

// Gecko/Safari: `func@http://host/app.js:10:5`
static GECKO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:\s*([^@]*)(?:\((.*?)\))?@)?(\S.*?):(\d+)(?::(\d+))?\s*$")
        .expect("gecko stack pattern")
});

// V8/Chrome: `    at func (http://host/app.js:10:5)`
static CHROME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*at (?:(?:(?:Anonymous function)?|((?:\[object object\])?\S+(?: \[as \S+\])?)) )?\(?((?:file|http|https):.*?):(\d+)(?::(\d+))?\)?\s*$",
    )
    .expect("chrome stack pattern")
});

/// Parse a browser `Error.stack` string. Lines that match neither dialect are skipped.
pub fn parse_javascript_stack(stack: &str) -> Vec<Frame> {
    let mut frames: Vec<Frame> = stack
        .lines()
        .filter_map(|line| {
            if let Some(caps) = GECKO.captures(line) {
                Some(js_frame(caps.get(3), caps.get(1), caps.get(4), caps.get(5)))
            } else {
                CHROME
                    .captures(line)
                    .map(|caps| js_frame(caps.get(2), caps.get(1), caps.get(3), caps.get(4)))
            }
        })
        .collect();
    frames.reverse();
    frames
}

fn js_frame(
    file: Option<regex::Match<'_>>,
    function: Option<regex::Match<'_>>,
    line: Option<regex::Match<'_>>,
    column: Option<regex::Match<'_>>,
) -> Frame {
    let text = |m: Option<regex::Match<'_>>, fallback: &str| {
        m.map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty())
            .unwrap_or(fallback)
            .to_string()
    };
    let number = |m: Option<regex::Match<'_>>| m.and_then(|m| m.as_str().parse::<u32>().ok());

    Frame {
        filename: text(file, UNKNOWN_FILE),
        function: text(function, UNKNOWN_FUNCTION),
        lineno: number(line).unwrap_or(0),
        colno: number(column),
        vars: BTreeMap::new(),
    }
}
