//! The fixed action catalog and the user-authored action sequence.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::types::Point;

pub const PARAM_X: &str = "x";
pub const PARAM_Y: &str = "y";
pub const PARAM_TEXT: &str = "text";
pub const PARAM_DURATION: &str = "durationMs";
const PARAM_DURATION_LEGACY: &str = "duration_ms";

/// Delay applied when the editor's delay field is left empty.
pub const DEFAULT_ACTION_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    MoveToMatch,
    MoveToPosition,
    LeftClick,
    RightClick,
    DoubleClick,
    TypeText,
    PressKey,
    Wait,
}

/// Static description of one action kind
#[derive(Debug)]
pub struct ActionDefinition {
    pub kind: ActionKind,
    pub label: &'static str,
    pub requires_position: bool,
    pub position_optional: bool,
    pub requires_text: bool,
    pub delay_is_duration: bool,
    pub description: &'static str,
}

const fn def(
    kind: ActionKind,
    label: &'static str,
    requires_position: bool,
    position_optional: bool,
    requires_text: bool,
    description: &'static str,
) -> ActionDefinition {
    ActionDefinition {
        kind,
        label,
        requires_position,
        position_optional,
        requires_text,
        delay_is_duration: matches!(kind, ActionKind::Wait),
        description,
    }
}

/// Indexed by `ActionKind as usize`.
pub static CATALOG: [ActionDefinition; 8] = [
    def(ActionKind::MoveToMatch, "Move to Match", false, false, false,
        "Move cursor to the matched image center."),
    def(ActionKind::MoveToPosition, "Move to Position", true, false, false,
        "Move cursor to the specified X,Y coordinates."),
    def(ActionKind::LeftClick, "Left Click", false, true, false,
        "Left click at match center or optional coordinates."),
    def(ActionKind::RightClick, "Right Click", false, true, false,
        "Right click at match center or optional coordinates."),
    def(ActionKind::DoubleClick, "Double Click", false, true, false,
        "Double-click at match center or optional coordinates."),
    def(ActionKind::TypeText, "Type Text", false, false, true,
        "Type the provided text at the current cursor position."),
    def(ActionKind::PressKey, "Press Key", false, false, true,
        "Press a key or key combination (e.g. ctrl+alt+t)."),
    def(ActionKind::Wait, "Wait", false, false, false,
        "Pause for the specified delay before continuing."),
];

pub fn definition_for(kind: ActionKind) -> &'static ActionDefinition {
    &CATALOG[kind as usize]
}

impl ActionKind {
    pub const ALL: [ActionKind; 8] = [
        ActionKind::MoveToMatch,
        ActionKind::MoveToPosition,
        ActionKind::LeftClick,
        ActionKind::RightClick,
        ActionKind::DoubleClick,
        ActionKind::TypeText,
        ActionKind::PressKey,
        ActionKind::Wait,
    ];

    pub fn label(self) -> &'static str {
        definition_for(self).label
    }

    pub fn from_label(label: &str) -> CoreResult<Self> {
        let wanted = label.trim();
        CATALOG
            .iter()
            .find(|d| d.label.eq_ignore_ascii_case(wanted))
            .map(|d| d.kind)
            .ok_or_else(|| CoreError::UnknownActionKind(label.to_string()))
    }

    /// Kinds that fall back to the match center when no explicit
    /// position is given.
    pub fn anchors_to_match(self) -> bool {
        matches!(
            self,
            ActionKind::MoveToMatch | ActionKind::LeftClick | ActionKind::RightClick | ActionKind::DoubleClick
        )
    }

    /// Next kind in catalog order, wrapping around.
    pub fn next(self) -> Self {
        Self::ALL[(self as usize + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self as usize + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

pub type ActionParams = BTreeMap<String, Value>;

/// One authored step
#[derive(Debug, Clone, PartialEq)]
pub struct ActionItem {
    pub kind: ActionKind,
    pub params: ActionParams,
    pub delay_ms: u64,
}

/// Flat on-disk form of an `ActionItem`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    #[serde(alias = "action_type")]
    pub kind: String,
    #[serde(default)]
    pub params: ActionParams,
    #[serde(rename = "delayMs", alias = "delay_ms", default, deserialize_with = "lenient_delay")]
    pub delay_ms: u64,
}

/// Any JSON number; negatives load as zero and fractions are truncated.
fn lenient_delay<'de, D: serde::Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    match Value::deserialize(d)? {
        Value::Number(n) => Ok(n
            .as_u64()
            .or_else(|| n.as_i64().map(|_| 0))
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))
            .unwrap_or(0)),
        other => Err(serde::de::Error::custom(format!("delayMs must be a number, got {}", other))),
    }
}

/// Read an integer param; numeric strings are accepted too.
fn int_param(params: &ActionParams, key: &str) -> Option<i64> {
    match params.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl ActionItem {
    pub fn new(kind: ActionKind) -> Self {
        Self { kind, params: ActionParams::new(), delay_ms: 0 }
    }

    pub fn wait(duration_ms: u64) -> Self {
        Self::new(ActionKind::Wait).with_param(PARAM_DURATION, duration_ms)
    }

    pub fn with_position(self, x: i32, y: i32) -> Self {
        self.with_param(PARAM_X, x).with_param(PARAM_Y, y)
    }

    pub fn with_text(self, text: &str) -> Self {
        self.with_param(PARAM_TEXT, text)
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn definition(&self) -> &'static ActionDefinition {
        definition_for(self.kind)
    }

    /// Explicit `(x, y)` if both are present and integral.
    pub fn position(&self) -> Option<Point> {
        let x = int_param(&self.params, PARAM_X)?;
        let y = int_param(&self.params, PARAM_Y)?;
        Some(Point::new(i32::try_from(x).ok()?, i32::try_from(y).ok()?))
    }

    pub fn text(&self) -> Option<&str> {
        self.params.get(PARAM_TEXT).and_then(Value::as_str)
    }

    pub fn duration_ms(&self) -> Option<u64> {
        let read = |key: &str| match self.params.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        read(PARAM_DURATION).or_else(|| read(PARAM_DURATION_LEGACY))
    }

    pub fn to_record(&self) -> ActionRecord {
        ActionRecord {
            kind: self.kind.label().to_string(),
            params: self.params.clone(),
            delay_ms: self.delay_ms,
        }
    }

    /// Rebuild an item from a record. Unknown kinds and items that break
    /// the catalog invariants are rejected.
    pub fn from_record(record: ActionRecord) -> CoreResult<Self> {
        let kind = ActionKind::from_label(&record.kind)?;
        let mut params = record.params;
        if let Some(v) = params.remove(PARAM_DURATION_LEGACY) {
            params.entry(PARAM_DURATION.to_string()).or_insert(v);
        }
        let item = Self { kind, params, delay_ms: record.delay_ms };
        validate(&item)?;
        Ok(item)
    }

    /// Table label, e.g. `Type Text (hello)` or `Wait (500 ms)`.
    pub fn summary(&self) -> String {
        match self.kind {
            ActionKind::TypeText | ActionKind::PressKey => match self.text() {
                Some(t) if !t.is_empty() => {
                    let detail = if t.chars().count() > 20 {
                        format!("{}...", t.chars().take(17).collect::<String>())
                    } else {
                        t.to_string()
                    };
                    format!("{} ({})", self.kind.label(), detail)
                }
                _ => self.kind.label().to_string(),
            },
            ActionKind::Wait => format!("Wait ({} ms)", self.duration_ms().unwrap_or(0)),
            _ => self.kind.label().to_string(),
        }
    }

    pub fn position_label(&self) -> String {
        if let Some(p) = self.position() {
            return p.to_string();
        }
        match self.kind {
            ActionKind::MoveToMatch => "Match center".to_string(),
            ActionKind::TypeText | ActionKind::PressKey | ActionKind::Wait => "-".to_string(),
            _ => "Match".to_string(),
        }
    }

    pub fn delay_label(&self) -> String {
        match self.kind {
            ActionKind::Wait => format!("{} ms", self.duration_ms().unwrap_or(0)),
            _ => format!("{} ms", self.delay_ms),
        }
    }
}

/// Check an item against its catalog definition.
pub fn validate(item: &ActionItem) -> CoreResult<()> {
    let def = item.definition();
    let has_x = item.params.contains_key(PARAM_X);
    let has_y = item.params.contains_key(PARAM_Y);

    if def.requires_position && item.position().is_none() {
        return Err(CoreError::validation(format!("{} requires X and Y coordinates.", def.label)));
    }
    if def.position_optional {
        if has_x != has_y {
            return Err(CoreError::validation("Provide both X and Y or leave both empty."));
        }
        if has_x && item.position().is_none() {
            return Err(CoreError::validation("Coordinates must be numbers."));
        }
    }
    if def.requires_text && item.text().map_or(true, |t| t.trim().is_empty()) {
        return Err(CoreError::validation(format!("{} requires text or keys.", def.label)));
    }
    if def.delay_is_duration {
        if item.duration_ms().is_none() {
            return Err(CoreError::validation("Wait requires a non-negative duration in milliseconds."));
        }
        if item.delay_ms != 0 {
            return Err(CoreError::validation("Wait uses its duration; delay must be 0."));
        }
    }
    Ok(())
}

/// Split a `+`-delimited key combination into ordered key names.
/// `"ctrl + alt+t"` becomes `["ctrl", "alt", "t"]`.
pub fn parse_key_chord(text: &str) -> Vec<String> {
    text.split('+')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Ordered list of authored steps. Insertion order is execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionSequence {
    items: Vec<ActionItem>,
}

impl ActionSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append. On error the sequence is unchanged.
    pub fn push(&mut self, item: ActionItem) -> CoreResult<()> {
        validate(&item)?;
        self.items.push(item);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Option<ActionItem> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    /// Replace the whole sequence (file load).
    pub fn replace_all(&mut self, items: Vec<ActionItem>) {
        self.items = items;
    }

    pub fn items(&self) -> &[ActionItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Immutable copy handed to the executor.
    pub fn snapshot(&self) -> Arc<[ActionItem]> {
        Arc::from(self.items.as_slice())
    }
}

/// Raw editor fields, turned into an `ActionItem` by `build`.
#[derive(Debug, Clone)]
pub struct ActionDraft {
    pub kind: ActionKind,
    pub text: String,
    pub x: String,
    pub y: String,
    pub delay: String,
}

impl ActionDraft {
    pub fn new(kind: ActionKind) -> Self {
        Self { kind, text: String::new(), x: String::new(), y: String::new(), delay: String::new() }
    }

    pub fn build(&self, default_delay_ms: u64) -> CoreResult<ActionItem> {
        let def = definition_for(self.kind);

        let delay_text = self.delay.trim();
        let mut delay_ms = if delay_text.is_empty() {
            default_delay_ms
        } else {
            delay_text
                .parse::<u64>()
                .map_err(|_| CoreError::validation("Delay must be a number in milliseconds."))?
        };

        let mut item = ActionItem::new(self.kind);

        let (x_text, y_text) = (self.x.trim(), self.y.trim());
        if def.requires_position || def.position_optional {
            if def.position_optional && x_text.is_empty() && y_text.is_empty() {
                // falls back to the match center
            } else if def.position_optional && (x_text.is_empty() || y_text.is_empty()) {
                return Err(CoreError::validation("Provide both X and Y or leave both empty."));
            } else {
                let parse = |s: &str| s.parse::<i32>().ok();
                match (parse(x_text), parse(y_text)) {
                    (Some(x), Some(y)) => item = item.with_position(x, y),
                    _ if def.requires_position => {
                        return Err(CoreError::validation("This action requires X and Y coordinates."));
                    }
                    _ => return Err(CoreError::validation("Coordinates must be numbers.")),
                }
            }
        }

        if def.requires_text {
            let text = self.text.trim();
            if text.is_empty() {
                return Err(CoreError::validation("This action requires text or keys."));
            }
            item = item.with_text(text);
        }

        if def.delay_is_duration {
            if delay_ms == 0 {
                return Err(CoreError::validation("Set a delay (ms) for the Wait action."));
            }
            item = item.with_param(PARAM_DURATION, delay_ms);
            delay_ms = 0;
        }

        item.delay_ms = delay_ms;
        validate(&item)?;
        Ok(item)
    }
}
