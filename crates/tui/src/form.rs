//! Text-entry overlays: the action editor and the single-line path prompt.
//! While either is open, keys go to the overlay and window hotkeys are off.

use spotter_core::actions::{definition_for, ActionDraft, ActionItem, ActionKind};
use spotter_core::error::CoreResult;
use spotter_core::types::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Kind,
    Text,
    X,
    Y,
    Delay,
}

impl Field {
    pub fn label(self) -> &'static str {
        match self {
            Field::Kind => "Action",
            Field::Text => "Text / keys",
            Field::X => "X",
            Field::Y => "Y",
            Field::Delay => "Delay (ms)",
        }
    }
}

/// Reply of an overlay to one key press.
#[derive(Debug, PartialEq)]
pub enum FormEvent<T> {
    Pending,
    Cancelled,
    Submitted(T),
}

pub struct ActionForm {
    pub draft: ActionDraft,
    pub focus: Field,
    /// Last validation message, shown under the fields.
    pub error: Option<String>,
}

impl ActionForm {
    pub fn new() -> Self {
        Self { draft: ActionDraft::new(ActionKind::LeftClick), focus: Field::Kind, error: None }
    }

    /// Fields that mean something for the current kind, in tab order.
    pub fn fields(&self) -> Vec<Field> {
        let def = definition_for(self.draft.kind);
        let mut fields = vec![Field::Kind];
        if def.requires_text {
            fields.push(Field::Text);
        }
        if def.requires_position || def.position_optional {
            fields.push(Field::X);
            fields.push(Field::Y);
        }
        fields.push(Field::Delay);
        fields
    }

    pub fn value(&self, field: Field) -> &str {
        match field {
            Field::Kind => self.draft.kind.label(),
            Field::Text => &self.draft.text,
            Field::X => &self.draft.x,
            Field::Y => &self.draft.y,
            Field::Delay => &self.draft.delay,
        }
    }

    fn value_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::Kind => None,
            Field::Text => Some(&mut self.draft.text),
            Field::X => Some(&mut self.draft.x),
            Field::Y => Some(&mut self.draft.y),
            Field::Delay => Some(&mut self.draft.delay),
        }
    }

    pub fn hint(&self) -> &'static str {
        definition_for(self.draft.kind).description
    }

    fn step_focus(&mut self, forward: bool) {
        let fields = self.fields();
        let at = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        let next = if forward { (at + 1) % fields.len() } else { (at + fields.len() - 1) % fields.len() };
        self.focus = fields[next];
    }

    fn set_kind(&mut self, kind: ActionKind) {
        self.draft.kind = kind;
        self.error = None;
        if !self.fields().contains(&self.focus) {
            self.focus = Field::Kind;
        }
    }

    /// Copy the pointer position into X/Y.
    pub fn fill_position(&mut self, at: Point) {
        if self.fields().contains(&Field::X) {
            self.draft.x = at.x.to_string();
            self.draft.y = at.y.to_string();
        }
    }

    /// `key` is a key name as produced by the event loop, `ch` the typed
    /// character if any.
    pub fn handle_key(&mut self, key: &str, ch: Option<char>, default_delay_ms: u64) -> FormEvent<CoreResult<ActionItem>> {
        match key {
            "esc" => return FormEvent::Cancelled,
            "enter" => {
                let built = self.draft.build(default_delay_ms);
                if let Err(e) = &built {
                    self.error = Some(e.to_string());
                }
                return FormEvent::Submitted(built);
            }
            "tab" | "down" => self.step_focus(true),
            "backtab" | "up" => self.step_focus(false),
            "left" if self.focus == Field::Kind => self.set_kind(self.draft.kind.prev()),
            "right" if self.focus == Field::Kind => self.set_kind(self.draft.kind.next()),
            "backspace" => {
                if let Some(v) = self.value_mut(self.focus) {
                    v.pop();
                }
            }
            _ => {
                if let (Some(c), Some(v)) = (ch, self.value_mut(self.focus)) {
                    v.push(c);
                }
            }
        }
        FormEvent::Pending
    }
}

impl Default for ActionForm {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptPurpose {
    SaveSequence,
    LoadSequence,
    LoadReference,
}

impl PromptPurpose {
    pub fn title(self) -> &'static str {
        match self {
            PromptPurpose::SaveSequence => " Save actions to (.json or .csv) ",
            PromptPurpose::LoadSequence => " Load actions from ",
            PromptPurpose::LoadReference => " Reference image (png/jpeg/bmp) ",
        }
    }
}

pub struct PathPrompt {
    pub purpose: PromptPurpose,
    pub input: String,
}

impl PathPrompt {
    pub fn new(purpose: PromptPurpose, initial: impl Into<String>) -> Self {
        Self { purpose, input: initial.into() }
    }

    pub fn handle_key(&mut self, key: &str, ch: Option<char>) -> FormEvent<String> {
        match key {
            "esc" => FormEvent::Cancelled,
            "enter" => {
                let path = self.input.trim();
                if path.is_empty() {
                    FormEvent::Cancelled
                } else {
                    FormEvent::Submitted(path.to_string())
                }
            }
            "backspace" => {
                self.input.pop();
                FormEvent::Pending
            }
            _ => {
                if let Some(c) = ch {
                    self.input.push(c);
                }
                FormEvent::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spotter_core::error::CoreError;

    fn type_str(form: &mut ActionForm, s: &str) {
        for c in s.chars() {
            form.handle_key(&c.to_string(), Some(c), 1000);
        }
    }

    #[test]
    fn tab_order_follows_kind() {
        let mut form = ActionForm::new();
        assert_eq!(form.fields(), vec![Field::Kind, Field::X, Field::Y, Field::Delay]);
        form.handle_key("right", None, 1000);
        form.handle_key("right", None, 1000);
        form.handle_key("right", None, 1000);
        assert_eq!(form.draft.kind, ActionKind::TypeText);
        assert_eq!(form.fields(), vec![Field::Kind, Field::Text, Field::Delay]);
    }

    #[test]
    fn builds_click_with_position_and_delay() {
        let mut form = ActionForm::new();
        form.handle_key("tab", None, 1000);
        type_str(&mut form, "12");
        form.handle_key("tab", None, 1000);
        type_str(&mut form, "34");
        form.handle_key("tab", None, 1000);
        type_str(&mut form, "250");
        match form.handle_key("enter", None, 1000) {
            FormEvent::Submitted(Ok(item)) => {
                assert_eq!(item, ActionItem::new(ActionKind::LeftClick).with_position(12, 34).with_delay(250));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn half_position_is_rejected_and_reported() {
        let mut form = ActionForm::new();
        form.handle_key("tab", None, 1000);
        type_str(&mut form, "12");
        assert!(matches!(form.handle_key("enter", None, 1000), FormEvent::Submitted(Err(CoreError::Validation { .. }))));
        assert_eq!(form.error.as_deref(), Some("Provide both X and Y or leave both empty."));
    }

    #[test]
    fn backspace_and_kind_field_is_read_only() {
        let mut form = ActionForm::new();
        form.handle_key("x", Some('x'), 1000);
        assert_eq!(form.value(Field::Kind), "Left Click");
        form.focus = Field::Delay;
        type_str(&mut form, "15");
        form.handle_key("backspace", None, 1000);
        assert_eq!(form.value(Field::Delay), "1");
    }

    #[test]
    fn fill_position_only_for_positional_kinds() {
        let mut form = ActionForm::new();
        form.fill_position(Point::new(7, 9));
        assert_eq!((form.draft.x.as_str(), form.draft.y.as_str()), ("7", "9"));

        let mut form = ActionForm::new();
        form.draft.kind = ActionKind::Wait;
        form.fill_position(Point::new(7, 9));
        assert!(form.draft.x.is_empty());
    }

    #[test]
    fn prompt_submits_trimmed_path() {
        let mut p = PathPrompt::new(PromptPurpose::SaveSequence, "actions.json");
        p.handle_key("backspace", None);
        assert_eq!(p.handle_key("enter", None), FormEvent::Submitted("actions.jso".to_string()));
        let mut empty = PathPrompt::new(PromptPurpose::LoadSequence, "  ");
        assert_eq!(empty.handle_key("enter", None), FormEvent::Cancelled);
    }
}
