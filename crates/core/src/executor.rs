use std::time::Duration;

use crate::actions::{parse_key_chord, ActionItem, ActionKind};
use crate::error::{CoreError, CoreResult};
use crate::logger;
use crate::platform::InputInjector;
use crate::sleep::{sleep_interruptible, CancelToken};
use crate::types::{MouseButton, Point};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    Completed,
    Cancelled,
    /// `step` is the 0-based index of the failing item.
    Failed { step: usize, reason: String },
}

/// Explicit coordinates win; otherwise anchor-capable kinds use the match
/// center and text/key kinds have no target.
fn resolve_target(item: &ActionItem, anchor: Point) -> Option<Point> {
    item.position().or_else(|| item.kind.anchors_to_match().then_some(anchor))
}

fn perform(item: &ActionItem, anchor: Point, input: &dyn InputInjector) -> CoreResult<()> {
    let target = resolve_target(item, anchor);
    let need_target = || {
        target.ok_or_else(|| CoreError::Injection(format!("{} requires coordinates.", item.kind.label())))
    };
    match item.kind {
        ActionKind::MoveToMatch => input.move_to(anchor),
        ActionKind::MoveToPosition => {
            let at = item.position().ok_or_else(|| {
                CoreError::Injection("Move to Position requires coordinates.".into())
            })?;
            input.move_to(at)
        }
        ActionKind::LeftClick => input.click(MouseButton::Left, need_target()?),
        ActionKind::RightClick => input.click(MouseButton::Right, need_target()?),
        ActionKind::DoubleClick => input.double_click(need_target()?),
        ActionKind::TypeText => match item.text() {
            Some(text) if !text.is_empty() => input.type_text(text),
            _ => Ok(()),
        },
        ActionKind::PressKey => {
            let chord = parse_key_chord(item.text().unwrap_or_default());
            if chord.is_empty() {
                return Ok(());
            }
            input.press_keys(&chord)
        }
        // handled by the caller, nothing to dispatch
        ActionKind::Wait => Ok(()),
    }
}

/// Run `sequence` against `anchor`. The token is checked before every step
/// and polled during every delay.
pub fn execute(
    sequence: &[ActionItem],
    anchor: Point,
    cancel: &CancelToken,
    input: &dyn InputInjector,
) -> ExecOutcome {
    for (step, item) in sequence.iter().enumerate() {
        if cancel.is_cancelled() {
            return ExecOutcome::Cancelled;
        }

        let pause_ms = if item.kind == ActionKind::Wait {
            item.duration_ms().unwrap_or(item.delay_ms)
        } else {
            logger::info_p("exec", &format!("step {}: {}", step + 1, item.summary()));
            if let Err(e) = perform(item, anchor, input) {
                logger::warn_p("exec", &format!("step {} failed: {}", step + 1, e));
                return ExecOutcome::Failed { step, reason: e.to_string() };
            }
            item.delay_ms
        };

        if pause_ms > 0 && !sleep_interruptible(Duration::from_millis(pause_ms), cancel) {
            return ExecOutcome::Cancelled;
        }
    }
    ExecOutcome::Completed
}
