//! Saving and loading action sequences.
//!
//! `.json` files hold `{"actions": [...], "region": [l, t, w, h] | null,
//! "similarity": percent}`. Any other extension is a flat CSV with the
//! columns `kind,params,delayMs`, `params` being a JSON object.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::actions::{ActionItem, ActionParams, ActionRecord};
use crate::error::{CoreError, CoreResult};
use crate::logger;
use crate::types::Region;

const CSV_HEADER: [&str; 3] = ["kind", "params", "delayMs"];

#[derive(Debug, Default)]
pub struct LoadedFile {
    pub actions: Vec<ActionItem>,
    /// Present only when the file carried a well-formed 4-value region.
    pub region: Option<Region>,
    pub similarity: Option<u8>,
    /// Records that could not be turned into actions.
    pub skipped: usize,
}

#[derive(Serialize)]
struct SequenceFile<'a> {
    actions: Vec<ActionRecord>,
    region: Option<&'a Region>,
    similarity: u8,
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

pub fn save_sequence(path: &Path, actions: &[ActionItem], region: Option<Region>, similarity: u8) -> CoreResult<()> {
    let body = if is_json(path) {
        let file = SequenceFile {
            actions: actions.iter().map(ActionItem::to_record).collect(),
            region: region.as_ref(),
            similarity,
        };
        serde_json::to_string_pretty(&file)?
    } else {
        let mut out = String::new();
        write_csv_row(&mut out, &CSV_HEADER.map(String::from));
        for action in actions {
            let record = action.to_record();
            let params = serde_json::to_string(&record.params)?;
            write_csv_row(&mut out, &[record.kind, params, record.delay_ms.to_string()]);
        }
        out
    };
    fs::write(path, body)?;
    logger::info(&format!("saved {} actions to {}", actions.len(), path.display()));
    Ok(())
}

/// Read a sequence file. Bad records are skipped and counted; an
/// unreadable or unparsable file is an error.
pub fn load_sequence(path: &Path) -> CoreResult<LoadedFile> {
    let text = fs::read_to_string(path)?;
    let loaded = if is_json(path) { load_json(&text)? } else { load_csv(&text)? };
    if loaded.skipped > 0 {
        logger::warn(&format!("{}: skipped {} malformed actions", path.display(), loaded.skipped));
    }
    Ok(loaded)
}

fn load_json(text: &str) -> CoreResult<LoadedFile> {
    let root: Value = serde_json::from_str(text)?;
    let Value::Object(root) = root else {
        return Err(CoreError::Persistence("expected a JSON object at top level".into()));
    };

    let mut loaded = LoadedFile::default();
    if let Some(Value::Array(records)) = root.get("actions") {
        for raw in records {
            let item = serde_json::from_value::<ActionRecord>(raw.clone())
                .map_err(CoreError::from)
                .and_then(ActionItem::from_record);
            match item {
                Ok(item) => loaded.actions.push(item),
                Err(e) => {
                    logger::warn(&format!("skipping action: {}", e));
                    loaded.skipped += 1;
                }
            }
        }
    }

    loaded.region = root
        .get("region")
        .and_then(|v| serde_json::from_value::<Region>(v.clone()).ok());
    loaded.similarity = root
        .get("similarity")
        .and_then(Value::as_f64)
        .map(|v| v.round().clamp(0.0, 100.0) as u8);
    Ok(loaded)
}

fn load_csv(text: &str) -> CoreResult<LoadedFile> {
    let mut rows = parse_csv(text)?.into_iter();
    let header = rows.next().ok_or_else(|| CoreError::Persistence("empty CSV file".into()))?;
    let column = |names: &[&str]| header.iter().position(|h| names.contains(&h.trim()));
    let kind_col = column(&["kind", "action_type"])
        .ok_or_else(|| CoreError::Persistence("CSV header has no kind column".into()))?;
    let params_col = column(&["params"]);
    let delay_col = column(&["delayMs", "delay_ms"]);

    let mut loaded = LoadedFile::default();
    for row in rows {
        if row.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let field = |col: Option<usize>| col.and_then(|c| row.get(c)).map(|s| s.trim()).unwrap_or("");
        let params: ActionParams = serde_json::from_str(field(params_col)).unwrap_or_default();
        let delay_ms = field(delay_col).parse::<u64>().unwrap_or(0);
        let record = ActionRecord { kind: field(Some(kind_col)).to_string(), params, delay_ms };
        match ActionItem::from_record(record) {
            Ok(item) => loaded.actions.push(item),
            Err(e) => {
                logger::warn(&format!("skipping action: {}", e));
                loaded.skipped += 1;
            }
        }
    }
    Ok(loaded)
}

fn write_csv_row(out: &mut String, fields: &[String]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push_str("\r\n");
}

/// RFC 4180 reader: quoted fields may contain commas, doubled quotes and
/// line breaks.
fn parse_csv(text: &str) -> CoreResult<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }
    if in_quotes {
        return Err(CoreError::Persistence("unterminated quoted field in CSV".into()));
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionKind;

    fn sample() -> Vec<ActionItem> {
        vec![
            ActionItem::new(ActionKind::LeftClick).with_delay(200),
            ActionItem::new(ActionKind::MoveToPosition).with_position(-5, 40).with_delay(50),
            ActionItem::new(ActionKind::TypeText).with_text("hello, \"world\"\nnext").with_delay(10),
            ActionItem::new(ActionKind::PressKey).with_text("ctrl+shift+t"),
            ActionItem::wait(500),
        ]
    }

    #[test]
    fn json_round_trip_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seq.json");
        let region = Region { left: 10, top: 20, width: 300, height: 200 };
        save_sequence(&path, &sample(), Some(region), 85).unwrap();

        let loaded = load_sequence(&path).unwrap();
        assert_eq!(loaded.actions, sample());
        assert_eq!(loaded.region, Some(region));
        assert_eq!(loaded.similarity, Some(85));
        assert_eq!(loaded.skipped, 0);
    }

    #[test]
    fn csv_round_trip_keeps_actions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seq.csv");
        save_sequence(&path, &sample(), None, 80).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("kind,params,delayMs\r\n"));

        let loaded = load_sequence(&path).unwrap();
        assert_eq!(loaded.actions, sample());
        assert_eq!(loaded.region, None);
        assert_eq!(loaded.similarity, None);
    }

    #[test]
    fn json_with_bad_records_loads_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.json");
        fs::write(
            &path,
            r#"{"actions":[
                {"kind":"Left Click","params":{},"delayMs":100},
                {"kind":"Teleport","params":{},"delayMs":0},
                {"kind":"Move to Position","params":{"x":1},"delayMs":0},
                {"action_type":"Wait","params":{"duration_ms":250},"delay_ms":0},
                "garbage"
            ],"region":[1,2,3],"similarity":90}"#,
        )
        .unwrap();
        let loaded = load_sequence(&path).unwrap();
        assert_eq!(loaded.actions, vec![ActionItem::new(ActionKind::LeftClick).with_delay(100), ActionItem::wait(250)]);
        assert_eq!(loaded.skipped, 3);
        assert_eq!(loaded.region, None);
        assert_eq!(loaded.similarity, Some(90));
    }

    #[test]
    fn legacy_csv_columns_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.csv");
        fs::write(
            &path,
            "action_type,params,delay_ms\nRight Click,\"{\"\"x\"\": 5, \"\"y\"\": 6}\",-20\nDouble Click,not json,30\n",
        )
        .unwrap();
        let loaded = load_sequence(&path).unwrap();
        assert_eq!(
            loaded.actions,
            vec![
                ActionItem::new(ActionKind::RightClick).with_position(5, 6),
                ActionItem::new(ActionKind::DoubleClick).with_delay(30),
            ]
        );
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_sequence(&dir.path().join("missing.json")), Err(CoreError::Persistence(_))));

        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_sequence(&path), Err(CoreError::Persistence(_))));
    }

    #[test]
    fn csv_parser_handles_quotes_and_line_breaks() {
        let rows = parse_csv("a,\"b,c\",\"d\"\"e\"\r\n\"multi\nline\",x,\n").unwrap();
        assert_eq!(rows, vec![vec!["a", "b,c", "d\"e"], vec!["multi\nline", "x", ""]]);
        assert!(parse_csv("\"open").is_err());
    }
}
