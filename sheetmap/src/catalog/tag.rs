//! Field annotation syntax
//!
//! An annotation is a column name followed by comma-separated modifiers:
//! - `"Name"` -> bound to column "Name"
//! - `"Code,text"` -> exported as forced text
//! - `"Score,width:20"` -> exported with column width 20
//! - `"-"` or `""` -> not bound
//! - `"extra,pattern:^\d{2}:\d{2}$"` -> dynamic capture of unclaimed columns
//!
//! `pattern:` consumes the rest of the annotation, so the expression may contain commas.

/// Parsed field annotation
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    /// Field takes no part in import or export
    Ignore,
    /// Field is bound to a column
    Column {
        name: String,
        text: bool,
        width: Option<f64>,
    },
    /// Field absorbs columns not claimed by any other binding
    Dynamic { pattern: Option<String> },
}

impl Tag {
    pub fn parse(annotation: &str) -> Tag {
        let mut parts = annotation.splitn(2, ',');
        let head = parts.next().unwrap_or("").trim();
        let rest = parts.next().unwrap_or("");

        match head {
            "" | "-" => Tag::Ignore,
            "*" | "extra" => Tag::Dynamic {
                pattern: find_pattern(rest),
            },
            name => {
                let mut text = false;
                let mut width = None;
                for modifier in rest.split(',').map(str::trim).filter(|m| !m.is_empty()) {
                    if modifier == "text" {
                        text = true;
                    } else if let Some(value) = modifier.strip_prefix("width:") {
                        match value.trim().parse::<f64>() {
                            Ok(w) => width = Some(w),
                            Err(_) => log::debug!("Ignoring invalid width '{}' on column {}", value, name),
                        }
                    } else {
                        log::debug!("Ignoring unknown modifier '{}' on column {}", modifier, name);
                    }
                }
                Tag::Column {
                    name: name.to_string(),
                    text,
                    width,
                }
            }
        }
    }

    /// Column name for bound fields
    pub fn column(&self) -> Option<&str> {
        match self {
            Tag::Column { name, .. } => Some(name),
            _ => None,
        }
    }
}

fn find_pattern(modifiers: &str) -> Option<String> {
    let start = modifiers.find("pattern:")?;
    let pattern = modifiers[start + "pattern:".len()..].trim();
    if pattern.is_empty() {
        None
    } else {
        Some(pattern.to_string())
    }
}
