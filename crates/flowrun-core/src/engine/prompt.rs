//! Prompt templating for AI nodes.
//!
//! Every `${expression}` in a template is evaluated against the data object
//! (bound as `data`) in the JEXL sandbox and replaced by its rendered value.
//! If any placeholder fails, the template is returned exactly as written.

use serde_json::{Map, Value};

use super::sandbox;

/// Expand all placeholders in `template`.
pub fn expand(template: &str, data: &Map<String, Value>) -> String {
    let mut context = Map::new();
    context.insert("data".to_string(), Value::Object(data.clone()));
    let context = Value::Object(context);

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("${") {
        let after = &rest[open + 2..];
        let Some(close) = closing_brace(after) else {
            break;
        };

        let expression = after[..close].trim();
        out.push_str(&rest[..open]);
        if expression.is_empty() {
            out.push_str(&rest[open..open + 2 + close + 1]);
        } else {
            match sandbox::eval(expression, &context) {
                Ok(value) => out.push_str(&sandbox::render(&value)),
                Err(err) => {
                    tracing::debug!(expression, error = %err, "prompt placeholder failed; leaving template unexpanded");
                    return template.to_string();
                }
            }
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

/// Byte offset of the `}` closing a placeholder body, skipping nested
/// braces and quoted strings.
fn closing_brace(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}
