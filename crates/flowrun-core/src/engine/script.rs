//! Script node evaluation.
//!
//! A snippet is JEXL with a thin statement layer on top. Accepted forms:
//!
//! - empty: the input passes through (transform) or yields `true` (predicate)
//! - a bare expression: `{ sum: data.a + data.b }`, `data.age >= 18`
//! - a block of `let name = expr;` bindings ending in `return expr;`
//! - an entry function wrapping a block: `function edit(data) { ... }`
//!   (predicate mode also accepts `check`)
//!
//! Statements end at `;` or at a line break followed by `let`/`return`.
//! A block that never returns yields `null`.

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use super::error::{NodeError, type_name};
use super::sandbox::{self, SandboxError};

/// Which output contract a snippet runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptMode {
    /// Object in, object out (script nodes).
    Transform,
    /// Object in, boolean out (conditional nodes).
    Predicate,
}

impl ScriptMode {
    fn entry_names(self) -> &'static [&'static str] {
        match self {
            ScriptMode::Transform => &["edit"],
            ScriptMode::Predicate => &["edit", "check"],
        }
    }
}

/// Run a transform snippet against `input`.
pub async fn run_transform(
    source: Option<&str>,
    input: &Value,
    cancel: &CancellationToken,
) -> Result<Map<String, Value>, NodeError> {
    let input = guard_input(input)?;
    let script = Script::compile(source.unwrap_or_default(), ScriptMode::Transform)?;
    if cancel.is_cancelled() {
        return Err(NodeError::Cancelled);
    }

    if script.is_empty() {
        return Ok(input.clone());
    }

    match sandbox::normalize_numbers(script.execute(input)?) {
        Value::Object(map) => Ok(map),
        other => Err(NodeError::OutputType {
            node: "scriptNode",
            expected: "an object",
            got: type_name(&other),
        }),
    }
}

/// Run a predicate snippet against `input`.
pub async fn run_predicate(
    source: Option<&str>,
    input: &Value,
    cancel: &CancellationToken,
) -> Result<bool, NodeError> {
    let input = guard_input(input)?;
    let script = Script::compile(source.unwrap_or_default(), ScriptMode::Predicate)?;
    if cancel.is_cancelled() {
        return Err(NodeError::Cancelled);
    }

    if script.is_empty() {
        return Ok(true);
    }

    match script.execute(input)? {
        Value::Bool(b) => Ok(b),
        other => Err(NodeError::OutputType {
            node: "conditionalNode",
            expected: "a boolean",
            got: type_name(&other),
        }),
    }
}

fn guard_input(input: &Value) -> Result<&Map<String, Value>, NodeError> {
    match input {
        Value::Object(map) => Ok(map),
        Value::Null => Err(NodeError::Input("\"data\" is null".to_string())),
        other => Err(NodeError::Input(format!(
            "\"data\" must be an object, got {}",
            type_name(other)
        ))),
    }
}

// ---------------------------------------------------------------------------
// Compiled form
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Statement {
    Let { name: String, expr: String },
    Return(Option<String>),
    Expr(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Body {
    Empty,
    Expression(String),
    Block(Vec<Statement>),
}

/// A snippet split into statements, ready to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    /// Name the input object is bound to.
    param: String,
    body: Body,
}

impl Script {
    /// Parse `source` for the given mode.
    ///
    /// Only the statement structure is checked here; JEXL syntax errors in
    /// individual expressions surface as `CompileError` when evaluated.
    pub fn compile(source: &str, mode: ScriptMode) -> Result<Self, NodeError> {
        let source = source.trim();
        if source.is_empty() {
            return Ok(Self {
                param: "data".to_string(),
                body: Body::Empty,
            });
        }

        if let Some(rest) = strip_keyword(source, "function") {
            let (param, block) = parse_entry_function(rest, mode)?;
            return Ok(Self {
                param,
                body: Body::Block(parse_block(block)?),
            });
        }

        let statements = parse_block(source)?;
        let body = if statements.is_empty() {
            Body::Empty
        } else if let [Statement::Expr(expr)] = statements.as_slice() {
            Body::Expression(expr.clone())
        } else {
            Body::Block(statements)
        };
        Ok(Self {
            param: "data".to_string(),
            body,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.body == Body::Empty
    }

    /// Evaluate against `input`, returning the raw result.
    pub fn execute(&self, input: &Map<String, Value>) -> Result<Value, NodeError> {
        let mut scope = Map::new();
        scope.insert(self.param.clone(), Value::Object(input.clone()));
        let mut context = Value::Object(scope);

        match &self.body {
            Body::Empty => Ok(Value::Object(input.clone())),
            Body::Expression(expr) => evaluate(expr, &context),
            Body::Block(statements) => {
                for statement in statements {
                    match statement {
                        Statement::Let { name, expr } => {
                            let value = evaluate(expr, &context)?;
                            if let Value::Object(scope) = &mut context {
                                scope.insert(name.clone(), value);
                            }
                        }
                        Statement::Expr(expr) => {
                            evaluate(expr, &context)?;
                        }
                        Statement::Return(None) => return Ok(Value::Null),
                        Statement::Return(Some(expr)) => return evaluate(expr, &context),
                    }
                }
                Ok(Value::Null)
            }
        }
    }
}

fn evaluate(expr: &str, context: &Value) -> Result<Value, NodeError> {
    sandbox::eval(expr, context).map_err(|err| match err {
        SandboxError::Parse(msg) => NodeError::Compile(msg),
        SandboxError::Eval(msg) => NodeError::Runtime(msg),
    })
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// `function <name>(<param>) { <block> }` with the leading keyword removed.
fn parse_entry_function(rest: &str, mode: ScriptMode) -> Result<(String, &str), NodeError> {
    let rest = rest.trim_start();
    let (name, rest) = split_identifier(rest);
    if name.is_empty() {
        return Err(NodeError::Compile("expected a function name".to_string()));
    }
    if !mode.entry_names().contains(&name) {
        return Err(NodeError::Compile(format!(
            "no entry function found (expected {})",
            mode.entry_names().join(" or ")
        )));
    }

    let rest = rest
        .trim_start()
        .strip_prefix('(')
        .ok_or_else(|| NodeError::Compile(format!("expected '(' after {name}")))?;
    let close = rest
        .find(')')
        .ok_or_else(|| NodeError::Compile("unterminated parameter list".to_string()))?;
    let param = rest[..close].trim();
    if !is_identifier(param) {
        return Err(NodeError::Compile(format!(
            "{name} must take exactly one argument"
        )));
    }

    let body = rest[close + 1..]
        .trim()
        .trim_end_matches(';')
        .trim_end()
        .strip_prefix('{')
        .and_then(|b| b.strip_suffix('}'))
        .ok_or_else(|| NodeError::Compile(format!("malformed body for {name}")))?;

    Ok((param.to_string(), body))
}

fn parse_block(source: &str) -> Result<Vec<Statement>, NodeError> {
    split_statements(source)?
        .into_iter()
        .map(|s| parse_statement(&s))
        .collect()
}

fn parse_statement(text: &str) -> Result<Statement, NodeError> {
    if let Some(rest) = strip_keyword(text, "let") {
        let (name, rest) = split_identifier(rest.trim_start());
        if name.is_empty() {
            return Err(NodeError::Compile(format!("invalid binding: {text}")));
        }
        let expr = rest
            .trim_start()
            .strip_prefix('=')
            .filter(|e| !e.starts_with('='))
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| NodeError::Compile(format!("expected '= <expression>' after let {name}")))?;
        return Ok(Statement::Let {
            name: name.to_string(),
            expr: expr.to_string(),
        });
    }

    if let Some(rest) = strip_keyword(text, "return") {
        let expr = rest.trim();
        return Ok(Statement::Return(
            (!expr.is_empty()).then(|| expr.to_string()),
        ));
    }

    Ok(Statement::Expr(text.to_string()))
}

/// Split a block into trimmed, non-empty statements.
fn split_statements(source: &str) -> Result<Vec<String>, NodeError> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in source.char_indices() {
        if let Some(q) = quote {
            current.push(c);
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
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                if depth < 0 {
                    return Err(NodeError::Compile(format!("unexpected '{c}'")));
                }
                current.push(c);
            }
            ';' if depth == 0 => push_statement(&mut statements, &mut current),
            '\n' if depth == 0 => {
                let next = source[i + 1..].trim_start();
                if strip_keyword(next, "let").is_some() || strip_keyword(next, "return").is_some()
                {
                    push_statement(&mut statements, &mut current);
                } else {
                    current.push(c);
                }
            }
            _ => current.push(c),
        }
    }

    if quote.is_some() {
        return Err(NodeError::Compile("unterminated string literal".to_string()));
    }
    if depth != 0 {
        return Err(NodeError::Compile("unbalanced brackets".to_string()));
    }
    push_statement(&mut statements, &mut current);
    Ok(statements)
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let text = current.trim();
    if !text.is_empty() {
        statements.push(text.to_string());
    }
    current.clear();
}

/// Strip a leading keyword that is followed by a non-identifier character.
fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    match rest.chars().next() {
        Some(c) if is_ident_char(c) => None,
        _ => Some(rest),
    }
}

fn split_identifier(text: &str) -> (&str, &str) {
    let end = text
        .char_indices()
        .find(|&(i, c)| !(is_ident_char(c) && (i > 0 || !c.is_ascii_digit())))
        .map_or(text.len(), |(i, _)| i);
    text.split_at(end)
}

fn is_identifier(text: &str) -> bool {
    let (ident, rest) = split_identifier(text);
    !ident.is_empty() && rest.is_empty()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
