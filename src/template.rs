//! Template source parsing and execution.
//!
//! Templates are literal text plus `{{ ... }}` expressions. An expression is
//! either a dotted variable path (raw substitution from the parameter scope)
//! or a call to one of the fixed helpers: `escape(...)`, `url(...)`,
//! `asset(...)`, `layout(...)`.
//!
//! Execution is reentrant-safe by construction: a `layout(...)` call does not
//! render anything in place, it is returned to the caller as part of
//! [`ExecutedTemplate`]. No state outlives a single `execute` call.

use serde_json::Value;

use crate::context::TemplateContext;
use crate::error::EngineError;
use crate::types::TemplateParams;

/// A layout requested by a template body, to be rendered by the caller with
/// the body's output injected as `content`.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutRequest {
    pub name: String,
    pub params: TemplateParams,
}

/// Result of executing a single template body.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedTemplate {
    pub body: String,
    pub layout: Option<LayoutRequest>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    /// Dotted variable path, e.g. `user.name`.
    Path(String),
    /// Helper call, e.g. `url("post.show", id=post.id)`.
    Call { name: String, args: Vec<Arg> },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Arg {
    pub(crate) name: Option<String>,
    pub(crate) value: ArgValue,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ArgValue {
    Literal(Value),
    Path(String),
}

/// Parse template source into a node list.
pub(crate) fn parse(source: &str) -> Result<Vec<Node>, EngineError> {
    let mut nodes = Vec::new();
    let mut rest = source;
    while let Some(open) = rest.find("{{") {
        if open > 0 {
            nodes.push(Node::Text(rest[..open].to_string()));
        }
        let after = &rest[open + 2..];
        let close = after.find("}}").ok_or_else(|| {
            EngineError::TemplateParseError("unclosed {{ expression".to_string())
        })?;
        nodes.push(Node::Expr(parse_expr(after[..close].trim())?));
        rest = &after[close + 2..];
    }
    if !rest.is_empty() {
        nodes.push(Node::Text(rest.to_string()));
    }
    Ok(nodes)
}

/// Execute a parsed template against a parameter scope and helper context.
pub(crate) fn execute(
    nodes: &[Node],
    params: &TemplateParams,
    ctx: &TemplateContext,
) -> Result<ExecutedTemplate, EngineError> {
    let mut body = String::new();
    let mut layout: Option<LayoutRequest> = None;

    for node in nodes {
        match node {
            Node::Text(text) => body.push_str(text),
            Node::Expr(Expr::Path(path)) => {
                body.push_str(&raw_string(params.lookup(path)));
            }
            Node::Expr(Expr::Call { name, args }) => match name.as_str() {
                "escape" => {
                    let value = single_positional(name, args, params)?;
                    body.push_str(&ctx.escape_html(&value));
                }
                "url" => {
                    let (route, route_params) = name_and_named_args(name, args, params)?;
                    let href = ctx
                        .url(&route, &route_params)
                        .map_err(|e| EngineError::RenderError(e.to_string()))?;
                    body.push_str(&href);
                }
                "asset" => {
                    let value = single_positional(name, args, params)?;
                    let Value::String(path) = value else {
                        return Err(EngineError::RenderError(
                            "asset() expects a string path".to_string(),
                        ));
                    };
                    body.push_str(&ctx.asset(&path));
                }
                "layout" => {
                    let (layout_name, layout_params) = name_and_named_args(name, args, params)?;
                    // Last declaration wins, matching the source renderer.
                    layout = Some(LayoutRequest {
                        name: layout_name,
                        params: layout_params,
                    });
                }
                other => {
                    return Err(EngineError::RenderError(format!(
                        "unknown template helper: {other}"
                    )));
                }
            },
        }
    }

    Ok(ExecutedTemplate { body, layout })
}

/// Raw (unescaped) substitution: scalars are printed, everything else is
/// the empty string, matching the source renderer's unset-variable behavior.
fn raw_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn resolve_arg(arg: &ArgValue, params: &TemplateParams) -> Value {
    match arg {
        ArgValue::Literal(v) => v.clone(),
        ArgValue::Path(p) => params.lookup(p).cloned().unwrap_or(Value::Null),
    }
}

fn single_positional(
    helper: &str,
    args: &[Arg],
    params: &TemplateParams,
) -> Result<Value, EngineError> {
    match args {
        [Arg { name: None, value }] => Ok(resolve_arg(value, params)),
        _ => Err(EngineError::RenderError(format!(
            "{helper}() expects exactly one positional argument"
        ))),
    }
}

/// First positional string argument plus the named arguments as a parameter
/// map; the shape shared by `url(...)` and `layout(...)`.
fn name_and_named_args(
    helper: &str,
    args: &[Arg],
    params: &TemplateParams,
) -> Result<(String, TemplateParams), EngineError> {
    let mut iter = args.iter();
    let first = iter.next().ok_or_else(|| {
        EngineError::RenderError(format!("{helper}() expects a name argument"))
    })?;
    if first.name.is_some() {
        return Err(EngineError::RenderError(format!(
            "{helper}() first argument must be positional"
        )));
    }
    let Value::String(target) = resolve_arg(&first.value, params) else {
        return Err(EngineError::RenderError(format!(
            "{helper}() name must be a string"
        )));
    };

    let mut named = TemplateParams::new();
    for arg in iter {
        let Some(key) = &arg.name else {
            return Err(EngineError::RenderError(format!(
                "{helper}() takes named arguments after the name"
            )));
        };
        named.set(key.clone(), resolve_arg(&arg.value, params));
    }
    Ok((target, named))
}

// --- expression parsing -----------------------------------------------------

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Cursor { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            return true;
        }
        false
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn error(&self, message: &str) -> EngineError {
        EngineError::TemplateParseError(format!("{message} in expression {:?}", self.src))
    }

    fn parse_ident(&mut self) -> Result<String, EngineError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        if self.pos == start {
            return Err(self.error("expected identifier"));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn parse_path(&mut self) -> Result<String, EngineError> {
        let mut path = self.parse_ident()?;
        while self.peek() == Some('.') {
            self.bump();
            path.push('.');
            path.push_str(&self.parse_ident()?);
        }
        Ok(path)
    }

    fn parse_string(&mut self) -> Result<String, EngineError> {
        // Opening quote already checked by the caller.
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some('n') => out.push('\n'),
                    _ => return Err(self.error("invalid escape in string literal")),
                },
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated string literal")),
            }
        }
    }

    fn parse_number(&mut self) -> Result<Value, EngineError> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')
        ) {
            self.bump();
        }
        serde_json::from_str(&self.src[start..self.pos])
            .map_err(|_| self.error("invalid number literal"))
    }

    fn parse_value(&mut self) -> Result<ArgValue, EngineError> {
        match self.peek() {
            Some('"') => Ok(ArgValue::Literal(Value::String(self.parse_string()?))),
            Some(c) if c.is_ascii_digit() || c == '-' => {
                Ok(ArgValue::Literal(self.parse_number()?))
            }
            Some(c) if c.is_alphabetic() || c == '_' => {
                let path = self.parse_path()?;
                Ok(match path.as_str() {
                    "true" => ArgValue::Literal(Value::Bool(true)),
                    "false" => ArgValue::Literal(Value::Bool(false)),
                    "null" => ArgValue::Literal(Value::Null),
                    _ => ArgValue::Path(path),
                })
            }
            _ => Err(self.error("expected argument value")),
        }
    }

    fn parse_arg(&mut self) -> Result<Arg, EngineError> {
        let value = self.parse_value()?;
        self.skip_ws();
        if self.peek() == Some('=') {
            let ArgValue::Path(name) = value else {
                return Err(self.error("argument name must be an identifier"));
            };
            if name.contains('.') {
                return Err(self.error("argument name must be a plain identifier"));
            }
            self.bump();
            self.skip_ws();
            let value = self.parse_value()?;
            return Ok(Arg {
                name: Some(name),
                value,
            });
        }
        Ok(Arg { name: None, value })
    }
}

fn parse_expr(src: &str) -> Result<Expr, EngineError> {
    let mut cur = Cursor::new(src);
    cur.skip_ws();
    let head = cur.parse_ident()?;

    let expr = if cur.peek() == Some('(') {
        cur.bump();
        let mut args = Vec::new();
        loop {
            cur.skip_ws();
            if cur.eat(')') {
                break;
            }
            args.push(cur.parse_arg()?);
            cur.skip_ws();
            if cur.eat(',') {
                continue;
            }
            if cur.eat(')') {
                break;
            }
            return Err(cur.error("expected ',' or ')'"));
        }
        Expr::Call { name: head, args }
    } else {
        let mut path = head;
        while cur.peek() == Some('.') {
            cur.bump();
            path.push('.');
            path.push_str(&cur.parse_ident()?);
        }
        Expr::Path(path)
    };

    cur.skip_ws();
    if !cur.at_end() {
        return Err(cur.error("trailing input"));
    }
    Ok(expr)
}
