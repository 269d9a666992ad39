//! GLSL preprocessor
//!
//! Runs on the raw source before lexing and resolves macro definitions,
//! conditional blocks and `#include`. `#version`, `#extension`, `#pragma`,
//! `#line` and `#error` lines pass through untouched for the lexer.
//! Comments, directive lines and skipped regions turn into whitespace, so
//! line numbers of the output match the input until the first `#include`.

use indexmap::IndexMap;
use std::fs;
use std::path::PathBuf;

use crate::error::{GlslxError, GlslxResult};
use crate::span::Span;

/// Nesting limit for `#include`
pub const MAX_INCLUDE_DEPTH: usize = 32;

/// Source of `#include`d text
pub trait IncludeResolver {
    /// Contents of `path`; `system` is set for the `<path>` form
    fn resolve(&self, path: &str, system: bool) -> Option<String>;
}

impl<F> IncludeResolver for F
where
    F: Fn(&str, bool) -> Option<String>,
{
    fn resolve(&self, path: &str, system: bool) -> Option<String> {
        self(path, system)
    }
}

/// Filesystem includes: `"path"` next to the input, then the search dirs;
/// `<path>` in the search dirs, then as given
#[derive(Debug, Clone)]
pub struct FileIncludes {
    base: PathBuf,
    search_dirs: Vec<PathBuf>,
}

impl FileIncludes {
    pub fn new(base: impl Into<PathBuf>, search_dirs: Vec<PathBuf>) -> Self {
        Self {
            base: base.into(),
            search_dirs,
        }
    }
}

impl IncludeResolver for FileIncludes {
    fn resolve(&self, path: &str, system: bool) -> Option<String> {
        let local = (!system).then(|| self.base.join(path));
        let fallback = system.then(|| PathBuf::from(path));
        local
            .into_iter()
            .chain(self.search_dirs.iter().map(|dir| dir.join(path)))
            .chain(fallback)
            .find_map(|candidate| {
                let text = fs::read_to_string(&candidate).ok()?;
                log::debug!("including {}", candidate.display());
                Some(text)
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    /// `None` for object-like macros
    pub params: Option<Vec<String>>,
    pub body: String,
}

/// One open `#if`/`#ifdef`/`#ifndef` group
#[derive(Debug, Clone, Copy)]
struct Conditional {
    /// Enclosing group is emitted
    parent: bool,
    /// Some branch of this group was already taken
    taken: bool,
    seen_else: bool,
    active: bool,
    span: Span,
}

impl Conditional {
    fn open(parent: bool, condition: bool, span: Span) -> Self {
        Self {
            parent,
            taken: condition,
            seen_else: false,
            active: parent && condition,
            span,
        }
    }
}

/// Physical lines joined by backslash continuations
#[derive(Debug)]
struct LogicalLine {
    text: String,
    span: Span,
    /// Newlines consumed, including continued ones
    newlines: usize,
}

#[derive(Default)]
pub struct Preprocessor<'a> {
    macros: IndexMap<String, Macro>,
    includes: Option<&'a dyn IncludeResolver>,
    /// Line that `__LINE__` expands to
    line: usize,
}

/// Preprocess `source` with no predefined macros and no include support
pub fn preprocess(source: &str) -> GlslxResult<String> {
    Preprocessor::new().process(source)
}

impl<'a> Preprocessor<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_includes(mut self, includes: &'a dyn IncludeResolver) -> Self {
        self.includes = Some(includes);
        self
    }

    /// Predefine a macro from `NAME` or `NAME=VALUE`; a bare name expands to `1`
    pub fn define_str(&mut self, definition: &str) -> GlslxResult<()> {
        let (name, value) = definition.split_once('=').unwrap_or((definition, "1"));
        self.define(name.trim(), value.trim())
    }

    pub fn define(&mut self, name: &str, value: &str) -> GlslxResult<()> {
        if !is_identifier(name) {
            return Err(GlslxError::config(format!("Invalid macro definition '{}'", name)));
        }
        let definition = Macro {
            params: None,
            body: value.to_string(),
        };
        self.insert_macro(name, definition).map_err(GlslxError::config)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn macros(&self) -> &IndexMap<String, Macro> {
        &self.macros
    }

    pub fn process(&mut self, source: &str) -> GlslxResult<String> {
        let output = self.process_file(source, 0)?;
        log::debug!("preprocessed {} bytes, {} macros defined", output.len(), self.macros.len());
        Ok(output)
    }

    // === DIRECTIVES ===

    fn process_file(&mut self, source: &str, depth: usize) -> GlslxResult<String> {
        let text = strip_comments(source)?;
        let mut out = String::with_capacity(text.len());
        let mut conditions: Vec<Conditional> = Vec::new();
        let mut chunk = String::new();
        let mut chunk_line = 1;
        let mut line_no = 1;

        for line in logical_lines(&text) {
            let active = conditions.last().map_or(true, |c| c.active);
            let Some(directive) = line.text.trim_start().strip_prefix('#') else {
                if active {
                    if chunk.is_empty() {
                        chunk_line = line_no;
                    }
                    chunk.push_str(&line.text);
                    push_newlines(&mut chunk, line.newlines);
                } else {
                    push_newlines(&mut out, line.newlines);
                }
                line_no += line.newlines;
                continue;
            };

            self.flush(&mut chunk, chunk_line, &text, &mut out)?;
            self.line = line_no;
            let directive = directive.trim_start();
            let name_len = identifier_len(directive);
            let (name, rest) = directive.split_at(name_len);
            let error = |message: String| GlslxError::preprocessor(message, line.span);

            match name {
                "ifdef" | "ifndef" => {
                    let condition = if active {
                        let macro_name = rest.trim();
                        if !is_identifier(macro_name) {
                            return Err(error(format!("Invalid macro name in #{}", name)));
                        }
                        self.is_defined(macro_name) == (name == "ifdef")
                    } else {
                        false
                    };
                    conditions.push(Conditional::open(active, condition, line.span));
                }
                "if" => {
                    let condition = active && self.evaluate(rest).map_err(error)? != 0;
                    conditions.push(Conditional::open(active, condition, line.span));
                }
                "elif" => {
                    let Some(group) = conditions.last_mut() else {
                        return Err(error("#elif without #if".to_string()));
                    };
                    if group.seen_else {
                        return Err(error("#elif after #else found".to_string()));
                    }
                    if !group.parent || group.taken {
                        group.active = false;
                    } else {
                        let condition = self.evaluate(rest).map_err(error)? != 0;
                        group.active = condition;
                        group.taken = condition;
                    }
                }
                "else" => {
                    let Some(group) = conditions.last_mut() else {
                        return Err(error("#else without #if".to_string()));
                    };
                    if group.seen_else {
                        return Err(error("Another else block found".to_string()));
                    }
                    group.active = group.parent && !group.taken;
                    group.taken = true;
                    group.seen_else = true;
                }
                "endif" => {
                    if conditions.pop().is_none() {
                        return Err(error("Unbalanced #endif".to_string()));
                    }
                }
                _ if !active => {}
                "define" => self.define_directive(rest).map_err(error)?,
                "undef" => {
                    let macro_name = rest.trim();
                    if !is_identifier(macro_name) {
                        return Err(error("Invalid macro name in #undef".to_string()));
                    }
                    self.macros.shift_remove(macro_name);
                }
                "include" => {
                    let included = self.include_directive(rest, depth).map_err(error)?;
                    out.push_str(&included);
                    if line.newlines > 0 && !included.is_empty() && !included.ends_with('\n') {
                        out.push('\n');
                    }
                    push_newlines(&mut out, line.newlines.saturating_sub(1));
                    line_no += line.newlines;
                    continue;
                }
                _ => out.push_str(&line.text),
            }
            push_newlines(&mut out, line.newlines);
            line_no += line.newlines;
        }
        self.flush(&mut chunk, chunk_line, &text, &mut out)?;

        match conditions.last() {
            Some(open) => Err(GlslxError::preprocessor("Unterminated conditional directive", open.span)),
            None => Ok(out),
        }
    }

    fn define_directive(&mut self, rest: &str) -> Result<(), String> {
        let rest = rest.trim_start();
        let (name, after) = rest.split_at(identifier_len(rest));
        if name.is_empty() {
            return Err("Invalid macro definition".to_string());
        }
        let (params, body) = match after.strip_prefix('(') {
            Some(list) => {
                let close = list.find(')').ok_or("Invalid macro definition")?;
                let params: Vec<String> = if list[..close].trim().is_empty() {
                    Vec::new()
                } else {
                    list[..close].split(',').map(|p| p.trim().to_string()).collect()
                };
                if !params.iter().all(|p| is_identifier(p)) {
                    return Err("Invalid macro definition".to_string());
                }
                (Some(params), &list[close + 1..])
            }
            None => (None, after),
        };
        let definition = Macro {
            params,
            body: body.trim().to_string(),
        };
        self.insert_macro(name, definition)
    }

    fn insert_macro(&mut self, name: &str, definition: Macro) -> Result<(), String> {
        if name == "defined" || name == "__LINE__" {
            return Err(format!("Cannot redefine '{}'", name));
        }
        match self.macros.get(name) {
            Some(existing) if *existing != definition => {
                Err(format!("Macro '{}' has already been defined", name))
            }
            _ => {
                self.macros.insert(name.to_string(), definition);
                Ok(())
            }
        }
    }

    fn include_directive(&mut self, rest: &str, depth: usize) -> Result<String, String> {
        let rest = rest.trim();
        let (path, system) = if let Some(quoted) = rest.strip_prefix('"') {
            (quoted.strip_suffix('"'), false)
        } else if let Some(angled) = rest.strip_prefix('<') {
            (angled.strip_suffix('>'), true)
        } else {
            (None, false)
        };
        let path = path
            .filter(|p| !p.is_empty() && !p.contains(['"', '<', '>']))
            .ok_or("Invalid include directive")?;
        if depth >= MAX_INCLUDE_DEPTH {
            return Err(format!("Include depth limit exceeded at '{}'", path));
        }
        let text = self
            .includes
            .and_then(|resolver| resolver.resolve(path, system))
            .ok_or_else(|| format!("Failed to include '{}'", path))?;

        let line = self.line;
        let included = self.process_file(&text, depth + 1).map_err(|e| match e.span() {
            Some(span) => {
                let at = text[..span.start.min(text.len())].matches('\n').count() + 1;
                format!("{}:{}: {}", path, at, e.message())
            }
            None => format!("{}: {}", path, e.message()),
        });
        self.line = line;
        included
    }

    // === MACRO EXPANSION ===

    /// Expand the pending run of source lines into `out`
    fn flush(&mut self, chunk: &mut String, first_line: usize, text: &str, out: &mut String) -> GlslxResult<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        if self.macros.is_empty() && !chunk.contains("__LINE__") {
            out.push_str(chunk);
        } else {
            self.line = first_line;
            let expanded = self
                .expand(chunk, &mut Vec::new(), true)
                .map_err(|message| GlslxError::preprocessor(message, line_span(text, self.line)))?;
            out.push_str(&expanded);
        }
        chunk.clear();
        Ok(())
    }

    /// Rescan `text`, replacing macros not in `hidden`. At the top level,
    /// newlines swallowed by multi-line invocations are re-emitted at the
    /// end of the line.
    fn expand(&mut self, text: &str, hidden: &mut Vec<String>, top: bool) -> Result<String, String> {
        let tokens = tokenize(text);
        let mut out = String::with_capacity(text.len());
        let mut pending_newlines: usize = 0;
        let mut i = 0;

        while i < tokens.len() {
            let token = tokens[i];
            i += 1;
            match token.kind {
                PpKind::Space => {
                    let newlines = token.text.matches('\n').count();
                    if top && newlines > 0 {
                        self.line += newlines;
                        push_newlines(&mut out, std::mem::take(&mut pending_newlines));
                    }
                    out.push_str(token.text);
                    continue;
                }
                PpKind::Ident => {}
                _ => {
                    out.push_str(token.text);
                    continue;
                }
            }
            if token.text == "__LINE__" {
                out.push_str(&self.line.to_string());
                continue;
            }
            let definition = match self.macros.get(token.text) {
                Some(m) if !hidden.iter().any(|h| h == token.text) => m.clone(),
                _ => {
                    out.push_str(token.text);
                    continue;
                }
            };

            let mut swallowed: usize = 0;
            let body = match &definition.params {
                None => definition.body.clone(),
                Some(params) => {
                    let open = skip_space(&tokens, i);
                    if tokens.get(open).map(|t| t.text) != Some("(") {
                        out.push_str(token.text);
                        continue;
                    }
                    let (mut args, next) = collect_args(&tokens, open + 1)
                        .ok_or_else(|| format!("Unterminated invocation of macro '{}'", token.text))?;
                    swallowed = tokens[i..next].iter().map(|t| t.text.matches('\n').count()).sum();
                    i = next;
                    if params.is_empty() && args.len() == 1 && args[0].is_empty() {
                        args.clear();
                    }
                    if args.len() != params.len() {
                        return Err(format!("Inconsistent macro arity for '{}'", token.text));
                    }
                    self.substitute(&definition.body, params, &args, hidden)?
                }
            };

            hidden.push(token.text.to_string());
            let expanded = self.expand(&paste(&body), hidden, false);
            hidden.pop();
            let expanded = expanded?;
            if top {
                self.line += swallowed;
                pending_newlines += swallowed.saturating_sub(expanded.matches('\n').count());
            }
            out.push_str(&expanded);
        }
        push_newlines(&mut out, pending_newlines);
        Ok(out)
    }

    /// Replace parameters in a function-like body. Arguments are expanded
    /// first unless they are stringized or pasted.
    fn substitute(
        &mut self,
        body: &str,
        params: &[String],
        args: &[String],
        hidden: &mut Vec<String>,
    ) -> Result<String, String> {
        let tokens = tokenize(body);
        let param = |token: &PpToken| {
            (token.kind == PpKind::Ident)
                .then(|| params.iter().position(|p| p == token.text))
                .flatten()
        };
        let mut out = String::with_capacity(body.len());
        let mut i = 0;

        while i < tokens.len() {
            let token = tokens[i];
            if token.text == "#" {
                let next = skip_space(&tokens, i + 1);
                if let Some(index) = tokens.get(next).and_then(|t| param(t)) {
                    out.push_str(&args[index]);
                    i = next + 1;
                    continue;
                }
            }
            match param(&token) {
                Some(index) if is_pasted(&tokens, i) => out.push_str(&args[index]),
                Some(index) => out.push_str(&self.expand(&args[index], hidden, false)?),
                None => out.push_str(token.text),
            }
            i += 1;
        }
        Ok(out)
    }

    // === CONDITIONAL EXPRESSIONS ===

    /// Value of an `#if`/`#elif` expression; unknown identifiers are 0
    fn evaluate(&mut self, expression: &str) -> Result<i64, String> {
        let resolved = self.replace_defined(expression)?;
        let expanded = self.expand(&resolved, &mut Vec::new(), false)?;
        let tokens = expression_tokens(&expanded)?;
        if tokens.is_empty() {
            return Ok(0);
        }
        let mut evaluator = Evaluator { tokens, pos: 0 };
        let value = evaluator.ternary()?;
        match evaluator.tokens.get(evaluator.pos) {
            Some(token) => Err(format!("Unexpected '{}' in preprocessor expression", token)),
            None => Ok(value),
        }
    }

    /// `defined X` and `defined(X)` become `1`/`0` before expansion
    fn replace_defined(&self, expression: &str) -> Result<String, String> {
        let tokens = tokenize(expression);
        let mut out = String::with_capacity(expression.len());
        let mut i = 0;
        while i < tokens.len() {
            let token = tokens[i];
            i += 1;
            if token.text != "defined" {
                out.push_str(token.text);
                continue;
            }
            let mut next = skip_space(&tokens, i);
            let parenthesized = tokens.get(next).map(|t| t.text) == Some("(");
            if parenthesized {
                next = skip_space(&tokens, next + 1);
            }
            let name = tokens
                .get(next)
                .filter(|t| t.kind == PpKind::Ident)
                .ok_or("Invalid 'defined' operator")?;
            i = next + 1;
            if parenthesized {
                let close = skip_space(&tokens, i);
                if tokens.get(close).map(|t| t.text) != Some(")") {
                    return Err("Invalid 'defined' operator".to_string());
                }
                i = close + 1;
            }
            out.push_str(if self.is_defined(name.text) { "1" } else { "0" });
        }
        Ok(out)
    }
}

// === TOKENS ===

#[derive(Debug, Clone, Copy, PartialEq)]
enum PpKind {
    Ident,
    Number,
    Space,
    Punct,
}

#[derive(Debug, Clone, Copy)]
struct PpToken<'s> {
    kind: PpKind,
    text: &'s str,
}

fn tokenize(text: &str) -> Vec<PpToken<'_>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        let c = bytes[i];
        let kind = if c.is_ascii_alphabetic() || c == b'_' {
            i += identifier_len(&text[i..]);
            PpKind::Ident
        } else if c.is_ascii_digit() || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            i += 1;
            let hex = text[start..].starts_with("0x") || text[start..].starts_with("0X");
            while i < bytes.len() {
                let d = bytes[i];
                let exponent_sign = matches!(d, b'+' | b'-') && matches!(bytes[i - 1], b'e' | b'E') && !hex;
                if d.is_ascii_alphanumeric() || d == b'_' || d == b'.' || exponent_sign {
                    i += 1;
                } else {
                    break;
                }
            }
            PpKind::Number
        } else if c.is_ascii_whitespace() {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            PpKind::Space
        } else if text[i..].starts_with("##") {
            i += 2;
            PpKind::Punct
        } else {
            i += text[i..].chars().next().map_or(1, char::len_utf8);
            PpKind::Punct
        };
        tokens.push(PpToken {
            kind,
            text: &text[start..i],
        });
    }
    tokens
}

fn identifier_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    match bytes.first() {
        Some(c) if c.is_ascii_alphabetic() || *c == b'_' => bytes
            .iter()
            .position(|c| !(c.is_ascii_alphanumeric() || *c == b'_'))
            .unwrap_or(bytes.len()),
        _ => 0,
    }
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty() && identifier_len(text) == text.len()
}

fn skip_space(tokens: &[PpToken], mut i: usize) -> usize {
    while tokens.get(i).is_some_and(|t| t.kind == PpKind::Space) {
        i += 1;
    }
    i
}

/// Operand of `##` on either side
fn is_pasted(tokens: &[PpToken], i: usize) -> bool {
    let before = tokens[..i].iter().rev().find(|t| t.kind != PpKind::Space);
    let after = tokens[i + 1..].iter().find(|t| t.kind != PpKind::Space);
    before.is_some_and(|t| t.text == "##") || after.is_some_and(|t| t.text == "##")
}

/// Split invocation arguments at top-level commas, up to the closing paren
fn collect_args(tokens: &[PpToken], start: usize) -> Option<(Vec<String>, usize)> {
    let mut depth = 0usize;
    let mut args = Vec::new();
    let mut current = String::new();
    for (k, token) in tokens.iter().enumerate().skip(start) {
        match token.text {
            "(" => {
                depth += 1;
                current.push('(');
            }
            ")" if depth == 0 => {
                args.push(current.trim().to_string());
                return Some((args, k + 1));
            }
            ")" => {
                depth -= 1;
                current.push(')');
            }
            "," if depth == 0 => args.push(std::mem::take(&mut current).trim().to_string()),
            text => current.push_str(text),
        }
    }
    None
}

/// Join the operands of every `##`
fn paste(text: &str) -> String {
    if !text.contains("##") {
        return text.to_string();
    }
    let pieces: Vec<&str> = text.split("##").collect();
    let last = pieces.len() - 1;
    pieces
        .iter()
        .enumerate()
        .map(|(k, piece)| {
            let piece = if k > 0 { piece.trim_start() } else { piece };
            if k < last { piece.trim_end() } else { piece }
        })
        .collect()
}

// === SOURCE LINES ===

/// Blank out comments byte for byte, keeping newlines and offsets
fn strip_comments(source: &str) -> GlslxResult<String> {
    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(b"//") {
            while i < bytes.len() && bytes[i] != b'\n' {
                out.push(b' ');
                i += 1;
            }
        } else if bytes[i..].starts_with(b"/*") {
            let Some(end) = source[i + 2..].find("*/") else {
                return Err(GlslxError::preprocessor(
                    "Unterminated comment",
                    Span::new(i, source.len()),
                ));
            };
            let end = i + 2 + end + 2;
            out.extend(bytes[i..end].iter().map(|&b| if b == b'\n' { b'\n' } else { b' ' }));
            i = end;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn logical_lines(text: &str) -> Vec<LogicalLine> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut start = 0;
    let mut newlines = 0;
    let mut offset = 0;

    for raw in text.split_inclusive('\n') {
        let has_newline = raw.ends_with('\n');
        let body = raw.strip_suffix('\n').unwrap_or(raw);
        let body = body.strip_suffix('\r').unwrap_or(body);
        match body.strip_suffix('\\') {
            Some(continued) if has_newline => {
                current.push_str(continued);
                newlines += 1;
            }
            _ => {
                current.push_str(body);
                lines.push(LogicalLine {
                    text: std::mem::take(&mut current),
                    span: Span::new(start, offset + body.len()),
                    newlines: newlines + usize::from(has_newline),
                });
                newlines = 0;
                start = offset + raw.len();
            }
        }
        offset += raw.len();
    }
    if newlines > 0 || !current.is_empty() {
        lines.push(LogicalLine {
            text: current,
            span: Span::new(start, text.len()),
            newlines,
        });
    }
    lines
}

fn line_span(text: &str, line: usize) -> Span {
    let mut start = 0;
    for _ in 1..line {
        match text[start..].find('\n') {
            Some(i) => start += i + 1,
            None => break,
        }
    }
    let end = text[start..].find('\n').map_or(text.len(), |i| start + i);
    Span::new(start, end)
}

fn push_newlines(out: &mut String, count: usize) {
    out.extend(std::iter::repeat('\n').take(count));
}

// === EXPRESSION EVALUATION ===

#[derive(Debug, Clone, PartialEq)]
enum ExprToken {
    Num(i64),
    Op(&'static str),
}

impl std::fmt::Display for ExprToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExprToken::Num(v) => write!(f, "{}", v),
            ExprToken::Op(op) => f.write_str(op),
        }
    }
}

const OPERATORS: &[&str] = &[
    "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "(", ")", "!", "~", "+", "-", "*", "/", "%", "<",
    ">", "&", "^", "|", "?", ":",
];

fn expression_tokens(text: &str) -> Result<Vec<ExprToken>, String> {
    let mut tokens = Vec::new();
    let mut rest = text.trim_start();
    while let Some(c) = rest.chars().next() {
        let len = if c.is_ascii_digit() {
            let len = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            tokens.push(ExprToken::Num(parse_integer(&rest[..len])?));
            len
        } else if identifier_len(rest) > 0 {
            tokens.push(ExprToken::Num(0));
            identifier_len(rest)
        } else {
            let op = OPERATORS
                .iter()
                .find(|op| rest.starts_with(**op))
                .ok_or_else(|| format!("Invalid token '{}' in preprocessor expression", c))?;
            tokens.push(ExprToken::Op(*op));
            op.len()
        };
        rest = rest[len..].trim_start();
    }
    Ok(tokens)
}

fn parse_integer(text: &str) -> Result<i64, String> {
    let digits = text.trim_end_matches(['u', 'U', 'l', 'L']);
    let parsed = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8)
    } else {
        digits.parse()
    };
    parsed.map_err(|_| format!("Invalid integer '{}' in preprocessor expression", text))
}

struct Evaluator {
    tokens: Vec<ExprToken>,
    pos: usize,
}

fn precedence(op: &str) -> Option<u8> {
    Some(match op {
        "||" => 1,
        "&&" => 2,
        "|" => 3,
        "^" => 4,
        "&" => 5,
        "==" | "!=" => 6,
        "<" | ">" | "<=" | ">=" => 7,
        "<<" | ">>" => 8,
        "+" | "-" => 9,
        "*" | "/" | "%" => 10,
        _ => return None,
    })
}

fn apply(op: &str, lhs: i64, rhs: i64) -> Result<i64, String> {
    Ok(match op {
        "||" => i64::from(lhs != 0 || rhs != 0),
        "&&" => i64::from(lhs != 0 && rhs != 0),
        "|" => lhs | rhs,
        "^" => lhs ^ rhs,
        "&" => lhs & rhs,
        "==" => i64::from(lhs == rhs),
        "!=" => i64::from(lhs != rhs),
        "<" => i64::from(lhs < rhs),
        ">" => i64::from(lhs > rhs),
        "<=" => i64::from(lhs <= rhs),
        ">=" => i64::from(lhs >= rhs),
        "<<" => lhs.wrapping_shl(rhs as u32),
        ">>" => lhs.wrapping_shr(rhs as u32),
        "+" => lhs.wrapping_add(rhs),
        "-" => lhs.wrapping_sub(rhs),
        "*" => lhs.wrapping_mul(rhs),
        "/" | "%" if rhs == 0 => return Err("Division by zero in preprocessor expression".to_string()),
        "/" => lhs.wrapping_div(rhs),
        "%" => lhs.wrapping_rem(rhs),
        _ => return Err(format!("Unexpected '{}' in preprocessor expression", op)),
    })
}

impl Evaluator {
    fn op(&self) -> Option<&'static str> {
        match self.tokens.get(self.pos) {
            Some(ExprToken::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn expect(&mut self, op: &str) -> Result<(), String> {
        if self.op() == Some(op) {
            self.pos += 1;
            Ok(())
        } else {
            Err(format!("Expected '{}' in preprocessor expression", op))
        }
    }

    fn ternary(&mut self) -> Result<i64, String> {
        let condition = self.binary(1)?;
        if self.op() != Some("?") {
            return Ok(condition);
        }
        self.pos += 1;
        let on_true = self.ternary()?;
        self.expect(":")?;
        let on_false = self.ternary()?;
        Ok(if condition != 0 { on_true } else { on_false })
    }

    fn binary(&mut self, min_precedence: u8) -> Result<i64, String> {
        let mut lhs = self.unary()?;
        while let Some((op, prec)) = self.op().and_then(|op| precedence(op).map(|p| (op, p))) {
            if prec < min_precedence {
                break;
            }
            self.pos += 1;
            let rhs = self.binary(prec + 1)?;
            lhs = apply(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<i64, String> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or("Unexpected end of preprocessor expression")?;
        self.pos += 1;
        match token {
            ExprToken::Num(value) => Ok(value),
            ExprToken::Op("!") => Ok(i64::from(self.unary()? == 0)),
            ExprToken::Op("~") => Ok(!self.unary()?),
            ExprToken::Op("-") => Ok(self.unary()?.wrapping_neg()),
            ExprToken::Op("+") => self.unary(),
            ExprToken::Op("(") => {
                let value = self.ternary()?;
                self.expect(")")?;
                Ok(value)
            }
            ExprToken::Op(op) => Err(format!("Unexpected '{}' in preprocessor expression", op)),
        }
    }
}
