//! Error reporting for glslx
//! Renders the single fatal error of a translation unit, either as one
//! `file:line:col: error: message` line or with the offending source line.

use crate::error::GlslxError;
use crate::span::Span;

/// Diagnostic renderer bound to one source file
pub struct Diagnostics<'a> {
    source: &'a str,
    filename: &'a str,
}

impl<'a> Diagnostics<'a> {
    pub fn new(source: &'a str, filename: &'a str) -> Self {
        Self { source, filename }
    }

    /// Plain one-line form, stable enough to compare in tests
    pub fn format_error(&self, error: &GlslxError) -> String {
        match error.span() {
            Some(span) => {
                let (line, col, _) = self.get_line_info(span);
                format!("{}:{}:{}: error: {}", self.filename, line, col, error.message())
            }
            None => format!("{}: error: {}", self.filename, error.message()),
        }
    }

    /// Terminal form with source context and a caret marker
    pub fn format_with_context(&self, error: &GlslxError) -> String {
        let span = match error.span() {
            Some(span) => span,
            None => return format!("\n\x1b[1;31merror\x1b[0m: {}\n", error.message()),
        };
        let kind = match error {
            GlslxError::Lexer { .. } => "Lexer Error",
            GlslxError::Preprocessor { .. } => "Preprocessor Error",
            _ => "Parse Error",
        };
        let (line_num, col, line_content) = self.get_line_info(span);

        let mut output = String::new();
        output.push_str(&format!(
            "\n\x1b[1;31merror[{}]\x1b[0m: {}\n",
            kind,
            error.message()
        ));
        output.push_str(&format!(
            "  \x1b[1;34m-->\x1b[0m {}:{}:{}\n",
            self.filename, line_num, col
        ));
        output.push_str("   \x1b[1;34m|\x1b[0m\n");
        output.push_str(&format!(
            "\x1b[1;34m{:>3} |\x1b[0m {}\n",
            line_num, line_content
        ));

        let pointer_offset = col.saturating_sub(1);
        let remaining_len = line_content.len().saturating_sub(pointer_offset);
        let pointer_len = span.len().min(remaining_len).max(1);
        output.push_str(&format!(
            "   \x1b[1;34m|\x1b[0m {}\x1b[1;31m{}\x1b[0m\n",
            " ".repeat(pointer_offset),
            "^".repeat(pointer_len)
        ));
        output.push_str("   \x1b[1;34m|\x1b[0m\n");
        output
    }

    /// 1-based line, 1-based column and the text of the line holding `span.start`
    fn get_line_info(&self, span: Span) -> (usize, usize, &str) {
        let start = span.start.min(self.source.len());
        let mut line_num = 1;
        let mut line_start = 0;
        for (i, c) in self.source.char_indices() {
            if i >= start {
                break;
            }
            if c == '\n' {
                line_num += 1;
                line_start = i + 1;
            }
        }
        let col = start - line_start + 1;
        let line_end = self.source[start..]
            .find('\n')
            .map(|i| start + i)
            .unwrap_or(self.source.len());
        (line_num, col, &self.source[line_start..line_end])
    }
}
