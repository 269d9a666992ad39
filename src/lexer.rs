//! GLSL lexer
//!
//! - logos-driven, one pass over the source
//! - numeric literals are decoded to their typed constant here
//! - identifiers that spell a keyword come out as `TokenKind::Keyword`
//! - `#version`, `#extension`, `#line` and `#pragma` become directive tokens

use logos::{FilterResult, Logos};

use crate::ast::Constant;
use crate::error::{GlslxError, GlslxResult};
use crate::keywords::Keyword;
use crate::span::Span;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum LexError {
    #[default]
    UnexpectedCharacter,
    Message(String),
}

/// Preprocessor lines the compiler understands
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Version { number: u32, profile: Option<String> },
    Extension { name: String, behavior: String },
    Line,
    Pragma(String),
    Null,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexError)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"\\\r?\n")]
#[logos(skip r"//[^\n]*")]
pub enum TokenKind {
    #[token("/*", block_comment)]
    BlockComment,

    // === Literals ===
    #[regex(r"[0-9]+([uU]|[lL]|[uU][lL]|[sS]|[uU][sS])?", parse_int)]
    #[regex(r"0[xX][0-9a-fA-F]+([uU]|[lL]|[uU][lL]|[sS]|[uU][sS])?", parse_int)]
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?([fF]|lf|LF|hf|HF)?", parse_float)]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?([fF]|lf|LF|hf|HF)?", parse_float)]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+([fF]|lf|LF|hf|HF)?", parse_float)]
    #[regex(r"[0-9]+([fF]|lf|LF|hf|HF)", parse_float)]
    Number(Constant),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"#[^\n]*", parse_directive)]
    Directive(Directive),

    // === Punctuation ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("?")]
    Question,

    // === Assignment ===
    #[token("=")]
    Eq,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("<<=")]
    ShlEq,
    #[token(">>=")]
    ShrEq,
    #[token("&=")]
    AmpEq,
    #[token("^=")]
    CaretEq,
    #[token("|=")]
    PipeEq,

    // === Operators ===
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("&")]
    Amp,
    #[token("^")]
    Caret,
    #[token("|")]
    Pipe,
    #[token("&&")]
    AmpAmp,
    #[token("^^")]
    CaretCaret,
    #[token("||")]
    PipePipe,
    #[token("!")]
    Bang,
    #[token("~")]
    Tilde,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,

    // Synthetic tokens
    Keyword(Keyword),
    Eof,
}

impl TokenKind {
    /// Short human readable form used in error messages
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Number(_) => "number".to_string(),
            TokenKind::Ident(name) => format!("'{}'", name),
            TokenKind::Keyword(kw) => format!("'{}'", kw),
            TokenKind::Directive(_) => "directive".to_string(),
            TokenKind::Eof => "end of file".to_string(),
            other => format!("{:?}", other),
        }
    }
}

fn literal_error(message: &str) -> LexError {
    LexError::Message(message.to_string())
}

fn parse_int(lex: &mut logos::Lexer<TokenKind>) -> Result<Constant, LexError> {
    let text = lex.slice();
    let digits = text.trim_end_matches(|c: char| matches!(c, 'u' | 'U' | 'l' | 'L' | 's' | 'S'));
    let suffix = text[digits.len()..].to_ascii_lowercase();

    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        u64::from_str_radix(&digits[1..], 8)
    } else {
        digits.parse::<u64>()
    }
    .map_err(|_| literal_error("Invalid numeric literal"))?;

    let fits_32 = value <= u64::from(u32::MAX);
    let fits_16 = value <= u64::from(u16::MAX);
    match suffix.as_str() {
        // unsuffixed values above i32::MAX wrap into the signed range
        "" if fits_32 => Ok(Constant::Int(value as u32 as i32)),
        "u" if fits_32 => Ok(Constant::Uint(value as u32)),
        "" | "u" => Err(literal_error("Literal needs more than 32-bits")),
        "l" => Ok(Constant::Long(value as i64)),
        "ul" => Ok(Constant::Ulong(value)),
        "s" if fits_16 => Ok(Constant::Short(value as u16 as i16)),
        "us" if fits_16 => Ok(Constant::Ushort(value as u16)),
        "s" | "us" => Err(literal_error("Literal needs more than 16-bits")),
        _ => Err(literal_error("Invalid use of suffix on literal")),
    }
}

fn parse_float(lex: &mut logos::Lexer<TokenKind>) -> Result<Constant, LexError> {
    let text = lex.slice();
    let lower = text.to_ascii_lowercase();
    let (digits, suffix) = if lower.ends_with("lf") || lower.ends_with("hf") {
        (&text[..text.len() - 2], &lower[lower.len() - 2..])
    } else if lower.ends_with('f') {
        (&text[..text.len() - 1], "f")
    } else {
        (text, "")
    };
    let value: f64 = digits
        .parse()
        .map_err(|_| literal_error("Invalid numeric literal"))?;
    Ok(match suffix {
        "lf" => Constant::Double(value),
        "hf" => Constant::Half(value as f32),
        _ => Constant::Float(value as f32),
    })
}

/// Skip to the closing `*/`; comments do not nest
fn block_comment(lex: &mut logos::Lexer<TokenKind>) -> FilterResult<(), LexError> {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            FilterResult::Skip
        }
        None => {
            lex.bump(lex.remainder().len());
            FilterResult::Error(literal_error("Unterminated comment"))
        }
    }
}

fn parse_directive(lex: &mut logos::Lexer<TokenKind>) -> Result<Directive, LexError> {
    let body = lex.slice()[1..].trim();
    let (name, rest) = match body.find(char::is_whitespace) {
        Some(i) => (&body[..i], body[i..].trim()),
        None => (body, ""),
    };
    match name {
        "" => Ok(Directive::Null),
        "version" => {
            let mut words = rest.split_whitespace();
            let number = words
                .next()
                .and_then(|w| w.parse().ok())
                .ok_or_else(|| literal_error("Invalid version directive"))?;
            Ok(Directive::Version {
                number,
                profile: words.next().map(str::to_string),
            })
        }
        "extension" => {
            let (ext, behavior) = rest
                .split_once(':')
                .ok_or_else(|| literal_error("Invalid extension directive"))?;
            Ok(Directive::Extension {
                name: ext.trim().to_string(),
                behavior: behavior.trim().to_string(),
            })
        }
        "line" => Ok(Directive::Line),
        "pragma" => Ok(Directive::Pragma(rest.to_string())),
        "error" => Err(LexError::Message(format!("#error {}", rest))),
        other => Err(LexError::Message(format!("Unsupported directive '{}'", other))),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

pub struct Lexer<'a> {
    source: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    pub fn tokenize(&self) -> GlslxResult<Vec<Token>> {
        let mut lex = TokenKind::lexer(self.source);
        let mut tokens = Vec::new();

        while let Some(result) = lex.next() {
            let span = Span::new(lex.span().start, lex.span().end);
            match result {
                Ok(TokenKind::Ident(word)) => {
                    let kind = match Keyword::lookup(&word) {
                        Some(kw) => TokenKind::Keyword(kw),
                        None => TokenKind::Ident(word),
                    };
                    tokens.push(Token::new(kind, span));
                }
                Ok(kind) => tokens.push(Token::new(kind, span)),
                Err(LexError::Message(message)) => return Err(GlslxError::lexer(message, span)),
                Err(LexError::UnexpectedCharacter) => {
                    return Err(GlslxError::lexer(
                        format!("Unexpected character: '{}'", &self.source[span.start..span.end]),
                        span,
                    ));
                }
            }
        }

        let end = self.source.len();
        tokens.push(Token::new(TokenKind::Eof, Span::new(end, end)));
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn number(source: &str) -> Constant {
        match &kinds(source)[0] {
            TokenKind::Number(c) => *c,
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_basic_tokens() {
        let toks = kinds("vec3 color = a.rgb * 2.0;");
        assert_eq!(toks[0], TokenKind::Keyword(Keyword::Vec3));
        assert_eq!(toks[1], TokenKind::Ident("color".to_string()));
        assert_eq!(toks[2], TokenKind::Eq);
        assert_eq!(toks[4], TokenKind::Dot);
        assert_eq!(toks[6], TokenKind::Star);
        assert_eq!(toks[7], TokenKind::Number(Constant::Float(2.0)));
        assert_eq!(toks.last(), Some(&TokenKind::Eof));
    }

    #[test]
    fn test_int_literals() {
        assert_eq!(number("42"), Constant::Int(42));
        assert_eq!(number("42u"), Constant::Uint(42));
        assert_eq!(number("0xFfU"), Constant::Uint(255));
        assert_eq!(number("0777"), Constant::Int(511));
        assert_eq!(number("0xffffffff"), Constant::Int(-1));
        assert_eq!(number("42s"), Constant::Short(42));
        assert_eq!(number("42US"), Constant::Ushort(42));
        assert_eq!(number("42L"), Constant::Long(42));
        assert_eq!(number("42ul"), Constant::Ulong(42));
    }

    #[test]
    fn test_float_literals() {
        assert_eq!(number("1.5"), Constant::Float(1.5));
        assert_eq!(number("1.5F"), Constant::Float(1.5));
        assert_eq!(number(".25"), Constant::Float(0.25));
        assert_eq!(number("1e3"), Constant::Float(1000.0));
        assert_eq!(number("1.3lf"), Constant::Double(1.3));
        assert_eq!(number("1.5HF"), Constant::Half(1.5));
        assert_eq!(number("2f"), Constant::Float(2.0));
    }

    #[test]
    fn test_literal_errors() {
        let err = Lexer::new("0x1ffffffff").tokenize().unwrap_err();
        assert_eq!(err.message(), "Literal needs more than 32-bits");
        let err = Lexer::new("09").tokenize().unwrap_err();
        assert_eq!(err.message(), "Invalid numeric literal");
        let err = Lexer::new("70000s").tokenize().unwrap_err();
        assert_eq!(err.message(), "Literal needs more than 16-bits");
    }

    #[test]
    fn test_comments_and_directives() {
        let toks = kinds("#version 460 core\n// line\n/* block\n */\n#extension GL_EXT_ray_query : require\nx");
        assert_eq!(
            toks[0],
            TokenKind::Directive(Directive::Version {
                number: 460,
                profile: Some("core".to_string())
            })
        );
        assert_eq!(
            toks[1],
            TokenKind::Directive(Directive::Extension {
                name: "GL_EXT_ray_query".to_string(),
                behavior: "require".to_string()
            })
        );
        assert_eq!(toks[2], TokenKind::Ident("x".to_string()));
    }

    #[test]
    fn test_block_comments() {
        let x = TokenKind::Ident("x".to_string());
        for source in [
            "/* a */ x",
            "/* a\n b */ x",
            "/** doc */ x",
            "/* a * b */ x",
            "/*\n * line\n */\nx",
            "/***/x",
        ] {
            assert_eq!(kinds(source), vec![x.clone(), TokenKind::Eof], "{:?}", source);
        }
        assert_eq!(kinds("a /* b */ / c")[1], TokenKind::Slash);
        assert_eq!(kinds("a /= /**/ c")[1], TokenKind::SlashEq);
    }

    #[test]
    fn test_unterminated_comment() {
        let err = Lexer::new("x /* open").tokenize().unwrap_err();
        assert_eq!(err.message(), "Unterminated comment");
        assert_eq!(err.span(), Some(Span::new(2, 9)));
    }

    #[test]
    fn test_unsupported_directive() {
        let err = Lexer::new("#define FOO 1\n").tokenize().unwrap_err();
        assert_eq!(err.message(), "Unsupported directive 'define'");
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::new("float a = $;").tokenize().unwrap_err();
        assert_eq!(err.message(), "Unexpected character: '$'");
        assert_eq!(err.span(), Some(Span::new(10, 11)));
    }

    #[test]
    fn test_aliases() {
        let toks = kinds("uint32_t float64_t");
        assert_eq!(toks[0], TokenKind::Keyword(Keyword::Uint));
        assert_eq!(toks[1], TokenKind::Keyword(Keyword::Double));
    }
}
