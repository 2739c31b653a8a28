use super::fault::Fault;

/// One piece of a template literal: literal text or the raw source of a `${...}` hole.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Text(String),
    Code(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Template(Vec<TemplatePart>),
    Ident(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    /// A line break separates this token from the previous one.
    pub newline_before: bool,
}

// Longest first so that `===` wins over `==` and `=`.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "=>", "==", "!=", "<=", ">=", "&&", "||", "??", "++", "--", "+=", "-=", "*=",
    "/=", "%=", "{", "}", "(", ")", "[", "]", ";", ",", ".", ":", "?", "+", "-", "*", "/", "%",
    "<", ">", "=", "!",
];

pub fn tokenize(source: &str) -> Result<Vec<Token>, Fault> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
    newline_before: bool,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            newline_before: false,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, Fault> {
        loop {
            self.skip_trivia()?;
            let Some(c) = self.peek() else {
                self.push(TokenKind::Eof);
                return Ok(self.tokens);
            };

            if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
                let n = self.number()?;
                self.push(TokenKind::Number(n));
            } else if c == '"' || c == '\'' {
                self.bump();
                let s = self.string(c)?;
                self.push(TokenKind::Str(s));
            } else if c == '`' {
                self.bump();
                let parts = self.template()?;
                self.push(TokenKind::Template(parts));
            } else if is_ident_start(c) {
                let start = self.pos;
                while self.peek().is_some_and(is_ident_continue) {
                    self.bump();
                }
                let ident = self.src[start..self.pos].to_string();
                self.push(TokenKind::Ident(ident));
            } else if let Some(p) = PUNCTUATORS.iter().find(|p| self.rest().starts_with(**p)) {
                self.pos += p.len();
                self.push(TokenKind::Punct(p));
            } else {
                return Err(Fault::syntax_error(format!(
                    "Invalid or unexpected token '{}' at line {}",
                    c, self.line
                )));
            }
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind) {
        self.tokens.push(Token {
            kind,
            line: self.line,
            newline_before: self.newline_before,
        });
        self.newline_before = false;
    }

    fn skip_trivia(&mut self) -> Result<(), Fault> {
        loop {
            match self.peek() {
                Some('\n') => {
                    self.newline_before = true;
                    self.bump();
                }
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let line = self.line;
                    self.pos += 2;
                    loop {
                        if self.rest().starts_with("*/") {
                            self.pos += 2;
                            break;
                        }
                        match self.bump() {
                            Some('\n') => self.newline_before = true,
                            Some(_) => {}
                            None => {
                                return Err(Fault::syntax_error(format!(
                                    "Unterminated comment starting at line {}",
                                    line
                                )));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn number(&mut self) -> Result<f64, Fault> {
        let start = self.pos;
        if self.rest().starts_with("0x") || self.rest().starts_with("0X") {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            return u64::from_str_radix(&self.src[digits_start..self.pos], 16)
                .map(|n| n as f64)
                .map_err(|_| self.invalid_number(start));
        }

        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.bump();
        }
        if self.peek() == Some('.') && self.peek_at(1).is_none_or(|c| c.is_ascii_digit()) {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if self.peek().is_some_and(is_ident_start) {
            return Err(self.invalid_number(start));
        }

        self.src[start..self.pos]
            .replace('_', "")
            .parse::<f64>()
            .map_err(|_| self.invalid_number(start))
    }

    fn invalid_number(&self, start: usize) -> Fault {
        Fault::syntax_error(format!(
            "Invalid number '{}' at line {}",
            &self.src[start..self.pos],
            self.line
        ))
    }

    fn string(&mut self, quote: char) -> Result<String, Fault> {
        let line = self.line;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(out),
                Some('\\') => out.push(self.escape()?),
                Some('\n') | None => {
                    return Err(Fault::syntax_error(format!(
                        "Invalid or unexpected token: unterminated string at line {}",
                        line
                    )));
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn template(&mut self) -> Result<Vec<TemplatePart>, Fault> {
        let line = self.line;
        let mut parts = Vec::new();
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('`') => break,
                Some('\\') => text.push(self.escape()?),
                Some('$') if self.peek() == Some('{') => {
                    self.bump();
                    if !text.is_empty() {
                        parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                    }
                    parts.push(TemplatePart::Code(self.template_hole(line)?));
                }
                Some(c) => text.push(c),
                None => {
                    return Err(Fault::syntax_error(format!(
                        "Unterminated template literal starting at line {}",
                        line
                    )));
                }
            }
        }
        if !text.is_empty() || parts.is_empty() {
            parts.push(TemplatePart::Text(text));
        }
        Ok(parts)
    }

    /// Raw source of a `${ ... }` hole, balancing nested braces and skipping strings.
    fn template_hole(&mut self, line: u32) -> Result<String, Fault> {
        let start = self.pos;
        let mut depth = 0usize;
        loop {
            match self.bump() {
                Some('{') => depth += 1,
                Some('}') if depth == 0 => return Ok(self.src[start..self.pos - 1].to_string()),
                Some('}') => depth -= 1,
                Some(q @ ('"' | '\'')) => {
                    self.string(q)?;
                }
                Some('`') => {
                    self.template()?;
                }
                Some(_) => {}
                None => {
                    return Err(Fault::syntax_error(format!(
                        "Unterminated template literal starting at line {}",
                        line
                    )));
                }
            }
        }
    }

    fn escape(&mut self) -> Result<char, Fault> {
        let c = self
            .bump()
            .ok_or_else(|| Fault::syntax_error("Invalid or unexpected token: dangling escape"))?;
        Ok(match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '0' => '\0',
            'x' => self.hex_escape(2)?,
            'u' if self.peek() == Some('{') => {
                self.bump();
                let start = self.pos;
                while self.peek().is_some_and(|c| c != '}') {
                    self.bump();
                }
                let code = u32::from_str_radix(&self.src[start..self.pos], 16).ok();
                self.bump();
                code.and_then(char::from_u32)
                    .ok_or_else(|| Fault::syntax_error("Invalid Unicode escape sequence"))?
            }
            'u' => self.hex_escape(4)?,
            other => other,
        })
    }

    fn hex_escape(&mut self, len: usize) -> Result<char, Fault> {
        let start = self.pos;
        for _ in 0..len {
            if !self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                return Err(Fault::syntax_error("Invalid hexadecimal escape sequence"));
            }
            self.bump();
        }
        u32::from_str_radix(&self.src[start..self.pos], 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| Fault::syntax_error("Invalid hexadecimal escape sequence"))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
