use crate::pos::Pos;

/// A lexical token plus the position its first character started at
/// (mirrors `lexing.runeScanner` tracking `line`/`col` per scanned rune,
/// generalized here to tag the token rather than every rune).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokKind,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokKind {
    Ident(String),
    Int(i64),
    Byte(u8),

    KwPackage,
    KwFunc,
    KwVar,
    KwConst,
    KwStruct,
    KwIf,
    KwElse,
    KwFor,
    KwReturn,
    KwTrue,
    KwFalse,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Colon,
    Dot,

    Assign,
    Define, // :=
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Amp,
    Bang,
    Pipe,
    Caret,
    Star,

    Eof,
}

/// Scans `src` into a flat token list, recording a lexical error as a
/// diagnostic instead of aborting the whole scan (every other token still
/// comes back, so the parser can keep going and the caller sees every
/// lexical problem in one pass, not just the first).
pub struct Lexer<'a> {
    file: String,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: u32,
    col: u32,
    pub errors: Vec<(Pos, String)>,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(file: impl Into<String>, src: &'a str) -> Self {
        Self {
            file: file.into(),
            chars: src.char_indices().peekable(),
            line: 1,
            col: 1,
            errors: Vec::new(),
        }
    }

    fn pos(&self) -> Pos {
        Pos::new(self.file.clone(), self.line, self.col)
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    /// Tokenizes the whole source, returning every token including a
    /// trailing `Eof`.
    #[must_use]
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<(Pos, String)>) {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start = self.pos();
            let Some(c) = self.peek() else {
                tokens.push(Token { kind: TokKind::Eof, pos: start });
                break;
            };
            let kind = if c.is_ascii_digit() {
                self.lex_number()
            } else if c == '\'' {
                self.lex_byte_lit()
            } else if c.is_alphabetic() || c == '_' {
                self.lex_ident_or_kw()
            } else {
                self.lex_punct()
            };
            if let Some(kind) = kind {
                tokens.push(Token { kind, pos: start });
            }
        }
        (tokens, self.errors)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    // the only char after a byte offset we can cheaply peek
                    // two ahead of without disturbing the main iterator.
                    let next_is_slash = self
                        .chars
                        .clone()
                        .nth(1)
                        .map(|(_, c)| c == '/')
                        .unwrap_or(false);
                    if next_is_slash {
                        while let Some(c) = self.peek() {
                            if c == '\n' {
                                break;
                            }
                            self.bump();
                        }
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_number(&mut self) -> Option<TokKind> {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match s.parse::<i64>() {
            Ok(v) => Some(TokKind::Int(v)),
            Err(_) => {
                self.errors.push((self.pos(), format!("invalid integer literal {s:?}")));
                None
            }
        }
    }

    /// `'x'` — a single-byte literal (the language's only way to write a
    /// `byte` constant directly in source).
    fn lex_byte_lit(&mut self) -> Option<TokKind> {
        let start = self.pos();
        self.bump(); // opening quote
        let Some(c) = self.bump() else {
            self.errors.push((start, "unterminated byte literal".into()));
            return None;
        };
        if self.peek() != Some('\'') {
            self.errors.push((start, "byte literal must contain exactly one ASCII character".into()));
            while self.peek().is_some_and(|c| c != '\'') {
                self.bump();
            }
            self.bump();
            return None;
        }
        self.bump(); // closing quote
        if !c.is_ascii() {
            self.errors.push((start, "byte literal must be ASCII".into()));
            return None;
        }
        Some(TokKind::Byte(c as u8))
    }

    fn lex_ident_or_kw(&mut self) -> Option<TokKind> {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Some(match s.as_str() {
            "package" => TokKind::KwPackage,
            "func" => TokKind::KwFunc,
            "var" => TokKind::KwVar,
            "const" => TokKind::KwConst,
            "struct" => TokKind::KwStruct,
            "if" => TokKind::KwIf,
            "else" => TokKind::KwElse,
            "for" => TokKind::KwFor,
            "return" => TokKind::KwReturn,
            "true" => TokKind::KwTrue,
            "false" => TokKind::KwFalse,
            _ => TokKind::Ident(s),
        })
    }

    fn lex_punct(&mut self) -> Option<TokKind> {
        let pos_before = self.pos();
        let c = self.bump()?;
        Some(match c {
            '(' => TokKind::LParen,
            ')' => TokKind::RParen,
            '{' => TokKind::LBrace,
            '}' => TokKind::RBrace,
            '[' => TokKind::LBracket,
            ']' => TokKind::RBracket,
            ',' => TokKind::Comma,
            ';' => TokKind::Semi,
            ':' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokKind::Define
                } else {
                    TokKind::Colon
                }
            }
            '.' => TokKind::Dot,
            '=' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokKind::Eq
                } else {
                    TokKind::Assign
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokKind::Ne
                } else {
                    TokKind::Bang
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokKind::Le
                } else {
                    TokKind::Lt
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokKind::Ge
                } else {
                    TokKind::Gt
                }
            }
            '+' => TokKind::Plus,
            '-' => TokKind::Minus,
            '&' => TokKind::Amp,
            '|' => TokKind::Pipe,
            '^' => TokKind::Caret,
            '*' => {
                // Re-tokenized by the parser as either "deref"/"pointer
                // type" depending on position; the lexer hands back a
                // dedicated kind so the parser never has to special-case
                // it against a multiply operator the ISA doesn't have.
                TokKind::Star
            }
            other => {
                self.errors.push((pos_before, format!("unexpected character {other:?}")));
                return None;
            }
        })
    }
}

impl TokKind {
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }
}
