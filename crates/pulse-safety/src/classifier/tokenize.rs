//! Quote-aware shell lexer.
//!
//! Splits a command line into simple-command segments joined by `|`, `&&`,
//! `||`, `;` or newlines. Words are returned with quotes and escapes
//! removed. Constructs whose effect cannot be judged from the words alone
//! (substitution, heredocs, background jobs, subshells) are reported as
//! [`LexError`]s so the classifier can refuse them outright.

use std::iter::Peekable;
use std::str::CharIndices;

/// Operator joining two segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operator {
    Pipe,
    And,
    Or,
    Seq,
}

impl Operator {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Pipe => " | ",
            Self::And => " && ",
            Self::Or => " || ",
            Self::Seq => "; ",
        }
    }
}

/// An output redirection attached to a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Redirect {
    /// Explicit file descriptor (`2` in `2>`), or `&` for `&>`.
    pub(crate) fd: Option<String>,
    /// `>`, `>>`, `>&`, `>>&`.
    pub(crate) op: String,
    pub(crate) target: String,
}

impl Redirect {
    /// `2>/dev/null` and descriptor duplication (`2>&1`, `>&2`) are the only
    /// redirections that cannot write to a file.
    pub(crate) fn is_harmless(&self) -> bool {
        if self.op.ends_with('&') {
            return matches!(self.target.as_str(), "1" | "2");
        }
        self.fd.as_deref() == Some("2") && self.op == ">" && self.target == "/dev/null"
    }
}

/// One simple command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Segment {
    pub(crate) words: Vec<String>,
    pub(crate) redirects: Vec<Redirect>,
    /// Source text of the segment, trimmed.
    pub(crate) raw: String,
}

/// A tokenized command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Parsed {
    pub(crate) segments: Vec<Segment>,
    /// `operators[i]` joins `segments[i]` and `segments[i + 1]`.
    pub(crate) operators: Vec<Operator>,
}

impl Parsed {
    /// Rebuild the command line, replacing segments that have a rewrite.
    pub(crate) fn rebuild(&self, rewrites: &[Option<String>]) -> String {
        let mut out = String::new();
        for (idx, seg) in self.segments.iter().enumerate() {
            if let Some(op) = idx.checked_sub(1).and_then(|prev| self.operators.get(prev)) {
                out.push_str(op.as_str());
            }
            match rewrites.get(idx).and_then(Option::as_deref) {
                Some(rewrite) => out.push_str(rewrite),
                None => out.push_str(&seg.raw),
            }
        }
        out
    }
}

/// Construct the lexer refuses to interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LexError {
    Substitution,
    ProcessSubstitution,
    Heredoc,
    InputRedirect,
    Background,
    UnterminatedQuote,
    Subshell,
    EmptyStage,
    DanglingRedirect,
}

impl LexError {
    pub(crate) fn reason(self) -> &'static str {
        match self {
            Self::Substitution => "command substitution cannot be verified as read-only",
            Self::ProcessSubstitution => "process substitution cannot be verified as read-only",
            Self::Heredoc => "heredoc / here-string input is not allowed",
            Self::InputRedirect => "input redirection is not allowed",
            Self::Background => "background execution is not allowed",
            Self::UnterminatedQuote => "unterminated quote",
            Self::Subshell => "subshells and grouping are not allowed",
            Self::EmptyStage => "empty pipeline stage",
            Self::DanglingRedirect => "redirection without a target",
        }
    }
}

/// Tokenize `src`.
pub(crate) fn tokenize(src: &str) -> Result<Parsed, LexError> {
    Lexer::new(src).run()
}

struct Lexer<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
    word: String,
    in_word: bool,
    pending: Option<(Option<String>, String)>,
    seg: Segment,
    seg_start: usize,
    parsed: Parsed,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
            word: String::new(),
            in_word: false,
            pending: None,
            seg: Segment::default(),
            seg_start: 0,
            parsed: Parsed::default(),
        }
    }

    fn run(mut self) -> Result<Parsed, LexError> {
        while let Some((idx, c)) = self.chars.next() {
            match c {
                ' ' | '\t' | '\r' => self.finish_word(),
                '\n' => self.finish_segment(idx, Some(Operator::Seq))?,
                '\'' => self.single_quoted()?,
                '"' => self.double_quoted()?,
                '\\' => {
                    self.in_word = true;
                    match self.chars.next() {
                        Some((_, '\n')) => {},
                        Some((_, escaped)) => self.word.push(escaped),
                        None => self.word.push('\\'),
                    }
                },
                '`' => return Err(LexError::Substitution),
                '$' => {
                    if self.next_is('(') {
                        return Err(LexError::Substitution);
                    }
                    self.in_word = true;
                    self.word.push('$');
                },
                '(' | ')' => return Err(LexError::Subshell),
                '#' if !self.in_word => self.skip_comment(),
                '|' => {
                    let op = if self.eat('|') {
                        Operator::Or
                    } else {
                        self.eat('&');
                        Operator::Pipe
                    };
                    self.finish_segment(idx, Some(op))?;
                },
                '&' => {
                    if self.eat('&') {
                        self.finish_segment(idx, Some(Operator::And))?;
                    } else if self.eat('>') {
                        self.finish_word();
                        let op = if self.eat('>') { ">>" } else { ">" };
                        self.start_redirect(Some("&".to_string()), op.to_string())?;
                    } else {
                        return Err(LexError::Background);
                    }
                },
                ';' => {
                    self.eat(';');
                    self.finish_segment(idx, Some(Operator::Seq))?;
                },
                '<' => {
                    if self.next_is('(') {
                        return Err(LexError::ProcessSubstitution);
                    }
                    if self.next_is('<') {
                        return Err(LexError::Heredoc);
                    }
                    return Err(LexError::InputRedirect);
                },
                '>' => self.redirect()?,
                other => {
                    self.in_word = true;
                    self.word.push(other);
                },
            }
        }
        let end = self.src.len();
        self.finish_segment(end, None)?;
        Ok(self.parsed)
    }

    fn next_is(&mut self, expected: char) -> bool {
        self.chars.peek().is_some_and(|(_, c)| *c == expected)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.next_is(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn skip_comment(&mut self) {
        while let Some((_, c)) = self.chars.peek() {
            if *c == '\n' {
                break;
            }
            self.chars.next();
        }
    }

    fn single_quoted(&mut self) -> Result<(), LexError> {
        self.in_word = true;
        for (_, c) in self.chars.by_ref() {
            if c == '\'' {
                return Ok(());
            }
            self.word.push(c);
        }
        Err(LexError::UnterminatedQuote)
    }

    fn double_quoted(&mut self) -> Result<(), LexError> {
        self.in_word = true;
        while let Some((_, c)) = self.chars.next() {
            match c {
                '"' => return Ok(()),
                '`' => return Err(LexError::Substitution),
                '$' if self.next_is('(') => return Err(LexError::Substitution),
                '\\' => match self.chars.peek().map(|(_, c)| *c) {
                    Some(next @ ('$' | '`' | '"' | '\\')) => {
                        self.chars.next();
                        self.word.push(next);
                    },
                    Some('\n') => {
                        self.chars.next();
                    },
                    _ => self.word.push('\\'),
                },
                other => self.word.push(other),
            }
        }
        Err(LexError::UnterminatedQuote)
    }

    fn redirect(&mut self) -> Result<(), LexError> {
        if self.next_is('(') {
            return Err(LexError::ProcessSubstitution);
        }
        let fd = if self.in_word
            && !self.word.is_empty()
            && self.word.chars().all(|c| c.is_ascii_digit())
        {
            self.in_word = false;
            Some(std::mem::take(&mut self.word))
        } else {
            self.finish_word();
            None
        };
        let mut op = String::from(">");
        if self.eat('>') {
            op.push('>');
        }
        self.eat('|');
        if self.eat('&') {
            op.push('&');
        }
        self.start_redirect(fd, op)
    }

    fn start_redirect(&mut self, fd: Option<String>, op: String) -> Result<(), LexError> {
        if self.pending.is_some() {
            return Err(LexError::DanglingRedirect);
        }
        self.pending = Some((fd, op));
        Ok(())
    }

    fn finish_word(&mut self) {
        if !self.in_word {
            return;
        }
        self.in_word = false;
        let word = std::mem::take(&mut self.word);
        match self.pending.take() {
            Some((fd, op)) => self.seg.redirects.push(Redirect {
                fd,
                op,
                target: word,
            }),
            None => self.seg.words.push(word),
        }
    }

    fn finish_segment(&mut self, end: usize, op: Option<Operator>) -> Result<(), LexError> {
        self.finish_word();
        if self.pending.is_some() {
            return Err(LexError::DanglingRedirect);
        }

        let mut seg = std::mem::take(&mut self.seg);
        seg.raw = self.src.get(self.seg_start..end).unwrap_or("").trim().to_string();
        self.seg_start = self.chars.peek().map_or(self.src.len(), |(i, _)| *i);

        let empty = seg.words.is_empty() && seg.redirects.is_empty();
        match (empty, op) {
            (false, Some(op)) => {
                self.parsed.segments.push(seg);
                self.parsed.operators.push(op);
            },
            (false, None) => self.parsed.segments.push(seg),
            (true, Some(Operator::Seq)) => {
                if self.parsed.operators.last().is_some_and(|o| *o != Operator::Seq) {
                    return Err(LexError::EmptyStage);
                }
            },
            (true, Some(_)) => return Err(LexError::EmptyStage),
            (true, None) => match self.parsed.operators.last() {
                None => {},
                Some(Operator::Seq) => {
                    self.parsed.operators.pop();
                },
                Some(_) => return Err(LexError::EmptyStage),
            },
        }
        Ok(())
    }
}
