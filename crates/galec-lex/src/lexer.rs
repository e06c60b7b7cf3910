//! Streaming lexer for gale source code.
//!
//! The lexer runs on its own thread and feeds tokens through a bounded
//! channel to its single consumer, suspending when the channel is full.
//! The consumer may cancel it early (used when only the leading
//! `package NAME` is wanted); cancellation is checked between emissions and
//! raced against every blocked send, so a cancelled consumer that drains to
//! channel close can never deadlock the producer.
//!
//! Statement terminators are injected automatically: after a token whose
//! kind closes an expression (identifier, literal, `break`, `continue`,
//! `return`, `)`, `}`), the first following newline, including newlines
//! inside comments, produces a `;` token spanned at the newline.

use crossbeam::channel::{bounded, Receiver, Sender};
use crossbeam::select;
use galec_util::{FilePos, FileSpan};
use std::sync::Arc;
use std::thread;

use crate::token::{keyword_from_ident, Token, TokenKind};

/// Capacity of the token FIFO between the lexer and its consumer.
pub const TOKEN_CHANNEL_CAPACITY: usize = 8;

/// Consumer end of a running lexer.
///
/// Tokens arrive in lex order and end with a single `Eof` (or `Error`)
/// token, after which the channel closes. A consumer that stops early must
/// call [`TokenStream::cancel`] and then [`TokenStream::drain`] so the
/// producer can finish.
pub struct TokenStream {
    rx: Receiver<Token>,
    cancel: Option<Sender<()>>,
}

impl TokenStream {
    /// Receives the next token, or `None` once the producer has finished.
    pub fn recv(&self) -> Option<Token> {
        self.rx.recv().ok()
    }

    /// Signals the producer to stop. May be called at most once; later
    /// calls are no-ops.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.try_send(());
        }
    }

    /// Receives and discards tokens until the channel closes.
    pub fn drain(&self) {
        while self.rx.recv().is_ok() {}
    }

    /// Iterates over the remaining tokens.
    pub fn iter(&self) -> impl Iterator<Item = Token> + '_ {
        std::iter::from_fn(move || self.recv())
    }
}

/// Starts lexing `src` on a new thread and returns the consumer end.
pub fn lex(path: impl Into<Arc<str>>, src: impl Into<String>) -> TokenStream {
    let (tx, rx) = bounded(TOKEN_CHANNEL_CAPACITY);
    let (cancel_tx, cancel_rx) = bounded(1);
    let lexer = Lexer::new(path.into(), src.into(), tx, cancel_rx);
    thread::spawn(move || lexer.run());
    TokenStream {
        rx,
        cancel: Some(cancel_tx),
    }
}

/// Producer stopped early: cancelled, consumer gone, or lex error sent.
struct Stopped;

type Step = Result<(), Stopped>;

struct Lexer {
    path: Arc<str>,
    chars: Vec<char>,
    idx: usize,
    /// Position of the next rune to read.
    pos: FilePos,
    /// Position of the most recently read rune, for one rune of unread.
    prev_pos: FilePos,
    /// Start position of the token being lexed.
    marked: FilePos,
    /// Set after emitting a token that can end a statement; a newline seen
    /// while it is set injects a `;`.
    semi_hack: bool,
    tx: Sender<Token>,
    cancel: Receiver<()>,
}

impl Lexer {
    fn new(path: Arc<str>, src: String, tx: Sender<Token>, cancel: Receiver<()>) -> Self {
        Self {
            path,
            chars: src.chars().collect(),
            idx: 0,
            pos: FilePos::START,
            prev_pos: FilePos::START,
            marked: FilePos::START,
            semi_hack: false,
            tx,
            cancel,
        }
    }

    fn run(mut self) {
        loop {
            if self.cancelled() {
                return;
            }
            let c = match self.read_rune() {
                None => {
                    self.marked = self.pos;
                    let _ = self.send_tok(TokenKind::Eof, String::new());
                    return;
                }
                Some(c) => c,
            };
            match c {
                ' ' | '\t' | '\r' => continue,
                '\n' => {
                    if self.inject_semicolon().is_err() {
                        return;
                    }
                }
                _ => {
                    self.marked = self.prev_pos;
                    if self.lex_token(c).is_err() {
                        return;
                    }
                }
            }
        }
    }

    fn cancelled(&self) -> bool {
        // A disconnected cancel channel means the consumer is gone.
        match self.cancel.try_recv() {
            Ok(()) => true,
            Err(e) => e.is_disconnected(),
        }
    }

    // Rune reading. Exactly one rune of unread is supported; the previous
    // position is remembered for it.

    fn read_rune(&mut self) -> Option<char> {
        let c = *self.chars.get(self.idx)?;
        self.idx += 1;
        self.prev_pos = self.pos;
        self.pos.advance(c);
        Some(c)
    }

    fn unread_rune(&mut self) {
        self.idx -= 1;
        self.pos = self.prev_pos;
    }

    // Token emission.

    fn send(&mut self, tok: Token) -> Step {
        select! {
            send(self.tx, tok) -> res => {
                if res.is_err() {
                    return Err(Stopped);
                }
            }
            recv(self.cancel) -> _ => return Err(Stopped),
        }
        Ok(())
    }

    fn send_tok(&mut self, kind: TokenKind, text: String) -> Step {
        let span = FileSpan::new(self.path.clone(), self.marked, self.pos);
        self.semi_hack = kind.triggers_semicolon();
        self.send(Token::new(kind, text, span))
    }

    fn send_fixed(&mut self, kind: TokenKind) -> Step {
        let text = kind.lexeme().unwrap_or("").to_string();
        self.send_tok(kind, text)
    }

    /// Sends a single `Error` token and stops the lexer.
    fn lex_error(&mut self, message: impl Into<String>) -> Stopped {
        let span = FileSpan::new(self.path.clone(), self.marked, self.pos);
        let _ = self.send(Token::new(TokenKind::Error, message.into(), span));
        Stopped
    }

    /// Injects a `;` at the newline just read, if one is pending.
    fn inject_semicolon(&mut self) -> Step {
        if !self.semi_hack {
            return Ok(());
        }
        self.semi_hack = false;
        let span = FileSpan::point(self.path.clone(), self.prev_pos);
        self.send(Token::new(TokenKind::Semicolon, ";".to_string(), span))
    }

    // Token recognition, dispatched on the first rune.

    fn lex_token(&mut self, c: char) -> Step {
        use TokenKind::*;
        match c {
            '(' => self.send_fixed(LParen),
            ')' => self.send_fixed(RParen),
            '[' => self.send_fixed(LBracket),
            ']' => self.send_fixed(RBracket),
            '{' => self.send_fixed(LBrace),
            '}' => self.send_fixed(RBrace),
            ',' => self.send_fixed(Comma),
            ';' => self.send_fixed(Semicolon),
            '%' => self.send_fixed(Percent),
            '.' => self.lex_dots(),
            '=' => self.op2(&[('=', EqEq)], Eq),
            '!' => match self.read_rune() {
                Some('=') => self.send_fixed(NotEq),
                _ => Err(self.lex_error("bad character '!'")),
            },
            '|' => self.op2(&[('|', OrOr), ('=', PipeEq)], Pipe),
            '&' => self.op2(&[('&', AndAnd), ('=', AmpEq), ('^', AndNot)], Ampersand),
            '+' => self.op2(&[('+', Inc), ('=', PlusEq)], Plus),
            '-' => self.op2(&[('-', Dec), ('=', MinusEq)], Minus),
            '*' => self.op2(&[('=', StarEq)], Star),
            '<' => self.op2(&[('<', Shl), ('=', LtEq)], Lt),
            '>' => self.op2(&[('>', Shr), ('=', GtEq)], Gt),
            '^' => self.op2(&[('=', CaretEq)], Caret),
            '/' => self.lex_slash(),
            '"' => self.lex_string(),
            'a'..='z' | 'A'..='Z' | '_' => self.lex_ident(c),
            '0'..='9' => self.lex_number(c),
            _ => Err(self.lex_error(format!("bad character '{}'", c))),
        }
    }

    /// Multi-rune operator: peeks one rune and unreads on mismatch.
    fn op2(&mut self, pairs: &[(char, TokenKind)], single: TokenKind) -> Step {
        if let Some(next) = self.read_rune() {
            for &(want, kind) in pairs {
                if next == want {
                    return self.send_fixed(kind);
                }
            }
            self.unread_rune();
        }
        self.send_fixed(single)
    }

    fn lex_dots(&mut self) -> Step {
        match self.read_rune() {
            Some('.') => match self.read_rune() {
                Some('.') => self.send_fixed(TokenKind::Ellipsis),
                _ => Err(self.lex_error("unexpected token '..'")),
            },
            Some(_) => {
                self.unread_rune();
                self.send_fixed(TokenKind::Dot)
            }
            None => self.send_fixed(TokenKind::Dot),
        }
    }

    fn lex_ident(&mut self, first: char) -> Step {
        let mut buf = String::new();
        buf.push(first);
        while let Some(c) = self.read_rune() {
            if c.is_ascii_alphanumeric() || c == '_' {
                buf.push(c);
            } else {
                self.unread_rune();
                break;
            }
        }
        match keyword_from_ident(&buf) {
            Some(kind) => self.send_tok(kind, buf),
            None => self.send_tok(TokenKind::Identifier, buf),
        }
    }

    /// A leading digit followed by any of `[0-9A-Fa-f.]`. The shape is
    /// deliberately loose; the parser does the base-10 conversion.
    fn lex_number(&mut self, first: char) -> Step {
        let mut buf = String::new();
        buf.push(first);
        while let Some(c) = self.read_rune() {
            if c.is_ascii_digit() || c.is_ascii_hexdigit() || c == '.' {
                buf.push(c);
            } else {
                self.unread_rune();
                break;
            }
        }
        self.send_tok(TokenKind::Constant, buf)
    }

    /// A string literal, buffered verbatim until the closing quote.
    fn lex_string(&mut self) -> Step {
        let mut buf = String::new();
        loop {
            match self.read_rune() {
                None => return Err(self.lex_error("unterminated string literal")),
                Some('"') => return self.send_tok(TokenKind::String, buf),
                Some(c) => buf.push(c),
            }
        }
    }

    /// `/` is a division operator, a line comment, or a block comment.
    fn lex_slash(&mut self) -> Step {
        match self.read_rune() {
            Some('/') => self.lex_line_comment(),
            Some('*') => self.lex_block_comment(),
            Some(_) => {
                self.unread_rune();
                self.send_fixed(TokenKind::Slash)
            }
            None => self.send_fixed(TokenKind::Slash),
        }
    }

    fn lex_line_comment(&mut self) -> Step {
        loop {
            match self.read_rune() {
                None => return Ok(()),
                Some('\n') => return self.inject_semicolon(),
                Some(_) => {}
            }
        }
    }

    fn lex_block_comment(&mut self) -> Step {
        loop {
            match self.read_rune() {
                None => return Err(self.lex_error("unterminated block comment")),
                Some('\n') => self.inject_semicolon()?,
                Some('*') => match self.read_rune() {
                    None => return Err(self.lex_error("unterminated block comment")),
                    Some('/') => return Ok(()),
                    Some(_) => self.unread_rune(),
                },
                Some(_) => {}
            }
        }
    }
}
