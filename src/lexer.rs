use crate::{
    diagnostic::{plural, Diagnostics, Stage},
    token::{Pos, Spanned, Token, TokenKind, KEYWORDS, LONGEST_KEYWORD},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A character that starts no token.
    Unknown(Box<str>),
    /// A well-formed token that may not appear between quotes.
    InvalidInString(Box<str>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    UnterminatedComment,
    UnterminatedString,
    MissingEop,
}

/// The result of lexing one program unit.
#[derive(Debug)]
pub struct LexOutput<'src> {
    pub tokens: Vec<Token>,
    pub in_comment: bool,
    pub in_quote: bool,
    /// Where the most recent comment was opened.
    pub comment_start: Option<Pos>,
    /// Whether the trailing `$` was synthesized.
    pub missing_eop: bool,
    /// Input following the unit's `$`.
    pub remaining: &'src str,
    /// Position of the first byte of `remaining`.
    pub next: Pos,
}

impl LexOutput<'_> {
    pub fn errors(&self) -> impl Iterator<Item = Spanned<Error>> + '_ {
        self.tokens.iter().filter_map(token_error)
    }

    pub fn has_errors(&self) -> bool {
        self.tokens.iter().any(Token::is_error)
    }

    pub fn warnings(&self) -> Vec<Spanned<Warning>> {
        let mut warnings = Vec::new();
        if self.in_comment {
            let pos = self.comment_start.unwrap_or(self.next);
            warnings.push(pos.wrap(Warning::UnterminatedComment));
        }
        if self.in_quote {
            warnings.push(self.next.wrap(Warning::UnterminatedString));
        }
        if self.missing_eop {
            let pos = self.tokens.last().map_or(self.next, |t| t.pos);
            warnings.push(pos.wrap(Warning::MissingEop));
        }
        warnings
    }
}

fn token_error(token: &Token) -> Option<Spanned<Error>> {
    let error = match token.kind {
        TokenKind::Unknown => Error::Unknown(token.text.clone()),
        TokenKind::Invalid => Error::InvalidInString(token.text.clone()),
        _ => return None,
    };
    Some(token.pos.wrap(error))
}

/// Lexes a single program unit starting at `start`.
///
/// Lexing stops right after the first `$` found outside comments and string
/// literals; whatever follows it is handed back in [`LexOutput::remaining`].
pub fn lex(src: &str, start: Pos) -> LexOutput<'_> {
    Lexer::new(src, start).lex()
}

/// Lexes from the beginning of a source file.
pub fn lex_str(src: &str) -> LexOutput<'_> {
    lex(src, Pos::START)
}

/// Writes the per-token log, the errors and the warnings of `output`, followed
/// by the stage summary. Returns the number of errors.
pub fn report(output: &LexOutput<'_>, diagnostics: &mut Diagnostics) -> usize {
    let mut errors = 0;
    for token in &output.tokens {
        if let Some(error) = token_error(token) {
            errors += 1;
            diagnostics.error(Stage::Lexer, format!("{error:#}"));
        } else {
            diagnostics.debug(
                Stage::Lexer,
                format!("{} [ {} ] found at {}", token.kind.class(), token.text, token.pos),
            );
        }
    }
    let warnings = output.warnings();
    for warning in &warnings {
        diagnostics.warning(Stage::Lexer, format!("{warning:#}"));
    }
    let warnings = plural(warnings.len(), "warning");
    if errors == 0 {
        diagnostics.info(
            Stage::Lexer,
            format!("Lex completed with 0 errors and {warnings}"),
        );
    } else {
        let errors = plural(errors, "error");
        diagnostics.error(
            Stage::Lexer,
            format!("Lex failed with {errors} and {warnings}"),
        );
    }
    errors
}

/// What a single scan step recognized, before the quote and comment states
/// are applied.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Lexeme {
    Token(TokenKind),
    Whitespace,
}

struct Lexer<'src> {
    src: &'src str,
    cursor: usize,
    pos: Pos,
    in_quote: bool,
    in_comment: bool,
    comment_start: Option<Pos>,
    tokens: Vec<Token>,
}

impl<'src> Lexer<'src> {
    fn lex(mut self) -> LexOutput<'src> {
        let mut found_eop = false;
        while self.cursor < self.src.len() {
            let pos = self.pos;
            let (lexeme, len) = self.scan();
            let text = self.bump(len);

            if self.in_quote {
                let kind = match lexeme {
                    Lexeme::Token(TokenKind::Quote) => {
                        self.in_quote = false;
                        TokenKind::Quote
                    }
                    Lexeme::Token(
                        kind @ (TokenKind::Char | TokenKind::Space | TokenKind::Unknown),
                    ) => kind,
                    _ => TokenKind::Invalid,
                };
                self.produce(kind, text, pos);
            } else if self.in_comment {
                if lexeme == Lexeme::Token(TokenKind::CommentEnd) {
                    self.in_comment = false;
                }
            } else {
                match lexeme {
                    Lexeme::Whitespace => (),
                    Lexeme::Token(TokenKind::CommentStart) => {
                        self.in_comment = true;
                        self.comment_start = Some(pos);
                    }
                    // A closing delimiter with no open comment.
                    Lexeme::Token(TokenKind::CommentEnd) => {
                        self.produce(TokenKind::Unknown, text, pos);
                    }
                    Lexeme::Token(TokenKind::Quote) => {
                        self.in_quote = true;
                        self.produce(TokenKind::Quote, text, pos);
                    }
                    Lexeme::Token(TokenKind::Eop) => {
                        self.produce(TokenKind::Eop, text, pos);
                        found_eop = true;
                        break;
                    }
                    Lexeme::Token(kind) => self.produce(kind, text, pos),
                }
            }
        }

        if !found_eop {
            if let Some(last) = self.tokens.last() {
                let pos = Pos::new(last.pos.line, last.pos.col + 1);
                self.tokens.push(Token::new(TokenKind::Eop, "$", pos));
            }
        }

        LexOutput {
            tokens: self.tokens,
            in_comment: self.in_comment,
            in_quote: self.in_quote,
            comment_start: self.comment_start,
            missing_eop: !found_eop,
            remaining: &self.src[self.cursor..],
            next: self.pos,
        }
    }

    /// Recognizes the lexeme at the cursor, returning it with its byte length.
    ///
    /// Alternatives sharing a prefix are resolved in priority order: keywords
    /// and booleans before identifiers, `==` before `=`, and comment
    /// delimiters before the characters they are made of.
    fn scan(&self) -> (Lexeme, usize) {
        use TokenKind::*;
        let rest = &self.src[self.cursor..];
        let mut chars = rest.chars();
        let Some(current) = chars.next() else {
            return (Lexeme::Whitespace, 0);
        };
        let next = chars.next();
        let token = |kind, len| (Lexeme::Token(kind), len);
        match current {
            // Keywords keep their priority between quotes, where they are
            // rejected later on.
            'a'..='z' if self.in_quote => match keyword_or_id(rest) {
                (Lexeme::Token(Id), _) => token(Char, 1),
                keyword => keyword,
            },
            'a'..='z' => keyword_or_id(rest),
            '0'..='9' => token(Number, run_len(rest, |c| c.is_ascii_digit())),
            ' ' if self.in_quote => token(Space, run_len(rest, |c| c == ' ')),
            c if c.is_whitespace() => (Lexeme::Whitespace, run_len(rest, char::is_whitespace)),
            '"' => token(Quote, 1),
            '{' => token(LBrace, 1),
            '}' => token(RBrace, 1),
            '(' => token(LParen, 1),
            ')' => token(RParen, 1),
            '+' => token(Plus, 1),
            '$' => token(Eop, 1),
            '=' => match next {
                Some('=') => token(EqEq, 2),
                _ => token(Assign, 1),
            },
            '!' if next == Some('=') => token(NotEq, 2),
            '/' if next == Some('*') => token(CommentStart, 2),
            '*' if next == Some('/') => token(CommentEnd, 2),
            c => token(Unknown, c.len_utf8()),
        }
    }
}

impl<'src> Lexer<'src> {
    fn new(src: &'src str, start: Pos) -> Lexer<'src> {
        Lexer {
            src,
            cursor: 0,
            pos: start,
            in_quote: false,
            in_comment: false,
            comment_start: None,
            tokens: Vec::with_capacity(src.len() / 2),
        }
    }

    /// Consumes `len` bytes, returning them and advancing the position.
    fn bump(&mut self, len: usize) -> &'src str {
        let text = &self.src[self.cursor..self.cursor + len];
        self.cursor += len;
        self.pos = self.pos.advance(text);
        text
    }

    fn produce(&mut self, kind: TokenKind, text: &str, pos: Pos) {
        self.tokens.push(Token::new(kind, text, pos));
    }
}

fn keyword_or_id(rest: &str) -> (Lexeme, usize) {
    for len in (2..=LONGEST_KEYWORD).rev() {
        if let Some(kind) = rest.get(..len).and_then(|prefix| KEYWORDS.get(prefix)) {
            return (Lexeme::Token(*kind), len);
        }
    }
    (Lexeme::Token(TokenKind::Id), 1)
}

/// Byte length of the longest prefix of `s` whose characters satisfy `pred`.
fn run_len(s: &str, pred: impl Fn(char) -> bool) -> usize {
    s.find(|c| !pred(c)).unwrap_or(s.len())
}
