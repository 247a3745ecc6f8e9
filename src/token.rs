use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: Box<str>,
    pub pos: Pos,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<Box<str>>, pos: Pos) -> Token {
        Token {
            kind,
            text: text.into(),
            pos,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind.is_error()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {:?}, {})", self.kind, self.text, self.pos)
    }
}

/// A source position. Lines start at 1, columns at 0.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub const START: Pos = Pos { line: 1, col: 0 };

    pub const fn new(line: u32, col: u32) -> Pos {
        Pos { line, col }
    }

    /// Returns the position reached after consuming `lexeme` from `self`.
    pub fn advance(self, lexeme: &str) -> Pos {
        match lexeme.rfind('\n') {
            Some(last) => {
                let newlines = lexeme.bytes().filter(|b| *b == b'\n').count();
                let tail = lexeme[last + 1..].chars().count();
                Pos {
                    line: self.line + u32::try_from(newlines).unwrap_or(u32::MAX),
                    col: u32::try_from(tail).unwrap_or(u32::MAX),
                }
            }
            None => Pos {
                line: self.line,
                col: self.col + u32::try_from(lexeme.chars().count()).unwrap_or(u32::MAX),
            },
        }
    }

    pub fn wrap<T>(self, inner: T) -> Spanned<T> {
        Spanned { pos: self, inner }
    }
}

impl fmt::Debug for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pos({self})")
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Some value (usually an error) attached to the source position it refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub pos: Pos,
    pub inner: T,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Keyword(Keyword),
    Boolean(bool),
    Id,
    Number,

    Quote,
    Char,
    /// A run of spaces inside a string literal.
    Space,

    LBrace,
    RBrace,
    LParen,
    RParen,
    /// `=`
    Assign,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `+`
    Plus,
    /// `$`
    Eop,

    /// `/*`
    CommentStart,
    /// `*/`
    CommentEnd,

    /// A character no pattern recognizes.
    Unknown,
    /// A recognizable token that may not appear inside a string literal.
    Invalid,
}

impl TokenKind {
    pub fn is_error(self) -> bool {
        matches!(self, TokenKind::Unknown | TokenKind::Invalid)
    }

    /// The token class name used in diagnostics.
    pub fn class(self) -> &'static str {
        match self {
            TokenKind::Keyword(_) => "KEYWORD",
            TokenKind::Boolean(_) => "BOOL",
            TokenKind::Id => "ID",
            TokenKind::Number => "NUMBER",
            TokenKind::Quote => "QUOTE",
            TokenKind::Char => "CHAR",
            TokenKind::Space => "SPACE",
            TokenKind::LBrace => "OPEN_BLOCK",
            TokenKind::RBrace => "CLOSE_BLOCK",
            TokenKind::LParen => "OPEN_PAREN",
            TokenKind::RParen => "CLOSE_PAREN",
            TokenKind::Assign => "ASSIGN",
            TokenKind::EqEq | TokenKind::NotEq => "EQUALITY",
            TokenKind::Plus => "INT_OP",
            TokenKind::Eop => "EOP",
            TokenKind::CommentStart => "COMMENT_START",
            TokenKind::CommentEnd => "COMMENT_END",
            TokenKind::Unknown => "UNKNOWN",
            TokenKind::Invalid => "INVALID",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Int,
    String,
    Boolean,
    Print,
    While,
    If,
}

impl Keyword {
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Int => "int",
            Keyword::String => "string",
            Keyword::Boolean => "boolean",
            Keyword::Print => "print",
            Keyword::While => "while",
            Keyword::If => "if",
        }
    }
}

/// Reserved words, including the two boolean literals.
pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "int" => TokenKind::Keyword(Keyword::Int),
    "string" => TokenKind::Keyword(Keyword::String),
    "boolean" => TokenKind::Keyword(Keyword::Boolean),
    "print" => TokenKind::Keyword(Keyword::Print),
    "while" => TokenKind::Keyword(Keyword::While),
    "if" => TokenKind::Keyword(Keyword::If),
    "true" => TokenKind::Boolean(true),
    "false" => TokenKind::Boolean(false),
};

/// Length of the longest entry in [`KEYWORDS`].
pub const LONGEST_KEYWORD: usize = 7;
