//! Token types for the Osprey lexer.
//!
//! A [`LexToken`] is the ephemeral unit handed from the lexer to the parser:
//! it lives only for the duration of one lookahead step. Declared names are
//! promoted into arena-owned [`crate::frontend::symbols::Symbol`] records by
//! the declaration productions; the token itself never becomes a symbol.

/// Maximum spelling length for identifiers, numbers and strings.
pub const MAX_TOKEN_LEN: usize = 256;

/// Boolean-expression operators (lowest-binding layer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BoolOp::And => "&",
            BoolOp::Or => "|",
        }
    }
}

/// Additive arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Plus,
    Minus,
}

impl ArithOp {
    pub fn as_str(self) -> &'static str {
        match self {
            ArithOp::Plus => "+",
            ArithOp::Minus => "-",
        }
    }
}

/// Relational operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Equal,
    NotEqual,
}

impl RelOp {
    pub fn as_str(self) -> &'static str {
        match self {
            RelOp::Less => "<",
            RelOp::LessEq => "<=",
            RelOp::Greater => ">",
            RelOp::GreaterEq => ">=",
            RelOp::Equal => "==",
            RelOp::NotEqual => "!=",
        }
    }
}

/// Multiplicative operators (tightest-binding operator layer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermOp {
    Star,
    Slash,
}

impl TermOp {
    pub fn as_str(self) -> &'static str {
        match self {
            TermOp::Star => "*",
            TermOp::Slash => "/",
        }
    }
}

/// Reserved words that are pure keywords (no literal or type payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Program,
    Is,
    Begin,
    End,
    Global,
    Procedure,
    Variable,
    If,
    Then,
    Else,
    For,
    Return,
    Not,
}

impl Keyword {
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Program => "PROGRAM",
            Keyword::Is => "IS",
            Keyword::Begin => "BEGIN",
            Keyword::End => "END",
            Keyword::Global => "GLOBAL",
            Keyword::Procedure => "PROCEDURE",
            Keyword::Variable => "VARIABLE",
            Keyword::If => "IF",
            Keyword::Then => "THEN",
            Keyword::Else => "ELSE",
            Keyword::For => "FOR",
            Keyword::Return => "RETURN",
            Keyword::Not => "NOT",
        }
    }
}

/// Reserved type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeWord {
    Integer,
    Float,
    Str,
    Bool,
}

impl TypeWord {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeWord::Integer => "INTEGER",
            TypeWord::Float => "FLOAT",
            TypeWord::Str => "STRING",
            TypeWord::Bool => "BOOL",
        }
    }
}

/// Literal payloads. `True`/`False` come from reserved words, the rest from
/// literal syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Int(i64),
    Float(f64),
    Str(String),
    True,
    False,
}

/// Kind of token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Single-character punctuation
    Period,
    Semicolon,
    Colon,
    LParen,
    RParen,
    Comma,
    LBracket,
    RBracket,

    /// `:=`
    Assign,

    // Operator classes, lowest to highest binding
    BoolOp(BoolOp),
    ArithOp(ArithOp),
    RelOp(RelOp),
    TermOp(TermOp),

    Keyword(Keyword),
    TypeWord(TypeWord),
    Literal(LiteralValue),

    /// Case-folded (uppercase) identifier spelling.
    Ident(String),

    Eof,
}

impl TokenKind {
    /// Description used on the "found" side of expected/found diagnostics.
    ///
    /// Identifiers and int/float/string literals are described by class, the
    /// way the diagnostics report them; everything else by its spelling.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Period => ".".to_string(),
            TokenKind::Semicolon => ";".to_string(),
            TokenKind::Colon => ":".to_string(),
            TokenKind::LParen => "(".to_string(),
            TokenKind::RParen => ")".to_string(),
            TokenKind::Comma => ",".to_string(),
            TokenKind::LBracket => "[".to_string(),
            TokenKind::RBracket => "]".to_string(),
            TokenKind::Assign => ":=".to_string(),
            TokenKind::BoolOp(op) => op.as_str().to_string(),
            TokenKind::ArithOp(op) => op.as_str().to_string(),
            TokenKind::RelOp(op) => op.as_str().to_string(),
            TokenKind::TermOp(op) => op.as_str().to_string(),
            TokenKind::Keyword(kw) => kw.as_str().to_string(),
            TokenKind::TypeWord(tw) => tw.as_str().to_string(),
            TokenKind::Literal(LiteralValue::Int(_)) | TokenKind::Literal(LiteralValue::Float(_)) => {
                "numeric literal".to_string()
            }
            TokenKind::Literal(LiteralValue::Str(_)) => "string literal".to_string(),
            TokenKind::Literal(LiteralValue::True) => "TRUE".to_string(),
            TokenKind::Literal(LiteralValue::False) => "FALSE".to_string(),
            TokenKind::Ident(_) => "identifier".to_string(),
            TokenKind::Eof => "end of file".to_string(),
        }
    }
}

/// A token with the source line it started on.
#[derive(Debug, Clone, PartialEq)]
pub struct LexToken {
    pub kind: TokenKind,
    pub line: u32,
}

impl LexToken {
    pub fn new(kind: TokenKind, line: u32) -> Self {
        Self { kind, line }
    }
}

/// Resolve a case-folded identifier spelling to its reserved-word token, if
/// the spelling is reserved.
pub fn reserved_word(spelling: &str) -> Option<TokenKind> {
    let kind = match spelling {
        "PROGRAM" => TokenKind::Keyword(Keyword::Program),
        "IS" => TokenKind::Keyword(Keyword::Is),
        "BEGIN" => TokenKind::Keyword(Keyword::Begin),
        "END" => TokenKind::Keyword(Keyword::End),
        "GLOBAL" => TokenKind::Keyword(Keyword::Global),
        "PROCEDURE" => TokenKind::Keyword(Keyword::Procedure),
        "VARIABLE" => TokenKind::Keyword(Keyword::Variable),
        "IF" => TokenKind::Keyword(Keyword::If),
        "THEN" => TokenKind::Keyword(Keyword::Then),
        "ELSE" => TokenKind::Keyword(Keyword::Else),
        "FOR" => TokenKind::Keyword(Keyword::For),
        "RETURN" => TokenKind::Keyword(Keyword::Return),
        "NOT" => TokenKind::Keyword(Keyword::Not),
        "TRUE" => TokenKind::Literal(LiteralValue::True),
        "FALSE" => TokenKind::Literal(LiteralValue::False),
        "INTEGER" => TokenKind::TypeWord(TypeWord::Integer),
        "FLOAT" => TokenKind::TypeWord(TypeWord::Float),
        "STRING" => TokenKind::TypeWord(TypeWord::Str),
        "BOOL" => TokenKind::TypeWord(TypeWord::Bool),
        _ => return None,
    };
    Some(kind)
}

/// All reserved-word spellings, used to seed the reserved scope.
pub const RESERVED_WORDS: &[&str] = &[
    "PROGRAM",
    "IS",
    "BEGIN",
    "END",
    "GLOBAL",
    "PROCEDURE",
    "VARIABLE",
    "IF",
    "THEN",
    "ELSE",
    "FOR",
    "RETURN",
    "TRUE",
    "FALSE",
    "NOT",
    "INTEGER",
    "FLOAT",
    "STRING",
    "BOOL",
];
