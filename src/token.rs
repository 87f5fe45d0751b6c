use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    /// 1-based line of the token's first character.
    pub line: u32,
    /// 1-based column of the token's first character.
    pub column: u32,
    /// Byte offset of the token's first character.
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>, pos: Pos) -> Token {
        Token {
            kind,
            literal: literal.into(),
            line: pos.line,
            column: pos.column,
            position: pos.offset,
        }
    }

    pub fn pos(&self) -> Pos {
        Pos {
            line: self.line,
            column: self.column,
            offset: self.position,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {:?}, {})", self.kind, self.literal, self.pos())
    }
}

/// A source location.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
    pub offset: usize,
}

impl Pos {
    pub fn new(line: u32, column: u32, offset: usize) -> Pos {
        Pos {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Debug for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pos({self}, offset: {})", self.offset)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Illegal,
    Eof,

    Ident,
    Int,
    Float,
    String,

    /// `=`
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    /// `&&`
    And,
    /// `||`
    Or,
    Bang,

    Comma,
    Semicolon,
    Colon,
    /// `->`
    Arrow,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Let,
    Fn,
    If,
    Else,
    Return,
    True,
    False,
    While,
    For,
    Break,
    Continue,

    IntType,
    FloatType,
    StringType,
    BoolType,
}

impl TokenKind {
    /// The name used to refer to this kind in diagnostics.
    pub fn name(self) -> &'static str {
        use TokenKind::*;
        match self {
            Illegal => "ILLEGAL",
            Eof => "EOF",
            Ident => "IDENT",
            Int => "INT",
            Float => "FLOAT",
            String => "STRING",
            Assign => "=",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            Eq => "==",
            NotEq => "!=",
            Lt => "<",
            Gt => ">",
            LtEq => "<=",
            GtEq => ">=",
            And => "&&",
            Or => "||",
            Bang => "!",
            Comma => ",",
            Semicolon => ";",
            Colon => ":",
            Arrow => "->",
            LParen => "(",
            RParen => ")",
            LBrace => "{",
            RBrace => "}",
            LBracket => "[",
            RBracket => "]",
            Let => "LET",
            Fn => "FN",
            If => "IF",
            Else => "ELSE",
            Return => "RETURN",
            True => "TRUE",
            False => "FALSE",
            While => "WHILE",
            For => "FOR",
            Break => "BREAK",
            Continue => "CONTINUE",
            IntType => "INT_TYPE",
            FloatType => "FLOAT_TYPE",
            StringType => "STRING_TYPE",
            BoolType => "BOOL_TYPE",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "let" => TokenKind::Let,
    "fn" => TokenKind::Fn,
    "if" => TokenKind::If,
    "else" => TokenKind::Else,
    "return" => TokenKind::Return,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
    "while" => TokenKind::While,
    "for" => TokenKind::For,
    "break" => TokenKind::Break,
    "continue" => TokenKind::Continue,
    "int" => TokenKind::IntType,
    "float" => TokenKind::FloatType,
    "string" => TokenKind::StringType,
    "bool" => TokenKind::BoolType,
};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keyword_lookup() {
        assert_eq!(KEYWORDS.get("fn").copied(), Some(TokenKind::Fn));
        assert_eq!(KEYWORDS.get("string").copied(), Some(TokenKind::StringType));
        assert_eq!(KEYWORDS.get("len"), None);
        assert_eq!(KEYWORDS.get("Let"), None);
    }

    #[test]
    fn kind_names() {
        assert_eq!(TokenKind::Ident.to_string(), "IDENT");
        assert_eq!(TokenKind::RParen.to_string(), ")");
        assert_eq!(TokenKind::Fn.to_string(), "FN");
        assert_eq!(TokenKind::Eof.to_string(), "EOF");
    }
}
