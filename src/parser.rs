use std::rc::Rc;

use crate::{
    ast::{
        BlockStatement, Expression, FunctionLiteral, Identifier, InfixOperator, PrefixOperator,
        Program, Statement,
    },
    lexer::Lexer,
    token::{Pos, Token, TokenKind},
};

type Result<T, E = ()> = std::result::Result<T, E>;

pub type ParseResult<T> = Result<T, (T, Vec<Error>)>;

/// Lexes and parses the provided source.
///
/// On failure, the returned program holds every statement that could be
/// parsed, along with the recorded errors.
pub fn parse_program(src: &str) -> ParseResult<Program> {
    let mut p = Parser::new(Lexer::new(src));
    let program = p.parse_program();
    if p.errors.is_empty() {
        Ok(program)
    } else {
        Err((program, p.errors))
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    errors: Vec<Error>,
}

/// Binding powers, from the loosest to the tightest.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    LogicalOr,
    LogicalAnd,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
    Index,
}

impl Parser {
    pub fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();
        while !self.is(TokenKind::Eof) {
            let start = self.cursor;
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                // Always make progress after a failed construct.
                Err(()) if self.cursor == start => {
                    self.advance();
                }
                Err(()) => {}
            }
        }
        tracing::debug!(
            statements = statements.len(),
            errors = self.errors.len(),
            "parsed program"
        );
        Program { statements }
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        let stmt = self.parse_statement_inner()?;
        self.take(TokenKind::Semicolon);
        Ok(stmt)
    }

    /// Parses a statement without its optional trailing semicolon.
    fn parse_statement_inner(&mut self) -> Result<Statement> {
        match self.peek().kind {
            TokenKind::Let => self.parse_let(),
            TokenKind::Return => {
                self.advance();
                let value = self.parse_expr()?;
                Ok(Statement::Return(Some(value)))
            }
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Break => {
                self.advance();
                Ok(Statement::Break)
            }
            TokenKind::Continue => {
                self.advance();
                Ok(Statement::Continue)
            }
            _ => {
                let expr = self.parse_expr()?;
                Ok(Statement::Expression(Some(expr)))
            }
        }
    }

    fn parse_let(&mut self) -> Result<Statement> {
        self.consume(TokenKind::Let)?;
        let name = self.parse_ident()?;
        self.consume(TokenKind::Assign)?;
        let value = self.parse_expr()?;
        Ok(Statement::Let {
            name,
            value: Some(value),
        })
    }

    // while ( cond ) { body }
    fn parse_while(&mut self) -> Result<Statement> {
        self.consume(TokenKind::While)?;
        self.consume(TokenKind::LParen)?;
        let condition = self.parse_expr()?;
        self.consume(TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(Statement::While { condition, body })
    }

    // for ( [init] ; [cond] ; [update] ) { body }
    fn parse_for(&mut self) -> Result<Statement> {
        self.consume(TokenKind::For)?;
        self.consume(TokenKind::LParen)?;

        let init = if self.is(TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_statement_inner()?))
        };
        self.consume(TokenKind::Semicolon)?;

        let condition = if self.is(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.consume(TokenKind::Semicolon)?;

        let update = if self.is(TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.consume(TokenKind::RParen)?;

        let body = self.parse_block()?;
        Ok(Statement::For {
            init,
            condition,
            update,
            body,
        })
    }

    // { statement* }
    fn parse_block(&mut self) -> Result<BlockStatement> {
        self.consume(TokenKind::LBrace)?;
        let mut statements = Vec::new();
        while !self.is(TokenKind::RBrace) && !self.is(TokenKind::Eof) {
            let start = self.cursor;
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(()) if self.cursor == start => {
                    self.advance();
                }
                Err(()) => {}
            }
        }
        self.consume(TokenKind::RBrace)?;
        Ok(BlockStatement { statements })
    }

    fn parse_ident(&mut self) -> Result<Identifier> {
        let token = self.consume(TokenKind::Ident)?;
        Ok(Identifier::new(token.literal))
    }

    fn parse_expr(&mut self) -> Result<Expression> {
        self.parse_expr_bp(Precedence::Lowest)
    }

    fn parse_expr_bp(&mut self, min_bp: Precedence) -> Result<Expression> {
        let lhs_token = self.advance();
        let mut lhs = self.parse_nud(lhs_token)?;

        loop {
            let op_kind = self.peek().kind;

            if let Some(bp) = Self::infix_binding_power(op_kind) {
                if bp <= min_bp {
                    // Operator binds less tightly than the minimum required
                    break;
                }

                let op_token = self.advance();
                lhs = self.parse_led(op_token, lhs, bp)?;
            } else {
                // Not an infix operator (this includes `;`)
                break;
            }
        }

        Ok(lhs)
    }

    /// nud: Parses tokens that start an expression
    /// (prefix operators, literals, grouping)
    fn parse_nud(&mut self, token: Token) -> Result<Expression> {
        let expr = match token.kind {
            TokenKind::Ident => Expression::Identifier(Identifier::new(token.literal)),
            TokenKind::Int => {
                let Ok(parsed) = token.literal.parse::<i64>() else {
                    let pos = token.pos();
                    self.error(Error::ParseInt {
                        literal: token.literal,
                        pos,
                    });
                    return Err(());
                };
                Expression::Integer(parsed)
            }
            TokenKind::Float => {
                let Ok(parsed) = token.literal.parse::<f64>() else {
                    let pos = token.pos();
                    self.error(Error::ParseFloat {
                        literal: token.literal,
                        pos,
                    });
                    return Err(());
                };
                Expression::Float {
                    value: parsed,
                    literal: token.literal,
                }
            }
            TokenKind::String => Expression::String(token.literal),
            TokenKind::True => Expression::Boolean(true),
            TokenKind::False => Expression::Boolean(false),

            // Prefix operators: -, !, +
            kind @ (TokenKind::Minus | TokenKind::Bang | TokenKind::Plus) => {
                let op = match kind {
                    TokenKind::Minus => PrefixOperator::Neg,
                    TokenKind::Bang => PrefixOperator::Not,
                    TokenKind::Plus => PrefixOperator::Plus,
                    _ => unreachable!(),
                };
                let right = self.parse_expr_bp(Precedence::Prefix)?;
                Expression::Prefix {
                    op,
                    right: Box::new(right),
                }
            }

            // Grouping: ( expr )
            TokenKind::LParen => {
                let expr = self.parse_expr()?;
                self.consume(TokenKind::RParen)?;
                expr
            }

            // Conditional: if ( expr ) block [else block]
            TokenKind::If => {
                self.consume(TokenKind::LParen)?;
                let condition = self.parse_expr()?;
                self.consume(TokenKind::RParen)?;
                let consequence = self.parse_block()?;
                let alternative = if self.take(TokenKind::Else) {
                    Some(self.parse_block()?)
                } else {
                    None
                };
                Expression::If {
                    condition: Box::new(condition),
                    consequence,
                    alternative,
                }
            }

            // Function literal: fn ( [ident [, ident]*] ) block
            TokenKind::Fn => {
                self.consume(TokenKind::LParen)?;
                let params = self.parse_list(TokenKind::RParen, Parser::parse_ident)?;
                let body = self.parse_block()?;
                Expression::Function(FunctionLiteral {
                    params: Rc::from(params),
                    body: Rc::new(body),
                })
            }

            // Array: [ [expr [, expr]*] ]
            TokenKind::LBracket => {
                let elements = self.parse_list(TokenKind::RBracket, Parser::parse_expr)?;
                Expression::Array(elements)
            }

            // Hash: { [expr : expr [, expr : expr]*] }
            TokenKind::LBrace => {
                let pairs = self.parse_list(TokenKind::RBrace, |p| {
                    let key = p.parse_expr()?;
                    p.consume(TokenKind::Colon)?;
                    let value = p.parse_expr()?;
                    Ok((key, value))
                })?;
                Expression::Hash(pairs)
            }

            other => {
                self.error(Error::NoPrefixParseFn {
                    kind: other,
                    pos: token.pos(),
                });
                return Err(());
            }
        };

        Ok(expr)
    }

    /// led: Parses tokens that follow a left-hand-side expression
    /// (infix/postfix operators)
    fn parse_led(&mut self, op_token: Token, lhs: Expression, bp: Precedence) -> Result<Expression> {
        let expr = match op_token.kind {
            // Call: expr ( [expr [, expr]*] )
            TokenKind::LParen => {
                let arguments = self.parse_list(TokenKind::RParen, Parser::parse_expr)?;
                Expression::Call {
                    function: Box::new(lhs),
                    arguments,
                }
            }

            // Index: expr [ expr ]
            TokenKind::LBracket => {
                let index = self.parse_expr()?;
                self.consume(TokenKind::RBracket)?;
                Expression::Index {
                    left: Box::new(lhs),
                    index: Box::new(index),
                }
            }

            kind => {
                let op = Self::infix_operator(kind)
                    .expect("token with binding power must be an operator");
                // Parse right operand with correct precedence
                let rhs = self.parse_expr_bp(bp)?;
                Expression::Infix {
                    left: Box::new(lhs),
                    op,
                    right: Box::new(rhs),
                }
            }
        };
        Ok(expr)
    }

    /// Parses `item (, item)*` followed by `end_delim`. The opening delimiter
    /// must have been consumed already. Consumes the end delimiter.
    fn parse_list<T>(
        &mut self,
        end_delim: TokenKind,
        parse_item: impl Fn(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        if self.take(end_delim) {
            return Ok(items);
        }
        loop {
            items.push(parse_item(self)?);
            if !self.take(TokenKind::Comma) {
                break;
            }
        }
        self.consume(end_delim)?;
        Ok(items)
    }

    fn infix_binding_power(kind: TokenKind) -> Option<Precedence> {
        let bp = match kind {
            TokenKind::Or => Precedence::LogicalOr,
            TokenKind::And => Precedence::LogicalAnd,
            TokenKind::Eq | TokenKind::NotEq => Precedence::Equals,
            TokenKind::Lt | TokenKind::Gt | TokenKind::LtEq | TokenKind::GtEq => {
                Precedence::LessGreater
            }
            TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Precedence::Product,
            TokenKind::LParen => Precedence::Call,
            TokenKind::LBracket => Precedence::Index,
            _ => return None,
        };
        Some(bp)
    }

    fn infix_operator(kind: TokenKind) -> Option<InfixOperator> {
        let op = match kind {
            TokenKind::Plus => InfixOperator::Add,
            TokenKind::Minus => InfixOperator::Sub,
            TokenKind::Star => InfixOperator::Mul,
            TokenKind::Slash => InfixOperator::Div,
            TokenKind::Percent => InfixOperator::Mod,
            TokenKind::Eq => InfixOperator::Eq,
            TokenKind::NotEq => InfixOperator::NotEq,
            TokenKind::Lt => InfixOperator::Lt,
            TokenKind::Gt => InfixOperator::Gt,
            TokenKind::LtEq => InfixOperator::LtEq,
            TokenKind::GtEq => InfixOperator::GtEq,
            TokenKind::And => InfixOperator::And,
            TokenKind::Or => InfixOperator::Or,
            _ => return None,
        };
        Some(op)
    }
}

impl Parser {
    pub fn new(lexer: Lexer<'_>) -> Parser {
        Parser {
            tokens: lexer.collect(),
            cursor: 0,
            errors: Vec::with_capacity(8),
        }
    }

    /// Errors recorded so far.
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    fn error(&mut self, error: Error) {
        self.errors.push(error);
    }

    /// Returns the current token.
    ///
    /// The lexer always terminates the stream with an end-of-file token, which
    /// is returned for every position past the end.
    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.cursor.min(last)]
    }

    /// Returns the current token and advances.
    fn advance(&mut self) -> Token {
        let c = self.peek().clone();
        if !c.is_eof() {
            self.cursor += 1;
        }
        c
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the provided one, returning it.
    /// If not, records an error.
    fn consume(&mut self, expect: TokenKind) -> Result<Token> {
        if self.is(expect) {
            Ok(self.advance())
        } else {
            let c = self.peek();
            let error = Error::Unexpected {
                expected: expect,
                actual: c.kind,
                pos: c.pos(),
            };
            self.error(error);
            Err(())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("expected next token to be {expected}, got {actual} instead")]
    Unexpected {
        expected: TokenKind,
        actual: TokenKind,
        pos: Pos,
    },
    #[error("no prefix parse function for {kind} found")]
    NoPrefixParseFn { kind: TokenKind, pos: Pos },
    #[error("could not parse {literal:?} as integer")]
    ParseInt { literal: String, pos: Pos },
    #[error("could not parse {literal:?} as float")]
    ParseFloat { literal: String, pos: Pos },
}

impl Error {
    /// Location of the offending token.
    pub fn pos(&self) -> Pos {
        match self {
            Error::Unexpected { pos, .. }
            | Error::NoPrefixParseFn { pos, .. }
            | Error::ParseInt { pos, .. }
            | Error::ParseFloat { pos, .. } => *pos,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;

    /// Parses the source, failing the test on any parse error.
    #[track_caller]
    pub fn parse_ok(src: &str) -> Program {
        match parse_program(src) {
            Ok(program) => program,
            Err((_, errors)) => {
                let errors: Vec<_> = errors.iter().map(ToString::to_string).collect();
                panic!("failed to parse {src:?}: {errors:#?}")
            }
        }
    }
}
