// program    ::= statement*
// statement  ::= "let" IDENT "=" expr [";"]
//              | "return" expr [";"]
//              | "while" "(" expr ")" block
//              | "for" "(" [statement] ";" [expr] ";" [expr] ")" block
//              | "break" [";"] | "continue" [";"]
//              | expr [";"]
// block      ::= "{" statement* "}"
// expr       ::= IDENT | INT | FLOAT | STRING | "true" | "false"
//              | ("-" | "!" | "+") expr
//              | expr OP expr
//              | "(" expr ")"
//              | "if" "(" expr ")" block ["else" block]
//              | "fn" "(" [IDENT ("," IDENT)*] ")" block
//              | expr "(" [expr ("," expr)*] ")"
//              | "[" [expr ("," expr)*] "]"
//              | "{" [expr ":" expr ("," expr ":" expr)*] "}"
//              | expr "[" expr "]"

// Precedence (loosest first)
//
// ||
// &&
// == !=
// < > <= >=
// + -
// * / %
// - ! + (prefix)
// call
// index

use std::{fmt, rc::Rc};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn token_literal(&self) -> String {
        self.statements
            .first()
            .map(Statement::token_literal)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Let {
        name: Identifier,
        value: Option<Expression>,
    },
    Return(Option<Expression>),
    Expression(Option<Expression>),
    Block(BlockStatement),
    While {
        condition: Expression,
        body: BlockStatement,
    },
    For {
        init: Option<Box<Statement>>,
        condition: Option<Expression>,
        update: Option<Expression>,
        body: BlockStatement,
    },
    Break,
    Continue,
}

impl Statement {
    pub fn token_literal(&self) -> String {
        match self {
            Statement::Let { .. } => "let".into(),
            Statement::Return(_) => "return".into(),
            Statement::Expression(expr) => {
                expr.as_ref().map(Expression::token_literal).unwrap_or_default()
            }
            Statement::Block(_) => "{".into(),
            Statement::While { .. } => "while".into(),
            Statement::For { .. } => "for".into(),
            Statement::Break => "break".into(),
            Statement::Continue => "continue".into(),
        }
    }

    /// A short name of the statement variant, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Statement::Let { .. } => "LetStatement",
            Statement::Return(_) => "ReturnStatement",
            Statement::Expression(_) => "ExpressionStatement",
            Statement::Block(_) => "BlockStatement",
            Statement::While { .. } => "WhileStatement",
            Statement::For { .. } => "ForStatement",
            Statement::Break => "BreakStatement",
            Statement::Continue => "ContinueStatement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockStatement {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub name: String,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Identifier {
        Identifier { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Identifier(Identifier),
    Integer(i64),
    /// The literal is kept so that rendering reproduces the source.
    Float { value: f64, literal: String },
    String(String),
    Boolean(bool),
    Prefix {
        op: PrefixOperator,
        right: Box<Expression>,
    },
    Infix {
        left: Box<Expression>,
        op: InfixOperator,
        right: Box<Expression>,
    },
    If {
        condition: Box<Expression>,
        consequence: BlockStatement,
        alternative: Option<BlockStatement>,
    },
    Function(FunctionLiteral),
    Call {
        function: Box<Expression>,
        arguments: Vec<Expression>,
    },
    Array(Vec<Expression>),
    Hash(Vec<(Expression, Expression)>),
    Index {
        left: Box<Expression>,
        index: Box<Expression>,
    },
}

impl Expression {
    pub fn token_literal(&self) -> String {
        match self {
            Expression::Identifier(ident) => ident.name.clone(),
            Expression::Integer(value) => value.to_string(),
            Expression::Float { literal, .. } => literal.clone(),
            Expression::String(value) => value.clone(),
            Expression::Boolean(value) => value.to_string(),
            Expression::Prefix { op, .. } => op.to_string(),
            Expression::Infix { op, .. } => op.to_string(),
            Expression::If { .. } => "if".into(),
            Expression::Function(_) => "fn".into(),
            Expression::Call { .. } => "(".into(),
            Expression::Array(_) | Expression::Index { .. } => "[".into(),
            Expression::Hash(_) => "{".into(),
        }
    }

    /// A short name of the expression variant, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expression::Identifier(_) => "Identifier",
            Expression::Integer(_) => "IntegerLiteral",
            Expression::Float { .. } => "FloatLiteral",
            Expression::String(_) => "StringLiteral",
            Expression::Boolean(_) => "Boolean",
            Expression::Prefix { .. } => "PrefixExpression",
            Expression::Infix { .. } => "InfixExpression",
            Expression::If { .. } => "IfExpression",
            Expression::Function(_) => "FunctionLiteral",
            Expression::Call { .. } => "CallExpression",
            Expression::Array(_) => "ArrayLiteral",
            Expression::Hash(_) => "HashLiteral",
            Expression::Index { .. } => "IndexExpression",
        }
    }
}

/// A function literal.
///
/// Parameters and body are reference counted so that function values created
/// at runtime share them with the tree instead of copying.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLiteral {
    pub params: Rc<[Identifier]>,
    pub body: Rc<BlockStatement>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PrefixOperator {
    /// `-`
    Neg,
    /// `!`
    Not,
    /// `+`
    Plus,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InfixOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
}

impl InfixOperator {
    pub fn is_arithmetic(self) -> bool {
        use InfixOperator::*;
        matches!(self, Add | Sub | Mul | Div | Mod)
    }

    pub fn is_comparison(self) -> bool {
        use InfixOperator::*;
        matches!(self, Lt | Gt | LtEq | GtEq)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, InfixOperator::Eq | InfixOperator::NotEq)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, InfixOperator::And | InfixOperator::Or)
    }
}

impl fmt::Display for PrefixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrefixOperator::Neg => "-",
            PrefixOperator::Not => "!",
            PrefixOperator::Plus => "+",
        })
    }
}

impl fmt::Display for InfixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use InfixOperator::*;
        f.write_str(match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Eq => "==",
            NotEq => "!=",
            Lt => "<",
            Gt => ">",
            LtEq => "<=",
            GtEq => ">=",
            And => "&&",
            Or => "||",
        })
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.statements.iter().try_for_each(|s| write!(f, "{s}"))
    }
}

impl fmt::Display for BlockStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.statements.iter().try_for_each(|s| write!(f, "{s}"))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Writes the node if present, or nothing at all.
struct Opt<'a, T>(&'a Option<T>);

impl<T: fmt::Display> fmt::Display for Opt<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(node) => write!(f, "{node}"),
            None => Ok(()),
        }
    }
}

/// Writes the items separated by `, `.
struct List<'a, T>(&'a [T]);

impl<T: fmt::Display> fmt::Display for List<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Let { name, value } => write!(f, "let {name} = {};", Opt(value)),
            Statement::Return(value) => write!(f, "return {};", Opt(value)),
            Statement::Expression(expr) => write!(f, "{}", Opt(expr)),
            Statement::Block(block) => write!(f, "{block}"),
            Statement::While { condition, body } => write!(f, "while {condition} {body}"),
            Statement::For {
                init,
                condition,
                update,
                body,
            } => write!(
                f,
                "for {}; {}; {} {body}",
                Opt(init),
                Opt(condition),
                Opt(update)
            ),
            Statement::Break => f.write_str("break;"),
            Statement::Continue => f.write_str("continue;"),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(ident) => write!(f, "{ident}"),
            Expression::Integer(value) => write!(f, "{value}"),
            Expression::Float { literal, .. } => f.write_str(literal),
            Expression::String(value) => write!(f, "\"{value}\""),
            Expression::Boolean(value) => write!(f, "{value}"),
            Expression::Prefix { op, right } => write!(f, "({op}{right})"),
            Expression::Infix { left, op, right } => write!(f, "({left} {op} {right})"),
            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if{condition} {consequence}")?;
                if let Some(alternative) = alternative {
                    write!(f, "else {alternative}")?;
                }
                Ok(())
            }
            Expression::Function(func) => write!(f, "{func}"),
            Expression::Call {
                function,
                arguments,
            } => write!(f, "{function}({})", List(arguments)),
            Expression::Array(elements) => write!(f, "[{}]", List(elements)),
            Expression::Hash(pairs) => {
                f.write_str("{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            Expression::Index { left, index } => write!(f, "({left}[{index}])"),
        }
    }
}

impl fmt::Display for FunctionLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn({}) {}", List(&self.params), self.body)
    }
}

/// Renders a float so that it always reads back as a float literal.
#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ident(name: &str) -> Identifier {
        Identifier::new(name)
    }

    fn int(value: i64) -> Expression {
        Expression::Integer(value)
    }

    fn float(value: f64, literal: &str) -> Expression {
        Expression::Float {
            value,
            literal: literal.into(),
        }
    }

    fn expr(e: Expression) -> Statement {
        Statement::Expression(Some(e))
    }

    fn block(statements: Vec<Statement>) -> BlockStatement {
        BlockStatement { statements }
    }

    #[test]
    fn let_and_return_rendering() {
        let program = Program {
            statements: vec![
                Statement::Let {
                    name: ident("myVar"),
                    value: Some(Expression::Identifier(ident("anotherVar"))),
                },
                Statement::Return(Some(int(5))),
            ],
        };
        assert_eq!(program.to_string(), "let myVar = anotherVar;return 5;");
        assert_eq!(program.token_literal(), "let");
    }

    #[test]
    fn missing_subnodes_render_empty() {
        let stmt = Statement::Let {
            name: ident("x"),
            value: None,
        };
        assert_eq!(stmt.to_string(), "let x = ;");
        assert_eq!(Statement::Return(None).to_string(), "return ;");
        assert_eq!(Statement::Expression(None).to_string(), "");
        assert_eq!(Statement::Expression(None).token_literal(), "");
    }

    #[test]
    fn expression_rendering() {
        let cases = [
            (
                Expression::Prefix {
                    op: PrefixOperator::Neg,
                    right: Box::new(int(5)),
                },
                "(-5)",
            ),
            (
                Expression::Infix {
                    left: Box::new(int(1)),
                    op: InfixOperator::Add,
                    right: Box::new(int(2)),
                },
                "(1 + 2)",
            ),
            (
                Expression::If {
                    condition: Box::new(Expression::Boolean(true)),
                    consequence: block(vec![expr(int(1))]),
                    alternative: Some(block(vec![expr(int(2))])),
                },
                "iftrue 1else 2",
            ),
            (
                Expression::If {
                    condition: Box::new(Expression::Boolean(true)),
                    consequence: block(vec![expr(int(1))]),
                    alternative: None,
                },
                "iftrue 1",
            ),
            (
                Expression::Function(FunctionLiteral {
                    params: Rc::from([ident("x"), ident("y")]),
                    body: Rc::new(block(vec![expr(int(42))])),
                }),
                "fn(x, y) 42",
            ),
            (
                Expression::Call {
                    function: Box::new(Expression::Identifier(ident("add"))),
                    arguments: vec![int(1), int(2)],
                },
                "add(1, 2)",
            ),
            (Expression::String("hello".into()), "\"hello\""),
            (float(2.5, "2.5"), "2.5"),
            (float(3.1, "3.10"), "3.10"),
            (Expression::Array(vec![int(1), int(2)]), "[1, 2]"),
            (
                Expression::Hash(vec![(Expression::String("a".into()), int(1))]),
                "{\"a\": 1}",
            ),
            (
                Expression::Index {
                    left: Box::new(Expression::Identifier(ident("arr"))),
                    index: Box::new(int(0)),
                },
                "(arr[0])",
            ),
        ];
        for (node, expected) in cases {
            assert_eq!(node.to_string(), expected);
        }
    }

    #[test]
    fn loop_rendering() {
        let while_stmt = Statement::While {
            condition: Expression::Boolean(true),
            body: block(vec![expr(int(1))]),
        };
        assert_eq!(while_stmt.to_string(), "while true 1");
        assert_eq!(while_stmt.token_literal(), "while");

        let for_stmt = Statement::For {
            init: Some(Box::new(Statement::Let {
                name: ident("i"),
                value: Some(int(0)),
            })),
            condition: Some(Expression::Infix {
                left: Box::new(Expression::Identifier(ident("i"))),
                op: InfixOperator::Lt,
                right: Box::new(int(10)),
            }),
            update: Some(Expression::Infix {
                left: Box::new(Expression::Identifier(ident("i"))),
                op: InfixOperator::Add,
                right: Box::new(int(1)),
            }),
            body: block(vec![expr(int(42))]),
        };
        assert_eq!(for_stmt.to_string(), "for let i = 0;; (i < 10); (i + 1) 42");
        assert_eq!(for_stmt.token_literal(), "for");

        let bare_for = Statement::For {
            init: None,
            condition: Some(Expression::Boolean(true)),
            update: None,
            body: block(vec![]),
        };
        assert_eq!(bare_for.to_string(), "for ; true;  ");

        assert_eq!(Statement::Break.to_string(), "break;");
        assert_eq!(Statement::Continue.to_string(), "continue;");
        assert_eq!(Statement::Break.token_literal(), "break");
        assert_eq!(Statement::Continue.token_literal(), "continue");
    }

    #[test]
    fn token_literals() {
        assert_eq!(expr(int(5)).token_literal(), "5");
        assert_eq!(
            Statement::Return(Some(int(5))).token_literal(),
            "return"
        );
        assert_eq!(
            Expression::Identifier(ident("foo")).token_literal(),
            "foo"
        );
    }
}
