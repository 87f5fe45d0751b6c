/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The evaluator walks an AST, producing runtime objects.
pub mod evaluator;

/// The control-flow analyzer checks that every `break` and `continue` has an
/// enclosing loop.
pub mod control_flow;

/// The type checker infers the types of a program, reporting inconsistencies.
/// It is informational only.
pub mod type_checker;

/// The code generator lowers an AST to x86_64 assembly.
pub mod codegen;

pub mod ast;
pub mod builtins;
pub mod environment;
pub mod object;
pub mod token;
pub mod types;

pub mod util {
    #[cfg(test)]
    pub(crate) mod test_utils;
}
