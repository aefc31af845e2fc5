//! Statement tree produced by the parser.

use std::fmt::Write;

use super::lexer::Token;

/// Grammar rule a node was produced by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// A run of statements at one indent level.
    Section,
    /// `if` condition + then-section + optional else-section.
    IfStatement,
    /// lvalue Variable + rvalue node.
    Assignment,
    /// A variable read (or assignment target); the token is the name.
    Variable,
    /// A literal; the token is the lexeme (strings keep their quotes).
    ConstValue,
    /// A command call; the token is the name, children are the arguments.
    Function,
    /// A binary operator inside an `Expr`; the token is the operator.
    Operator,
    /// An operator expression. Children are stored in postfix order.
    Expr,
}

/// One node of the parsed tree. The parent owns its children exclusively;
/// there is no sharing between subtrees.
///
/// A sub-expression with a single term and no operator is never wrapped in
/// an `Expr` node — the term is promoted directly, which is how a bare
/// variable or call statement is told apart from a true expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub rule: Rule,
    pub children: Vec<Node>,
    pub token: Option<Token>,
    /// 1-based source line, for error reporting.
    pub line: usize,
}

impl Node {
    pub fn new(rule: Rule, line: usize) -> Self {
        Self {
            rule,
            children: Vec::new(),
            token: None,
            line,
        }
    }

    pub fn with_token(rule: Rule, token: Token, line: usize) -> Self {
        Self {
            rule,
            children: Vec::new(),
            token: Some(token),
            line,
        }
    }

    /// Text of the attached token, or `""` for nodes without one.
    pub fn token_text(&self) -> &str {
        self.token.as_ref().map_or("", |t| t.text.as_str())
    }

    /// Render the tree as an indented debug listing.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, depth: usize) {
        for _ in 0..depth {
            out.push_str("  ");
        }
        let _ = write!(out, "{:?}", self.rule);
        if let Some(token) = &self.token {
            let _ = write!(out, " {}", token.text);
        }
        out.push('\n');
        for child in &self.children {
            child.dump_into(out, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::lexer::{Token, TokenKind};

    #[test]
    fn dump_renders_nested_tree() {
        let mut root = Node::new(Rule::Section, 1);
        let mut assign = Node::new(Rule::Assignment, 1);
        assign.children.push(Node::with_token(
            Rule::Variable,
            Token {
                kind: TokenKind::Identifier,
                text: "x".into(),
            },
            1,
        ));
        assign.children.push(Node::with_token(
            Rule::ConstValue,
            Token {
                kind: TokenKind::Integer,
                text: "1".into(),
            },
            1,
        ));
        root.children.push(assign);

        assert_eq!(
            root.dump(),
            "Section\n  Assignment\n    Variable x\n    ConstValue 1\n"
        );
    }
}
