//! Indentation-sensitive recursive-descent parser. Statements are parsed
//! line by line; expressions reduce through a shunting-yard pass that
//! leaves `Expr` children in postfix order.

use super::ast::{Node, Rule};
use super::error::ScriptError;
use super::lexer::{Line, Token, TokenKind};
use super::value::BinaryOp;

/// Parse token lines into a statement tree. The root is a `Section`.
/// The first error aborts the whole document; no partial tree escapes.
pub fn parse(lines: &[Line]) -> Result<Node, ScriptError> {
    let mut parser = Parser { lines, pos: 0 };
    parser.parse_section(0)
}

struct Parser<'a> {
    lines: &'a [Line],
    pos: usize,
}

impl Parser<'_> {
    /// The maximal run of lines at exactly `indent`. Stops (without
    /// consuming) at the first shallower line; a deeper line here means a
    /// level was skipped.
    fn parse_section(&mut self, indent: usize) -> Result<Node, ScriptError> {
        let line_no = self.lines.get(self.pos).map_or(1, |l| l.number);
        let mut section = Node::new(Rule::Section, line_no);
        while let Some(line) = self.lines.get(self.pos) {
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(ScriptError::parse("unexpected indentation", line.number));
            }
            section.children.push(self.parse_statement()?);
        }
        Ok(section)
    }

    fn parse_statement(&mut self) -> Result<Node, ScriptError> {
        let line = &self.lines[self.pos];
        let first = &line.tokens[0];
        match first.kind {
            TokenKind::Identifier if first.text == "if" => self.parse_if(),
            TokenKind::Identifier if first.text == "else" => Err(ScriptError::parse(
                "'else' without a matching 'if'",
                line.number,
            )),
            TokenKind::Identifier => match line.tokens.get(1).map(|t| t.kind) {
                Some(TokenKind::Equal) => self.parse_assignment(),
                Some(TokenKind::LeftParen) => self.parse_call_statement(),
                _ => Err(ScriptError::parse(
                    format!("expected '=' or '(' after '{}'", first.text),
                    line.number,
                )),
            },
            _ => Err(ScriptError::parse(
                format!("expected a statement, found '{}'", first.text),
                line.number,
            )),
        }
    }

    fn parse_assignment(&mut self) -> Result<Node, ScriptError> {
        let line = &self.lines[self.pos];
        let rest = &line.tokens[2..];
        if rest.is_empty() {
            return Err(ScriptError::parse(
                "expected an expression after '='",
                line.number,
            ));
        }
        let rvalue = parse_expression(rest, line.number)?;
        let mut node = Node::new(Rule::Assignment, line.number);
        node.children.push(Node::with_token(
            Rule::Variable,
            line.tokens[0].clone(),
            line.number,
        ));
        node.children.push(rvalue);
        self.pos += 1;
        Ok(node)
    }

    fn parse_call_statement(&mut self) -> Result<Node, ScriptError> {
        let line = &self.lines[self.pos];
        let (node, used) = parse_call(&line.tokens, 0, line.number)?;
        if used != line.tokens.len() {
            return Err(ScriptError::parse(
                format!("unexpected token '{}' after command call", line.tokens[used].text),
                line.number,
            ));
        }
        self.pos += 1;
        Ok(node)
    }

    fn parse_if(&mut self) -> Result<Node, ScriptError> {
        let (line_no, indent, condition_tokens) = {
            let line = &self.lines[self.pos];
            match line.tokens.last() {
                Some(tok) if tok.kind == TokenKind::Colon => {}
                _ => {
                    return Err(ScriptError::parse(
                        "expected ':' at the end of the 'if' line",
                        line.number,
                    ))
                }
            }
            let condition = &line.tokens[1..line.tokens.len() - 1];
            if condition.is_empty() {
                return Err(ScriptError::parse(
                    "expected a condition after 'if'",
                    line.number,
                ));
            }
            (line.number, line.indent, condition.to_vec())
        };

        let condition = parse_expression(&condition_tokens, line_no)?;
        self.pos += 1;

        let then_section = self.parse_section(indent + 1)?;
        if then_section.children.is_empty() {
            return Err(ScriptError::parse(
                "expected an indented block after 'if'",
                line_no,
            ));
        }

        let mut node = Node::new(Rule::IfStatement, line_no);
        node.children.push(condition);
        node.children.push(then_section);

        // An `else:` belongs to this `if` only as a sibling line immediately
        // after the body.
        if let Some(line) = self.lines.get(self.pos) {
            if line.indent == indent
                && line
                    .tokens
                    .first()
                    .is_some_and(|t| t.kind == TokenKind::Identifier && t.text == "else")
            {
                let else_line = line.number;
                if line.tokens.len() != 2 || line.tokens[1].kind != TokenKind::Colon {
                    return Err(ScriptError::parse("expected ':' after 'else'", else_line));
                }
                self.pos += 1;
                let else_section = self.parse_section(indent + 1)?;
                if else_section.children.is_empty() {
                    return Err(ScriptError::parse(
                        "expected an indented block after 'else'",
                        else_line,
                    ));
                }
                node.children.push(else_section);
            }
        }
        Ok(node)
    }
}

// ── Expressions ─────────────────────────────────────────────────

/// Shunting-yard reduction of one token run. Returns the single term
/// directly when there is no operator; otherwise an `Expr` node whose
/// children are the postfix sequence.
fn parse_expression(tokens: &[Token], line: usize) -> Result<Node, ScriptError> {
    let mut output: Vec<Node> = Vec::new();
    let mut operators: Vec<Token> = Vec::new();
    let mut had_operator = false;
    let mut expect_term = true;
    let mut pos = 0;

    while pos < tokens.len() {
        let tok = &tokens[pos];
        match tok.kind {
            TokenKind::Integer | TokenKind::Float | TokenKind::String => {
                if !expect_term {
                    return Err(ScriptError::parse(
                        format!("expected an operator before '{}'", tok.text),
                        line,
                    ));
                }
                output.push(Node::with_token(Rule::ConstValue, tok.clone(), line));
                pos += 1;
                expect_term = false;
            }
            TokenKind::Identifier => {
                if !expect_term {
                    return Err(ScriptError::parse(
                        format!("expected an operator before '{}'", tok.text),
                        line,
                    ));
                }
                if tokens.get(pos + 1).is_some_and(|t| t.kind == TokenKind::LeftParen) {
                    let (call, used) = parse_call(tokens, pos, line)?;
                    output.push(call);
                    pos = used;
                } else {
                    output.push(Node::with_token(Rule::Variable, tok.clone(), line));
                    pos += 1;
                }
                expect_term = false;
            }
            TokenKind::LeftParen => {
                if !expect_term {
                    return Err(ScriptError::parse(
                        "expected an operator before '('",
                        line,
                    ));
                }
                operators.push(tok.clone());
                pos += 1;
            }
            TokenKind::RightParen => {
                if expect_term {
                    return Err(ScriptError::parse("expected an expression before ')'", line));
                }
                loop {
                    match operators.pop() {
                        Some(op) if op.kind == TokenKind::LeftParen => break,
                        Some(op) => output.push(Node::with_token(Rule::Operator, op, line)),
                        None => return Err(ScriptError::parse("unmatched ')'", line)),
                    }
                }
                pos += 1;
            }
            _ => {
                let Some(op) = BinaryOp::from_token(tok.kind) else {
                    return Err(ScriptError::parse(
                        format!("unexpected token '{}' in expression", tok.text),
                        line,
                    ));
                };
                if expect_term {
                    return Err(ScriptError::parse(
                        format!("expected a value before '{}'", tok.text),
                        line,
                    ));
                }
                // Left-associative: pop everything of equal or higher
                // precedence first.
                loop {
                    let Some(top) = operators.last() else { break };
                    let Some(top_op) = BinaryOp::from_token(top.kind) else {
                        break;
                    };
                    if top_op.precedence() < op.precedence() {
                        break;
                    }
                    if let Some(popped) = operators.pop() {
                        output.push(Node::with_token(Rule::Operator, popped, line));
                    }
                }
                operators.push(tok.clone());
                had_operator = true;
                pos += 1;
                expect_term = true;
            }
        }
    }

    if expect_term {
        return Err(ScriptError::parse("expected an expression", line));
    }
    while let Some(op) = operators.pop() {
        if op.kind == TokenKind::LeftParen {
            return Err(ScriptError::parse("missing closing parenthesis", line));
        }
        output.push(Node::with_token(Rule::Operator, op, line));
    }

    if output.len() == 1 && !had_operator {
        return Ok(output.remove(0));
    }
    let mut node = Node::new(Rule::Expr, line);
    node.children = output;
    Ok(node)
}

/// Parse a command call starting at `tokens[start]` (the name). Returns the
/// `Function` node and the index just past the closing parenthesis.
fn parse_call(tokens: &[Token], start: usize, line: usize) -> Result<(Node, usize), ScriptError> {
    let name = tokens[start].clone();
    let mut depth = 0usize;
    let mut end = None;
    for (i, tok) in tokens.iter().enumerate().skip(start + 1) {
        match tok.kind {
            TokenKind::LeftParen => depth += 1,
            TokenKind::RightParen => {
                depth -= 1;
                if depth == 0 {
                    end = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    let Some(end) = end else {
        return Err(ScriptError::parse(
            format!("missing ')' in call to '{}'", name.text),
            line,
        ));
    };

    let mut node = Node::with_token(Rule::Function, name, line);
    let inner = &tokens[start + 2..end];
    if !inner.is_empty() {
        for argument in split_arguments(inner) {
            if argument.is_empty() {
                return Err(ScriptError::parse("expected an expression between ','", line));
            }
            node.children.push(parse_expression(argument, line)?);
        }
    }
    Ok((node, end + 1))
}

/// Split an argument token run at top-level commas.
fn split_arguments(tokens: &[Token]) -> Vec<&[Token]> {
    let mut arguments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, tok) in tokens.iter().enumerate() {
        match tok.kind {
            TokenKind::LeftParen => depth += 1,
            TokenKind::RightParen => depth = depth.saturating_sub(1),
            TokenKind::Comma if depth == 0 => {
                arguments.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    arguments.push(&tokens[start..]);
    arguments
}
