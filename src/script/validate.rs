//! Static type-propagation pass over a parsed tree. Mirrors the
//! interpreter's evaluation shape on `ParameterType`s instead of values;
//! runs to completion (or first error) before anything executes, so a
//! program that fails here produces zero side effects.

use std::collections::HashMap;

use super::ast::{Node, Rule};
use super::error::ScriptError;
use super::lexer::TokenKind;
use super::registry::CommandRegistry;
use super::value::{binary_result_type, BasicType, BinaryOp, ParameterType};

/// Type check `root` against the command registry. `initial` seeds the type
/// table from the interpreter's live variable table, so state surviving a
/// previous run validates on the next one.
pub fn validate(
    root: &Node,
    registry: &CommandRegistry,
    initial: HashMap<String, ParameterType>,
) -> Result<(), ScriptError> {
    let mut validator = Validator {
        registry,
        types: initial,
    };
    validator.check_section(root)
}

struct Validator<'a> {
    registry: &'a CommandRegistry,
    /// name → type of the latest validated assignment. Rebinding a name to a
    /// different type simply overwrites the entry.
    types: HashMap<String, ParameterType>,
}

impl Validator<'_> {
    fn check_section(&mut self, node: &Node) -> Result<(), ScriptError> {
        for child in &node.children {
            match child.rule {
                Rule::Assignment => self.check_assignment(child)?,
                Rule::IfStatement => self.check_if(child)?,
                Rule::Function => {
                    self.check_call(child)?;
                }
                _ => return Err(ScriptError::validate("malformed statement", child.line)),
            }
        }
        Ok(())
    }

    fn check_assignment(&mut self, node: &Node) -> Result<(), ScriptError> {
        let [lvalue, rvalue] = node.children.as_slice() else {
            return Err(ScriptError::validate("malformed assignment", node.line));
        };
        let inferred = self.infer(rvalue)?;
        self.types.insert(lvalue.token_text().to_string(), inferred);
        Ok(())
    }

    fn check_if(&mut self, node: &Node) -> Result<(), ScriptError> {
        if node.children.len() < 2 || node.children.len() > 3 {
            return Err(ScriptError::validate("malformed if statement", node.line));
        }
        self.infer(&node.children[0])?;
        self.check_section(&node.children[1])?;
        if let Some(else_section) = node.children.get(2) {
            self.check_section(else_section)?;
        }
        Ok(())
    }

    fn infer(&mut self, node: &Node) -> Result<ParameterType, ScriptError> {
        match node.rule {
            Rule::ConstValue => constant_type(node),
            Rule::Variable => {
                let name = node.token_text();
                self.types.get(name).cloned().ok_or_else(|| {
                    ScriptError::validate(format!("unknown variable '{name}'"), node.line)
                })
            }
            Rule::Function => self.check_call(node),
            Rule::Expr => self.check_expr(node),
            _ => Err(ScriptError::validate(
                "unable to validate expression",
                node.line,
            )),
        }
    }

    /// Replay the postfix children on a type stack.
    fn check_expr(&mut self, node: &Node) -> Result<ParameterType, ScriptError> {
        let mut stack: Vec<ParameterType> = Vec::new();
        for child in &node.children {
            if child.rule == Rule::Operator {
                let op = child
                    .token
                    .as_ref()
                    .and_then(|t| BinaryOp::from_token(t.kind))
                    .ok_or_else(|| {
                        ScriptError::validate("unable to validate expression", child.line)
                    })?;
                let (Some(right), Some(left)) = (stack.pop(), stack.pop()) else {
                    return Err(ScriptError::validate(
                        "unable to validate expression",
                        node.line,
                    ));
                };
                let result = binary_result_type(op, &left, &right).ok_or_else(|| {
                    ScriptError::validate(
                        format!(
                            "operator '{}' cannot be applied to {left} and {right}",
                            op.symbol()
                        ),
                        child.line,
                    )
                })?;
                stack.push(result);
            } else {
                let ty = self.infer(child)?;
                stack.push(ty);
            }
        }
        let result = stack.pop();
        match result {
            Some(ty) if stack.is_empty() => Ok(ty),
            _ => Err(ScriptError::validate(
                "unable to validate expression",
                node.line,
            )),
        }
    }

    fn check_call(&mut self, node: &Node) -> Result<ParameterType, ScriptError> {
        let name = node.token_text().to_string();
        let registry = self.registry;
        let Some(command) = registry.get(&name) else {
            return Err(ScriptError::validate(
                format!("unknown command '{name}'"),
                node.line,
            ));
        };
        if node.children.len() > command.signature.len() {
            return Err(ScriptError::validate(
                format!(
                    "command '{name}' takes at most {} argument(s), found {}",
                    command.signature.len(),
                    node.children.len()
                ),
                node.line,
            ));
        }
        for (index, alternatives) in command.signature.iter().enumerate() {
            match node.children.get(index) {
                Some(argument) => {
                    let actual = self.infer(argument)?;
                    if !alternatives.iter().any(|t| t.accepts(&actual)) {
                        return Err(ScriptError::validate(
                            format!(
                                "command '{name}' expected {} at position {}, found {actual}",
                                command.expected_at(index),
                                index + 1
                            ),
                            node.line,
                        ));
                    }
                }
                None => {
                    // A position with an Empty alternative (and everything
                    // after it) may be left off.
                    if alternatives.iter().any(|t| t.basic == BasicType::Empty) {
                        break;
                    }
                    return Err(ScriptError::validate(
                        format!(
                            "command '{name}' is missing argument {} ({})",
                            index + 1,
                            command.expected_at(index)
                        ),
                        node.line,
                    ));
                }
            }
        }
        Ok(command.return_type.clone())
    }
}

fn constant_type(node: &Node) -> Result<ParameterType, ScriptError> {
    let Some(token) = &node.token else {
        return Err(ScriptError::validate("malformed constant", node.line));
    };
    match token.kind {
        TokenKind::Integer => Ok(ParameterType::of(BasicType::Int)),
        TokenKind::Float => Ok(ParameterType::of(BasicType::Float)),
        TokenKind::String => {
            // The lexeme must at least hold its two quote characters.
            if token.text.len() < 2 {
                Err(ScriptError::validate("malformed string constant", node.line))
            } else {
                Ok(ParameterType::of(BasicType::String))
            }
        }
        _ => Err(ScriptError::validate("malformed constant", node.line)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::script::lexer::tokenize;
    use crate::script::parser::parse;
    use crate::script::value::{Parameter, Value};

    /// Registry with a few signatures shaped like the host vocabulary.
    fn test_registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry.register(
            "select",
            Vec::new(),
            ParameterType::of(BasicType::Rect),
            Box::new(|_p, _o| Ok(Parameter::owned(Value::Empty))),
        );
        registry.register(
            "capture",
            vec![vec![ParameterType::of(BasicType::Rect), ParameterType::EMPTY]],
            ParameterType::object("image"),
            Box::new(|_p, _o| Ok(Parameter::owned(Value::Empty))),
        );
        registry.register(
            "display",
            vec![vec![ParameterType::object("image")]],
            ParameterType::EMPTY,
            Box::new(|_p, _o| Ok(Parameter::owned(Value::Empty))),
        );
        registry.register(
            "wait",
            vec![vec![
                ParameterType::of(BasicType::Int),
                ParameterType::of(BasicType::Float),
            ]],
            ParameterType::EMPTY,
            Box::new(|_p, _o| Ok(Parameter::owned(Value::Empty))),
        );
        registry
    }

    fn check(src: &str) -> Result<(), ScriptError> {
        let lines = tokenize(src).unwrap();
        let root = parse(&lines).unwrap();
        validate(&root, &test_registry(), HashMap::new())
    }

    fn check_err(src: &str) -> ScriptError {
        check(src).unwrap_err()
    }

    #[test]
    fn mixed_numeric_assignment_validates() {
        assert!(check("x = 1 + 2.5").is_ok());
    }

    #[test]
    fn int_plus_string_rejected_with_operator_in_message() {
        let e = check_err("x = 1 + \"x\"");
        assert!(e.message.contains('+'));
        assert!(e.message.contains("Int"));
        assert!(e.message.contains("String"));
    }

    #[test]
    fn unknown_variable_rejected() {
        let e = check_err("x = y + 1");
        assert!(e.message.contains("unknown variable 'y'"));
    }

    #[test]
    fn unknown_command_rejected() {
        let e = check_err("teleport(1)");
        assert!(e.message.contains("unknown command 'teleport'"));
    }

    #[test]
    fn rebinding_changes_the_tracked_type() {
        // x is a String first, an Int later; each use sees the latest type.
        assert!(check("x = \"a\"\ny = x + \"b\"\nx = 1\nz = x + 2").is_ok());
        let e = check_err("x = \"a\"\nx = 1\ny = x + \"b\"");
        assert!(e.message.contains('+'));
    }

    #[test]
    fn trailing_optional_argument_may_be_omitted() {
        assert!(check("img = capture()").is_ok());
        assert!(check("img = capture(select())").is_ok());
    }

    #[test]
    fn missing_required_argument_rejected() {
        let e = check_err("display()");
        assert!(e.message.contains("missing argument 1"));
        assert!(e.message.contains("Object(image)"));
    }

    #[test]
    fn extra_argument_rejected() {
        let e = check_err("wait(1, 2)");
        assert!(e.message.contains("at most 1 argument(s)"));
    }

    #[test]
    fn wrong_argument_type_lists_alternatives() {
        let e = check_err("wait(\"soon\")");
        assert!(e.message.contains("{Int, Float}"));
        assert!(e.message.contains("position 1"));
        assert!(e.message.contains("String"));
    }

    #[test]
    fn object_type_ids_must_match() {
        // capture() yields Object(image); wait() output is Empty.
        let e = check_err("display(wait(1))");
        assert!(e.message.contains("position 1"));
    }

    #[test]
    fn command_result_feeds_expressions() {
        assert!(check("r = select()\nsame = r == select()").is_ok());
    }

    #[test]
    fn if_condition_and_branches_validated() {
        let e = check_err("if 1 == 1:\n    y = missing + 1");
        assert!(e.message.contains("unknown variable 'missing'"));
        let e = check_err("if 1 == 1:\n    y = 1\nelse:\n    teleport(0)");
        assert!(e.message.contains("unknown command"));
    }

    #[test]
    fn validation_is_idempotent() {
        let src = "x = 1 + \"x\"";
        let first = check_err(src);
        let second = check_err(src);
        assert_eq!(first, second);
    }

    #[test]
    fn seeded_types_from_a_previous_run() {
        let lines = tokenize("y = x + 1").unwrap();
        let root = parse(&lines).unwrap();
        let mut initial = HashMap::new();
        initial.insert("x".to_string(), ParameterType::of(BasicType::Int));
        assert!(validate(&root, &test_registry(), initial).is_ok());
        // Without the seed the same script is rejected.
        assert!(validate(&root, &test_registry(), HashMap::new()).is_err());
    }
}
