//! Tree-walking interpreter. Owns the command registry and the variable
//! table; executes a validated statement tree with an explicit operand
//! stack for postfix expressions.
//!
//! One instance is single-writer-at-a-time: the variable table is mutated
//! without synchronization, so concurrent `run` calls on the same instance
//! are not supported. Separate instances share nothing.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::ast::{Node, Rule};
use super::error::ScriptError;
use super::lexer::{tokenize, TokenKind};
use super::parser::parse;
use super::registry::{CommandRegistry, OutputFn, OutputStyle};
use super::validate::validate;
use super::value::{apply_binary, BinaryOp, Parameter, ParameterType, Value};

pub struct Interpreter {
    registry: CommandRegistry,
    /// Variable storage. Shared cells back the zero-copy reference
    /// parameters handed to expressions and command callbacks; rebinding a
    /// name replaces the cell contents in place (last write wins).
    variables: HashMap<String, Rc<RefCell<Value>>>,
    output: OutputFn,
}

impl Interpreter {
    /// A fresh engine with an empty variable table and no commands. The
    /// host wires its vocabulary through [`Interpreter::registry_mut`].
    pub fn new(output: OutputFn) -> Self {
        Self {
            registry: CommandRegistry::new(),
            variables: HashMap::new(),
            output,
        }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CommandRegistry {
        &mut self.registry
    }

    /// Current value of a variable, as an owned copy. For host-side
    /// inspection and tests.
    pub fn variable(&self, name: &str) -> Option<Value> {
        self.variables.get(name).map(|cell| cell.borrow().clone())
    }

    /// Lex, parse and validate without executing.
    pub fn check(&self, source: &str) -> Result<(), ScriptError> {
        let lines = tokenize(source)?;
        let root = parse(&lines)?;
        validate(&root, &self.registry, self.known_types())
    }

    /// Run a script: lex → parse → validate → execute, stopping at the
    /// first failing stage. Variables persist across calls; errors are also
    /// reported through the output channel.
    pub fn run(&mut self, source: &str) -> Result<(), ScriptError> {
        match self.run_pipeline(source) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }

    fn run_pipeline(&mut self, source: &str) -> Result<(), ScriptError> {
        let lines = tokenize(source)?;
        let root = parse(&lines)?;
        validate(&root, &self.registry, self.known_types())?;
        self.execute_section(&root)
    }

    fn known_types(&self) -> HashMap<String, ParameterType> {
        self.variables
            .iter()
            .map(|(name, cell)| (name.clone(), cell.borrow().param_type()))
            .collect()
    }

    fn report(&self, error: &ScriptError) {
        let message = Parameter::owned(Value::String(error.to_string()));
        (self.output)(&message, OutputStyle::Error);
    }

    // ── Execution ───────────────────────────────────────────────

    fn execute_section(&mut self, node: &Node) -> Result<(), ScriptError> {
        for child in &node.children {
            match child.rule {
                Rule::Assignment => self.execute_assignment(child)?,
                Rule::IfStatement => self.execute_if(child)?,
                Rule::Function => {
                    self.call_command(child)?;
                }
                _ => return Err(ScriptError::runtime("malformed statement", child.line)),
            }
        }
        Ok(())
    }

    fn execute_assignment(&mut self, node: &Node) -> Result<(), ScriptError> {
        let [lvalue, rvalue] = node.children.as_slice() else {
            return Err(ScriptError::runtime("malformed assignment", node.line));
        };
        // Assignment always materializes a fresh owned value, even when the
        // rvalue is a plain variable read.
        let value = self.eval(rvalue)?.materialize();
        let name = lvalue.token_text();
        if let Some(cell) = self.variables.get(name) {
            *cell.borrow_mut() = value;
        } else {
            self.variables
                .insert(name.to_string(), Rc::new(RefCell::new(value)));
        }
        Ok(())
    }

    fn execute_if(&mut self, node: &Node) -> Result<(), ScriptError> {
        let condition = node
            .children
            .first()
            .ok_or_else(|| ScriptError::runtime("malformed if statement", node.line))?;
        let truthy = self.eval(condition)?.get().is_truthy();
        if truthy {
            let then_section = node
                .children
                .get(1)
                .ok_or_else(|| ScriptError::runtime("malformed if statement", node.line))?;
            self.execute_section(then_section)?;
        } else if let Some(else_section) = node.children.get(2) {
            self.execute_section(else_section)?;
        }
        Ok(())
    }

    /// Evaluate one rvalue node. Variable reads alias the storage; every
    /// other shape produces an owned value.
    fn eval(&mut self, node: &Node) -> Result<Parameter, ScriptError> {
        match node.rule {
            Rule::ConstValue => literal(node).map(Parameter::owned),
            Rule::Variable => {
                let name = node.token_text();
                let cell = self.variables.get(name).ok_or_else(|| {
                    ScriptError::runtime(format!("unknown variable '{name}'"), node.line)
                })?;
                Ok(Parameter::reference(cell))
            }
            Rule::Function => self.call_command(node),
            Rule::Expr => self.eval_expr(node),
            _ => Err(ScriptError::runtime(
                "unable to evaluate expression",
                node.line,
            )),
        }
    }

    /// Postfix stack machine over an `Expr` node's children.
    fn eval_expr(&mut self, node: &Node) -> Result<Parameter, ScriptError> {
        let mut stack: Vec<Parameter> = Vec::new();
        for child in &node.children {
            if child.rule == Rule::Operator {
                let op = child
                    .token
                    .as_ref()
                    .and_then(|t| BinaryOp::from_token(t.kind))
                    .ok_or_else(|| {
                        ScriptError::runtime("unable to evaluate expression", child.line)
                    })?;
                let (Some(right), Some(left)) = (stack.pop(), stack.pop()) else {
                    return Err(ScriptError::runtime(
                        "unable to evaluate expression",
                        node.line,
                    ));
                };
                let value = apply_binary(op, &left.get(), &right.get())
                    .map_err(|message| ScriptError::runtime(message, child.line))?;
                stack.push(Parameter::owned(value));
            } else {
                let operand = self.eval(child)?;
                stack.push(operand);
            }
        }
        let result = stack.pop();
        match result {
            Some(value) if stack.is_empty() => Ok(value),
            _ => Err(ScriptError::runtime(
                "unable to evaluate expression",
                node.line,
            )),
        }
    }

    fn call_command(&mut self, node: &Node) -> Result<Parameter, ScriptError> {
        let name = node.token_text().to_string();
        let mut arguments = Vec::with_capacity(node.children.len());
        for child in &node.children {
            arguments.push(self.eval(child)?);
        }
        let output = Rc::clone(&self.output);
        let Some(command) = self.registry.get_mut(&name) else {
            return Err(ScriptError::runtime(
                format!("unknown command '{name}'"),
                node.line,
            ));
        };
        match (command.callback)(&arguments, &output) {
            Ok(result) => Ok(result),
            Err(_) => Err(ScriptError::runtime(
                format!("command '{name}' failed"),
                node.line,
            )),
        }
    }
}

fn literal(node: &Node) -> Result<Value, ScriptError> {
    let Some(token) = &node.token else {
        return Err(ScriptError::runtime("malformed constant", node.line));
    };
    match token.kind {
        TokenKind::Integer => token.text.parse::<i64>().map(Value::Int).map_err(|_| {
            ScriptError::runtime(
                format!("integer constant '{}' is out of range", token.text),
                node.line,
            )
        }),
        TokenKind::Float => token.text.parse::<f64>().map(Value::Float).map_err(|_| {
            ScriptError::runtime(format!("malformed number '{}'", token.text), node.line)
        }),
        TokenKind::String => {
            let inner = token
                .text
                .get(1..token.text.len().saturating_sub(1))
                .unwrap_or("");
            Ok(Value::String(inner.to_string()))
        }
        _ => Err(ScriptError::runtime("malformed constant", node.line)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::script::builtins::register_defaults;
    use crate::script::registry::CommandFailed;
    use crate::script::value::BasicType;

    type Events = Rc<RefCell<Vec<(String, OutputStyle)>>>;

    fn harness() -> (Interpreter, Events) {
        let events: Events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let output: OutputFn = Rc::new(move |p, style| {
            sink.borrow_mut().push((p.to_string(), style));
        });
        let mut interp = Interpreter::new(output);
        register_defaults(interp.registry_mut());
        (interp, events)
    }

    fn standard(events: &Events) -> Vec<String> {
        events
            .borrow()
            .iter()
            .filter(|(_, style)| *style == OutputStyle::Standard)
            .map(|(text, _)| text.clone())
            .collect()
    }

    #[test]
    fn precedence_with_parens() {
        let (mut interp, _) = harness();
        interp.run("x = 1 + 2 * 3 + 4 * (5 + 6)").unwrap();
        assert_eq!(interp.variable("x").unwrap(), Value::Int(51));
    }

    #[test]
    fn branch_on_string_comparison() {
        let (mut interp, _) = harness();
        interp
            .run("pred = \"A\" == \"A\"\nif pred:\n    result = 1\nelse:\n    result = 2")
            .unwrap();
        assert_eq!(interp.variable("result").unwrap(), Value::Int(1));

        interp
            .run("pred = \"A\" == \"B\"\nif pred:\n    result = 1\nelse:\n    result = 2")
            .unwrap();
        assert_eq!(interp.variable("result").unwrap(), Value::Int(2));
    }

    #[test]
    fn mixed_numeric_promotes() {
        let (mut interp, _) = harness();
        interp.run("x = 1 + 2.5").unwrap();
        assert_eq!(interp.variable("x").unwrap(), Value::Float(3.5));
    }

    #[test]
    fn failed_validation_leaves_no_side_effects() {
        let (mut interp, events) = harness();
        let e = interp.run("a = 1\nb = a + \"x\"").unwrap_err();
        assert_eq!(e.kind, crate::script::error::ErrorKind::Validate);
        // Even the valid first statement never executed.
        assert!(interp.variable("a").is_none());
        // The error went through the channel with its line prefix.
        let errors: Vec<(String, OutputStyle)> = events
            .borrow()
            .iter()
            .filter(|(_, style)| *style == OutputStyle::Error)
            .cloned()
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].0.starts_with("At line 2: "));
    }

    #[test]
    fn division_by_zero_halts_mid_run() {
        let (mut interp, _) = harness();
        let e = interp.run("a = 1\nb = 1 / 0\nc = 2").unwrap_err();
        assert_eq!(e.kind, crate::script::error::ErrorKind::Runtime);
        assert!(e.message.contains("division by zero"));
        // Prior statements keep their effects; later ones never ran.
        assert_eq!(interp.variable("a").unwrap(), Value::Int(1));
        assert!(interp.variable("b").is_none());
        assert!(interp.variable("c").is_none());
    }

    #[test]
    fn rebinding_changes_type() {
        let (mut interp, _) = harness();
        interp.run("x = \"text\"\nx = 5\ny = x * 2").unwrap();
        assert_eq!(interp.variable("x").unwrap(), Value::Int(5));
        assert_eq!(interp.variable("y").unwrap(), Value::Int(10));
    }

    #[test]
    fn variables_persist_across_runs() {
        let (mut interp, _) = harness();
        interp.run("counter = 41").unwrap();
        interp.run("counter = counter + 1").unwrap();
        assert_eq!(interp.variable("counter").unwrap(), Value::Int(42));
    }

    #[test]
    fn truthiness_of_int_condition() {
        let (mut interp, _) = harness();
        interp.run("n = 3\nif n:\n    hit = 1\nelse:\n    hit = 0").unwrap();
        assert_eq!(interp.variable("hit").unwrap(), Value::Int(1));
        interp.run("n = 0\nif n:\n    hit = 1\nelse:\n    hit = 0").unwrap();
        assert_eq!(interp.variable("hit").unwrap(), Value::Int(0));
    }

    #[test]
    fn if_without_else_is_a_noop_when_false() {
        let (mut interp, _) = harness();
        interp.run("x = 1\nif x == 2:\n    x = 3").unwrap();
        assert_eq!(interp.variable("x").unwrap(), Value::Int(1));
    }

    #[test]
    fn print_streams_in_order() {
        let (mut interp, events) = harness();
        interp
            .run("print(\"one\")\nprint(2)\nprint(3.5)")
            .unwrap();
        assert_eq!(standard(&events), vec!["one", "2", "3.5"]);
    }

    #[test]
    fn command_arguments_are_references() {
        let (mut interp, _) = harness();
        let seen: Rc<RefCell<Vec<bool>>> = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        interp.registry_mut().register(
            "probe",
            vec![vec![ParameterType::of(BasicType::Int)]],
            ParameterType::EMPTY,
            Box::new(move |params, _output| {
                log.borrow_mut().push(params[0].is_reference());
                Ok(Parameter::owned(Value::Empty))
            }),
        );
        interp.run("x = 7\nprobe(x)\nprobe(7)").unwrap();
        // A variable argument aliases storage; a literal is owned.
        assert_eq!(*seen.borrow(), vec![true, false]);
    }

    #[test]
    fn assignment_from_variable_materializes_a_copy() {
        let (mut interp, _) = harness();
        interp.run("a = 10\nb = a\na = 20").unwrap();
        assert_eq!(interp.variable("b").unwrap(), Value::Int(10));
        assert_eq!(interp.variable("a").unwrap(), Value::Int(20));
    }

    #[test]
    fn failing_command_aborts_the_run() {
        let (mut interp, events) = harness();
        interp.registry_mut().register(
            "explode",
            Vec::new(),
            ParameterType::EMPTY,
            Box::new(|_params, output: &OutputFn| {
                (output)(
                    &Parameter::owned(Value::String("boom".into())),
                    OutputStyle::Error,
                );
                Err(CommandFailed)
            }),
        );
        let e = interp.run("a = 1\nexplode()\nb = 2").unwrap_err();
        assert!(e.message.contains("'explode' failed"));
        assert_eq!(interp.variable("a").unwrap(), Value::Int(1));
        assert!(interp.variable("b").is_none());
        // The callback's own report came through before the abort notice.
        let texts: Vec<String> = events.borrow().iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(texts[0], "boom");
        assert!(texts[1].starts_with("At line 2: "));
    }

    #[test]
    fn command_result_in_expression() {
        let (mut interp, _) = harness();
        interp.run("s = str(40 + 2) + \"!\"").unwrap();
        assert_eq!(interp.variable("s").unwrap(), Value::String("42!".into()));
    }

    #[test]
    fn str_of_empty_print_argument() {
        let (mut interp, events) = harness();
        interp.run("print()").unwrap();
        assert_eq!(standard(&events), vec![String::new()]);
    }

    #[test]
    fn check_does_not_execute() {
        let (interp, events) = harness();
        interp.check("print(\"silent\")").unwrap();
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn integer_division_truncates() {
        let (mut interp, _) = harness();
        interp.run("x = 7 / 2\ny = 7 / 2.0").unwrap();
        assert_eq!(interp.variable("x").unwrap(), Value::Int(3));
        assert_eq!(interp.variable("y").unwrap(), Value::Float(3.5));
    }
}
