//! Host-command registry: the boundary between the script engine and the
//! surrounding application. The host registers its vocabulary at startup;
//! the engine resolves calls by exact name and hands arguments over as
//! `Parameter` values.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::value::{BasicType, Parameter, ParameterType};

/// How an output line should be presented by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStyle {
    Standard,
    Error,
}

/// Host-supplied sink. Carries both print-style output and every error
/// message the engine reports.
pub type OutputFn = Rc<dyn Fn(&Parameter, OutputStyle)>;

/// Marker returned by a command callback that failed. The callback is
/// expected to have reported details through the output channel itself;
/// the engine aborts the run without inventing further context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFailed;

pub type CommandFn = Box<dyn FnMut(&[Parameter], &OutputFn) -> Result<Parameter, CommandFailed>>;

/// A native command with a positional, type-checked signature.
pub struct Command {
    pub name: String,
    /// Per-position lists of acceptable parameter types. An `Empty`
    /// alternative marks the position — and every position after it — as
    /// omissible.
    pub signature: Vec<Vec<ParameterType>>,
    pub return_type: ParameterType,
    pub callback: CommandFn,
}

impl Command {
    /// Acceptable types at `index`, rendered for an error message. The
    /// `Empty` omission marker is not a real value and stays out of the
    /// listing.
    pub fn expected_at(&self, index: usize) -> String {
        let alternatives: Vec<String> = self
            .signature
            .get(index)
            .map(|alts| {
                alts.iter()
                    .filter(|t| t.basic != BasicType::Empty)
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();
        format!("{{{}}}", alternatives.join(", "))
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("return_type", &self.return_type)
            .finish_non_exhaustive()
    }
}

/// Commands by name, kept in registration order.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: IndexMap<String, Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: IndexMap::new(),
        }
    }

    /// Register a command, replacing any earlier one under the same name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        signature: Vec<Vec<ParameterType>>,
        return_type: ParameterType,
        callback: CommandFn,
    ) {
        let name = name.into();
        self.commands.insert(
            name.clone(),
            Command {
                name,
                signature,
                return_type,
                callback,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Command> {
        self.commands.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::script::value::Value;

    fn noop() -> CommandFn {
        Box::new(|_params, _output| Ok(Parameter::owned(Value::Empty)))
    }

    #[test]
    fn registration_order_is_preserved() {
        let mut registry = CommandRegistry::new();
        registry.register("zeta", Vec::new(), ParameterType::EMPTY, noop());
        registry.register("alpha", Vec::new(), ParameterType::EMPTY, noop());
        let names: Vec<&str> = registry.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn reregistration_replaces() {
        let mut registry = CommandRegistry::new();
        registry.register("f", Vec::new(), ParameterType::EMPTY, noop());
        registry.register(
            "f",
            Vec::new(),
            ParameterType::of(BasicType::Int),
            noop(),
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("f").unwrap().return_type,
            ParameterType::of(BasicType::Int)
        );
    }

    #[test]
    fn expected_at_hides_the_omission_marker() {
        let mut registry = CommandRegistry::new();
        registry.register(
            "f",
            vec![vec![
                ParameterType::of(BasicType::Int),
                ParameterType::of(BasicType::Float),
                ParameterType::EMPTY,
            ]],
            ParameterType::EMPTY,
            noop(),
        );
        assert_eq!(registry.get("f").unwrap().expected_at(0), "{Int, Float}");
    }
}
