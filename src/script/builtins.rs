//! Default host-command set: the headless portion of the application
//! vocabulary (printing, conversion, timing, shell-open). GUI-bound
//! commands — `select`, `capture`, `display` — are registered by the host
//! application against the same interface.

use std::thread;
use std::time::Duration;

use chrono::Utc;

use super::registry::{CommandFailed, CommandRegistry, OutputStyle};
use super::value::{BasicType, Parameter, ParameterType, Value};

/// Parameter types accepted by `print` and `str`: everything with a text
/// form. Objects are opaque payloads and stay out.
fn printable() -> Vec<ParameterType> {
    [
        BasicType::String,
        BasicType::Int,
        BasicType::Float,
        BasicType::Boolean,
        BasicType::Point,
        BasicType::Rect,
        BasicType::DateTime,
    ]
    .into_iter()
    .map(ParameterType::of)
    .collect()
}

pub fn register_defaults(registry: &mut CommandRegistry) {
    let mut print_arg = printable();
    print_arg.push(ParameterType::EMPTY);
    registry.register(
        "print",
        vec![print_arg],
        ParameterType::EMPTY,
        Box::new(|params, output| {
            match params.first() {
                Some(value) => (output)(value, OutputStyle::Standard),
                None => (output)(
                    &Parameter::owned(Value::String(String::new())),
                    OutputStyle::Standard,
                ),
            }
            Ok(Parameter::owned(Value::Empty))
        }),
    );

    registry.register(
        "str",
        vec![printable()],
        ParameterType::of(BasicType::String),
        Box::new(|params, _output| {
            let text = params.first().map(ToString::to_string).unwrap_or_default();
            Ok(Parameter::owned(Value::String(text)))
        }),
    );

    registry.register(
        "now",
        Vec::new(),
        ParameterType::of(BasicType::DateTime),
        Box::new(|_params, _output| Ok(Parameter::owned(Value::DateTime(Utc::now())))),
    );

    registry.register(
        "msecsbetween",
        vec![
            vec![ParameterType::of(BasicType::DateTime)],
            vec![ParameterType::of(BasicType::DateTime)],
        ],
        ParameterType::of(BasicType::Int),
        Box::new(|params, _output| {
            let (Some(first), Some(second)) = (params.first(), params.get(1)) else {
                return Err(CommandFailed);
            };
            let millis = match (&*first.get(), &*second.get()) {
                (Value::DateTime(a), Value::DateTime(b)) => {
                    b.signed_duration_since(*a).num_milliseconds()
                }
                _ => return Err(CommandFailed),
            };
            Ok(Parameter::owned(Value::Int(millis)))
        }),
    );

    registry.register(
        "sleep",
        vec![vec![
            ParameterType::of(BasicType::Int),
            ParameterType::of(BasicType::Float),
        ]],
        ParameterType::EMPTY,
        Box::new(|params, _output| {
            let millis = match params.first() {
                Some(p) => match &*p.get() {
                    Value::Int(n) => (*n).max(0) as u64,
                    Value::Float(x) => x.max(0.0) as u64,
                    _ => 0,
                },
                None => 0,
            };
            thread::sleep(Duration::from_millis(millis));
            Ok(Parameter::owned(Value::Empty))
        }),
    );

    registry.register(
        "open",
        vec![vec![ParameterType::of(BasicType::String)]],
        ParameterType::EMPTY,
        Box::new(|params, output| {
            let Some(target) = params.first() else {
                return Err(CommandFailed);
            };
            let path = target.to_string();
            if let Err(e) = platform_open(&path) {
                (output)(
                    &Parameter::owned(Value::String(format!("cannot open '{path}': {e}"))),
                    OutputStyle::Error,
                );
                return Err(CommandFailed);
            }
            Ok(Parameter::owned(Value::Empty))
        }),
    );
}

#[cfg(target_os = "macos")]
fn platform_open(target: &str) -> std::io::Result<()> {
    std::process::Command::new("open").arg(target).spawn().map(|_| ())
}

#[cfg(target_os = "windows")]
fn platform_open(target: &str) -> std::io::Result<()> {
    std::process::Command::new("cmd")
        .args(["/C", "start", "", target])
        .spawn()
        .map(|_| ())
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_open(target: &str) -> std::io::Result<()> {
    std::process::Command::new("xdg-open")
        .arg(target)
        .spawn()
        .map(|_| ())
}
