//! SnapScript: the embedded scripting language behind the screen
//! automation tools — screen selection, capture, display and timing
//! commands are host-registered natives; the language itself is a small
//! indentation-based front end (lexer, parser, static validator) over a
//! tree-walking interpreter with a dynamically-typed `Parameter` value
//! model.
//!
//! ```no_run
//! use std::rc::Rc;
//! use snapscript::script::{builtins, Interpreter, OutputFn, OutputStyle};
//!
//! let output: OutputFn = Rc::new(|value, style| match style {
//!     OutputStyle::Standard => println!("{value}"),
//!     OutputStyle::Error => eprintln!("{value}"),
//! });
//! let mut interp = Interpreter::new(output);
//! builtins::register_defaults(interp.registry_mut());
//! interp.run("print(\"hello\")").ok();
//! ```

pub mod script;
pub mod settings;
