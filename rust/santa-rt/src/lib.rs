//! santa-rt
//!
//! The santa-lang execution back-end: the value-stack machine, the built-in
//! function library, the console sink, and the `compile()` entry point that
//! ties the front-end and runtime together.

mod builtins;
pub mod console;
mod cursor;
pub mod io;
pub mod machine;

pub use console::{ConsoleCapture, ConsoleEvent};
pub use io::{DefaultIo, ScriptIo};
pub use machine::Machine;
pub use santa_core::error::{Diagnostic, ErrorKind};
pub use santa_core::value::Value;

use santa_core::code::Artifact;
use santa_core::error::RuntimeError;
use std::collections::HashMap;
use std::rc::Rc;

/// Compile a source text into an executable script: lex, parse, desugar,
/// resolve, tail-analyze, emit. Any phase's error halts compilation.
pub fn compile(source: &str) -> Result<CompiledScript, Diagnostic> {
    let artifact = santa_compiler::compile_to_artifact(source)
        .map_err(|err| err.to_diagnostic())?;
    Ok(CompiledScript {
        artifact: Rc::new(artifact),
        io: Rc::new(DefaultIo),
    })
}

/// A zero-argument section runner.
pub type SectionThunk = Box<dyn Fn() -> Result<Value, Diagnostic>>;

#[derive(Clone)]
pub struct CompiledScript {
    artifact: Rc<Artifact>,
    io: Rc<dyn ScriptIo>,
}

impl std::fmt::Debug for CompiledScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledScript").finish_non_exhaustive()
    }
}

impl CompiledScript {
    /// Substitute the I/O provider behind `read`.
    pub fn with_io(mut self, io: Rc<dyn ScriptIo>) -> Self {
        self.io = io;
        self
    }

    pub fn has_sections(&self) -> bool {
        self.artifact.has_sections()
    }

    pub fn section_names(&self) -> Vec<String> {
        self.artifact
            .sections
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Evaluate a sectionless program to its final value.
    pub fn execute(&self) -> Result<Value, Diagnostic> {
        if self.artifact.has_sections() {
            return Err(RuntimeError::new(
                "Script declares sections; run them via sections()",
            )
            .into());
        }
        let mut machine = Machine::new(Rc::clone(&self.artifact), Rc::clone(&self.io));
        machine.run_main().map_err(Into::into)
    }

    /// Independently-invocable thunks, one per declared section. Each runs
    /// the top-level statements on a fresh machine, binds the `input`
    /// section's value when one is declared, then evaluates its own body.
    pub fn sections(&self) -> HashMap<String, SectionThunk> {
        self.artifact
            .sections
            .iter()
            .map(|(name, _)| {
                let script = self.clone();
                let section = name.clone();
                let thunk: SectionThunk =
                    Box::new(move || script.run_section_with_input(&section, None));
                (name.clone(), thunk)
            })
            .collect()
    }

    /// Run one section, optionally substituting the `input` value (how a
    /// test runner feeds `test:` block inputs to the parts).
    pub fn run_section_with_input(
        &self,
        name: &str,
        input_override: Option<Value>,
    ) -> Result<Value, Diagnostic> {
        let section = self
            .artifact
            .section(name)
            .ok_or_else(|| Diagnostic::from(RuntimeError::new(format!("Unknown section {name}"))))?;
        let mut machine = Machine::new(Rc::clone(&self.artifact), Rc::clone(&self.io));
        machine.run_main()?;
        if let Some(input_global) = self.artifact.input_global {
            if name != "input" {
                let input_value = match input_override {
                    Some(value) => value,
                    None => match self.artifact.section("input") {
                        Some(input_section) => machine.run_entry(input_section)?,
                        None => Value::Nil,
                    },
                };
                machine.set_global(input_global, input_value);
            }
        }
        machine.run_entry(section).map_err(Into::into)
    }
}
