//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use helix::error::RunError;
use helix::runner::ds::conversion::Kind;
use helix::runner::plugin::binding::{BindingTarget, Param};
use helix::runner::plugin::registry::ModuleInfo;
use helix::{Dictionary, EngineConfig, Helix, Namespace, SyntaxError};

/// Route `tracing` output through the test harness. `RUST_LOG` selects
/// what is shown.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn engine() -> Helix {
    init_tracing();
    Helix::new(EngineConfig::default()).unwrap()
}

pub fn engine_without_std() -> Helix {
    init_tracing();
    let mut config = EngineConfig::default();
    config.engine.std_lib = false;
    Helix::new(config).unwrap()
}

/// Root of a fresh exported module.
pub fn module(helix: &Helix, id: &str) -> Namespace {
    helix
        .registry()
        .register_module(ModuleInfo::new(id), true)
        .unwrap()
}

/// Parse and run `source`, returning the dictionary it left behind.
pub fn run(helix: &Helix, source: &str) -> Result<Dictionary, RunError> {
    let script = helix
        .parser()
        .parse_str(source)
        .unwrap_or_else(|e| panic!("{}", e));
    let mut dict = helix.dict();
    script.run_with(&mut dict)?;
    Ok(dict)
}

/// Message of the script error `source` fails with.
pub fn run_error(helix: &Helix, source: &str) -> String {
    match run(helix, source) {
        Ok(_) => panic!("expected {:?} to fail", source),
        Err(RunError::Script(e)) => e.message().to_string(),
        Err(other) => panic!("expected a script error, got {}", other),
    }
}

pub fn parse_error(helix: &Helix, source: &str) -> SyntaxError {
    match helix.parser().parse_str(source) {
        Ok(_) => panic!("expected {:?} not to parse", source),
        Err(e) => e,
    }
}

/// Lines written by a scripted `print`.
#[derive(Clone, Default)]
pub struct Output {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Output {
    pub fn push(&self, line: String) {
        self.lines.lock().unwrap().push(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

/// Register `print(@NotNull String) -> void` into `ns`, collecting its
/// output.
pub fn register_print(ns: &Namespace) -> Output {
    let output = Output::default();
    let sink = output.clone();
    ns.method(
        BindingTarget::new("print")
            .param(Param::of(Kind::Str).not_null())
            .returns(Kind::Void),
        move |args| {
            sink.push(args.get::<String>(0)?);
            Ok(())
        },
    )
    .unwrap();
    output
}
