//! Engine entry point and the contract modules implement.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{HelixError, RegistrationError};
use crate::parser::Parser;
use crate::runner::plugin::namespace::Namespace;
use crate::runner::plugin::registry::{ModuleInfo, Registry};
use crate::runner::std_lib;
use crate::runner::trigger::{EventBus, ListenerId};
use crate::script::{Dictionary, FileSource, Script, Source};

/// A bundle of registrations contributed to the script environment.
///
/// `load` runs exactly once, right after the module's root namespace is
/// created. If it fails the module is dropped again and none of its names
/// are visible to scripts.
pub trait Module {
    /// Identifier used as the root namespace name and as the `id:` prefix
    /// in scripts.
    fn id(&self) -> &str;

    fn name(&self) -> &str {
        self.id()
    }

    fn description(&self) -> &str {
        ""
    }

    fn version(&self) -> &str {
        ""
    }

    fn author(&self) -> &str {
        ""
    }

    /// Whether scripts of other modules see this module's names without
    /// the `id:` prefix.
    fn exported(&self) -> bool {
        true
    }

    fn load(&self, root: &Namespace) -> Result<(), RegistrationError>;

    fn info(&self) -> ModuleInfo {
        ModuleInfo {
            id: self.id().to_string(),
            name: self.name().to_string(),
            description: self.description().to_string(),
            version: self.version().to_string(),
            author: self.author().to_string(),
        }
    }
}

/// One scripting environment: a registry, the parser resolving against
/// it, and the event bus dispatching into its scripts.
///
/// ```
/// use helix::{EngineConfig, Helix};
///
/// let helix = Helix::new(EngineConfig::default()).unwrap();
/// let script = helix.parser().parse_str("x = len(\"abc\") * 2").unwrap();
/// let mut dict = helix.dict();
/// script.run_with(&mut dict).unwrap();
/// assert_eq!(dict.get("x").unwrap().as_int(), Some(6));
/// ```
pub struct Helix {
    config: EngineConfig,
    registry: Registry,
    parser: Parser,
    bus: EventBus,
}

impl Helix {
    pub fn new(config: EngineConfig) -> Result<Self, HelixError> {
        let registry = Registry::new();
        if config.engine.std_lib {
            std_lib::register(&registry)?;
        }
        let parser = Parser::new(registry.clone())
            .with_max_call_depth(config.engine.max_call_depth)
            .with_max_nesting_depth(config.engine.max_nesting_depth);
        let bus = EventBus::new(
            registry.clone(),
            config.engine.worker_threads,
            config.run_timeout(),
        )?;
        info!(
            target: "helix::registry",
            "engine ready, script root {}",
            config.engine.script_root.display()
        );
        Ok(Helix {
            config,
            registry,
            parser,
            bus,
        })
    }

    /// Engine configured from a TOML file.
    pub fn from_config_file(path: &Path) -> Result<Self, HelixError> {
        Self::new(EngineConfig::load(path)?)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn script_root(&self) -> &Path {
        &self.config.engine.script_root
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Root namespace of a loaded module.
    pub fn root(&self, module_id: &str) -> Option<Namespace> {
        self.registry.root(module_id)
    }

    /// Parser resolving unqualified names through every exported module.
    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    /// Parser for scripts owned by `module_id`; its names win over those of
    /// other modules.
    pub fn parser_for(&self, module_id: &str) -> Result<Parser, RegistrationError> {
        Ok(Parser::for_module(self.registry.clone(), module_id)?
            .with_max_call_depth(self.config.engine.max_call_depth)
            .with_max_nesting_depth(self.config.engine.max_nesting_depth))
    }

    pub fn dict(&self) -> Dictionary {
        Dictionary::new()
    }

    /// Source for a file under the script root.
    pub fn file_source(&self, path: impl Into<PathBuf>) -> FileSource {
        FileSource::new(self.script_root(), path)
    }

    /// Register `module` and run its `load`. Returns `None` when the
    /// configuration disables the module.
    pub fn load_module(&self, module: &dyn Module) -> Result<Option<Namespace>, RegistrationError> {
        let id = module.id().to_string();
        if self.config.is_disabled(&id) {
            debug!(target: "helix::registry", "module '{}' is disabled", id);
            return Ok(None);
        }
        let root = self.registry.register_module(module.info(), module.exported())?;
        if let Err(e) = module.load(&root) {
            warn!(target: "helix::registry", "module '{}' failed to load: {}", id, e);
            self.registry.remove_module(&id);
            return Err(RegistrationError::ModuleLoad {
                module: id,
                reason: e.to_string(),
            });
        }
        info!(target: "helix::registry", "module '{}' loaded", id);
        Ok(Some(root))
    }

    /// Parse `source`, attach its listeners, and return the script so the
    /// host can run its top level or detach it later.
    pub fn load_script(&self, source: &dyn Source) -> Result<(Script, Vec<ListenerId>), HelixError> {
        let script = self.parser.parse(source)?;
        let listeners = self.bus.attach(&script)?;
        Ok((script, listeners))
    }
}

impl fmt::Debug for Helix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Helix")
            .field("script_root", &self.script_root())
            .field("registry", &self.registry)
            .field("bus", &self.bus)
            .finish()
    }
}
