//! The ordered module container.

use std::collections::HashMap;

use anyhow::Error;
use thiserror::Error as ThisError;

use crate::node::module::{HttpHost, LifecyclePhase, NodeModule};
use crate::node::wallet::Wallet;
use crate::tools::logsink::{SharedSink, SinkLevel};

/// Errors the container surfaces to the entry sequencer.
#[derive(Debug, ThisError)]
pub enum ContainerError {
    #[error("module '{name}' failed to initialize - {cause}")]
    ModuleInitFailed { name: &'static str, cause: Error },
    #[error("module '{name}' failed to start - {cause}")]
    ModuleRunFailed { name: &'static str, cause: Error },
    #[error("container lifecycle violation - {op} while {phase:?}")]
    Phase {
        op: &'static str,
        phase: LifecyclePhase,
    },
}

/// Owns every attached module and drives its lifecycle: attach order on
/// the way up, reverse attach order on the way down. Either every
/// module reaches `run` or none remain running.
pub struct ModuleContainer {
    modules: Vec<Box<dyn NodeModule>>,
    by_name: HashMap<&'static str, usize>,
    phase: LifecyclePhase,
    sink: SharedSink,
}

impl ModuleContainer {
    pub fn new(sink: SharedSink) -> Self {
        Self {
            modules: Vec::new(),
            by_name: HashMap::new(),
            phase: LifecyclePhase::Constructed,
            sink,
        }
    }

    /// Attach a module. Duplicate names are rejected with `false`; the
    /// caller discards the instance. Attach only happens during entry,
    /// before the container is brought up.
    pub fn attach(&mut self, module: Box<dyn NodeModule>) -> bool {
        let name = module.name();
        if self.by_name.contains_key(name) {
            return false;
        }
        self.by_name.insert(name, self.modules.len());
        self.modules.push(module);
        true
    }

    /// Borrow a module by its declared name. The container keeps
    /// ownership until it exits.
    pub fn get_object(&self, name: &str) -> Option<&dyn NodeModule> {
        self.by_name
            .get(name)
            .map(|index| self.modules[*index].as_ref())
    }

    /// First wallet realization in attach order.
    pub fn wallet(&self) -> Option<&dyn Wallet> {
        self.modules.iter().find_map(|module| module.as_wallet())
    }

    /// First RPC host in attach order.
    pub fn http_host(&self) -> Option<&dyn HttpHost> {
        self.modules.iter().find_map(|module| module.as_http_host())
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn module_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.modules.iter().map(|module| module.name())
    }

    /// Initialize every module in attach order. On failure the failed
    /// module is deinitialized, every predecessor is halted and then
    /// deinitialized in reverse order, and nothing stays initialized.
    pub fn initialize(&mut self) -> Result<(), ContainerError> {
        if self.phase != LifecyclePhase::Constructed {
            return Err(ContainerError::Phase {
                op: "initialize",
                phase: self.phase,
            });
        }
        for index in 0..self.modules.len() {
            if let Err(cause) = self.modules[index].initialize() {
                let name = self.modules[index].name();
                self.unwind_failed_init(index);
                self.phase = LifecyclePhase::Deinitialized;
                return Err(ContainerError::ModuleInitFailed { name, cause });
            }
        }
        self.phase = LifecyclePhase::Initialized;
        Ok(())
    }

    fn unwind_failed_init(&mut self, failed: usize) {
        if let Err(err) = self.modules[failed].deinitialize() {
            self.swallow(self.modules[failed].name(), "deinitialize", &err);
        }
        for index in (0..failed).rev() {
            if let Err(err) = self.modules[index].halt() {
                self.swallow(self.modules[index].name(), "halt", &err);
            }
            if let Err(err) = self.modules[index].deinitialize() {
                self.swallow(self.modules[index].name(), "deinitialize", &err);
            }
        }
    }

    /// Initialize (when still constructed) and start every module in
    /// attach order. A start failure halts the modules already running
    /// and deinitializes everything, reverse order, before reporting.
    pub fn run(&mut self) -> Result<(), ContainerError> {
        if self.phase == LifecyclePhase::Constructed {
            self.initialize()?;
        }
        if self.phase != LifecyclePhase::Initialized {
            return Err(ContainerError::Phase {
                op: "run",
                phase: self.phase,
            });
        }
        for index in 0..self.modules.len() {
            if let Err(cause) = self.modules[index].run() {
                let name = self.modules[index].name();
                for running in (0..index).rev() {
                    if let Err(err) = self.modules[running].halt() {
                        self.swallow(self.modules[running].name(), "halt", &err);
                    }
                }
                for attached in (0..self.modules.len()).rev() {
                    if let Err(err) = self.modules[attached].deinitialize() {
                        self.swallow(self.modules[attached].name(), "deinitialize", &err);
                    }
                }
                self.phase = LifecyclePhase::Deinitialized;
                return Err(ContainerError::ModuleRunFailed { name, cause });
            }
        }
        self.phase = LifecyclePhase::Running;
        Ok(())
    }

    /// Halt every running module, reverse attach order. Individual
    /// failures are reported through the sink and swallowed.
    pub fn halt(&mut self) {
        if self.phase != LifecyclePhase::Running {
            return;
        }
        for index in (0..self.modules.len()).rev() {
            if let Err(err) = self.modules[index].halt() {
                self.swallow(self.modules[index].name(), "halt", &err);
            }
        }
        self.phase = LifecyclePhase::Halted;
    }

    /// Deinitialize every module, reverse attach order. Individual
    /// failures are reported through the sink and swallowed.
    pub fn deinitialize(&mut self) {
        if self.phase != LifecyclePhase::Initialized && self.phase != LifecyclePhase::Halted {
            return;
        }
        for index in (0..self.modules.len()).rev() {
            if let Err(err) = self.modules[index].deinitialize() {
                self.swallow(self.modules[index].name(), "deinitialize", &err);
            }
        }
        self.phase = LifecyclePhase::Deinitialized;
    }

    /// Best-effort shutdown: halt, then deinitialize.
    pub fn exit(&mut self) {
        self.halt();
        self.deinitialize();
    }

    fn swallow(&self, name: &str, op: &str, err: &Error) {
        self.sink.emit(
            SinkLevel::Warn,
            "container",
            &format!("{} of module '{}' failed during shutdown - {}", op, name, err),
        );
    }
}
