//! The module orchestration kernel.
//!
//! A node is a set of long-lived service modules with a four-phase
//! lifecycle, owned by a [ModuleContainer](container::ModuleContainer)
//! that brings them up in attach order and tears them down in reverse.
//! Which modules exist for a given run is a pure table lookup in
//! [modes]; cross-module traffic goes over the [bus] instead of direct
//! references, which keeps ownership a tree.

pub mod bus;
pub mod container;
pub mod datastat;
pub mod lock;
pub mod modes;
pub mod module;
pub mod service;
pub mod wallet;

pub use container::{ContainerError, ModuleContainer};
pub use modes::{module_kinds, ModuleKind, RunMode};
pub use module::{LifecyclePhase, NodeModule};
