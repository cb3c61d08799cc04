//! Skeleton service modules.
//!
//! Consensus, networking and RPC internals are separate components of
//! the node. The kinds below still participate fully in the container
//! lifecycle and announce their phase transitions on the event bus, so
//! the orchestration layer stays complete without them.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Error};
use serde_json::json;

use crate::node::bus::EventBus;
use crate::node::modes::ModuleKind;
use crate::node::module::{HttpHost, NodeModule};
use crate::tools::logsink::{SharedSink, SinkLevel};
use crate::tools::net;

/// Lifecycle announcements land here.
pub const LIFECYCLE_TOPIC: &str = "module.lifecycle";

fn announce(bus: &EventBus, sink: &SharedSink, name: &str, phase: &str) {
    sink.emit(
        SinkLevel::Debug,
        "node",
        &format!("module '{}' {}", name, phase),
    );
    bus.publish(LIFECYCLE_TOPIC, json!({ "module": name, "phase": phase }));
}

/// Generic lifecycle placeholder for one module kind.
pub struct ServiceModule {
    kind: ModuleKind,
    bus: Arc<EventBus>,
    sink: SharedSink,
}

impl ServiceModule {
    pub fn new(kind: ModuleKind, bus: Arc<EventBus>, sink: SharedSink) -> Self {
        Self { kind, bus, sink }
    }
}

impl NodeModule for ServiceModule {
    fn name(&self) -> &'static str {
        self.kind.module_name()
    }

    fn initialize(&mut self) -> Result<(), Error> {
        announce(&self.bus, &self.sink, self.name(), "initialized");
        Ok(())
    }

    fn run(&mut self) -> Result<(), Error> {
        announce(&self.bus, &self.sink, self.name(), "running");
        Ok(())
    }

    fn halt(&mut self) -> Result<(), Error> {
        announce(&self.bus, &self.sink, self.name(), "halted");
        Ok(())
    }

    fn deinitialize(&mut self) -> Result<(), Error> {
        announce(&self.bus, &self.sink, self.name(), "deinitialized");
        Ok(())
    }
}

/// Peer-to-peer front end. The socket handling is a separate
/// component; this module owns the listen address and refuses
/// configurations nothing could ever bind to.
pub struct NetworkModule {
    listen_addr: SocketAddr,
    bus: Arc<EventBus>,
    sink: SharedSink,
}

impl NetworkModule {
    pub fn new(listen_addr: SocketAddr, bus: Arc<EventBus>, sink: SharedSink) -> Self {
        Self {
            listen_addr,
            bus,
            sink,
        }
    }
}

impl NodeModule for NetworkModule {
    fn name(&self) -> &'static str {
        "network"
    }

    fn initialize(&mut self) -> Result<(), Error> {
        if self.listen_addr.port() == 0 {
            bail!("network listen port must not be 0");
        }
        if net::classify(&self.listen_addr.ip()) == net::IpClass::Multicast {
            bail!("cannot listen on multicast address {}", self.listen_addr);
        }
        announce(&self.bus, &self.sink, self.name(), "initialized");
        Ok(())
    }

    fn run(&mut self) -> Result<(), Error> {
        self.bus.publish(
            "network.listen",
            json!({
                "addr": self.listen_addr.to_string(),
                "advertised": net::is_routable(&self.listen_addr.ip()),
            }),
        );
        announce(&self.bus, &self.sink, self.name(), "running");
        Ok(())
    }

    fn halt(&mut self) -> Result<(), Error> {
        announce(&self.bus, &self.sink, self.name(), "halted");
        Ok(())
    }

    fn deinitialize(&mut self) -> Result<(), Error> {
        announce(&self.bus, &self.sink, self.name(), "deinitialized");
        Ok(())
    }
}

/// RPC host. Other modules resolve it through the [HttpHost]
/// capability instead of downcasting.
pub struct HttpServerModule {
    listen_addr: SocketAddr,
    bus: Arc<EventBus>,
    sink: SharedSink,
}

impl HttpServerModule {
    pub fn new(listen_addr: SocketAddr, bus: Arc<EventBus>, sink: SharedSink) -> Self {
        Self {
            listen_addr,
            bus,
            sink,
        }
    }
}

impl NodeModule for HttpServerModule {
    fn name(&self) -> &'static str {
        "httpserver"
    }

    fn initialize(&mut self) -> Result<(), Error> {
        if self.listen_addr.port() == 0 {
            bail!("rpc listen port must not be 0");
        }
        announce(&self.bus, &self.sink, self.name(), "initialized");
        Ok(())
    }

    fn run(&mut self) -> Result<(), Error> {
        announce(&self.bus, &self.sink, self.name(), "running");
        Ok(())
    }

    fn halt(&mut self) -> Result<(), Error> {
        announce(&self.bus, &self.sink, self.name(), "halted");
        Ok(())
    }

    fn deinitialize(&mut self) -> Result<(), Error> {
        announce(&self.bus, &self.sink, self.name(), "deinitialized");
        Ok(())
    }

    fn as_http_host(&self) -> Option<&dyn HttpHost> {
        Some(self)
    }
}

impl HttpHost for HttpServerModule {
    fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }
}
