use std::sync::{Arc, Mutex};

use anyhow::{bail, Error};

use metabasenet::node::bus::EventBus;
use metabasenet::node::container::{ContainerError, ModuleContainer};
use metabasenet::node::module::{LifecyclePhase, NodeModule};
use metabasenet::node::service::HttpServerModule;
use metabasenet::node::wallet::{HotWalletModule, OfflineWalletModule};
use metabasenet::tools::logsink::default_sink;

type CallLog = Arc<Mutex<Vec<String>>>;

/// Lifecycle probe that records every call it receives and can be told
/// to fail a given phase.
struct Recorder {
    name: &'static str,
    log: CallLog,
    fail_initialize: bool,
    fail_run: bool,
}

impl Recorder {
    fn boxed(name: &'static str, log: &CallLog) -> Box<dyn NodeModule> {
        Box::new(Self {
            name,
            log: Arc::clone(log),
            fail_initialize: false,
            fail_run: false,
        })
    }

    fn failing_initialize(name: &'static str, log: &CallLog) -> Box<dyn NodeModule> {
        Box::new(Self {
            name,
            log: Arc::clone(log),
            fail_initialize: true,
            fail_run: false,
        })
    }

    fn failing_run(name: &'static str, log: &CallLog) -> Box<dyn NodeModule> {
        Box::new(Self {
            name,
            log: Arc::clone(log),
            fail_initialize: false,
            fail_run: true,
        })
    }

    fn record(&self, op: &str) {
        self.log.lock().unwrap().push(format!("{}.{}", self.name, op));
    }
}

impl NodeModule for Recorder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn initialize(&mut self) -> Result<(), Error> {
        self.record("initialize");
        if self.fail_initialize {
            bail!("refusing to initialize");
        }
        Ok(())
    }

    fn run(&mut self) -> Result<(), Error> {
        self.record("run");
        if self.fail_run {
            bail!("refusing to run");
        }
        Ok(())
    }

    fn halt(&mut self) -> Result<(), Error> {
        self.record("halt");
        Ok(())
    }

    fn deinitialize(&mut self) -> Result<(), Error> {
        self.record("deinitialize");
        Ok(())
    }
}

fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[test]
fn lookup_is_by_declared_name() {
    let log = CallLog::default();
    let mut container = ModuleContainer::new(default_sink());
    assert!(container.attach(Recorder::boxed("x", &log)));

    assert_eq!(container.get_object("x").unwrap().name(), "x");
    assert!(container.get_object("y").is_none());
}

#[test]
fn duplicate_names_are_rejected() {
    let log = CallLog::default();
    let mut container = ModuleContainer::new(default_sink());
    assert!(container.attach(Recorder::boxed("x", &log)));
    assert!(!container.attach(Recorder::boxed("x", &log)));
    assert_eq!(container.module_names().count(), 1);
}

#[test]
fn lifecycle_runs_up_in_attach_order_and_down_in_reverse() {
    let log = CallLog::default();
    let mut container = ModuleContainer::new(default_sink());
    container.attach(Recorder::boxed("a", &log));
    container.attach(Recorder::boxed("b", &log));
    container.attach(Recorder::boxed("c", &log));

    container.run().unwrap();
    assert_eq!(container.phase(), LifecyclePhase::Running);
    container.exit();
    assert_eq!(container.phase(), LifecyclePhase::Deinitialized);

    assert_eq!(
        calls(&log),
        vec![
            "a.initialize",
            "b.initialize",
            "c.initialize",
            "a.run",
            "b.run",
            "c.run",
            "c.halt",
            "b.halt",
            "a.halt",
            "c.deinitialize",
            "b.deinitialize",
            "a.deinitialize",
        ]
    );
}

#[test]
fn an_initialize_failure_unwinds_in_reverse_and_runs_nothing() {
    let log = CallLog::default();
    let mut container = ModuleContainer::new(default_sink());
    container.attach(Recorder::boxed("a", &log));
    container.attach(Recorder::failing_initialize("b", &log));
    container.attach(Recorder::boxed("c", &log));

    match container.run() {
        Err(ContainerError::ModuleInitFailed { name, .. }) => assert_eq!(name, "b"),
        other => panic!("expected ModuleInitFailed, got {:?}", other),
    }

    assert_eq!(
        calls(&log),
        vec![
            "a.initialize",
            "b.initialize",
            "b.deinitialize",
            "a.halt",
            "a.deinitialize",
        ]
    );
    assert_eq!(container.phase(), LifecyclePhase::Deinitialized);
}

#[test]
fn a_run_failure_leaves_no_module_running() {
    let log = CallLog::default();
    let mut container = ModuleContainer::new(default_sink());
    container.attach(Recorder::boxed("a", &log));
    container.attach(Recorder::failing_run("b", &log));
    container.attach(Recorder::boxed("c", &log));

    match container.run() {
        Err(ContainerError::ModuleRunFailed { name, .. }) => assert_eq!(name, "b"),
        other => panic!("expected ModuleRunFailed, got {:?}", other),
    }

    assert_eq!(
        calls(&log),
        vec![
            "a.initialize",
            "b.initialize",
            "c.initialize",
            "a.run",
            "b.run",
            "a.halt",
            "c.deinitialize",
            "b.deinitialize",
            "a.deinitialize",
        ]
    );
}

#[test]
fn exit_is_a_no_op_before_anything_started() {
    let log = CallLog::default();
    let mut container = ModuleContainer::new(default_sink());
    container.attach(Recorder::boxed("a", &log));

    container.exit();
    assert!(calls(&log).is_empty());
    assert_eq!(container.phase(), LifecyclePhase::Constructed);
}

#[test]
fn capabilities_resolve_without_knowing_the_concrete_module() {
    let mut container = ModuleContainer::new(default_sink());
    container.attach(Box::new(OfflineWalletModule));
    container.attach(Box::new(HttpServerModule::new(
        "127.0.0.1:6812".parse().unwrap(),
        Arc::new(EventBus::new()),
        default_sink(),
    )));

    let wallet = container.wallet().expect("wallet capability");
    assert!(!wallet.ready());
    assert_eq!(wallet.address_count(), 0);

    let host = container.http_host().expect("http host capability");
    assert_eq!(host.listen_addr().port(), 6812);
}

#[test]
fn the_wallet_capability_hides_which_realization_is_attached() {
    for hot in [false, true] {
        let mut container = ModuleContainer::new(default_sink());
        let module: Box<dyn NodeModule> = if hot {
            Box::new(HotWalletModule::new())
        } else {
            Box::new(OfflineWalletModule)
        };
        container.attach(module);
        let wallet = container.wallet().expect("wallet capability");
        assert_eq!(wallet.ready(), hot);
    }
}
