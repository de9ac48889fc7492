//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use termweave_core::{Event, HeadlessTerminal, Node, NodeBase, NodeRef, System, SystemConfig};

pub type Log = Rc<RefCell<Vec<String>>>;
pub type Hook = Box<dyn Fn(&System, &Event) -> bool>;

/// A node that records every handler and filter call into a shared log.
pub struct Probe {
    base: NodeBase,
    label: &'static str,
    log: Log,
    handler: Hook,
    filter: Option<Hook>,
}

impl Probe {
    /// A probe whose handler returns `handles` for every event.
    pub fn new(label: &'static str, log: &Log, handles: bool) -> Rc<Self> {
        Self::with_handler(label, log, move |_, _| handles)
    }

    pub fn with_handler(
        label: &'static str,
        log: &Log,
        handler: impl Fn(&System, &Event) -> bool + 'static,
    ) -> Rc<Self> {
        Rc::new(Self {
            base: NodeBase::with_name(label),
            label,
            log: Rc::clone(log),
            handler: Box::new(handler),
            filter: None,
        })
    }

    /// A probe acting as an event filter that returns `consumes`.
    pub fn filter(label: &'static str, log: &Log, consumes: bool) -> Rc<Self> {
        Rc::new(Self {
            base: NodeBase::with_name(label),
            label,
            log: Rc::clone(log),
            handler: Box::new(|_, _| false),
            filter: Some(Box::new(move |_, _| consumes)),
        })
    }
}

impl Node for Probe {
    fn node_base(&self) -> &NodeBase {
        &self.base
    }

    fn event(&self, system: &System, event: &Event) -> bool {
        self.log
            .borrow_mut()
            .push(format!("{}:{:?}", self.label, event.event_type()));
        (self.handler)(system, event)
    }

    fn event_filter(&self, system: &System, _target: &NodeRef, event: &Event) -> bool {
        match &self.filter {
            Some(filter) => {
                self.log
                    .borrow_mut()
                    .push(format!("filter {}:{:?}", self.label, event.event_type()));
                filter(system, event)
            }
            None => false,
        }
    }
}

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

/// A system over a headless terminal that never waits for input.
pub fn headless_system() -> (System, HeadlessTerminal) {
    let terminal = HeadlessTerminal::new(80, 24);
    let config = SystemConfig::default().with_poll_interval(Duration::ZERO);
    let system = System::with_terminal(Box::new(terminal.clone()), config).unwrap();
    (system, terminal)
}
