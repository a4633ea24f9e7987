use super::{Transport, TransportEvent};
use anyhow::{bail, Result};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Default)]
struct Script {
    connects: Vec<String>,
    outcomes: VecDeque<Vec<TransportEvent>>,
    pending: VecDeque<TransportEvent>,
    sent: Vec<String>,
    closes: usize,
    reject_sends: bool,
}

/// In-memory transport whose events are queued by the test.
/// Clones share the same script.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Rc<RefCell<Script>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Events delivered after the next `connect` call
    pub(crate) fn on_connect(&self, events: Vec<TransportEvent>) {
        self.script.borrow_mut().outcomes.push_back(events);
    }

    /// Queue an event on the current connection
    pub(crate) fn push(&self, event: TransportEvent) {
        self.script.borrow_mut().pending.push_back(event);
    }

    pub(crate) fn push_json(&self, value: serde_json::Value) {
        self.push(TransportEvent::Text(value.to_string()));
    }

    pub(crate) fn reject_sends(&self) {
        self.script.borrow_mut().reject_sends = true;
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.script.borrow().connects.len()
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.script.borrow().sent.clone()
    }

    pub(crate) fn closes(&self) -> usize {
        self.script.borrow().closes
    }
}

impl Transport for ScriptedTransport {
    fn connect(&mut self, url: &str) {
        let mut script = self.script.borrow_mut();
        script.connects.push(url.to_string());
        script.pending.clear();
        if let Some(events) = script.outcomes.pop_front() {
            script.pending.extend(events);
        }
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.script.borrow_mut().pending.pop_front()
    }

    fn send(&mut self, text: String) -> Result<()> {
        let mut script = self.script.borrow_mut();
        if script.reject_sends {
            bail!("send rejected");
        }
        script.sent.push(text);
        Ok(())
    }

    fn close(&mut self) {
        let mut script = self.script.borrow_mut();
        script.closes += 1;
        script.pending.clear();
    }
}
