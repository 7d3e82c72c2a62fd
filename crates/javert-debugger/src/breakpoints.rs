//! Breakpoint table. Entries outlive individual launches: on every launch
//! the whole table is re-applied, with entries for not-yet-loaded classes
//! deferred behind a class-prepare watch.

use javert_jdi::{Jdi, JdiError, ReferenceTypeInfo};
use tracing::{debug, error};

use crate::SuspendedState;

/// Predicate evaluated when a breakpoint is hit. Returning `false`
/// resumes the debuggee transparently.
pub type Condition = Box<dyn Fn(&SuspendedState) -> bool + Send + Sync>;

pub(crate) struct BreakpointEntry {
    class: String,
    line: u32,
    condition: Option<Condition>,
    applied: bool,
}

#[derive(Default)]
pub(crate) struct BreakpointTable {
    entries: Vec<BreakpointEntry>,
}

impl BreakpointTable {
    /// Registers a breakpoint, replacing any earlier entry at the same
    /// (class, line). The replaced entry's request, if applied, stays
    /// valid; only the condition changes.
    pub(crate) fn add(&mut self, class: &str, line: u32, condition: Option<Condition>) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.class == class && entry.line == line)
        {
            entry.condition = condition;
            return;
        }
        self.entries.push(BreakpointEntry {
            class: class.to_owned(),
            line,
            condition,
            applied: false,
        });
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies the whole table against a freshly launched debuggee.
    /// Entries whose class is already prepared get a request immediately;
    /// the rest are deferred behind a class-prepare watch.
    pub(crate) fn apply_all(&mut self, jdi: &dyn Jdi) -> Result<(), JdiError> {
        for entry in &mut self.entries {
            entry.applied = false;
        }
        self.apply_pending(jdi)
    }

    /// Applies entries without a live request yet; entries already applied
    /// to the current debuggee are left alone.
    pub(crate) fn apply_pending(&mut self, jdi: &dyn Jdi) -> Result<(), JdiError> {
        for i in 0..self.entries.len() {
            if self.entries[i].applied {
                continue;
            }
            let class = self.entries[i].class.clone();
            let line = self.entries[i].line;
            let mut applied = false;
            for id in jdi.types_by_name(&class) {
                let info = jdi.type_info(id)?;
                if info.is_prepared {
                    apply_one(jdi, &info, line);
                    applied = true;
                }
            }
            if applied {
                self.entries[i].applied = true;
            } else {
                debug!(class, line, "class not loaded yet; deferring breakpoint");
                jdi.request_class_prepare(&class)?;
            }
        }
        Ok(())
    }

    /// Installs deferred entries that match a freshly prepared type.
    pub(crate) fn on_class_prepare(&mut self, jdi: &dyn Jdi, info: &ReferenceTypeInfo) {
        for entry in &mut self.entries {
            if entry.applied || entry.class != info.name.as_str() {
                continue;
            }
            apply_one(jdi, info, entry.line);
            entry.applied = true;
        }
    }

    pub(crate) fn condition_for(&self, class: &str, line: u32) -> Option<&Condition> {
        self.entries
            .iter()
            .find(|entry| entry.class == class && entry.line == line)
            .and_then(|entry| entry.condition.as_ref())
    }
}

fn apply_one(jdi: &dyn Jdi, info: &ReferenceTypeInfo, line: u32) {
    match jdi.set_breakpoint(info.id, line) {
        Ok(request) => debug!(class = %info.name, line, request, "breakpoint set"),
        Err(JdiError::InvalidLocation { .. }) => {
            error!(
                class = %info.name,
                line,
                "no code at breakpoint line; did you recompile the debuggee?"
            );
        }
        Err(err) => error!(class = %info.name, line, error = %err, "failed to set breakpoint"),
    }
}
