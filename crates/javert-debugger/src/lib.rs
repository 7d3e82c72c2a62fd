//! Debuggee lifecycle control.
//!
//! A [`Debugger`] owns a breakpoint table and at most one live
//! [`session`](Debugger::launch) with a suspended JVM. Event sets are read
//! by a dedicated pump thread and handed to the control thread over a
//! bounded queue; [`Debugger::resume`] blocks until the debuggee stops at a
//! breakpoint or terminates.

mod breakpoints;
mod error;
mod pump;

use std::io::BufRead;
use std::process::Child;
use std::sync::Arc;

use javert_jdi::{Event, EventSet, Jdi, SourceLocation, ThreadId};
use tracing::{debug, info, warn};

pub use breakpoints::Condition;
pub use error::{DebugError, DebugResult};

use breakpoints::BreakpointTable;
use pump::{EventPump, Pumped};

/// Where the debuggee is stopped. Replaced on every stop; absent while
/// the debuggee runs or after it terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspendedState {
    pub thread: ThreadId,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Breakpoint,
    Terminated,
}

/// Produces a connected transport, optionally with the child process it
/// spawned. Implementations cover launching locally and attaching to a
/// remote debug port.
pub trait Launcher {
    fn launch(&mut self) -> DebugResult<LaunchedVm>;
}

pub struct LaunchedVm {
    pub jdi: Arc<dyn Jdi>,
    pub child: Option<Child>,
}

struct Session {
    jdi: Arc<dyn Jdi>,
    pump: EventPump,
    child: Option<Child>,
    suspended: Option<SuspendedState>,
    terminated: bool,
}

#[derive(Default)]
pub struct Debugger {
    breakpoints: BreakpointTable,
    session: Option<Session>,
}

impl Debugger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a breakpoint by class name and line. Takes effect on the
    /// current session immediately when one is live, and is re-applied on
    /// every later launch.
    pub fn set_breakpoint(&mut self, class: &str, line: u32) -> DebugResult<()> {
        self.set_conditional_breakpoint(class, line, None)
    }

    pub fn set_conditional_breakpoint(
        &mut self,
        class: &str,
        line: u32,
        condition: Option<Condition>,
    ) -> DebugResult<()> {
        self.breakpoints.add(class, line, condition);
        if let Some(session) = &self.session {
            if !session.terminated {
                self.breakpoints.apply_pending(session.jdi.as_ref())?;
            }
        }
        Ok(())
    }

    /// Connects to a debuggee, waits for it to report startup (it stays
    /// suspended), and applies the breakpoint table.
    pub fn launch(&mut self, launcher: &mut dyn Launcher) -> DebugResult<()> {
        self.close();
        let mut vm = launcher.launch()?;
        if let Some(child) = &mut vm.child {
            forward_output(child);
        }
        let pump = EventPump::start(Arc::clone(&vm.jdi));
        let session = Session {
            jdi: vm.jdi,
            pump,
            child: vm.child,
            suspended: None,
            terminated: false,
        };
        wait_until_started(&session)?;
        self.breakpoints.apply_all(session.jdi.as_ref())?;
        if self.breakpoints.is_empty() {
            debug!("no breakpoints registered at launch");
        }
        self.session = Some(session);
        Ok(())
    }

    /// Resumes the debuggee and blocks until it stops again. Class-prepare
    /// events install deferred breakpoints and resume transparently, as do
    /// breakpoints whose condition evaluates to `false`. Fails with
    /// [`DebugError::NotConnected`] once the debuggee has terminated.
    pub fn resume(&mut self) -> DebugResult<StopReason> {
        let session = self.session.as_mut().ok_or(DebugError::NotConnected)?;
        if session.terminated {
            return Err(DebugError::NotConnected);
        }
        session.suspended = None;
        loop {
            session.jdi.resume()?;
            match session.pump.recv() {
                Pumped::Set(set) => {
                    if let Some(reason) = handle_set(session, &mut self.breakpoints, &set)? {
                        return Ok(reason);
                    }
                }
                Pumped::Disconnected => {
                    session.terminated = true;
                    return Ok(StopReason::Terminated);
                }
                Pumped::Error(err) => return Err(err.into()),
            }
        }
    }

    /// The stop the debuggee is currently suspended at, if any.
    pub fn suspended_state(&self) -> Option<&SuspendedState> {
        self.session.as_ref().and_then(|s| s.suspended.as_ref())
    }

    /// Transport handle of the live session, for state inspection layers.
    pub fn jdi(&self) -> Option<Arc<dyn Jdi>> {
        self.session.as_ref().map(|s| Arc::clone(&s.jdi))
    }

    pub fn is_terminated(&self) -> bool {
        self.session.as_ref().map_or(true, |s| s.terminated)
    }

    /// Terminates the debuggee VM, then tears the session down.
    pub fn kill(&mut self) {
        if let Some(session) = &self.session {
            if let Err(err) = session.jdi.exit(0) {
                debug!(error = %err, "exit request failed during kill");
            }
        }
        self.close();
    }

    /// Tears the session down: unblocks and joins the pump, reaps the
    /// child. Idempotent; safe with no live session.
    pub fn close(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.jdi.interrupt_event_read();
        session.pump.join();
        if let Some(mut child) = session.child.take() {
            if let Err(err) = child.kill() {
                debug!(error = %err, "killing debuggee process failed");
            }
            if let Err(err) = child.wait() {
                debug!(error = %err, "reaping debuggee process failed");
            }
        }
        info!("debug session closed");
    }
}

impl Drop for Debugger {
    fn drop(&mut self) {
        self.close();
    }
}

fn wait_until_started(session: &Session) -> DebugResult<()> {
    loop {
        match session.pump.recv() {
            Pumped::Set(set) => {
                if set.events.iter().any(|e| matches!(e, Event::VmStart)) {
                    debug!("debuggee reported startup");
                    return Ok(());
                }
                if set
                    .events
                    .iter()
                    .any(|e| matches!(e, Event::VmDeath | Event::VmDisconnect))
                {
                    return Err(DebugError::Launch("vm died during startup".to_owned()));
                }
            }
            Pumped::Disconnected => {
                return Err(DebugError::Launch("vm disconnected during startup".to_owned()))
            }
            Pumped::Error(err) => return Err(err.into()),
        }
    }
}

/// Processes one event set. `Some` means the control thread should stop
/// resuming and report; `None` resumes the debuggee again.
fn handle_set(
    session: &mut Session,
    breakpoints: &mut BreakpointTable,
    set: &EventSet,
) -> DebugResult<Option<StopReason>> {
    let mut stop = None;
    for event in &set.events {
        match event {
            Event::VmStart => {}
            Event::ClassPrepare { type_id } => {
                let info = session.jdi.type_info(*type_id)?;
                debug!(class = %info.name, "class prepared");
                breakpoints.on_class_prepare(session.jdi.as_ref(), &info);
            }
            Event::Breakpoint { thread_id, location } => {
                let state = SuspendedState {
                    thread: *thread_id,
                    location: location.clone(),
                };
                let class = session.jdi.type_info(location.type_id)?.name;
                let passes = breakpoints
                    .condition_for(&class, location.line)
                    .map(|condition| condition(&state))
                    .unwrap_or(true);
                if passes {
                    session.suspended = Some(state);
                    stop = Some(StopReason::Breakpoint);
                } else {
                    debug!(class = %class, line = location.line, "breakpoint condition false; resuming");
                }
            }
            Event::VmDeath | Event::VmDisconnect => {
                session.terminated = true;
                session.suspended = None;
                return Ok(Some(StopReason::Terminated));
            }
        }
    }
    Ok(stop)
}

/// Forwards the child's stdout/stderr line by line. Best effort; the
/// threads exit when the streams close.
fn forward_output(child: &mut Child) {
    if let Some(stdout) = child.stdout.take() {
        spawn_reader("javert-debuggee-stdout", stdout, false);
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_reader("javert-debuggee-stderr", stderr, true);
    }
}

fn spawn_reader<R: std::io::Read + Send + 'static>(name: &str, stream: R, is_err: bool) {
    let spawned = std::thread::Builder::new().name(name.to_owned()).spawn(move || {
        let reader = std::io::BufReader::new(stream);
        for line in reader.lines() {
            match line {
                Ok(line) if is_err => warn!(target: "debuggee", "{line}"),
                Ok(line) => info!(target: "debuggee", "{line}"),
                Err(_) => break,
            }
        }
    });
    if let Err(err) = spawned {
        warn!(error = %err, "failed to spawn output forwarder");
    }
}
