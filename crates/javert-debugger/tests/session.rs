//! Session lifecycle driven end to end against the in-memory debuggee.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use javert_debugger::{DebugError, DebugResult, Debugger, LaunchedVm, Launcher, StopReason};
use javert_jdi::{Jdi, MockJvm, MockType, ScriptAction};

struct MockLauncher(Arc<MockJvm>);

impl Launcher for MockLauncher {
    fn launch(&mut self) -> DebugResult<LaunchedVm> {
        Ok(LaunchedVm {
            jdi: Arc::clone(&self.0) as Arc<dyn Jdi>,
            child: None,
        })
    }
}

fn main_class(prepared: bool) -> MockType {
    let mut ty = MockType::class("pkg.Main");
    ty.prepared = prepared;
    ty.lines = vec![10, 11, 12];
    ty
}

fn hit(line: u32) -> ScriptAction {
    ScriptAction::HitLocation {
        thread: 1,
        type_id: 1,
        method: "run".to_owned(),
        line,
    }
}

#[test]
fn stops_at_breakpoint_in_loaded_class() {
    let jvm = Arc::new(MockJvm::new());
    jvm.add_type(1, main_class(true));
    jvm.push_script([hit(11), ScriptAction::Exit]);

    let mut debugger = Debugger::new();
    debugger.set_breakpoint("pkg.Main", 11).unwrap();
    debugger.launch(&mut MockLauncher(Arc::clone(&jvm))).unwrap();

    assert_eq!(debugger.resume().unwrap(), StopReason::Breakpoint);
    let state = debugger.suspended_state().unwrap();
    assert_eq!(state.thread, 1);
    assert_eq!(state.location.line, 11);
}

#[test]
fn deferred_breakpoint_fires_once_class_is_prepared() {
    let jvm = Arc::new(MockJvm::new());
    jvm.add_type(1, main_class(false));
    jvm.push_script([ScriptAction::PrepareClass(1), hit(10), ScriptAction::Exit]);

    let mut debugger = Debugger::new();
    debugger.set_breakpoint("pkg.Main", 10).unwrap();
    debugger.launch(&mut MockLauncher(Arc::clone(&jvm))).unwrap();

    // Not applied yet: the class is not loaded.
    assert!(!jvm.has_breakpoint_request(1, 10));

    // One resume call rides through the class-prepare stop transparently
    // and comes back suspended at the breakpoint.
    assert_eq!(debugger.resume().unwrap(), StopReason::Breakpoint);
    assert!(jvm.has_breakpoint_request(1, 10));
    assert_eq!(debugger.suspended_state().unwrap().location.line, 10);
}

#[test]
fn false_condition_resumes_transparently() {
    let jvm = Arc::new(MockJvm::new());
    jvm.add_type(1, main_class(true));
    jvm.push_script([hit(11), hit(11), ScriptAction::Exit]);

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let mut debugger = Debugger::new();
    debugger
        .set_conditional_breakpoint(
            "pkg.Main",
            11,
            Some(Box::new(move |_state| {
                counter.fetch_add(1, Ordering::SeqCst) == 1
            })),
        )
        .unwrap();
    debugger.launch(&mut MockLauncher(Arc::clone(&jvm))).unwrap();

    assert_eq!(debugger.resume().unwrap(), StopReason::Breakpoint);
    // The condition saw both hits; only the second one surfaced.
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn reregistered_breakpoint_uses_the_new_condition() {
    let jvm = Arc::new(MockJvm::new());
    jvm.add_type(1, main_class(true));
    jvm.push_script([hit(11), ScriptAction::Exit]);

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let mut debugger = Debugger::new();
    debugger.set_breakpoint("pkg.Main", 11).unwrap();
    // Re-registering the same location replaces the entry; the new
    // condition must be the one consulted on a hit.
    debugger
        .set_conditional_breakpoint(
            "pkg.Main",
            11,
            Some(Box::new(move |_state| {
                counter.fetch_add(1, Ordering::SeqCst);
                false
            })),
        )
        .unwrap();
    debugger.launch(&mut MockLauncher(Arc::clone(&jvm))).unwrap();

    assert_eq!(debugger.resume().unwrap(), StopReason::Terminated);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn resume_after_termination_fails_with_not_connected() {
    let jvm = Arc::new(MockJvm::new());
    jvm.add_type(1, main_class(true));
    jvm.push_script([ScriptAction::Exit]);

    let mut debugger = Debugger::new();
    debugger.launch(&mut MockLauncher(Arc::clone(&jvm))).unwrap();

    assert_eq!(debugger.resume().unwrap(), StopReason::Terminated);
    assert!(matches!(
        debugger.resume().unwrap_err(),
        DebugError::NotConnected
    ));
}

#[test]
fn run_to_completion_without_breakpoints() {
    let jvm = Arc::new(MockJvm::new());
    jvm.add_type(1, main_class(true));
    jvm.push_script([hit(10), ScriptAction::Exit]);

    let mut debugger = Debugger::new();
    debugger.launch(&mut MockLauncher(Arc::clone(&jvm))).unwrap();

    assert_eq!(debugger.resume().unwrap(), StopReason::Terminated);
    assert!(debugger.is_terminated());
    assert!(debugger.suspended_state().is_none());
}

#[test]
fn breakpoint_on_missing_line_is_reported_not_fatal() {
    let jvm = Arc::new(MockJvm::new());
    jvm.add_type(1, main_class(true));
    jvm.push_script([hit(10), ScriptAction::Exit]);

    let mut debugger = Debugger::new();
    // Line 99 has no code; the entry is logged and left unresolved.
    debugger.set_breakpoint("pkg.Main", 99).unwrap();
    debugger.launch(&mut MockLauncher(Arc::clone(&jvm))).unwrap();

    assert!(!jvm.has_breakpoint_request(1, 99));
    assert_eq!(debugger.resume().unwrap(), StopReason::Terminated);
}

#[test]
fn close_is_idempotent() {
    let jvm = Arc::new(MockJvm::new());
    jvm.add_type(1, main_class(true));

    let mut debugger = Debugger::new();
    debugger.launch(&mut MockLauncher(Arc::clone(&jvm))).unwrap();
    debugger.close();
    debugger.close();
    assert!(debugger.is_terminated());
    assert!(debugger.resume().is_err() || debugger.resume().unwrap() == StopReason::Terminated);
}

#[test]
fn crash_during_startup_surfaces_as_launch_error() {
    let jvm = Arc::new(MockJvm::crashed_on_launch());
    let mut debugger = Debugger::new();
    let err = debugger
        .launch(&mut MockLauncher(Arc::clone(&jvm)))
        .unwrap_err();
    assert!(matches!(err, DebugError::Launch(_)));
}
