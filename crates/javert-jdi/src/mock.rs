use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{channel, Receiver, Sender};

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    AccessModifier, Event, EventSet, FieldInfo, FrameInfo, Jdi, JdiError, JdiResult, LoaderId,
    MethodInfo, ObjectId, ReferenceTypeInfo, RequestId, SourceLocation, ThreadId, TypeDescriptor,
    TypeId, TypeTag, Value, VariableInfo,
};

/// A reference type registered with the mock debuggee.
///
/// Fields are public so tests can describe exactly the shape they need;
/// [`MockType::class`] and [`MockType::interface`] fill in unremarkable
/// defaults.
#[derive(Clone, Debug)]
pub struct MockType {
    pub name: String,
    pub tag: TypeTag,
    pub loader: Option<LoaderId>,
    pub prepared: bool,
    pub access: AccessModifier,
    pub source_path: Option<String>,
    /// Lines with executable code, for breakpoint placement.
    pub lines: Vec<u32>,
    pub supertypes: Vec<TypeDescriptor>,
    pub nested: Vec<TypeId>,
    /// All fields visible on the type, inherited ones included.
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    /// Static field values keyed by field name.
    pub static_values: Vec<(String, Value)>,
    pub class_object: Option<ObjectId>,
}

impl MockType {
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: TypeTag::Class,
            loader: None,
            prepared: true,
            access: AccessModifier::Public,
            source_path: None,
            lines: Vec::new(),
            supertypes: Vec::new(),
            nested: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            static_values: Vec::new(),
            class_object: None,
        }
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            tag: TypeTag::Interface,
            ..Self::class(name)
        }
    }

    pub fn array(name: impl Into<String>, component: TypeDescriptor) -> Self {
        Self {
            tag: TypeTag::Array { component },
            ..Self::class(name)
        }
    }
}

/// An object on the mock heap.
#[derive(Clone, Debug, Default)]
pub struct MockObject {
    pub type_id: TypeId,
    /// Instance field values keyed by field name.
    pub fields: Vec<(String, Value)>,
    pub array: Option<Vec<Value>>,
    pub string: Option<String>,
    pub boxed: Option<Value>,
    /// `Some(Err(_))` scripts a failing remote `iterator()` invocation.
    pub iterable: Option<Result<Vec<Value>, String>>,
}

impl MockObject {
    pub fn new(type_id: TypeId) -> Self {
        Self {
            type_id,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug)]
pub struct MockFrame {
    pub location: SourceLocation,
    pub this_object: Option<ObjectId>,
    /// `None` scripts a frame whose method lacks a variable table.
    pub variables: Option<Vec<(VariableInfo, Value)>>,
}

#[derive(Clone, Debug, Default)]
pub struct MockThread {
    pub frames: Vec<MockFrame>,
}

/// One step of scripted debuggee execution, consumed by `resume` calls.
#[derive(Clone, Debug)]
pub enum ScriptAction {
    /// The debuggee loads and prepares a registered type. Delivers a
    /// class-prepare event only if a matching request is pending.
    PrepareClass(TypeId),
    /// Execution reaches a location. Stops only if a breakpoint request is
    /// registered there; otherwise the debuggee runs on.
    HitLocation {
        thread: ThreadId,
        type_id: TypeId,
        method: String,
        line: u32,
    },
    /// The debuggee exits normally.
    Exit,
}

enum Queued {
    Set(EventSet),
    Interrupt,
}

struct State {
    types: HashMap<TypeId, MockType>,
    objects: HashMap<ObjectId, MockObject>,
    threads: HashMap<ThreadId, MockThread>,
    script: VecDeque<ScriptAction>,
    breakpoint_requests: HashMap<(TypeId, u32), RequestId>,
    prepare_requests: HashMap<String, RequestId>,
    next_request: RequestId,
    connected: bool,
    system_loader: Option<LoaderId>,
    iterator_invocations: Vec<ObjectId>,
}

/// Deterministic, in-memory debuggee double.
///
/// Tests register types, heap objects, and thread stacks, script the
/// debuggee's behavior as a sequence of [`ScriptAction`]s, and then drive a
/// real `DebugSession` against it.
pub struct MockJvm {
    state: Mutex<State>,
    events_tx: Mutex<Sender<Queued>>,
    events_rx: Mutex<Receiver<Queued>>,
}

impl MockJvm {
    /// A mock VM whose start event is already queued, as after a successful
    /// launch.
    pub fn new() -> Self {
        let jvm = Self::empty();
        jvm.queue_events(vec![Event::VmStart]);
        jvm
    }

    /// A mock VM that dies before confirming startup.
    pub fn crashed_on_launch() -> Self {
        let jvm = Self::empty();
        jvm.queue_events(vec![Event::VmDeath, Event::VmDisconnect]);
        jvm
    }

    fn empty() -> Self {
        let (tx, rx) = channel();
        Self {
            state: Mutex::new(State {
                types: HashMap::new(),
                objects: HashMap::new(),
                threads: HashMap::new(),
                script: VecDeque::new(),
                breakpoint_requests: HashMap::new(),
                prepare_requests: HashMap::new(),
                next_request: 1,
                connected: true,
                system_loader: None,
                iterator_invocations: Vec::new(),
            }),
            events_tx: Mutex::new(tx),
            events_rx: Mutex::new(rx),
        }
    }

    pub fn add_type(&self, id: TypeId, ty: MockType) {
        self.state.lock().types.insert(id, ty);
    }

    pub fn add_object(&self, id: ObjectId, object: MockObject) {
        self.state.lock().objects.insert(id, object);
    }

    pub fn add_thread(&self, id: ThreadId, thread: MockThread) {
        self.state.lock().threads.insert(id, thread);
    }

    pub fn set_system_loader(&self, loader: Option<LoaderId>) {
        self.state.lock().system_loader = loader;
    }

    pub fn push_script(&self, actions: impl IntoIterator<Item = ScriptAction>) {
        self.state.lock().script.extend(actions);
    }

    /// Number of remote `iterator()` invocations performed so far.
    pub fn iterator_invocations(&self) -> usize {
        self.state.lock().iterator_invocations.len()
    }

    pub fn has_breakpoint_request(&self, type_id: TypeId, line: u32) -> bool {
        self.state
            .lock()
            .breakpoint_requests
            .contains_key(&(type_id, line))
    }

    fn queue_events(&self, events: Vec<Event>) {
        // The receiver lives in self, so the send cannot fail.
        let _ = self.events_tx.lock().send(Queued::Set(EventSet { events }));
    }

    fn with_type<T>(&self, id: TypeId, f: impl FnOnce(&MockType) -> T) -> JdiResult<T> {
        let state = self.state.lock();
        state
            .types
            .get(&id)
            .map(f)
            .ok_or(JdiError::UnknownType(id))
    }

    fn with_object<T>(&self, id: ObjectId, f: impl FnOnce(&MockObject) -> T) -> JdiResult<T> {
        let state = self.state.lock();
        state
            .objects
            .get(&id)
            .map(f)
            .ok_or(JdiError::InvalidObject(id))
    }
}

impl Default for MockJvm {
    fn default() -> Self {
        Self::new()
    }
}

impl Jdi for MockJvm {
    fn reference_types(&self) -> Vec<TypeId> {
        let state = self.state.lock();
        let mut ids: Vec<TypeId> = state.types.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn type_info(&self, id: TypeId) -> JdiResult<ReferenceTypeInfo> {
        self.with_type(id, |ty| ReferenceTypeInfo {
            id,
            name: ty.name.clone(),
            tag: ty.tag.clone(),
            loader: ty.loader,
            is_prepared: ty.prepared,
            access: ty.access,
            source_path: ty.source_path.clone(),
        })
    }

    fn types_by_name(&self, name: &str) -> Vec<TypeId> {
        let state = self.state.lock();
        let mut ids: Vec<TypeId> = state
            .types
            .iter()
            .filter(|(_, ty)| ty.name == name)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn nested_types(&self, id: TypeId) -> JdiResult<Vec<TypeId>> {
        self.with_type(id, |ty| ty.nested.clone())
    }

    fn supertypes(&self, id: TypeId) -> JdiResult<Vec<TypeDescriptor>> {
        self.with_type(id, |ty| ty.supertypes.clone())
    }

    fn fields(&self, id: TypeId) -> JdiResult<Vec<FieldInfo>> {
        self.with_type(id, |ty| ty.fields.clone())
    }

    fn methods(&self, id: TypeId) -> JdiResult<Vec<MethodInfo>> {
        self.with_type(id, |ty| ty.methods.clone())
    }

    fn static_field_values(&self, id: TypeId) -> JdiResult<Vec<(FieldInfo, Value)>> {
        self.with_type(id, |ty| {
            ty.fields
                .iter()
                .filter(|f| f.is_static)
                .filter_map(|f| {
                    ty.static_values
                        .iter()
                        .find(|(name, _)| *name == f.name)
                        .map(|(_, value)| (f.clone(), *value))
                })
                .collect()
        })
    }

    fn line_locations(&self, id: TypeId) -> JdiResult<Vec<u32>> {
        self.with_type(id, |ty| ty.lines.clone())
    }

    fn class_object(&self, id: TypeId) -> JdiResult<Option<ObjectId>> {
        self.with_type(id, |ty| ty.class_object)
    }

    fn system_class_loader(&self) -> Option<LoaderId> {
        self.state.lock().system_loader
    }

    fn object_type(&self, id: ObjectId) -> JdiResult<TypeId> {
        self.with_object(id, |obj| obj.type_id)
    }

    fn instance_field_values(&self, id: ObjectId) -> JdiResult<Vec<(FieldInfo, Value)>> {
        let (type_id, values) =
            self.with_object(id, |obj| (obj.type_id, obj.fields.clone()))?;
        self.with_type(type_id, |ty| {
            ty.fields
                .iter()
                .filter(|f| !f.is_static)
                .map(|f| {
                    let value = values
                        .iter()
                        .find(|(name, _)| *name == f.name)
                        .map(|(_, value)| *value)
                        .unwrap_or(Value::Null);
                    (f.clone(), value)
                })
                .collect()
        })
    }

    fn array_length(&self, id: ObjectId) -> JdiResult<usize> {
        self.with_object(id, |obj| obj.array.as_ref().map(Vec::len))?
            .ok_or_else(|| JdiError::Other(format!("object {id} is not an array")))
    }

    fn array_elements(&self, id: ObjectId) -> JdiResult<Vec<Value>> {
        self.with_object(id, |obj| obj.array.clone())?
            .ok_or_else(|| JdiError::Other(format!("object {id} is not an array")))
    }

    fn string_value(&self, id: ObjectId) -> JdiResult<Option<String>> {
        self.with_object(id, |obj| obj.string.clone())
    }

    fn boxed_value(&self, id: ObjectId) -> JdiResult<Option<Value>> {
        self.with_object(id, |obj| obj.boxed)
    }

    fn iterate_elements(&self, _thread: ThreadId, id: ObjectId) -> JdiResult<Vec<Value>> {
        let scripted = self.with_object(id, |obj| obj.iterable.clone())?;
        let mut state = self.state.lock();
        state.iterator_invocations.push(id);
        match scripted {
            Some(Ok(elements)) => Ok(elements),
            Some(Err(message)) => Err(JdiError::InvocationFailed(message)),
            None => Err(JdiError::InvocationFailed(format!(
                "object {id} has no iterator() method"
            ))),
        }
    }

    fn frame_count(&self, thread: ThreadId) -> JdiResult<usize> {
        let state = self.state.lock();
        state
            .threads
            .get(&thread)
            .map(|t| t.frames.len())
            .ok_or_else(|| JdiError::Other(format!("no mock thread {thread}")))
    }

    fn frame(&self, thread: ThreadId, depth: usize) -> JdiResult<FrameInfo> {
        let state = self.state.lock();
        let frames = &state
            .threads
            .get(&thread)
            .ok_or_else(|| JdiError::Other(format!("no mock thread {thread}")))?
            .frames;
        frames
            .get(depth)
            .map(|f| FrameInfo {
                location: f.location.clone(),
                this_object: f.this_object,
            })
            .ok_or_else(|| JdiError::Other(format!("thread {thread} has no frame {depth}")))
    }

    fn visible_variables(
        &self,
        thread: ThreadId,
        depth: usize,
    ) -> JdiResult<Vec<(VariableInfo, Value)>> {
        let state = self.state.lock();
        let frames = &state
            .threads
            .get(&thread)
            .ok_or_else(|| JdiError::Other(format!("no mock thread {thread}")))?
            .frames;
        let frame = frames
            .get(depth)
            .ok_or_else(|| JdiError::Other(format!("thread {thread} has no frame {depth}")))?;
        frame
            .variables
            .clone()
            .ok_or(JdiError::AbsentInformation)
    }

    fn set_breakpoint(&self, type_id: TypeId, line: u32) -> JdiResult<RequestId> {
        let mut state = self.state.lock();
        let ty = state
            .types
            .get(&type_id)
            .ok_or(JdiError::UnknownType(type_id))?;
        if !ty.lines.contains(&line) {
            return Err(JdiError::InvalidLocation { type_id, line });
        }
        if let Some(existing) = state.breakpoint_requests.get(&(type_id, line)) {
            return Ok(*existing);
        }
        let id = state.next_request;
        state.next_request += 1;
        state.breakpoint_requests.insert((type_id, line), id);
        Ok(id)
    }

    fn request_class_prepare(&self, class_name: &str) -> JdiResult<RequestId> {
        let mut state = self.state.lock();
        let id = state.next_request;
        state.next_request += 1;
        state.prepare_requests.insert(class_name.to_string(), id);
        Ok(id)
    }

    fn resume(&self) -> JdiResult<()> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(JdiError::Disconnected);
        }

        while let Some(action) = state.script.pop_front() {
            match action {
                ScriptAction::PrepareClass(type_id) => {
                    let name = match state.types.get_mut(&type_id) {
                        Some(ty) => {
                            ty.prepared = true;
                            ty.name.clone()
                        }
                        None => continue,
                    };
                    if state.prepare_requests.remove(&name).is_some() {
                        drop(state);
                        self.queue_events(vec![Event::ClassPrepare { type_id }]);
                        return Ok(());
                    }
                    debug!(class = %name, "mock class prepared without a pending request");
                }
                ScriptAction::HitLocation {
                    thread,
                    type_id,
                    method,
                    line,
                } => {
                    if state.breakpoint_requests.contains_key(&(type_id, line)) {
                        drop(state);
                        self.queue_events(vec![Event::Breakpoint {
                            thread_id: thread,
                            location: SourceLocation {
                                type_id,
                                method,
                                line,
                            },
                        }]);
                        return Ok(());
                    }
                }
                ScriptAction::Exit => break,
            }
        }

        state.connected = false;
        drop(state);
        self.queue_events(vec![Event::VmDeath, Event::VmDisconnect]);
        Ok(())
    }

    fn next_event_set(&self) -> JdiResult<EventSet> {
        let rx = self.events_rx.lock();
        match rx.recv() {
            Ok(Queued::Set(set)) => Ok(set),
            Ok(Queued::Interrupt) => Err(JdiError::Interrupted),
            Err(_) => Err(JdiError::Disconnected),
        }
    }

    fn interrupt_event_read(&self) {
        let _ = self.events_tx.lock().send(Queued::Interrupt);
    }

    fn exit(&self, _code: i32) -> JdiResult<()> {
        let mut state = self.state.lock();
        if !state.connected {
            return Ok(());
        }
        state.connected = false;
        drop(state);
        self.queue_events(vec![Event::VmDeath, Event::VmDisconnect]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoints_are_idempotent_per_location() {
        let jvm = MockJvm::new();
        let mut ty = MockType::class("Main");
        ty.lines = vec![3];
        jvm.add_type(1, ty);

        let first = jvm.set_breakpoint(1, 3).unwrap();
        let second = jvm.set_breakpoint(1, 3).unwrap();
        assert_eq!(first, second);

        assert!(matches!(
            jvm.set_breakpoint(1, 99),
            Err(JdiError::InvalidLocation { .. })
        ));
    }

    #[test]
    fn scripted_run_without_breakpoints_ends_in_disconnect() {
        let jvm = MockJvm::new();
        let mut ty = MockType::class("Main");
        ty.lines = vec![3];
        jvm.add_type(1, ty);
        jvm.push_script([ScriptAction::HitLocation {
            thread: 1,
            type_id: 1,
            method: "main".into(),
            line: 3,
        }]);

        assert_eq!(
            jvm.next_event_set().unwrap().events,
            vec![Event::VmStart]
        );
        jvm.resume().unwrap();
        assert_eq!(
            jvm.next_event_set().unwrap().events,
            vec![Event::VmDeath, Event::VmDisconnect]
        );
    }

    #[test]
    fn interrupt_unblocks_event_read() {
        let jvm = std::sync::Arc::new(MockJvm::new());
        // Drain the start event first.
        jvm.next_event_set().unwrap();

        let reader = std::sync::Arc::clone(&jvm);
        let handle = std::thread::spawn(move || reader.next_event_set());
        std::thread::sleep(std::time::Duration::from_millis(20));
        jvm.interrupt_event_read();
        assert!(matches!(handle.join().unwrap(), Err(JdiError::Interrupted)));
    }
}
