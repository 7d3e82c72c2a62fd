//! Debug-transport facade for javert.
//!
//! The mapping layers never talk to a wire protocol directly; they see the
//! suspended JVM through the [`Jdi`] trait, a narrow remote API modeled on
//! what the Java Debug Interface exposes. All inspection results are plain
//! owned values keyed by debuggee-assigned ids, so nothing in the higher
//! layers holds a remote handle that a method invocation could invalidate.
//!
//! [`MockJvm`] is a deterministic, in-memory debuggee used by the test
//! suites; the wire-level client lives outside this repository.

mod mock;

use thiserror::Error;

pub use mock::{MockFrame, MockJvm, MockObject, MockThread, MockType, ScriptAction};

pub type ObjectId = u64;
pub type TypeId = u64;
pub type ThreadId = u64;
pub type LoaderId = u64;
pub type RequestId = u32;

/// A mirrored debuggee value.
///
/// The set of cases is fixed by the platform specification: a value observed
/// through the transport is a primitive, an object reference, or null.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// UTF-16 code unit, as the transport reports `char` values.
    Char(u16),
    Object(ObjectId),
}

impl Value {
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Self::Object(id) => Some(*id),
            _ => None,
        }
    }
}

/// Names of the primitive types, used for array component classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Char => "char",
        }
    }
}

/// A static type as referenced by fields, variables, and array components.
///
/// `Unprepared` covers types the debuggee knows only by name so far; loading
/// may never happen, and identity derivation must not confuse them with a
/// loaded type of the same name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeDescriptor {
    Primitive(PrimitiveKind),
    Reference(TypeId),
    Unprepared(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeTag {
    Class,
    Interface,
    Array { component: TypeDescriptor },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessModifier {
    Public,
    Protected,
    Private,
    PackagePrivate,
}

impl AccessModifier {
    pub fn name(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Protected => "protected",
            Self::Private => "private",
            Self::PackagePrivate => "package-private",
        }
    }
}

/// Metadata of one loaded reference type.
#[derive(Clone, Debug)]
pub struct ReferenceTypeInfo {
    pub id: TypeId,
    /// Binary name as compiled, e.g. `pkg.Outer$1Inner`.
    pub name: String,
    pub tag: TypeTag,
    /// `None` for the bootstrap loader.
    pub loader: Option<LoaderId>,
    pub is_prepared: bool,
    pub access: AccessModifier,
    pub source_path: Option<String>,
}

impl ReferenceTypeInfo {
    pub fn is_public(&self) -> bool {
        matches!(self.access, AccessModifier::Public)
    }
}

/// A field as declared by a reference type. `declaring_type` may differ from
/// the type it was looked up through, since lookups include inherited fields.
#[derive(Clone, Debug)]
pub struct FieldInfo {
    pub name: String,
    pub declaring_type: TypeId,
    pub declared_type: TypeDescriptor,
    pub is_static: bool,
    pub access: AccessModifier,
    /// Declaration line, when debug information is present.
    pub line: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct MethodInfo {
    pub name: String,
    pub declaring_type: TypeId,
    pub access: AccessModifier,
    pub source_path: Option<String>,
    /// First executable line, when debug information is present.
    pub line: Option<u32>,
    pub variables: Vec<VariableInfo>,
}

/// A local variable declaration inside a method.
#[derive(Clone, Debug)]
pub struct VariableInfo {
    pub name: String,
    pub declared_type: TypeDescriptor,
    /// Code index where the variable's scope starts; disambiguates blocks
    /// reusing the same name.
    pub scope_start: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    pub type_id: TypeId,
    pub method: String,
    pub line: u32,
}

/// One stack frame, fetched fresh on every access.
#[derive(Clone, Debug)]
pub struct FrameInfo {
    pub location: SourceLocation,
    pub this_object: Option<ObjectId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    VmStart,
    ClassPrepare { type_id: TypeId },
    Breakpoint { thread_id: ThreadId, location: SourceLocation },
    VmDeath,
    VmDisconnect,
}

/// Events delivered together; the debuggee is suspended while a set is
/// being handled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventSet {
    pub events: Vec<Event>,
}

#[derive(Debug, Error)]
pub enum JdiError {
    #[error("debuggee is not connected")]
    NotConnected,
    #[error("debuggee disconnected")]
    Disconnected,
    #[error("event read interrupted")]
    Interrupted,
    #[error("no debug information available")]
    AbsentInformation,
    #[error("invalid object id {0}")]
    InvalidObject(ObjectId),
    #[error("unknown type id {0}")]
    UnknownType(TypeId),
    #[error("no code at line {line} of type {type_id}")]
    InvalidLocation { type_id: TypeId, line: u32 },
    #[error("remote invocation failed: {0}")]
    InvocationFailed(String),
    #[error("{0}")]
    Other(String),
}

pub type JdiResult<T> = Result<T, JdiError>;

/// The narrow remote API over a debuggee VM.
///
/// Methods take `&self`; implementations synchronize internally so a session
/// can share one client between its control thread and the event-pump
/// thread. Every query copies data out of the debuggee: callers own plain
/// values, never remote handles.
pub trait Jdi: Send + Sync {
    // ---- type universe ----

    /// Ids of all reference types the VM has loaded (prepared or not fully).
    fn reference_types(&self) -> Vec<TypeId>;
    fn type_info(&self, id: TypeId) -> JdiResult<ReferenceTypeInfo>;
    /// Loaded types with the given binary name (one per class loader).
    fn types_by_name(&self, name: &str) -> Vec<TypeId>;
    /// Types declared directly inside the given type.
    fn nested_types(&self, id: TypeId) -> JdiResult<Vec<TypeId>>;
    /// Direct supertypes: superclass plus directly implemented interfaces.
    fn supertypes(&self, id: TypeId) -> JdiResult<Vec<TypeDescriptor>>;
    /// All fields visible on the type, including inherited ones.
    fn fields(&self, id: TypeId) -> JdiResult<Vec<FieldInfo>>;
    fn methods(&self, id: TypeId) -> JdiResult<Vec<MethodInfo>>;
    fn static_field_values(&self, id: TypeId) -> JdiResult<Vec<(FieldInfo, Value)>>;
    /// Lines with executable code, when debug information is present.
    fn line_locations(&self, id: TypeId) -> JdiResult<Vec<u32>>;
    /// The `java.lang.Class` instance mirroring this type, when one exists.
    fn class_object(&self, id: TypeId) -> JdiResult<Option<ObjectId>>;
    /// Id of the system class loader, when the VM exposes one.
    fn system_class_loader(&self) -> Option<LoaderId>;

    // ---- object inspection ----

    fn object_type(&self, id: ObjectId) -> JdiResult<TypeId>;
    /// Instance field values, including inherited fields.
    fn instance_field_values(&self, id: ObjectId) -> JdiResult<Vec<(FieldInfo, Value)>>;
    fn array_length(&self, id: ObjectId) -> JdiResult<usize>;
    fn array_elements(&self, id: ObjectId) -> JdiResult<Vec<Value>>;
    /// The string value, if the object is a `java.lang.String`.
    fn string_value(&self, id: ObjectId) -> JdiResult<Option<String>>;
    /// The wrapped primitive, if the object is a boxed-primitive wrapper.
    fn boxed_value(&self, id: ObjectId) -> JdiResult<Option<Value>>;
    /// Drains the object's `iterator()` remotely on the given thread.
    ///
    /// This resumes the thread internally and therefore invalidates any
    /// cached frame state for it; callers must re-fetch frames afterwards.
    fn iterate_elements(&self, thread: ThreadId, id: ObjectId) -> JdiResult<Vec<Value>>;

    // ---- stack inspection ----

    fn frame_count(&self, thread: ThreadId) -> JdiResult<usize>;
    fn frame(&self, thread: ThreadId, depth: usize) -> JdiResult<FrameInfo>;
    /// Visible variables with their current values; fails with
    /// [`JdiError::AbsentInformation`] when the frame's method was compiled
    /// without a variable table.
    fn visible_variables(
        &self,
        thread: ThreadId,
        depth: usize,
    ) -> JdiResult<Vec<(VariableInfo, Value)>>;

    // ---- event requests and execution control ----

    fn set_breakpoint(&self, type_id: TypeId, line: u32) -> JdiResult<RequestId>;
    /// Requests a single class-prepare notification for the named class.
    fn request_class_prepare(&self, class_name: &str) -> JdiResult<RequestId>;
    fn resume(&self) -> JdiResult<()>;
    /// Blocks until the next event set arrives.
    fn next_event_set(&self) -> JdiResult<EventSet>;
    /// Unblocks a pending [`Jdi::next_event_set`] call with
    /// [`JdiError::Interrupted`]. Used during teardown.
    fn interrupt_event_read(&self);
    /// Terminates the debuggee VM.
    fn exit(&self, code: i32) -> JdiResult<()>;
}
