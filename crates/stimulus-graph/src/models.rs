//! Shared typed models used across parsing, linking, and the query surface.
//!
//! Everything here is plain data: the parser produces `SourceFile`s, the
//! linker and resolver derive `AncestorChain`s, and the merger publishes
//! `ControllerDefinition`s.  Failure conditions are modelled as variants on
//! these types rather than as errors.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

// ---------------------------------------------------------------------------
// 1. Locations and identities
// ---------------------------------------------------------------------------

/// Byte and line/column range of a syntax node.  Lines are 1-based, columns
/// are 0-based byte offsets within the line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

/// Identity of a class declaration: owning file plus the byte offset of the
/// class node.  Used as the lookup key for every cross-file reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClassKey {
    pub path: PathBuf,
    pub offset: usize,
}

impl ClassKey {
    pub fn new(path: impl Into<PathBuf>, offset: usize) -> Self {
        Self {
            path: path.into(),
            offset,
        }
    }
}

/// Whether a file belongs to the host application or an installed package.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileOrigin {
    Application,
    Package { name: String },
}

impl FileOrigin {
    pub fn is_package(&self) -> bool {
        matches!(self, FileOrigin::Package { .. })
    }

    pub fn package_name(&self) -> Option<&str> {
        match self {
            FileOrigin::Package { name } => Some(name),
            FileOrigin::Application => None,
        }
    }
}

/// Grammar used to parse a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLanguage {
    JavaScript,
    TypeScript,
    Tsx,
}

// ---------------------------------------------------------------------------
// 2. Expressions
// ---------------------------------------------------------------------------

/// The subset of ECMAScript expressions the resolver and classifier need.
/// Anything else is kept as `Unsupported` with its grammar node kind.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Expression {
    pub span: Span,
    pub kind: ExpressionKind,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ExpressionKind {
    Identifier(String),
    Member {
        object: Box<Expression>,
        property: String,
    },
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
    Array(Vec<Expression>),
    Object(Vec<ObjectEntry>),
    Call(Box<CallExpression>),
    Unsupported(String),
}

impl Expression {
    pub fn new(span: Span, kind: ExpressionKind) -> Self {
        Self { span, kind }
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            ExpressionKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            ExpressionKind::String(value) => Some(value),
            _ => None,
        }
    }

    /// Source-like rendering for identifiers and member chains, used when
    /// reporting an unresolved reference.
    pub fn display_name(&self) -> String {
        match &self.kind {
            ExpressionKind::Identifier(name) => name.clone(),
            ExpressionKind::Member { object, property } => {
                format!("{}.{}", object.display_name(), property)
            }
            ExpressionKind::String(value) => format!("{value:?}"),
            ExpressionKind::Unsupported(kind) => format!("<{kind}>"),
            ExpressionKind::Call(call) => format!("{}(...)", call.callee.display_name()),
            _ => "<literal>".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectEntry {
    Property {
        key: String,
        value: Expression,
        span: Span,
    },
    Shorthand {
        name: String,
        span: Span,
    },
    Spread {
        span: Span,
    },
    Computed {
        span: Span,
    },
}

impl ObjectEntry {
    pub fn span(&self) -> Span {
        match self {
            ObjectEntry::Property { span, .. }
            | ObjectEntry::Shorthand { span, .. }
            | ObjectEntry::Spread { span }
            | ObjectEntry::Computed { span } => *span,
        }
    }
}

/// A call expression; only top-level calls are recorded per file.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CallExpression {
    pub callee: Expression,
    pub arguments: Vec<Expression>,
    pub span: Span,
}

// ---------------------------------------------------------------------------
// 3. Capabilities declared on a class
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Targets,
    Values,
    Classes,
    Outlets,
    Actions,
}

impl CapabilityKind {
    /// Static property name that declares this capability, if any.
    pub fn property_name(self) -> Option<&'static str> {
        match self {
            CapabilityKind::Targets => Some("targets"),
            CapabilityKind::Values => Some("values"),
            CapabilityKind::Classes => Some("classes"),
            CapabilityKind::Outlets => Some("outlets"),
            CapabilityKind::Actions => None,
        }
    }

    pub fn from_property_name(name: &str) -> Option<Self> {
        match name {
            "targets" => Some(CapabilityKind::Targets),
            "values" => Some(CapabilityKind::Values),
            "classes" => Some(CapabilityKind::Classes),
            "outlets" => Some(CapabilityKind::Outlets),
            _ => None,
        }
    }
}

/// Declared kind of a typed configuration (value) entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ValueKind {
    Array,
    Boolean,
    Number,
    Object,
    String,
}

impl ValueKind {
    pub fn from_constructor(name: &str) -> Option<Self> {
        match name {
            "Array" => Some(ValueKind::Array),
            "Boolean" => Some(ValueKind::Boolean),
            "Number" => Some(ValueKind::Number),
            "Object" => Some(ValueKind::Object),
            "String" => Some(ValueKind::String),
            _ => None,
        }
    }

    /// Default used when a declaration omits one.
    pub fn default_value(self) -> serde_json::Value {
        match self {
            ValueKind::Array => serde_json::Value::Array(Vec::new()),
            ValueKind::Boolean => serde_json::Value::Bool(false),
            ValueKind::Number => serde_json::Value::from(0),
            ValueKind::Object => serde_json::Value::Object(serde_json::Map::new()),
            ValueKind::String => serde_json::Value::String(String::new()),
        }
    }

    pub fn accepts(self, value: &serde_json::Value) -> bool {
        match self {
            ValueKind::Array => value.is_array(),
            ValueKind::Boolean => value.is_boolean(),
            ValueKind::Number => value.is_number(),
            ValueKind::Object => value.is_object(),
            ValueKind::String => value.is_string(),
        }
    }
}

/// A named entry of a flat capability list (target, class, outlet, action).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NamedEntry {
    pub name: String,
    pub span: Span,
}

/// One typed configuration entry as declared on a class.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValueDefinition {
    pub name: String,
    /// `None` when the declaration is malformed; see `issue`.
    pub kind: Option<ValueKind>,
    pub default: serde_json::Value,
    /// True when the declaration spelled out a default instead of relying on
    /// the kind default.
    pub explicit_default: bool,
    pub span: Span,
    pub issue: Option<DeclarationIssue>,
}

/// A capability declaration whose shape did not match any known form.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeclarationIssue {
    pub capability: CapabilityKind,
    /// Entry name when the problem is confined to one entry.
    pub entry: Option<String>,
    pub problem: IssueKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    /// The property value is not an array literal.
    NotAList,
    /// The property value is not an object literal.
    NotAnObject,
    /// An array element is not a string literal.
    NonStringEntry { index: usize },
    UnknownValueKind { name: String },
    MissingValueType,
    UnsupportedValueForm,
    ComputedKey,
    Spread,
    NonLiteralDefault,
    DefaultTypeMismatch { expected: ValueKind },
}

/// Capabilities declared directly on one class.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LocalCapabilities {
    pub targets: Vec<NamedEntry>,
    pub classes: Vec<NamedEntry>,
    pub outlets: Vec<NamedEntry>,
    pub values: IndexMap<String, ValueDefinition>,
    pub actions: Vec<NamedEntry>,
}

impl LocalCapabilities {
    pub fn list(&self, kind: CapabilityKind) -> &[NamedEntry] {
        match kind {
            CapabilityKind::Targets => &self.targets,
            CapabilityKind::Classes => &self.classes,
            CapabilityKind::Outlets => &self.outlets,
            CapabilityKind::Actions => &self.actions,
            CapabilityKind::Values => &[],
        }
    }

    pub fn list_mut(&mut self, kind: CapabilityKind) -> Option<&mut Vec<NamedEntry>> {
        match kind {
            CapabilityKind::Targets => Some(&mut self.targets),
            CapabilityKind::Classes => Some(&mut self.classes),
            CapabilityKind::Outlets => Some(&mut self.outlets),
            CapabilityKind::Actions => Some(&mut self.actions),
            CapabilityKind::Values => None,
        }
    }
}

// ---------------------------------------------------------------------------
// 4. Declarations
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Method,
    Getter,
    Setter,
    Constructor,
    Field,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClassMember {
    pub name: String,
    pub kind: MemberKind,
    pub is_static: bool,
    pub is_private: bool,
    pub span: Span,
}

/// A class declared in a source file.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassDeclaration {
    pub key: ClassKey,
    pub name: Option<String>,
    pub superclass: Option<Expression>,
    pub span: Span,
    pub members: Vec<ClassMember>,
    pub capabilities: LocalCapabilities,
    pub issues: Vec<DeclarationIssue>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ImportedName {
    Default,
    Named(String),
    Namespace,
}

impl ImportedName {
    /// Export name this binding reads, `None` for namespace bindings.
    pub fn export_name(&self) -> Option<&str> {
        match self {
            ImportedName::Default => Some("default"),
            ImportedName::Named(name) => Some(name),
            ImportedName::Namespace => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImportBinding {
    pub local: String,
    pub imported: ImportedName,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImportDeclaration {
    pub source: String,
    pub bindings: Vec<ImportBinding>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportTarget {
    /// A class declared in the same file.
    Class { offset: usize },
    /// A local binding (class name, import, or anything else).
    Binding { local: String },
    /// `export { name as exported } from "source"`.
    ReExport {
        source: String,
        imported: ImportedName,
    },
    /// `export * from "source"`; only consulted for named lookups.
    Star { source: String },
    /// A function, literal, or other value that can never be a class.
    NotAClass,
    /// An expression too dynamic to follow, such as a mixin call.
    Unsupported { node_kind: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExportDeclaration {
    /// Exported name, `default` for default exports, `*` for star re-exports.
    pub exported: String,
    pub target: ExportTarget,
    pub span: Span,
}

impl ExportDeclaration {
    pub fn source(&self) -> Option<&str> {
        match &self.target {
            ExportTarget::ReExport { source, .. } | ExportTarget::Star { source } => Some(source),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

/// One parsed file.  Re-created wholesale on every reparse.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub origin: FileOrigin,
    pub language: SourceLanguage,
    pub content_hash: String,
    #[serde(skip)]
    pub text: String,
    pub parse_errors: Vec<ParseError>,
    pub classes: Vec<ClassDeclaration>,
    pub imports: Vec<ImportDeclaration>,
    pub exports: Vec<ExportDeclaration>,
    /// Top-level call expressions, consulted by registration detection.
    pub calls: Vec<CallExpression>,
}

impl SourceFile {
    pub fn has_errors(&self) -> bool {
        !self.parse_errors.is_empty()
    }

    pub fn is_package_file(&self) -> bool {
        self.origin.is_package()
    }

    pub fn class_at(&self, offset: usize) -> Option<&ClassDeclaration> {
        self.classes.iter().find(|class| class.key.offset == offset)
    }

    pub fn class_named(&self, name: &str) -> Option<&ClassDeclaration> {
        self.classes
            .iter()
            .find(|class| class.name.as_deref() == Some(name))
    }

    pub fn import_binding(&self, local: &str) -> Option<(&ImportDeclaration, &ImportBinding)> {
        self.imports.iter().find_map(|import| {
            import
                .bindings
                .iter()
                .find(|binding| binding.local == local)
                .map(|binding| (import, binding))
        })
    }

    /// Every module specifier this file depends on, in source order.
    pub fn specifiers(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.imports
            .iter()
            .map(|import| import.source.as_str())
            .chain(self.exports.iter().filter_map(|export| export.source()))
            .filter(|specifier| seen.insert(*specifier))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// 5. Resolution results
// ---------------------------------------------------------------------------

/// Why an import, export, or superclass reference could not be traced.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    MissingFile,
    MissingPackage,
    NoEntryPoint,
    MissingExport,
    /// A framework package binding other than the root class.
    FrameworkPackage,
    UnknownBinding,
    NotAClass,
    UnsupportedExpression,
    DepthLimit,
    Cycle,
}

/// Outcome of resolving one module specifier from one file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ModuleResolution {
    Resolved(PathBuf),
    /// One of the configured framework packages; never followed on disk.
    Framework,
    Unresolved(UnresolvedReason),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnresolvedImport {
    pub file: PathBuf,
    pub specifier: String,
    pub reason: UnresolvedReason,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainTermination {
    /// Reached the framework's root base class.
    Root,
    /// Ended at a class that extends nothing.
    Detached,
    /// A reference could not be traced any further.
    OpenEnded {
        reason: UnresolvedReason,
        reference: String,
    },
    /// `repeated` was reached a second time.
    Cycle { repeated: ClassKey },
}

/// Ordered superclasses of one class, nearest first, excluding the class.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AncestorChain {
    pub class: ClassKey,
    pub ancestors: Vec<ClassKey>,
    pub termination: ChainTermination,
    /// Every file consulted while building the chain, including re-export
    /// hops.  Drives invalidation on refresh.
    pub visited_files: BTreeSet<PathBuf>,
    /// Files on the chain (the class's own included) that failed to parse.
    pub errored_files: BTreeSet<PathBuf>,
}

impl AncestorChain {
    pub fn is_complete(&self) -> bool {
        matches!(self.termination, ChainTermination::Root)
    }

    pub fn is_open_ended(&self) -> bool {
        matches!(self.termination, ChainTermination::OpenEnded { .. })
    }

    pub fn is_cyclic(&self) -> bool {
        matches!(self.termination, ChainTermination::Cycle { .. })
    }
}

// ---------------------------------------------------------------------------
// 6. Published controller model
// ---------------------------------------------------------------------------

/// A list capability entry after merging, tagged with where it came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InheritedEntry {
    pub name: String,
    pub declared_in: ClassKey,
    pub span: Span,
    pub local: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CapabilitySet {
    pub local: Vec<NamedEntry>,
    pub effective: Vec<InheritedEntry>,
}

impl CapabilitySet {
    pub fn local_names(&self) -> Vec<&str> {
        self.local.iter().map(|entry| entry.name.as_str()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.effective.iter().map(|entry| entry.name.as_str()).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InheritedValue {
    pub definition: ValueDefinition,
    pub declared_in: ClassKey,
    pub local: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ValueSet {
    pub local: IndexMap<String, ValueDefinition>,
    pub effective: IndexMap<String, InheritedValue>,
}

impl ValueSet {
    pub fn names(&self) -> Vec<&str> {
        self.effective.keys().map(String::as_str).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DefinitionIssue {
    ParseError { path: PathBuf },
    Cycle { repeated: ClassKey },
    IdentifierCollision { other: PathBuf },
}

/// The published model of one controller class.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ControllerDefinition {
    pub identifier: String,
    pub path: PathBuf,
    pub class: ClassKey,
    pub class_name: Option<String>,
    pub origin: FileOrigin,
    pub ancestors: Vec<ClassKey>,
    pub termination: ChainTermination,
    pub may_inherit_unknown_capabilities: bool,
    pub has_errors: bool,
    pub issues: Vec<DefinitionIssue>,
    pub targets: CapabilitySet,
    pub classes: CapabilitySet,
    pub outlets: CapabilitySet,
    pub actions: CapabilitySet,
    pub values: ValueSet,
}

impl ControllerDefinition {
    pub fn target_names(&self) -> Vec<&str> {
        self.targets.names()
    }

    pub fn class_names(&self) -> Vec<&str> {
        self.classes.names()
    }

    pub fn outlet_names(&self) -> Vec<&str> {
        self.outlets.names()
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.actions.names()
    }

    pub fn value_names(&self) -> Vec<&str> {
        self.values.names()
    }

    pub fn capability(&self, kind: CapabilityKind) -> Option<&CapabilitySet> {
        match kind {
            CapabilityKind::Targets => Some(&self.targets),
            CapabilityKind::Classes => Some(&self.classes),
            CapabilityKind::Outlets => Some(&self.outlets),
            CapabilityKind::Actions => Some(&self.actions),
            CapabilityKind::Values => None,
        }
    }

    pub fn is_package_controller(&self) -> bool {
        self.origin.is_package()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PackageExport {
    pub exported: String,
    pub class: ClassKey,
    pub identifier: String,
}

/// An installed dependency that plausibly exposes controllers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DetectedPackage {
    pub name: String,
    pub root: PathBuf,
    pub version: Option<String>,
    pub entry_point: Option<PathBuf>,
    pub controller_exports: Vec<PackageExport>,
    /// Package files loaded into the graph.
    pub files: Vec<PathBuf>,
}

impl DetectedPackage {
    pub fn has_controllers(&self) -> bool {
        !self.controller_exports.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationKind {
    Register,
    EagerLoad,
    LazyLoad,
}

/// A string identifier bound to a controller class in the host application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegisteredController {
    pub identifier: String,
    pub controller: ClassKey,
    pub entry_point: PathBuf,
    pub span: Span,
    pub kind: RegistrationKind,
}

// ---------------------------------------------------------------------------
// 7. Change notifications and scan statistics
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileChange {
    Created(PathBuf),
    Changed(PathBuf),
    Deleted(PathBuf),
    ManifestChanged,
}

impl FileChange {
    pub fn path(&self) -> Option<&Path> {
        match self {
            FileChange::Created(path) | FileChange::Changed(path) | FileChange::Deleted(path) => {
                Some(path)
            }
            FileChange::ManifestChanged => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub files_seen: usize,
    pub files_parsed: usize,
    pub read_failures: usize,
    pub parse_failures: usize,
    pub package_files: usize,
    pub controllers: usize,
    pub registrations: usize,
    pub packages: usize,
    pub elapsed_ms: u64,
}
