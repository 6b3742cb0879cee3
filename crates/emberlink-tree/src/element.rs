use std::collections::{BTreeMap, BTreeSet};

use emberlink_schema::{ElementKind, SchemaRef};

use crate::state::RequestState;
use crate::value::{Access, ParameterType, StreamDescriptor, TupleItem, Value};

/// Index of an element in its [`Tree`](crate::Tree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(pub(crate) u32);

impl ElementId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node, parameter or function of the mirrored tree.
#[derive(Debug, Clone)]
pub struct Element {
    pub(crate) number: u32,
    pub(crate) identifier: String,
    pub(crate) description: Option<String>,
    pub(crate) parent: Option<ElementId>,
    pub(crate) schema: SchemaRef,
    pub(crate) online: bool,
    pub(crate) online_changed: bool,
    pub(crate) online_state: RequestState,
    pub(crate) offline_state: RequestState,
    pub(crate) tag: Option<u64>,
    pub(crate) data: ElementData,
}

#[derive(Debug, Clone)]
pub enum ElementData {
    Node(Node),
    Parameter(Parameter),
    Function(Function),
}

impl Element {
    pub(crate) fn new(
        number: u32,
        identifier: String,
        parent: Option<ElementId>,
        schema: SchemaRef,
        kind: ElementKind,
    ) -> Self {
        let (data, state) = match kind {
            ElementKind::Node => (ElementData::Node(Node::default()), RequestState::None),
            ElementKind::Parameter => (
                ElementData::Parameter(Parameter::default()),
                RequestState::Complete,
            ),
            ElementKind::Function => (
                ElementData::Function(Function::default()),
                RequestState::Complete,
            ),
        };
        Self {
            number,
            identifier,
            description: None,
            parent,
            schema,
            online: true,
            online_changed: true,
            online_state: state,
            offline_state: RequestState::Complete,
            tag: None,
            data,
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema
    }

    /// Opaque value the application attached to this element.
    pub fn tag(&self) -> Option<u64> {
        self.tag
    }

    pub fn kind(&self) -> ElementKind {
        match self.data {
            ElementData::Node(_) => ElementKind::Node,
            ElementData::Parameter(_) => ElementKind::Parameter,
            ElementData::Function(_) => ElementKind::Function,
        }
    }

    pub fn data(&self) -> &ElementData {
        &self.data
    }

    pub fn as_node(&self) -> Option<&Node> {
        match &self.data {
            ElementData::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_parameter(&self) -> Option<&Parameter> {
        match &self.data {
            ElementData::Parameter(parameter) => Some(parameter),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match &self.data {
            ElementData::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Request state of the slot selected by the current online flag.
    pub fn state(&self) -> RequestState {
        if self.online {
            self.online_state
        } else {
            self.offline_state
        }
    }

    pub(crate) fn set_state(&mut self, state: RequestState) {
        if self.online {
            self.online_state = state;
        } else {
            self.offline_state = state;
        }
    }

    /// Switch the active state slot. The newly active slot is capped at
    /// `Complete` so the element has to re-verify.
    pub(crate) fn set_online(&mut self, online: bool) -> bool {
        if self.online == online {
            return false;
        }
        self.online = online;
        self.online_changed = true;
        let capped = self.state().meet(RequestState::Complete);
        self.set_state(capped);
        true
    }

    pub(crate) fn node_mut(&mut self) -> Option<&mut Node> {
        match &mut self.data {
            ElementData::Node(node) => Some(node),
            _ => None,
        }
    }
}

/// Node payload: children and node-specific contents.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub(crate) children: BTreeMap<u32, ElementId>,
    pub(crate) live: BTreeSet<u32>,
    pub(crate) is_root: bool,
    pub(crate) schema_identifiers: Option<String>,
}

impl Node {
    /// Every known child, online or not, ordered by number.
    pub fn children(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.children.values().copied()
    }

    pub fn child(&self, number: u32) -> Option<ElementId> {
        self.children.get(&number).copied()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Whether the provider flagged this node as the root of a device tree.
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn schema_identifiers(&self) -> Option<&str> {
        self.schema_identifiers.as_deref()
    }
}

/// Parameter payload.
#[derive(Debug, Clone, Default)]
pub struct Parameter {
    pub value: Option<Value>,
    pub kind: Option<ParameterType>,
    pub minimum: Option<Value>,
    pub maximum: Option<Value>,
    pub default: Option<Value>,
    pub step: Option<i64>,
    pub factor: Option<i64>,
    pub formula: Option<String>,
    pub format: Option<String>,
    pub access: Access,
    /// Enum entries as `(text, value)` pairs, in provider order.
    pub enum_map: Vec<(String, i64)>,
    pub stream_identifier: Option<i64>,
    pub stream_descriptor: Option<StreamDescriptor>,
    pub schema_identifiers: Option<String>,
}

impl Parameter {
    /// Declared type, falling back to what the value and enum map imply.
    pub fn effective_type(&self) -> Option<ParameterType> {
        self.kind.or_else(|| {
            if !self.enum_map.is_empty() {
                return Some(ParameterType::Enum);
            }
            self.value.as_ref().map(Value::parameter_type)
        })
    }

    /// Text of the current enum value, if the parameter has an enum map.
    pub fn enum_text(&self) -> Option<&str> {
        let Some(Value::Enum(index)) = self.value else {
            return None;
        };
        self.enum_map
            .iter()
            .find(|(_, value)| *value == index)
            .map(|(text, _)| text.as_str())
    }

    // Integers of enum parameters become enum indices, whichever field arrived first.
    pub(crate) fn normalize(&mut self) {
        if self.effective_type() != Some(ParameterType::Enum) {
            return;
        }
        for slot in [&mut self.value, &mut self.default] {
            if let Some(Value::Integer(v)) = *slot {
                *slot = Some(Value::Enum(v));
            }
        }
    }
}

/// Function payload: the invocation signature.
#[derive(Debug, Clone, Default)]
pub struct Function {
    pub arguments: Vec<TupleItem>,
    pub result: Vec<TupleItem>,
}
