pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Prefix rendered for [`XSD_NAMESPACE`]; every other namespace renders as `ns<index>`.
pub const XSD_PREFIX: &str = "xsd";

const MAX_EXTENSION_DEPTH: usize = 32;

/// Every namespace seen while parsing, in first-seen order.
#[derive(Default, Debug, Clone)]
pub struct Namespaces(Vec<String>);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespacedName {
    namespace_idx: usize,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurs {
    Bounded(u32),
    Unbounded,
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    Struct(Vec<Field>),
    Extension {
        base: NamespacedName,
        fields: Vec<Field>,
    },
    Simple(NamespacedName),
    Enumeration {
        base: NamespacedName,
        values: Vec<String>,
    },
    Alias(NamespacedName),
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    Type(NamespacedName),
    Ref(NamespacedName),
    Inner(TypeKind),
    Any,
}

#[derive(Debug, Clone)]
pub struct Type {
    pub name: NamespacedName,
    pub kind: TypeKind,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub name: NamespacedName,
    pub kind: TypeKind,
    pub nillable: bool,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: NamespacedName,
    pub ty: FieldKind,
    pub min_occurs: u32,
    pub max_occurs: Occurs,
    pub nillable: bool,
}

#[derive(Debug, Clone)]
pub enum PartContent {
    Element(NamespacedName),
    Type(NamespacedName),
}

#[derive(Debug, Clone)]
pub struct Part {
    pub name: String,
    pub content: PartContent,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub name: NamespacedName,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub name: NamespacedName,
    pub documentation: Option<String>,
    pub input: Option<NamespacedName>,
    pub output: Option<NamespacedName>,
}

#[derive(Debug, Clone)]
pub struct PortType {
    pub name: NamespacedName,
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone)]
pub struct BindingOperation {
    pub name: NamespacedName,
    pub action: Option<String>,
    pub style: Option<String>,
    pub input: Option<String>,
    pub output: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: NamespacedName,
    pub ty: NamespacedName,
    pub transport: Option<String>,
    pub style: Option<String>,
    pub operations: Vec<BindingOperation>,
}

#[derive(Debug, Clone)]
pub struct Port {
    pub name: NamespacedName,
    pub binding: NamespacedName,
    pub location: String,
}

#[derive(Debug, Clone)]
pub struct Service {
    pub name: NamespacedName,
    pub ports: Vec<Port>,
}

#[derive(Default, Debug, Clone)]
pub struct Definition {
    pub elements: Vec<Element>,
    pub types: Vec<Type>,
    pub messages: Vec<Message>,
    pub port_types: Vec<PortType>,
    pub bindings: Vec<Binding>,
    pub services: Vec<Service>,
}

impl Namespaces {
    pub fn namespaces(&self) -> &[String] {
        &self.0
    }

    pub fn add_or_get(&mut self, namespace: &str) -> usize {
        if let Some(index) = self.index_of(namespace) {
            index
        } else {
            let index = self.0.len();
            self.0.push(namespace.to_owned());
            index
        }
    }

    pub fn index_of(&self, namespace: &str) -> Option<usize> {
        self.0.iter().position(|value| value == namespace)
    }

    pub fn namespace(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn prefix(&self, index: usize) -> String {
        match self.namespace(index) {
            Some(XSD_NAMESPACE) => XSD_PREFIX.to_owned(),
            _ => format!("ns{}", index),
        }
    }

    pub fn prefix_of(&self, namespace: &str) -> Option<String> {
        self.index_of(namespace).map(|index| self.prefix(index))
    }

    /// `(prefix, namespace)` pairs in index order.
    pub fn prefix_map(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .enumerate()
            .map(|(index, namespace)| (self.prefix(index), namespace.clone()))
            .collect()
    }
}

impl NamespacedName {
    pub fn new(namespaces: &mut Namespaces, namespace: &str, name: String) -> Self {
        Self {
            namespace_idx: namespaces.add_or_get(namespace),
            name,
        }
    }

    pub fn index(&self) -> usize {
        self.namespace_idx
    }

    pub fn namespace<'a>(&self, namespaces: &'a Namespaces) -> &'a str {
        namespaces.namespace(self.namespace_idx).unwrap_or_default()
    }

    pub fn is_xsd(&self, namespaces: &Namespaces) -> bool {
        self.namespace(namespaces) == XSD_NAMESPACE
    }

    /// `prefix:name`, using the prefixes of [`Namespaces::prefix`].
    pub fn qualified(&self, namespaces: &Namespaces) -> String {
        format!("{}:{}", namespaces.prefix(self.namespace_idx), self.name)
    }
}

impl Occurs {
    pub fn is_many(&self) -> bool {
        !matches!(self, Occurs::Bounded(0 | 1))
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Occurs::Bounded(1)
    }
}

impl Definition {
    pub fn find_element(&self, name: &NamespacedName) -> Option<&Element> {
        self.elements.iter().find(|element| element.name == *name)
    }

    pub fn find_type(&self, name: &NamespacedName) -> Option<&Type> {
        self.types.iter().find(|ty| ty.name == *name)
    }

    pub fn find_message(&self, name: &NamespacedName) -> Option<&Message> {
        self.messages.iter().find(|message| message.name == *name)
    }

    pub fn find_port_type(&self, name: &NamespacedName) -> Option<&PortType> {
        self.port_types.iter().find(|port_type| port_type.name == *name)
    }

    pub fn find_binding(&self, name: &NamespacedName) -> Option<&Binding> {
        self.bindings.iter().find(|binding| binding.name == *name)
    }

    pub fn find_service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|service| service.name.name == name)
    }

    /// Fields of a complex kind, base type fields first for extensions.
    pub fn fields<'a>(&'a self, kind: &'a TypeKind) -> Vec<&'a Field> {
        let mut fields = Vec::new();
        self.collect_fields(kind, &mut fields, 0);
        fields
    }

    pub fn is_complex(&self, kind: &TypeKind) -> bool {
        matches!(kind, TypeKind::Struct(_) | TypeKind::Extension { .. })
    }

    /// Fields of a complex kind, following an alias to a named complex type.
    pub fn complex_fields<'a>(&'a self, kind: &'a TypeKind) -> Option<Vec<&'a Field>> {
        match kind {
            TypeKind::Struct(_) | TypeKind::Extension { .. } => Some(self.fields(kind)),

            TypeKind::Alias(name) => self
                .find_type(name)
                .filter(|ty| self.is_complex(&ty.kind))
                .map(|ty| self.fields(&ty.kind)),

            _ => None,
        }
    }

    /// The kind a field's content is described by, if it can be resolved.
    pub fn field_kind<'a>(&'a self, field: &'a Field) -> Option<&'a TypeKind> {
        match &field.ty {
            FieldKind::Type(name) => self.find_type(name).map(|ty| &ty.kind),
            FieldKind::Ref(name) => self.find_element(name).map(|element| &element.kind),
            FieldKind::Inner(kind) => Some(kind),
            FieldKind::Any => None,
        }
    }

    fn collect_fields<'a>(&'a self, kind: &'a TypeKind, fields: &mut Vec<&'a Field>, depth: usize) {
        match kind {
            TypeKind::Struct(own) => fields.extend(own.iter()),

            TypeKind::Extension { base, fields: own } => {
                if depth < MAX_EXTENSION_DEPTH {
                    if let Some(base) = self.find_type(base) {
                        self.collect_fields(&base.kind, fields, depth + 1);
                    }
                }

                fields.extend(own.iter());
            }

            _ => (),
        }
    }
}

impl Binding {
    pub fn find_operation(&self, name: &str) -> Option<&BindingOperation> {
        self.operations
            .iter()
            .find(|operation| operation.name.name == name)
    }
}

impl PortType {
    pub fn find_operation(&self, name: &str) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|operation| operation.name.name == name)
    }
}

impl Service {
    pub fn find_port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|port| port.name.name == name)
    }
}
