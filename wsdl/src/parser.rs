use quick_xml::{
    events::{attributes::Attributes, BytesStart, BytesText, Event},
    Reader,
};
use std::{
    collections::{HashMap, HashSet},
    io::BufRead,
};
use tracing::{debug, info, trace};
use url::Url;

use super::{
    error,
    loader::Loader,
    types::{
        Binding, BindingOperation, Definition, Element, Field, FieldKind, Message, NamespacedName,
        Namespaces, Occurs, Operation, Part, PartContent, Port, PortType, Service, Type, TypeKind,
        XSD_NAMESPACE,
    },
};

fn get_attributes<B: BufRead, const N: usize>(
    reader: &Reader<B>,
    attributes: Attributes<'_>,
    names: [&'static str; N],
) -> Result<[Option<String>; N], error::Error> {
    const INIT: Option<String> = None;
    let mut result = [INIT; N];

    for attribute in attributes {
        let attribute = attribute?;
        let key = reader.decode(attribute.key)?;

        for (index, name) in names.iter().enumerate() {
            if key == *name {
                result[index] = Some(attribute.unescape_and_decode_value(reader)?);
                break;
            }
        }
    }

    Ok(result)
}

fn required(
    value: Option<String>,
    element: &str,
    attribute: &'static str,
) -> Result<String, error::Error> {
    value.ok_or_else(|| error::Error::MissingAttribute {
        element: element.to_owned(),
        attribute,
    })
}

fn split_namespaced_name(prefixed_name: &str) -> (Option<&str>, &str) {
    match prefixed_name.split_once(':') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, prefixed_name),
    }
}

fn parse_min_occurs(value: Option<String>) -> Result<u32, error::Error> {
    match value {
        None => Ok(1),
        Some(value) => value
            .parse()
            .map_err(|_| error::Error::InvalidOccurs(value)),
    }
}

fn parse_max_occurs(value: Option<String>) -> Result<Occurs, error::Error> {
    match value.as_deref() {
        None => Ok(Occurs::Bounded(1)),
        Some("unbounded") => Ok(Occurs::Unbounded),
        Some(bound) => bound
            .parse()
            .map(Occurs::Bounded)
            .map_err(|_| error::Error::InvalidOccurs(bound.to_owned())),
    }
}

/// Prefix bindings scoped to the element that declared them.
#[derive(Clone, Default)]
struct CurrentNamespaces {
    target: Vec<String>,
    namespaces: HashMap<Option<String>, Vec<String>>,
    scopes: Vec<Vec<Option<String>>>,
}

struct Parser<'l> {
    loader: &'l dyn Loader,
    visited: HashSet<Url>,

    definition: Definition,
    namespaces: Namespaces,
    current_namespaces: CurrentNamespaces,
}

#[derive(Debug)]
enum ParseState {
    Definitions,

    Types,
    Schema,
    Element {
        name: String,
        kind: Option<TypeKind>,
        nillable: bool,
    },
    ComplexType {
        name: Option<String>,
        kind: Option<TypeKind>,
    },
    ComplexContent {
        kind: Option<TypeKind>,
    },
    ComplexExtension {
        base: NamespacedName,
        fields: Vec<Field>,
    },
    SimpleContent {
        ty: Option<NamespacedName>,
    },
    SimpleExtension {
        ty: NamespacedName,
    },
    Sequence(Vec<Field>),
    SequenceElement {
        name: Option<String>,
        kind: Option<FieldKind>,
        min_occurs: u32,
        max_occurs: Occurs,
        nillable: bool,
    },
    Any {
        min_occurs: u32,
        max_occurs: Occurs,
    },
    SimpleType {
        name: Option<String>,
        kind: Option<TypeKind>,
    },
    Restriction {
        base: NamespacedName,
        values: Vec<String>,
    },

    Message {
        name: String,
        parts: Vec<Part>,
    },
    Part(Part),

    PortType {
        name: String,
        operations: Vec<Operation>,
    },
    Operation {
        name: String,
        documentation: Option<String>,
        input: Option<NamespacedName>,
        output: Option<NamespacedName>,
    },
    Documentation(Option<String>),
    Input {
        message: NamespacedName,
    },
    Output {
        message: NamespacedName,
    },

    Binding {
        name: String,
        ty: NamespacedName,
        transport: Option<String>,
        style: Option<String>,
        operations: Vec<BindingOperation>,
    },
    Transport {
        transport: Option<String>,
        style: Option<String>,
    },
    BindingOperation {
        name: String,
        action: Option<String>,
        style: Option<String>,
        input: Option<String>,
        output: Option<String>,
    },
    OperationAction {
        action: Option<String>,
        style: Option<String>,
    },
    BindingInput {
        body: Option<String>,
    },
    BindingOutput {
        body: Option<String>,
    },
    BindingBody {
        body: Option<String>,
    },

    Service {
        name: String,
        ports: Vec<Port>,
    },
    Port {
        name: String,
        binding: NamespacedName,
        address: Option<String>,
    },
    Address {
        location: String,
    },

    Import,

    Other,
}

impl CurrentNamespaces {
    pub fn push_target_namespace(&mut self, namespace: String) {
        self.target.push(namespace);
    }

    pub fn pop_target_namespace(&mut self) {
        self.target.pop();
    }

    pub fn current_target(&self) -> Option<&String> {
        self.target.last()
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub fn leave_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            for prefix in scope {
                if let Some(bindings) = self.namespaces.get_mut(&prefix) {
                    bindings.pop();
                }
            }
        }
    }

    pub fn add_namespace_prefix(&mut self, prefix: Option<String>, namespace: String) {
        self.namespaces
            .entry(prefix.clone())
            .or_default()
            .push(namespace);

        if let Some(scope) = self.scopes.last_mut() {
            scope.push(prefix);
        }
    }

    pub fn target_namespaced(
        &self,
        namespaces: &mut Namespaces,
        name: String,
    ) -> Result<NamespacedName, error::Error> {
        match self.target.last() {
            Some(target) => Ok(NamespacedName::new(namespaces, target, name)),
            None => Err(error::Error::NoTargetNamespace(name)),
        }
    }

    pub fn resolved_prefix(
        &self,
        namespaces: &mut Namespaces,
        prefix: Option<String>,
        name: String,
    ) -> Result<NamespacedName, error::Error> {
        match self.namespaces.get(&prefix).and_then(|bindings| bindings.last()) {
            Some(value) => Ok(NamespacedName::new(namespaces, value, name)),
            // An unprefixed reference without a default namespace stays in the target namespace
            None if prefix.is_none() => self.target_namespaced(namespaces, name),
            None => Err(error::Error::UnresolvedPrefix(prefix.unwrap_or_default())),
        }
    }
}

impl<'l> Parser<'l> {
    fn new(loader: &'l dyn Loader) -> Self {
        Self {
            loader,
            visited: HashSet::new(),

            definition: Default::default(),
            namespaces: Default::default(),
            current_namespaces: Default::default(),
        }
    }

    fn push_target_namespace(&mut self, namespace: String) {
        self.namespaces.add_or_get(&namespace);
        self.current_namespaces.push_target_namespace(namespace);
    }

    fn pop_target_namespace(&mut self) {
        self.current_namespaces.pop_target_namespace();
    }

    fn target_namespaced(&mut self, name: String) -> Result<NamespacedName, error::Error> {
        self.current_namespaces
            .target_namespaced(&mut self.namespaces, name)
    }

    fn resolved_prefix(
        &mut self,
        prefix: Option<String>,
        name: String,
    ) -> Result<NamespacedName, error::Error> {
        self.current_namespaces
            .resolved_prefix(&mut self.namespaces, prefix, name)
    }

    fn resolve_namespace(&mut self, prefixed_name: &str) -> Result<NamespacedName, error::Error> {
        let (prefix, local_name) = split_namespaced_name(prefixed_name);

        match prefix {
            Some("tns") => self.target_namespaced(local_name.to_owned()),

            _ => self.resolved_prefix(prefix.map(ToOwned::to_owned), local_name.to_owned()),
        }
    }

    fn xsd_name(&mut self, name: &str) -> NamespacedName {
        NamespacedName::new(&mut self.namespaces, XSD_NAMESPACE, name.to_owned())
    }

    fn parse(mut self, url: Url) -> Result<(Definition, Namespaces), error::Error> {
        self.parse_url(url)?;
        Ok((self.definition, self.namespaces))
    }

    fn parse_document(
        mut self,
        url: Url,
        document: &[u8],
    ) -> Result<(Definition, Namespaces), error::Error> {
        self.visited.insert(url.clone());
        self.parse_xml(&url, Reader::from_reader(document))?;
        Ok((self.definition, self.namespaces))
    }

    fn parse_url(&mut self, url: Url) -> Result<(), error::Error> {
        if !self.visited.insert(url.clone()) {
            debug!("Skipping already parsed {}", url);
            return Ok(());
        }

        info!("Parsing {}", url);
        let document = self.loader.load(&url)?;
        let result = self.parse_xml(&url, Reader::from_reader(document.as_slice()));

        debug!("Finished parsing {}", url);
        result
    }

    fn import(&mut self, base: &Url, location: Option<String>) -> Result<(), error::Error> {
        match location {
            Some(location) => {
                self.parse_url(base.join(&location)?)?;
                debug!("Back to {}", base);
            }

            None => debug!("Import without location in {}, assuming inline", base),
        }

        Ok(())
    }

    fn parse_xml<B: BufRead>(&mut self, url: &Url, mut reader: Reader<B>) -> Result<(), error::Error> {
        reader.trim_text(true);

        let mut stack = Vec::new();
        let mut buffer = Vec::new();

        loop {
            match reader.read_event(&mut buffer)? {
                Event::Start(start) => self.handle_start(&mut stack, &reader, &start, url)?,
                Event::End(..) => self.handle_end(&mut stack)?,

                Event::Empty(start) => {
                    self.handle_start(&mut stack, &reader, &start, url)?;
                    self.handle_end(&mut stack)?;
                }

                Event::Text(text) => self.handle_text(&mut stack, &reader, &text)?,

                Event::Eof => break,

                event => trace!("Ignoring {:?}", event),
            }

            buffer.clear();
        }

        Ok(())
    }

    fn start_schema<B: BufRead>(
        &mut self,
        reader: &Reader<B>,
        start: &BytesStart<'_>,
    ) -> Result<ParseState, error::Error> {
        let [namespace] = get_attributes(reader, start.attributes(), ["targetNamespace"])?;

        // Included schemas without a target namespace adopt the including one
        let namespace = match namespace {
            Some(namespace) => namespace,
            None => self
                .current_namespaces
                .current_target()
                .cloned()
                .ok_or_else(|| error::Error::NoTargetNamespace("schema".into()))?,
        };

        self.push_target_namespace(namespace);
        Ok(ParseState::Schema)
    }

    fn handle_start<B: BufRead>(
        &mut self,
        stack: &mut Vec<ParseState>,
        reader: &Reader<B>,
        start: &BytesStart<'_>,
        url: &Url,
    ) -> Result<(), error::Error> {
        let (_, local_name) = split_namespaced_name(reader.decode(start.name())?);

        self.current_namespaces.enter_scope();

        for attribute in start.attributes() {
            let attribute = attribute?;
            let key = reader.decode(attribute.key)?;

            match split_namespaced_name(key) {
                (Some("xmlns"), prefix) => self.current_namespaces.add_namespace_prefix(
                    Some(prefix.to_owned()),
                    attribute.unescape_and_decode_value(reader)?,
                ),

                (None, "xmlns") => self
                    .current_namespaces
                    .add_namespace_prefix(None, attribute.unescape_and_decode_value(reader)?),

                _ => (),
            }
        }

        let mut state = stack.pop();
        let mut new_state = ParseState::Other;

        match state {
            None => match local_name {
                "definitions" => {
                    let [namespace] =
                        get_attributes(reader, start.attributes(), ["targetNamespace"])?;

                    self.push_target_namespace(required(namespace, local_name, "targetNamespace")?);
                    new_state = ParseState::Definitions;
                }

                "schema" => new_state = self.start_schema(reader, start)?,

                _ => debug!("Found {} at document root", local_name),
            },

            Some(ParseState::Definitions) => match local_name {
                "import" => {
                    let [location] = get_attributes(reader, start.attributes(), ["location"])?;

                    self.import(url, location)?;
                    new_state = ParseState::Import;
                }

                "types" => new_state = ParseState::Types,

                "message" => {
                    let [name] = get_attributes(reader, start.attributes(), ["name"])?;

                    new_state = ParseState::Message {
                        name: required(name, local_name, "name")?,
                        parts: Vec::new(),
                    };
                }

                "portType" => {
                    let [name] = get_attributes(reader, start.attributes(), ["name"])?;

                    new_state = ParseState::PortType {
                        name: required(name, local_name, "name")?,
                        operations: Vec::new(),
                    };
                }

                "binding" => {
                    let [name, ty] = get_attributes(reader, start.attributes(), ["name", "type"])?;

                    let name = required(name, local_name, "name")?;
                    let ty = self.resolve_namespace(&required(ty, local_name, "type")?)?;

                    new_state = ParseState::Binding {
                        name,
                        ty,
                        transport: None,
                        style: None,
                        operations: Vec::new(),
                    };
                }

                "service" => {
                    let [name] = get_attributes(reader, start.attributes(), ["name"])?;

                    new_state = ParseState::Service {
                        name: required(name, local_name, "name")?,
                        ports: Vec::new(),
                    };
                }

                _ => debug!("Found {} inside definitions block", local_name),
            },

            Some(ParseState::Types) => match local_name {
                "schema" => new_state = self.start_schema(reader, start)?,

                _ => debug!("Found {} inside types block", local_name),
            },

            Some(ParseState::Schema) => match local_name {
                "element" => {
                    let [name, ty, nillable] =
                        get_attributes(reader, start.attributes(), ["name", "type", "nillable"])?;

                    let name = required(name, local_name, "name")?;
                    let kind = match ty {
                        Some(ty) => Some(TypeKind::Alias(self.resolve_namespace(&ty)?)),
                        None => None,
                    };

                    new_state = ParseState::Element {
                        name,
                        kind,
                        nillable: nillable.as_deref() == Some("true"),
                    };
                }

                "complexType" => {
                    let [name] = get_attributes(reader, start.attributes(), ["name"])?;

                    new_state = ParseState::ComplexType {
                        name: Some(required(name, local_name, "name")?),
                        kind: None,
                    };
                }

                "simpleType" => {
                    let [name] = get_attributes(reader, start.attributes(), ["name"])?;

                    new_state = ParseState::SimpleType {
                        name: Some(required(name, local_name, "name")?),
                        kind: None,
                    };
                }

                "include" | "import" => {
                    let [location] =
                        get_attributes(reader, start.attributes(), ["schemaLocation"])?;

                    self.import(url, location)?;
                    new_state = ParseState::Import;
                }

                _ => debug!("Found {} inside schema block", local_name),
            },

            Some(ParseState::Element { .. }) => match local_name {
                "complexType" => {
                    new_state = ParseState::ComplexType {
                        name: None,
                        kind: None,
                    }
                }

                "simpleType" => {
                    new_state = ParseState::SimpleType {
                        name: None,
                        kind: None,
                    }
                }

                _ => debug!("Found {} inside element block", local_name),
            },

            Some(ParseState::ComplexType { .. }) => match local_name {
                "sequence" | "all" | "choice" => new_state = ParseState::Sequence(Vec::new()),

                "simpleContent" => new_state = ParseState::SimpleContent { ty: None },

                "complexContent" => new_state = ParseState::ComplexContent { kind: None },

                _ => debug!("Found {} inside complex type block", local_name),
            },

            Some(ParseState::ComplexContent { .. }) => match local_name {
                "extension" => {
                    let [base] = get_attributes(reader, start.attributes(), ["base"])?;

                    let base = self.resolve_namespace(&required(base, local_name, "base")?)?;

                    new_state = ParseState::ComplexExtension {
                        base,
                        fields: Vec::new(),
                    };
                }

                _ => debug!("Found {} inside complex content block", local_name),
            },

            Some(ParseState::ComplexExtension { .. }) => match local_name {
                "sequence" | "all" | "choice" => new_state = ParseState::Sequence(Vec::new()),

                _ => debug!("Found {} inside complex extension block", local_name),
            },

            Some(ParseState::SimpleContent { .. }) => match local_name {
                "extension" | "restriction" => {
                    let [base] = get_attributes(reader, start.attributes(), ["base"])?;

                    let ty = self.resolve_namespace(&required(base, local_name, "base")?)?;

                    new_state = ParseState::SimpleExtension { ty };
                }

                _ => debug!("Found {} inside simple content block", local_name),
            },

            Some(ParseState::SimpleExtension { .. }) => {
                debug!("Found {} inside simple extension block", local_name)
            }

            Some(ParseState::SimpleType { .. }) => match local_name {
                "restriction" => {
                    let [base] = get_attributes(reader, start.attributes(), ["base"])?;

                    let base = self.resolve_namespace(&required(base, local_name, "base")?)?;

                    new_state = ParseState::Restriction {
                        base,
                        values: Vec::new(),
                    };
                }

                _ => debug!("Found {} inside simple type block", local_name),
            },

            Some(ParseState::Restriction { ref mut values, .. }) => match local_name {
                "enumeration" => {
                    let [value] = get_attributes(reader, start.attributes(), ["value"])?;

                    values.push(required(value, local_name, "value")?);
                }

                _ => debug!("Found {} inside restriction block", local_name),
            },

            Some(ParseState::Sequence(_)) => match local_name {
                "element" => {
                    let [name, ty, reference, min_occurs, max_occurs, nillable] = get_attributes(
                        reader,
                        start.attributes(),
                        ["name", "type", "ref", "minOccurs", "maxOccurs", "nillable"],
                    )?;

                    let kind = match (ty, reference) {
                        (_, Some(reference)) => {
                            Some(FieldKind::Ref(self.resolve_namespace(&reference)?))
                        }

                        (Some(ty), None) => Some(FieldKind::Type(self.resolve_namespace(&ty)?)),

                        (None, None) => None,
                    };

                    if name.is_none() && !matches!(kind, Some(FieldKind::Ref(_))) {
                        return Err(error::Error::MissingAttribute {
                            element: local_name.to_owned(),
                            attribute: "name",
                        });
                    }

                    new_state = ParseState::SequenceElement {
                        name,
                        kind,
                        min_occurs: parse_min_occurs(min_occurs)?,
                        max_occurs: parse_max_occurs(max_occurs)?,
                        nillable: nillable.as_deref() == Some("true"),
                    };
                }

                "any" => {
                    let [min_occurs, max_occurs] =
                        get_attributes(reader, start.attributes(), ["minOccurs", "maxOccurs"])?;

                    new_state = ParseState::Any {
                        min_occurs: parse_min_occurs(min_occurs)?,
                        max_occurs: parse_max_occurs(max_occurs)?,
                    };
                }

                "sequence" | "choice" => new_state = ParseState::Sequence(Vec::new()),

                _ => debug!("Found {} inside sequence block", local_name),
            },

            Some(ParseState::SequenceElement { .. }) => match local_name {
                "complexType" => {
                    new_state = ParseState::ComplexType {
                        name: None,
                        kind: None,
                    }
                }

                "simpleType" => {
                    new_state = ParseState::SimpleType {
                        name: None,
                        kind: None,
                    }
                }

                _ => debug!("Found {} inside sequence element block", local_name),
            },

            Some(ParseState::Message { .. }) => match local_name {
                "part" => {
                    let [name, element, ty] =
                        get_attributes(reader, start.attributes(), ["name", "element", "type"])?;

                    let name = required(name, local_name, "name")?;
                    let content = match (element, ty) {
                        (Some(element), _) => PartContent::Element(self.resolve_namespace(&element)?),
                        (None, Some(ty)) => PartContent::Type(self.resolve_namespace(&ty)?),
                        (None, None) => {
                            return Err(error::Error::MissingAttribute {
                                element: local_name.to_owned(),
                                attribute: "element",
                            })
                        }
                    };

                    new_state = ParseState::Part(Part { name, content });
                }

                _ => debug!("Found {} inside message block", local_name),
            },

            Some(ParseState::PortType { .. }) => match local_name {
                "operation" => {
                    let [name] = get_attributes(reader, start.attributes(), ["name"])?;

                    new_state = ParseState::Operation {
                        name: required(name, local_name, "name")?,
                        documentation: None,
                        input: None,
                        output: None,
                    }
                }

                _ => debug!("Found {} inside port type block", local_name),
            },

            Some(ParseState::Operation { .. }) => match local_name {
                "documentation" => new_state = ParseState::Documentation(None),

                "input" | "output" => {
                    let [message] = get_attributes(reader, start.attributes(), ["message"])?;

                    let message = self.resolve_namespace(&required(message, local_name, "message")?)?;

                    if local_name == "input" {
                        new_state = ParseState::Input { message }
                    } else {
                        new_state = ParseState::Output { message }
                    }
                }

                _ => debug!("Found {} inside operation block", local_name),
            },

            Some(ParseState::Binding { .. }) => match local_name {
                "binding" => {
                    let [transport, style] =
                        get_attributes(reader, start.attributes(), ["transport", "style"])?;

                    new_state = ParseState::Transport { transport, style }
                }

                "operation" => {
                    let [name] = get_attributes(reader, start.attributes(), ["name"])?;

                    new_state = ParseState::BindingOperation {
                        name: required(name, local_name, "name")?,
                        action: None,
                        style: None,
                        input: None,
                        output: None,
                    }
                }

                _ => debug!("Found {} inside binding block", local_name),
            },

            Some(ParseState::BindingOperation { .. }) => match local_name {
                "operation" => {
                    let [action, style] =
                        get_attributes(reader, start.attributes(), ["soapAction", "style"])?;

                    new_state = ParseState::OperationAction { action, style };
                }

                "input" => new_state = ParseState::BindingInput { body: None },
                "output" => new_state = ParseState::BindingOutput { body: None },

                _ => debug!("Found {} inside binding operation block", local_name),
            },

            Some(ParseState::BindingInput { .. } | ParseState::BindingOutput { .. }) => {
                match local_name {
                    "body" => {
                        let [body] = get_attributes(reader, start.attributes(), ["use"])?;

                        new_state = ParseState::BindingBody { body };
                    }

                    _ => debug!("Found {} inside binding message block", local_name),
                }
            }

            Some(ParseState::Service { .. }) => match local_name {
                "port" => {
                    let [name, binding] =
                        get_attributes(reader, start.attributes(), ["name", "binding"])?;

                    let name = required(name, local_name, "name")?;
                    let binding = self.resolve_namespace(&required(binding, local_name, "binding")?)?;

                    new_state = ParseState::Port {
                        name,
                        binding,
                        address: None,
                    };
                }

                _ => debug!("Found {} inside service block", local_name),
            },

            Some(ParseState::Port { .. }) => match local_name {
                "address" => {
                    let [location] = get_attributes(reader, start.attributes(), ["location"])?;

                    new_state = ParseState::Address {
                        location: required(location, local_name, "location")?,
                    }
                }

                _ => debug!("Found {} inside port block", local_name),
            },

            Some(ref other) => trace!("Found {} inside {:?}", local_name, other),
        }

        stack.extend(state);
        stack.push(new_state);

        Ok(())
    }

    fn handle_end(&mut self, stack: &mut Vec<ParseState>) -> Result<(), error::Error> {
        let finished_state = stack.pop();
        let mut next_state = stack.pop();

        match finished_state {
            Some(ParseState::Definitions | ParseState::Schema) => self.pop_target_namespace(),

            Some(ParseState::Element {
                name,
                kind,
                nillable,
            }) => {
                let kind = match kind {
                    Some(kind) => kind,
                    None => TypeKind::Alias(self.xsd_name("anyType")),
                };

                let name = self.target_namespaced(name)?;
                self.definition.elements.push(Element {
                    name,
                    kind,
                    nillable,
                })
            }

            Some(ParseState::ComplexType { kind, name }) => {
                let kind = kind.unwrap_or_else(|| TypeKind::Struct(Vec::new()));

                match next_state {
                    Some(ParseState::SequenceElement {
                        kind: ref mut field_kind,
                        ..
                    }) => *field_kind = Some(FieldKind::Inner(kind)),

                    Some(ParseState::Element {
                        kind: ref mut el_kind,
                        ..
                    }) => *el_kind = Some(kind),

                    Some(ParseState::Schema) => {
                        let name = required(name, "complexType", "name")?;
                        let name = self.target_namespaced(name)?;
                        self.definition.types.push(Type { name, kind })
                    }

                    _ => debug!("Dropping complex type outside of a schema"),
                }
            }

            Some(ParseState::ComplexContent { kind }) => match next_state {
                Some(ParseState::ComplexType {
                    kind: ref mut ty_kind,
                    ..
                }) if ty_kind.is_none() => {
                    *ty_kind = Some(kind.unwrap_or_else(|| TypeKind::Struct(Vec::new())))
                }

                _ => return Err(error::Error::UnexpectedNesting("complexContent")),
            },

            Some(ParseState::ComplexExtension { base, fields }) => match next_state {
                Some(ParseState::ComplexContent { ref mut kind }) => {
                    *kind = Some(TypeKind::Extension { base, fields })
                }

                _ => return Err(error::Error::UnexpectedNesting("extension")),
            },

            Some(ParseState::SimpleContent { ty }) => {
                let ty = match ty {
                    Some(ty) => ty,
                    None => self.xsd_name("anyType"),
                };

                match next_state {
                    Some(ParseState::ComplexType { ref mut kind, .. }) if kind.is_none() => {
                        *kind = Some(TypeKind::Alias(ty))
                    }

                    _ => return Err(error::Error::UnexpectedNesting("simpleContent")),
                }
            }

            Some(ParseState::SimpleExtension { ty: base }) => match next_state {
                Some(ParseState::SimpleContent { ref mut ty }) => *ty = Some(base),

                _ => return Err(error::Error::UnexpectedNesting("extension")),
            },

            Some(ParseState::SimpleType { name, kind }) => {
                let kind = match kind {
                    Some(kind) => kind,
                    None => TypeKind::Simple(self.xsd_name("string")),
                };

                match next_state {
                    Some(ParseState::SequenceElement {
                        kind: ref mut field_kind,
                        ..
                    }) => *field_kind = Some(FieldKind::Inner(kind)),

                    Some(ParseState::Element {
                        kind: ref mut el_kind,
                        ..
                    }) => *el_kind = Some(kind),

                    Some(ParseState::Schema) => {
                        let name = required(name, "simpleType", "name")?;
                        let name = self.target_namespaced(name)?;
                        self.definition.types.push(Type { name, kind })
                    }

                    _ => debug!("Dropping simple type outside of a schema"),
                }
            }

            Some(ParseState::Restriction { base, values }) => match next_state {
                Some(ParseState::SimpleType { ref mut kind, .. }) => {
                    *kind = Some(if values.is_empty() {
                        TypeKind::Simple(base)
                    } else {
                        TypeKind::Enumeration { base, values }
                    })
                }

                _ => return Err(error::Error::UnexpectedNesting("restriction")),
            },

            Some(ParseState::Sequence(fields)) => match next_state {
                Some(ParseState::ComplexType { ref mut kind, .. }) if kind.is_none() => {
                    *kind = Some(TypeKind::Struct(fields))
                }

                Some(
                    ParseState::ComplexExtension {
                        fields: ref mut outer,
                        ..
                    }
                    | ParseState::Sequence(ref mut outer),
                ) => outer.extend(fields),

                _ => return Err(error::Error::UnexpectedNesting("sequence")),
            },

            Some(ParseState::SequenceElement {
                name,
                kind,
                min_occurs,
                max_occurs,
                nillable,
            }) => {
                let (name, ty) = match (name, kind) {
                    (_, Some(FieldKind::Ref(reference))) => {
                        (reference.clone(), FieldKind::Ref(reference))
                    }

                    (Some(name), kind) => {
                        let ty = match kind {
                            Some(kind) => kind,
                            None => FieldKind::Type(self.xsd_name("anyType")),
                        };

                        (self.target_namespaced(name)?, ty)
                    }

                    (None, _) => {
                        return Err(error::Error::MissingAttribute {
                            element: "element".into(),
                            attribute: "name",
                        })
                    }
                };

                match next_state {
                    Some(ParseState::Sequence(ref mut fields)) => fields.push(Field {
                        name,
                        ty,
                        min_occurs,
                        max_occurs,
                        nillable,
                    }),

                    _ => return Err(error::Error::UnexpectedNesting("element")),
                }
            }

            Some(ParseState::Any {
                min_occurs,
                max_occurs,
            }) => {
                let name = self.target_namespaced("any".into())?;

                match next_state {
                    Some(ParseState::Sequence(ref mut fields)) => fields.push(Field {
                        name,
                        ty: FieldKind::Any,
                        min_occurs,
                        max_occurs,
                        nillable: false,
                    }),

                    _ => return Err(error::Error::UnexpectedNesting("any")),
                }
            }

            Some(ParseState::Message { name, parts }) => {
                let name = self.target_namespaced(name)?;
                self.definition.messages.push(Message { name, parts })
            }

            Some(ParseState::Part(part)) => match next_state {
                Some(ParseState::Message { ref mut parts, .. }) => parts.push(part),
                _ => return Err(error::Error::UnexpectedNesting("part")),
            },

            Some(ParseState::PortType { name, operations }) => {
                let name = self.target_namespaced(name)?;
                self.definition
                    .port_types
                    .push(PortType { name, operations })
            }

            Some(ParseState::Operation {
                name,
                input,
                output,
                documentation,
            }) => {
                let name = self.target_namespaced(name)?;

                match next_state {
                    Some(ParseState::PortType {
                        ref mut operations, ..
                    }) => operations.push(Operation {
                        name,
                        input,
                        output,
                        documentation,
                    }),
                    _ => return Err(error::Error::UnexpectedNesting("operation")),
                }
            }

            Some(ParseState::Documentation(text)) => match next_state {
                Some(ParseState::Operation {
                    ref mut documentation,
                    ..
                }) => *documentation = text,
                _ => return Err(error::Error::UnexpectedNesting("documentation")),
            },

            Some(ParseState::Input { message }) => match next_state {
                Some(ParseState::Operation { ref mut input, .. }) => *input = Some(message),
                _ => return Err(error::Error::UnexpectedNesting("input")),
            },

            Some(ParseState::Output { message }) => match next_state {
                Some(ParseState::Operation { ref mut output, .. }) => *output = Some(message),
                _ => return Err(error::Error::UnexpectedNesting("output")),
            },

            Some(ParseState::Transport {
                transport: kind,
                style: binding_style,
            }) => match next_state {
                Some(ParseState::Binding {
                    ref mut transport,
                    ref mut style,
                    ..
                }) => {
                    *transport = kind;
                    *style = binding_style;
                }
                _ => return Err(error::Error::UnexpectedNesting("binding")),
            },

            Some(ParseState::Binding {
                name,
                ty,
                transport,
                style,
                operations,
            }) => {
                let name = self.target_namespaced(name)?;
                self.definition.bindings.push(Binding {
                    name,
                    ty,
                    transport,
                    style,
                    operations,
                })
            }

            Some(ParseState::BindingOperation {
                name,
                action,
                style,
                input,
                output,
            }) => {
                let name = self.target_namespaced(name)?;

                match next_state {
                    Some(ParseState::Binding {
                        ref mut operations, ..
                    }) => operations.push(BindingOperation {
                        name,
                        action,
                        style,
                        input,
                        output,
                    }),
                    _ => return Err(error::Error::UnexpectedNesting("operation")),
                }
            }

            Some(ParseState::OperationAction { action, style }) => match next_state {
                Some(ParseState::BindingOperation {
                    action: ref mut a,
                    style: ref mut s,
                    ..
                }) => {
                    *a = action;
                    *s = style;
                }
                _ => return Err(error::Error::UnexpectedNesting("operation")),
            },

            Some(ParseState::BindingInput { body }) => match next_state {
                Some(ParseState::BindingOperation { ref mut input, .. }) => *input = body,
                _ => return Err(error::Error::UnexpectedNesting("input")),
            },

            Some(ParseState::BindingOutput { body }) => match next_state {
                Some(ParseState::BindingOperation { ref mut output, .. }) => *output = body,
                _ => return Err(error::Error::UnexpectedNesting("output")),
            },

            Some(ParseState::BindingBody { body: body_use }) => match next_state {
                Some(
                    ParseState::BindingInput { ref mut body }
                    | ParseState::BindingOutput { ref mut body },
                ) => *body = body_use,
                _ => return Err(error::Error::UnexpectedNesting("body")),
            },

            Some(ParseState::Service { name, ports }) => {
                let name = self.target_namespaced(name)?;
                self.definition.services.push(Service { name, ports })
            }

            Some(ParseState::Port {
                name,
                binding,
                address,
            }) => {
                let location = address.ok_or_else(|| error::Error::MissingElement {
                    parent: name.clone(),
                    element: "address",
                })?;
                let name = self.target_namespaced(name)?;

                match next_state {
                    Some(ParseState::Service { ref mut ports, .. }) => ports.push(Port {
                        name,
                        binding,
                        location,
                    }),
                    _ => return Err(error::Error::UnexpectedNesting("port")),
                }
            }

            Some(ParseState::Address { location }) => match next_state {
                Some(ParseState::Port {
                    ref mut address, ..
                }) => *address = Some(location),
                _ => return Err(error::Error::UnexpectedNesting("address")),
            },

            _ => (),
        }

        self.current_namespaces.leave_scope();
        stack.extend(next_state);
        Ok(())
    }

    fn handle_text<B: BufRead>(
        &mut self,
        stack: &mut [ParseState],
        reader: &Reader<B>,
        text: &BytesText<'_>,
    ) -> Result<(), error::Error> {
        if let Some(ParseState::Documentation(ref mut docs)) = stack.last_mut() {
            *docs = Some(text.unescape_and_decode(reader)?);
        }

        Ok(())
    }
}

pub fn parse(url: Url, loader: &dyn Loader) -> Result<(Definition, Namespaces), error::Error> {
    Parser::new(loader).parse(url)
}

pub fn parse_document(
    url: Url,
    document: &[u8],
    loader: &dyn Loader,
) -> Result<(Definition, Namespaces), error::Error> {
    Parser::new(loader).parse_document(url, document)
}
