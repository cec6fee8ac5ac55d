//! Textual signatures for schema elements, types and operation messages.
//!
//! Elements and complex types render as `prefix:Name(member: prefix:Type, ...)`,
//! simple types as `prefix:Name`. Repeated members carry a `[]` suffix and
//! `xs:any` placeholders render as `None`.

use super::{
    error,
    types::{
        Binding, Definition, Element, Field, FieldKind, Namespaces, PartContent, Type, TypeKind,
    },
};

pub trait Signature {
    fn signature(&self, definition: &Definition, namespaces: &Namespaces) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

fn member_type(field: &Field, namespaces: &Namespaces) -> String {
    let ty = match &field.ty {
        FieldKind::Type(name) => name.qualified(namespaces),
        FieldKind::Ref(name) | FieldKind::Inner(TypeKind::Alias(name)) => name.qualified(namespaces),
        FieldKind::Inner(_) => field.name.qualified(namespaces),
        FieldKind::Any => "xsd:anyType".to_owned(),
    };

    if field.max_occurs.is_many() {
        format!("{}[]", ty)
    } else {
        ty
    }
}

fn member(field: &Field, namespaces: &Namespaces) -> String {
    match field.ty {
        FieldKind::Any => "None".to_owned(),
        _ => format!("{}: {}", field.name.name, member_type(field, namespaces)),
    }
}

fn members(fields: &[&Field], namespaces: &Namespaces) -> String {
    fields
        .iter()
        .map(|field| member(field, namespaces))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Signature for Element {
    fn signature(&self, definition: &Definition, namespaces: &Namespaces) -> String {
        let name = self.name.qualified(namespaces);

        match definition.complex_fields(&self.kind) {
            Some(fields) => format!("{}({})", name, members(&fields, namespaces)),

            None => match &self.kind {
                TypeKind::Alias(ty) | TypeKind::Simple(ty) => {
                    format!("{}({})", name, ty.qualified(namespaces))
                }
                TypeKind::Enumeration { base, .. } => {
                    format!("{}({})", name, base.qualified(namespaces))
                }
                _ => name,
            },
        }
    }
}

impl Signature for Type {
    fn signature(&self, definition: &Definition, namespaces: &Namespaces) -> String {
        let name = self.name.qualified(namespaces);

        match &self.kind {
            TypeKind::Struct(_) | TypeKind::Extension { .. } => {
                format!("{}({})", name, members(&definition.fields(&self.kind), namespaces))
            }

            TypeKind::Alias(base) => format!("{}({})", name, base.qualified(namespaces)),

            TypeKind::Simple(_) | TypeKind::Enumeration { .. } => name,
        }
    }
}

/// Renders the parameters of one direction of a bound operation as
/// `name: prefix:Type, ...`, or an empty string when there are none.
///
/// Wrapped document/literal messages expand to the wrapper element's members.
pub fn operation_signature(
    definition: &Definition,
    namespaces: &Namespaces,
    binding: &Binding,
    operation: &str,
    direction: Direction,
) -> Result<String, error::Error> {
    let port_type =
        definition
            .find_port_type(&binding.ty)
            .ok_or_else(|| error::Error::UnknownReference {
                kind: "port type",
                name: binding.ty.name.clone(),
            })?;

    let operation = port_type
        .find_operation(operation)
        .ok_or_else(|| error::Error::UnknownReference {
            kind: "operation",
            name: operation.to_owned(),
        })?;

    let message = match direction {
        Direction::Input => &operation.input,
        Direction::Output => &operation.output,
    };

    let message = match message {
        Some(message) => message,
        None => return Ok(String::new()),
    };

    let message =
        definition
            .find_message(message)
            .ok_or_else(|| error::Error::UnknownReference {
                kind: "message",
                name: message.name.clone(),
            })?;

    let mut parameters = Vec::new();

    for part in &message.parts {
        match &part.content {
            PartContent::Element(name) => {
                let element =
                    definition
                        .find_element(name)
                        .ok_or_else(|| error::Error::UnknownReference {
                            kind: "element",
                            name: name.name.clone(),
                        })?;

                match definition.complex_fields(&element.kind) {
                    Some(fields) => parameters.extend(fields.iter().map(|field| {
                        format!("{}: {}", field.name.name, member_type(field, namespaces))
                    })),

                    None => parameters.push(format!(
                        "{}: {}",
                        part.name,
                        element.name.qualified(namespaces)
                    )),
                }
            }

            PartContent::Type(ty) => {
                parameters.push(format!("{}: {}", part.name, ty.qualified(namespaces)))
            }
        }
    }

    Ok(parameters.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse_document, types::XSD_NAMESPACE, Loader};
    use url::Url;

    const USAGE_REPORTING: &[u8] = include_bytes!("../tests/fixtures/UsageReporting.wsdl");

    const V40: &str = "http://schemas.datacontract.org/2004/07/Panopto.Server.Services.PublicAPI.V40";
    const SERIALIZATION: &str = "http://schemas.microsoft.com/2003/10/Serialization/";
    const TEMPURI: &str = "http://tempuri.org/";

    struct NoImports;

    impl Loader for NoImports {
        fn load(&self, url: &Url) -> Result<Vec<u8>, error::Error> {
            Err(error::Error::UnsupportedScheme(url.scheme().to_owned()))
        }
    }

    fn definition() -> (Definition, Namespaces) {
        let url = Url::parse("http://panopto.example.com/UsageReporting.svc?singleWsdl").unwrap();
        parse_document(&url, USAGE_REPORTING, &NoImports).unwrap()
    }

    fn prefix(namespaces: &Namespaces, namespace: &str) -> String {
        namespaces.prefix_of(namespace).unwrap()
    }

    #[test]
    fn test_element_signature() {
        let (definition, namespaces) = definition();
        let element = definition
            .elements
            .iter()
            .find(|element| element.name.name == "GetUserDetailedUsage")
            .unwrap();

        assert_eq!(
            element.signature(&definition, &namespaces),
            format!(
                "{tns}:GetUserDetailedUsage(auth: {v40}:AuthenticationInfo, userId: {ser}:guid, pagination: {v40}:Pagination)",
                tns = prefix(&namespaces, TEMPURI),
                v40 = prefix(&namespaces, V40),
                ser = prefix(&namespaces, SERIALIZATION),
            )
        );
    }

    #[test]
    fn test_simple_element_signature() {
        let (definition, namespaces) = definition();
        let element = definition
            .elements
            .iter()
            .find(|element| element.name.name == "string")
            .unwrap();

        assert_eq!(
            element.signature(&definition, &namespaces),
            format!("{}:string(xsd:string)", prefix(&namespaces, SERIALIZATION))
        );
        assert_eq!(prefix(&namespaces, XSD_NAMESPACE), "xsd");
    }

    #[test]
    fn test_type_signatures() {
        let (definition, namespaces) = definition();
        let v40 = prefix(&namespaces, V40);
        let find = |name: &str| {
            definition
                .types
                .iter()
                .find(|ty| ty.name.name == name)
                .unwrap()
                .signature(&definition, &namespaces)
        };

        assert_eq!(
            find("ArrayOfDetailedUsageResult"),
            format!(
                "{v40}:ArrayOfDetailedUsageResult(DetailedUsageResult: {v40}:DetailedUsageResult[])",
                v40 = v40
            )
        );
        assert_eq!(find("Granularity"), format!("{}:Granularity", v40));
    }

    #[test]
    fn test_operation_signatures() {
        let (definition, namespaces) = definition();
        let binding = &definition.bindings[0];

        assert_eq!(
            operation_signature(&definition, &namespaces, binding, "GetUserDetailedUsage", Direction::Output).unwrap(),
            format!("GetUserDetailedUsageResult: {}:DetailedUsageResponse", prefix(&namespaces, V40))
        );
        assert_eq!(
            operation_signature(&definition, &namespaces, binding, "Ping", Direction::Input).unwrap(),
            ""
        );
        assert!(matches!(
            operation_signature(&definition, &namespaces, binding, "Missing", Direction::Input),
            Err(error::Error::UnknownReference { kind: "operation", .. })
        ));
    }
}
