//! SOAP 1.1 document/literal envelopes, written from named arguments and read
//! back into [`Reply`] values guided by the schema.

use base64::{engine::general_purpose::STANDARD, Engine};
use panopto_wsdl::{
    error::Error as WsdlError,
    types::{self, Definition, Field, FieldKind, Message, NamespacedName, Namespaces, PartContent, TypeKind},
};
use quick_xml::{
    events::{BytesStart, BytesText, Event},
    Writer,
};
use std::io::Write;

use super::{
    error::Error,
    reply::{Object, Reply, Scalar},
    value::{Arguments, Value},
    xml::{Element, ToXml, XSI_NAMESPACE},
};

pub const SOAP_ENVELOPE_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";

const MAX_TYPE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy)]
pub struct Schema<'a> {
    pub definition: &'a Definition,
    pub namespaces: &'a Namespaces,
}

/// How the content of an element is read and written.
#[derive(Debug)]
enum Shape<'a> {
    Complex {
        type_name: Option<&'a str>,
        fields: Vec<&'a Field>,
    },
    Scalar(&'a str),
    Unknown,
}

pub struct RequestEnvelope<'a> {
    pub schema: Schema<'a>,
    pub operation: &'a str,
    pub message: Option<&'a Message>,
    pub arguments: &'a Arguments,
}

impl<'a> Schema<'a> {
    pub fn new(definition: &'a Definition, namespaces: &'a Namespaces) -> Self {
        Self {
            definition,
            namespaces,
        }
    }

    fn element(&self, name: &NamespacedName) -> Result<&'a types::Element, Error> {
        self.definition.find_element(name).ok_or_else(|| {
            WsdlError::UnknownReference {
                kind: "element",
                name: name.name.clone(),
            }
            .into()
        })
    }

    fn name_shape(&self, name: &'a NamespacedName, depth: usize) -> Shape<'a> {
        if name.is_xsd(self.namespaces) {
            return Shape::Scalar(&name.name);
        }

        if depth > MAX_TYPE_DEPTH {
            return Shape::Unknown;
        }

        match self.definition.find_type(name) {
            Some(ty) => self.kind_shape(&ty.kind, Some(&ty.name.name), depth + 1),
            None => Shape::Unknown,
        }
    }

    fn kind_shape(&self, kind: &'a TypeKind, type_name: Option<&'a str>, depth: usize) -> Shape<'a> {
        match kind {
            TypeKind::Struct(_) | TypeKind::Extension { .. } => Shape::Complex {
                type_name,
                fields: self.definition.fields(kind),
            },

            TypeKind::Simple(base) | TypeKind::Enumeration { base, .. } | TypeKind::Alias(base) => {
                self.name_shape(base, depth)
            }
        }
    }

    fn field_shape(&self, field: &'a Field) -> Shape<'a> {
        match &field.ty {
            FieldKind::Type(name) => self.name_shape(name, 0),

            FieldKind::Ref(name) => match self.definition.find_element(name) {
                Some(element) => self.kind_shape(&element.kind, None, 0),
                None => Shape::Unknown,
            },

            FieldKind::Inner(kind) => self.kind_shape(kind, None, 0),
            FieldKind::Any => Shape::Unknown,
        }
    }

    fn decode_node(&self, shape: &Shape<'a>, node: &Element) -> Result<Reply, Error> {
        if node.is_nil() {
            return Ok(Reply::Nil);
        }

        match shape {
            Shape::Complex { type_name, fields } => {
                let mut object = Object::new(type_name.map(ToOwned::to_owned));

                for field in fields {
                    let value = match field.ty {
                        FieldKind::Any => {
                            let extra: Vec<_> = node
                                .children
                                .iter()
                                .filter(|child| !fields.iter().any(|field| field.name.name == child.name))
                                .map(decode_generic)
                                .collect();

                            if extra.is_empty() {
                                continue;
                            }

                            Reply::Array(extra)
                        }

                        _ => {
                            let shape = self.field_shape(field);
                            let mut found = node.children_local(&field.name.name);

                            if field.max_occurs.is_many() {
                                Reply::Array(
                                    found
                                        .map(|child| self.decode_node(&shape, child))
                                        .collect::<Result<_, _>>()?,
                                )
                            } else {
                                match found.next() {
                                    Some(child) => self.decode_node(&shape, child)?,
                                    None => Reply::Nil,
                                }
                            }
                        }
                    };

                    object.fields.push((field.name.name.clone(), value));
                }

                Ok(Reply::Object(object))
            }

            Shape::Scalar(builtin) => decode_scalar(builtin, &node.text),
            Shape::Unknown => Ok(decode_generic(node)),
        }
    }
}

fn decode_generic(node: &Element) -> Reply {
    if node.is_nil() {
        Reply::Nil
    } else if node.children.is_empty() {
        Reply::Scalar(Scalar::String(node.text.clone()))
    } else {
        Reply::Object(Object {
            type_name: None,
            fields: node
                .children
                .iter()
                .map(|child| (child.name.clone(), decode_generic(child)))
                .collect(),
        })
    }
}

fn decode_scalar(builtin: &str, text: &str) -> Result<Reply, Error> {
    let invalid = || Error::MalformedResponse(format!("invalid {} value {:?}", builtin, text));
    let trimmed = text.trim();

    let scalar = match builtin {
        "boolean" => match trimmed {
            "true" | "1" => Scalar::Bool(true),
            "false" | "0" => Scalar::Bool(false),
            _ => return Err(invalid()),
        },

        "byte" | "short" | "int" | "long" | "unsignedByte" | "unsignedShort" | "unsignedInt" => {
            Scalar::Int(trimmed.parse().map_err(|_| invalid())?)
        }

        // Unbounded or unsigned 64 bit, kept as text once past i64
        "integer" | "unsignedLong" | "nonNegativeInteger" | "positiveInteger"
        | "nonPositiveInteger" | "negativeInteger" => match trimmed.parse() {
            Ok(value) => Scalar::Int(value),
            Err(_) if is_integer(trimmed) => Scalar::String(trimmed.to_owned()),
            Err(_) => return Err(invalid()),
        },

        "float" | "double" | "decimal" => Scalar::Float(trimmed.parse().map_err(|_| invalid())?),

        "base64Binary" => Scalar::Bytes(STANDARD.decode(trimmed).map_err(|_| invalid())?),

        _ => Scalar::String(text.to_owned()),
    };

    Ok(Reply::Scalar(scalar))
}

fn is_integer(text: &str) -> bool {
    let digits = text.strip_prefix(|c| c == '-' || c == '+').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn fault_error(fault: &Element) -> Error {
    let code = fault
        .child_local("faultcode")
        .or_else(|| fault.child_local("Code").and_then(|code| code.child_local("Value")))
        .map(|code| code.text.clone())
        .unwrap_or_default();

    let message = fault
        .child_local("faultstring")
        .or_else(|| fault.child_local("Reason").and_then(|reason| reason.child_local("Text")))
        .map(|message| message.text.clone())
        .unwrap_or_default();

    Error::Fault { code, message }
}

/// Reads a response envelope for `message`.
///
/// A wrapper element with a single member is unwrapped to that member.
pub fn decode_response(
    schema: Schema<'_>,
    message: Option<&Message>,
    document: &[u8],
) -> Result<Reply, Error> {
    let envelope = Element::parse(document)?;
    let body = envelope
        .child_local("Body")
        .ok_or_else(|| Error::MalformedResponse("envelope has no Body".into()))?;

    if let Some(fault) = body.child_local("Fault") {
        return Err(fault_error(fault));
    }

    let message = match message {
        Some(message) => message,
        None => return Ok(Reply::Nil),
    };

    let mut parts = Vec::new();

    for part in &message.parts {
        let value = match &part.content {
            PartContent::Element(name) => {
                let element = schema.element(name)?;
                let node = body.child_local(&element.name.name).ok_or_else(|| {
                    Error::MalformedResponse(format!("Body has no {} element", element.name.name))
                })?;

                schema.decode_node(&schema.kind_shape(&element.kind, None, 0), node)?
            }

            PartContent::Type(ty) => match body.child_local(&part.name) {
                Some(node) => schema.decode_node(&schema.name_shape(ty, 0), node)?,
                None => Reply::Nil,
            },
        };

        parts.push((part.name.clone(), value));
    }

    Ok(match parts.len() {
        0 => Reply::Nil,
        1 => parts.pop().map_or(Reply::Nil, |(_, value)| unwrap_single(value)),
        _ => Reply::Object(Object {
            type_name: None,
            fields: parts,
        }),
    })
}

// An empty wrapper is the response of an operation with no result
fn unwrap_single(reply: Reply) -> Reply {
    match reply {
        Reply::Object(Object { mut fields, .. }) if fields.len() <= 1 => {
            fields.pop().map_or(Reply::Nil, |(_, value)| value)
        }
        other => other,
    }
}

impl RequestEnvelope<'_> {
    fn argument_type(name: &str, expected: &'static str) -> Error {
        Error::ArgumentType {
            argument: name.to_owned(),
            expected,
        }
    }

    fn write_message<W: Write>(&self, writer: &mut Writer<W>, message: &Message) -> Result<(), Error> {
        let mut accepted = Vec::new();

        for part in &message.parts {
            match &part.content {
                PartContent::Element(name) => {
                    let element = self.schema.element(name)?;
                    let qualified = element.name.qualified(self.schema.namespaces);

                    match self.schema.kind_shape(&element.kind, None, 0) {
                        Shape::Complex { fields, .. } => {
                            accepted.extend(fields.iter().map(|field| field.name.name.as_str()));
                            self.write_complex(writer, &qualified, &fields, self.arguments, false)?;
                        }

                        shape => {
                            accepted.push(part.name.as_str());
                            let value = self.arguments.get(&part.name).unwrap_or(&Value::Null);
                            self.write_value(writer, &qualified, &part.name, &shape, value)?;
                        }
                    }
                }

                PartContent::Type(ty) => {
                    accepted.push(part.name.as_str());
                    let value = self.arguments.get(&part.name).unwrap_or(&Value::Null);
                    let shape = self.schema.name_shape(ty, 0);
                    self.write_value(writer, &part.name, &part.name, &shape, value)?;
                }
            }
        }

        self.check_known(self.arguments, &accepted)
    }

    fn check_known(&self, arguments: &Arguments, accepted: &[&str]) -> Result<(), Error> {
        match arguments.keys().find(|name| !accepted.contains(&name.as_str())) {
            Some(unknown) => Err(Error::UnknownArgument {
                operation: self.operation.to_owned(),
                argument: unknown.clone(),
            }),
            None => Ok(()),
        }
    }

    fn write_complex<W: Write>(
        &self,
        writer: &mut Writer<W>,
        qualified: &str,
        fields: &[&Field],
        arguments: &Arguments,
        strict: bool,
    ) -> Result<(), Error> {
        let open = !fields.iter().any(|field| matches!(field.ty, FieldKind::Any));

        if strict && open {
            let accepted: Vec<_> = fields.iter().map(|field| field.name.name.as_str()).collect();
            self.check_known(arguments, &accepted)?;
        }

        let start = BytesStart::owned_name(qualified);
        writer.write_event(Event::Start(start.to_borrowed()))?;

        for field in fields {
            if let FieldKind::Any = field.ty {
                continue;
            }

            let value = match arguments.get(&field.name.name) {
                Some(value) => value,
                None => continue,
            };

            let qualified = field.name.qualified(self.schema.namespaces);
            let shape = self.schema.field_shape(field);

            match value {
                Value::Sequence(values) if field.max_occurs.is_many() => {
                    for value in values {
                        self.write_value(writer, &qualified, &field.name.name, &shape, value)?;
                    }
                }

                Value::Sequence(_) => {
                    return Err(Self::argument_type(&field.name.name, "a single value"))
                }

                _ => self.write_value(writer, &qualified, &field.name.name, &shape, value)?,
            }
        }

        writer.write_event(Event::End(start.to_end()))?;
        Ok(())
    }

    fn write_value<W: Write>(
        &self,
        writer: &mut Writer<W>,
        qualified: &str,
        name: &str,
        shape: &Shape<'_>,
        value: &Value,
    ) -> Result<(), Error> {
        match (shape, value) {
            (_, Value::Null) => {
                let mut start = BytesStart::owned_name(qualified);
                start.push_attribute(("xsi:nil", "true"));
                writer.write_event(Event::Empty(start))?;
            }

            (Shape::Complex { fields, .. }, Value::Map(map)) => {
                self.write_complex(writer, qualified, fields, map, true)?
            }

            (Shape::Complex { .. }, _) => return Err(Self::argument_type(name, "a mapping")),

            (Shape::Unknown, Value::Map(map)) => {
                let start = BytesStart::owned_name(qualified);
                writer.write_event(Event::Start(start.to_borrowed()))?;

                for (member, value) in map {
                    self.write_value(writer, member, member, &Shape::Unknown, value)?;
                }

                writer.write_event(Event::End(start.to_end()))?;
            }

            (_, Value::Map(_) | Value::Sequence(_)) => {
                return Err(Self::argument_type(name, "a scalar"))
            }

            (_, scalar) => {
                let text = scalar.lexical().unwrap_or_default();
                let start = BytesStart::owned_name(qualified);

                writer.write_event(Event::Start(start.to_borrowed()))?;
                writer.write_event(Event::Text(BytesText::from_plain_str(&text)))?;
                writer.write_event(Event::End(start.to_end()))?;
            }
        }

        Ok(())
    }
}

impl ToXml for RequestEnvelope<'_> {
    fn to_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), Error> {
        let mut envelope = BytesStart::owned_name("soapenv:Envelope");
        envelope.push_attribute(("xmlns:soapenv", SOAP_ENVELOPE_NAMESPACE));
        envelope.push_attribute(("xmlns:xsi", XSI_NAMESPACE));

        for (prefix, namespace) in self.schema.namespaces.prefix_map() {
            envelope.push_attribute((format!("xmlns:{}", prefix).as_str(), namespace.as_str()));
        }

        let body = BytesStart::owned_name("soapenv:Body");

        writer.write_event(Event::Start(envelope.to_borrowed()))?;
        writer.write_event(Event::Start(body.to_borrowed()))?;

        match self.message {
            Some(message) => self.write_message(writer, message)?,
            None => self.check_known(self.arguments, &[])?,
        }

        writer.write_event(Event::End(body.to_end()))?;
        writer.write_event(Event::End(envelope.to_end()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arguments;
    use panopto_wsdl::{parse_document, Loader};
    use url::Url;

    const USAGE_REPORTING: &[u8] = include_bytes!("../../wsdl/tests/fixtures/UsageReporting.wsdl");

    const TEMPURI: &str = "http://tempuri.org/";
    const V40: &str = "http://schemas.datacontract.org/2004/07/Panopto.Server.Services.PublicAPI.V40";

    struct NoImports;

    impl Loader for NoImports {
        fn load(&self, url: &Url) -> Result<Vec<u8>, WsdlError> {
            Err(WsdlError::UnsupportedScheme(url.scheme().to_owned()))
        }
    }

    fn definition() -> (Definition, Namespaces) {
        let url = Url::parse("http://panopto.example.com/UsageReporting.svc?singleWsdl").unwrap();
        parse_document(&url, USAGE_REPORTING, &NoImports).unwrap()
    }

    fn message<'a>(definition: &'a Definition, name: &str) -> &'a Message {
        definition
            .messages
            .iter()
            .find(|message| message.name.name == name)
            .unwrap()
    }

    #[test]
    fn test_request_follows_schema_order() {
        let (definition, namespaces) = definition();
        let arguments = arguments! {
            "userId" => "00000000-0000-0000-0000-000000000001",
            "pagination" => arguments! { "PageNumber" => 0, "MaxNumberResults" => 10 },
            "auth" => arguments! { "UserKey" => "admin", "Password" => "a&b" },
        };

        let envelope = RequestEnvelope {
            schema: Schema::new(&definition, &namespaces),
            operation: "GetUserDetailedUsage",
            message: Some(message(&definition, "IUsageReporting_GetUserDetailedUsage_InputMessage")),
            arguments: &arguments,
        };

        let request = String::from_utf8(envelope.to_bytes().unwrap()).unwrap();
        let tns = namespaces.prefix_of(TEMPURI).unwrap();
        let v40 = namespaces.prefix_of(V40).unwrap();

        assert!(request.starts_with("<soapenv:Envelope xmlns:soapenv=\"http://schemas.xmlsoap.org/soap/envelope/\""));
        assert!(request.contains(&format!("xmlns:{}=\"{}\"", v40, V40)));
        assert!(request.contains(&format!(
            "<soapenv:Body><{t}:GetUserDetailedUsage>\
             <{t}:auth><{v}:Password>a&amp;b</{v}:Password><{v}:UserKey>admin</{v}:UserKey></{t}:auth>\
             <{t}:userId>00000000-0000-0000-0000-000000000001</{t}:userId>\
             <{t}:pagination><{v}:MaxNumberResults>10</{v}:MaxNumberResults><{v}:PageNumber>0</{v}:PageNumber></{t}:pagination>\
             </{t}:GetUserDetailedUsage></soapenv:Body>",
            t = tns,
            v = v40
        )));
    }

    #[test]
    fn test_request_rejects_unknown_arguments() {
        let (definition, namespaces) = definition();
        let schema = Schema::new(&definition, &namespaces);
        let input = message(&definition, "IUsageReporting_GetUserDetailedUsage_InputMessage");

        let arguments = arguments! { "sessionId" => "x" };
        let envelope = RequestEnvelope {
            schema,
            operation: "GetUserDetailedUsage",
            message: Some(input),
            arguments: &arguments,
        };
        assert!(matches!(
            envelope.to_bytes(),
            Err(Error::UnknownArgument { argument, .. }) if argument == "sessionId"
        ));

        let arguments = arguments! { "auth" => arguments! { "Token" => "x" } };
        let envelope = RequestEnvelope {
            schema,
            operation: "GetUserDetailedUsage",
            message: Some(input),
            arguments: &arguments,
        };
        assert!(matches!(
            envelope.to_bytes(),
            Err(Error::UnknownArgument { argument, .. }) if argument == "Token"
        ));

        let arguments = arguments! { "auth" => "admin" };
        let envelope = RequestEnvelope {
            schema,
            operation: "GetUserDetailedUsage",
            message: Some(input),
            arguments: &arguments,
        };
        assert!(matches!(
            envelope.to_bytes(),
            Err(Error::ArgumentType { expected: "a mapping", .. })
        ));
    }

    #[test]
    fn test_null_arguments_are_nil() {
        let (definition, namespaces) = definition();
        let arguments = arguments! { "pagination" => Value::Null };
        let envelope = RequestEnvelope {
            schema: Schema::new(&definition, &namespaces),
            operation: "GetUserDetailedUsage",
            message: Some(message(&definition, "IUsageReporting_GetUserDetailedUsage_InputMessage")),
            arguments: &arguments,
        };

        let request = String::from_utf8(envelope.to_bytes().unwrap()).unwrap();
        assert!(request.contains(&format!(
            "<{}:pagination xsi:nil=\"true\"/>",
            namespaces.prefix_of(TEMPURI).unwrap()
        )));
    }

    #[test]
    fn test_decode_response_unwraps_result() {
        let (definition, namespaces) = definition();
        let response = format!(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body>
<GetUserDetailedUsageResponse xmlns="http://tempuri.org/">
  <GetUserDetailedUsageResult xmlns:a="{v40}" xmlns:i="http://www.w3.org/2001/XMLSchema-instance">
    <a:PagedResults>
      <a:DetailedUsageResult><a:MinutesViewed>1.5</a:MinutesViewed><a:SessionId>s-1</a:SessionId><a:Time>2021-04-01T10:00:00Z</a:Time><a:UserId>u-1</a:UserId></a:DetailedUsageResult>
      <a:DetailedUsageResult><a:MinutesViewed>3</a:MinutesViewed><a:SessionId>s-2</a:SessionId><a:Time i:nil="true"/><a:UserId>u-1</a:UserId></a:DetailedUsageResult>
    </a:PagedResults>
    <a:TotalNumberResults>2</a:TotalNumberResults>
  </GetUserDetailedUsageResult>
</GetUserDetailedUsageResponse>
</s:Body></s:Envelope>"#,
            v40 = V40
        );

        let reply = decode_response(
            Schema::new(&definition, &namespaces),
            Some(message(&definition, "IUsageReporting_GetUserDetailedUsage_OutputMessage")),
            response.as_bytes(),
        )
        .unwrap();

        let object = reply.as_object().unwrap();
        assert_eq!(object.type_name.as_deref(), Some("DetailedUsageResponse"));
        assert_eq!(
            reply.get("TotalNumberResults"),
            Some(&Reply::Scalar(Scalar::Int(2)))
        );

        let results = match reply.get("PagedResults").and_then(|paged| paged.get("DetailedUsageResult")) {
            Some(Reply::Array(results)) => results,
            other => panic!("unexpected results {:?}", other),
        };
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].get("MinutesViewed"), Some(&Reply::Scalar(Scalar::Float(1.5))));
        assert_eq!(
            results[1].get("SessionId"),
            Some(&Reply::Scalar(Scalar::String("s-2".into())))
        );
        assert_eq!(results[1].get("Time"), Some(&Reply::Nil));
    }

    #[test]
    fn test_decode_response_reports_faults() {
        let (definition, namespaces) = definition();
        let response = br#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body>
<s:Fault><faultcode>a:InvalidSecurity</faultcode><faultstring xml:lang="en-US">Not authorized</faultstring></s:Fault>
</s:Body></s:Envelope>"#;

        let error = decode_response(
            Schema::new(&definition, &namespaces),
            Some(message(&definition, "IUsageReporting_Ping_OutputMessage")),
            response,
        )
        .unwrap_err();

        assert!(matches!(
            error,
            Error::Fault { code, message } if code == "a:InvalidSecurity" && message == "Not authorized"
        ));
    }

    #[test]
    fn test_empty_wrapper_is_nil() {
        let empty = Reply::Object(Object::new(Some("ClearCacheResponse".into())));
        assert_eq!(unwrap_single(empty), Reply::Nil);

        let single = Reply::Object(Object {
            type_name: None,
            fields: vec![("PingResult".into(), Reply::Scalar(Scalar::String("pong".into())))],
        });
        assert_eq!(unwrap_single(single), Reply::Scalar(Scalar::String("pong".into())));
    }

    #[test]
    fn test_unbounded_integers_keep_their_digits() {
        assert_eq!(
            decode_scalar("unsignedLong", "18446744073709551615").unwrap(),
            Reply::Scalar(Scalar::String("18446744073709551615".into()))
        );
        assert_eq!(
            decode_scalar("integer", " -99999999999999999999 ").unwrap(),
            Reply::Scalar(Scalar::String("-99999999999999999999".into()))
        );
        assert_eq!(
            decode_scalar("unsignedLong", "42").unwrap(),
            Reply::Scalar(Scalar::Int(42))
        );

        assert!(matches!(
            decode_scalar("unsignedLong", "4.2e1"),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            decode_scalar("long", "18446744073709551615"),
            Err(Error::MalformedResponse(_))
        ));
    }
}
