use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};
use std::io::{BufRead, Cursor, Write};

pub use quick_xml::{events, Writer};

use super::error::Error;

pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

pub trait ToXml {
    fn to_xml<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), Error>;

    fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        self.to_xml(&mut writer)?;
        Ok(writer.into_inner().into_inner())
    }
}

/// A namespace-resolved element tree, for reading responses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub namespace: Option<String>,
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Element>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub namespace: Option<String>,
    pub name: String,
    pub value: String,
}

type Scope = Vec<(Option<String>, String)>;

fn resolve(scopes: &[Scope], qualified_name: &str, use_default: bool) -> (Option<String>, String) {
    let (prefix, name) = match qualified_name.split_once(':') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, qualified_name),
    };

    // Unprefixed attributes are never in the default namespace
    if prefix.is_none() && !use_default {
        return (None, name.to_owned());
    }

    let namespace = scopes
        .iter()
        .rev()
        .flat_map(|scope| scope.iter().rev())
        .find(|(bound, _)| bound.as_deref() == prefix)
        .map(|(_, namespace)| namespace.clone())
        .filter(|namespace| !namespace.is_empty());

    (namespace, name.to_owned())
}

impl Element {
    pub fn parse(document: &[u8]) -> Result<Self, Error> {
        let mut reader = Reader::from_reader(document);
        reader.trim_text(true);

        let mut buffer = Vec::new();
        let mut scopes = Vec::new();
        let mut stack: Vec<Element> = Vec::new();

        loop {
            match reader.read_event(&mut buffer)? {
                Event::Start(start) => stack.push(Self::open(&reader, &start, &mut scopes)?),

                Event::Empty(start) => {
                    let element = Self::open(&reader, &start, &mut scopes)?;
                    scopes.pop();

                    if let Some(root) = Self::close(&mut stack, element) {
                        return Ok(root);
                    }
                }

                Event::End(..) => {
                    scopes.pop();

                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::MalformedResponse("unbalanced end tag".into()))?;

                    if let Some(root) = Self::close(&mut stack, element) {
                        return Ok(root);
                    }
                }

                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text.unescape_and_decode(&reader)?);
                    }
                }

                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&data.unescape_and_decode(&reader)?);
                    }
                }

                Event::Eof => {
                    return Err(Error::MalformedResponse(
                        "document has no root element".into(),
                    ))
                }

                _ => (),
            }

            buffer.clear();
        }
    }

    fn open<B: BufRead>(
        reader: &Reader<B>,
        start: &BytesStart<'_>,
        scopes: &mut Vec<Scope>,
    ) -> Result<Self, Error> {
        let mut scope = Vec::new();
        let mut attributes = Vec::new();

        for attribute in start.attributes() {
            let attribute = attribute?;
            let key = reader.decode(attribute.key)?;
            let value = attribute.unescape_and_decode_value(reader)?;

            match key.split_once(':') {
                Some(("xmlns", prefix)) => scope.push((Some(prefix.to_owned()), value)),
                None if key == "xmlns" => scope.push((None, value)),
                _ => attributes.push((key.to_owned(), value)),
            }
        }

        scopes.push(scope);

        let (namespace, name) = resolve(scopes, reader.decode(start.name())?, true);
        let attributes = attributes
            .into_iter()
            .map(|(key, value)| {
                let (namespace, name) = resolve(scopes, &key, false);
                Attribute {
                    namespace,
                    name,
                    value,
                }
            })
            .collect();

        Ok(Self {
            namespace,
            name,
            attributes,
            children: Vec::new(),
            text: String::new(),
        })
    }

    fn close(stack: &mut [Element], element: Element) -> Option<Element> {
        match stack.last_mut() {
            Some(parent) => {
                parent.children.push(element);
                None
            }

            None => Some(element),
        }
    }

    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    pub fn child(&self, namespace: &str, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.is(namespace, name))
    }

    /// First child with the given local name, in any namespace.
    pub fn child_local(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_local<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Follows `(namespace, name)` steps through the children, starting below `self`.
    pub fn path(&self, steps: &[(&str, &str)]) -> Option<&Element> {
        steps
            .iter()
            .try_fold(self, |element, (namespace, name)| element.child(namespace, name))
    }

    pub fn attribute(&self, namespace: Option<&str>, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name && attribute.namespace.as_deref() == namespace)
            .map(|attribute| attribute.value.as_str())
    }

    pub fn is_nil(&self) -> bool {
        matches!(
            self.attribute(Some(XSI_NAMESPACE), "nil"),
            Some("true" | "1")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <Response xmlns="http://tempuri.org/" xmlns:i="http://www.w3.org/2001/XMLSchema-instance">
      <Result>true</Result>
      <Missing i:nil="true"/>
      <Note><![CDATA[a < b]]></Note>
    </Response>
  </s:Body>
</s:Envelope>"#;

    #[test]
    fn test_parse_resolves_prefixes_and_defaults() {
        let envelope = Element::parse(RESPONSE.as_bytes()).unwrap();
        assert!(envelope.is("http://schemas.xmlsoap.org/soap/envelope/", "Envelope"));

        let result = envelope
            .path(&[
                ("http://schemas.xmlsoap.org/soap/envelope/", "Body"),
                ("http://tempuri.org/", "Response"),
                ("http://tempuri.org/", "Result"),
            ])
            .unwrap();
        assert_eq!(result.text, "true");

        let response = &envelope.children[0].children[0];
        assert!(response.child_local("Missing").unwrap().is_nil());
        assert!(!result.is_nil());
        assert_eq!(response.child_local("Note").unwrap().text, "a < b");
    }

    #[test]
    fn test_parse_rejects_truncated_documents() {
        assert!(Element::parse(b"<a><b></b>").is_err());
        assert!(matches!(
            Element::parse(b""),
            Err(Error::MalformedResponse(_))
        ));
    }
}
