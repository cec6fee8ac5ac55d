//! Parsers for the textual signatures rendered by [`panopto_wsdl::signature`].
//!
//! ```text
//! Signature  := QName [ '(' [ Member { ',' Member } ] ')' ]
//! Member     := 'None' | [ Name ':' ] QName
//! QName      := Prefix ':' Name
//! ```
//!
//! Names may carry a `[]` suffix marking a repeated member.

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

/// A parsed element or type signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDescriptor {
    pub namespace: String,
    pub name: String,

    /// `None` for a simple type, which carries no member list at all.
    pub members: Option<Vec<Member>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Member {
    Named {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        namespace: String,
        #[serde(rename = "type")]
        ty: String,
    },

    /// An `xs:any` placeholder.
    Any,
}

/// Parameters of one direction of an operation, keyed by name with `prefix:Type` values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Parameters {
    NoParameters,
    Named(IndexMap<String, String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Unexpected end of signature, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    #[error("Unexpected {found:?} at offset {offset}, expected {expected}")]
    Unexpected {
        found: char,
        offset: usize,
        expected: &'static str,
    },

    #[error("Trailing input at offset {0}")]
    TrailingInput(usize),
}

struct Cursor<'s> {
    input: &'s str,
    offset: usize,
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, ':' | ',' | '(' | ')')
}

impl<'s> Cursor<'s> {
    fn new(input: &'s str) -> Self {
        Self { input, offset: 0 }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.input[self.offset..];
        self.offset += rest.len() - rest.trim_start().len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.input[self.offset..].chars().next()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.offset += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char, what: &'static str) -> Result<(), SignatureError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn token(&mut self, what: &'static str) -> Result<&'s str, SignatureError> {
        self.skip_whitespace();

        let input = self.input;
        let rest = &input[self.offset..];
        let len = rest.find(is_delimiter).unwrap_or(rest.len());

        if len == 0 {
            return Err(self.unexpected(what));
        }

        self.offset += len;
        Ok(&rest[..len])
    }

    fn unexpected(&mut self, expected: &'static str) -> SignatureError {
        match self.peek() {
            Some(found) => SignatureError::Unexpected {
                found,
                offset: self.offset,
                expected,
            },

            None => SignatureError::UnexpectedEnd { expected },
        }
    }

    fn finish(&mut self) -> Result<(), SignatureError> {
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(SignatureError::TrailingInput(self.offset)),
        }
    }

    fn qualified_name(&mut self) -> Result<(&'s str, &'s str), SignatureError> {
        let prefix = self.token("a namespace prefix")?;
        self.expect(':', "':'")?;
        let name = self.token("a name")?;

        Ok((prefix, name))
    }

    fn member(&mut self) -> Result<Member, SignatureError> {
        let first = self.token("a member")?;

        if first == "None" && matches!(self.peek(), Some(',' | ')') | None) {
            return Ok(Member::Any);
        }

        self.expect(':', "':'")?;
        let second = self.token("a type")?;

        let member = if self.eat(':') {
            Member::Named {
                name: Some(first.to_owned()),
                namespace: second.to_owned(),
                ty: self.token("a type name")?.to_owned(),
            }
        } else {
            Member::Named {
                name: None,
                namespace: first.to_owned(),
                ty: second.to_owned(),
            }
        };

        Ok(member)
    }

    fn members(&mut self) -> Result<Vec<Member>, SignatureError> {
        let mut members = Vec::new();

        if self.peek() == Some(')') {
            return Ok(members);
        }

        loop {
            members.push(self.member()?);

            if !self.eat(',') {
                break Ok(members);
            }
        }
    }
}

/// Parses `prefix:Name(member, ...)` into a [`TypeDescriptor`].
pub fn parse_type_signature(signature: &str) -> Result<TypeDescriptor, SignatureError> {
    let mut cursor = Cursor::new(signature);
    let (namespace, name) = cursor.qualified_name()?;

    let members = if cursor.eat('(') {
        let members = cursor.members()?;
        cursor.expect(')', "')'")?;
        Some(members)
    } else {
        None
    };

    cursor.finish()?;

    Ok(TypeDescriptor {
        namespace: namespace.to_owned(),
        name: name.to_owned(),
        members,
    })
}

/// Parses `name: prefix:Type, ...`. An empty signature has no parameters.
pub fn parse_operation_signature(signature: &str) -> Result<Parameters, SignatureError> {
    if signature.trim().is_empty() {
        return Ok(Parameters::NoParameters);
    }

    let mut cursor = Cursor::new(signature);
    let mut parameters = IndexMap::new();

    loop {
        let name = cursor.token("a parameter name")?;
        cursor.expect(':', "':'")?;
        let (prefix, ty) = cursor.qualified_name()?;

        parameters.insert(name.to_owned(), format!("{}:{}", prefix, ty));

        if !cursor.eat(',') {
            break;
        }
    }

    cursor.finish()?;
    Ok(Parameters::Named(parameters))
}
