/// A decoded SOAP response, shaped by the schema of the operation's output.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Nil,
    Scalar(Scalar),
    Array(Vec<Reply>),
    Object(Object),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
}

/// A complex value with its members in document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    pub type_name: Option<String>,
    pub fields: Vec<(String, Reply)>,
}

impl Object {
    pub fn new(type_name: Option<String>) -> Self {
        Self {
            type_name,
            fields: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Reply> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }
}

impl Reply {
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Reply::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Reply> {
        self.as_object().and_then(|object| object.get(name))
    }
}
