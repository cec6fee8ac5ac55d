use panopto_util::{Object, Reply, Scalar, Value};

/// Conversion of decoded SOAP responses into plain [`Value`]s.
///
/// Objects become ordered maps keyed by member name, arrays become sequences
/// and scalars pass through with their type. Type names are dropped.
pub trait Decode {
    fn decode(&self) -> Value;
}

impl Decode for Reply {
    fn decode(&self) -> Value {
        match self {
            Reply::Nil => Value::Null,
            Reply::Scalar(scalar) => scalar.decode(),
            Reply::Array(items) => items.decode(),
            Reply::Object(object) => object.decode(),
        }
    }
}

impl Decode for Scalar {
    fn decode(&self) -> Value {
        match self {
            Scalar::Bool(value) => Value::Bool(*value),
            Scalar::Int(value) => Value::Int(*value),
            Scalar::Float(value) => Value::Float(*value),
            Scalar::String(value) => Value::String(value.clone()),
            Scalar::Bytes(value) => Value::Bytes(value.clone()),
        }
    }
}

impl Decode for Object {
    fn decode(&self) -> Value {
        Value::Map(
            self.fields
                .iter()
                .map(|(name, value)| (name.clone(), value.decode()))
                .collect(),
        )
    }
}

impl<T: Decode> Decode for [T] {
    fn decode(&self) -> Value {
        Value::Sequence(self.iter().map(Decode::decode).collect())
    }
}
