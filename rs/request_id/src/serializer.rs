//! A serde `Serializer` that reduces any serializable request record to a
//! `RequestIdValue`.
//!
//! `None` values serialize to nothing, so optional fields that are not set
//! do not contribute to the request id.

use crate::value::RequestIdValue;
use crate::RequestIdError;
use serde::ser::{self, Impossible, Serialize};

type Value = Option<RequestIdValue>;

pub(crate) struct ValueSerializer;

fn string<T: ToString>(value: T) -> Result<Value, RequestIdError> {
    Ok(Some(RequestIdValue::String(value.to_string())))
}

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = RequestIdError;

    type SerializeSeq = SeqSerializer;
    type SerializeTuple = SeqSerializer;
    type SerializeTupleStruct = SeqSerializer;
    type SerializeTupleVariant = Impossible<Value, RequestIdError>;
    type SerializeMap = MapSerializer;
    type SerializeStruct = MapSerializer;
    type SerializeStructVariant = Impossible<Value, RequestIdError>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> Result<Value, RequestIdError> {
        string(v)
    }

    fn serialize_i8(self, v: i8) -> Result<Value, RequestIdError> {
        string(v)
    }

    fn serialize_i16(self, v: i16) -> Result<Value, RequestIdError> {
        string(v)
    }

    fn serialize_i32(self, v: i32) -> Result<Value, RequestIdError> {
        string(v)
    }

    fn serialize_i64(self, v: i64) -> Result<Value, RequestIdError> {
        string(v)
    }

    fn serialize_u8(self, v: u8) -> Result<Value, RequestIdError> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u16(self, v: u16) -> Result<Value, RequestIdError> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u32(self, v: u32) -> Result<Value, RequestIdError> {
        self.serialize_u64(v as u64)
    }

    fn serialize_u64(self, v: u64) -> Result<Value, RequestIdError> {
        Ok(Some(RequestIdValue::U64(v)))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, RequestIdError> {
        let v = u64::try_from(v).map_err(|_| RequestIdError::UnsupportedType("u128"))?;
        self.serialize_u64(v)
    }

    fn serialize_f32(self, v: f32) -> Result<Value, RequestIdError> {
        string(v)
    }

    fn serialize_f64(self, v: f64) -> Result<Value, RequestIdError> {
        string(v)
    }

    fn serialize_char(self, v: char) -> Result<Value, RequestIdError> {
        string(v)
    }

    fn serialize_str(self, v: &str) -> Result<Value, RequestIdError> {
        string(v)
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, RequestIdError> {
        Ok(Some(RequestIdValue::Bytes(v.to_vec())))
    }

    fn serialize_none(self) -> Result<Value, RequestIdError> {
        Ok(None)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value, RequestIdError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, RequestIdError> {
        Err(RequestIdError::UnsupportedType("unit"))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, RequestIdError> {
        Err(RequestIdError::UnsupportedType("unit struct"))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value, RequestIdError> {
        string(variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, RequestIdError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, RequestIdError> {
        let fields = match value.serialize(ValueSerializer)? {
            Some(value) => vec![(variant.as_bytes().to_vec(), value)],
            None => vec![],
        };
        Ok(Some(RequestIdValue::Map(fields)))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqSerializer, RequestIdError> {
        Ok(SeqSerializer {
            elements: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqSerializer, RequestIdError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqSerializer, RequestIdError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, RequestIdError> {
        Err(RequestIdError::UnsupportedType("tuple variant"))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapSerializer, RequestIdError> {
        Ok(MapSerializer {
            fields: Vec::with_capacity(len.unwrap_or(0)),
            pending_key: None,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<MapSerializer, RequestIdError> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, RequestIdError> {
        Err(RequestIdError::UnsupportedType("struct variant"))
    }
}

pub(crate) struct SeqSerializer {
    elements: Vec<RequestIdValue>,
}

impl SeqSerializer {
    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), RequestIdError> {
        if let Some(element) = value.serialize(ValueSerializer)? {
            self.elements.push(element);
        }
        Ok(())
    }
}

impl ser::SerializeSeq for SeqSerializer {
    type Ok = Value;
    type Error = RequestIdError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.push(value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(Some(RequestIdValue::Array(self.elements)))
    }
}

impl ser::SerializeTuple for SeqSerializer {
    type Ok = Value;
    type Error = RequestIdError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.push(value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(Some(RequestIdValue::Array(self.elements)))
    }
}

impl ser::SerializeTupleStruct for SeqSerializer {
    type Ok = Value;
    type Error = RequestIdError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.push(value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(Some(RequestIdValue::Array(self.elements)))
    }
}

pub(crate) struct MapSerializer {
    fields: Vec<(Vec<u8>, RequestIdValue)>,
    pending_key: Option<Vec<u8>>,
}

impl MapSerializer {
    fn push<T: ?Sized + Serialize>(&mut self, key: Vec<u8>, value: &T) -> Result<(), RequestIdError> {
        if let Some(value) = value.serialize(ValueSerializer)? {
            self.fields.push((key, value));
        }
        Ok(())
    }
}

impl ser::SerializeMap for MapSerializer {
    type Ok = Value;
    type Error = RequestIdError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Self::Error> {
        let key = match key.serialize(ValueSerializer)? {
            Some(RequestIdValue::String(s)) => s.into_bytes(),
            Some(RequestIdValue::Bytes(b)) => b,
            _ => return Err(RequestIdError::InvalidMapKey),
        };
        self.pending_key = Some(key);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        let key = self
            .pending_key
            .take()
            .ok_or(RequestIdError::InvalidMapKey)?;
        self.push(key, value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(Some(RequestIdValue::Map(self.fields)))
    }
}

impl ser::SerializeStruct for MapSerializer {
    type Ok = Value;
    type Error = RequestIdError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        self.push(key.as_bytes().to_vec(), value)
    }

    fn end(self) -> Result<Value, Self::Error> {
        Ok(Some(RequestIdValue::Map(self.fields)))
    }
}
