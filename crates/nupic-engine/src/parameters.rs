// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Region construction parameters.
//!
//! Parameters arrive as a JSON object and are checked against the type's
//! [`ParameterSpec`]s: unknown names are rejected, missing names take the
//! declared default, and every value is converted to its declared
//! [`BasicType`].

use nupic_types::{BasicType, Collection, Element, Handle, TypedBuffer};
use serde_json::{Map, Value};

use crate::spec::{ParameterAccess, ParameterSpec, Spec};
use crate::{EngineError, EngineResult};

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Real32(f32),
    Real64(f64),
    Handle(u64),
    String(String),
    Array(TypedBuffer),
}

impl ParameterValue {
    pub fn basic_type(&self) -> BasicType {
        match self {
            ParameterValue::Byte(_) | ParameterValue::String(_) => BasicType::Byte,
            ParameterValue::Int16(_) => BasicType::Int16,
            ParameterValue::UInt16(_) => BasicType::UInt16,
            ParameterValue::Int32(_) => BasicType::Int32,
            ParameterValue::UInt32(_) => BasicType::UInt32,
            ParameterValue::Int64(_) => BasicType::Int64,
            ParameterValue::UInt64(_) => BasicType::UInt64,
            ParameterValue::Real32(_) => BasicType::Real32,
            ParameterValue::Real64(_) => BasicType::Real64,
            ParameterValue::Handle(_) => BasicType::Handle,
            ParameterValue::Array(buffer) => buffer.element_type(),
        }
    }

    /// Whether this value has the shape and type `spec` declares
    pub fn matches(&self, spec: &ParameterSpec) -> bool {
        match self {
            ParameterValue::String(_) => spec.is_string(),
            ParameterValue::Array(buffer) => spec.is_array() && buffer.element_type() == spec.data_type,
            scalar => spec.count == 1 && scalar.basic_type() == spec.data_type,
        }
    }

    pub fn as_i64(&self) -> EngineResult<i64> {
        let converted = match *self {
            ParameterValue::Byte(v) => Some(i64::from(v)),
            ParameterValue::Int16(v) => Some(i64::from(v)),
            ParameterValue::UInt16(v) => Some(i64::from(v)),
            ParameterValue::Int32(v) => Some(i64::from(v)),
            ParameterValue::UInt32(v) => Some(i64::from(v)),
            ParameterValue::Int64(v) => Some(v),
            ParameterValue::UInt64(v) | ParameterValue::Handle(v) => i64::try_from(v).ok(),
            _ => None,
        };
        converted.ok_or_else(|| self.wrong_kind("an integer"))
    }

    pub fn as_u64(&self) -> EngineResult<u64> {
        match *self {
            ParameterValue::UInt64(v) | ParameterValue::Handle(v) => Ok(v),
            _ => u64::try_from(self.as_i64()?).map_err(|_| self.wrong_kind("a non-negative integer")),
        }
    }

    pub fn as_f64(&self) -> EngineResult<f64> {
        match *self {
            ParameterValue::Real32(v) => Ok(f64::from(v)),
            ParameterValue::Real64(v) => Ok(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> EngineResult<&str> {
        match self {
            ParameterValue::String(s) => Ok(s),
            _ => Err(self.wrong_kind("a string")),
        }
    }

    pub fn as_array(&self) -> EngineResult<&TypedBuffer> {
        match self {
            ParameterValue::Array(buffer) => Ok(buffer),
            _ => Err(self.wrong_kind("an array")),
        }
    }

    /// Convert a JSON value to the type `spec` declares
    pub fn from_json(value: &Value, spec: &ParameterSpec, name: &str) -> EngineResult<Self> {
        let mismatch = || {
            EngineError::InvalidParameter(format!(
                "'{}' expects {}{}, got {}",
                name,
                spec.data_type,
                if spec.is_array() { " array" } else { "" },
                value
            ))
        };

        if spec.is_string() {
            return value
                .as_str()
                .map(|s| ParameterValue::String(s.to_string()))
                .ok_or_else(mismatch);
        }
        if spec.is_array() {
            let items = value.as_array().ok_or_else(mismatch)?;
            return array_from_json(spec.data_type, items)
                .map(ParameterValue::Array)
                .ok_or_else(mismatch);
        }
        scalar_from_json(spec.data_type, value).ok_or_else(mismatch)
    }

    fn wrong_kind(&self, expected: &str) -> EngineError {
        EngineError::InvalidParameter(format!("{:?} is not {}", self, expected))
    }
}

fn int_in_range<T: TryFrom<i64> + TryFrom<u64>>(value: &Value) -> Option<T> {
    if let Some(v) = value.as_i64() {
        T::try_from(v).ok()
    } else {
        value.as_u64().and_then(|v| T::try_from(v).ok())
    }
}

fn scalar_from_json(data_type: BasicType, value: &Value) -> Option<ParameterValue> {
    match data_type {
        BasicType::Byte => int_in_range(value).map(ParameterValue::Byte),
        BasicType::Int16 => int_in_range(value).map(ParameterValue::Int16),
        BasicType::UInt16 => int_in_range(value).map(ParameterValue::UInt16),
        BasicType::Int32 => int_in_range(value).map(ParameterValue::Int32),
        BasicType::UInt32 => int_in_range(value).map(ParameterValue::UInt32),
        BasicType::Int64 => int_in_range(value).map(ParameterValue::Int64),
        BasicType::UInt64 => int_in_range(value).map(ParameterValue::UInt64),
        BasicType::Real32 => value.as_f64().map(|v| ParameterValue::Real32(v as f32)),
        BasicType::Real64 => value.as_f64().map(ParameterValue::Real64),
        BasicType::Handle => value.as_u64().map(ParameterValue::Handle),
    }
}

fn typed_array<T: Element>(items: &[Value], convert: impl Fn(&Value) -> Option<T>) -> Option<TypedBuffer> {
    let values = items.iter().map(convert).collect::<Option<Vec<T>>>()?;
    Some(TypedBuffer::from_values(&values))
}

fn array_from_json(data_type: BasicType, items: &[Value]) -> Option<TypedBuffer> {
    match data_type {
        BasicType::Byte => typed_array::<u8>(items, int_in_range),
        BasicType::Int16 => typed_array::<i16>(items, int_in_range),
        BasicType::UInt16 => typed_array::<u16>(items, int_in_range),
        BasicType::Int32 => typed_array::<i32>(items, int_in_range),
        BasicType::UInt32 => typed_array::<u32>(items, int_in_range),
        BasicType::Int64 => typed_array::<i64>(items, int_in_range),
        BasicType::UInt64 => typed_array::<u64>(items, int_in_range),
        BasicType::Real32 => typed_array(items, |v| v.as_f64().map(|x| x as f32)),
        BasicType::Real64 => typed_array(items, Value::as_f64),
        BasicType::Handle => typed_array(items, |v| v.as_u64().map(Handle)),
    }
}

/// Validated construction parameters, in spec order
#[derive(Debug, Clone, Default)]
pub struct ParameterMap {
    values: Collection<ParameterValue>,
}

impl ParameterMap {
    /// Parse `params` (a JSON object, or empty for all defaults) against `spec`
    pub fn from_json(params: &str, spec: &Spec, type_name: &str) -> EngineResult<Self> {
        let supplied = parse_object(params, type_name)?;

        for (key, _) in supplied.iter() {
            match spec.parameters.get(key) {
                Err(_) => {
                    return Err(EngineError::InvalidParameter(format!(
                        "unknown parameter '{}' for region type '{}'",
                        key, type_name
                    )))
                }
                Ok(p) if p.access == ParameterAccess::ReadOnly => {
                    return Err(EngineError::InvalidParameter(format!(
                        "parameter '{}' of region type '{}' is read-only",
                        key, type_name
                    )))
                }
                Ok(_) => {}
            }
        }

        let mut values = Collection::new();
        for (name, parameter) in spec.parameters.iter() {
            let value = match supplied.get(name) {
                Some(v) => v.clone(),
                None if parameter.default_value.is_empty() => {
                    return Err(EngineError::InvalidParameter(format!(
                        "missing required parameter '{}' for region type '{}'",
                        name, type_name
                    )))
                }
                None => serde_json::from_str(&parameter.default_value).map_err(|e| {
                    EngineError::InvalidParameter(format!(
                        "default for '{}' is not valid JSON: {}",
                        name, e
                    ))
                })?,
            };
            values.add(name, ParameterValue::from_json(&value, parameter, name)?)?;
        }

        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> EngineResult<&ParameterValue> {
        self.values
            .get(name)
            .map_err(|_| EngineError::InvalidParameter(format!("no parameter '{}'", name)))
    }

    pub fn get_i64(&self, name: &str) -> EngineResult<i64> {
        self.get(name)?.as_i64()
    }

    pub fn get_u64(&self, name: &str) -> EngineResult<u64> {
        self.get(name)?.as_u64()
    }

    pub fn get_f64(&self, name: &str) -> EngineResult<f64> {
        self.get(name)?.as_f64()
    }

    pub fn get_str(&self, name: &str) -> EngineResult<&str> {
        self.get(name)?.as_str()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.count()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn parse_object(params: &str, type_name: &str) -> EngineResult<Map<String, Value>> {
    if params.trim().is_empty() {
        return Ok(Map::new());
    }
    let parsed: Value = serde_json::from_str(params).map_err(|e| {
        EngineError::InvalidParameter(format!("parameters for '{}' are not valid JSON: {}", type_name, e))
    })?;
    match parsed {
        Value::Object(map) => Ok(map),
        other => Err(EngineError::InvalidParameter(format!(
            "parameters for '{}' must be a JSON object, got {}",
            type_name, other
        ))),
    }
}
