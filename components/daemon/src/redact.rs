// Copyright 2024 lazycfg
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Secret free rendering of configuration values.
//!
//! Every configuration type describes its own serialized fields through
//! [Redact::fields]. Each [Field] carries its JSON key, how to render it,
//! and the policy bits `secret` and `omit_if_zero`. [redact] walks those
//! descriptors recursively and never renders a secret field, so nothing
//! produced here can leak credentials into logs.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use snafu::ResultExt;

use crate::err::{Result, SerializationSnafu};

/// The secret free form of a configuration value, ordered by key.
pub type RedactedMap = BTreeMap<String, Value>;

/// A type that can enumerate its serialized fields for redaction.
pub trait Redact {
    fn fields(&self) -> Vec<Field<'_>>;
}

enum FieldKind<'a> {
    Literal(Box<dyn Fn() -> serde_json::Result<Value> + 'a>),
    Nested(&'a dyn Redact),
    Optional(Option<&'a dyn Redact>),
}

/// The descriptor of one serialized field.
pub struct Field<'a> {
    key:          &'static str,
    kind:         FieldKind<'a>,
    is_zero:      bool,
    secret:       bool,
    omit_if_zero: bool,
}

impl<'a> Field<'a> {
    /// A field rendered as its literal JSON value.
    pub fn literal<T>(key: &'static str, value: &'a T) -> Self
    where
        T: Serialize + Default + PartialEq,
    {
        Self::new(
            key,
            FieldKind::Literal(Box::new(move || serde_json::to_value(value))),
            *value == T::default(),
        )
    }

    /// A field rendered as its literal JSON value which is never considered
    /// zero.
    pub fn plain<T: Serialize>(key: &'static str, value: &'a T) -> Self {
        Self::new(
            key,
            FieldKind::Literal(Box::new(move || serde_json::to_value(value))),
            false,
        )
    }

    /// A struct valued field, rendered as a nested map.
    pub fn nested<T>(key: &'static str, value: &'a T) -> Self
    where
        T: Redact + Default + PartialEq,
    {
        Self::new(key, FieldKind::Nested(value), *value == T::default())
    }

    /// A struct valued field without a zero value, always rendered.
    pub fn nested_plain<T: Redact>(key: &'static str, value: &'a T) -> Self {
        Self::new(key, FieldKind::Nested(value), false)
    }

    /// A reference to a struct; `None` is never rendered, not even as `null`.
    pub fn optional<T: Redact>(key: &'static str, value: Option<&'a T>) -> Self {
        let value = value.map(|v| v as &dyn Redact);
        Self::new(key, FieldKind::Optional(value), value.is_none())
    }

    fn new(key: &'static str, kind: FieldKind<'a>, is_zero: bool) -> Self {
        Self {
            key,
            kind,
            is_zero,
            secret: false,
            omit_if_zero: false,
        }
    }

    /// Credential bearing, dropped whatever its value.
    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    /// Dropped when equal to the zero value of its type.
    pub fn omit_if_zero(mut self) -> Self {
        self.omit_if_zero = true;
        self
    }
}

/// Render `value` into a key ordered map with every secret field removed.
pub fn redact(value: &dyn Redact) -> Result<RedactedMap> {
    let mut result = RedactedMap::new();
    for field in value.fields() {
        if field.secret || (field.omit_if_zero && field.is_zero) {
            continue;
        }
        let rendered = match field.kind {
            FieldKind::Literal(render) => render().context(SerializationSnafu)?,
            FieldKind::Nested(inner) | FieldKind::Optional(Some(inner)) => into_object(redact(inner)?),
            FieldKind::Optional(None) => continue,
        };
        let prev = result.insert(field.key.to_string(), rendered);
        debug_assert!(prev.is_none(), "duplicated field key {}", field.key);
    }
    Ok(result)
}

/// [redact] then encode as a JSON string, suitable for logs.
pub fn dump_redacted_string(value: &dyn Redact) -> Result<String> {
    let map = redact(value)?;
    serde_json::to_string(&map).context(SerializationSnafu)
}

fn into_object(map: RedactedMap) -> Value { Value::Object(map.into_iter().collect()) }
