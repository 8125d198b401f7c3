//! Tagged-envelope (de)serialization for persisted forests.
//!
//! Every node kind has a short tag (`C`/`F`/`M`/`P`); encoding wraps the
//! node's field set in a single-key envelope such as `{"_C_": {...}}`.
//! Decoding accepts the historical tag spellings (`_C_`, `_Class_`, `__C__`,
//! `__Class__`) and both field-key generations (short `o`/`i`/`n`/`d` and the
//! long `original_name`/... names). An envelope with an unrecognized tag
//! decodes to its raw payload instead of failing, so partially upgraded blobs
//! keep loading.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::model::{
    Class, Field, MappingDatabase, Method, Parameter, Side, normalize_description,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Class,
    Field,
    Method,
    Parameter,
}

const TAGS: [Tag; 4] = [Tag::Class, Tag::Field, Tag::Method, Tag::Parameter];

impl Tag {
    fn short(self) -> &'static str {
        match self {
            Tag::Class => "C",
            Tag::Field => "F",
            Tag::Method => "M",
            Tag::Parameter => "P",
        }
    }

    fn long(self) -> &'static str {
        match self {
            Tag::Class => "Class",
            Tag::Field => "Field",
            Tag::Method => "Method",
            Tag::Parameter => "Parameter",
        }
    }

    fn matches_key(self, key: &str) -> bool {
        let (short, long) = (self.short(), self.long());
        key == format!("_{short}_")
            || key == format!("_{long}_")
            || key == format!("__{short}__")
            || key == format!("__{long}__")
    }
}

/// Result of decoding one envelope.
#[derive(Debug)]
pub enum Decoded {
    Class(Class),
    Field(Field),
    Method(Method),
    Parameter(Parameter),
    /// Unrecognized tag, or a value that is not an envelope at all. Carries
    /// the payload unchanged.
    Raw(Value),
}

#[derive(Serialize, Deserialize)]
struct FieldWire {
    #[serde(rename = "o", alias = "original_name", default)]
    original_name: Option<String>,
    #[serde(rename = "i", alias = "intermediate_name")]
    intermediate_name: String,
    #[serde(rename = "n", alias = "name", default)]
    name: Option<String>,
    #[serde(rename = "d", alias = "description", default)]
    description: Option<String>,
    #[serde(rename = "s", alias = "side")]
    side: u8,
}

#[derive(Serialize, Deserialize)]
struct MethodWire {
    #[serde(rename = "o", alias = "original_name", default)]
    original_name: Option<String>,
    #[serde(rename = "i", alias = "intermediate_name")]
    intermediate_name: String,
    #[serde(rename = "n", alias = "name", default)]
    name: Option<String>,
    #[serde(rename = "d", alias = "description", default)]
    description: Option<String>,
    #[serde(rename = "s", alias = "side")]
    side: u8,
    #[serde(rename = "t", alias = "static")]
    is_static: bool,
    #[serde(rename = "g", alias = "signature")]
    signature: String,
    #[serde(rename = "p", alias = "parameters", default)]
    parameters: Vec<Value>,
}

#[derive(Serialize, Deserialize)]
struct ClassWire {
    #[serde(rename = "o", alias = "original_name", default)]
    original_name: Option<String>,
    #[serde(rename = "i", alias = "intermediate_name")]
    intermediate_name: String,
    #[serde(rename = "n", alias = "name", default)]
    name: Option<String>,
    #[serde(rename = "d", alias = "description", default)]
    description: Option<String>,
    #[serde(rename = "c", alias = "child_classes", default)]
    child_classes: Vec<Value>,
    #[serde(rename = "f", alias = "fields", default)]
    fields: Vec<Value>,
    #[serde(rename = "m", alias = "methods", default)]
    methods: Vec<Value>,
    #[serde(rename = "s", alias = "constructors", default)]
    constructors: Vec<Value>,
}

fn envelope(tag: Tag, payload: Value) -> Value {
    let mut map = Map::with_capacity(1);
    map.insert(format!("_{}_", tag.short()), payload);
    Value::Object(map)
}

pub fn encode_parameter(parameter: &Parameter) -> Value {
    envelope(
        Tag::Parameter,
        json!({
            "o": parameter.original_name,
            "i": parameter.intermediate_name,
            "n": parameter.name,
            "d": parameter.description,
            "s": parameter.side.wire(),
        }),
    )
}

pub fn encode_field(field: &Field) -> Value {
    envelope(
        Tag::Field,
        json!({
            "o": field.original_name,
            "i": field.intermediate_name,
            "n": field.name,
            "d": field.description,
            "s": field.side.wire(),
        }),
    )
}

pub fn encode_method(method: &Method) -> Value {
    let parameters: Vec<Value> = method.parameters.iter().map(encode_parameter).collect();
    envelope(
        Tag::Method,
        json!({
            "o": method.original_name,
            "i": method.intermediate_name,
            "n": method.name,
            "d": method.description,
            "s": method.side.wire(),
            "t": method.is_static,
            "g": method.signature,
            "p": parameters,
        }),
    )
}

pub fn encode_class(class: &Class) -> Value {
    let child_classes: Vec<Value> = class.child_classes.iter().map(encode_class).collect();
    let fields: Vec<Value> = class.fields.iter().map(encode_field).collect();
    let methods: Vec<Value> = class.methods.iter().map(encode_method).collect();
    let constructors: Vec<Value> = class.constructors.iter().map(encode_method).collect();
    envelope(
        Tag::Class,
        json!({
            "o": class.original_name,
            "i": class.intermediate_name,
            "n": class.name,
            "d": class.description,
            "c": child_classes,
            "f": fields,
            "m": methods,
            "s": constructors,
        }),
    )
}

/// Decode one envelope. Only malformed payloads of a *recognized* tag error;
/// anything unrecognized comes back as [`Decoded::Raw`].
pub fn decode(value: &Value) -> Result<Decoded> {
    let Some((key, payload)) = single_entry(value) else {
        return Ok(Decoded::Raw(value.clone()));
    };
    for tag in TAGS {
        if !tag.matches_key(key) {
            continue;
        }
        return match tag {
            Tag::Class => decode_class(payload).map(Decoded::Class),
            Tag::Field => decode_field(payload).map(Decoded::Field),
            Tag::Method => decode_method(payload).map(Decoded::Method),
            Tag::Parameter => decode_parameter(payload).map(Decoded::Parameter),
        };
    }
    if key.starts_with('_') && key.ends_with('_') && key.len() > 2 {
        // Envelope-shaped but unknown tag: surface the inner payload.
        return Ok(Decoded::Raw(payload.clone()));
    }
    Ok(Decoded::Raw(value.clone()))
}

fn single_entry(value: &Value) -> Option<(&str, &Value)> {
    let obj = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    obj.iter().next().map(|(k, v)| (k.as_str(), v))
}

fn decode_field(payload: &Value) -> Result<Field> {
    let wire: FieldWire = serde_json::from_value(payload.clone()).context("malformed field")?;
    Ok(Field {
        original_name: wire.original_name,
        intermediate_name: wire.intermediate_name,
        name: wire.name,
        description: normalize_description(wire.description),
        side: Side::from_wire(wire.side)?,
    })
}

fn decode_parameter(payload: &Value) -> Result<Parameter> {
    let wire: FieldWire = serde_json::from_value(payload.clone()).context("malformed parameter")?;
    Ok(Parameter {
        original_name: wire.original_name,
        intermediate_name: wire.intermediate_name,
        name: wire.name,
        description: normalize_description(wire.description),
        side: Side::from_wire(wire.side)?,
    })
}

fn decode_method(payload: &Value) -> Result<Method> {
    let wire: MethodWire = serde_json::from_value(payload.clone()).context("malformed method")?;
    let mut parameters = Vec::with_capacity(wire.parameters.len());
    for value in &wire.parameters {
        match decode(value)? {
            Decoded::Parameter(p) => parameters.push(p),
            other => anyhow::bail!(
                "unexpected node in parameter list of {}: {other:?}",
                wire.intermediate_name
            ),
        }
    }
    Ok(Method {
        original_name: wire.original_name,
        intermediate_name: wire.intermediate_name,
        name: wire.name,
        description: normalize_description(wire.description),
        side: Side::from_wire(wire.side)?,
        is_static: wire.is_static,
        signature: wire.signature,
        parameters,
    })
}

fn decode_class(payload: &Value) -> Result<Class> {
    let wire: ClassWire = serde_json::from_value(payload.clone()).context("malformed class")?;
    let context_name = wire.intermediate_name.clone();

    let mut child_classes = Vec::with_capacity(wire.child_classes.len());
    for value in &wire.child_classes {
        match decode(value)? {
            Decoded::Class(c) => child_classes.push(c),
            other => anyhow::bail!("unexpected node in child classes of {context_name}: {other:?}"),
        }
    }
    let mut fields = Vec::with_capacity(wire.fields.len());
    for value in &wire.fields {
        match decode(value)? {
            Decoded::Field(f) => fields.push(f),
            other => anyhow::bail!("unexpected node in field list of {context_name}: {other:?}"),
        }
    }
    let mut methods = Vec::with_capacity(wire.methods.len());
    for value in &wire.methods {
        match decode(value)? {
            Decoded::Method(m) => methods.push(m),
            other => anyhow::bail!("unexpected node in method list of {context_name}: {other:?}"),
        }
    }
    let mut constructors = Vec::with_capacity(wire.constructors.len());
    for value in &wire.constructors {
        match decode(value)? {
            Decoded::Method(m) => constructors.push(m),
            other => {
                anyhow::bail!("unexpected node in constructor list of {context_name}: {other:?}")
            }
        }
    }

    Ok(Class {
        original_name: wire.original_name,
        intermediate_name: wire.intermediate_name,
        name: wire.name,
        description: normalize_description(wire.description),
        child_classes,
        fields,
        methods,
        constructors,
    })
}

pub fn encode_database(db: &MappingDatabase) -> Value {
    let classes: Vec<Value> = db.classes.iter().map(encode_class).collect();
    json!({
        "mc_version": db.mc_version,
        "snapshot": db.snapshot,
        "classes": classes,
    })
}

/// Compact blob text, the on-disk form.
pub fn database_to_string(db: &MappingDatabase) -> Result<String> {
    Ok(serde_json::to_string(&encode_database(db))?)
}

pub fn decode_database(text: &str) -> Result<MappingDatabase> {
    #[derive(Deserialize)]
    struct DatabaseWire {
        mc_version: String,
        snapshot: String,
        classes: Vec<Value>,
    }

    let wire: DatabaseWire = serde_json::from_str(text).context("malformed database blob")?;
    let mut classes = Vec::with_capacity(wire.classes.len());
    for value in &wire.classes {
        match decode(value)? {
            Decoded::Class(c) => classes.push(c),
            other => anyhow::bail!("unexpected top-level node in database blob: {other:?}"),
        }
    }
    Ok(MappingDatabase {
        mc_version: wire.mc_version,
        snapshot: wire.snapshot,
        classes,
    })
}
