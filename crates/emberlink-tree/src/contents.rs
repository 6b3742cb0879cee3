//! Decoding of node, parameter and function contents sets.

use emberlink_ber::EmberReader;
use tracing::warn;

use crate::element::{Element, ElementData, Function, Node, Parameter};
use crate::error::Result;
use crate::glow::{contents, function, node, parameter, stream_description, string_integer_pair, tuple_item};
use crate::value::{Access, ParameterType, StreamDescriptor, TupleItem, Value};

/// Read the remaining fields of a contents set into `element`.
///
/// The reader is either on the set itself or on one of its fields; returns
/// once the set is exhausted. Returns true if the online flag flipped.
pub(crate) fn read_contents(element: &mut Element, reader: &mut EmberReader<'_>) -> Result<bool> {
    let mut online_changed = false;

    while reader.read()? {
        let field = reader.outer_tag()?.context_number();
        match field {
            Some(contents::IDENTIFIER) => reader.skip()?,
            Some(contents::DESCRIPTION) => {
                element.description = Some(reader.read_utf8()?.to_owned());
            }
            Some(node::IS_ONLINE) if matches!(element.data, ElementData::Node(_)) => {
                online_changed |= element.set_online(reader.read_boolean()?);
            }
            Some(parameter::IS_ONLINE) if matches!(element.data, ElementData::Parameter(_)) => {
                online_changed |= element.set_online(reader.read_boolean()?);
            }
            _ => match &mut element.data {
                ElementData::Node(node) => read_node_field(node, reader, field)?,
                ElementData::Parameter(parameter) => read_parameter_field(parameter, reader, field)?,
                ElementData::Function(function) => read_function_field(function, reader, field)?,
            },
        }
    }

    if let ElementData::Parameter(parameter) = &mut element.data {
        parameter.normalize();
    }
    Ok(online_changed)
}

fn read_node_field(node: &mut Node, reader: &mut EmberReader<'_>, field: Option<u32>) -> Result<()> {
    match field {
        Some(node::IS_ROOT) => node.is_root = reader.read_boolean()?,
        Some(node::SCHEMA_IDENTIFIERS) => {
            node.schema_identifiers = Some(reader.read_utf8()?.to_owned());
        }
        _ => reader.skip()?,
    }
    Ok(())
}

fn read_parameter_field(
    parameter: &mut Parameter,
    reader: &mut EmberReader<'_>,
    field: Option<u32>,
) -> Result<()> {
    match field {
        Some(parameter::VALUE) => parameter.value = Some(Value::read(reader)?),
        Some(parameter::MINIMUM) => parameter.minimum = Some(Value::read(reader)?),
        Some(parameter::MAXIMUM) => parameter.maximum = Some(Value::read(reader)?),
        Some(parameter::DEFAULT) => parameter.default = Some(Value::read(reader)?),
        Some(parameter::ACCESS) => {
            let code = reader.read_integer()?;
            match Access::from_code(code) {
                Some(access) => parameter.access = access,
                None => warn!(code, "ignoring unknown parameter access"),
            }
        }
        Some(parameter::TYPE) => {
            let code = reader.read_integer()?;
            match ParameterType::from_code(code) {
                Some(kind) => parameter.kind = Some(kind),
                None => warn!(code, "ignoring unknown parameter type"),
            }
        }
        Some(parameter::FORMAT) => parameter.format = Some(reader.read_utf8()?.to_owned()),
        Some(parameter::FORMULA) => parameter.formula = Some(reader.read_utf8()?.to_owned()),
        Some(parameter::FACTOR) => parameter.factor = Some(reader.read_integer()?),
        Some(parameter::STEP) => parameter.step = Some(reader.read_integer()?),
        Some(parameter::STREAM_IDENTIFIER) => {
            parameter.stream_identifier = Some(reader.read_integer()?);
        }
        Some(parameter::SCHEMA_IDENTIFIERS) => {
            parameter.schema_identifiers = Some(reader.read_utf8()?.to_owned());
        }
        Some(parameter::ENUMERATION) => {
            parameter.enum_map = reader
                .read_utf8()?
                .split('\n')
                .zip(0..)
                .map(|(text, value)| (text.to_owned(), value))
                .collect();
        }
        Some(parameter::ENUM_MAP) if reader.is_container() => {
            parameter.enum_map = read_enum_map(reader)?;
        }
        Some(parameter::STREAM_DESCRIPTOR) if reader.is_container() => {
            parameter.stream_descriptor = Some(read_stream_descriptor(reader)?);
        }
        _ => reader.skip()?,
    }
    Ok(())
}

fn read_function_field(
    function: &mut Function,
    reader: &mut EmberReader<'_>,
    field: Option<u32>,
) -> Result<()> {
    match field {
        Some(function::ARGUMENTS) if reader.is_container() => {
            function.arguments = read_tuple_description(reader)?;
        }
        Some(function::RESULT) if reader.is_container() => {
            function.result = read_tuple_description(reader)?;
        }
        _ => reader.skip()?,
    }
    Ok(())
}

fn read_enum_map(reader: &mut EmberReader<'_>) -> Result<Vec<(String, i64)>> {
    let mut entries = Vec::new();
    while reader.read()? {
        if !reader.is_container() {
            reader.skip()?;
            continue;
        }
        let mut text = String::new();
        let mut value = 0;
        while reader.read()? {
            match reader.outer_tag()?.context_number() {
                Some(string_integer_pair::ENTRY_STRING) => text = reader.read_utf8()?.to_owned(),
                Some(string_integer_pair::ENTRY_INTEGER) => value = reader.read_integer()?,
                _ => reader.skip()?,
            }
        }
        entries.push((text, value));
    }
    Ok(entries)
}

fn read_stream_descriptor(reader: &mut EmberReader<'_>) -> Result<StreamDescriptor> {
    let mut descriptor = StreamDescriptor {
        format: 0,
        offset: 0,
    };
    while reader.read()? {
        match reader.outer_tag()?.context_number() {
            Some(stream_description::FORMAT) => descriptor.format = reader.read_integer()?,
            Some(stream_description::OFFSET) => descriptor.offset = reader.read_integer()?,
            _ => reader.skip()?,
        }
    }
    Ok(descriptor)
}

fn read_tuple_description(reader: &mut EmberReader<'_>) -> Result<Vec<TupleItem>> {
    let mut items = Vec::new();
    while reader.read()? {
        if !reader.is_container() {
            reader.skip()?;
            continue;
        }
        let mut item = TupleItem {
            kind: ParameterType::Null,
            name: None,
        };
        while reader.read()? {
            match reader.outer_tag()?.context_number() {
                Some(tuple_item::TYPE) => {
                    let code = reader.read_integer()?;
                    match ParameterType::from_code(code) {
                        Some(kind) => item.kind = kind,
                        None => warn!(code, "ignoring unknown tuple item type"),
                    }
                }
                Some(tuple_item::NAME) => item.name = Some(reader.read_utf8()?.to_owned()),
                _ => reader.skip()?,
            }
        }
        items.push(item);
    }
    Ok(items)
}
