//! Encoders for the messages a consumer sends.

use bytes::Bytes;
use emberlink_ber::{EmberWriter, LengthForm, Tag};

use crate::error::Result;
use crate::glow::{
    app, command, command_fields, element, invocation, parameter, COLLECTION_ITEM,
};
use crate::value::Value;

/// Opens `Root { RootElementCollection { ... } }`.
pub(crate) fn start_root(writer: &mut EmberWriter) {
    writer.start_application(Tag::application(app::ROOT), app::ROOT_ELEMENT_COLLECTION);
}

/// `[0] Command { [0] number }` inside the current collection.
pub(crate) fn write_command(writer: &mut EmberWriter, number: i64) -> Result<()> {
    writer.start_application(Tag::context(COLLECTION_ITEM), app::COMMAND);
    writer.write_integer(Tag::context(command_fields::NUMBER), number);
    writer.end_container()?;
    Ok(())
}

/// getDirectory for a non-root node, addressed by its numeric path.
pub(crate) fn write_qualified_get_directory(writer: &mut EmberWriter, path: &[u32]) -> Result<()> {
    writer.start_application(Tag::context(COLLECTION_ITEM), app::QUALIFIED_NODE);
    writer.write_relative_oid(Tag::context(element::PATH), path);
    writer.start_application(Tag::context(element::CHILDREN), app::ELEMENT_COLLECTION);
    write_command(writer, command::GET_DIRECTORY)?;
    writer.end_container()?;
    writer.end_container()?;
    Ok(())
}

/// Encode an invoke command for the function at `path`.
pub fn encode_invocation(
    form: LengthForm,
    path: &[u32],
    invocation_id: i32,
    arguments: &[Value],
) -> Result<Bytes> {
    let mut writer = EmberWriter::with_form(form);
    start_root(&mut writer);
    writer.start_application(Tag::context(COLLECTION_ITEM), app::QUALIFIED_FUNCTION);
    writer.write_relative_oid(Tag::context(element::PATH), path);
    writer.start_application(Tag::context(element::CHILDREN), app::ELEMENT_COLLECTION);

    writer.start_application(Tag::context(COLLECTION_ITEM), app::COMMAND);
    writer.write_integer(Tag::context(command_fields::NUMBER), command::INVOKE);
    writer.start_application(Tag::context(command_fields::INVOCATION), app::INVOCATION);
    writer.write_integer(
        Tag::context(invocation::INVOCATION_ID),
        i64::from(invocation_id),
    );
    writer.start_sequence(Tag::context(invocation::ARGUMENTS));
    for argument in arguments {
        argument.write(&mut writer, Tag::context(COLLECTION_ITEM));
    }
    writer.end_container()?;
    writer.end_container()?;
    writer.end_container()?;

    writer.end_container()?;
    writer.end_container()?;
    writer.end_container()?;
    Ok(writer.finish()?)
}

/// Encode a value write for the parameter at `path`.
pub fn encode_set_value(form: LengthForm, path: &[u32], value: &Value) -> Result<Bytes> {
    let mut writer = EmberWriter::with_form(form);
    start_root(&mut writer);
    writer.start_application(Tag::context(COLLECTION_ITEM), app::QUALIFIED_PARAMETER);
    writer.write_relative_oid(Tag::context(element::PATH), path);
    writer.start_set(Tag::context(element::CONTENTS));
    value.write(&mut writer, Tag::context(parameter::VALUE));
    writer.end_container()?;
    writer.end_container()?;
    writer.end_container()?;
    Ok(writer.finish()?)
}
