//! Glow DTD tag numbers.

/// Application tags of Glow types.
pub mod app {
    pub const ROOT: u32 = 0;
    pub const PARAMETER: u32 = 1;
    pub const COMMAND: u32 = 2;
    pub const NODE: u32 = 3;
    pub const ELEMENT_COLLECTION: u32 = 4;
    pub const STREAM_ENTRY: u32 = 5;
    pub const STREAM_COLLECTION: u32 = 6;
    pub const STRING_INTEGER_PAIR: u32 = 7;
    pub const STRING_INTEGER_COLLECTION: u32 = 8;
    pub const QUALIFIED_PARAMETER: u32 = 9;
    pub const QUALIFIED_NODE: u32 = 10;
    pub const ROOT_ELEMENT_COLLECTION: u32 = 11;
    pub const STREAM_DESCRIPTION: u32 = 12;
    pub const MATRIX: u32 = 13;
    pub const FUNCTION: u32 = 19;
    pub const QUALIFIED_FUNCTION: u32 = 20;
    pub const TUPLE_ITEM_DESCRIPTION: u32 = 21;
    pub const INVOCATION: u32 = 22;
    pub const INVOCATION_RESULT: u32 = 23;
    pub const TEMPLATE: u32 = 24;
}

/// Command numbers.
pub mod command {
    pub const GET_DIRECTORY: i64 = 32;
    pub const INVOKE: i64 = 33;
}

/// Fields shared by Node, Parameter and Function records.
pub mod element {
    pub const NUMBER: u32 = 0;
    pub const CONTENTS: u32 = 1;
    pub const CHILDREN: u32 = 2;
    /// Qualified records carry a path in place of the number.
    pub const PATH: u32 = 0;
}

/// Leading fields of node, parameter and function contents.
pub mod contents {
    pub const IDENTIFIER: u32 = 0;
    pub const DESCRIPTION: u32 = 1;
}

pub mod node {
    pub const IS_ROOT: u32 = 2;
    pub const IS_ONLINE: u32 = 3;
    pub const SCHEMA_IDENTIFIERS: u32 = 4;
}

pub mod parameter {
    pub const VALUE: u32 = 2;
    pub const MINIMUM: u32 = 3;
    pub const MAXIMUM: u32 = 4;
    pub const ACCESS: u32 = 5;
    pub const FORMAT: u32 = 6;
    pub const ENUMERATION: u32 = 7;
    pub const FACTOR: u32 = 8;
    pub const IS_ONLINE: u32 = 9;
    pub const FORMULA: u32 = 10;
    pub const STEP: u32 = 11;
    pub const DEFAULT: u32 = 12;
    pub const TYPE: u32 = 13;
    pub const STREAM_IDENTIFIER: u32 = 14;
    pub const ENUM_MAP: u32 = 15;
    pub const STREAM_DESCRIPTOR: u32 = 16;
    pub const SCHEMA_IDENTIFIERS: u32 = 17;
}

pub mod function {
    pub const ARGUMENTS: u32 = 2;
    pub const RESULT: u32 = 3;
}

pub mod command_fields {
    pub const NUMBER: u32 = 0;
    pub const INVOCATION: u32 = 2;
}

pub mod tuple_item {
    pub const TYPE: u32 = 0;
    pub const NAME: u32 = 1;
}

pub mod invocation {
    pub const INVOCATION_ID: u32 = 0;
    pub const ARGUMENTS: u32 = 1;
}

pub mod invocation_result {
    pub const INVOCATION_ID: u32 = 0;
    pub const SUCCESS: u32 = 1;
    pub const RESULT: u32 = 2;
}

pub mod string_integer_pair {
    pub const ENTRY_STRING: u32 = 0;
    pub const ENTRY_INTEGER: u32 = 1;
}

pub mod stream_description {
    pub const FORMAT: u32 = 0;
    pub const OFFSET: u32 = 1;
}

/// Items of every `SEQUENCE OF` collection are tagged `[0]`.
pub const COLLECTION_ITEM: u32 = 0;
