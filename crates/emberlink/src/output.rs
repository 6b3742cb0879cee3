use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use emberlink_schema::ElementKind;
use emberlink_tree::{Change, ElementData, ElementId, InvocationResult, Tree, Value};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One live element of a mirrored tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementRow {
    pub path: String,
    pub number: String,
    pub kind: ElementKind,
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Flatten the live part of `tree` in depth-first order.
pub fn element_rows(tree: &Tree) -> Vec<ElementRow> {
    let mut rows = Vec::new();
    collect_rows(tree, Tree::ROOT, &mut rows);
    rows
}

fn collect_rows(tree: &Tree, node: ElementId, rows: &mut Vec<ElementRow>) {
    for id in tree.live_children(node) {
        let Some(element) = tree.get(id) else {
            continue;
        };
        rows.push(ElementRow {
            path: tree.path_of(id),
            number: number_path(tree, id),
            kind: element.kind(),
            online: element.is_online(),
            value: display_value(tree, id),
            description: element.description().map(str::to_string),
        });
        collect_rows(tree, id, rows);
    }
}

fn number_path(tree: &Tree, id: ElementId) -> String {
    tree.number_path(id)
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Parameter value as text, enum entries by name.
pub fn display_value(tree: &Tree, id: ElementId) -> Option<String> {
    let ElementData::Parameter(parameter) = tree.get(id)?.data() else {
        return None;
    };
    if let Some(text) = parameter.enum_text() {
        return Some(text.to_string());
    }
    parameter.value.as_ref().map(Value::to_string)
}

pub fn print_tree(rows: &[ElementRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(rows).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PATH", "NUMBER", "KIND", "VALUE", "DESCRIPTION"]);
            for row in rows {
                table.add_row(vec![
                    row.path.clone(),
                    row.number.clone(),
                    row.kind.to_string(),
                    row.value.clone().unwrap_or_default(),
                    row.description.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                let depth = row.path.matches('/').count();
                let indent = "  ".repeat(depth);
                let name = row.path.rsplit('/').next().unwrap_or(&row.path);
                match &row.value {
                    Some(value) => println!("{indent}{name} ({}) = {value}", row.kind),
                    None => println!("{indent}{name} ({})", row.kind),
                }
            }
        }
    }
}

/// One change notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeOutput {
    pub change: &'static str,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub online: bool,
    pub timestamp: String,
}

impl ChangeOutput {
    pub fn new(tree: &Tree, change: Change) -> Self {
        let id = change.element();
        let change_name = match change {
            Change::Value(_) => "value",
            Change::Online(_) => "online",
            Change::Description(_) => "description",
            Change::Children(_) => "children",
        };
        Self {
            change: change_name,
            path: tree.path_of(id),
            value: display_value(tree, id),
            online: tree.get(id).is_some_and(|element| element.is_online()),
            timestamp: now_unix_seconds(),
        }
    }
}

pub fn print_change(change: &ChangeOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(change).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            let path = if change.path.is_empty() {
                "/"
            } else {
                change.path.as_str()
            };
            match &change.value {
                Some(value) => println!("{} {path} = {value}", change.change),
                None => println!("{} {path} online={}", change.change, change.online),
            }
        }
    }
}

pub fn print_invocation(result: &InvocationResult, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(result).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "TYPE", "VALUE"]);
            for (index, value) in result.result.iter().enumerate() {
                table.add_row(vec![
                    index.to_string(),
                    value.parameter_type().to_string(),
                    value.to_string(),
                ]);
            }
            println!("invocation {} succeeded", result.invocation_id);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for value in &result.result {
                println!("{value}");
            }
        }
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
