use anyhow::{Context, Result};
use log::info;
use std::path::Path;

use super::{CompiledTable, Key, Node, Scalar};
use crate::core::config::LookupConfig;
use crate::core::io::Storage;

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn render_key(key: &Key) -> String {
    match key {
        Key::Int(i) => format!("[{}]", i),
        Key::Str(s) => format!("[{}]", quote(s)),
    }
}

fn render_scalar(value: &Scalar) -> String {
    match value {
        Scalar::Int(i) => i.to_string(),
        Scalar::Str(s) => quote(s),
    }
}

fn render(node: &Node, depth: usize, out: &mut String) {
    match node {
        Node::Leaf(value) => out.push_str(&render_scalar(value)),
        Node::Branch(map) if map.is_empty() => out.push_str("{}"),
        Node::Branch(map) => {
            out.push_str("{\n");
            for (key, child) in map {
                out.push_str(&"\t".repeat(depth + 1));
                out.push_str(&render_key(key));
                out.push_str(" = ");
                render(child, depth + 1, out);
                out.push_str(",\n");
            }
            out.push_str(&"\t".repeat(depth));
            out.push('}');
        }
    }
}

/// Lua table constructor for `node`. Keys come out sorted, integers first.
pub fn to_lua(node: &Node) -> String {
    let mut out = String::new();
    render(node, 0, &mut out);
    out
}

pub fn render_table_file(lookup: &LookupConfig, table: &CompiledTable) -> String {
    format!(
        "{}\n{}.{} = {}\n",
        lookup.guard_clause(),
        lookup.module_name,
        table.field,
        to_lua(&table.tree)
    )
}

/// Renders every table before writing any of them.
pub async fn write_tables(
    storage: &dyn Storage,
    output_folder: &Path,
    lookup: &LookupConfig,
    tables: &[CompiledTable],
) -> Result<()> {
    let rendered: Vec<(String, String)> = tables
        .iter()
        .map(|t| (format!("{}.lua", t.file_name), render_table_file(lookup, t)))
        .collect();

    for (file_name, content) in rendered {
        let path = output_folder.join(&file_name);
        storage
            .write(&path, content.as_bytes())
            .await
            .with_context(|| format!("Failed to write lookup table {}", path.display()))?;
        info!("Finished writing {}", file_name);
    }
    Ok(())
}
