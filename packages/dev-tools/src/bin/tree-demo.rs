//! Tree Projection Demo
//!
//! Loads a flat table, prints the tree projected from it, then walks through
//! the structural edits (insert, move, copy, cascading remove) while printing
//! the tree events each one produces.
//!
//! # Usage
//!
//! ```bash
//! # Built-in four-row sample table
//! cargo run --bin tree-demo
//!
//! # Your own table
//! cargo run --bin tree-demo -- table.json
//! ```
//!
//! # Table Format
//!
//! ```json
//! {
//!   "config": { "id_column": 0, "parent_column": 1 },
//!   "columns": ["ID", "Parent", "Content"],
//!   "rows": [[1, 0, "first item"], [2, 1, "second item"]],
//!   "key_column": 0,
//!   "edit_strategy": "on_field_change"
//! }
//! ```
//!
//! Set `RUST_LOG` to override the default `tree_demo=info,treeproxy_core=debug`.

use anyhow::{bail, Context};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use treeproxy_core::{EditStrategy, MemoryTable, NodeHandle, TreeConfig, TreeEvent, TreeModel};

/// Table document accepted on the command line
#[derive(Debug, Deserialize)]
struct DemoTable {
    #[serde(default)]
    config: TreeConfig,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    #[serde(default)]
    key_column: Option<usize>,
    #[serde(default)]
    edit_strategy: EditStrategy,
}

impl DemoTable {
    fn sample() -> Self {
        Self {
            config: TreeConfig::default(),
            columns: ["ID", "Parent", "Content", "Details"]
                .into_iter()
                .map(String::from)
                .collect(),
            rows: vec![
                vec![json!(1), json!(0), json!("first item"), json!("Details for first item")],
                vec![json!(2), json!(1), json!("second item"), json!("Details for second item")],
                vec![json!(3), json!(1), json!("third item"), json!("Details for third item")],
                vec![json!(4), json!(0), json!("fourth item"), json!("Details for fourth item")],
            ],
            key_column: None,
            edit_strategy: EditStrategy::OnFieldChange,
        }
    }

    fn into_table(self) -> (MemoryTable, TreeConfig) {
        let mut table = MemoryTable::new("demo", self.columns)
            .with_rows(self.rows)
            .with_edit_strategy(self.edit_strategy);
        if let Some(key_column) = self.key_column {
            table = table.with_key_column(key_column);
        }
        (table, self.config)
    }
}

/// Everything already sent to `rx`
fn drain_events(rx: &mut broadcast::Receiver<TreeEvent>) -> Vec<TreeEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("tree_demo=info,treeproxy_core=debug")
                }),
        )
        .init();

    let document = match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path))?;
            serde_json::from_str::<DemoTable>(&raw)
                .with_context(|| format!("Failed to parse {}", path))?
        }
        None => DemoTable::sample(),
    };

    let (table, config) = document.into_table();
    let mut model = TreeModel::new(table, config).context("Failed to attach tree model")?;
    let mut rx = model.subscribe();

    model
        .check_integrity()
        .context("Table does not encode a valid tree")?;
    println!("🌳 Projected tree:");
    print_tree(&model)?;

    let Some(first) = model.children(NodeHandle::Root)?.first().copied() else {
        bail!("Table has no top-level records");
    };

    println!("\n➕ insert under #{}", first);
    let inserted = model.insert(NodeHandle::Record(first), 1)?;
    report(&inserted, &mut rx);
    print_tree(&model)?;

    let top_level = model.children(NodeHandle::Root)?;
    if let Some(&last) = top_level.last().filter(|last| **last != first) {
        if let Some(&child) = model.children(NodeHandle::Record(first))?.first() {
            println!("\n↪️  move #{} under #{}", child, last);
            model.move_node(child, last)?;
            report(&child, &mut rx);
            print_tree(&model)?;
        }

        println!("\n🚫 move #{} under its own descendant", first);
        if let Some(&descendant) = model.children(NodeHandle::Record(first))?.first() {
            match model.move_node(first, descendant) {
                Ok(()) => println!("   unexpectedly succeeded"),
                Err(e) => println!("   refused: {}", e),
            }
        }

        println!("\n📋 copy #{} under #{}", first, last);
        let clone = model.copy_node(first, last)?;
        report(&clone, &mut rx);
        print_tree(&model)?;
    }

    println!("\n🗑️  remove #{} and its subtree", first);
    let removed = model.remove(NodeHandle::Record(first), 1)?;
    report(&removed, &mut rx);
    model.submit_all()?;
    drain_events(&mut rx);
    print_tree(&model)?;

    model.check_integrity()?;
    tracing::info!("Demo finished; tree is consistent");
    Ok(())
}

fn report<T: std::fmt::Debug>(result: &T, rx: &mut broadcast::Receiver<TreeEvent>) {
    println!("   result: {:?}", result);
    let events: Vec<TreeEvent> = drain_events(rx);
    let names: Vec<&str> = events.iter().map(TreeEvent::event_type).collect();
    println!("   events: {}", names.join(", "));
}

fn print_tree(model: &TreeModel<MemoryTable>) -> anyhow::Result<()> {
    let label_column = (0..model.column_count())
        .find(|column| !model.layout().is_tracked(*column));

    let mut stack: Vec<(NodeHandle, usize)> = model
        .children(NodeHandle::Root)?
        .into_iter()
        .rev()
        .map(|id| (NodeHandle::Record(id), 0))
        .collect();

    while let Some((node, depth)) = stack.pop() {
        let label = match label_column {
            Some(column) => model.data(node, column)?,
            None => Value::Null,
        };
        println!("   {}{} {}", "  ".repeat(depth), node, label);
        stack.extend(
            model
                .children(node)?
                .into_iter()
                .rev()
                .map(|id| (NodeHandle::Record(id), depth + 1)),
        );
    }
    Ok(())
}
