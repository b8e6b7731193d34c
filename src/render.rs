use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LibError, Result};
use crate::graph::Graph;
use crate::models::{GlobalAttr, GlobalAttrType};
use crate::tables::{EdgeTable, NodeTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Graph,
    Source,
    Markup,
}

/// Read-only view of everything a renderer needs.
#[derive(Debug, Clone, Copy)]
pub struct RenderInput<'a> {
    pub nodes: &'a NodeTable,
    pub edges: &'a EdgeTable,
    pub directed: bool,
    pub global_attrs: &'a [GlobalAttr],
    pub width: Option<u32>,
    pub height: Option<u32>,
}

pub trait Renderer {
    fn render(&self, input: &RenderInput<'_>, kind: OutputKind) -> Result<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DotRenderer;

impl Renderer for DotRenderer {
    fn render(&self, input: &RenderInput<'_>, kind: OutputKind) -> Result<String> {
        match kind {
            OutputKind::Source => Ok(generate_dot(input)),
            other => Err(LibError::invalid(
                "This renderer only produces DOT source",
                anyhow!("DotRenderer cannot produce {:?} output", other),
            )),
        }
    }
}

impl Graph {
    pub fn render_input(&self, width: Option<u32>, height: Option<u32>) -> RenderInput<'_> {
        RenderInput {
            nodes: self.nodes(),
            edges: self.edges(),
            directed: self.is_directed(),
            global_attrs: self.global_attrs(),
            width,
            height,
        }
    }

    pub fn render(
        &self,
        renderer: &dyn Renderer,
        kind: OutputKind,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<String> {
        renderer.render(&self.render_input(width, height), kind)
    }
}

/// Graphviz DOT source for the graph.
pub fn generate_dot(input: &RenderInput<'_>) -> String {
    let (keyword, arrow) = if input.directed {
        ("digraph", "->")
    } else {
        ("graph", "--")
    };
    let mut dot = format!("{keyword} {{\n\n");

    let mut graph_attrs = globals_of(input.global_attrs, GlobalAttrType::Graph);
    if let (Some(width), Some(height)) = (input.width, input.height) {
        graph_attrs.push(("size".to_string(), format!("{width},{height}")));
    }
    for (attr_type, attrs) in [
        ("graph", graph_attrs),
        ("node", globals_of(input.global_attrs, GlobalAttrType::Node)),
        ("edge", globals_of(input.global_attrs, GlobalAttrType::Edge)),
    ] {
        if !attrs.is_empty() {
            dot.push_str(&format!("{attr_type} [{}]\n", attr_list(&attrs)));
        }
    }
    dot.push('\n');

    for node in input.nodes.iter() {
        let mut attrs = Vec::new();
        if let Some(label) = &node.label {
            attrs.push(("label".to_string(), label.clone()));
        }
        attrs.extend(dot_attrs(&node.attrs));
        dot.push_str(&format!("  '{}'{}\n", node.id, bracketed(&attrs)));
    }
    dot.push('\n');

    for edge in input.edges.iter() {
        let mut attrs = Vec::new();
        if let Some(rel) = &edge.rel {
            attrs.push(("rel".to_string(), rel.clone()));
        }
        attrs.extend(dot_attrs(&edge.attrs));
        dot.push_str(&format!(
            "  '{}'{}'{}'{}\n",
            edge.from,
            arrow,
            edge.to,
            bracketed(&attrs)
        ));
    }
    dot.push('}');
    dot
}

fn globals_of(attrs: &[GlobalAttr], attr_type: GlobalAttrType) -> Vec<(String, String)> {
    attrs
        .iter()
        .filter(|attr| attr.attr_type == attr_type)
        .map(|attr| (attr.attr.clone(), attr.value.clone()))
        .collect()
}

fn dot_attrs(attrs: &serde_json::Map<String, Value>) -> Vec<(String, String)> {
    attrs
        .iter()
        .filter_map(|(name, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            Some((name.clone(), text))
        })
        .collect()
}

fn attr_list(attrs: &[(String, String)]) -> String {
    attrs
        .iter()
        .map(|(name, value)| format!("{} = '{}'", name, value.replace('\'', "\\'")))
        .collect::<Vec<_>>()
        .join(", ")
}

fn bracketed(attrs: &[(String, String)]) -> String {
    if attrs.is_empty() {
        String::new()
    } else {
        format!(" [{}]", attr_list(attrs))
    }
}
