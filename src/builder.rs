//! Builds an `EvaluationContext` from an XML graph document:
//!
//! ```xml
//! <root>
//!   <variable value="X"><constant value="3"/></variable>
//!   <variable value="Y">
//!     <bin_op type="+"><variable value="X"/><variable value="z"/></bin_op>
//!   </variable>
//! </root>
//! ```
//!
//! Every top-level `variable` declares a named expression over its single
//! child. Below the top level a `variable` refers to an expression declared
//! earlier, else to a shared input variable that is created on first use.
use crate::context::{ContextError, EvaluationContext};
use crate::store::{BinaryOp, CatalogError, NodeId, UnaryOp};
use roxmltree::{Document, Node};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("Expected a <root> document element, found <{0}>")]
    UnexpectedRoot(String),
    #[error("Should have only expression/variable at root level, found <{0}>")]
    UnexpectedTopLevel(String),
    #[error("Unknown node <{0}>")]
    UnknownElement(String),
    #[error("<{element}> is missing the '{attribute}' attribute")]
    MissingAttribute { element: String, attribute: &'static str },
    #[error("Invalid constant value '{0}'")]
    InvalidNumber(String),
    #[error("<{element}> expects {expected} child element(s), found {found}")]
    ChildCount { element: String, expected: usize, found: usize },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("Expression '{0}' is referenced before it is declared")]
    ForwardReference(String),
    #[error(transparent)]
    Context(#[from] ContextError),
}

pub fn from_str(xml: &str) -> Result<EvaluationContext, BuildError> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "root" {
        return Err(BuildError::UnexpectedRoot(root.tag_name().name().to_string()));
    }

    let mut builder = Builder { ctx: EvaluationContext::new() };
    for declaration in root.children().filter(Node::is_element) {
        if declaration.tag_name().name() != "variable" {
            return Err(BuildError::UnexpectedTopLevel(declaration.tag_name().name().to_string()));
        }
        builder.declaration(declaration)?;
    }

    let ctx = builder.ctx;
    debug!(
        expressions = ctx.expression_names().count(),
        variables = ctx.variable_names().count(),
        nodes = ctx.node_count(),
        "graph built"
    );
    Ok(ctx)
}

pub fn from_path(path: impl AsRef<Path>) -> Result<EvaluationContext, BuildError> {
    let path = path.as_ref();
    let xml = fs::read_to_string(path).map_err(|source| BuildError::Io {
        path: path.display().to_string(),
        source,
    })?;
    from_str(&xml)
}

struct Builder {
    ctx: EvaluationContext,
}

impl Builder {
    fn declaration(&mut self, node: Node<'_, '_>) -> Result<NodeId, BuildError> {
        let name = attribute(node, "value")?;
        let [body] = element_children::<1>(node)?;
        let body = self.build(body)?;

        // The name was already taken as an input by an earlier (or its own) body.
        match self.ctx.define_expression(name, body) {
            Err(ContextError::NameConflict(name)) => Err(BuildError::ForwardReference(name)),
            other => Ok(other?),
        }
    }

    fn build(&mut self, node: Node<'_, '_>) -> Result<NodeId, BuildError> {
        match node.tag_name().name() {
            "constant" => {
                let raw = attribute(node, "value")?;
                let value = raw
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| BuildError::InvalidNumber(raw.to_string()))?;
                Ok(self.ctx.add_constant(value))
            }
            "variable" => {
                let name = attribute(node, "value")?;
                if let Some(id) = self.ctx.lookup_expression(name) {
                    return Ok(id);
                }
                if let Some(id) = self.ctx.lookup_variable(name) {
                    return Ok(id);
                }
                Ok(self.ctx.declare_variable(name)?)
            }
            "un_op" => {
                // Unknown symbols fail before the operand is built.
                let op: UnaryOp = attribute(node, "type")?.parse()?;
                let [child] = element_children::<1>(node)?;
                let child = self.build(child)?;
                Ok(self.ctx.add_unary(op, child)?)
            }
            "bin_op" => {
                let op: BinaryOp = attribute(node, "type")?.parse()?;
                let [left, right] = element_children::<2>(node)?;
                let left = self.build(left)?;
                let right = self.build(right)?;
                Ok(self.ctx.add_binary(op, left, right)?)
            }
            other => Err(BuildError::UnknownElement(other.to_string())),
        }
    }
}

fn attribute<'a>(node: Node<'a, '_>, attribute: &'static str) -> Result<&'a str, BuildError> {
    node.attribute(attribute).ok_or_else(|| BuildError::MissingAttribute {
        element: node.tag_name().name().to_string(),
        attribute,
    })
}

fn element_children<'a, 'i, const N: usize>(node: Node<'a, 'i>) -> Result<[Node<'a, 'i>; N], BuildError> {
    let children: Vec<Node<'a, 'i>> = node.children().filter(Node::is_element).collect();
    let found = children.len();
    children.try_into().map_err(|_| BuildError::ChildCount {
        element: node.tag_name().name().to_string(),
        expected: N,
        found,
    })
}
