//! Explain output
//!
//! Renders the analysed tree of a module with one line per node, indented by
//! depth and annotated with its execution mode. Output is deterministic.

use std::fmt;

use super::analysis::analyse;
use super::module::QueryModule;
use super::node::NodeRef;
use crate::errors::EngineError;

/// One rendered node
#[derive(Debug, Clone, PartialEq)]
pub struct ExplainLine {
    pub depth: usize,
    pub node: &'static str,
    pub mode: String,
    pub position: String,
}

/// Explain plan output
#[derive(Debug, Clone)]
pub struct ExplainPlan {
    /// Whether analysis succeeded
    pub accepted: bool,
    /// Declared functions, each with its body lines
    pub functions: Vec<(String, Vec<ExplainLine>)>,
    /// Lines of the main body
    pub body: Vec<ExplainLine>,
    /// Rejection reason (if rejected)
    pub rejection_reason: Option<String>,
    /// Rejection error code (if rejected)
    pub rejection_code: Option<String>,
}

impl ExplainPlan {
    /// Analyses the module and renders it, or reports why analysis failed
    pub fn from_module(module: &QueryModule) -> Self {
        match analyse(module) {
            Ok(()) => Self {
                accepted: true,
                functions: module
                    .functions
                    .iter()
                    .map(|f| {
                        let signature = format!("{}#{}", f.name, f.arity());
                        (signature, lines(NodeRef::Expression(&f.body)))
                    })
                    .collect(),
                body: lines(NodeRef::Expression(&module.body)),
                rejection_reason: None,
                rejection_code: None,
            },
            Err(err) => Self::from_error(&err),
        }
    }

    /// Creates an explain plan from an analysis error
    pub fn from_error(err: &EngineError) -> Self {
        Self {
            accepted: false,
            functions: Vec::new(),
            body: Vec::new(),
            rejection_reason: Some(match err.position() {
                Some(position) => format!("{} (at {})", err.message(), position),
                None => err.message().to_string(),
            }),
            rejection_code: Some(err.code().code().to_string()),
        }
    }
}

fn lines(root: NodeRef<'_>) -> Vec<ExplainLine> {
    fn walk(node: NodeRef<'_>, depth: usize, out: &mut Vec<ExplainLine>) {
        out.push(ExplainLine {
            depth,
            node: node.name(),
            mode: node.mode_tolerating_unset().to_string(),
            position: if node.position().is_unknown() {
                String::new()
            } else {
                node.position().to_string()
            },
        });
        for child in node.children() {
            walk(child, depth + 1, out);
        }
    }

    let mut out = Vec::new();
    walk(root, 0, &mut out);
    out
}

fn write_lines(f: &mut fmt::Formatter<'_>, lines: &[ExplainLine]) -> fmt::Result {
    for line in lines {
        write!(f, "{}{} [{}]", "  ".repeat(line.depth + 1), line.node, line.mode)?;
        if !line.position.is_empty() {
            write!(f, " @ {}", line.position)?;
        }
        writeln!(f)?;
    }
    Ok(())
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN ===")?;

        if self.accepted {
            writeln!(f, "Status: ACCEPTED")?;
            for (signature, body) in &self.functions {
                writeln!(f, "Function {}:", signature)?;
                write_lines(f, body)?;
            }
            writeln!(f, "Body:")?;
            write_lines(f, &self.body)?;
        } else {
            writeln!(f, "Status: REJECTED")?;
            if let Some(code) = &self.rejection_code {
                writeln!(f, "Error Code: {}", code)?;
            }
            if let Some(reason) = &self.rejection_reason {
                writeln!(f, "Reason: {}", reason)?;
            }
        }

        Ok(())
    }
}
