use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Stable handle of a node inside the `Registry` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Unknown unary function: {0}")]
    UnknownUnary(String),
    #[error("Unknown binary function: {0}")]
    UnknownBinary(String),
}

/// Single-operand functions of the operator catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `!` — stands in for factorial and passes its operand through unchanged.
    Identity,
    Negate,
    Cos,
    Sin,
    Exp,
    /// Natural logarithm.
    Log,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Identity => "!",
            UnaryOp::Negate => "-",
            UnaryOp::Cos => "cos",
            UnaryOp::Sin => "sin",
            UnaryOp::Exp => "exp",
            UnaryOp::Log => "log",
        }
    }
}

impl FromStr for UnaryOp {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "!" => Ok(UnaryOp::Identity),
            "-" => Ok(UnaryOp::Negate),
            "cos" => Ok(UnaryOp::Cos),
            "sin" => Ok(UnaryOp::Sin),
            "exp" => Ok(UnaryOp::Exp),
            "log" => Ok(UnaryOp::Log),
            other => Err(CatalogError::UnknownUnary(other.to_string())),
        }
    }
}

/// Two-operand functions of the operator catalog. Operand order is significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Max,
    Min,
    Power,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Max => "max",
            BinaryOp::Min => "min",
            BinaryOp::Power => "^",
        }
    }

    /// Infix operators render as `l op r`, the named ones as `op(l, r)`.
    pub fn is_infix(self) -> bool {
        !matches!(self, BinaryOp::Max | BinaryOp::Min)
    }
}

impl FromStr for BinaryOp {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(BinaryOp::Add),
            "-" => Ok(BinaryOp::Subtract),
            "*" => Ok(BinaryOp::Multiply),
            "/" => Ok(BinaryOp::Divide),
            "max" => Ok(BinaryOp::Max),
            "min" => Ok(BinaryOp::Min),
            "^" => Ok(BinaryOp::Power),
            other => Err(CatalogError::UnknownBinary(other.to_string())),
        }
    }
}

/// The closed set of node variants. Composite variants refer to their
/// children by handle; a child may be shared by any number of parents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Constant(f64),
    /// An externally supplied input. Its value and dirty flag live in the `Ledger`.
    Variable { name: String },
    /// A named alias over a subtree.
    Expression { name: String, child: NodeId },
    Unary { op: UnaryOp, child: NodeId },
    Binary { op: BinaryOp, left: NodeId, right: NodeId },
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Constant(_) => "constant",
            NodeKind::Variable { .. } => "variable",
            NodeKind::Expression { .. } => "expression",
            NodeKind::Unary { .. } => "unary",
            NodeKind::Binary { .. } => "binary",
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            NodeKind::Variable { name } | NodeKind::Expression { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("!", UnaryOp::Identity)]
    #[case("-", UnaryOp::Negate)]
    #[case("cos", UnaryOp::Cos)]
    #[case("sin", UnaryOp::Sin)]
    #[case("exp", UnaryOp::Exp)]
    #[case("log", UnaryOp::Log)]
    fn test_unary_symbols(#[case] symbol: &str, #[case] expected: UnaryOp) {
        let op: UnaryOp = symbol.parse().unwrap();
        assert_eq!(op, expected);
        assert_eq!(op.symbol(), symbol);
    }

    #[rstest]
    #[case("+", BinaryOp::Add)]
    #[case("-", BinaryOp::Subtract)]
    #[case("*", BinaryOp::Multiply)]
    #[case("/", BinaryOp::Divide)]
    #[case("max", BinaryOp::Max)]
    #[case("min", BinaryOp::Min)]
    #[case("^", BinaryOp::Power)]
    fn test_binary_symbols(#[case] symbol: &str, #[case] expected: BinaryOp) {
        let op: BinaryOp = symbol.parse().unwrap();
        assert_eq!(op, expected);
        assert_eq!(op.symbol(), symbol);
    }

    #[test]
    fn test_unknown_symbols_are_rejected() {
        let err = "sqrt".parse::<UnaryOp>().unwrap_err();
        assert_eq!(err, CatalogError::UnknownUnary("sqrt".into()));
        assert_eq!(err.to_string(), "Unknown unary function: sqrt");

        // `!` only exists as a unary operator.
        let err = "!".parse::<BinaryOp>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown binary function: !");
    }
}
