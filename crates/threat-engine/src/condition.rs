//! The condition mini-language used by rule match expressions.
//!
//! Expressions are ASCII identifiers with optional parenthesized argument
//! lists, e.g. `and(connects(isProcess, isStore), not(isEncrypted))`.  An
//! expression is parsed once into an [`Expr`] tree and evaluated by
//! structural recursion against a node and the full node collection of its
//! diagram.
//!
//! Anything the parser does not recognize (an unknown identifier, a wrong
//! arity, unbalanced parentheses) becomes [`Expr::Unknown`], which never
//! matches.  Evaluation cannot fail.

use crate::diagram::{Cell, CellType};

/// A parsed match expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A fixed-name boolean test against the node's type or flags.
    Primitive(Predicate),
    /// `not(X)`: true iff `X` is false.
    Not(Box<Expr>),
    /// `and(X, Y, ...)`: variadic; an empty argument list is vacuously true.
    And(Vec<Expr>),
    /// `or(X, Y, ...)`: variadic; an empty argument list is vacuously false.
    Or(Vec<Expr>),
    /// `hasProperty(name)` / `hasProperty(name, value)`.
    HasProperty {
        name: String,
        value: Option<String>,
    },
    /// `source(T)`: the flow's source node satisfies `T`.  Flows only.
    Source(Box<Expr>),
    /// `target(T)`: the flow's target node satisfies `T`.  Flows only.
    Target(Box<Expr>),
    /// `connects(T1, T2)`: source satisfies `T1` and target satisfies `T2`.
    Connects(Box<Expr>, Box<Expr>),
    /// Anything unparseable; evaluates false.
    Unknown(String),
}

/// The fixed-name primitive predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    IsActor,
    IsProcess,
    IsStore,
    IsFlow,
    IsAnyProcess,
    IsEncrypted,
    IsPublicNetwork,
    IsOutOfScope,
    IsPublicFacing,
    IsWebApplication,
    IsApi,
}

impl Predicate {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "isActor" => Some(Predicate::IsActor),
            "isProcess" => Some(Predicate::IsProcess),
            "isStore" => Some(Predicate::IsStore),
            "isFlow" => Some(Predicate::IsFlow),
            "isAnyProcess" => Some(Predicate::IsAnyProcess),
            "isEncrypted" => Some(Predicate::IsEncrypted),
            "isPublicNetwork" => Some(Predicate::IsPublicNetwork),
            "isOutOfScope" => Some(Predicate::IsOutOfScope),
            "isPublicFacing" => Some(Predicate::IsPublicFacing),
            "isWebApplication" => Some(Predicate::IsWebApplication),
            "isAPI" => Some(Predicate::IsApi),
            _ => None,
        }
    }

    fn test(&self, cell: &Cell, cells: &[Cell]) -> bool {
        match self {
            Predicate::IsActor => cell.cell_type == CellType::Actor,
            Predicate::IsProcess => cell.cell_type == CellType::Process,
            Predicate::IsStore => cell.cell_type == CellType::Store,
            Predicate::IsFlow => cell.cell_type == CellType::Flow,
            Predicate::IsAnyProcess => {
                matches!(cell.cell_type, CellType::Process | CellType::Actor)
            }
            Predicate::IsEncrypted => cell.is_encrypted,
            Predicate::IsPublicNetwork => cell.is_public_network,
            Predicate::IsOutOfScope => cell.out_of_scope,
            Predicate::IsPublicFacing => {
                cell.is_public_facing || has_public_flow_to(cell, cells)
            }
            Predicate::IsWebApplication => named_process_mentions(cell, "web"),
            Predicate::IsApi => named_process_mentions(cell, "api"),
        }
    }
}

impl Expr {
    /// Parse a match expression.  Never fails: unparseable input becomes
    /// [`Expr::Unknown`].
    pub fn parse(input: &str) -> Expr {
        let input = input.trim();
        if input.is_empty() {
            return Expr::Unknown(String::new());
        }

        if let Some(predicate) = Predicate::from_name(input) {
            return Expr::Primitive(predicate);
        }

        let Some(open) = input.find('(') else {
            return Expr::Unknown(input.to_string());
        };
        if !input.ends_with(')') {
            return Expr::Unknown(input.to_string());
        }

        let head = input[..open].trim();
        let inner = &input[open + 1..input.len() - 1];
        let Some(args) = split_arguments(inner) else {
            return Expr::Unknown(input.to_string());
        };

        match (head, args.len()) {
            ("not", 1) => Expr::Not(Box::new(Expr::parse(&args[0]))),
            ("and", _) => Expr::And(args.iter().map(|a| Expr::parse(a)).collect()),
            ("or", _) => Expr::Or(args.iter().map(|a| Expr::parse(a)).collect()),
            ("hasProperty", 1) if !args[0].is_empty() => Expr::HasProperty {
                name: args[0].clone(),
                value: None,
            },
            ("hasProperty", 2) if !args[0].is_empty() => Expr::HasProperty {
                name: args[0].clone(),
                value: Some(args[1].clone()),
            },
            ("source", 1) => Expr::Source(Box::new(Expr::parse(&args[0]))),
            ("target", 1) => Expr::Target(Box::new(Expr::parse(&args[0]))),
            ("connects", 2) => Expr::Connects(
                Box::new(Expr::parse(&args[0])),
                Box::new(Expr::parse(&args[1])),
            ),
            _ => Expr::Unknown(input.to_string()),
        }
    }

    /// Evaluate this expression against `cell` in the context of all nodes of
    /// the diagram.
    pub fn evaluate(&self, cell: &Cell, cells: &[Cell]) -> bool {
        match self {
            Expr::Primitive(predicate) => predicate.test(cell, cells),
            Expr::Not(inner) => !inner.evaluate(cell, cells),
            Expr::And(parts) => parts.iter().all(|part| part.evaluate(cell, cells)),
            Expr::Or(parts) => parts.iter().any(|part| part.evaluate(cell, cells)),
            Expr::HasProperty { name, value } => {
                has_property(cell, name, value.as_deref())
            }
            Expr::Source(inner) => {
                flow_endpoint(cell, cells, cell.source.as_deref())
                    .is_some_and(|source| inner.evaluate(source, cells))
            }
            Expr::Target(inner) => {
                flow_endpoint(cell, cells, cell.target.as_deref())
                    .is_some_and(|target| inner.evaluate(target, cells))
            }
            Expr::Connects(source_expr, target_expr) => {
                let source = flow_endpoint(cell, cells, cell.source.as_deref());
                let target = flow_endpoint(cell, cells, cell.target.as_deref());
                match (source, target) {
                    (Some(source), Some(target)) => {
                        source_expr.evaluate(source, cells)
                            && target_expr.evaluate(target, cells)
                    }
                    _ => false,
                }
            }
            Expr::Unknown(_) => false,
        }
    }

    /// True when parsing produced no recognizable expression.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Expr::Unknown(_))
    }
}

/// Split a parenthesized argument list on top-level commas, tracking paren
/// depth so nested calls stay intact.  Returns `None` when the parentheses
/// are unbalanced.
fn split_arguments(input: &str) -> Option<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for ch in input.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.checked_sub(1)?;
                current.push(ch);
            }
            ',' if depth == 0 => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if depth != 0 {
        return None;
    }
    let tail = current.trim();
    if !tail.is_empty() {
        args.push(tail.to_string());
    }
    Some(args)
}

/// Resolve a flow endpoint by node id.  Returns `None` when the cell is not a
/// flow, the endpoint id is absent, or no node carries that id.
fn flow_endpoint<'a>(cell: &Cell, cells: &'a [Cell], id: Option<&str>) -> Option<&'a Cell> {
    if cell.cell_type != CellType::Flow {
        return None;
    }
    let id = id?;
    cells.iter().find(|candidate| candidate.id == id)
}

/// Any flow in the diagram targets `cell` over a public network.
fn has_public_flow_to(cell: &Cell, cells: &[Cell]) -> bool {
    cells.iter().any(|candidate| {
        candidate.cell_type == CellType::Flow
            && candidate.is_public_network
            && candidate.target.as_deref() == Some(cell.id.as_str())
    })
}

/// Process whose name or description mentions `needle`, case-insensitively.
fn named_process_mentions(cell: &Cell, needle: &str) -> bool {
    if cell.cell_type != CellType::Process {
        return false;
    }
    let mentions = |text: &Option<String>| {
        text.as_deref()
            .is_some_and(|t| t.to_lowercase().contains(needle))
    };
    mentions(&cell.name) || mentions(&cell.description)
}

fn has_property(cell: &Cell, name: &str, expected: Option<&str>) -> bool {
    let Some(value) = cell.property(name) else {
        return false;
    };
    if value.is_null() {
        return false;
    }
    match expected {
        None => true,
        // Strict string comparison against the trimmed expected value;
        // non-string attributes never equal a literal.
        Some(expected) => match value {
            serde_json::Value::String(actual) => actual == expected.trim(),
            _ => false,
        },
    }
}
