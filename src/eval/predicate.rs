//! In-memory predicate language and its tree-walking evaluator.
//!
//! Comparison is strict: values of different kinds never match (a string
//! never equals a number), and an absent field fails every comparison
//! rather than raising an error. Numbers compare numerically across the
//! integer/float representations.

use std::cmp::Ordering;

use serde_json::Value;

use crate::doc::path::Path;
use crate::eval::context::EvalContext;

/// Binary comparison operators.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal.
    Eq,
    /// Not equal.
    Neq,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
}

/// Array containment modes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContainsMode {
    /// At least one of the given values is in the array.
    Any,
    /// Every given value is in the array.
    All,
    /// None of the given values is in the array.
    None,
}

/// A predicate over one document.
#[derive(Clone, Debug)]
pub enum Predicate {
    /// Compare the field's value against a literal.
    Compare {
        /// Field, relative to the enclosing context.
        field: Path,
        /// Operator.
        op: CompareOp,
        /// Literal to compare against.
        value: Value,
    },
    /// Compare two fields of the same document.
    CompareFields {
        /// Left field.
        field: Path,
        /// Operator.
        op: CompareOp,
        /// Right field.
        rfield: Path,
    },
    /// Membership of the field's value in a literal set.
    In {
        /// Field, relative to the enclosing context.
        field: Path,
        /// Candidate values.
        values: Vec<Value>,
        /// Invert: match when the value is *not* in the set.
        negated: bool,
    },
    /// Logical negation.
    Not(Box<Predicate>),
    /// Conjunction.
    And(Vec<Predicate>),
    /// Disjunction.
    Or(Vec<Predicate>),
    /// Containment test over an array of scalars.
    ArrayContains {
        /// The array field.
        array: Path,
        /// Containment mode.
        mode: ContainsMode,
        /// Values to look for.
        values: Vec<Value>,
    },
    /// Element match: some single array element satisfies `elem` as a whole.
    ArrayMatch {
        /// The array field.
        array: Path,
        /// Predicate each element is tested against, relative to the
        /// element.
        elem: Box<Predicate>,
    },
}

impl Predicate {
    /// Equality comparison.
    pub fn eq(field: Path, value: Value) -> Self {
        Predicate::Compare {
            field,
            op: CompareOp::Eq,
            value,
        }
    }

    /// Arbitrary comparison.
    pub fn compare(field: Path, op: CompareOp, value: Value) -> Self {
        Predicate::Compare { field, op, value }
    }

    /// Membership in a value set.
    pub fn any_of(field: Path, values: Vec<Value>) -> Self {
        Predicate::In {
            field,
            values,
            negated: false,
        }
    }

    /// Element match over an object array.
    pub fn elem_match(array: Path, elem: Predicate) -> Self {
        Predicate::ArrayMatch {
            array,
            elem: Box::new(elem),
        }
    }
}

/// Outcome of evaluating a predicate against one document.
#[derive(Clone, Debug)]
pub struct Evaluation {
    /// Whether the document matched.
    pub matched: bool,
    /// Absolute paths of array elements matched by `ArrayMatch` predicates,
    /// in evaluation order.
    pub matched_elements: Vec<Path>,
}

/// Evaluates `pred` against `doc`.
pub fn evaluate(pred: &Predicate, doc: &Value) -> Evaluation {
    let mut ctx = EvalContext::root(doc);
    let mut matched_elements = Vec::new();
    let matched = eval(pred, &mut ctx, &mut matched_elements);
    Evaluation {
        matched,
        matched_elements,
    }
}

fn eval<'d>(pred: &Predicate, ctx: &mut EvalContext<'d>, matched: &mut Vec<Path>) -> bool {
    let result = match pred {
        Predicate::Compare { field, op, value } => ctx
            .node_at(field)
            .is_some_and(|node| compare(node, *op, value)),
        Predicate::CompareFields { field, op, rfield } => {
            match (ctx.node_at(field), ctx.node_at(rfield)) {
                (Some(l), Some(r)) => compare(l, *op, r),
                _ => false,
            }
        }
        Predicate::In {
            field,
            values,
            negated,
        } => ctx.node_at(field).is_some_and(|node| {
            let found = values.iter().any(|v| values_equal(node, v));
            found != *negated
        }),
        Predicate::Not(inner) => !eval(inner, ctx, matched),
        Predicate::And(parts) => parts.iter().all(|p| eval(p, ctx, matched)),
        Predicate::Or(parts) => parts.iter().any(|p| eval(p, ctx, matched)),
        Predicate::ArrayContains {
            array,
            mode,
            values,
        } => ctx
            .node_at(array)
            .and_then(Value::as_array)
            .is_some_and(|items| {
                let holds = |v: &Value| items.iter().any(|item| values_equal(item, v));
                match mode {
                    ContainsMode::Any => values.iter().any(holds),
                    ContainsMode::All => values.iter().all(holds),
                    ContainsMode::None => !values.iter().any(holds),
                }
            }),
        Predicate::ArrayMatch { array, elem } => {
            match ctx.node_at(array).and_then(Value::as_array) {
                None => false,
                Some(items) => {
                    let mut cursor = ctx.first_element(array);
                    let mut any = false;
                    for (index, item) in items.iter().enumerate() {
                        cursor.move_to(Some(item), index);
                        if eval(elem, cursor.context_mut(), matched) {
                            matched.push(cursor.context().path().clone());
                            any = true;
                        }
                    }
                    any
                }
            }
        }
    };
    ctx.set_result(result);
    result
}

/// Total ordering attempt for two scalar values of the same kind.
fn ordering(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(xi), Some(yi)) = (x.as_i64(), y.as_i64()) {
                return Some(xi.cmp(&yi));
            }
            match (x.as_f64(), y.as_f64()) {
                (Some(xf), Some(yf)) => xf.partial_cmp(&yf),
                _ => None,
            }
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match ordering(a, b) {
        Some(ord) => ord == Ordering::Equal,
        None => a == b,
    }
}

fn compare(node: &Value, op: CompareOp, value: &Value) -> bool {
    match op {
        CompareOp::Eq => values_equal(node, value),
        CompareOp::Neq => !values_equal(node, value),
        CompareOp::Lt => ordering(node, value) == Some(Ordering::Less),
        CompareOp::Lte => matches!(
            ordering(node, value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::Gt => ordering(node, value) == Some(Ordering::Greater),
        CompareOp::Gte => matches!(
            ordering(node, value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
    }
}
