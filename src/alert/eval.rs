//! Expression evaluator (C9): parses a comparison operator + threshold and
//! applies it to a live float sample (spec.md §4.9).

use std::str::FromStr;

/// The syntax table's fixed set of accepted comparison operators
/// (spec.md §3 "Syntax table").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
	Gt,
	Lt,
	Ge,
	Le,
	Eq,
	Ne,
}

impl Operator {
	pub const ALL: &'static [&'static str] = &[">", "<", ">=", "<=", "==", "!="];
}

impl FromStr for Operator {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			">" => Ok(Operator::Gt),
			"<" => Ok(Operator::Lt),
			">=" => Ok(Operator::Ge),
			"<=" => Ok(Operator::Le),
			"==" => Ok(Operator::Eq),
			"!=" => Ok(Operator::Ne),
			_ => Err(()),
		}
	}
}

/// Ordinary IEEE-754 float comparison (spec.md §4.9 / §8 invariant 5).
pub fn evaluate(op: Operator, threshold: f64, sample: f64) -> bool {
	match op {
		Operator::Gt => sample > threshold,
		Operator::Lt => sample < threshold,
		Operator::Ge => sample >= threshold,
		Operator::Le => sample <= threshold,
		Operator::Eq => sample == threshold,
		Operator::Ne => sample != threshold,
	}
}
