//! Band-math formulas.
//!
//! A formula is a scalar expression over the free variables `band1` and
//! `band2`, e.g. `(band2 - band1) / (band2 + band1)` for NDVI. The text is
//! parsed once into an AST over `+ - * / ** ( )`, unary minus and decimal
//! literals; nothing else is accepted, so no user input is ever interpreted
//! at evaluation time.
//!
//! Division by zero evaluates to NaN instead of failing, so the result
//! participates in the NaN-aware time-stack reductions downstream.

use crate::error::EngineError;
use anyhow::Result;
use ndarray::{Array2, Zip};
use std::fmt::{self, Debug};

#[derive(Clone, PartialEq)]
enum Expr {
	Literal(f64),
	Band1,
	Band2,
	Neg(Box<Expr>),
	Add(Box<Expr>, Box<Expr>),
	Sub(Box<Expr>, Box<Expr>),
	Mul(Box<Expr>, Box<Expr>),
	Div(Box<Expr>, Box<Expr>),
	Pow(Box<Expr>, Box<Expr>),
}

impl Expr {
	fn eval(&self, band1: f64, band2: f64) -> f64 {
		match self {
			Expr::Literal(value) => *value,
			Expr::Band1 => band1,
			Expr::Band2 => band2,
			Expr::Neg(inner) => -inner.eval(band1, band2),
			Expr::Add(lhs, rhs) => lhs.eval(band1, band2) + rhs.eval(band1, band2),
			Expr::Sub(lhs, rhs) => lhs.eval(band1, band2) - rhs.eval(band1, band2),
			Expr::Mul(lhs, rhs) => lhs.eval(band1, band2) * rhs.eval(band1, band2),
			Expr::Div(lhs, rhs) => {
				let divisor = rhs.eval(band1, band2);
				if divisor == 0.0 {
					f64::NAN
				} else {
					lhs.eval(band1, band2) / divisor
				}
			}
			Expr::Pow(lhs, rhs) => lhs.eval(band1, band2).powf(rhs.eval(band1, band2)),
		}
	}

	fn uses_band2(&self) -> bool {
		match self {
			Expr::Band2 => true,
			Expr::Literal(_) | Expr::Band1 => false,
			Expr::Neg(inner) => inner.uses_band2(),
			Expr::Add(lhs, rhs) | Expr::Sub(lhs, rhs) | Expr::Mul(lhs, rhs) | Expr::Div(lhs, rhs) | Expr::Pow(lhs, rhs) => {
				lhs.uses_band2() || rhs.uses_band2()
			}
		}
	}
}

/// A parsed, validated band-math expression.
#[derive(Clone)]
pub struct Formula {
	text: String,
	expr: Expr,
}

impl Formula {
	/// Parses the expression, rejecting any construct outside the supported
	/// operator set as a validation error.
	pub fn parse(text: &str) -> Result<Formula> {
		let mut parser = Parser::new(text);
		let expr = parser.parse_expr()?;
		if let Some(token) = parser.peek()? {
			return Err(EngineError::validation(format!(
				"formula '{text}': unexpected '{token}' after the end of the expression"
			)));
		}
		Ok(Formula {
			text: text.to_string(),
			expr,
		})
	}

	pub fn text(&self) -> &str {
		&self.text
	}

	/// True for the identity formula `band1`, which short-circuits to the
	/// raw band array (and keeps multi-band RGB cubes intact).
	pub fn is_identity(&self) -> bool {
		self.expr == Expr::Band1
	}

	pub fn uses_band2(&self) -> bool {
		self.expr.uses_band2()
	}

	/// Evaluates the formula for one pixel.
	pub fn eval(&self, band1: f64, band2: f64) -> f64 {
		self.expr.eval(band1, band2)
	}

	/// Evaluates the formula element-wise over one or two equally shaped
	/// band arrays.
	pub fn apply(&self, band1: &Array2<f64>, band2: Option<&Array2<f64>>) -> Result<Array2<f64>> {
		match band2 {
			Some(band2) => {
				if band1.dim() != band2.dim() {
					return Err(EngineError::validation(format!(
						"band arrays have different shapes: {:?} vs {:?}",
						band1.dim(),
						band2.dim()
					)));
				}
				Ok(Zip::from(band1).and(band2).map_collect(|&a, &b| self.eval(a, b)))
			}
			None => {
				if self.uses_band2() {
					return Err(EngineError::validation(format!(
						"formula '{}' references band2, but no second band was requested",
						self.text
					)));
				}
				Ok(band1.mapv(|a| self.eval(a, f64::NAN)))
			}
		}
	}
}

impl Debug for Formula {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Formula({})", self.text)
	}
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
	Number(f64),
	Band1,
	Band2,
	Plus,
	Minus,
	Star,
	Slash,
	DoubleStar,
	Open,
	Close,
}

impl fmt::Display for Token {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Token::Number(value) => write!(f, "{value}"),
			Token::Band1 => write!(f, "band1"),
			Token::Band2 => write!(f, "band2"),
			Token::Plus => write!(f, "+"),
			Token::Minus => write!(f, "-"),
			Token::Star => write!(f, "*"),
			Token::Slash => write!(f, "/"),
			Token::DoubleStar => write!(f, "**"),
			Token::Open => write!(f, "("),
			Token::Close => write!(f, ")"),
		}
	}
}

struct Parser<'a> {
	text: &'a str,
	chars: std::iter::Peekable<std::str::Chars<'a>>,
	lookahead: Option<Token>,
}

impl<'a> Parser<'a> {
	fn new(text: &'a str) -> Parser<'a> {
		Parser {
			text,
			chars: text.chars().peekable(),
			lookahead: None,
		}
	}

	fn reject(&self, msg: impl fmt::Display) -> anyhow::Error {
		EngineError::validation(format!("formula '{}': {msg}", self.text))
	}

	fn next_token(&mut self) -> Result<Option<Token>> {
		while matches!(self.chars.peek(), Some(c) if c.is_whitespace()) {
			self.chars.next();
		}
		let Some(&c) = self.chars.peek() else {
			return Ok(None);
		};

		let token = match c {
			'+' => {
				self.chars.next();
				Token::Plus
			}
			'-' => {
				self.chars.next();
				Token::Minus
			}
			'/' => {
				self.chars.next();
				Token::Slash
			}
			'(' => {
				self.chars.next();
				Token::Open
			}
			')' => {
				self.chars.next();
				Token::Close
			}
			'*' => {
				self.chars.next();
				if self.chars.peek() == Some(&'*') {
					self.chars.next();
					Token::DoubleStar
				} else {
					Token::Star
				}
			}
			'0'..='9' | '.' => {
				let mut literal = String::new();
				while matches!(self.chars.peek(), Some(c) if c.is_ascii_digit() || *c == '.') {
					literal.push(self.chars.next().unwrap());
				}
				let value = literal
					.parse::<f64>()
					.map_err(|_| self.reject(format!("'{literal}' is not a valid number")))?;
				Token::Number(value)
			}
			c if c.is_ascii_alphabetic() || c == '_' => {
				let mut ident = String::new();
				while matches!(self.chars.peek(), Some(c) if c.is_ascii_alphanumeric() || *c == '_') {
					ident.push(self.chars.next().unwrap());
				}
				match ident.as_str() {
					"band1" => Token::Band1,
					"band2" => Token::Band2,
					_ => return Err(self.reject(format!("unknown name '{ident}', only band1 and band2 are allowed"))),
				}
			}
			other => return Err(self.reject(format!("unsupported character '{other}'"))),
		};
		Ok(Some(token))
	}

	fn peek(&mut self) -> Result<Option<Token>> {
		if self.lookahead.is_none() {
			self.lookahead = self.next_token()?;
		}
		Ok(self.lookahead.clone())
	}

	fn advance(&mut self) -> Result<Option<Token>> {
		self.peek()?;
		Ok(self.lookahead.take())
	}

	fn parse_expr(&mut self) -> Result<Expr> {
		let mut lhs = self.parse_term()?;
		loop {
			match self.peek()? {
				Some(Token::Plus) => {
					self.advance()?;
					lhs = Expr::Add(Box::new(lhs), Box::new(self.parse_term()?));
				}
				Some(Token::Minus) => {
					self.advance()?;
					lhs = Expr::Sub(Box::new(lhs), Box::new(self.parse_term()?));
				}
				_ => return Ok(lhs),
			}
		}
	}

	fn parse_term(&mut self) -> Result<Expr> {
		let mut lhs = self.parse_unary()?;
		loop {
			match self.peek()? {
				Some(Token::Star) => {
					self.advance()?;
					lhs = Expr::Mul(Box::new(lhs), Box::new(self.parse_unary()?));
				}
				Some(Token::Slash) => {
					self.advance()?;
					lhs = Expr::Div(Box::new(lhs), Box::new(self.parse_unary()?));
				}
				_ => return Ok(lhs),
			}
		}
	}

	// Unary minus binds looser than `**` on its operand, exponents bind
	// right to left: -band1**2 == -(band1**2), 2**-3 == 2**(-3).
	fn parse_unary(&mut self) -> Result<Expr> {
		if self.peek()? == Some(Token::Minus) {
			self.advance()?;
			return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
		}
		self.parse_power()
	}

	fn parse_power(&mut self) -> Result<Expr> {
		let base = self.parse_atom()?;
		if self.peek()? == Some(Token::DoubleStar) {
			self.advance()?;
			return Ok(Expr::Pow(Box::new(base), Box::new(self.parse_unary()?)));
		}
		Ok(base)
	}

	fn parse_atom(&mut self) -> Result<Expr> {
		match self.advance()? {
			Some(Token::Number(value)) => Ok(Expr::Literal(value)),
			Some(Token::Band1) => Ok(Expr::Band1),
			Some(Token::Band2) => Ok(Expr::Band2),
			Some(Token::Open) => {
				let inner = self.parse_expr()?;
				match self.advance()? {
					Some(Token::Close) => Ok(inner),
					_ => Err(self.reject("missing closing parenthesis")),
				}
			}
			Some(token) => Err(self.reject(format!("unexpected '{token}'"))),
			None => Err(self.reject("expression ends unexpectedly")),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use ndarray::array;
	use rstest::rstest;

	#[rstest]
	#[case("band1", 3.0, 0.0, 3.0)]
	#[case("band1 + band2", 3.0, 4.0, 7.0)]
	#[case("band2 - band1", 3.0, 4.0, 1.0)]
	#[case("band1 * band2", 3.0, 4.0, 12.0)]
	#[case("band2 / band1", 3.0, 12.0, 4.0)]
	#[case("band1 ** 2", 3.0, 0.0, 9.0)]
	#[case("2 ** -1", 0.0, 0.0, 0.5)]
	#[case("-band1 ** 2", 3.0, 0.0, -9.0)]
	#[case("(band2 - band1) / (band2 + band1)", 1.0, 3.0, 0.5)]
	#[case("0.5 * (band1 + band2)", 2.0, 4.0, 3.0)]
	#[case("1 - 2 - 3", 0.0, 0.0, -4.0)]
	#[case("2 + 3 * 4", 0.0, 0.0, 14.0)]
	fn evaluates(#[case] text: &str, #[case] band1: f64, #[case] band2: f64, #[case] expected: f64) {
		let formula = Formula::parse(text).unwrap();
		assert_eq!(formula.eval(band1, band2), expected, "{text}");
	}

	#[test]
	fn division_by_zero_is_nan() {
		let formula = Formula::parse("band1 / band2").unwrap();
		assert!(formula.eval(1.0, 0.0).is_nan());
		assert!(formula.eval(0.0, 0.0).is_nan());
	}

	#[rstest]
	#[case("band3")]
	#[case("band1.mean()")]
	#[case("band1[0]")]
	#[case("band1 = 2")]
	#[case("__import__")]
	#[case("band1 +")]
	#[case("(band1")]
	#[case("1..2")]
	#[case("band1 band2")]
	fn rejects_everything_else(#[case] text: &str) {
		let err = Formula::parse(text).unwrap_err();
		assert!(
			matches!(EngineError::of(&err), Some(EngineError::Validation(_))),
			"'{text}' must be rejected as validation error, got: {err}"
		);
	}

	#[test]
	fn identity_detection() {
		assert!(Formula::parse("band1").unwrap().is_identity());
		assert!(Formula::parse(" band1 ").unwrap().is_identity());
		assert!(!Formula::parse("band1 + 0").unwrap().is_identity());
	}

	#[test]
	fn ndvi_on_equal_bands_is_zero() {
		let formula = Formula::parse("(band2 - band1) / (band2 + band1)").unwrap();
		let band = array![[0.2, 0.4], [0.0, 0.8]];
		let result = formula.apply(&band, Some(&band)).unwrap();

		assert_eq!(result[[0, 0]], 0.0);
		assert_eq!(result[[0, 1]], 0.0);
		assert!(result[[1, 0]].is_nan(), "0/0 must be NaN");
		assert_eq!(result[[1, 1]], 0.0);
	}

	#[test]
	fn apply_requires_band2_when_referenced() {
		let formula = Formula::parse("band1 + band2").unwrap();
		let band = array![[1.0]];
		assert!(formula.apply(&band, None).is_err());
	}

	#[test]
	fn apply_rejects_shape_mismatch() {
		let formula = Formula::parse("band1 + band2").unwrap();
		let a = array![[1.0, 2.0]];
		let b = array![[1.0], [2.0]];
		assert!(formula.apply(&a, Some(&b)).is_err());
	}

	#[test]
	fn nan_propagates_through_arithmetic() {
		let formula = Formula::parse("band1 * 2 + band2").unwrap();
		assert!(formula.eval(f64::NAN, 1.0).is_nan());
	}
}
