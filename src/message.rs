//! Inbound message arguments
//!
//! The delivery library hands arguments over already typed. The raw path
//! consumes their numeric view; the reassembly path consumes the
//! comma-joined textual form of the whole argument list, which is also how
//! multi-value reset markers are recognized.

use std::fmt;

/// A single argument of an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Arg {
    /// Numeric view of the argument, if it has one.
    ///
    /// String arguments that parse as numbers count as numeric, matching
    /// the lenient conversion of the original wire consumers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Arg::Int(i) => Some(*i as f64),
            Arg::Float(f) => Some(*f),
            Arg::Str(s) => s.trim().parse().ok(),
        }
    }

    /// Join arguments into the comma-separated text fed to the assembler.
    pub fn join(args: &[Arg]) -> String {
        let parts: Vec<String> = args.iter().map(Arg::to_string).collect();
        parts.join(",")
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Int(i) => write!(f, "{}", i),
            Arg::Float(v) => write!(f, "{}", v),
            Arg::Str(s) => write!(f, "{}", s),
        }
    }
}
