//! Engine-agnostic query subsystem.
//!
//! Clauses use a small HQL-flavoured filter language over document
//! metadata and, with `custom_mapping`, over mapped class properties:
//!
//! ```text
//! where doc.space = ? and Blog.PostClass.rating >= 3 order by doc.date desc
//! ```
//!
//! Inline literals and `?` placeholders are interchangeable: the lexer
//! lifts every literal into the parameter list before parsing, so both
//! forms reach the evaluator identically.

mod eval;
mod executor;
mod lexer;
mod parser;

pub use executor::{Condition, Query, QueryExecutor, QueryOptions};
pub use lexer::{normalize_clause, CompareOp};
