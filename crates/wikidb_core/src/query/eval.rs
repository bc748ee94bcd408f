//! Evaluation of parsed clauses against documents.

use crate::document::Document;
use crate::query::lexer::CompareOp;
use crate::query::parser::{Column, DocField, Expr, Operand, OrderKey};
use std::borrow::Cow;
use std::cmp::Ordering;
use wikidb_codec::Value;

/// Value of a column for one document. Missing data reads as `Null`.
pub(crate) fn column_value(doc: &Document, column: &Column) -> Value {
    let reference = &doc.reference;
    match column {
        Column::Doc(field) => match field {
            DocField::FullName => Value::Text(reference.full_name()),
            DocField::Space => Value::from(reference.space()),
            DocField::Name => Value::from(reference.name()),
            DocField::Wiki => Value::from(reference.wiki()),
            DocField::Language => Value::from(reference.language()),
            DocField::DefaultLanguage => Value::from(doc.default_language.as_str()),
            DocField::Translation => Value::Integer(i64::from(reference.is_translation())),
            DocField::Content => Value::from(doc.content.as_str()),
            DocField::Title => Value::from(doc.title.as_str()),
            DocField::Parent => {
                if doc.parent.is_empty() {
                    Value::Null
                } else {
                    Value::from(doc.parent.as_str())
                }
            }
            DocField::Author => Value::from(doc.author.as_str()),
            DocField::CreationDate => Value::Integer(doc.creation_date.timestamp_millis()),
            DocField::Date => Value::Integer(doc.update_date.timestamp_millis()),
            DocField::Revision => Value::Integer(i64::try_from(doc.revision).unwrap_or(i64::MAX)),
        },
        Column::Mapped {
            class_name,
            property,
        } => doc
            .first_object(class_name)
            .and_then(|object| object.get(property))
            .cloned()
            .unwrap_or(Value::Null),
    }
}

fn operand_value<'a>(operand: &Operand, doc: &Document, params: &'a [Value]) -> Cow<'a, Value> {
    match operand {
        Operand::Column(column) => Cow::Owned(column_value(doc, column)),
        Operand::Param(index) => params
            .get(*index)
            .map_or(Cow::Owned(Value::Null), Cow::Borrowed),
        Operand::Null => Cow::Owned(Value::Null),
    }
}

/// Whether `doc` satisfies `expr`.
///
/// Comparisons involving `Null` or values of incomparable types are false;
/// use `is null` to test for missing values.
pub(crate) fn evaluate(expr: &Expr, doc: &Document, params: &[Value]) -> bool {
    match expr {
        Expr::And(a, b) => evaluate(a, doc, params) && evaluate(b, doc, params),
        Expr::Or(a, b) => evaluate(a, doc, params) || evaluate(b, doc, params),
        Expr::Not(inner) => !evaluate(inner, doc, params),
        Expr::Compare { left, op, right } => {
            let left = operand_value(left, doc, params);
            let right = operand_value(right, doc, params);
            let Some(ordering) = left.compare(&right) else {
                return false;
            };
            match op {
                CompareOp::Eq => ordering == Ordering::Equal,
                CompareOp::Ne => ordering != Ordering::Equal,
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Le => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::Ge => ordering != Ordering::Less,
            }
        }
        Expr::Like {
            operand,
            pattern,
            negated,
        } => {
            let value = operand_value(operand, doc, params);
            let pattern = operand_value(pattern, doc, params);
            match (value.as_text(), pattern.as_text()) {
                (Some(text), Some(pattern)) => like(text, pattern) != *negated,
                _ => false,
            }
        }
        Expr::In {
            operand,
            list,
            negated,
        } => {
            let value = operand_value(operand, doc, params);
            if value.is_null() {
                return false;
            }
            let found = list
                .iter()
                .any(|item| value.loose_eq(&operand_value(item, doc, params)));
            found != *negated
        }
        Expr::IsNull { operand, negated } => {
            operand_value(operand, doc, params).is_null() != *negated
        }
    }
}

/// SQL `LIKE`: `%` matches any run, `_` any single character.
pub(crate) fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some('_') => {
                t += 1;
                p += 1;
            }
            Some(c) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

/// Orders two documents by `keys`. `Null` sorts first; incomparable values
/// tie.
pub(crate) fn compare_documents(a: &Document, b: &Document, keys: &[OrderKey]) -> Ordering {
    for key in keys {
        let left = column_value(a, &key.column);
        let right = column_value(b, &key.column);
        let ordering = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => left.compare(&right).unwrap_or(Ordering::Equal),
        };
        let ordering = if key.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BaseObject, DocumentReference};
    use crate::query::lexer::bind;
    use crate::query::parser::parse;

    fn matches(clause: &str, params: &[Value], doc: &Document) -> bool {
        let bound = bind(clause, params).unwrap();
        let parsed = parse(&bound.tokens, clause.len()).unwrap();
        parsed
            .filter
            .map_or(true, |f| evaluate(&f, doc, &bound.values))
    }

    fn sample() -> Document {
        let mut doc = Document::new(DocumentReference::new("xwiki", "Blog", "Hello"))
            .with_content("Hello world")
            .with_object(BaseObject::new("Blog.PostClass", 1).with("rating", 3))
            .with_object(BaseObject::new("Blog.PostClass", 0).with("rating", 5));
        doc.revision = 4;
        doc
    }

    #[test]
    fn like_patterns() {
        assert!(like("Hello", "H%"));
        assert!(like("Hello", "%llo"));
        assert!(like("Hello", "H_llo"));
        assert!(like("Hello", "%"));
        assert!(like("", "%"));
        assert!(!like("Hello", "H_lo"));
        assert!(like("abcbc", "%bc"));
        assert!(!like("Hello", "hello"));
    }

    #[test]
    fn document_columns() {
        let doc = sample();
        assert!(matches("doc.fullName = 'Blog.Hello'", &[], &doc));
        assert!(matches("doc.web = ? and doc.version >= 4", &[Value::from("Blog")], &doc));
        assert!(matches("doc.translation = 0 and doc.language = ''", &[], &doc));
        assert!(matches("doc.parent is null", &[], &doc));
        assert!(!matches("doc.content like 'world%'", &[], &doc));
    }

    #[test]
    fn mapped_column_reads_first_object() {
        let doc = sample();
        assert!(matches("Blog.PostClass.rating = 5", &[], &doc));
        assert!(matches("Other.Class.rating is null", &[], &doc));
    }

    #[test]
    fn null_comparisons_are_false() {
        let doc = sample();
        assert!(!matches("doc.parent = null", &[], &doc));
        assert!(!matches("doc.parent <> 'x'", &[], &doc));
        assert!(!matches("doc.name = 1", &[], &doc));
    }

    #[test]
    fn in_and_not() {
        let doc = sample();
        assert!(matches("doc.name in ('A', 'Hello')", &[], &doc));
        assert!(matches("doc.name not in ('A', 'B')", &[], &doc));
        assert!(matches("not (doc.name = 'A' or doc.space = 'Main')", &[], &doc));
    }
}
