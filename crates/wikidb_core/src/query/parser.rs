//! Recursive-descent parser for bound query clauses.

use crate::query::lexer::{CompareOp, ParseError, Spanned, Token};

/// Document metadata column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DocField {
    FullName,
    Space,
    Name,
    Wiki,
    Language,
    DefaultLanguage,
    Translation,
    Content,
    Title,
    Parent,
    Author,
    CreationDate,
    Date,
    Revision,
}

impl DocField {
    fn from_name(name: &str) -> Option<Self> {
        let field = match name.to_ascii_lowercase().as_str() {
            "fullname" => Self::FullName,
            "space" | "web" => Self::Space,
            "name" => Self::Name,
            "wiki" => Self::Wiki,
            "language" => Self::Language,
            "defaultlanguage" => Self::DefaultLanguage,
            "translation" => Self::Translation,
            "content" => Self::Content,
            "title" => Self::Title,
            "parent" => Self::Parent,
            "author" => Self::Author,
            "creationdate" => Self::CreationDate,
            "date" => Self::Date,
            "version" | "revision" => Self::Revision,
            _ => return None,
        };
        Some(field)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Column {
    Doc(DocField),
    /// `Space.Class.property`: a property of the first object of a class.
    Mapped {
        class_name: String,
        property: String,
    },
}

/// Resolves a dotted column path.
pub(crate) fn parse_column(path: &str) -> Result<Column, String> {
    if let Some(field) = path.strip_prefix("doc.") {
        return DocField::from_name(field)
            .map(Column::Doc)
            .ok_or_else(|| format!("unknown document column `{path}`"));
    }
    match path.rsplit_once('.') {
        Some((class_name, property)) if class_name.contains('.') && !property.is_empty() => {
            Ok(Column::Mapped {
                class_name: class_name.to_string(),
                property: property.to_string(),
            })
        }
        _ => Err(format!(
            "unknown column `{path}`, expected doc.<field> or <Space.Class>.<property>"
        )),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Column(Column),
    Param(usize),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    Like {
        operand: Operand,
        pattern: Operand,
        negated: bool,
    },
    In {
        operand: Operand,
        list: Vec<Operand>,
        negated: bool,
    },
    IsNull {
        operand: Operand,
        negated: bool,
    },
}

impl Expr {
    /// Calls `f` on every column the expression reads.
    pub(crate) fn for_each_column<'a>(&'a self, f: &mut impl FnMut(&'a Column)) {
        match self {
            Self::And(a, b) | Self::Or(a, b) => {
                a.for_each_column(f);
                b.for_each_column(f);
            }
            Self::Not(inner) => inner.for_each_column(f),
            Self::Compare { left, right, .. } => {
                visit_operand(left, f);
                visit_operand(right, f);
            }
            Self::Like {
                operand, pattern, ..
            } => {
                visit_operand(operand, f);
                visit_operand(pattern, f);
            }
            Self::In { operand, list, .. } => {
                visit_operand(operand, f);
                for item in list {
                    visit_operand(item, f);
                }
            }
            Self::IsNull { operand, .. } => visit_operand(operand, f),
        }
    }
}

fn visit_operand<'a>(operand: &'a Operand, f: &mut impl FnMut(&'a Column)) {
    if let Operand::Column(column) = operand {
        f(column);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OrderKey {
    pub(crate) column: Column,
    pub(crate) descending: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ParsedQuery {
    pub(crate) filter: Option<Expr>,
    pub(crate) order: Vec<OrderKey>,
}

pub(crate) fn parse(tokens: &[Spanned], clause_len: usize) -> Result<ParsedQuery, ParseError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: clause_len,
    };
    parser.query()
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    end: usize,
}

impl<'a> Parser<'a> {
    fn query(&mut self) -> Result<ParsedQuery, ParseError> {
        self.eat_keyword("where");

        let filter = if self.at_end() || self.peek_keyword("order") {
            None
        } else {
            Some(self.or()?)
        };

        let mut order = Vec::new();
        if self.eat_keyword("order") {
            self.expect_keyword("by")?;
            loop {
                let column = self.column()?;
                let descending = if self.eat_keyword("desc") {
                    true
                } else {
                    self.eat_keyword("asc");
                    false
                };
                order.push(OrderKey { column, descending });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }

        if let Some(extra) = self.peek() {
            return Err(ParseError::new(
                extra.offset,
                format!("unexpected `{}`", extra.token),
            ));
        }
        Ok(ParsedQuery { filter, order })
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.and()?;
        while self.eat_keyword("or") {
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        while self.eat_keyword("and") {
            let right = self.unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat_keyword("not") {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        if self.eat(&Token::LParen) {
            let inner = self.or()?;
            self.expect(&Token::RParen, "`)`")?;
            return Ok(inner);
        }
        self.predicate()
    }

    fn predicate(&mut self) -> Result<Expr, ParseError> {
        let operand = self.operand()?;

        if self.eat_keyword("is") {
            let negated = self.eat_keyword("not");
            self.expect_keyword("null")?;
            return Ok(Expr::IsNull { operand, negated });
        }

        let negated = self.eat_keyword("not");
        if self.eat_keyword("like") {
            let pattern = self.operand()?;
            return Ok(Expr::Like {
                operand,
                pattern,
                negated,
            });
        }
        if self.eat_keyword("in") {
            self.expect(&Token::LParen, "`(`")?;
            let mut list = vec![self.operand()?];
            while self.eat(&Token::Comma) {
                list.push(self.operand()?);
            }
            self.expect(&Token::RParen, "`)`")?;
            return Ok(Expr::In {
                operand,
                list,
                negated,
            });
        }
        if negated {
            return Err(self.error("expected `like` or `in` after `not`"));
        }

        match self.peek().map(|s| &s.token) {
            Some(Token::Op(op)) => {
                let op = *op;
                self.pos += 1;
                let right = self.operand()?;
                Ok(Expr::Compare {
                    left: operand,
                    op,
                    right,
                })
            }
            _ => Err(self.error("expected a comparison")),
        }
    }

    fn operand(&mut self) -> Result<Operand, ParseError> {
        let Some(spanned) = self.peek() else {
            return Err(self.error("expected an operand"));
        };
        let operand = match &spanned.token {
            Token::Param(index) => Operand::Param(*index),
            t if t.is_keyword("null") => Operand::Null,
            Token::Ident(path) if !is_reserved(path) => Operand::Column(
                parse_column(path).map_err(|message| ParseError::new(spanned.offset, message))?,
            ),
            other => {
                return Err(ParseError::new(
                    spanned.offset,
                    format!("expected an operand, found `{other}`"),
                ))
            }
        };
        self.pos += 1;
        Ok(operand)
    }

    fn column(&mut self) -> Result<Column, ParseError> {
        match self.operand()? {
            Operand::Column(column) => Ok(column),
            _ => Err(ParseError::new(
                self.tokens[self.pos - 1].offset,
                "expected a column",
            )),
        }
    }

    fn peek(&self) -> Option<&'a Spanned> {
        self.tokens.get(self.pos)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek_keyword(&self, word: &str) -> bool {
        self.peek().is_some_and(|s| s.token.is_keyword(word))
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        let found = self.peek_keyword(word);
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect_keyword(&mut self, word: &str) -> Result<(), ParseError> {
        if self.eat_keyword(word) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{word}`")))
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        let found = self.peek().is_some_and(|s| s.token == *token);
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let offset = self.peek().map_or(self.end, |s| s.offset);
        ParseError::new(offset, message)
    }
}

const RESERVED: [&str; 13] = [
    "where", "and", "or", "not", "like", "in", "is", "null", "order", "by", "asc", "desc", "true",
];

fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word)) || word.eq_ignore_ascii_case("false")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::lexer::bind;
    use wikidb_codec::Value;

    fn parse_clause(clause: &str, params: &[Value]) -> Result<ParsedQuery, ParseError> {
        let bound = bind(clause, params).unwrap();
        parse(&bound.tokens, clause.len())
    }

    #[test]
    fn empty_clause_has_no_filter() {
        assert_eq!(parse_clause("", &[]).unwrap(), ParsedQuery::default());
        assert_eq!(parse_clause("where", &[]).unwrap(), ParsedQuery::default());
    }

    #[test]
    fn precedence_and_binds_tighter_than_or() {
        let parsed =
            parse_clause("doc.name = 'a' or doc.name = 'b' and doc.space = 'c'", &[]).unwrap();
        assert!(matches!(parsed.filter, Some(Expr::Or(_, ref right)) if matches!(**right, Expr::And(..))));
    }

    #[test]
    fn order_keys() {
        let parsed = parse_clause("order by doc.date desc, doc.name", &[]).unwrap();
        assert!(parsed.filter.is_none());
        assert_eq!(
            parsed.order,
            vec![
                OrderKey {
                    column: Column::Doc(DocField::Date),
                    descending: true
                },
                OrderKey {
                    column: Column::Doc(DocField::Name),
                    descending: false
                },
            ]
        );
    }

    #[test]
    fn mapped_columns_split_at_last_dot() {
        assert_eq!(
            parse_column("Blog.PostClass.category").unwrap(),
            Column::Mapped {
                class_name: "Blog.PostClass".into(),
                property: "category".into()
            }
        );
        assert!(parse_column("PostClass.category").is_err());
        assert!(parse_column("doc.nope").is_err());
    }

    #[test]
    fn predicates() {
        let parsed = parse_clause(
            "doc.name not like 'A%' and doc.space in ('Main', ?) and doc.parent is not null",
            &[Value::from("Blog")],
        )
        .unwrap();
        let mut columns = Vec::new();
        parsed
            .filter
            .as_ref()
            .unwrap()
            .for_each_column(&mut |c| columns.push(c.clone()));
        assert_eq!(
            columns,
            vec![
                Column::Doc(DocField::Name),
                Column::Doc(DocField::Space),
                Column::Doc(DocField::Parent)
            ]
        );
    }

    #[test]
    fn errors_carry_offsets() {
        let err = parse_clause("doc.name = ", &[]).unwrap_err();
        assert_eq!(err.offset, "doc.name = ".len());

        let err = parse_clause("doc.name = 'a' doc.space", &[]).unwrap_err();
        assert_eq!(err.offset, 15);

        assert!(parse_clause("doc.name", &[]).is_err());
        assert!(parse_clause("order doc.name", &[]).is_err());
        assert!(parse_clause("(doc.name = 'a'", &[]).is_err());
    }
}
