//! Query execution.

use crate::context::Context;
use crate::document::Document;
use crate::error::{StorageError, StorageResult};
use crate::mapping::ClassMappingRegistry;
use crate::query::eval::{compare_documents, evaluate};
use crate::query::lexer::{bind, CompareOp};
use crate::query::parser::{parse, parse_column, Column, Expr, Operand, ParsedQuery};
use crate::tables::Tables;
use crate::transaction::TransactionManager;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use wikidb_codec::Value;

/// Execution flags and pagination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// One row per translation instead of one row per page.
    pub distinct_by_language: bool,
    /// Allow `Space.Class.property` columns of registered mappings.
    pub custom_mapping: bool,
    /// Drop rows the context user may not view.
    pub check_right: bool,
    /// Maximum rows returned; 0 returns all.
    pub limit: usize,
    /// Rows skipped before the first returned one.
    pub offset: usize,
}

/// A structured filter AND-ed onto the clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Column path, as in the clause.
    pub column: String,
    /// Comparison.
    pub op: CompareOp,
    /// Right-hand value. `Null` with `Eq`/`Ne` tests for (non-)null.
    pub value: Value,
}

/// A query: clause text, positional parameters, conditions and options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    clause: String,
    params: Vec<Value>,
    conditions: Vec<Condition>,
    options: QueryOptions,
}

impl Query {
    /// A query with `clause`, e.g. `where doc.space = ? order by doc.name`.
    pub fn new(clause: impl Into<String>) -> Self {
        Self {
            clause: clause.into(),
            ..Self::default()
        }
    }

    /// Binds the next `?` placeholder.
    #[must_use]
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Binds several placeholders in order.
    #[must_use]
    pub fn bind_all<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.params.extend(values.into_iter().map(Into::into));
        self
    }

    /// Adds a structured condition.
    #[must_use]
    pub fn condition(mut self, column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            column: column.into(),
            op,
            value: value.into(),
        });
        self
    }

    /// Sets the maximum number of rows; 0 returns all.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.options.limit = limit;
        self
    }

    /// Sets the number of rows to skip.
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.options.offset = offset;
        self
    }

    /// Sets `distinct_by_language`.
    #[must_use]
    pub fn distinct_by_language(mut self, value: bool) -> Self {
        self.options.distinct_by_language = value;
        self
    }

    /// Sets `custom_mapping`.
    #[must_use]
    pub fn custom_mapping(mut self, value: bool) -> Self {
        self.options.custom_mapping = value;
        self
    }

    /// Sets `check_right`.
    #[must_use]
    pub fn check_right(mut self, value: bool) -> Self {
        self.options.check_right = value;
        self
    }

    /// Replaces all options.
    #[must_use]
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Clause text.
    #[must_use]
    pub fn clause(&self) -> &str {
        &self.clause
    }

    /// Caller parameters.
    #[must_use]
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Options.
    #[must_use]
    pub fn options(&self) -> &QueryOptions {
        &self.options
    }
}

/// Runs queries against the committed snapshot.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    txn: Arc<TransactionManager>,
    registry: Arc<ClassMappingRegistry>,
}

struct Plan {
    parsed: ParsedQuery,
    values: Vec<Value>,
}

impl QueryExecutor {
    pub(crate) fn new(txn: Arc<TransactionManager>, registry: Arc<ClassMappingRegistry>) -> Self {
        Self { txn, registry }
    }

    /// Full names of the matching pages.
    ///
    /// With `distinct_by_language` a page appears once per matching
    /// translation.
    ///
    /// # Errors
    ///
    /// See [`search_documents`](Self::search_documents).
    pub fn search_names(&self, query: &Query, ctx: &Context) -> StorageResult<Vec<String>> {
        Ok(self
            .search_documents(query, ctx)?
            .iter()
            .map(Document::full_name)
            .collect())
    }

    /// Matching documents of `ctx`'s wiki.
    ///
    /// Without `distinct_by_language` each page yields one row, its
    /// default-language document when one exists. That document is returned
    /// even when only a translation of the page matched, so a returned
    /// document need not satisfy the clause itself. Rows come in document id
    /// order unless the clause has `order by`. Rights are checked before
    /// `offset` and `limit` apply.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `ParameterMismatch` if placeholders and parameters disagree
    /// - `MalformedQuery` if the clause does not parse, or uses a class
    ///   column without `custom_mapping`
    /// - `MappingMismatch` if a class column is not mapped
    /// - `InvalidOperation` if `check_right` is set without a right service
    /// - `UnknownWiki` if `ctx`'s wiki is not in the catalogue
    pub fn search_documents(&self, query: &Query, ctx: &Context) -> StorageResult<Vec<Document>> {
        let rows = self.matching(query, ctx)?;
        let options = query.options;
        let rows = rows.into_iter().skip(options.offset);
        let rows: Vec<Document> = if options.limit == 0 {
            rows.collect()
        } else {
            rows.take(options.limit).collect()
        };
        Ok(rows)
    }

    /// Number of rows the query matches, ignoring `limit` and `offset`.
    ///
    /// # Errors
    ///
    /// See [`search_documents`](Self::search_documents).
    pub fn count(&self, query: &Query, ctx: &Context) -> StorageResult<usize> {
        Ok(self.matching(query, ctx)?.len())
    }

    fn matching(&self, query: &Query, ctx: &Context) -> StorageResult<Vec<Document>> {
        let tables = self.txn.snapshot();
        if !tables.has_wiki(ctx.wiki()) {
            return Err(StorageError::UnknownWiki {
                wiki: ctx.wiki().to_string(),
            });
        }

        let plan = self.plan(query, ctx.wiki())?;
        let rights = if query.options.check_right {
            Some(ctx.rights().ok_or_else(|| {
                StorageError::invalid_operation("check_right requires a right service in the context")
            })?)
        } else {
            None
        };

        let matched: Vec<&Document> = tables
            .documents_in(ctx.wiki())
            .filter(|doc| {
                plan.parsed
                    .filter
                    .as_ref()
                    .map_or(true, |f| evaluate(f, doc, &plan.values))
            })
            .collect();

        let mut rows = if query.options.distinct_by_language {
            matched
        } else {
            collapse_translations(&tables, matched)
        };

        if !plan.parsed.order.is_empty() {
            rows.sort_by(|a, b| compare_documents(a, b, &plan.parsed.order));
        }
        if let Some(rights) = rights {
            rows.retain(|doc| rights.can_view(ctx.user(), &doc.reference));
        }

        debug!(
            wiki = ctx.wiki(),
            clause = query.clause(),
            rows = rows.len(),
            "query matched"
        );
        Ok(rows.into_iter().cloned().collect())
    }

    fn plan(&self, query: &Query, wiki: &str) -> StorageResult<Plan> {
        let clause = query.clause();
        let bound = bind(clause, query.params())?;
        let mut parsed = parse(&bound.tokens, clause.len()).map_err(|e| {
            StorageError::malformed_query(clause, query.params().len(), e.to_string())
        })?;
        let mut values = bound.values;

        for condition in &query.conditions {
            let column = parse_column(&condition.column).map_err(|message| {
                StorageError::malformed_query(clause, query.params().len(), message)
            })?;
            let expr = condition_expr(column, condition, &mut values);
            parsed.filter = Some(match parsed.filter.take() {
                Some(existing) => Expr::And(Box::new(existing), Box::new(expr)),
                None => expr,
            });
        }

        self.check_columns(query, wiki, &parsed)?;
        Ok(Plan { parsed, values })
    }

    fn check_columns(&self, query: &Query, wiki: &str, parsed: &ParsedQuery) -> StorageResult<()> {
        let mut columns: Vec<&Column> = Vec::new();
        if let Some(filter) = &parsed.filter {
            filter.for_each_column(&mut |c| columns.push(c));
        }
        columns.extend(parsed.order.iter().map(|k| &k.column));

        for column in columns {
            let Column::Mapped {
                class_name,
                property,
            } = column
            else {
                continue;
            };
            if !query.options.custom_mapping {
                return Err(StorageError::malformed_query(
                    query.clause(),
                    query.params().len(),
                    format!("column `{class_name}.{property}` requires custom mapping"),
                ));
            }
            let mapped = self
                .registry
                .mapping(wiki, class_name)
                .is_some_and(|m| m.column(property).is_some());
            if !mapped {
                return Err(StorageError::mapping_mismatch(
                    class_name.as_str(),
                    format!("property `{property}` is not mapped in wiki {wiki}"),
                ));
            }
        }
        Ok(())
    }
}

fn condition_expr(column: Column, condition: &Condition, values: &mut Vec<Value>) -> Expr {
    let operand = Operand::Column(column);
    if condition.value.is_null() && matches!(condition.op, CompareOp::Eq | CompareOp::Ne) {
        return Expr::IsNull {
            operand,
            negated: condition.op == CompareOp::Ne,
        };
    }
    values.push(condition.value.clone());
    Expr::Compare {
        left: operand,
        op: condition.op,
        right: Operand::Param(values.len() - 1),
    }
}

/// Keeps one row per page, preferring its default-language document.
fn collapse_translations<'a>(tables: &'a Tables, matched: Vec<&'a Document>) -> Vec<&'a Document> {
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for doc in matched {
        let page = doc.reference.default_language();
        if !seen.insert(page.id()) {
            continue;
        }
        rows.push(tables.document_by_reference(&page).unwrap_or(doc));
    }
    rows
}
