//! Search command implementation.

use std::path::Path;
use wikidb_core::{Context, Query, QueryOptions, Value};

/// Arguments of the search command.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    /// Query clause.
    pub clause: String,
    /// Positional parameters as typed on the command line.
    pub params: Vec<String>,
    /// Wiki to search, main wiki if `None`.
    pub wiki: Option<String>,
    /// Maximum results, 0 for all.
    pub limit: usize,
    /// Results to skip.
    pub offset: usize,
    /// Allow class property columns.
    pub mapped: bool,
    /// One row per translation.
    pub distinct: bool,
    /// Print only the count.
    pub count: bool,
}

/// Outcome of a search.
#[derive(Debug, PartialEq, Eq)]
pub enum SearchOutput {
    /// Matching page names.
    Names(Vec<String>),
    /// Number of matches.
    Count(usize),
}

/// Types a command-line parameter: integers, then booleans, else text.
pub fn parse_param(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Integer(i);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::Text(raw.to_string()),
    }
}

/// Builds the query described by `args`.
pub fn build_query(args: &SearchArgs) -> Query {
    Query::new(args.clause.as_str())
        .bind_all(args.params.iter().map(|p| parse_param(p)))
        .with_options(QueryOptions {
            distinct_by_language: args.distinct,
            custom_mapping: args.mapped,
            check_right: false,
            limit: args.limit,
            offset: args.offset,
        })
}

/// Executes the search against the store at `path`.
pub fn execute(path: &Path, args: &SearchArgs) -> Result<SearchOutput, Box<dyn std::error::Error>> {
    let store = super::open_existing(path)?;
    let ctx = match &args.wiki {
        Some(wiki) => Context::new(wiki.as_str()),
        None => store.context(),
    };
    let query = build_query(args);
    let output = if args.count {
        SearchOutput::Count(store.queries().count(&query, &ctx)?)
    } else {
        SearchOutput::Names(store.queries().search_names(&query, &ctx)?)
    };
    Ok(output)
}

/// Runs the search command.
pub fn run(path: &Path, args: &SearchArgs) -> Result<(), Box<dyn std::error::Error>> {
    match execute(path, args)? {
        SearchOutput::Count(count) => println!("{count}"),
        SearchOutput::Names(names) => {
            for name in names {
                println!("{name}");
            }
        }
    }
    Ok(())
}
