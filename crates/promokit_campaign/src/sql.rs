//! SQL placeholder injection.
//!
//! Templates are stored one line per cell and carry empty placeholders such
//! as `qualify_start=''` or `article_list=()`. Each placeholder convention is
//! one row in [`TUP_SQL_RULES`]; adding a convention means adding a row.

use regex::{Captures, Regex};
use tracing::warn;

use crate::conf::{C_SQL_MISSING_PLACEHOLDER, C_SQL_TUPLE_EMPTY};
use crate::dates::SpecFormattedDates;
use crate::error::{CampaignResult, EnumCampaignError};

/// Values available to substitution rules.
#[derive(Debug, Clone, Copy)]
pub struct SpecSqlContext<'a> {
    pub dates: &'a SpecFormattedDates,
    pub article_tuple: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnumSqlPlaceholder {
    /// `name=''`
    EmptyQuote,
    /// `name=()`
    EmptyTuple,
}

/// One substitution rule: the variable name, its empty form, and the value.
struct SpecSqlRule {
    c_name: &'static str,
    placeholder: EnumSqlPlaceholder,
    render: fn(&SpecSqlContext<'_>) -> String,
}

const TUP_SQL_RULES: [SpecSqlRule; 10] = [
    SpecSqlRule {
        c_name: "qualify_start",
        placeholder: EnumSqlPlaceholder::EmptyQuote,
        render: |ctx| ctx.dates.ty_q_start.clone(),
    },
    SpecSqlRule {
        c_name: "qualify_end",
        placeholder: EnumSqlPlaceholder::EmptyQuote,
        render: |ctx| ctx.dates.ty_q_end.clone(),
    },
    SpecSqlRule {
        c_name: "ly_qualify_start",
        placeholder: EnumSqlPlaceholder::EmptyQuote,
        render: |ctx| ctx.dates.ly_q_start.clone(),
    },
    SpecSqlRule {
        c_name: "ly_qualify_end",
        placeholder: EnumSqlPlaceholder::EmptyQuote,
        render: |ctx| ctx.dates.ly_q_end.clone(),
    },
    SpecSqlRule {
        c_name: "redeem_start",
        placeholder: EnumSqlPlaceholder::EmptyQuote,
        render: |ctx| ctx.dates.ty_r_start.clone(),
    },
    SpecSqlRule {
        c_name: "redeem_end",
        placeholder: EnumSqlPlaceholder::EmptyQuote,
        render: |ctx| ctx.dates.ty_r_end.clone(),
    },
    SpecSqlRule {
        c_name: "ly_redeem_start",
        placeholder: EnumSqlPlaceholder::EmptyQuote,
        render: |ctx| ctx.dates.ly_r_start.clone(),
    },
    SpecSqlRule {
        c_name: "ly_redeem_end",
        placeholder: EnumSqlPlaceholder::EmptyQuote,
        render: |ctx| ctx.dates.ly_r_end.clone(),
    },
    SpecSqlRule {
        c_name: "article_list",
        placeholder: EnumSqlPlaceholder::EmptyTuple,
        render: |ctx| ctx.article_tuple.to_string(),
    },
    // Misspelling found in older templates.
    SpecSqlRule {
        c_name: "articl_list",
        placeholder: EnumSqlPlaceholder::EmptyTuple,
        render: |ctx| ctx.article_tuple.to_string(),
    },
];

impl SpecSqlRule {
    /// Case-insensitive, whitespace-tolerant around `=`. The name must not be
    /// the tail of a longer identifier (`qualify_start` vs `ly_qualify_start`).
    fn compile(&self) -> CampaignResult<Regex> {
        let c_empty = match self.placeholder {
            EnumSqlPlaceholder::EmptyQuote => r"''",
            EnumSqlPlaceholder::EmptyTuple => r"\(\s*\)",
        };
        let c_pattern = format!(
            r"(?i)(^|[^A-Za-z0-9_])({})\s*=\s*{c_empty}",
            regex::escape(self.c_name)
        );
        Regex::new(&c_pattern).map_err(|err| {
            EnumCampaignError::Configuration(format!("Invalid SQL rule {:?}: {err}", self.c_name))
        })
    }

    fn format_value(&self, c_value: &str) -> String {
        match self.placeholder {
            EnumSqlPlaceholder::EmptyQuote => format!("'{c_value}'"),
            EnumSqlPlaceholder::EmptyTuple => c_value.to_string(),
        }
    }
}

/// Apply every rule to `c_sql`.
pub fn render_sql_template(c_sql: &str, ctx: &SpecSqlContext<'_>) -> CampaignResult<String> {
    let mut c_out = c_sql.to_string();
    for rule in &TUP_SQL_RULES {
        let regex = rule.compile()?;
        let c_value = rule.format_value(&(rule.render)(ctx));
        c_out = regex
            .replace_all(&c_out, |caps: &Captures<'_>| {
                format!("{}{}={}", &caps[1], &caps[2], c_value)
            })
            .into_owned();
    }
    Ok(c_out)
}

/// Quoted, comma-separated, parenthesized list of non-blank ids.
///
/// Single quotes inside an id are doubled. No ids yields `()`.
pub fn format_sql_tuple<S: AsRef<str>>(l_ids: &[S]) -> String {
    let l_quoted: Vec<String> = l_ids
        .iter()
        .map(|id| id.as_ref().trim())
        .filter(|id| !id.is_empty())
        .map(|id| format!("'{}'", id.replace('\'', "''")))
        .collect();
    if l_quoted.is_empty() {
        return C_SQL_TUPLE_EMPTY.to_string();
    }
    format!("({})", l_quoted.join(","))
}

/// SQL shown to the operator for one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRenderedSql {
    pub text: String,
    /// No SQL text was found; `text` is an explanatory placeholder.
    pub if_placeholder: bool,
    pub warnings: Vec<String>,
}

impl SpecRenderedSql {
    /// Render `c_source`, or the placeholder when it holds no SQL.
    pub fn from_source(
        c_source: &str,
        ctx: &SpecSqlContext<'_>,
        c_origin: &str,
    ) -> CampaignResult<Self> {
        if c_source.trim().is_empty() {
            warn!(origin = c_origin, "no SQL text found");
            return Ok(Self {
                text: C_SQL_MISSING_PLACEHOLDER.to_string(),
                if_placeholder: true,
                warnings: vec![format!("No SQL code found in {c_origin}.")],
            });
        }
        Ok(Self {
            text: render_sql_template(c_source, ctx)?,
            if_placeholder: false,
            warnings: Vec::new(),
        })
    }
}
