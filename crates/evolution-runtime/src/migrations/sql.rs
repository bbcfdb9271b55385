//! Migration units backed by plain SQL files.
//!
//! ```sql
//! -- up
//! CREATE TABLE users (id BIGINT PRIMARY KEY);
//!
//! -- down
//! DROP TABLE users;
//! ```
//!
//! A down section containing `-- @irreversible` refuses to revert. A file
//! without a down section has no reverse operation at all.

use std::path::Path;

use evolution_core::error::{EvolutionError, Result};
use evolution_core::migration::{BoxFuture, MigrationContext, MigrationUnit};

const UP_MARKER: &str = "-- up";
const DOWN_MARKER: &str = "-- down";
const IRREVERSIBLE_DIRECTIVE: &str = "-- @irreversible";

/// Reverse half of a SQL migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlDown {
    /// No `-- down` section.
    Undefined,
    /// `-- @irreversible` inside the down section.
    Irreversible,
    Statements(Vec<String>),
}

/// A migration unit parsed from SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlMigration {
    name: String,
    up: Vec<String>,
    down: SqlDown,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Up,
    Down,
}

impl SqlMigration {
    /// Parse SQL text. Without a `-- up` marker everything before
    /// `-- down` is the up section.
    pub fn parse(name: impl Into<String>, content: &str) -> Self {
        let has_up_marker = content.lines().any(|l| is_marker(l, UP_MARKER));

        let mut section = if has_up_marker {
            Section::Header
        } else {
            Section::Up
        };
        let mut up_sql = String::new();
        let mut down_sql = String::new();
        let mut has_down = false;
        let mut irreversible = false;

        for line in content.lines() {
            if is_marker(line, UP_MARKER) {
                section = Section::Up;
                continue;
            }
            if is_marker(line, DOWN_MARKER) {
                section = Section::Down;
                has_down = true;
                continue;
            }

            match section {
                Section::Header => {}
                Section::Up => {
                    up_sql.push_str(line);
                    up_sql.push('\n');
                }
                Section::Down => {
                    if is_marker(line, IRREVERSIBLE_DIRECTIVE) {
                        irreversible = true;
                    }
                    down_sql.push_str(line);
                    down_sql.push('\n');
                }
            }
        }

        let down = if irreversible {
            SqlDown::Irreversible
        } else if has_down {
            SqlDown::Statements(split_sql_statements(&down_sql))
        } else {
            SqlDown::Undefined
        };

        Self {
            name: name.into(),
            up: split_sql_statements(&up_sql),
            down,
        }
    }

    /// Read and parse a migration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                EvolutionError::InvalidMigration(format!(
                    "Invalid migration filename: {}",
                    path.display()
                ))
            })?
            .to_string();
        Ok(Self::parse(name, &content))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn up_statements(&self) -> &[String] {
        &self.up
    }

    pub fn down(&self) -> &SqlDown {
        &self.down
    }
}

impl MigrationUnit for SqlMigration {
    fn up<'a>(&'a self, ctx: &'a mut MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for statement in &self.up {
                ctx.execute(statement, &[]).await?;
            }
            Ok(())
        })
    }

    fn down<'a>(&'a self, ctx: &'a mut MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match &self.down {
                SqlDown::Undefined => Err(EvolutionError::UndefinedMigration(format!(
                    "{} has no down section",
                    self.name
                ))),
                SqlDown::Irreversible => Err(EvolutionError::IrreversibleMigration(format!(
                    "{} is marked irreversible",
                    self.name
                ))),
                SqlDown::Statements(statements) => {
                    for statement in statements {
                        ctx.execute(statement, &[]).await?;
                    }
                    Ok(())
                }
            }
        })
    }
}

fn is_marker(line: &str, marker: &str) -> bool {
    line.trim().eq_ignore_ascii_case(marker)
}

fn is_comment_only(statement: &str) -> bool {
    statement.lines().all(|l| {
        let l = l.trim();
        l.is_empty() || l.starts_with("--")
    })
}

/// Split SQL into individual statements, respecting quoted text.
///
/// Semicolons inside `'...'` literals, `$$ ... $$` or `$tag$ ... $tag$`
/// bodies and `--` comments do not end a statement. Empty and comment-only
/// chunks are dropped.
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut dollar_tag: Option<String> = None;
    let mut in_quote = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);

        if in_quote {
            if c == '\'' {
                // `''` is an escaped quote.
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    current.push('\'');
                } else {
                    in_quote = false;
                }
            }
            continue;
        }

        if c == '\'' && dollar_tag.is_none() {
            in_quote = true;
            continue;
        }

        // Line comments may contain semicolons.
        if c == '-' && dollar_tag.is_none() && chars.peek() == Some(&'-') {
            for next in chars.by_ref() {
                current.push(next);
                if next == '\n' {
                    break;
                }
            }
            continue;
        }

        if c == '$' {
            let mut tag = String::from("$");
            while let Some(&next) = chars.peek() {
                if next == '$' {
                    chars.next();
                    tag.push(next);
                    current.push(next);
                    break;
                } else if next.is_alphanumeric() || next == '_' {
                    chars.next();
                    tag.push(next);
                    current.push(next);
                } else {
                    break;
                }
            }

            if tag.len() >= 2 && tag.ends_with('$') {
                match &dollar_tag {
                    Some(open) if *open == tag => dollar_tag = None,
                    Some(_) => {}
                    None => dollar_tag = Some(tag),
                }
            }
        }

        if c == ';' && dollar_tag.is_none() {
            flush(&mut current, &mut statements);
        }
    }

    flush(&mut current, &mut statements);
    statements
}

fn flush(current: &mut String, statements: &mut Vec<String>) {
    let stmt = current.trim().trim_end_matches(';').trim();
    if !stmt.is_empty() && !is_comment_only(stmt) {
        statements.push(stmt.to_string());
    }
    current.clear();
}
