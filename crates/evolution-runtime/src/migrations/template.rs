//! Scaffold templates for new migration files.
//!
//! Provides simple `{{var}}` replacement. Both templates leave `down`
//! explicitly irreversible until the author writes it.

use std::collections::HashMap;

/// Scaffold for SQL migration files.
pub const SQL_TEMPLATE: &str = r#"-- Migration: {{name}}
-- Version: {{version}}
-- Created: {{created_at}}

-- up
-- CREATE INDEX column_name_idx ON table_name (column_name ASC);
-- ALTER TABLE table_name ADD COLUMN column_name integer;

-- down
-- @irreversible
"#;

/// Scaffold for migration units written in Rust and registered in code.
pub const RUST_TEMPLATE: &str = r#"//! Migration {{version}}: {{name}}
//!
//! Register with `.register({{version}}, {{struct_name}})`.

use evolution::prelude::*;

pub struct {{struct_name}};

impl MigrationUnit for {{struct_name}} {
    fn up<'a>(&'a self, ctx: &'a mut MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            // ctx.execute("CREATE INDEX column_name_idx ON table_name (column_name ASC)", &[]).await?;
            // ctx.add_column("table_name", "column", "integer").await?;
            // ctx.drop_column("table_name", "column").await?;
            // ctx.rename_column("table_name", "column", "renamed").await?;
            let _ = ctx;
            Ok(())
        })
    }

    fn down<'a>(&'a self, _ctx: &'a mut MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async {
            Err(EvolutionError::IrreversibleMigration(
                "down is not defined".to_string(),
            ))
        })
    }
}
"#;

/// Render a template by replacing `{{key}}` placeholders with values.
pub fn render(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}

/// Template used for files with the given extension.
pub(crate) fn template_for(extension: &str) -> &'static str {
    match extension {
        "rs" => RUST_TEMPLATE,
        _ => SQL_TEMPLATE,
    }
}

/// `add_users_table` -> `AddUsersTable`, prefixed so it is a valid identifier.
pub(crate) fn struct_name(version: i64, slug: &str) -> String {
    let camel: String = slug
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    format!("M{:04}{}", version, camel)
}

/// Helper macro to create a HashMap of template variables.
macro_rules! template_vars {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let mut map = std::collections::HashMap::new();
        $(map.insert($key, $value);)*
        map
    }};
}

pub(crate) use template_vars;
