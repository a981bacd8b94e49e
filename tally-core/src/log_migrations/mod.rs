//! Log database migrations, embedded at compile time
//!
//! Same layout as the export database migrations: `(file name, sql)` pairs
//! applied in order, with `000_migrations.sql` as the bootstrap.

pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    (
        "001_initial_schema.sql",
        include_str!("001_initial_schema.sql"),
    ),
];
