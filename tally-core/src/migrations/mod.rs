//! Export database migrations, embedded with `include_str!`
//!
//! Each entry is `(file name, sql)`; entries are applied in order. A new
//! migration needs its `NNN_description.sql` file and a line here.

pub const MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
];
