pub const CREATE_EXPORTS: &str = r#"
CREATE TABLE IF NOT EXISTS exports (
  id           INTEGER PRIMARY KEY AUTOINCREMENT,
  kind         TEXT NOT NULL,
  subject      TEXT NOT NULL,
  generated_at INTEGER NOT NULL,
  pdf_path     TEXT NOT NULL,
  json_path    TEXT
);
"#;

pub const INDEX_EXPORTS_GENERATED_AT: &str =
    "CREATE INDEX IF NOT EXISTS idx_exports_generated_at ON exports(generated_at);";

pub const INDEX_EXPORTS_SUBJECT: &str =
    "CREATE INDEX IF NOT EXISTS idx_exports_subject ON exports(kind, subject);";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_EXPORTS,
        INDEX_EXPORTS_GENERATED_AT,
        INDEX_EXPORTS_SUBJECT,
    ]
}
