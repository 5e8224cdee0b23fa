//! Schema migrations shipped with the binary.
//!
//! Applied in order and tracked by name in `helpdesk_migrations`.

use super::runner::Migration;

const HELPDESK_SCHEMA_SQL: &str = include_str!("../../migrations/0001_helpdesk_schema.sql");

const MAIL_OUTBOX_SQL: &str = include_str!("../../migrations/0002_helpdesk_mail_outbox.sql");

pub fn get_builtin_migrations() -> Vec<Migration> {
    vec![
        Migration::new("0001_helpdesk_schema", HELPDESK_SCHEMA_SQL),
        Migration::new("0002_helpdesk_mail_outbox", MAIL_OUTBOX_SQL),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order() {
        let names: Vec<String> = get_builtin_migrations().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["0001_helpdesk_schema", "0002_helpdesk_mail_outbox"]);
    }

    #[test]
    fn test_schema_defines_tables() {
        let migrations = get_builtin_migrations();
        let sql = &migrations[0].sql;

        for table in [
            "users",
            "roles",
            "permissions",
            "role_has_permissions",
            "user_has_roles",
            "tickets",
            "followups",
            "ticket_files",
            "followup_files",
        ] {
            assert!(
                sql.contains(&format!("CREATE TABLE IF NOT EXISTS {} (", table)),
                "missing table {}",
                table
            );
        }
        assert!(sql.contains("followups_one_solution_per_ticket"));
        assert!(migrations[1].sql.contains("CREATE TABLE IF NOT EXISTS helpdesk_mail_jobs"));
    }
}
