const DB_HOST: &str = "DBMON_DB_HOST";

const DB_PORT: &str = "DBMON_DB_PORT";

const DB_USER: &str = "DBMON_DB_USER";

const DB_PASSWORD: &str = "DBMON_DB_PASSWORD";

const DB_SCHEMA: &str = "DBMON_DB_SCHEMA";

const SMTP_PASSWORD: &str = "DBMON_SMTP_PASSWORD";

const DEFAULT_DB_PORT: u16 = 3306;

pub fn get_default_db_port() -> u16 {
    DEFAULT_DB_PORT
}

pub fn get_db_host() -> Option<String> {
    non_empty(DB_HOST)
}

/// An unparsable port is ignored rather than replacing the configured one.
pub fn get_db_port() -> Option<u16> {
    non_empty(DB_PORT).and_then(|port| port.parse().ok())
}

pub fn get_db_user() -> Option<String> {
    non_empty(DB_USER)
}

pub fn get_db_password() -> Option<String> {
    non_empty(DB_PASSWORD)
}

pub fn get_db_schema() -> Option<String> {
    non_empty(DB_SCHEMA)
}

pub fn get_smtp_password() -> Option<String> {
    non_empty(SMTP_PASSWORD)
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}
