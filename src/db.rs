use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

pub fn connect_lazy(database_url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(8))
        .connect_lazy(database_url)
        .with_context(|| format!("Failed to create lazy database pool for {}", redact(database_url)))
}

/// Hides the password part of a connection url for log and error output.
pub fn redact(database_url: &str) -> String {
    let Some((scheme, rest)) = database_url.split_once("://") else {
        return database_url.to_string();
    };
    let Some((userinfo, host)) = rest.rsplit_once('@') else {
        return database_url.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
        None => database_url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::redact;

    #[test]
    fn redacts_password_only() {
        assert_eq!(
            redact("postgresql://charts:s3cret@db:5432/things"),
            "postgresql://charts:***@db:5432/things"
        );
        assert_eq!(redact("postgresql://db/things"), "postgresql://db/things");
        assert_eq!(redact("postgresql://charts@db/things"), "postgresql://charts@db/things");
    }
}
