//! Per-server list of watched domains, stored in SQLite

use crate::error::{DomainError, RegistryError};
use serenity::all::GuildId;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::{borrow::Cow, path::Path};
use url::{Host, Url};

/// A normalized domain name: lowercase, no scheme, no `www.` prefix, no port or path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Domain(String);

impl Domain {
    /// Normalize user input such as `https://www.NYTimes.com/section` to `nytimes.com`.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        // Discord users tend to wrap things in backticks or `<>` to suppress embeds.
        let trimmed = input
            .trim()
            .trim_matches(|c: char| c == '<' || c == '>' || c == '`');
        if trimmed.is_empty() {
            return Err(DomainError::Empty);
        }

        let malformed = || DomainError::Malformed(trimmed.to_owned());

        // Let the URL parser deal with userinfo, ports, paths, IDNA and case.
        let with_scheme = if trimmed.contains("://") {
            Cow::Borrowed(trimmed)
        } else {
            Cow::Owned(format!("https://{}", trimmed))
        };
        let url = Url::parse(&with_scheme).map_err(|_| malformed())?;

        match url.host() {
            Some(Host::Domain(host)) => Self::from_host(host).ok_or_else(malformed),
            _ => Err(malformed()),
        }
    }

    fn from_host(host: &str) -> Option<Self> {
        let lowered = host.trim_end_matches('.').to_ascii_lowercase();
        let host = lowered.strip_prefix("www.").unwrap_or(&lowered);

        let labels: Vec<&str> = host.split('.').collect();
        let valid = labels.len() >= 2
            && labels.iter().all(|label| {
                !label.is_empty()
                    && !label.starts_with('-')
                    && !label.ends_with('-')
                    && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            });

        valid.then(|| Self(host.to_owned()))
    }

    /// Whether `host` is this domain or one of its subdomains.
    pub fn covers(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.');
        if host.eq_ignore_ascii_case(&self.0) {
            return true;
        }
        // Compare on label boundaries so `notnytimes.com` doesn't match `nytimes.com`.
        host.len() > self.0.len()
            && host.is_char_boundary(host.len() - self.0.len())
            && host[host.len() - self.0.len()..].eq_ignore_ascii_case(&self.0)
            && host.as_bytes()[host.len() - self.0.len() - 1] == b'.'
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether the URL's host falls under any of `domains`.
pub fn is_watched(url: &Url, domains: &[Domain]) -> bool {
    match url.domain() {
        Some(host) => domains.iter().any(|domain| domain.covers(host)),
        None => false,
    }
}

/// Watched domains per Discord server
pub struct SiteRegistry {
    pool: SqlitePool,
}

impl SiteRegistry {
    /// Open (creating if needed) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        // Each connection to `:memory:` is a separate database, so pin exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS watched_sites (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                server_id INTEGER NOT NULL,
                domain TEXT NOT NULL,
                added_by TEXT,
                added_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (server_id, domain)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub async fn add(
        &self,
        guild_id: GuildId,
        input: &str,
        added_by: &str,
    ) -> Result<Domain, RegistryError> {
        let domain = Domain::parse(input)?;

        let inserted = sqlx::query(
            "INSERT INTO watched_sites (server_id, domain, added_by) VALUES (?, ?, ?) \
             ON CONFLICT (server_id, domain) DO NOTHING",
        )
        .bind(server_key(guild_id))
        .bind(domain.as_str())
        .bind(added_by)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(RegistryError::AlreadyWatched(domain));
        }
        Ok(domain)
    }

    pub async fn remove(&self, guild_id: GuildId, input: &str) -> Result<Domain, RegistryError> {
        let domain = Domain::parse(input)?;

        let deleted = sqlx::query("DELETE FROM watched_sites WHERE server_id = ? AND domain = ?")
            .bind(server_key(guild_id))
            .bind(domain.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(RegistryError::NotWatched(domain));
        }
        Ok(domain)
    }

    /// Watched domains in the order they were added.
    pub async fn list(&self, guild_id: GuildId) -> Result<Vec<Domain>, RegistryError> {
        let domains = sqlx::query_scalar::<_, String>(
            "SELECT domain FROM watched_sites WHERE server_id = ? ORDER BY id",
        )
        .bind(server_key(guild_id))
        .fetch_all(&self.pool)
        .await?;

        Ok(domains.into_iter().map(Domain).collect())
    }

    pub async fn matches(&self, guild_id: GuildId, url: &Url) -> Result<bool, RegistryError> {
        let domains = self.list(guild_id).await?;
        Ok(is_watched(url, &domains))
    }
}

// SQLite integers are signed; snowflakes fit in 63 bits but round-trip either way.
fn server_key(guild_id: GuildId) -> i64 {
    guild_id.get() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: GuildId = GuildId::new(1);
    const OTHER_GUILD: GuildId = GuildId::new(2);

    async fn test_registry() -> SiteRegistry {
        SiteRegistry::in_memory().await.unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_domain_normalization() {
        let cases = [
            ("nytimes.com", "nytimes.com"),
            ("  NYTimes.COM ", "nytimes.com"),
            ("https://www.nytimes.com/section/world?x=1", "nytimes.com"),
            ("www.wsj.com/articles", "wsj.com"),
            ("ft.com:443", "ft.com"),
            ("<https://news.example.co.uk>", "news.example.co.uk"),
            ("`economist.com`", "economist.com"),
        ];
        for (input, expected) in cases {
            assert_eq!(Domain::parse(input).unwrap().as_str(), expected, "{}", input);
        }
    }

    #[test]
    fn test_domain_rejects_garbage() {
        assert_eq!(Domain::parse("   "), Err(DomainError::Empty));
        for input in ["www.", "localhost", "127.0.0.1", "foo..com", "-bad.com", "a b.com"] {
            assert!(
                matches!(Domain::parse(input), Err(DomainError::Malformed(_))),
                "{}",
                input
            );
        }
    }

    #[test]
    fn test_domain_covers_subdomains_only() {
        let domain = Domain::parse("nytimes.com").unwrap();
        assert!(domain.covers("nytimes.com"));
        assert!(domain.covers("www.nytimes.com"));
        assert!(domain.covers("cooking.nytimes.com."));
        assert!(!domain.covers("notnytimes.com"));
        assert!(!domain.covers("nytimes.com.evil.net"));
        assert!(!domain.covers("com"));
    }

    #[tokio::test]
    async fn test_add_twice_is_already_watched() {
        let registry = test_registry().await;

        let added = registry.add(GUILD, "nytimes.com", "alice").await.unwrap();
        assert_eq!(added.as_str(), "nytimes.com");

        let again = registry.add(GUILD, "https://www.NYTIMES.com/", "bob").await;
        assert!(matches!(again, Err(RegistryError::AlreadyWatched(d)) if d == added));

        assert_eq!(registry.list(GUILD).await.unwrap(), vec![added]);
    }

    #[tokio::test]
    async fn test_add_rejects_malformed_domain() {
        let registry = test_registry().await;

        let result = registry.add(GUILD, "not a domain", "alice").await;
        assert!(matches!(result, Err(RegistryError::Invalid(_))));
        assert!(registry.list(GUILD).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_matches_subdomain_of_watched_site() {
        let registry = test_registry().await;
        registry.add(GUILD, "nytimes.com", "alice").await.unwrap();

        assert!(registry
            .matches(GUILD, &url("https://www.nytimes.com/x"))
            .await
            .unwrap());
        assert!(!registry
            .matches(GUILD, &url("https://example.com/nytimes.com"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_remove_unwatched_leaves_list_unchanged() {
        let registry = test_registry().await;
        registry.add(GUILD, "wsj.com", "alice").await.unwrap();

        let result = registry.remove(GUILD, "ft.com").await;
        assert!(matches!(result, Err(RegistryError::NotWatched(d)) if d.as_str() == "ft.com"));

        let listed = registry.list(GUILD).await.unwrap();
        assert_eq!(listed, vec![Domain::parse("wsj.com").unwrap()]);
    }

    #[tokio::test]
    async fn test_remove_normalizes_input() {
        let registry = test_registry().await;
        registry.add(GUILD, "wsj.com", "alice").await.unwrap();

        let removed = registry.remove(GUILD, "https://www.wsj.com/news").await.unwrap();
        assert_eq!(removed.as_str(), "wsj.com");
        assert!(registry.list(GUILD).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_keeps_insertion_order() {
        let registry = test_registry().await;
        for domain in ["wsj.com", "economist.com", "ft.com"] {
            registry.add(GUILD, domain, "alice").await.unwrap();
        }

        let listed: Vec<String> = registry
            .list(GUILD)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.to_string())
            .collect();
        assert_eq!(listed, ["wsj.com", "economist.com", "ft.com"]);
    }

    #[tokio::test]
    async fn test_sites_are_scoped_per_server() {
        let registry = test_registry().await;
        registry.add(GUILD, "wsj.com", "alice").await.unwrap();
        registry.add(OTHER_GUILD, "wsj.com", "bob").await.unwrap();
        registry.remove(OTHER_GUILD, "wsj.com").await.unwrap();

        assert_eq!(registry.list(GUILD).await.unwrap().len(), 1);
        assert!(registry.list(OTHER_GUILD).await.unwrap().is_empty());
        assert!(!registry
            .matches(OTHER_GUILD, &url("https://wsj.com/a"))
            .await
            .unwrap());
    }
}
