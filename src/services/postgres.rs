use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseSettings;
use crate::models::{CandidateMatch, Category, Constraints, Designer, Game, GameStats, OverlapDimension};
use crate::services::store::{normalize_query, CatalogStore, StoreError, StoreResult};

/// Game columns, cast so the row decoder does not depend on the exact
/// numeric types of the catalog schema
const GAME_COLUMNS: &str = "g.g_id::int8 AS g_id, g.name::text AS name, \
     g.avgscore::float8 AS avgscore, g.numvotes::int8 AS numvotes, \
     g.minplayers::int4 AS minplayers, g.maxplayers::int4 AS maxplayers, \
     g.minplaytime::int4 AS minplaytime, g.maxplaytime::int4 AS maxplaytime";

/// PostgreSQL catalog store
///
/// Holds a single long-lived connection. Every statement runs under the
/// configured `statement_timeout`, which is the only bound on how long a
/// tool call can block the request loop.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect using the database section of the settings
    pub async fn from_settings(settings: &DatabaseSettings) -> Result<Self, StoreError> {
        let options = connect_options(settings)?;

        tracing::info!(
            "Connecting to PostgreSQL at {}:{} (statement timeout {}ms)",
            options.get_host(),
            options.get_port(),
            settings.statement_timeout_ms
        );

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .test_before_acquire(true)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    async fn fetch_games(&self, mut query: QueryBuilder<'_, Postgres>) -> StoreResult<Vec<Game>> {
        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(game_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }
}

fn connect_options(settings: &DatabaseSettings) -> Result<PgConnectOptions, StoreError> {
    let base = match settings.url.as_deref() {
        Some(url) => PgConnectOptions::from_str(url)?,
        None => PgConnectOptions::new()
            .host(required(&settings.host, "DB_HOST")?)
            .port(settings.port)
            .database(required(&settings.name, "DB_NAME")?)
            .username(required(&settings.user, "DB_USER")?)
            .password(required(&settings.password, "DB_PASSWORD")?),
    };

    Ok(base.options([("statement_timeout", settings.statement_timeout_ms.to_string())]))
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, StoreError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| StoreError::InvalidInput(format!("{} is not set", name)))
}

/// `ILIKE` pattern matching `raw` anywhere, with wildcards in `raw` escaped
fn contains_pattern(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len() + 2);
    escaped.push('%');
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Append the constraint filters as `AND ...` fragments with bound values
///
/// Null columns fail every bound comparison; only the vote floor lets an
/// unknown vote count through.
fn push_constraint_clauses(query: &mut QueryBuilder<'_, Postgres>, constraints: &Constraints) {
    if let Some(players) = constraints.players {
        query
            .push(" AND g.minplayers <= ")
            .push_bind(players)
            .push(" AND g.maxplayers >= ")
            .push_bind(players);
    }
    if let Some(minplayers) = constraints.minplayers {
        query.push(" AND g.maxplayers >= ").push_bind(minplayers);
    }
    if let Some(maxplayers) = constraints.maxplayers {
        query.push(" AND g.minplayers <= ").push_bind(maxplayers);
    }
    if let Some(maxplaytime) = constraints.maxplaytime {
        query.push(" AND g.maxplaytime <= ").push_bind(maxplaytime);
    }
    if let Some(minplaytime) = constraints.minplaytime {
        query.push(" AND g.minplaytime >= ").push_bind(minplaytime);
    }
    query
        .push(" AND (g.numvotes IS NULL OR g.numvotes >= ")
        .push_bind(constraints.min_votes)
        .push(")");
}

fn game_from_row(row: &PgRow) -> Result<Game, sqlx::Error> {
    Ok(Game {
        g_id: row.try_get("g_id")?,
        name: row.try_get("name")?,
        avgscore: row.try_get("avgscore")?,
        numvotes: row.try_get("numvotes")?,
        minplayers: row.try_get("minplayers")?,
        maxplayers: row.try_get("maxplayers")?,
        minplaytime: row.try_get("minplaytime")?,
        maxplaytime: row.try_get("maxplaytime")?,
        categories: Vec::new(),
        designers: Vec::new(),
    })
}

fn category_from_row(row: &PgRow) -> Result<Category, sqlx::Error> {
    Ok(Category {
        c_id: row.try_get("c_id")?,
        name: row.try_get("name")?,
    })
}

fn designer_from_row(row: &PgRow) -> Result<Designer, sqlx::Error> {
    Ok(Designer {
        des_id: row.try_get("des_id")?,
        name: row.try_get("name")?,
        country: row.try_get("country")?,
    })
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn games_by_name(&self, name_query: &str, limit: u32) -> StoreResult<Vec<Game>> {
        let mut query = QueryBuilder::new(format!("SELECT {} FROM games g WHERE g.name ILIKE ", GAME_COLUMNS));
        query
            .push_bind(contains_pattern(name_query.trim()))
            .push(" ORDER BY g.numvotes DESC NULLS LAST, g.name ASC, g.g_id ASC LIMIT ")
            .push_bind(i64::from(limit));

        let games = self.fetch_games(query).await?;
        tracing::debug!("Name search {:?} matched {} games", name_query, games.len());
        Ok(games)
    }

    async fn game_by_id(&self, g_id: i64) -> StoreResult<Option<Game>> {
        let query = format!("SELECT {} FROM games g WHERE g.g_id = $1", GAME_COLUMNS);
        let row = sqlx::query(&query).bind(g_id).fetch_optional(&self.pool).await?;

        Ok(row.as_ref().map(game_from_row).transpose()?)
    }

    async fn categories_for_game(&self, g_id: i64) -> StoreResult<Vec<Category>> {
        let query = r#"
            SELECT c.c_id::int8 AS c_id, c.name::text AS name
            FROM categories c
            JOIN game_categories gc ON gc.c_id = c.c_id
            WHERE gc.g_id = $1
            ORDER BY c.name ASC, c.c_id ASC
        "#;

        let rows = sqlx::query(query).bind(g_id).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(category_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn designers_for_game(&self, g_id: i64) -> StoreResult<Vec<Designer>> {
        let query = r#"
            SELECT d.des_id::int8 AS des_id, d.name::text AS name, d.country::text AS country
            FROM designers d
            JOIN game_designers gd ON gd.des_id = d.des_id
            WHERE gd.g_id = $1
            ORDER BY d.name ASC, d.des_id ASC
        "#;

        let rows = sqlx::query(query).bind(g_id).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(designer_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn search_categories(&self, query: Option<&str>, limit: u32) -> StoreResult<Vec<Category>> {
        let pattern = normalize_query(query).map(|q| contains_pattern(&q));
        let sql = r#"
            SELECT c.c_id::int8 AS c_id, c.name::text AS name
            FROM categories c
            WHERE $1::text IS NULL OR c.name ILIKE $1
            ORDER BY c.name ASC, c.c_id ASC
            LIMIT $2
        "#;

        let rows = sqlx::query(sql)
            .bind(pattern)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(category_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn search_designers(&self, query: Option<&str>, limit: u32) -> StoreResult<Vec<Designer>> {
        let pattern = normalize_query(query).map(|q| contains_pattern(&q));
        let sql = r#"
            SELECT d.des_id::int8 AS des_id, d.name::text AS name, d.country::text AS country
            FROM designers d
            WHERE $1::text IS NULL OR d.name ILIKE $1
            ORDER BY d.name ASC, d.des_id ASC
            LIMIT $2
        "#;

        let rows = sqlx::query(sql)
            .bind(pattern)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(designer_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn games_by_designer(&self, designer_name: &str, limit: u32) -> StoreResult<Vec<Game>> {
        let pattern = contains_pattern(designer_name.trim());
        // One row per (game, matching designer); the CTE caps distinct games
        let query = format!(
            r#"
            WITH matched AS (
                SELECT g.g_id, g.name
                FROM games g
                WHERE EXISTS (
                    SELECT 1
                    FROM game_designers gd
                    JOIN designers d ON d.des_id = gd.des_id
                    WHERE gd.g_id = g.g_id AND d.name ILIKE $1
                )
                ORDER BY g.name ASC, g.g_id ASC
                LIMIT $2
            )
            SELECT {}, d.des_id::int8 AS des_id, d.name::text AS designer_name, d.country::text AS country
            FROM matched m
            JOIN games g ON g.g_id = m.g_id
            JOIN game_designers gd ON gd.g_id = g.g_id
            JOIN designers d ON d.des_id = gd.des_id
            WHERE d.name ILIKE $1
            ORDER BY g.name ASC, g.g_id ASC, d.name ASC
            "#,
            GAME_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(pattern)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        let mut games: Vec<Game> = Vec::new();
        for row in &rows {
            let designer = Designer {
                des_id: row.try_get("des_id")?,
                name: row.try_get("designer_name")?,
                country: row.try_get("country")?,
            };
            let g_id: i64 = row.try_get("g_id")?;
            match games.last_mut() {
                Some(game) if game.g_id == g_id => game.designers.push(designer),
                _ => {
                    let mut game = game_from_row(row)?;
                    game.designers.push(designer);
                    games.push(game);
                }
            }
        }

        tracing::debug!("Designer search {:?} matched {} games", designer_name, games.len());
        Ok(games)
    }

    async fn overlap_candidates(
        &self,
        dimension: OverlapDimension,
        ids: &[i64],
        constraints: &Constraints,
    ) -> StoreResult<Vec<CandidateMatch>> {
        if ids.is_empty() {
            return Err(StoreError::InvalidInput(format!(
                "{} overlap query needs at least one identifier",
                dimension.as_str()
            )));
        }

        let (join_table, key) = match dimension {
            OverlapDimension::Category => ("game_categories", "c_id"),
            OverlapDimension::Designer => ("game_designers", "des_id"),
        };

        let mut query = QueryBuilder::new(format!(
            "SELECT g.g_id::int8 AS g_id, g.name::text AS name, g.numvotes::int8 AS numvotes, \
             COUNT(DISTINCT j.{key})::int8 AS overlap \
             FROM games g JOIN {join_table} j ON j.g_id = g.g_id \
             WHERE j.{key} = ANY(",
        ));
        query.push_bind(ids.to_vec()).push(")");
        push_constraint_clauses(&mut query, constraints);
        query
            .push(" GROUP BY g.g_id, g.name, g.numvotes")
            .push(" ORDER BY overlap DESC, g.numvotes DESC NULLS LAST, g.g_id ASC LIMIT ")
            .push_bind(i64::from(constraints.limit_candidates));

        let rows = query.build().fetch_all(&self.pool).await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            let overlap: i64 = row.try_get("overlap")?;
            let overlap = u32::try_from(overlap).unwrap_or(u32::MAX);
            let mut candidate = CandidateMatch {
                g_id: row.try_get("g_id")?,
                name: row.try_get("name")?,
                numvotes: row.try_get("numvotes")?,
                cat_overlap: 0,
                designer_overlap: 0,
            };
            match dimension {
                OverlapDimension::Category => candidate.cat_overlap = overlap,
                OverlapDimension::Designer => candidate.designer_overlap = overlap,
            }
            candidates.push(candidate);
        }

        Ok(candidates)
    }

    async fn game_stats(&self, ids: &[i64]) -> StoreResult<HashMap<i64, GameStats>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let query = r#"
            SELECT g_id::int8 AS g_id, avgscore::float8 AS avgscore, numvotes::int8 AS numvotes
            FROM games
            WHERE g_id = ANY($1)
        "#;

        let rows = sqlx::query(query).bind(ids.to_vec()).fetch_all(&self.pool).await?;

        let mut stats = HashMap::with_capacity(rows.len());
        for row in &rows {
            stats.insert(
                row.try_get("g_id")?,
                GameStats {
                    avgscore: row.try_get("avgscore")?,
                    numvotes: row.try_get("numvotes")?,
                },
            );
        }
        Ok(stats)
    }

    async fn health_check(&self) -> StoreResult<bool> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql_for(constraints: &Constraints) -> String {
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT 1 FROM games g WHERE TRUE");
        push_constraint_clauses(&mut query, constraints);
        query.sql().to_string()
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("risk"), "%risk%");
        assert_eq!(contains_pattern("100%_\\"), "%100\\%\\_\\\\%");
    }

    #[test]
    fn test_default_constraints_only_filter_votes() {
        let sql = sql_for(&Constraints::default());
        assert_eq!(
            sql,
            "SELECT 1 FROM games g WHERE TRUE AND (g.numvotes IS NULL OR g.numvotes >= $1)"
        );
    }

    #[test]
    fn test_player_count_uses_containment() {
        let constraints = Constraints {
            players: Some(3),
            maxplaytime: Some(60),
            ..Constraints::default()
        };
        let sql = sql_for(&constraints);
        assert!(sql.contains("g.minplayers <= $1 AND g.maxplayers >= $2"));
        assert!(sql.contains("g.maxplaytime <= $3"));
        assert!(sql.ends_with("(g.numvotes IS NULL OR g.numvotes >= $4)"));
    }

    #[test]
    fn test_connect_options_require_credentials() {
        let settings = DatabaseSettings {
            host: Some("localhost".to_string()),
            ..DatabaseSettings::default()
        };
        match connect_options(&settings) {
            Err(StoreError::InvalidInput(msg)) => assert!(msg.contains("DB_NAME")),
            other => panic!("expected missing credential error, got {:?}", other.map(|_| ())),
        }
    }
}
