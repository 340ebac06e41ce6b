use anyhow::{Result, Context};
use futures::future::BoxFuture;
use log::{info, debug};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::children::Child;
use crate::config::DatabaseConfig;
use crate::ingest::{ReportStore, WriteOutcome};
use crate::providers::ProviderBinding;
use crate::report::NewReport;

pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to PostgreSQL database");

        let database_url = format!(
            "postgres://{}:{}@{}:{}/{}",
            config.username, config.password, config.host, config.port, config.database
        );

        let pool = PgPool::connect(&database_url)
            .await
            .context("Unable to connect to the database")?;

        info!("Database connection established");

        let db = Database { pool };

        db.create_tables_if_not_exists().await?;

        Ok(db)
    }

    async fn create_tables_if_not_exists(&self) -> Result<()> {
        info!("Checking/creating database tables");

        let statements: [(&str, &str); 10] = [
            ("children", r#"
                CREATE TABLE IF NOT EXISTS children (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    user_id UUID NOT NULL,
                    first_name TEXT NOT NULL,
                    last_name TEXT,
                    created_at TIMESTAMPTZ DEFAULT NOW()
                )
            "#),
            ("provider_bindings", r#"
                CREATE TABLE IF NOT EXISTS provider_bindings (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    user_id UUID NOT NULL,
                    sender_matcher TEXT NOT NULL,
                    strategy_id TEXT,
                    provider_name_hint TEXT,
                    position INTEGER NOT NULL DEFAULT 0
                )
            "#),
            ("daily_reports", r#"
                CREATE TABLE IF NOT EXISTS daily_reports (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    user_id UUID NOT NULL,
                    child_id UUID NOT NULL REFERENCES children(id) ON DELETE CASCADE,
                    report_date DATE NOT NULL,
                    teacher_notes TEXT,
                    source_message_id TEXT NOT NULL UNIQUE,
                    provider TEXT NOT NULL,
                    imported_at TIMESTAMPTZ DEFAULT NOW()
                )
            "#),
            ("report_naps", r#"
                CREATE TABLE IF NOT EXISTS report_naps (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    report_id UUID NOT NULL REFERENCES daily_reports(id) ON DELETE CASCADE,
                    position INTEGER NOT NULL,
                    start_time TIME,
                    end_time TIME,
                    duration_minutes INTEGER,
                    duration_text TEXT,
                    raw_text TEXT
                )
            "#),
            ("report_meals", r#"
                CREATE TABLE IF NOT EXISTS report_meals (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    report_id UUID NOT NULL REFERENCES daily_reports(id) ON DELETE CASCADE,
                    position INTEGER NOT NULL,
                    meal_time TIME,
                    food TEXT NOT NULL,
                    food_category TEXT,
                    details TEXT,
                    initials TEXT[] NOT NULL DEFAULT '{}'
                )
            "#),
            ("report_bathroom_events", r#"
                CREATE TABLE IF NOT EXISTS report_bathroom_events (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    report_id UUID NOT NULL REFERENCES daily_reports(id) ON DELETE CASCADE,
                    position INTEGER NOT NULL,
                    event_time TIME,
                    event_type TEXT NOT NULL,
                    status TEXT,
                    initials TEXT[] NOT NULL DEFAULT '{}'
                )
            "#),
            ("report_activities", r#"
                CREATE TABLE IF NOT EXISTS report_activities (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    report_id UUID NOT NULL REFERENCES daily_reports(id) ON DELETE CASCADE,
                    position INTEGER NOT NULL,
                    description TEXT NOT NULL,
                    category TEXT
                )
            "#),
            ("report_photos", r#"
                CREATE TABLE IF NOT EXISTS report_photos (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    report_id UUID NOT NULL REFERENCES daily_reports(id) ON DELETE CASCADE,
                    position INTEGER NOT NULL,
                    url TEXT NOT NULL,
                    description TEXT
                )
            "#),
            ("idx_children_user",
             "CREATE INDEX IF NOT EXISTS idx_children_user ON children (user_id)"),
            ("idx_daily_reports_child_date",
             "CREATE INDEX IF NOT EXISTS idx_daily_reports_child_date ON daily_reports (child_id, report_date DESC)"),
        ];

        for (name, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Unable to create {}", name))?;
        }

        info!("Database tables checked/created successfully");
        Ok(())
    }

    pub async fn report_exists(&self, source_message_id: &str) -> Result<bool> {
        let exists = sqlx::query("SELECT 1 FROM daily_reports WHERE source_message_id = $1")
            .bind(source_message_id)
            .fetch_optional(&self.pool)
            .await
            .context("Error checking for an existing report")?;

        Ok(exists.is_some())
    }

    /// Insert the report and all its entries in one transaction.
    ///
    /// `ON CONFLICT DO NOTHING` on the message id makes a lost race a
    /// no-op instead of a duplicate.
    pub async fn save_report(&self, report: &NewReport) -> Result<WriteOutcome> {
        let mut transaction = self.pool.begin()
            .await
            .context("Unable to start transaction")?;

        let report_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO daily_reports
            (user_id, child_id, report_date, teacher_notes, source_message_id, provider)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_message_id) DO NOTHING
            RETURNING id
            "#
        )
        .bind(report.user_id)
        .bind(report.child_id)
        .bind(report.report_date)
        .bind(&report.teacher_notes)
        .bind(&report.source_message_id)
        .bind(&report.provider)
        .fetch_optional(&mut *transaction)
        .await
        .context("Error inserting daily report")?;

        let Some(report_id) = report_id else {
            debug!("Report for message {} already stored", report.source_message_id);
            transaction.rollback().await.context("Error rolling back transaction")?;
            return Ok(WriteOutcome::AlreadyExists);
        };

        Self::insert_entries(&mut transaction, report_id, report).await?;

        transaction.commit()
            .await
            .context("Error committing transaction")?;

        info!("Report {} saved: {} on {}", report_id, report.child_id, report.report_date);
        Ok(WriteOutcome::Created(report_id))
    }

    async fn insert_entries(
        transaction: &mut Transaction<'_, Postgres>,
        report_id: Uuid,
        report: &NewReport,
    ) -> Result<()> {
        for (position, nap) in (0i32..).zip(&report.naps) {
            sqlx::query(
                r#"
                INSERT INTO report_naps
                (report_id, position, start_time, end_time, duration_minutes, duration_text, raw_text)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#
            )
            .bind(report_id)
            .bind(position)
            .bind(nap.start_time)
            .bind(nap.end_time)
            .bind(nap.duration_minutes)
            .bind(&nap.duration_text)
            .bind(&nap.raw_text)
            .execute(&mut **transaction)
            .await
            .context("Error inserting nap")?;
        }

        for (position, meal) in (0i32..).zip(&report.meals) {
            sqlx::query(
                r#"
                INSERT INTO report_meals
                (report_id, position, meal_time, food, food_category, details, initials)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#
            )
            .bind(report_id)
            .bind(position)
            .bind(meal.time)
            .bind(&meal.food)
            .bind(&meal.food_category)
            .bind(&meal.details)
            .bind(&meal.initials)
            .execute(&mut **transaction)
            .await
            .context("Error inserting meal")?;
        }

        for (position, event) in (0i32..).zip(&report.bathroom_events) {
            sqlx::query(
                r#"
                INSERT INTO report_bathroom_events
                (report_id, position, event_time, event_type, status, initials)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#
            )
            .bind(report_id)
            .bind(position)
            .bind(event.time)
            .bind(&event.kind)
            .bind(&event.status)
            .bind(&event.initials)
            .execute(&mut **transaction)
            .await
            .context("Error inserting bathroom event")?;
        }

        for (position, activity) in (0i32..).zip(&report.activities) {
            sqlx::query(
                "INSERT INTO report_activities (report_id, position, description, category) VALUES ($1, $2, $3, $4)"
            )
            .bind(report_id)
            .bind(position)
            .bind(&activity.description)
            .bind(&activity.category)
            .execute(&mut **transaction)
            .await
            .context("Error inserting activity")?;
        }

        for (position, photo) in (0i32..).zip(&report.photos) {
            sqlx::query(
                "INSERT INTO report_photos (report_id, position, url, description) VALUES ($1, $2, $3, $4)"
            )
            .bind(report_id)
            .bind(position)
            .bind(&photo.url)
            .bind(&photo.description)
            .execute(&mut **transaction)
            .await
            .context("Error inserting photo")?;
        }

        debug!(
            "Report {}: {} nap(s), {} meal(s), {} bathroom event(s), {} activit(ies), {} photo(s)",
            report_id,
            report.naps.len(),
            report.meals.len(),
            report.bathroom_events.len(),
            report.activities.len(),
            report.photos.len()
        );
        Ok(())
    }

    pub async fn list_children(&self, user_id: Uuid) -> Result<Vec<Child>> {
        let rows = sqlx::query(
            "SELECT id, user_id, first_name, last_name FROM children WHERE user_id = $1 ORDER BY first_name, id"
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Error retrieving children")?;

        Ok(rows.into_iter()
            .map(|row| Child {
                id: row.get("id"),
                user_id: row.get("user_id"),
                first_name: row.get("first_name"),
                last_name: row.get("last_name"),
            })
            .collect())
    }

    pub async fn list_provider_bindings(&self, user_id: Uuid) -> Result<Vec<ProviderBinding>> {
        let rows = sqlx::query(
            r#"
            SELECT sender_matcher, strategy_id, provider_name_hint
            FROM provider_bindings
            WHERE user_id = $1
            ORDER BY position, id
            "#
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Error retrieving provider bindings")?;

        Ok(rows.into_iter()
            .map(|row| ProviderBinding {
                sender_matcher: row.get("sender_matcher"),
                strategy_id: row.get("strategy_id"),
                provider_name_hint: row.get("provider_name_hint"),
            })
            .collect())
    }

    pub async fn close(self) -> Result<()> {
        info!("Closing database connection");
        self.pool.close().await;
        Ok(())
    }
}

impl ReportStore for Database {
    fn report_exists<'a>(&'a self, source_message_id: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(Database::report_exists(self, source_message_id))
    }

    fn save_report<'a>(&'a self, report: &'a NewReport) -> BoxFuture<'a, Result<WriteOutcome>> {
        Box::pin(Database::save_report(self, report))
    }

    fn list_children(&self, user_id: Uuid) -> BoxFuture<'_, Result<Vec<Child>>> {
        Box::pin(Database::list_children(self, user_id))
    }

    fn list_provider_bindings(&self, user_id: Uuid) -> BoxFuture<'_, Result<Vec<ProviderBinding>>> {
        Box::pin(Database::list_provider_bindings(self, user_id))
    }
}
