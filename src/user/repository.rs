//! Handle database requests for accounts and profiles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use crate::error::{Result, ServerError};
use crate::user::{NewUser, Profile, User, UserId};

const UNIQUE_VIOLATION: &str = "23505";

/// Error returned when a username is already taken.
pub fn username_taken() -> ServerError {
    ServerError::field(
        "username",
        "unique",
        "A user with that username already exists.",
    )
}

/// Port for account persistence. Accounts and profiles are always read and
/// written together.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert an account and its default profile atomically.
    async fn create(&self, user: &NewUser, now: DateTime<Utc>) -> Result<User>;

    /// Find an account by ID.
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>>;

    /// Find an account by its exact username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Persist mutable account and profile fields in one transaction.
    async fn save(&self, user: &User) -> Result<()>;

    /// Persist mutable profile fields.
    async fn save_profile(&self, profile: &Profile) -> Result<()>;
}

/// Joined `users` and `user_profiles` row.
#[derive(Debug, Clone, FromRow)]
struct UserRecord {
    id: i64,
    username: String,
    email: String,
    password: String,
    first_name: String,
    last_name: String,
    user_type: String,
    company_name: String,
    phone_number: String,
    business_sector: String,
    state: String,
    subscription_tier: String,
    queries_used: i32,
    query_limit: i32,
    is_active: bool,
    date_joined: DateTime<Utc>,
    tax_identification_number: String,
    vat_registered: bool,
    employees_count: Option<i32>,
    annual_revenue: Option<Decimal>,
    preferred_language: String,
    profile_created_at: DateTime<Utc>,
    profile_updated_at: DateTime<Utc>,
}

impl TryFrom<UserRecord> for User {
    type Error = ServerError;

    fn try_from(record: UserRecord) -> Result<Self> {
        Ok(User {
            id: record.id,
            username: record.username,
            email: record.email,
            password: record.password,
            first_name: record.first_name,
            last_name: record.last_name,
            user_type: record
                .user_type
                .parse()
                .map_err(|err| ServerError::internal("corrupted user_type", err))?,
            company_name: record.company_name,
            phone_number: record.phone_number,
            business_sector: record.business_sector,
            state: record.state,
            subscription_tier: record
                .subscription_tier
                .parse()
                .map_err(|err| ServerError::internal("corrupted subscription_tier", err))?,
            queries_used: record.queries_used,
            query_limit: record.query_limit,
            is_active: record.is_active,
            date_joined: record.date_joined,
            profile: Profile {
                user: record.id,
                tax_identification_number: record.tax_identification_number,
                vat_registered: record.vat_registered,
                employees_count: record.employees_count,
                annual_revenue: record.annual_revenue,
                preferred_language: record.preferred_language,
                created_at: record.profile_created_at,
                updated_at: record.profile_updated_at,
            },
        })
    }
}

#[derive(Debug, Clone)]
enum Field {
    Id,
    Username,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Field::Id => write!(f, "id"),
            Field::Username => write!(f, "username"),
        }
    }
}

fn get_by_field_query(field: Field) -> String {
    format!(
        r#"SELECT
                u.id,
                u.username,
                u.email,
                u.password,
                u.first_name,
                u.last_name,
                u.user_type,
                u.company_name,
                u.phone_number,
                u.business_sector,
                u.state,
                u.subscription_tier,
                u.queries_used,
                u.query_limit,
                u.is_active,
                u.date_joined,
                p.tax_identification_number,
                p.vat_registered,
                p.employees_count,
                p.annual_revenue,
                p.preferred_language,
                p.created_at AS profile_created_at,
                p.updated_at AS profile_updated_at
            FROM users u
            JOIN user_profiles p ON p.user_id = u.id
            WHERE u.{field} = $1
            "#
    )
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

/// PostgreSQL account repository.
#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    /// Create a new [`PgAccountRepository`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn create(&self, user: &NewUser, now: DateTime<Utc>) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let (id,): (i64,) = sqlx::query_as(
            r#"INSERT INTO users (
                    username, email, password, first_name, last_name, user_type,
                    company_name, phone_number, business_sector, state,
                    subscription_tier, query_limit, date_joined
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                RETURNING id"#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.user_type.as_str())
        .bind(&user.company_name)
        .bind(&user.phone_number)
        .bind(&user.business_sector)
        .bind(&user.state)
        .bind(user.subscription_tier.as_str())
        .bind(user.query_limit)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                username_taken()
            } else {
                err.into()
            }
        })?;

        let profile = Profile::new(id, now);
        sqlx::query(
            r#"INSERT INTO user_profiles (user_id, preferred_language, created_at, updated_at)
                VALUES ($1, $2, $3, $4)"#,
        )
        .bind(id)
        .bind(&profile.preferred_language)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(User {
            id,
            username: user.username.clone(),
            email: user.email.clone(),
            password: user.password.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            user_type: user.user_type,
            company_name: user.company_name.clone(),
            phone_number: user.phone_number.clone(),
            business_sector: user.business_sector.clone(),
            state: user.state.clone(),
            subscription_tier: user.subscription_tier,
            profile,
            queries_used: 0,
            query_limit: user.query_limit,
            is_active: true,
            date_joined: now,
        })
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>> {
        let query = get_by_field_query(Field::Id);

        sqlx::query_as::<_, UserRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let query = get_by_field_query(Field::Username);

        sqlx::query_as::<_, UserRecord>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn save(&self, user: &User) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"UPDATE users
                SET first_name = $1, last_name = $2, company_name = $3,
                    phone_number = $4, business_sector = $5, state = $6
                WHERE id = $7"#,
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.company_name)
        .bind(&user.phone_number)
        .bind(&user.business_sector)
        .bind(&user.state)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

        update_profile(&mut tx, &user.profile).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn save_profile(&self, profile: &Profile) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        update_profile(&mut tx, profile).await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn update_profile(
    tx: &mut sqlx::Transaction<'static, sqlx::Postgres>,
    profile: &Profile,
) -> Result<()> {
    sqlx::query(
        r#"UPDATE user_profiles
            SET tax_identification_number = $1, vat_registered = $2,
                employees_count = $3, annual_revenue = $4,
                preferred_language = $5, updated_at = $6
            WHERE user_id = $7"#,
    )
    .bind(&profile.tax_identification_number)
    .bind(profile.vat_registered)
    .bind(profile.employees_count)
    .bind(profile.annual_revenue)
    .bind(&profile.preferred_language)
    .bind(profile.updated_at)
    .bind(profile.user)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
