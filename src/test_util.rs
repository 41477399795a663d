//! In-memory adapters and fixtures for tests.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::AppState;
use crate::activity::{
    ActivityRepository, CALL_SCHEDULED, ChatQuery, Conversation, Document, VoiceCall,
};
use crate::clock::FixedClock;
use crate::config::{Argon2, Configuration};
use crate::crypto::Crypto;
use crate::error::Result;
use crate::token::{AuthToken, DEFAULT_TTL_HOURS, TokenManager, TokenRepository};
use crate::user::{
    AccountRepository, DEFAULT_QUERY_LIMIT, NewUser, Profile, SubscriptionTier, User, UserBuilder,
    UserId, UserType, username_taken,
};

/// Mid-month instant used as "now" by tests.
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-03-17T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Active account with a default profile.
pub fn user(id: UserId, username: &str) -> User {
    let joined = fixed_now() - chrono::Duration::days(30);

    User {
        id,
        username: username.to_owned(),
        email: format!("{username}@example.com"),
        first_name: "Ada".into(),
        last_name: String::default(),
        user_type: UserType::Business,
        company_name: "Analytical Engines".into(),
        phone_number: "+2348012345678".into(),
        business_sector: "manufacturing".into(),
        state: "Lagos".into(),
        subscription_tier: SubscriptionTier::Free,
        profile: Profile::new(id, joined),
        queries_used: 0,
        query_limit: DEFAULT_QUERY_LIMIT,
        password: String::default(),
        is_active: true,
        date_joined: joined,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap()
}

#[derive(Default)]
pub struct MemoryAccounts {
    users: Mutex<Vec<User>>,
    /// Force the next `save` to fail.
    pub fail_save: Mutex<bool>,
}

impl MemoryAccounts {
    pub fn get(&self, id: UserId) -> Option<User> {
        lock(&self.users).iter().find(|u| u.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.users).len()
    }

    pub fn set_active(&self, id: UserId, active: bool) {
        if let Some(user) = lock(&self.users).iter_mut().find(|u| u.id == id) {
            user.is_active = active;
        }
    }
}

#[async_trait]
impl AccountRepository for MemoryAccounts {
    async fn create(&self, new: &NewUser, now: DateTime<Utc>) -> Result<User> {
        let mut users = lock(&self.users);
        if users.iter().any(|u| u.username == new.username) {
            return Err(username_taken());
        }

        let id = users.len() as UserId + 1;
        let user = User {
            id,
            username: new.username.clone(),
            email: new.email.clone(),
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            user_type: new.user_type,
            company_name: new.company_name.clone(),
            phone_number: new.phone_number.clone(),
            business_sector: new.business_sector.clone(),
            state: new.state.clone(),
            subscription_tier: new.subscription_tier,
            profile: Profile::new(id, now),
            queries_used: 0,
            query_limit: new.query_limit,
            password: new.password.clone(),
            is_active: true,
            date_joined: now,
        };
        users.push(user.clone());

        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.get(id))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(lock(&self.users)
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn save(&self, user: &User) -> Result<()> {
        if *lock(&self.fail_save) {
            return Err(sqlx::Error::PoolTimedOut.into());
        }

        let mut users = lock(&self.users);
        if let Some(stored) = users.iter_mut().find(|u| u.id == user.id) {
            let password = std::mem::take(&mut stored.password);
            *stored = User {
                password,
                ..user.clone()
            };
        }

        Ok(())
    }

    async fn save_profile(&self, profile: &Profile) -> Result<()> {
        if let Some(stored) = lock(&self.users).iter_mut().find(|u| u.id == profile.user) {
            stored.profile = profile.clone();
        }

        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTokens {
    tokens: Mutex<Vec<AuthToken>>,
}

impl MemoryTokens {
    pub fn all(&self) -> Vec<AuthToken> {
        lock(&self.tokens).clone()
    }
}

#[async_trait]
impl TokenRepository for MemoryTokens {
    async fn insert(&self, token: &AuthToken) -> Result<()> {
        lock(&self.tokens).push(token.clone());
        Ok(())
    }

    async fn find_by_key(&self, token_key: &str) -> Result<Vec<AuthToken>> {
        Ok(lock(&self.tokens)
            .iter()
            .filter(|t| t.token_key == token_key)
            .cloned()
            .collect())
    }

    async fn delete(&self, digest: &str) -> Result<()> {
        lock(&self.tokens).retain(|t| t.digest != digest);
        Ok(())
    }

    async fn delete_for_user(&self, user_id: UserId) -> Result<u64> {
        let mut tokens = lock(&self.tokens);
        let before = tokens.len();
        tokens.retain(|t| t.user_id != user_id);
        Ok((before - tokens.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryActivity {
    documents: Mutex<Vec<Document>>,
    conversations: Mutex<Vec<Conversation>>,
    queries: Mutex<Vec<ChatQuery>>,
    calls: Mutex<Vec<VoiceCall>>,
}

impl MemoryActivity {
    pub fn document(&self, user: UserId, created_at: DateTime<Utc>, is_processed: bool) {
        let mut documents = lock(&self.documents);
        let id = documents.len() as i64 + 1;
        documents.push(Document {
            id,
            user,
            title: format!("Document {id}"),
            document_type: "invoice".into(),
            is_processed,
            created_at,
        });
    }

    pub fn conversation(&self, user: UserId, updated_at: DateTime<Utc>, is_active: bool) {
        let mut conversations = lock(&self.conversations);
        let id = conversations.len() as i64 + 1;
        conversations.push(Conversation {
            id,
            user,
            title: format!("Conversation {id}"),
            is_active,
            created_at: updated_at - chrono::Duration::days(1),
            updated_at,
        });
    }

    pub fn query(&self, user: UserId, created_at: DateTime<Utc>) {
        let mut queries = lock(&self.queries);
        let id = queries.len() as i64 + 1;
        queries.push(ChatQuery {
            id,
            user,
            created_at,
        });
    }

    pub fn call(&self, user: UserId, status: &str, scheduled_time: DateTime<Utc>) {
        let mut calls = lock(&self.calls);
        let id = calls.len() as i64 + 1;
        calls.push(VoiceCall {
            id,
            user,
            topic: format!("Call {id}"),
            status: status.to_owned(),
            scheduled_time,
            duration_minutes: 30,
        });
    }
}

#[async_trait]
impl ActivityRepository for MemoryActivity {
    async fn count_documents(&self, user: UserId) -> Result<i64> {
        Ok(lock(&self.documents).iter().filter(|d| d.user == user).count() as i64)
    }

    async fn count_processed_documents_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        Ok(lock(&self.documents)
            .iter()
            .filter(|d| d.user == user && d.is_processed && d.created_at >= since)
            .count() as i64)
    }

    async fn count_queries_since(&self, user: UserId, since: DateTime<Utc>) -> Result<i64> {
        Ok(lock(&self.queries)
            .iter()
            .filter(|q| q.user == user && q.created_at >= since)
            .count() as i64)
    }

    async fn recent_active_conversations(
        &self,
        user: UserId,
        limit: i64,
    ) -> Result<Vec<Conversation>> {
        let mut conversations: Vec<_> = lock(&self.conversations)
            .iter()
            .filter(|c| c.user == user && c.is_active)
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        conversations.truncate(limit as usize);
        Ok(conversations)
    }

    async fn recent_documents(&self, user: UserId, limit: i64) -> Result<Vec<Document>> {
        let mut documents: Vec<_> = lock(&self.documents)
            .iter()
            .filter(|d| d.user == user)
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        documents.truncate(limit as usize);
        Ok(documents)
    }

    async fn upcoming_calls(
        &self,
        user: UserId,
        from: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<VoiceCall>> {
        let mut calls: Vec<_> = lock(&self.calls)
            .iter()
            .filter(|c| c.user == user && c.status == CALL_SCHEDULED && c.scheduled_time >= from)
            .cloned()
            .collect();
        calls.sort_by(|a, b| a.scheduled_time.cmp(&b.scheduled_time));
        calls.truncate(limit as usize);
        Ok(calls)
    }
}

/// Application state backed by in-memory adapters, with handles on them.
pub struct TestContext {
    pub state: AppState,
    pub accounts: Arc<MemoryAccounts>,
    pub tokens: Arc<MemoryTokens>,
    pub activity: Arc<MemoryActivity>,
}

impl TestContext {
    pub fn new() -> Self {
        let accounts = Arc::new(MemoryAccounts::default());
        let tokens = Arc::new(MemoryTokens::default());
        let activity = Arc::new(MemoryActivity::default());
        let clock = Arc::new(FixedClock(fixed_now()));

        let crypto = Crypto::new(Some(Argon2 {
            memory_cost: 1024,
            iterations: 1,
            parallelism: 1,
            hash_length: 32,
        }))
        .unwrap();

        let state = AppState {
            config: Arc::new(Configuration::default()),
            crypto: Arc::new(crypto),
            accounts: accounts.clone(),
            activity: activity.clone(),
            token: TokenManager::new(tokens.clone(), clock.clone(), DEFAULT_TTL_HOURS),
            clock,
        };

        Self {
            state,
            accounts,
            tokens,
            activity,
        }
    }

    /// Register an account directly and issue it a token.
    pub async fn signed_in(&self, username: &str, password: &str) -> (User, String) {
        let new = UserBuilder::new()
            .username(username)
            .email(format!("{username}@example.com"))
            .password(self.state.crypto.pwd.hash_password(password).unwrap())
            .first_name(Some("Ada".into()))
            .build();

        let user = self.accounts.create(&new, fixed_now()).await.unwrap();
        let token = self.state.token.create(user.id).await.unwrap();
        (user, token)
    }
}

/// Collect a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    use http_body_util::BodyExt;

    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}
