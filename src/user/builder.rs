//! Typed builder for new accounts.

use crate::user::{DEFAULT_QUERY_LIMIT, SubscriptionTier, UserType};

/// Account waiting to be inserted, with an already hashed password.
///
/// Inserting it always creates the matching profile in the same transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
    pub company_name: String,
    pub phone_number: String,
    pub business_sector: String,
    pub state: String,
    pub subscription_tier: SubscriptionTier,
    pub query_limit: i32,
}

/// [`NewUser`] builder.
#[derive(Debug, Clone)]
pub struct UserBuilder<Username, Email> {
    username: Username,
    email: Email,
    password: String,
    first_name: String,
    last_name: String,
    user_type: UserType,
    company_name: String,
    phone_number: String,
    business_sector: String,
    state: String,
}

/// Value is missing on [`UserBuilder`].
#[derive(Debug, Clone)]
pub struct Missing;

/// Value is present on [`UserBuilder`].
#[derive(Debug, Clone)]
pub struct Present<T>(pub T);

impl UserBuilder<Missing, Missing> {
    /// Create a new [`UserBuilder`].
    pub fn new() -> Self {
        Self {
            username: Missing,
            email: Missing,
            password: String::default(),
            first_name: String::default(),
            last_name: String::default(),
            user_type: UserType::default(),
            company_name: String::default(),
            phone_number: String::default(),
            business_sector: String::default(),
            state: String::default(),
        }
    }
}

impl Default for UserBuilder<Missing, Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Email> UserBuilder<Missing, Email> {
    /// Update `username` field on [`UserBuilder`].
    pub fn username(
        self,
        username: impl Into<String>,
    ) -> UserBuilder<Present<String>, Email> {
        UserBuilder {
            username: Present(username.into()),
            email: self.email,
            password: self.password,
            first_name: self.first_name,
            last_name: self.last_name,
            user_type: self.user_type,
            company_name: self.company_name,
            phone_number: self.phone_number,
            business_sector: self.business_sector,
            state: self.state,
        }
    }
}

impl<Username> UserBuilder<Username, Missing> {
    /// Update `email` field on [`UserBuilder`].
    ///
    /// Domain part is lowercased, local part is kept as is.
    pub fn email(
        self,
        email: impl Into<String>,
    ) -> UserBuilder<Username, Present<String>> {
        UserBuilder {
            username: self.username,
            email: Present(normalize_email(&email.into())),
            password: self.password,
            first_name: self.first_name,
            last_name: self.last_name,
            user_type: self.user_type,
            company_name: self.company_name,
            phone_number: self.phone_number,
            business_sector: self.business_sector,
            state: self.state,
        }
    }
}

impl<Username, Email> UserBuilder<Username, Email> {
    /// Update `password` field on [`UserBuilder`]. Must be a PHC string.
    pub fn password(mut self, password: impl ToString) -> Self {
        self.password = password.to_string();
        self
    }

    pub fn first_name(mut self, first_name: Option<String>) -> Self {
        self.first_name = first_name.unwrap_or_default();
        self
    }

    pub fn last_name(mut self, last_name: Option<String>) -> Self {
        self.last_name = last_name.unwrap_or_default();
        self
    }

    pub fn user_type(mut self, user_type: Option<UserType>) -> Self {
        self.user_type = user_type.unwrap_or_default();
        self
    }

    pub fn company_name(mut self, company_name: Option<String>) -> Self {
        self.company_name = company_name.unwrap_or_default();
        self
    }

    pub fn phone_number(mut self, phone_number: Option<String>) -> Self {
        self.phone_number = phone_number.unwrap_or_default();
        self
    }

    pub fn business_sector(mut self, business_sector: Option<String>) -> Self {
        self.business_sector = business_sector.unwrap_or_default();
        self
    }

    pub fn state(mut self, state: Option<String>) -> Self {
        self.state = state.unwrap_or_default();
        self
    }
}

impl UserBuilder<Present<String>, Present<String>> {
    /// Build a [`NewUser`] with `username` and `email`.
    pub fn build(self) -> NewUser {
        NewUser {
            username: self.username.0,
            email: self.email.0,
            password: self.password,
            first_name: self.first_name,
            last_name: self.last_name,
            user_type: self.user_type,
            company_name: self.company_name,
            phone_number: self.phone_number,
            business_sector: self.business_sector,
            state: self.state,
            subscription_tier: SubscriptionTier::default(),
            query_limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

fn normalize_email(email: &str) -> String {
    match email.trim().rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.trim().to_owned(),
    }
}
