mod builder;
mod repository;
mod settings;

pub use builder::*;
pub use repository::*;
pub use settings::*;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type UserId = i64;

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_QUERY_LIMIT: i32 = 10;

/// Kind of account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    #[default]
    Individual,
    Business,
}

/// Subscription plan. Only changed by billing, never through the API.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Basic,
    Premium,
    Enterprise,
}

macro_rules! text_enum {
    ($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::str::FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(UnknownVariant(s.to_owned())),
                }
            }
        }
    };
}

/// A stored value does not match any enum variant.
#[derive(Debug, thiserror::Error)]
#[error("unknown variant `{0}`")]
pub struct UnknownVariant(pub String);

text_enum!(UserType {
    Individual => "individual",
    Business => "business",
});

text_enum!(SubscriptionTier {
    Free => "free",
    Basic => "basic",
    Premium => "premium",
    Enterprise => "enterprise",
});

/// Account with its profile, as returned by the API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
    pub company_name: String,
    pub phone_number: String,
    pub business_sector: String,
    pub state: String,
    pub subscription_tier: SubscriptionTier,
    pub profile: Profile,
    pub queries_used: i32,
    pub query_limit: i32,
    #[serde(skip)]
    pub password: String,
    #[serde(skip)]
    pub is_active: bool,
    #[serde(skip)]
    pub date_joined: DateTime<Utc>,
}

/// Extended attributes attached one-to-one to a [`User`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user: UserId,
    pub tax_identification_number: String,
    pub vat_registered: bool,
    pub employees_count: Option<i32>,
    pub annual_revenue: Option<Decimal>,
    pub preferred_language: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Profile created alongside a new account.
    pub fn new(user: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user,
            tax_identification_number: String::default(),
            vat_registered: false,
            employees_count: None,
            annual_revenue: None,
            preferred_language: DEFAULT_LANGUAGE.to_owned(),
            created_at: now,
            updated_at: now,
        }
    }
}
