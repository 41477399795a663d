//! Partial updates of accounts and profiles.
//!
//! Settings payloads are flat: account fields and profile fields live side by
//! side. Each field belongs statically to one entity, so splitting a payload
//! is only a matter of moving fields into both change sets.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

use crate::user::{Profile, User};

const REVENUE_MAX_DIGITS: u32 = 15;
const REVENUE_DECIMAL_PLACES: u32 = 2;

/// Distinguish an absent field (`None`) from an explicit `null`
/// (`Some(None)`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Optional field that must not be `null` when present.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Optional, non-null string with surrounding whitespace removed.
fn trimmed<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|value| Some(value.trim().to_owned()))
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new("blank").with_message("This field may not be blank.".into()));
    }

    Ok(())
}

/// Account-level fields that users may change. `email` is not one of them.
/// Built by [`SettingsChanges::split`], which carries the validation.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company_name: Option<String>,
    pub phone_number: Option<String>,
    pub business_sector: Option<String>,
    pub state: Option<String>,
}

impl AccountChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrite present fields on `user`.
    pub fn apply(self, user: &mut User) {
        let fields = [
            (self.first_name, &mut user.first_name),
            (self.last_name, &mut user.last_name),
            (self.company_name, &mut user.company_name),
            (self.phone_number, &mut user.phone_number),
            (self.business_sector, &mut user.business_sector),
            (self.state, &mut user.state),
        ];

        for (value, field) in fields {
            if let Some(value) = value {
                *field = value;
            }
        }
    }
}

/// Profile-level fields that users may change.
#[derive(Debug, Default, Clone, PartialEq, Validate, Serialize, Deserialize)]
#[validate(schema(function = "validate_profile_numbers", skip_on_field_errors = false))]
pub struct ProfileChanges {
    #[validate(length(max = 50, message = "Ensure this field has no more than 50 characters."))]
    pub tax_identification_number: Option<String>,
    pub vat_registered: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub employees_count: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub annual_revenue: Option<Option<Decimal>>,
    #[validate(length(min = 1, max = 10, message = "Ensure this field has 1 to 10 characters."))]
    pub preferred_language: Option<String>,
}

fn validate_profile_numbers(changes: &ProfileChanges) -> Result<(), ValidationError> {
    if let Some(Some(count)) = changes.employees_count {
        if count < 0 {
            return Err(ValidationError::new("employees_count")
                .with_message("Ensure employees_count is greater than or equal to 0.".into()));
        }
    }

    if let Some(Some(revenue)) = changes.annual_revenue {
        validate_revenue(&revenue)?;
    }

    Ok(())
}

/// Revenue must fit a `NUMERIC(15, 2)` column. Trailing zeros count as
/// decimal places.
pub fn validate_revenue(revenue: &Decimal) -> Result<(), ValidationError> {
    if revenue.scale() > REVENUE_DECIMAL_PLACES {
        return Err(ValidationError::new("annual_revenue").with_message(
            "Ensure that there are no more than 2 decimal places in annual_revenue.".into(),
        ));
    }

    let integer_digits = revenue.trunc().abs().to_string().trim_start_matches('0').len() as u32;
    if integer_digits > REVENUE_MAX_DIGITS - REVENUE_DECIMAL_PLACES {
        return Err(ValidationError::new("annual_revenue").with_message(
            "Ensure that there are no more than 13 digits before the decimal point in annual_revenue.".into(),
        ));
    }

    Ok(())
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrite present fields on `profile` and bump `updated_at`.
    pub fn apply(self, profile: &mut Profile, now: DateTime<Utc>) {
        if let Some(tax_identification_number) = self.tax_identification_number {
            profile.tax_identification_number = tax_identification_number;
        }
        if let Some(vat_registered) = self.vat_registered {
            profile.vat_registered = vat_registered;
        }
        if let Some(employees_count) = self.employees_count {
            profile.employees_count = employees_count;
        }
        if let Some(annual_revenue) = self.annual_revenue {
            profile.annual_revenue = annual_revenue.map(|revenue| {
                let mut revenue = revenue.round_dp(REVENUE_DECIMAL_PLACES);
                revenue.rescale(REVENUE_DECIMAL_PLACES);
                revenue
            });
        }
        if let Some(preferred_language) = self.preferred_language {
            profile.preferred_language = preferred_language;
        }
        profile.updated_at = now;
    }
}

/// Flat settings payload spanning both entities.
///
/// Strings are trimmed and may not be blank. Only `annual_revenue` accepts
/// `null`. `email` is not part of the payload and is ignored.
#[derive(Debug, Default, Clone, PartialEq, Validate, Serialize, Deserialize)]
pub struct SettingsChanges {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        custom(function = "not_blank"),
        length(max = 150, message = "Ensure this field has no more than 150 characters.")
    )]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        custom(function = "not_blank"),
        length(max = 150, message = "Ensure this field has no more than 150 characters.")
    )]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        custom(function = "not_blank"),
        length(max = 255, message = "Ensure this field has no more than 255 characters.")
    )]
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        custom(function = "not_blank"),
        length(max = 20, message = "Ensure this field has no more than 20 characters.")
    )]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        custom(function = "not_blank"),
        length(max = 100, message = "Ensure this field has no more than 100 characters.")
    )]
    pub business_sector: Option<String>,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        custom(function = "not_blank"),
        length(max = 50, message = "Ensure this field has no more than 50 characters.")
    )]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        custom(function = "not_blank"),
        length(max = 50, message = "Ensure this field has no more than 50 characters.")
    )]
    pub tax_identification_number: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub vat_registered: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub employees_count: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(custom(function = "validate_revenue"))]
    pub annual_revenue: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        custom(function = "not_blank"),
        length(max = 10, message = "Ensure this field has no more than 10 characters.")
    )]
    pub preferred_language: Option<String>,
}

impl SettingsChanges {
    /// Split into the account group and the profile group.
    pub fn split(self) -> (AccountChanges, ProfileChanges) {
        let account = AccountChanges {
            first_name: self.first_name,
            last_name: self.last_name,
            company_name: self.company_name,
            phone_number: self.phone_number,
            business_sector: self.business_sector,
            state: self.state,
        };
        let profile = ProfileChanges {
            tax_identification_number: self.tax_identification_number,
            vat_registered: self.vat_registered,
            employees_count: self.employees_count.map(Some),
            annual_revenue: self.annual_revenue,
            preferred_language: self.preferred_language,
        };

        (account, profile)
    }
}

/// Flat view of account and profile settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsView {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub company_name: String,
    pub phone_number: String,
    pub business_sector: String,
    pub state: String,
    pub tax_identification_number: String,
    pub vat_registered: bool,
    pub employees_count: Option<i32>,
    pub annual_revenue: Option<Decimal>,
    pub preferred_language: String,
}

impl From<&User> for SettingsView {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            company_name: user.company_name.clone(),
            phone_number: user.phone_number.clone(),
            business_sector: user.business_sector.clone(),
            state: user.state.clone(),
            tax_identification_number: user.profile.tax_identification_number.clone(),
            vat_registered: user.profile.vat_registered,
            employees_count: user.profile.employees_count,
            annual_revenue: user.profile.annual_revenue,
            preferred_language: user.profile.preferred_language.clone(),
        }
    }
}
