use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Product entity
///
/// `owner_id` is a weak reference to a user in the users service. `is_deleted` is flipped
/// either by the owner or in bulk when the owner is deactivated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub is_available: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(owner_id: Uuid, input: CreateProduct) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            owner_id,
            name: input.name,
            description: input.description,
            price: input.price,
            is_available: input.is_available,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply the present fields of `changes`.
    pub fn apply(&mut self, changes: UpdateProduct) {
        if let Some(name) = changes.name {
            self.name = name;
        }
        if let Some(description) = changes.description {
            self.description = Some(description);
        }
        if let Some(price) = changes.price {
            self.price = price;
        }
        if let Some(is_available) = changes.is_available {
            self.is_available = is_available;
        }
        self.updated_at = Utc::now();
    }

    pub fn matches(&self, filter: &ProductFilter) -> bool {
        if self.is_deleted && !filter.include_deleted {
            return false;
        }
        if filter.user_id.is_some_and(|owner| owner != self.owner_id) {
            return false;
        }
        if filter.is_available.is_some_and(|a| a != self.is_available) {
            return false;
        }
        if filter.min_price.is_some_and(|min| self.price < min) {
            return false;
        }
        if filter.max_price.is_some_and(|max| self.price > max) {
            return false;
        }
        match filter.search_pattern() {
            Some(term) => {
                self.name.to_lowercase().contains(&term)
                    || self
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&term))
            }
            None => true,
        }
    }
}

/// Largest value the `NUMERIC(12,2)` price column holds.
const MAX_PRICE: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

fn validate_positive_price(price: &Decimal) -> Result<(), ValidationError> {
    if !price.is_sign_positive() || price.is_zero() {
        return Err(ValidationError::new("price_positive")
            .with_message("price must be greater than 0".into()));
    }
    if price.normalize().scale() > 2 {
        return Err(ValidationError::new("price_scale")
            .with_message("price must have at most 2 decimal places".into()));
    }
    if *price > MAX_PRICE {
        return Err(ValidationError::new("price_range")
            .with_message("price must be at most 9999999999.99".into()));
    }
    Ok(())
}

fn default_available() -> bool {
    true
}

/// DTO for creating a product. The owner is the authenticated caller.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProduct {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(custom(function = "validate_positive_price"))]
    pub price: Decimal,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

/// DTO for updating a product; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProduct {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(custom(function = "validate_positive_price"))]
    pub price: Option<Decimal>,
    pub is_available: Option<bool>,
}

/// Query filters for listing products
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct ProductFilter {
    /// Case-insensitive match on name or description
    pub search_term: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub is_available: Option<bool>,
    /// Owner
    pub user_id: Option<Uuid>,
    /// Include soft-deleted products
    #[serde(default)]
    pub include_deleted: bool,
    /// Max results (default 50, capped at 200)
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> u64 {
    50
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            search_term: None,
            min_price: None,
            max_price: None,
            is_available: None,
            user_id: None,
            include_deleted: false,
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl ProductFilter {
    pub fn for_owner(owner_id: Uuid) -> Self {
        Self {
            user_id: Some(owner_id),
            ..Default::default()
        }
    }

    pub fn capped_limit(&self) -> u64 {
        self.limit.min(200)
    }

    /// Lowercased, trimmed search term; blank terms are ignored.
    pub fn search_pattern(&self) -> Option<String> {
        self.search_term
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
    }
}

/// Body of the user sync endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncUserRequest {
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncUserResponse {
    pub user_id: Uuid,
    pub is_active: bool,
    /// Products whose deleted flag changed
    pub affected: u64,
}
