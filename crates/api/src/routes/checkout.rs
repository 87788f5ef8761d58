//! Checkout session endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use billgate_ledger::{
    CartCheckoutParams, CartCheckoutResponse, CartItem, CheckoutResponse, ItemCheckoutParams,
    SubscriptionCheckoutParams, MAX_CART_ITEMS,
};

use crate::auth::ProjectContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubscriptionCheckoutRequest {
    pub user_id: String,
    pub email: String,
    pub product_id: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ItemCheckoutRequest {
    pub user_id: String,
    pub email: String,
    pub product_id: String,
    pub price_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u64,
    pub success_url: String,
    pub cancel_url: String,
}

fn default_quantity() -> u64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct CartItemRequest {
    pub price_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u64,
}

#[derive(Debug, Deserialize)]
pub struct CartCheckoutRequest {
    pub user_id: String,
    pub email: String,
    pub items: Vec<CartItemRequest>,
    pub success_url: String,
    pub cancel_url: String,
}

fn require_field(value: &str, field: &'static str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(
            format!("{} must not be empty", field),
            field,
        ));
    }
    Ok(())
}

fn unwrap_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(ApiError::invalid_body(rejection.body_text())),
    }
}

/// POST /api/v1/checkout/subscription
pub async fn subscription_checkout(
    State(state): State<AppState>,
    Extension(project): Extension<ProjectContext>,
    body: Result<Json<SubscriptionCheckoutRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CheckoutResponse>)> {
    let req = unwrap_body(body)?;

    require_field(&req.user_id, "user_id")?;
    require_field(&req.email, "email")?;
    require_field(&req.product_id, "product_id")?;
    require_field(&req.price_id, "price_id")?;
    require_field(&req.success_url, "success_url")?;
    require_field(&req.cancel_url, "cancel_url")?;

    let response = state
        .billing
        .checkout
        .subscription_checkout(
            project.project_id,
            &SubscriptionCheckoutParams {
                user_id: req.user_id,
                email: req.email,
                product_id: req.product_id,
                price_id: req.price_id,
                success_url: req.success_url,
                cancel_url: req.cancel_url,
            },
        )
        .await?;

    Ok((StatusCode::OK, Json(response)))
}

/// POST /api/v1/checkout/item
pub async fn item_checkout(
    State(state): State<AppState>,
    Extension(project): Extension<ProjectContext>,
    body: Result<Json<ItemCheckoutRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CheckoutResponse>)> {
    let req = unwrap_body(body)?;

    require_field(&req.user_id, "user_id")?;
    require_field(&req.email, "email")?;
    require_field(&req.product_id, "product_id")?;
    require_field(&req.price_id, "price_id")?;
    require_field(&req.success_url, "success_url")?;
    require_field(&req.cancel_url, "cancel_url")?;
    if req.quantity == 0 {
        return Err(ApiError::validation(
            "quantity must be at least 1",
            "quantity",
        ));
    }

    let response = state
        .billing
        .checkout
        .item_checkout(
            project.project_id,
            &ItemCheckoutParams {
                user_id: req.user_id,
                email: req.email,
                product_id: req.product_id,
                price_id: req.price_id,
                quantity: req.quantity,
                success_url: req.success_url,
                cancel_url: req.cancel_url,
            },
        )
        .await?;

    Ok((StatusCode::OK, Json(response)))
}

/// POST /api/v1/checkout/cart
pub async fn cart_checkout(
    State(state): State<AppState>,
    Extension(project): Extension<ProjectContext>,
    body: Result<Json<CartCheckoutRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CartCheckoutResponse>)> {
    let req = unwrap_body(body)?;

    require_field(&req.user_id, "user_id")?;
    require_field(&req.email, "email")?;
    require_field(&req.success_url, "success_url")?;
    require_field(&req.cancel_url, "cancel_url")?;
    validate_cart_items(&req.items)?;

    let items = req
        .items
        .into_iter()
        .map(|item| CartItem {
            price_id: item.price_id,
            quantity: item.quantity,
        })
        .collect();

    let response = state
        .billing
        .checkout
        .cart_checkout(
            project.project_id,
            &CartCheckoutParams {
                user_id: req.user_id,
                email: req.email,
                items,
                success_url: req.success_url,
                cancel_url: req.cancel_url,
            },
        )
        .await?;

    Ok((StatusCode::OK, Json(response)))
}

fn validate_cart_items(items: &[CartItemRequest]) -> Result<(), ApiError> {
    if items.is_empty() {
        return Err(ApiError::validation(
            "cart must contain at least one item",
            "items",
        ));
    }
    if items.len() > MAX_CART_ITEMS {
        return Err(ApiError::validation(
            format!("cart may contain at most {} items", MAX_CART_ITEMS),
            "items",
        ));
    }
    for (index, item) in items.iter().enumerate() {
        if item.price_id.trim().is_empty() {
            return Err(ApiError::validation(
                format!("items[{}].price_id must not be empty", index),
                "items",
            ));
        }
        if item.quantity == 0 {
            return Err(ApiError::validation(
                format!("items[{}].quantity must be at least 1", index),
                "items",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price_id: &str, quantity: u64) -> CartItemRequest {
        CartItemRequest {
            price_id: price_id.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_empty_cart_rejected() {
        let err = validate_cart_items(&[]).unwrap_err();
        assert_eq!(err.code, "VALIDATION_FAILED");
        assert_eq!(err.field.as_deref(), Some("items"));
    }

    #[test]
    fn test_cart_over_limit_rejected() {
        let items: Vec<_> = (0..21).map(|i| item(&format!("price_{}", i), 1)).collect();
        let err = validate_cart_items(&items).unwrap_err();
        assert_eq!(err.code, "VALIDATION_FAILED");
    }

    #[test]
    fn test_cart_at_limit_accepted() {
        let items: Vec<_> = (0..20).map(|i| item(&format!("price_{}", i), 1)).collect();
        assert!(validate_cart_items(&items).is_ok());
    }

    #[test]
    fn test_zero_quantity_item_rejected() {
        let err = validate_cart_items(&[item("price_1", 0)]).unwrap_err();
        assert_eq!(err.code, "VALIDATION_FAILED");
    }

    #[test]
    fn test_blank_price_id_rejected() {
        let err = validate_cart_items(&[item("  ", 1)]).unwrap_err();
        assert_eq!(err.code, "VALIDATION_FAILED");
    }

    #[test]
    fn test_blank_field_rejected() {
        let err = require_field("  ", "user_id").unwrap_err();
        assert_eq!(err.code, "VALIDATION_FAILED");
        assert_eq!(err.field.as_deref(), Some("user_id"));
    }
}
