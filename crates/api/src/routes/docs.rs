//! API documentation endpoints.

use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::Json;
use serde_json::json;

/// GET /openapi.json
pub async fn openapi_spec() -> impl IntoResponse {
    let spec = json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Billgate API",
            "description": "Multi-tenant billing gateway fronting Stripe. Tenant routes authenticate with a project API key in the X-API-Key header.",
            "version": env!("CARGO_PKG_VERSION")
        },
        "paths": {
            "/health": {
                "get": {
                    "summary": "Health check",
                    "responses": {
                        "200": {"description": "Service and database healthy"},
                        "503": {"description": "Database unavailable"}
                    }
                }
            },
            "/api/v1/checkout/subscription": {
                "post": {
                    "summary": "Create a subscription checkout session",
                    "security": [{"ApiKeyAuth": []}],
                    "requestBody": {
                        "content": {"application/json": {"schema": {
                            "type": "object",
                            "required": ["user_id", "email", "product_id", "price_id", "success_url", "cancel_url"],
                            "properties": {
                                "user_id": {"type": "string"},
                                "email": {"type": "string"},
                                "product_id": {"type": "string"},
                                "price_id": {"type": "string"},
                                "success_url": {"type": "string"},
                                "cancel_url": {"type": "string"}
                            }
                        }}}
                    },
                    "responses": {
                        "200": {"description": "Checkout session created"},
                        "400": {"description": "Validation failed"},
                        "401": {"description": "Missing or invalid API key"}
                    }
                }
            },
            "/api/v1/checkout/item": {
                "post": {
                    "summary": "Create a one-time payment checkout session",
                    "security": [{"ApiKeyAuth": []}],
                    "responses": {"200": {"description": "Checkout session created"}}
                }
            },
            "/api/v1/checkout/cart": {
                "post": {
                    "summary": "Create a multi-item payment checkout session (max 20 items)",
                    "security": [{"ApiKeyAuth": []}],
                    "responses": {"200": {"description": "Checkout session created"}}
                }
            },
            "/api/v1/subscriptions/{user_id}/{product_id}": {
                "get": {
                    "summary": "Merged subscription status (live Stripe state with ledger fallback)",
                    "security": [{"ApiKeyAuth": []}],
                    "parameters": [
                        {"name": "user_id", "in": "path", "required": true, "schema": {"type": "string"}},
                        {"name": "product_id", "in": "path", "required": true, "schema": {"type": "string"}}
                    ],
                    "responses": {
                        "200": {"description": "Status view; exists=false when no subscription"}
                    }
                }
            },
            "/api/v1/portal": {
                "post": {
                    "summary": "Create a billing portal session",
                    "security": [{"ApiKeyAuth": []}],
                    "responses": {
                        "200": {"description": "Portal session created"},
                        "400": {"description": "User has no billing history"},
                        "404": {"description": "Unknown user"}
                    }
                }
            },
            "/admin/products/register": {
                "post": {
                    "summary": "Register a plan's Stripe product/price pair",
                    "security": [{"ApiKeyAuth": []}],
                    "responses": {
                        "201": {"description": "Registered"},
                        "409": {"description": "Plan already registered; existing id in description"}
                    }
                }
            },
            "/admin/products": {
                "get": {
                    "summary": "List registered products for the calling project",
                    "security": [{"ApiKeyAuth": []}],
                    "responses": {"200": {"description": "Product list"}}
                }
            },
            "/admin/projects/register": {
                "post": {
                    "summary": "Register a project and mint its API key (admin token)",
                    "responses": {
                        "201": {"description": "Project created; api_key shown once"},
                        "401": {"description": "Missing or invalid admin token"}
                    }
                }
            },
            "/webhooks/stripe": {
                "post": {
                    "summary": "Stripe webhook receiver (signature authenticated)",
                    "responses": {
                        "200": {"description": "Event acknowledged"},
                        "400": {"description": "Signature or payload invalid"}
                    }
                }
            }
        },
        "components": {
            "securitySchemes": {
                "ApiKeyAuth": {"type": "apiKey", "in": "header", "name": "X-API-Key"}
            }
        }
    });

    ([(header::CACHE_CONTROL, "max-age=300")], Json(spec))
}

/// GET /docs
pub async fn docs_page() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Billgate API Docs</title>
    <meta charset="utf-8"/>
    <meta name="viewport" content="width=device-width, initial-scale=1"/>
    <style>body { margin: 0; }</style>
</head>
<body>
    <div id="docs"></div>
    <script src="https://cdn.jsdelivr.net/npm/redoc@latest/bundles/redoc.standalone.js"></script>
    <script>
        Redoc.init('/openapi.json', {}, document.getElementById('docs'));
    </script>
</body>
</html>"#,
    )
}
