use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use mktplan_core::context::AppContext;
use mktplan_core::lifecycle::GateDecision;
use mktplan_data::models::{Plan, PlanActivity, Template, TemplateActivity};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct TemplateDetailResponse {
    #[serde(flatten)]
    pub template: Template,
    pub activities: Vec<TemplateActivity>,
}

#[derive(Debug, Serialize)]
pub struct PlanActivityResponse {
    #[serde(flatten)]
    pub activity: PlanActivity,
    pub unblocked: bool,
}

#[derive(Debug, Serialize)]
pub struct PlanDetailResponse {
    #[serde(flatten)]
    pub plan: Plan,
    pub activity_states: Vec<PlanActivityResponse>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub activity_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct GateDecisionRequest {
    pub approve: bool,
    #[serde(default)]
    pub comments: Option<String>,
}

impl GateDecisionRequest {
    fn into_decision(self) -> GateDecision {
        if self.approve {
            GateDecision::approved(self.comments)
        } else {
            GateDecision::rejected(self.comments)
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/templates", get(list_templates))
        .route("/api/templates/{id}", get(get_template_detail))
        .route("/api/templates/{id}/reorder", post(reorder_template))
        .route(
            "/api/templates/{id}/activities/{activity_id}/toggle-fixed",
            post(toggle_fixed),
        )
        .route("/api/plans", get(list_plans))
        .route("/api/plans/{id}", get(get_plan_detail))
        .route("/api/plans/{id}/review", post(review_plan))
        .route("/api/plans/{id}/approve", post(approve_plan))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(ctx: Arc<AppContext>, addr: &str) -> Result<()> {
    let app = build_router(ctx);
    let addr: SocketAddr = addr.parse()?;
    tracing::info!("mktplan serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("mktplan serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
}

/// Surface a persistence error the store absorbed during a write handler.
fn template_store_error(ctx: &AppContext) -> Result<(), AppError> {
    match ctx.templates.error() {
        Some(message) => Err(AppError::internal(message)),
        None => Ok(()),
    }
}

fn plan_store_error(ctx: &AppContext) -> Result<(), AppError> {
    match ctx.plans.error() {
        Some(message) => Err(AppError::internal(message)),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index(State(ctx): State<Arc<AppContext>>) -> axum::response::Response {
    let plans = ctx.plans.plans();
    let rows = if plans.is_empty() {
        "<tr><td colspan=\"3\">No plans found.</td></tr>".to_string()
    } else {
        plans
            .iter()
            .map(|p| {
                format!(
                    "<tr><td><a href=\"/api/plans/{id}\">{title}</a></td><td>{status}</td><td>{id}</td></tr>",
                    id = p.id,
                    title = p.title,
                    status = p.status,
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let html = format!(
        "<!DOCTYPE html>\
<html><head><title>mktplan</title></head><body>\
<h1>mktplan</h1>\
<p><a href=\"/api/plans\">/api/plans</a> | <a href=\"/api/templates\">/api/templates</a></p>\
<table><tr><th>Plan</th><th>Status</th><th>ID</th></tr>{rows}</table>\
</body></html>"
    );

    Html(html).into_response()
}

async fn list_templates(State(ctx): State<Arc<AppContext>>) -> axum::response::Response {
    Json(ctx.templates.templates()).into_response()
}

async fn get_template_detail(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
) -> Result<axum::response::Response, AppError> {
    let template = ctx
        .templates
        .template(id)
        .ok_or_else(|| AppError::not_found(format!("template {id} not found")))?;
    let activities = ctx.templates.activities(id);

    Ok(Json(TemplateDetailResponse {
        template,
        activities,
    })
    .into_response())
}

async fn reorder_template(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReorderRequest>,
) -> Result<axum::response::Response, AppError> {
    if ctx.templates.template(id).is_none() {
        return Err(AppError::not_found(format!("template {id} not found")));
    }

    ctx.templates.reorder_activities(id, req.activity_ids).await;
    template_store_error(&ctx)?;

    Ok(Json(ctx.templates.activities(id)).into_response())
}

async fn toggle_fixed(
    State(ctx): State<Arc<AppContext>>,
    Path((id, activity_id)): Path<(Uuid, Uuid)>,
) -> Result<axum::response::Response, AppError> {
    let exists = ctx
        .templates
        .activities(id)
        .iter()
        .any(|a| a.id == activity_id);
    if !exists {
        return Err(AppError::not_found(format!(
            "activity {activity_id} not found in template {id}"
        )));
    }

    ctx.templates.toggle_activity_fixed(id, activity_id).await;
    template_store_error(&ctx)?;

    let template = ctx
        .templates
        .template(id)
        .ok_or_else(|| AppError::not_found(format!("template {id} not found")))?;
    let activities = ctx.templates.activities(id);
    Ok(Json(TemplateDetailResponse {
        template,
        activities,
    })
    .into_response())
}

async fn list_plans(State(ctx): State<Arc<AppContext>>) -> axum::response::Response {
    Json(ctx.plans.plans()).into_response()
}

async fn get_plan_detail(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
) -> Result<axum::response::Response, AppError> {
    let plan = ctx
        .plans
        .plan(id)
        .ok_or_else(|| AppError::not_found(format!("plan {id} not found")))?;

    let activity_states = plan
        .activities
        .iter()
        .map(|activity| PlanActivityResponse {
            unblocked: ctx.plans.check_activity_dependencies(id, activity.id),
            activity: activity.clone(),
        })
        .collect();

    Ok(Json(PlanDetailResponse {
        plan,
        activity_states,
    })
    .into_response())
}

async fn review_plan(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Json(req): Json<GateDecisionRequest>,
) -> Result<axum::response::Response, AppError> {
    if ctx.plans.plan(id).is_none() {
        return Err(AppError::not_found(format!("plan {id} not found")));
    }

    let updated = ctx.plans.review_plan(id, req.into_decision()).await;
    plan_store_error(&ctx)?;
    let plan = updated.ok_or_else(|| AppError::not_found(format!("plan {id} not found")))?;
    Ok(Json(plan).into_response())
}

async fn approve_plan(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Json(req): Json<GateDecisionRequest>,
) -> Result<axum::response::Response, AppError> {
    if ctx.plans.plan(id).is_none() {
        return Err(AppError::not_found(format!("plan {id} not found")));
    }

    let updated = ctx.plans.approve_plan(id, req.into_decision()).await;
    plan_store_error(&ctx)?;
    let plan = updated.ok_or_else(|| AppError::not_found(format!("plan {id} not found")))?;
    Ok(Json(plan).into_response())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;

    use mktplan_core::context::AppContext;
    use mktplan_data::backend::Backend;
    use mktplan_test_utils::seeded_backend;

    async fn seeded_context() -> Arc<AppContext> {
        let (backend, _template, _activities, _plan) = seeded_backend(false).await;
        let ctx = AppContext::new(backend as Arc<dyn Backend>);
        ctx.load_all().await;
        Arc::new(ctx)
    }

    async fn send_get(ctx: Arc<AppContext>, uri: &str) -> axum::response::Response {
        let app = super::build_router(ctx);
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn send_post(
        ctx: Arc<AppContext>,
        uri: &str,
        body: serde_json::Value,
    ) -> axum::response::Response {
        let app = super::build_router(ctx);
        app.oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_index_returns_html() {
        let ctx = seeded_context().await;

        let resp = send_get(ctx, "/").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp
            .headers()
            .get("content-type")
            .expect("should have content-type header")
            .to_str()
            .unwrap();
        assert!(
            content_type.contains("text/html"),
            "content-type should contain text/html, got: {content_type}"
        );
    }

    #[tokio::test]
    async fn test_list_templates() {
        let ctx = seeded_context().await;

        let resp = send_get(ctx, "/api/templates").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        let arr = json.as_array().expect("response should be an array");
        assert_eq!(arr.len(), 1);
    }

    #[tokio::test]
    async fn test_get_template_detail() {
        let ctx = seeded_context().await;
        let template_id = ctx.templates.templates()[0].id;

        let resp = send_get(ctx, &format!("/api/templates/{template_id}")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        let activities = json["activities"]
            .as_array()
            .expect("should have activities array");
        assert_eq!(activities.len(), 3);
    }

    #[tokio::test]
    async fn test_get_template_not_found() {
        let ctx = seeded_context().await;

        let random_id = uuid::Uuid::new_v4();
        let resp = send_get(ctx, &format!("/api/templates/{random_id}")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reorder_endpoint_applies_new_order() {
        let ctx = seeded_context().await;
        let template_id = ctx.templates.templates()[0].id;
        let mut ids: Vec<uuid::Uuid> = ctx
            .templates
            .activities(template_id)
            .iter()
            .map(|a| a.id)
            .collect();
        ids.reverse();

        let resp = send_post(
            ctx.clone(),
            &format!("/api/templates/{template_id}/reorder"),
            serde_json::json!({ "activity_ids": ids }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        let arr = json.as_array().expect("response should be an array");
        assert_eq!(arr[0]["id"], serde_json::json!(ids[0]));
        assert_eq!(arr[0]["order_index"], 0);
    }

    #[tokio::test]
    async fn test_toggle_fixed_endpoint() {
        let ctx = seeded_context().await;
        let template_id = ctx.templates.templates()[0].id;
        let activity_id = ctx.templates.activities(template_id)[0].id;

        let resp = send_post(
            ctx.clone(),
            &format!("/api/templates/{template_id}/activities/{activity_id}/toggle-fixed"),
            serde_json::json!({}),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["fixed_activities"], true);
        let activities = json["activities"].as_array().unwrap();
        let toggled = activities
            .iter()
            .find(|a| a["id"] == serde_json::json!(activity_id))
            .expect("toggled activity should be present");
        assert_eq!(toggled["fixed"], true);
    }

    #[tokio::test]
    async fn test_list_plans_with_data() {
        let ctx = seeded_context().await;

        let resp = send_get(ctx, "/api/plans").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        let arr = json.as_array().expect("response should be an array");
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["status"], "draft");
    }

    #[tokio::test]
    async fn test_get_plan_detail_reports_blocking() {
        let ctx = seeded_context().await;
        let plan_id = ctx.plans.plans()[0].id;

        let resp = send_get(ctx, &format!("/api/plans/{plan_id}")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert!(
            json.get("activity_states").is_some(),
            "should have activity_states field"
        );
    }

    #[tokio::test]
    async fn test_get_plan_not_found() {
        let ctx = seeded_context().await;

        let random_id = uuid::Uuid::new_v4();
        let resp = send_get(ctx, &format!("/api/plans/{random_id}")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_review_endpoint_rejects_unknown_plan() {
        let ctx = seeded_context().await;

        let random_id = uuid::Uuid::new_v4();
        let resp = send_post(
            ctx,
            &format!("/api/plans/{random_id}/review"),
            serde_json::json!({ "approve": true }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
