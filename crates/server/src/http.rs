use std::sync::Arc;

use api::auth::{decode_token, roles_from_claims, AuthConfig, CurrentUser, UserRole, SESSION_COOKIE};
use api::export::{self, CSV_CONTENT_TYPE, HTML_CONTENT_TYPE, XLS_CONTENT_TYPE};
use api::schema::HrSchema;
use api::template::CompanyProfile;
use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use entity::employee;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub schema: HrSchema,
    pub db: Arc<DatabaseConnection>,
    pub auth: Arc<AuthConfig>,
    pub company: Arc<CompanyProfile>,
}

pub fn app_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/graphiql", get(graphiql))
        .route("/graphql", get(graphql_handler).post(graphql_handler))
        .route("/exports/employees.csv", get(export_csv))
        .route("/exports/employees.xls", get(export_xls))
        .route("/employees/{id}/cv", get(employee_cv))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return base.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(parsed))
}

async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let mut request = req.into_inner();
    if let Some(current_user) = authenticate(&state, &headers).await {
        request = request.data(current_user);
    }
    state.schema.execute(request).await.into()
}

async fn graphiql() -> Html<String> {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

/// Resolves the caller from a bearer token or the session cookie. Roles come
/// from the token; the linked employee record supplies position and identity.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Option<CurrentUser> {
    let token = extract_token(headers)?;
    let claims = match decode_token(&token, &state.auth) {
        Ok(claims) => claims,
        Err(err) => {
            warn!(error = %err, "rejected session token");
            return None;
        }
    };
    let linked = employee::Entity::find()
        .filter(employee::Column::UserId.eq(claims.sub))
        .one(state.db.as_ref())
        .await
        .unwrap_or_else(|err| {
            error!(error = %err, user_id = %claims.sub, "employee lookup failed");
            None
        });
    Some(CurrentUser {
        user_id: claims.sub,
        roles: roles_from_claims(&claims),
        employee_id: linked.as_ref().map(|e| e.id),
        position_id: linked.and_then(|e| e.position_id),
    })
}

fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        if let Ok(text) = value.to_str() {
            if let Some(rest) = text.strip_prefix("Bearer ") {
                return Some(rest.trim().to_string());
            }
        }
    }
    let cookie = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie.split(';').find_map(|part| {
        part.trim()
            .strip_prefix(SESSION_COOKIE)
            .and_then(|rest| rest.strip_prefix('='))
            .map(|value| value.trim().to_string())
    })
}

#[derive(Debug)]
enum HttpError {
    Unauthenticated,
    Forbidden,
    NotFound,
    Internal,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            HttpError::Unauthenticated => (StatusCode::UNAUTHORIZED, "login required"),
            HttpError::Forbidden => (StatusCode::FORBIDDEN, "insufficient permissions"),
            HttpError::NotFound => (StatusCode::NOT_FOUND, "not found"),
            HttpError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
        };
        (status, message).into_response()
    }
}

fn internal(err: impl std::fmt::Display) -> HttpError {
    error!(error = %err, "export failed");
    HttpError::Internal
}

async fn require(
    state: &AppState,
    headers: &HeaderMap,
    role: UserRole,
) -> Result<CurrentUser, HttpError> {
    let user = authenticate(state, headers)
        .await
        .ok_or(HttpError::Unauthenticated)?;
    if user.has_role(role) {
        Ok(user)
    } else {
        Err(HttpError::Forbidden)
    }
}

fn attachment(content_type: &'static str, filename: &str, body: impl IntoResponse) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

async fn export_csv(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    require(&state, &headers, UserRole::Hr).await?;
    let rows = export::employee_rows(state.db.as_ref())
        .await
        .map_err(internal)?;
    let body = export::to_csv(&rows).map_err(internal)?;
    Ok(attachment(CSV_CONTENT_TYPE, "employees.csv", body))
}

async fn export_xls(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    require(&state, &headers, UserRole::Hr).await?;
    let rows = export::employee_rows(state.db.as_ref())
        .await
        .map_err(internal)?;
    Ok(attachment(
        XLS_CONTENT_TYPE,
        "employees.xls",
        export::to_xls_html(&rows),
    ))
}

async fn employee_cv(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, HttpError> {
    let user = require(&state, &headers, UserRole::Employee).await?;
    if user.employee_id != Some(id) && !user.has_role(UserRole::Hr) {
        return Err(HttpError::Forbidden);
    }
    let html = export::employee_cv(state.db.as_ref(), id, state.company.as_ref())
        .await
        .map_err(internal)?
        .ok_or(HttpError::NotFound)?;
    Ok(([(header::CONTENT_TYPE, HTML_CONTENT_TYPE)], html).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use api::auth::issue_token;
    use api::schema::{build_schema, AppSchema};
    use api::seed::{seed_hr_demo, SeededHrRecords};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;
    use tower::ServiceExt;

    async fn test_app() -> (Router, Arc<AuthConfig>, SeededHrRecords) {
        let conn = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&conn, None).await.unwrap();
        let seeded = seed_hr_demo(&conn).await.unwrap();
        let db = Arc::new(conn);
        let company = Arc::new(CompanyProfile {
            name: "Ромашка".into(),
            ..CompanyProfile::default()
        });
        let auth = Arc::new(AuthConfig {
            jwt_secret: "router-test".into(),
            session_ttl_minutes: 5,
        });
        let AppSchema(schema) = build_schema(db.clone(), company.clone());
        let state = AppState {
            schema,
            db,
            auth: auth.clone(),
            company,
        };
        (app_router(state, &[]), auth, seeded)
    }

    fn token_for(
        auth: &AuthConfig,
        seeded: &SeededHrRecords,
        email: &str,
        roles: &[UserRole],
    ) -> String {
        let user_id = seeded.employee_email(email).unwrap().user_id.unwrap();
        issue_token(user_id, roles, auth).unwrap()
    }

    async fn get(app: &Router, uri: &str, token: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        app.clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_bytes(resp: Response) -> Vec<u8> {
        resp.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    #[tokio::test]
    async fn health_needs_no_auth() {
        let (app, _, _) = test_app().await;
        let resp = get(&app, "/healthz", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_bytes(resp).await, b"ok");
    }

    #[tokio::test]
    async fn staff_export_is_hr_only() {
        let (app, auth, seeded) = test_app().await;

        let anonymous = get(&app, "/exports/employees.csv", None).await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let employee = token_for(&auth, &seeded, "andrey.volkov@hr.test", &[UserRole::Employee]);
        let denied = get(&app, "/exports/employees.csv", Some(&employee)).await;
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let hr = token_for(&auth, &seeded, "marina.kuznetsova@hr.test", &[UserRole::Hr]);
        let resp = get(&app, "/exports/employees.csv", Some(&hr)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            CSV_CONTENT_TYPE
        );
        let body = body_bytes(resp).await;
        assert!(body.starts_with(b"\xEF\xBB\xBF"));

        let xls = get(&app, "/exports/employees.xls", Some(&hr)).await;
        assert_eq!(xls.status(), StatusCode::OK);
        assert_eq!(
            xls.headers().get(header::CONTENT_TYPE).unwrap(),
            XLS_CONTENT_TYPE
        );
    }

    #[tokio::test]
    async fn cv_is_visible_to_its_owner_and_hr() {
        let (app, auth, seeded) = test_app().await;
        let volkov = seeded.employee_email("andrey.volkov@hr.test").unwrap().id;
        let sokolov = seeded.employee_email("ilya.sokolov@hr.test").unwrap().id;
        let own = token_for(&auth, &seeded, "andrey.volkov@hr.test", &[UserRole::Employee]);

        let resp = get(&app, &format!("/employees/{volkov}/cv"), Some(&own)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let html = String::from_utf8(body_bytes(resp).await).unwrap();
        assert!(html.contains("Волков Андрей Петрович"));

        let other = get(&app, &format!("/employees/{sokolov}/cv"), Some(&own)).await;
        assert_eq!(other.status(), StatusCode::FORBIDDEN);

        let hr = token_for(&auth, &seeded, "marina.kuznetsova@hr.test", &[UserRole::Hr]);
        let missing = get(&app, &format!("/employees/{}/cv", Uuid::new_v4()), Some(&hr)).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn graphql_resolves_caller_from_session_cookie() {
        let (app, auth, seeded) = test_app().await;
        let token = token_for(&auth, &seeded, "ilya.sokolov@hr.test", &[UserRole::Employee]);
        let body = serde_json::json!({ "query": "{ hr { me { roles employee { fullName } } } }" });
        let req = Request::builder()
            .method("POST")
            .uri("/graphql")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, format!("theme=dark; {SESSION_COOKIE}={token}"))
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(
            json["data"]["hr"]["me"],
            serde_json::json!({ "roles": ["EMPLOYEE"], "employee": { "fullName": "Соколов Илья" } })
        );
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        headers.insert(header::COOKIE, format!("{SESSION_COOKIE}=xyz").parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("abc"));

        headers.remove(header::AUTHORIZATION);
        assert_eq!(extract_token(&headers).as_deref(), Some("xyz"));
        assert_eq!(extract_token(&HeaderMap::new()), None);
    }
}
