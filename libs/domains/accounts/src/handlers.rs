use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_helpers::{
    AuditEvent, AuditOutcome, ErrorResponse, JwtClaims, UuidPath, ValidatedJson,
    jwt_auth_middleware,
};
use serde_json::json;
use std::sync::Arc;
use utoipa::OpenApi;
use uuid::Uuid;

use crate::error::{AccountError, AccountResult};
use crate::models::{
    AuthContext, CreateUser, EmailClaim, Fieldset, FormLayout, ListLayout, LoginRequest,
    ModelPermission, RegisterUser, SocialCompleteRequest, SocialResponse, TokenResponse,
    UpdateUser, UserFilter, UserListResponse, UserResponse,
};
use crate::repository::UserRepository;
use crate::service::AccountService;

const AUTH_TAG: &str = "auth";
const ADMIN_TAG: &str = "admin-users";

/// OpenAPI documentation for the accounts API
#[derive(OpenApi)]
#[openapi(
    paths(
        login,
        register,
        auth_context,
        social_complete,
        list_users,
        create_user,
        list_layout,
        creation_form,
        get_user,
        update_user,
        delete_user,
        change_form,
    ),
    components(schemas(
        UserResponse,
        UserListResponse,
        CreateUser,
        UpdateUser,
        RegisterUser,
        LoginRequest,
        TokenResponse,
        SocialCompleteRequest,
        SocialResponse,
        EmailClaim,
        AuthContext,
        ListLayout,
        FormLayout,
        Fieldset,
        ModelPermission,
        ErrorResponse,
    )),
    tags(
        (name = AUTH_TAG, description = "Password and federated login"),
        (name = ADMIN_TAG, description = "Ownership-scoped user administration")
    )
)]
pub struct ApiDoc;

type SharedService<R> = Arc<AccountService<R>>;

/// Create the accounts router.
///
/// `/auth/*` is public; `/admin/users/*` requires a bearer token. The social
/// completion route only exists while social login is enabled.
pub fn router<R: UserRepository + 'static>(service: AccountService<R>) -> Router {
    let jwt = service.jwt().clone();
    let social_auth_enabled = service.social_auth_enabled();
    let shared_service = Arc::new(service);

    let mut auth = Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/context", get(auth_context));
    if social_auth_enabled {
        auth = auth.route("/social/complete", post(social_complete));
    }

    let admin = Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/layout", get(list_layout))
        .route("/add/form", get(creation_form))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/{id}/form", get(change_form))
        .route_layer(middleware::from_fn_with_state(jwt, jwt_auth_middleware));

    Router::new()
        .nest("/auth", auth)
        .nest("/admin/users", admin)
        .with_state(shared_service)
}

/// Logs the outcome of an action on the audit target.
fn audit<T>(
    result: &AccountResult<T>,
    actor_id: Option<Uuid>,
    action: &str,
    resource: Option<String>,
    headers: &HeaderMap,
) {
    let (outcome, details) = match result {
        Ok(_) => (AuditOutcome::Success, None),
        Err(AccountError::Forbidden(reason)) => (AuditOutcome::Denied, Some(json!({ "reason": reason }))),
        Err(e) => (AuditOutcome::Failure, Some(json!({ "reason": e.to_string() }))),
    };

    let event = AuditEvent::new(actor_id, action, resource, outcome).with_request(headers);
    match details {
        Some(details) => event.with_details(details).log(),
        None => event.log(),
    }
}

/// Password login
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = AUTH_TAG,
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access token issued", body = TokenResponse),
        (status = 400, description = "Missing credentials", body = ErrorResponse),
        (status = 401, description = "Invalid username or password", body = ErrorResponse)
    )
)]
async fn login<R: UserRepository>(
    State(service): State<SharedService<R>>,
    headers: HeaderMap,
    ValidatedJson(input): ValidatedJson<LoginRequest>,
) -> AccountResult<Json<TokenResponse>> {
    let result = service.authenticate(&input.username, &input.password).await;

    audit(
        &result,
        result.as_ref().ok().map(|t| t.user.id),
        "user.login",
        None,
        &headers,
    );

    Ok(Json(result?))
}

/// First-party sign-up
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = AUTH_TAG,
    request_body = RegisterUser,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Validation failed", body = ErrorResponse)
    )
)]
async fn register<R: UserRepository>(
    State(service): State<SharedService<R>>,
    headers: HeaderMap,
    ValidatedJson(input): ValidatedJson<RegisterUser>,
) -> AccountResult<impl IntoResponse> {
    let user = service.register(input).await?;

    AuditEvent::new(
        Some(user.id),
        "user.register",
        Some(format!("user:{}", user.id)),
        AuditOutcome::Success,
    )
    .with_request(&headers)
    .log();

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Authentication settings for the login page
#[utoipa::path(
    get,
    path = "/auth/context",
    tag = AUTH_TAG,
    responses(
        (status = 200, description = "Authentication settings", body = AuthContext)
    )
)]
async fn auth_context<R: UserRepository>(
    State(service): State<SharedService<R>>,
) -> Json<AuthContext> {
    Json(service.auth_context())
}

/// Complete a federated login for an existing account
#[utoipa::path(
    post,
    path = "/auth/social/complete",
    tag = AUTH_TAG,
    request_body = SocialCompleteRequest,
    responses(
        (status = 200, description = "Access token issued", body = TokenResponse),
        (status = 401, description = "User account does not exist.", body = ErrorResponse)
    )
)]
async fn social_complete<R: UserRepository>(
    State(service): State<SharedService<R>>,
    headers: HeaderMap,
    Json(input): Json<SocialCompleteRequest>,
) -> AccountResult<Json<TokenResponse>> {
    let result = service.social_login(input.response).await;

    audit(
        &result,
        result.as_ref().ok().map(|t| t.user.id),
        "user.social_login",
        None,
        &headers,
    );

    Ok(Json(result?))
}

/// List the users visible to the caller
#[utoipa::path(
    get,
    path = "/admin/users",
    tag = ADMIN_TAG,
    params(UserFilter),
    responses(
        (status = 200, description = "Page of users", body = UserListResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Not an admin member", body = ErrorResponse)
    )
)]
async fn list_users<R: UserRepository>(
    State(service): State<SharedService<R>>,
    Extension(claims): Extension<JwtClaims>,
    Query(filter): Query<UserFilter>,
) -> AccountResult<Json<UserListResponse>> {
    let actor = service.actor_from_claims(&claims).await?;
    let page = service.list_users(&actor, filter).await?;
    Ok(Json(page))
}

/// Create a user owned by the caller
#[utoipa::path(
    post,
    path = "/admin/users",
    tag = ADMIN_TAG,
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Missing add permission", body = ErrorResponse),
        (status = 409, description = "Duplicate username, email or IBAN", body = ErrorResponse)
    )
)]
async fn create_user<R: UserRepository>(
    State(service): State<SharedService<R>>,
    Extension(claims): Extension<JwtClaims>,
    headers: HeaderMap,
    ValidatedJson(input): ValidatedJson<CreateUser>,
) -> AccountResult<impl IntoResponse> {
    let actor = service.actor_from_claims(&claims).await?;
    let result = service.create_user(&actor, input).await;

    audit(
        &result,
        Some(actor.id),
        "user.create",
        result.as_ref().ok().map(|u| format!("user:{}", u.id)),
        &headers,
    );

    Ok((StatusCode::CREATED, Json(UserResponse::from(result?))))
}

/// Columns and filters of the admin list
#[utoipa::path(
    get,
    path = "/admin/users/layout",
    tag = ADMIN_TAG,
    responses(
        (status = 200, description = "List layout", body = ListLayout),
        (status = 403, description = "Not an admin member", body = ErrorResponse)
    )
)]
async fn list_layout<R: UserRepository>(
    State(service): State<SharedService<R>>,
    Extension(claims): Extension<JwtClaims>,
) -> AccountResult<Json<ListLayout>> {
    let actor = service.actor_from_claims(&claims).await?;
    Ok(Json(service.list_layout(&actor).await?))
}

/// Fieldsets of the "add user" form
#[utoipa::path(
    get,
    path = "/admin/users/add/form",
    tag = ADMIN_TAG,
    responses(
        (status = 200, description = "Creation form layout", body = FormLayout),
        (status = 403, description = "Missing add permission", body = ErrorResponse)
    )
)]
async fn creation_form<R: UserRepository>(
    State(service): State<SharedService<R>>,
    Extension(claims): Extension<JwtClaims>,
) -> AccountResult<Json<FormLayout>> {
    let actor = service.actor_from_claims(&claims).await?;
    Ok(Json(service.creation_form(&actor).await?))
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/admin/users/{id}",
    tag = ADMIN_TAG,
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 400, description = "Malformed ID", body = ErrorResponse),
        (status = 403, description = "User belongs to another owner", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
async fn get_user<R: UserRepository>(
    State(service): State<SharedService<R>>,
    Extension(claims): Extension<JwtClaims>,
    UuidPath(id): UuidPath,
) -> AccountResult<Json<UserResponse>> {
    let actor = service.actor_from_claims(&claims).await?;
    let user = service.get_user(&actor, id).await?;
    Ok(Json(user.into()))
}

/// Update a user
#[utoipa::path(
    put,
    path = "/admin/users/{id}",
    tag = ADMIN_TAG,
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "User belongs to another owner", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "Duplicate username, email or IBAN", body = ErrorResponse)
    )
)]
async fn update_user<R: UserRepository>(
    State(service): State<SharedService<R>>,
    Extension(claims): Extension<JwtClaims>,
    headers: HeaderMap,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<UpdateUser>,
) -> AccountResult<Json<UserResponse>> {
    let actor = service.actor_from_claims(&claims).await?;
    let result = service.update_user(&actor, id, input).await;

    audit(&result, Some(actor.id), "user.update", Some(format!("user:{}", id)), &headers);

    Ok(Json(result?.into()))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    tag = ADMIN_TAG,
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "User belongs to another owner", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
async fn delete_user<R: UserRepository>(
    State(service): State<SharedService<R>>,
    Extension(claims): Extension<JwtClaims>,
    headers: HeaderMap,
    UuidPath(id): UuidPath,
) -> AccountResult<StatusCode> {
    let actor = service.actor_from_claims(&claims).await?;
    let result = service.delete_user(&actor, id).await;

    audit(&result, Some(actor.id), "user.delete", Some(format!("user:{}", id)), &headers);

    result?;
    Ok(StatusCode::NO_CONTENT)
}

/// Fieldsets of the change form for a user
#[utoipa::path(
    get,
    path = "/admin/users/{id}/form",
    tag = ADMIN_TAG,
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Change form layout", body = FormLayout),
        (status = 403, description = "User belongs to another owner", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
async fn change_form<R: UserRepository>(
    State(service): State<SharedService<R>>,
    Extension(claims): Extension<JwtClaims>,
    UuidPath(id): UuidPath,
) -> AccountResult<Json<FormLayout>> {
    let actor = service.actor_from_claims(&claims).await?;
    Ok(Json(service.change_form(&actor, id).await?))
}
