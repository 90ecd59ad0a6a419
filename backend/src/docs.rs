#![allow(dead_code)] // OpenAPI doc stubs are only referenced by utoipa macros.

use crate::{
    error::ErrorResponse,
    handlers::{accounts::LinkMethodResponse, auth::LinkConfirmResponse},
    identity::oauth::AuthorizationRequest,
    models::{
        account::{
            AccountResponse, ChangePasswordRequest, LinkConfirmPayload, LoginRequest,
            LoginResponse, OAuthCallbackPayload, RegisterPayload, SetPasswordPayload,
        },
        book::{BookQuery, BookResponse, CreateBookPayload, UpdateBookPayload},
        opinion::{CreateOpinionPayload, OpinionEvent, OpinionResponse, UpdateOpinionPayload},
        password_reset::{
            MessageResponse, RequestPasswordResetPayload, ResetPasswordPayload,
            VerifyResetResponse,
        },
        session_record::{
            SessionFilter, SessionRecordResponse, SessionSort, SessionSortKey, SessionStatus,
            SessionSummary, SortDirection,
        },
        sign_in_method::SignInMethod,
        PaginationQuery,
    },
    services::{linking::LinkOffer, session_export::SessionExport},
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        register_doc,
        login_doc,
        oauth_url_doc,
        oauth_sign_in_doc,
        link_confirm_doc,
        logout_doc,
        change_password_doc,
        request_reset_doc,
        verify_reset_doc,
        reset_password_doc,
        me_doc,
        link_provider_doc,
        set_password_doc,
        unlink_method_doc,
        unload_doc,
        list_books_doc,
        get_book_doc,
        create_book_doc,
        update_book_doc,
        delete_book_doc,
        list_opinions_doc,
        get_opinion_doc,
        create_opinion_doc,
        update_opinion_doc,
        delete_opinion_doc,
        stream_opinions_doc,
        admin_list_sessions_doc,
        admin_session_summary_doc,
        admin_export_sessions_doc,
        admin_account_sessions_doc
    ),
    components(
        schemas(
            ErrorResponse,
            // auth
            RegisterPayload,
            LoginRequest,
            LoginResponse,
            AccountResponse,
            SignInMethod,
            AuthorizationRequest,
            OAuthCallbackPayload,
            LinkConfirmPayload,
            LinkConfirmResponse,
            LinkOffer,
            LinkMethodResponse,
            SetPasswordPayload,
            ChangePasswordRequest,
            RequestPasswordResetPayload,
            ResetPasswordPayload,
            VerifyResetResponse,
            MessageResponse,
            // books & opinions
            PaginationQuery,
            BookQuery,
            BookResponse,
            CreateBookPayload,
            UpdateBookPayload,
            OpinionResponse,
            CreateOpinionPayload,
            UpdateOpinionPayload,
            OpinionEvent,
            // session log
            SessionFilter,
            SessionSort,
            SessionSortKey,
            SortDirection,
            SessionStatus,
            SessionRecordResponse,
            SessionSummary,
            SessionExport
        )
    ),
    modifiers(&SecuritySchemes),
    tags(
        (name = "Auth", description = "Sign-in, registration and account linking"),
        (name = "Accounts", description = "Linked sign-in methods of the current account"),
        (name = "Books", description = "Book listings"),
        (name = "Opinions", description = "Reader opinions and their live feed"),
        (name = "Admin", description = "Session log for administrators")
    ),
    security(("BearerAuth" = []))
)]
pub struct ApiDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();

        let mut bearer = Http::new(HttpAuthScheme::Bearer);
        bearer.bearer_format = Some("JWT".to_string());

        components.add_security_scheme("BearerAuth", SecurityScheme::Http(bearer));
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterPayload,
    responses(
        (status = 201, description = "Account created and signed in", body = LoginResponse),
        (status = 409, description = "Email already used; `LINK_REQUIRED` carries a pending token", body = ErrorResponse)
    ),
    tag = "Auth",
    security(())
)]
fn register_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many attempts")
    ),
    tag = "Auth",
    security(())
)]
fn login_doc() {}

#[utoipa::path(
    get,
    path = "/api/auth/oauth/{provider}/url",
    params(("provider" = String, Path, description = "google, facebook or github")),
    responses((status = 200, body = AuthorizationRequest)),
    tag = "Auth",
    security(())
)]
fn oauth_url_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/oauth/{provider}/sign-in",
    params(("provider" = String, Path, description = "google, facebook or github")),
    request_body = OAuthCallbackPayload,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 409, description = "`LINK_REQUIRED`: confirm with the existing provider", body = ErrorResponse)
    ),
    tag = "Auth",
    security(())
)]
fn oauth_sign_in_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/link/confirm",
    request_body = LinkConfirmPayload,
    responses(
        (status = 200, body = LinkConfirmResponse),
        (status = 400, description = "Declined, expired or mismatched")
    ),
    tag = "Auth",
    security(())
)]
fn link_confirm_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, body = MessageResponse)),
    tag = "Auth"
)]
fn logout_doc() {}

#[utoipa::path(
    put,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses((status = 200, body = MessageResponse)),
    tag = "Auth"
)]
fn change_password_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/password-reset",
    request_body = RequestPasswordResetPayload,
    responses((status = 200, body = MessageResponse)),
    tag = "Auth",
    security(())
)]
fn request_reset_doc() {}

#[utoipa::path(
    get,
    path = "/api/auth/password-reset/{token}",
    params(("token" = String, Path, description = "Token from the reset email")),
    responses((status = 200, body = VerifyResetResponse)),
    tag = "Auth",
    security(())
)]
fn verify_reset_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/password-reset/confirm",
    request_body = ResetPasswordPayload,
    responses((status = 200, body = MessageResponse)),
    tag = "Auth",
    security(())
)]
fn reset_password_doc() {}

#[utoipa::path(
    get,
    path = "/api/accounts/me",
    responses((status = 200, body = AccountResponse)),
    tag = "Accounts"
)]
fn me_doc() {}

#[utoipa::path(
    post,
    path = "/api/accounts/me/methods/{method}",
    params(("method" = String, Path, description = "google, facebook or github")),
    request_body = OAuthCallbackPayload,
    responses(
        (status = 200, body = LinkMethodResponse),
        (status = 409, description = "Provider identity belongs to another account", body = ErrorResponse)
    ),
    tag = "Accounts"
)]
fn link_provider_doc() {}

#[utoipa::path(
    post,
    path = "/api/accounts/me/methods/password",
    request_body = SetPasswordPayload,
    responses((status = 200, body = LinkMethodResponse)),
    tag = "Accounts"
)]
fn set_password_doc() {}

#[utoipa::path(
    delete,
    path = "/api/accounts/me/methods/{method}",
    params(("method" = String, Path, description = "Sign-in method to remove")),
    responses(
        (status = 200, body = AccountResponse),
        (status = 400, description = "Last remaining method or not linked")
    ),
    tag = "Accounts"
)]
fn unlink_method_doc() {}

#[utoipa::path(
    post,
    path = "/api/sessions/unload",
    responses((status = 202, description = "Session close scheduled")),
    tag = "Accounts"
)]
fn unload_doc() {}

#[utoipa::path(
    get,
    path = "/api/books",
    params(BookQuery, PaginationQuery),
    responses((status = 200, body = serde_json::Value)),
    tag = "Books",
    security(())
)]
fn list_books_doc() {}

#[utoipa::path(
    get,
    path = "/api/books/{id}",
    params(("id" = String, Path, description = "Book ID")),
    responses((status = 200, body = BookResponse)),
    tag = "Books",
    security(())
)]
fn get_book_doc() {}

#[utoipa::path(
    post,
    path = "/api/books",
    request_body = CreateBookPayload,
    responses((status = 201, body = BookResponse)),
    tag = "Books"
)]
fn create_book_doc() {}

#[utoipa::path(
    put,
    path = "/api/books/{id}",
    params(("id" = String, Path, description = "Book ID")),
    request_body = UpdateBookPayload,
    responses((status = 200, body = BookResponse)),
    tag = "Books"
)]
fn update_book_doc() {}

#[utoipa::path(
    delete,
    path = "/api/books/{id}",
    params(("id" = String, Path, description = "Book ID")),
    responses((status = 204)),
    tag = "Books"
)]
fn delete_book_doc() {}

#[utoipa::path(
    get,
    path = "/api/opinions",
    params(PaginationQuery),
    responses((status = 200, body = serde_json::Value)),
    tag = "Opinions",
    security(())
)]
fn list_opinions_doc() {}

#[utoipa::path(
    get,
    path = "/api/opinions/{id}",
    params(("id" = String, Path, description = "Opinion ID")),
    responses((status = 200, body = OpinionResponse)),
    tag = "Opinions",
    security(())
)]
fn get_opinion_doc() {}

#[utoipa::path(
    post,
    path = "/api/opinions",
    request_body = CreateOpinionPayload,
    responses((status = 201, body = OpinionResponse)),
    tag = "Opinions"
)]
fn create_opinion_doc() {}

#[utoipa::path(
    put,
    path = "/api/opinions/{id}",
    params(("id" = String, Path, description = "Opinion ID")),
    request_body = UpdateOpinionPayload,
    responses((status = 200, body = OpinionResponse)),
    tag = "Opinions"
)]
fn update_opinion_doc() {}

#[utoipa::path(
    delete,
    path = "/api/opinions/{id}",
    params(("id" = String, Path, description = "Opinion ID")),
    responses((status = 204)),
    tag = "Opinions"
)]
fn delete_opinion_doc() {}

#[utoipa::path(
    get,
    path = "/api/opinions/stream",
    responses((status = 200, description = "text/event-stream of OpinionEvent", body = OpinionEvent)),
    tag = "Opinions",
    security(())
)]
fn stream_opinions_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/sessions",
    params(SessionFilter, SessionSort),
    responses((status = 200, body = [SessionRecordResponse])),
    tag = "Admin"
)]
fn admin_list_sessions_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/sessions/summary",
    params(SessionFilter),
    responses((status = 200, body = SessionSummary)),
    tag = "Admin"
)]
fn admin_session_summary_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/sessions/export",
    params(SessionFilter, SessionSort),
    responses((status = 200, body = SessionExport)),
    tag = "Admin"
)]
fn admin_export_sessions_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/accounts/{id}/sessions",
    params(("id" = String, Path, description = "Account ID")),
    responses((status = 200, body = [SessionRecordResponse])),
    tag = "Admin"
)]
fn admin_account_sessions_doc() {}
