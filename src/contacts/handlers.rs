use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::extractors::CurrentUser,
    contacts::dto::{
        ActivityItem, ContactResponse, CreateContactRequest, SearchParams, StatsResponse,
    },
    contacts::repo::{Activity, Contact, NewContact},
    error::ApiError,
    state::AppState,
};

const RECENT_WINDOW_DAYS: i32 = 7;
const RECENT_ACTIVITY_LIMIT: i64 = 5;

pub fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/contacts", post(create_contact))
        .route("/contacts/search", get(search_contacts))
        .route("/contacts/stats", get(get_stats))
}

#[instrument(skip_all)]
pub async fn create_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateContactRequest>,
) -> Result<(StatusCode, Json<ContactResponse>), ApiError> {
    for (field, value) in [
        ("mobile", &payload.mobile),
        ("email", &payload.email),
        ("address", &payload.address),
        ("registration_number", &payload.registration_number),
    ] {
        if value.trim().is_empty() {
            return Err(ApiError::Validation {
                field,
                reason: "Field is required",
            });
        }
    }

    let contact = Contact::create(
        &state.db,
        user.id,
        NewContact {
            mobile: payload.mobile.trim(),
            email: payload.email.trim(),
            address: payload.address.trim(),
            registration_number: payload.registration_number.trim(),
        },
    )
    .await?;

    Activity::record(
        &state.db,
        user.id,
        &format!("Added contact {}", contact.registration_number),
    )
    .await?;

    info!(user_id = %user.id, contact_id = %contact.id, "contact created");
    Ok((StatusCode::CREATED, Json(ContactResponse::from(contact))))
}

#[instrument(skip_all)]
pub async fn search_contacts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<ContactResponse>, ApiError> {
    let registration_number = params
        .registration_number
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::Validation {
            field: "registration_number",
            reason: "Registration number is required",
        })?;

    let contact = Contact::find_by_registration(&state.db, user.id, registration_number)
        .await?
        .ok_or(ApiError::NotFound("Contact not found"))?;

    Ok(Json(ContactResponse::from(contact)))
}

#[instrument(skip_all)]
pub async fn get_stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<StatsResponse>, ApiError> {
    let total_contacts = Contact::count_by_owner(&state.db, user.id).await?;
    let recent_added = Contact::count_recent(&state.db, user.id, RECENT_WINDOW_DAYS).await?;
    let recent_activities = Activity::recent_by_owner(&state.db, user.id, RECENT_ACTIVITY_LIMIT)
        .await?
        .into_iter()
        .map(|a| ActivityItem {
            details: a.details,
            timestamp: a.created_at,
        })
        .collect();

    Ok(Json(StatsResponse {
        total_contacts,
        recent_added,
        recent_activities,
    }))
}
