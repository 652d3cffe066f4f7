use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    if let Some(err) = err.find::<ApiErrorCode>() {
        let json = warp::reply::json(&ApiResponse::<()>::err(err.clone(), err.to_string()));
        Ok(warp::reply::with_status(json, StatusCode::OK))
    } else if err.find::<reject::MissingHeader>().is_some() {
        let json = warp::reply::json(&ApiResponse::<()>::err(
            ApiErrorCode::InvalidToken,
            "Missing authorization header",
        ));
        Ok(warp::reply::with_status(json, StatusCode::UNAUTHORIZED))
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        let json = warp::reply::json(&ApiResponse::<()>::err(
            ApiErrorCode::InvalidInput,
            e.to_string(),
        ));
        Ok(warp::reply::with_status(json, StatusCode::BAD_REQUEST))
    } else if err.is_not_found() || err.find::<reject::MethodNotAllowed>().is_some() {
        let json = warp::reply::json(&ApiResponse::<()>::err(
            ApiErrorCode::NotFound,
            "No such route",
        ));
        Ok(warp::reply::with_status(json, StatusCode::NOT_FOUND))
    } else {
        let json = warp::reply::json(&ApiResponse::<()>::err(
            ApiErrorCode::InternalError,
            format!("Unhandled error: {:?}", err),
        ));
        Ok(warp::reply::with_status(
            json,
            StatusCode::INTERNAL_SERVER_ERROR,
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Invalid input")]
    InvalidInput,
    #[error("Not found")]
    NotFound,
    #[error("Not signed in")]
    Unauthenticated,
    #[error("Already friends")]
    AlreadyFriends,
    #[error("Friend request already pending")]
    DuplicateRequest,
    #[error("Group members must be friends")]
    NotFriends,
    #[error("User already registered")]
    UserExists,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<FriendshipError> for ApiErrorCode {
    fn from(error: FriendshipError) -> Self {
        match error {
            FriendshipError::InvalidInput(_) => ApiErrorCode::InvalidInput,
            FriendshipError::NotFound => ApiErrorCode::NotFound,
            FriendshipError::Unauthenticated => ApiErrorCode::Unauthenticated,
            FriendshipError::AlreadyFriends => ApiErrorCode::AlreadyFriends,
            FriendshipError::DuplicateRequest => ApiErrorCode::DuplicateRequest,
            FriendshipError::Store(e) => ApiErrorCode::internal(e),
        }
    }
}

impl From<GroupError> for ApiErrorCode {
    fn from(error: GroupError) -> Self {
        match error {
            GroupError::InvalidInput(_) => ApiErrorCode::InvalidInput,
            GroupError::Unauthenticated => ApiErrorCode::Unauthenticated,
            GroupError::NotFriends(_) => ApiErrorCode::NotFriends,
            GroupError::Store(e) => ApiErrorCode::internal(e),
        }
    }
}

impl From<UserError> for ApiErrorCode {
    fn from(error: UserError) -> Self {
        match error {
            UserError::InvalidInput(_) => ApiErrorCode::InvalidInput,
            UserError::UserExists => ApiErrorCode::UserExists,
            e @ UserError::InvitationCodeExhausted(_) => ApiErrorCode::internal(e),
            UserError::Store(e) => ApiErrorCode::internal(e),
        }
    }
}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::TokenInvalid | AuthError::TokenExpired => ApiErrorCode::InvalidToken,
            AuthError::InternalError(e) => ApiErrorCode::internal(e),
        }
    }
}
