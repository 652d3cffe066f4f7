use super::error::*;
use crate::application_port::{FriendshipService, GroupService, UserService};
use crate::domain_model::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct UserView {
    uid: UserId,
    display_name: String,
    score: i64,
}

impl From<UserRecord> for UserView {
    fn from(user: UserRecord) -> Self {
        UserView {
            uid: user.uid,
            display_name: user.display_name,
            score: user.score,
        }
    }
}

// region register

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub display_name: String,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    uid: UserId,
    display_name: String,
    invitation_code: InvitationCode,
}

pub async fn register(
    body: RegisterRequest,
    uid: UserId,
    user_service: Arc<dyn UserService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let user = user_service
        .register(uid, &body.display_name)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(RegisterResponse {
        uid: user.uid,
        display_name: user.display_name,
        invitation_code: user.invitation_code,
    })))
}

// endregion

// region friend requests

#[derive(Debug, Deserialize)]
pub struct SendFriendRequestRequest {
    pub invitation_code: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendFriendRequestResponse {
    request_id: FriendRequestId,
}

pub async fn send_friend_request(
    body: SendFriendRequestRequest,
    session: Option<Session>,
    friendship_service: Arc<dyn FriendshipService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let request_id = friendship_service
        .send_friend_request(session.as_ref(), body.invitation_code.as_deref())
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(
        SendFriendRequestResponse { request_id },
    )))
}

pub async fn get_friend_requests(
    session: Option<Session>,
    friendship_service: Arc<dyn FriendshipService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let requests = friendship_service
        .get_friend_requests(session.as_ref())
        .await;
    Ok(warp::reply::json(&ApiResponse::ok(requests)))
}

#[derive(Debug, Deserialize)]
pub struct ResolveFriendRequestRequest {
    pub from: UserId,
}

pub async fn accept_friend_request(
    body: ResolveFriendRequestRequest,
    session: Option<Session>,
    friendship_service: Arc<dyn FriendshipService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let resolution = friendship_service
        .accept_friend_request(session.as_ref(), &body.from)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(resolution)))
}

pub async fn decline_friend_request(
    body: ResolveFriendRequestRequest,
    session: Option<Session>,
    friendship_service: Arc<dyn FriendshipService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let resolution = friendship_service
        .decline_friend_request(session.as_ref(), &body.from)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(resolution)))
}

// endregion

// region friends

pub async fn get_all_friends(
    session: Option<Session>,
    friendship_service: Arc<dyn FriendshipService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let friends: Vec<UserView> = friendship_service
        .get_all_friends(session.as_ref())
        .await
        .into_iter()
        .map(UserView::from)
        .collect();
    Ok(warp::reply::json(&ApiResponse::ok(friends)))
}

#[derive(Debug, Deserialize)]
pub struct UnfriendRequest {
    pub friend: UserId,
}

#[derive(Debug, Serialize)]
struct UnfriendResponse {
    outcome: UnfriendOutcome,
}

pub async fn unfriend(
    body: UnfriendRequest,
    session: Option<Session>,
    friendship_service: Arc<dyn FriendshipService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let outcome = friendship_service
        .unfriend(session.as_ref(), &body.friend)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(UnfriendResponse {
        outcome,
    })))
}

#[derive(Debug, Serialize)]
struct InvitationCodeResponse {
    invitation_code: Option<InvitationCode>,
}

pub async fn get_invitation_code(
    session: Option<Session>,
    friendship_service: Arc<dyn FriendshipService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let invitation_code = friendship_service
        .get_invitation_code(session.as_ref())
        .await;
    Ok(warp::reply::json(&ApiResponse::ok(InvitationCodeResponse {
        invitation_code,
    })))
}

// endregion

// region groups

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub members: Vec<UserId>,
}

#[derive(Debug, Serialize)]
struct CreateGroupResponse {
    group_id: GroupId,
}

pub async fn create_group(
    body: CreateGroupRequest,
    session: Option<Session>,
    group_service: Arc<dyn GroupService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let group_id = group_service
        .create_group(session.as_ref(), &body.name, &body.members)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(CreateGroupResponse {
        group_id,
    })))
}

pub async fn list_groups(
    session: Option<Session>,
    group_service: Arc<dyn GroupService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let groups = group_service.list_groups(session.as_ref()).await;
    Ok(warp::reply::json(&ApiResponse::ok(groups)))
}

// endregion
