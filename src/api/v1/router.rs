use super::error::*;
use super::handler;
use crate::application_port::*;
use crate::domain_model::{Session, UserId};
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{http, reject, Filter};

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let register = warp::post()
        .and(warp::path("register"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with_verification(server.token_verifier.clone()))
        .and(with(server.user_service.clone()))
        .and_then(handler::register);

    let send_friend_request = warp::post()
        .and(warp::path("friend_requests"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with_session(server.clone()))
        .and(with(server.friendship_service.clone()))
        .and_then(handler::send_friend_request);

    let friend_requests = warp::get()
        .and(warp::path("friend_requests"))
        .and(warp::path::end())
        .and(with_session(server.clone()))
        .and(with(server.friendship_service.clone()))
        .and_then(handler::get_friend_requests);

    let accept = warp::post()
        .and(warp::path!("friend_requests" / "accept"))
        .and(warp::body::json())
        .and(with_session(server.clone()))
        .and(with(server.friendship_service.clone()))
        .and_then(handler::accept_friend_request);

    let decline = warp::post()
        .and(warp::path!("friend_requests" / "decline"))
        .and(warp::body::json())
        .and(with_session(server.clone()))
        .and(with(server.friendship_service.clone()))
        .and_then(handler::decline_friend_request);

    let friends = warp::get()
        .and(warp::path("friends"))
        .and(warp::path::end())
        .and(with_session(server.clone()))
        .and(with(server.friendship_service.clone()))
        .and_then(handler::get_all_friends);

    let unfriend = warp::post()
        .and(warp::path("unfriend"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with_session(server.clone()))
        .and(with(server.friendship_service.clone()))
        .and_then(handler::unfriend);

    let invitation_code = warp::get()
        .and(warp::path("invitation_code"))
        .and(warp::path::end())
        .and(with_session(server.clone()))
        .and(with(server.friendship_service.clone()))
        .and_then(handler::get_invitation_code);

    let create_group = warp::post()
        .and(warp::path("groups"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with_session(server.clone()))
        .and(with(server.group_service.clone()))
        .and_then(handler::create_group);

    let groups = warp::get()
        .and(warp::path("groups"))
        .and(warp::path::end())
        .and(with_session(server.clone()))
        .and(with(server.group_service.clone()))
        .and_then(handler::list_groups);

    register
        .or(send_friend_request)
        .or(friend_requests)
        .or(accept)
        .or(decline)
        .or(friends)
        .or(unfriend)
        .or(invitation_code)
        .or(create_group)
        .or(groups)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

async fn verify_bearer(
    token_verifier: &dyn TokenVerifier,
    header: &str,
) -> Result<UserId, warp::Rejection> {
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| reject::custom(ApiErrorCode::InvalidToken))?;
    token_verifier
        .verify_token(token)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)
}

/// Requires a valid bearer token; the user record need not exist yet.
fn with_verification(
    token_verifier: Arc<dyn TokenVerifier>,
) -> impl Filter<Extract = (UserId,), Error = warp::Rejection> + Clone {
    warp::header::<String>(http::header::AUTHORIZATION.as_ref()).and_then(move |header: String| {
        let token_verifier = token_verifier.clone();
        async move { verify_bearer(token_verifier.as_ref(), &header).await }
    })
}

/// No header or an unregistered uid yields `None`; a bad token is rejected.
fn with_session(
    server: Arc<Server>,
) -> impl Filter<Extract = (Option<Session>,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(http::header::AUTHORIZATION.as_ref()).and_then(
        move |header: Option<String>| {
            let server = server.clone();
            async move {
                let Some(header) = header else {
                    return Ok::<_, warp::Rejection>(None);
                };
                let uid = verify_bearer(server.token_verifier.as_ref(), &header).await?;
                server
                    .user_service
                    .load_session(&uid)
                    .await
                    .map_err(ApiErrorCode::from)
                    .map_err(reject::custom)
            }
        },
    )
}
