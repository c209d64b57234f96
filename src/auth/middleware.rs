use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    web, Error, HttpMessage, ResponseError,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

use super::AuthRejection;
use crate::error::AppError;
use crate::state::AppState;

/// Runs the [`AuthGate`](super::gate::AuthGate) before the wrapped service and
/// stores the resolved [`UserProfile`](crate::models::UserProfile) in the
/// request extensions.
///
/// Rejected requests are answered here with the uniform error body; the
/// wrapped service never sees them.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let state = match req.app_data::<web::Data<AppState>>().cloned() {
                Some(state) => state,
                None => {
                    let err = AppError::InternalServerError("AppState is not registered".into());
                    return Ok(req.into_response(err.error_response()).map_into_right_body());
                }
            };

            // A header that is present but not visible ASCII is a bad token, not a missing one.
            let authorization = req
                .headers()
                .get(header::AUTHORIZATION)
                .map(|value| value.to_str().map(str::to_owned))
                .transpose();
            let authorization = match authorization {
                Ok(authorization) => authorization,
                Err(_) => {
                    log::debug!("request rejected: unreadable authorization header");
                    let err = AppError::from(AuthRejection::Malformed);
                    return Ok(req.into_response(err.error_response()).map_into_right_body());
                }
            };

            match state.gate.authenticate(authorization.as_deref()).await {
                Ok(principal) => {
                    req.extensions_mut().insert(principal);
                    service
                        .call(req)
                        .await
                        .map(ServiceResponse::map_into_left_body)
                }
                Err(rejection) => {
                    let err = AppError::from(rejection);
                    Ok(req.into_response(err.error_response()).map_into_right_body())
                }
            }
        })
    }
}
