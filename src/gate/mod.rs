// src/gate/mod.rs

#[cfg(test)]
mod tests;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use chrono::Utc;
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service};
use tracing::warn;

use crate::policy::{KeyStrategy, Policy, PolicyKind};
use crate::store::{CounterStore, WindowSlot};

/// Authenticated principal, inserted into request extensions by the
/// authentication middleware upstream of the gate
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: String,
}

/// Applies one named policy in front of a route.
///
/// The gate derives the requester key, performs an atomic
/// increment-and-check against the store, and either forwards the request
/// or rejects it with a 429 and the policy's message. Rate-limit headers
/// are stamped on allowed and rejected responses alike.
#[derive(Clone)]
pub struct RateGateLayer {
    policy: &'static Policy,
    store: Arc<dyn CounterStore>,
}

impl RateGateLayer {
    pub fn new(kind: PolicyKind, store: Arc<dyn CounterStore>) -> Self {
        Self {
            policy: kind.policy(),
            store,
        }
    }
}

impl<S> Layer<S> for RateGateLayer {
    type Service = RateGateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateGateService {
            inner,
            policy: self.policy,
            store: Arc::clone(&self.store),
        }
    }
}

#[derive(Clone)]
pub struct RateGateService<S> {
    inner: S,
    policy: &'static Policy,
    store: Arc<dyn CounterStore>,
}

impl<S> Service<Request> for RateGateService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let policy = self.policy;
        let store = Arc::clone(&self.store);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let derived = derive_key(&request, policy.key_strategy);
            let storage_key = policy.storage_key(&derived);

            let slot = match store.hit(&storage_key, policy.window).await {
                Ok(slot) => slot,
                Err(err) => {
                    // Enforcement failures never fail the request
                    warn!(
                        policy = policy.name,
                        key = %derived,
                        error = %err,
                        "rate limit check failed, allowing request"
                    );
                    return inner.call(request).await;
                }
            };

            if slot.count > policy.max_requests {
                warn!(
                    policy = policy.name,
                    key = %derived,
                    count = slot.count,
                    limit = policy.max_requests,
                    "rate limit exceeded"
                );
                return Ok(reject(policy, &slot));
            }

            let mut response = inner.call(request).await?;

            // The increment already happened; policies that exclude an
            // outcome from the quota undo it after the fact
            let refund = (policy.skip_successful && response.status().is_success())
                || (policy.skip_failed && !response.status().is_success());
            if refund {
                if let Err(err) = store.refund(&storage_key).await {
                    warn!(policy = policy.name, key = %derived, error = %err, "refund failed");
                }
            }

            // A refunded request does not consume budget, so the headers
            // report the post-refund count
            let counted = if refund {
                slot.count.saturating_sub(1)
            } else {
                slot.count
            };
            let remaining = policy.max_requests.saturating_sub(counted);
            apply_headers(response.headers_mut(), policy, &slot, remaining);
            Ok(response)
        })
    }
}

fn reject(policy: &Policy, slot: &WindowSlot) -> Response {
    let body = json!({ "success": false, "message": policy.message }).to_string();

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    apply_headers(response.headers_mut(), policy, slot, 0);
    response
}

fn apply_headers(headers: &mut HeaderMap, policy: &Policy, slot: &WindowSlot, remaining: u64) {
    headers.insert("X-RateLimit-Limit", number_header(policy.max_requests));
    headers.insert("X-RateLimit-Remaining", number_header(remaining));
    headers.insert(
        "X-RateLimit-Reset",
        number_header(reset_timestamp(slot.reset_after)),
    );
}

/// Unix timestamp at which the current window resets
fn reset_timestamp(reset_after: Duration) -> u64 {
    Utc::now().timestamp().max(0) as u64 + reset_after.as_secs()
}

// Numeric strings are always valid header values
fn number_header(n: u64) -> HeaderValue {
    HeaderValue::from_str(&n.to_string()).unwrap_or_else(|_| HeaderValue::from_static("0"))
}

/// Derive the identity string the quota is tracked against. Exactly one
/// identity source is used per request: the authenticated principal when the
/// strategy allows it and the request carries one, the client IP otherwise.
pub(crate) fn derive_key(request: &Request, strategy: KeyStrategy) -> String {
    if strategy == KeyStrategy::UserOrIp {
        if let Some(user) = request.extensions().get::<AuthenticatedUser>() {
            return format!("user:{}", user.id);
        }
    }
    format!("ip:{}", client_ip(request))
}

fn client_ip(request: &Request) -> String {
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(ip) = value.split(',').next() {
                let ip = ip.trim();
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }
    }

    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            return value.to_string();
        }
    }

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}
