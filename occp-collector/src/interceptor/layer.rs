//! Tower middleware surface of the interceptor
//!
//! Wraps any `Service<Request<Body>, Response = Response<Body>>`. The inner
//! service always runs first and its outcome is what the caller gets. For
//! successful responses to matching URLs the body is teed: every frame is
//! forwarded to the caller as soon as it arrives and copied into a side
//! buffer, which goes to inspection once the body ends.
//!
//! The copy is abandoned when the body fails mid-stream, when it grows past
//! [`Interceptor::max_body`], or when the caller stops reading. The caller
//! sees the same frames and the same error in every case.

use super::Interceptor;
use axum::{
    body::{Body, BodyDataStream, Bytes, HttpBody},
    extract::Request,
    response::Response,
};
use futures::future::BoxFuture;
use futures::StreamExt;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::debug;

/// Tower layer installing an [`InterceptService`]
#[derive(Debug, Clone)]
pub struct InterceptLayer {
    interceptor: Interceptor,
}

impl InterceptLayer {
    pub fn new(interceptor: Interceptor) -> Self {
        Self { interceptor }
    }
}

impl<S> Layer<S> for InterceptLayer {
    type Service = InterceptService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InterceptService {
            inner,
            interceptor: self.interceptor.clone(),
        }
    }
}

/// Service observing responses of the wrapped service
#[derive(Debug, Clone)]
pub struct InterceptService<S> {
    inner: S,
    interceptor: Interceptor,
}

impl<S> Service<Request> for InterceptService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let url = request.uri().to_string();
        let interceptor = self.interceptor.clone();

        // The clone that was driven to readiness serves this call
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let response = inner.call(request).await?;

            if !response.status().is_success() || !interceptor.matches(&url) {
                return Ok(response);
            }

            let status = response.status().as_u16();
            let (parts, body) = response.into_parts();
            let tee = BodyTee::new(&body, url, status, interceptor);
            Ok(Response::from_parts(parts, tee.wrap(body)))
        })
    }
}

/// Side copy of one response body on its way to the caller
struct BodyTee {
    copy: Option<Vec<u8>>,
    url: String,
    status: u16,
    interceptor: Interceptor,
}

impl BodyTee {
    fn new(body: &Body, url: String, status: u16, interceptor: Interceptor) -> Self {
        let declared = body.size_hint().lower();
        let copy = if declared > interceptor.max_body() as u64 {
            debug!(url = %url, declared, "Response body over inspection limit, not inspected");
            None
        } else {
            Some(Vec::with_capacity(declared as usize))
        };

        Self {
            copy,
            url,
            status,
            interceptor,
        }
    }

    fn wrap(self, body: Body) -> Body {
        let frames = futures::stream::unfold(
            (body.into_data_stream(), self),
            |(mut stream, mut tee): (BodyDataStream, BodyTee)| async move {
                match stream.next().await {
                    Some(Ok(chunk)) => {
                        tee.record(&chunk);
                        Some((Ok(chunk), (stream, tee)))
                    }
                    Some(Err(e)) => {
                        if tee.copy.take().is_some() {
                            debug!(url = %tee.url, error = %e, "Response body failed mid-stream, not inspected");
                        }
                        Some((Err(e), (stream, tee)))
                    }
                    None => {
                        tee.finish();
                        None
                    }
                }
            },
        );
        Body::from_stream(frames)
    }

    fn record(&mut self, chunk: &Bytes) {
        let Some(copy) = self.copy.as_mut() else {
            return;
        };
        if copy.len() + chunk.len() > self.interceptor.max_body() {
            debug!(
                url = %self.url,
                limit = self.interceptor.max_body(),
                "Response body over inspection limit, not inspected"
            );
            self.copy = None;
            return;
        }
        copy.extend_from_slice(chunk);
    }

    fn finish(&mut self) {
        if let Some(copy) = self.copy.take() {
            self.interceptor
                .observe(&self.url, Some(self.status), Bytes::from(copy));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::bridge_channel;
    use crate::extractor::Extractor;
    use crate::interceptor::UrlMatcher;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use serde_json::json;
    use std::convert::Infallible;
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tower::util::BoxCloneService;
    use tower::ServiceExt;

    fn body_text() -> String {
        json!({"data": {"user": {"result": {"timeline": {"instructions": [{"entries": [
            {"content": {"itemContent": {"tweet_results": {"result": {
                "__typename": "Tweet",
                "rest_id": "55",
                "core": {"user_results": {"result": {"legacy": {"screen_name": "bob"}}}},
                "legacy": {"full_text": "layered"}
            }}}}}
        ]}]}}}}})
        .to_string()
    }

    fn upstream(status: StatusCode, text: String) -> BoxCloneService<Request, Response, Infallible> {
        BoxCloneService::new(tower::service_fn(move |_request: Request| {
            let text = text.clone();
            async move {
                let mut response = Response::new(Body::from(text));
                *response.status_mut() = status;
                Ok::<_, Infallible>(response)
            }
        }))
    }

    /// Upstream answering once with the given body, then with empty bodies
    fn upstream_body(body: Body) -> BoxCloneService<Request, Response, Infallible> {
        let body = Arc::new(Mutex::new(Some(body)));
        BoxCloneService::new(tower::service_fn(move |_request: Request| {
            let body = body.lock().unwrap().take().unwrap_or_default();
            async move { Ok::<_, Infallible>(Response::new(body)) }
        }))
    }

    const TIMELINE_URL: &str = "https://x.com/i/api/graphql/x/HomeTimeline";

    fn request(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_body_returned_identical_and_inspected() {
        let (tx, mut rx) = bridge_channel(4);
        let interceptor = Interceptor::new(UrlMatcher::default(), Extractor::default(), tx);
        let service = interceptor.layer().layer(upstream(StatusCode::OK, body_text()));

        let response = service
            .oneshot(request("https://x.com/i/api/graphql/x/UserTweets"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, Bytes::from(body_text()));

        let batch = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch.tweets[0].id, "55");
    }

    #[tokio::test]
    async fn test_non_matching_url_not_inspected() {
        let (tx, mut rx) = bridge_channel(4);
        let interceptor = Interceptor::new(UrlMatcher::default(), Extractor::default(), tx);
        let service = interceptor.layer().layer(upstream(StatusCode::OK, body_text()));

        let response = service.oneshot(request("https://x.com/i/api/1.1/jot/client_event")).await.unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, Bytes::from(body_text()));

        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_error_status_passed_through_uninspected() {
        let (tx, mut rx) = bridge_channel(4);
        let interceptor = Interceptor::new(UrlMatcher::default(), Extractor::default(), tx);
        let service = interceptor
            .layer()
            .layer(upstream(StatusCode::TOO_MANY_REQUESTS, "slow down".to_string()));

        let response = service.oneshot(request("https://x.com/i/api/graphql/x/HomeTimeline")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_mid_stream_error_keeps_prefix() {
        let (tx, mut rx) = bridge_channel(4);
        let interceptor = Interceptor::new(UrlMatcher::default(), Extractor::default(), tx);
        let chunks: Vec<Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(b"{\"data\":")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ];
        let service = interceptor
            .layer()
            .layer(upstream_body(Body::from_stream(futures::stream::iter(chunks))));

        let response = service.oneshot(request(TIMELINE_URL)).await.unwrap();
        let mut body = response.into_body();

        let first = body.frame().await.unwrap().unwrap();
        assert_eq!(first.into_data().unwrap(), Bytes::from_static(b"{\"data\":"));
        assert!(body.frame().await.unwrap().is_err());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_frames_forwarded_before_body_ends() {
        let (tx, mut rx) = bridge_channel(4);
        let interceptor = Interceptor::new(UrlMatcher::default(), Extractor::default(), tx);
        let (chunk_tx, chunk_rx) = futures::channel::mpsc::unbounded::<Result<Bytes, io::Error>>();
        let service = interceptor
            .layer()
            .layer(upstream_body(Body::from_stream(chunk_rx)));

        let text = body_text();
        let (head, tail) = text.split_at(text.len() / 2);
        chunk_tx.unbounded_send(Ok(Bytes::from(head.to_string()))).unwrap();

        let response = service.oneshot(request(TIMELINE_URL)).await.unwrap();
        let mut body = response.into_body();

        // Upstream is still open; the first half must already be readable
        let first = tokio::time::timeout(Duration::from_secs(1), body.frame())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(first.into_data().unwrap(), Bytes::from(head.to_string()));

        chunk_tx.unbounded_send(Ok(Bytes::from(tail.to_string()))).unwrap();
        drop(chunk_tx);
        let rest = body.collect().await.unwrap().to_bytes();
        assert_eq!(rest, Bytes::from(tail.to_string()));

        let batch = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch.tweets[0].id, "55");
    }

    #[tokio::test]
    async fn test_body_over_limit_delivered_uninspected() {
        let (tx, mut rx) = bridge_channel(4);
        let interceptor =
            Interceptor::new(UrlMatcher::default(), Extractor::default(), tx).with_max_body(64);
        let service = interceptor.layer().layer(upstream(StatusCode::OK, body_text()));

        let response = service.oneshot(request(TIMELINE_URL)).await.unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, Bytes::from(body_text()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_streamed_body_over_limit_delivered_uninspected() {
        let (tx, mut rx) = bridge_channel(4);
        let interceptor =
            Interceptor::new(UrlMatcher::default(), Extractor::default(), tx).with_max_body(64);
        let text = body_text();
        let chunks: Vec<Result<Bytes, io::Error>> = text
            .as_bytes()
            .chunks(40)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        let service = interceptor
            .layer()
            .layer(upstream_body(Body::from_stream(futures::stream::iter(chunks))));

        let response = service.oneshot(request(TIMELINE_URL)).await.unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, Bytes::from(text));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }
}
