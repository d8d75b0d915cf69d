use std::time::Duration;

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, TextEncoder,
};

static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "mentor_messaging_http_requests_total",
            "Total HTTP requests handled by mentor-messaging-service",
        ),
        &["method", "path", "status"],
    )
    .expect("failed to create mentor_messaging_http_requests_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register mentor_messaging_http_requests_total");
    counter
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "mentor_messaging_http_request_duration_seconds",
            "HTTP request latency for mentor-messaging-service",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        &["method", "path", "status"],
    )
    .expect("failed to create mentor_messaging_http_request_duration_seconds");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register mentor_messaging_http_request_duration_seconds");
    histogram
});

static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "mentor_messaging_ws_connections_active",
        "Live real-time connections",
    )
    .expect("failed to create mentor_messaging_ws_connections_active");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register mentor_messaging_ws_connections_active");
    gauge
});

static EVENTS_DELIVERED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "mentor_messaging_events_delivered_total",
            "Real-time events handed to a live connection",
        ),
        &["event_type"],
    )
    .expect("failed to create mentor_messaging_events_delivered_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register mentor_messaging_events_delivered_total");
    counter
});

static EVENTS_DROPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "mentor_messaging_events_dropped_total",
            "Real-time events dropped because a connection was closed or too slow",
        ),
        &["event_type", "reason"],
    )
    .expect("failed to create mentor_messaging_events_dropped_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register mentor_messaging_events_dropped_total");
    counter
});

static MESSAGES_APPENDED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "mentor_messaging_messages_appended_total",
        "Messages committed to the ledger",
    )
    .expect("failed to create mentor_messaging_messages_appended_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register mentor_messaging_messages_appended_total");
    counter
});

static NOTIFICATIONS_RAISED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "mentor_messaging_notifications_raised_total",
            "Notifications persisted, by type",
        ),
        &["notification_type"],
    )
    .expect("failed to create mentor_messaging_notifications_raised_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register mentor_messaging_notifications_raised_total");
    counter
});

pub fn observe_http_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    let status_label = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status_label])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path, &status_label])
        .observe(elapsed.as_secs_f64());
}

pub fn set_ws_connections(count: usize) {
    WS_CONNECTIONS_ACTIVE.set(count as i64);
}

pub fn record_event_delivered(event_type: &str) {
    EVENTS_DELIVERED_TOTAL.with_label_values(&[event_type]).inc();
}

pub fn record_event_dropped(event_type: &str, reason: &str) {
    EVENTS_DROPPED_TOTAL
        .with_label_values(&[event_type, reason])
        .inc();
}

pub fn record_message_appended() {
    MESSAGES_APPENDED_TOTAL.inc();
}

pub fn record_notification_raised(notification_type: &str) {
    NOTIFICATIONS_RAISED_TOTAL
        .with_label_values(&[notification_type])
        .inc();
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::time::Instant;

/// Records count and latency of every HTTP request, labelled by the matched
/// route pattern so ids in paths do not explode label cardinality.
pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let method = req.method().to_string();
        let start = Instant::now();

        Box::pin(async move {
            let result = service.call(req).await;
            let elapsed = start.elapsed();
            match &result {
                Ok(response) => {
                    let path = response
                        .request()
                        .match_pattern()
                        .unwrap_or_else(|| "unmatched".to_string());
                    observe_http_request(&method, &path, response.status().as_u16(), elapsed);
                }
                Err(_) => {
                    observe_http_request(&method, "unmatched", 500, elapsed);
                }
            }
            result
        })
    }
}
