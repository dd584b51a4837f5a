//! HTTP handlers for the GraphQL endpoint and developer tooling

use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use async_graphql::http::GraphiQLSource;
use async_graphql_actix_web::{GraphQLRequest, GraphQLResponse};

use crate::metrics;
use crate::middleware::AuthenticatedUser;
use crate::schema::AppSchema;

/// Execute a GraphQL request, forwarding the caller identity set by the JWT middleware
pub async fn graphql_handler(
    schema: web::Data<AppSchema>,
    http_req: HttpRequest,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let mut request = req.into_inner();
    metrics::record_graphql_request(metrics::operation_type(
        &request.query,
        request.operation_name.as_deref(),
    ));

    let caller = http_req.extensions().get::<AuthenticatedUser>().copied();
    if let Some(user) = caller {
        request = request.data(user);
    }

    schema.execute(request).await.into()
}

pub async fn health_handler() -> &'static str {
    "ok"
}

/// SDL (Schema Definition Language) endpoint for client code generation
pub async fn schema_handler(schema: web::Data<AppSchema>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain")
        .body(schema.sdl())
}

pub async fn playground_handler() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(GraphiQLSource::build().endpoint("/graphql").finish())
}

/// Register the GraphQL, SDL, health and metrics routes
pub fn configure(cfg: &mut web::ServiceConfig, playground: bool) {
    cfg.route("/graphql", web::post().to(graphql_handler))
        .route("/graphql/schema", web::get().to(schema_handler))
        .route("/health", web::get().to(health_handler))
        .route("/metrics", web::get().to(metrics::metrics_handler));

    if playground {
        cfg.route("/playground", web::get().to(playground_handler));
    }
}
