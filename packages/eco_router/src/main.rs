use std::error::Error;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::serve;
use axum::{Json, Router};
use eco_router::common::config::{
    EngineSettings, RouteRequest, UserRouteConfig,
};
use eco_router::loading::providers::{JsonFileMapProvider, load_road_graph};
use eco_router::routing::structs::RoutePath;
use eco_router::{
    ConfigError, CostModel, DualRouter, RoadGraph, RoutingError,
    TravelContext, VehicleProfile,
};
use serde_json::{Value, json};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct AppState {
    graph: Arc<RoadGraph>,
    router: Arc<DualRouter>,
}

fn error_response(status: StatusCode, message: String) -> Response {
    let json_response = json!({
        "status": "error",
        "message": message
    });

    (status, Json(json_response)).into_response()
}

fn path_json(graph: &RoadGraph, path: &RoutePath) -> Value {
    json!({
        "nodes": path.nodes,
        "coords": graph.coords_for(&path.nodes),
        "edges": path.edges,
        "metrics": path.metrics,
    })
}

async fn get_route(
    State(state): State<AppState>,
    Json(query): Json<UserRouteConfig>,
) -> Response {
    let now = Instant::now();

    let request: RouteRequest = match query.try_into() {
        Ok(request) => request,
        Err(err) => {
            return error_response(StatusCode::BAD_REQUEST, err.to_string());
        }
    };

    let profile = VehicleProfile::resolve(
        &request.vehicle,
        state.router.model().tables(),
    );
    let context = TravelContext::at_hour(request.hour, &profile);

    let (Some(origin), Some(destination)) = (
        state.graph.nearest_node(request.start.y(), request.start.x()),
        state.graph.nearest_node(request.end.y(), request.end.x()),
    ) else {
        return error_response(
            StatusCode::NOT_FOUND,
            "road graph contains no nodes".to_string(),
        );
    };

    // Searches are CPU bound and run off the async workers
    let graph = Arc::clone(&state.graph);
    let router = Arc::clone(&state.router);
    let search = tokio::task::spawn_blocking(move || {
        router.route_with_context(
            &graph,
            origin,
            destination,
            &profile,
            &context,
        )
    })
    .await;

    let result = match search {
        Ok(Ok(result)) => result,
        Ok(Err(err @ RoutingError::NoPathFound { .. })) => {
            warn!(error = %err, "no route available");
            return error_response(StatusCode::NOT_FOUND, err.to_string());
        }
        Ok(Err(err @ RoutingError::UnknownNode { .. })) => {
            return error_response(StatusCode::BAD_REQUEST, err.to_string());
        }
        Err(err) => {
            error!(error = %err, "route search did not complete");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "route search failed".to_string(),
            );
        }
    };

    let elapsed = now.elapsed();
    info!(?elapsed, origin, destination, "route request complete");

    let json_response = json!({
        "status": "success",
        "trivial": result.is_trivial(),
        "strategy": result.strategy,
        "fuel_saved_litres": result.fuel_saved_litres(),
        "extra_distance_m": result.extra_distance_m(),
        "shortest_route": path_json(&state.graph, &result.shortest),
        "eco_route": path_json(&state.graph, &result.eco),
    });

    (StatusCode::OK, Json(json_response)).into_response()
}

async fn health_check() -> impl IntoResponse {
    let json_response = json!({
        "status": "success",
        "message": "eco router is running"
    });

    Json(json_response)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = EngineSettings::from_env()?;
    let tables = settings.load_cost_tables()?;

    let graph_path = settings.graph_path.clone().ok_or(ConfigError::Missing {
        field: "ECO_GRAPH_PATH",
    })?;
    let graph = load_road_graph(
        JsonFileMapProvider::new(graph_path),
        &settings.map_query(),
        None,
        &settings,
    )?;

    let state = AppState {
        graph: Arc::new(graph),
        router: Arc::new(DualRouter::new(CostModel::new(tables))),
    };

    let router = Router::new()
        .route("/healthcheck", get(health_check))
        .route("/route", post(get_route))
        .with_state(state);

    let listener =
        tokio::net::TcpListener::bind(settings.bind_addr.as_str()).await?;
    info!(addr = %settings.bind_addr, "serving eco router API");
    serve(listener, router).await?;

    Ok(())
}
