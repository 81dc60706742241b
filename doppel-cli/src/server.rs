use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use doppel_core::Fid;
use doppel_game::{DoppelGame, ErrorKind, GameError, PlayerView};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

pub struct Api {
    game: Arc<DoppelGame>,
}

impl Api {
    pub fn new(game: Arc<DoppelGame>) -> Self {
        Self { game }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

        Router::new()
            .route("/api/game", post(join_game).get(game_status))
            .route("/api/bet", post(place_bet))
            .route("/api/payment", post(record_payment))
            .route("/api/cancel-joining", post(cancel_joining))
            .route("/api/resolver", post(resolve_games))
            .route("/api/farcaster-birthday", get(farcaster_birthday))
            .layer(cors)
            .with_state(self.game.clone())
    }
}

/// Serves the API on `port` until ctrl-c, optionally sweeping for due games
/// in the background.
pub async fn serve(
    game: Arc<DoppelGame>,
    port: u16,
    resolve_interval: Option<Duration>,
) -> anyhow::Result<()> {
    use anyhow::Context;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let resolver_task = resolve_interval.map(|period| {
        let resolver = game.resolver();
        tokio::spawn(async move { resolver.run_every(period, shutdown_rx).await })
    });

    let app = Api::new(game).router();
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("axum server error")?;

    let _ = shutdown_tx.send(true);
    if let Some(task) = resolver_task {
        let _ = task.await;
    }
    Ok(())
}

enum ApiError {
    Game(GameError),
    BadRequest(String),
    Unauthorized,
}

impl From<GameError> for ApiError {
    fn from(e: GameError) -> Self {
        ApiError::Game(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let e = match self {
            ApiError::BadRequest(msg) => {
                return (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::Unauthorized => {
                return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" })))
                    .into_response()
            }
            ApiError::Game(e) => e,
        };

        match e.kind() {
            ErrorKind::Validation => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
            }
            ErrorKind::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() }))).into_response()
            }
            ErrorKind::Conflict => {
                let body = match &e {
                    GameError::AlreadyInGame { game, player, .. } => json!({
                        "error": "Player is already in an active game",
                        "game": game,
                        "player": PlayerView::new((**player).clone(), game),
                    }),
                    _ => json!({ "error": e.to_string() }),
                };
                (StatusCode::CONFLICT, Json(body)).into_response()
            }
            ErrorKind::Persistence | ErrorKind::Internal => {
                tracing::error!("Request failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error", "details": e.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

type ApiResult = std::result::Result<Response, ApiError>;

fn parse_player_id(player_id: Option<String>) -> Result<Uuid, ApiError> {
    let player_id = player_id.ok_or(GameError::MissingField("playerId"))?;
    Uuid::parse_str(player_id.trim())
        .map_err(|_| ApiError::BadRequest(format!("Invalid playerId: {}", player_id)))
}

fn success(message: &str) -> Response {
    Json(json!({ "success": true, "message": message })).into_response()
}

#[derive(Debug, Deserialize)]
struct JoinRequest {
    fid: Option<Fid>,
    wallet: Option<String>,
    birthday: Option<String>,
}

async fn join_game(
    State(game): State<Arc<DoppelGame>>,
    body: Result<Json<JoinRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body?;
    let fid = req.fid.ok_or(GameError::MissingField("fid"))?;
    let wallet = req.wallet.ok_or(GameError::MissingField("wallet"))?;

    let (joined, player) = match req.birthday {
        Some(birthday) => game.join(fid, &wallet, &birthday).await?,
        None => game.join_with_oracle(fid, &wallet).await?,
    };

    let player = PlayerView::new(player, &joined);
    Ok(Json(json!({ "success": true, "game": joined, "player": player })).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusParams {
    game_id: Option<Uuid>,
    fid: Option<Fid>,
}

async fn game_status(
    State(game): State<Arc<DoppelGame>>,
    params: Result<Query<StatusParams>, QueryRejection>,
) -> ApiResult {
    let Query(params) = params?;
    if params.game_id.is_none() && params.fid.is_none() {
        return Err(ApiError::BadRequest("Game ID or FID is required".to_string()));
    }
    let report = game.get_status(params.game_id, params.fid).await?;
    Ok(Json(report).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BetRequest {
    player_id: Option<String>,
    bet: Option<String>,
}

async fn place_bet(
    State(game): State<Arc<DoppelGame>>,
    body: Result<Json<BetRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body?;
    let player_id = parse_player_id(req.player_id)?;
    let bet = req.bet.ok_or(GameError::MissingField("bet"))?;
    game.place_bet(player_id, &bet).await?;
    Ok(success("Bet placed successfully"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentRequest {
    player_id: Option<String>,
    transaction_hash: Option<String>,
}

async fn record_payment(
    State(game): State<Arc<DoppelGame>>,
    body: Result<Json<PaymentRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body?;
    let player_id = parse_player_id(req.player_id)?;
    let proof = req
        .transaction_hash
        .ok_or(GameError::MissingField("transactionHash"))?;
    game.record_payment(player_id, &proof).await?;
    Ok(success("Payment recorded successfully"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelRequest {
    player_id: Option<String>,
}

async fn cancel_joining(
    State(game): State<Arc<DoppelGame>>,
    body: Result<Json<CancelRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body?;
    let player_id = parse_player_id(req.player_id)?;
    game.cancel(player_id).await?;
    Ok(success("Player removed from game successfully"))
}

async fn resolve_games(State(game): State<Arc<DoppelGame>>, headers: HeaderMap) -> ApiResult {
    let Some(secret) = game.config().resolver_secret.as_deref() else {
        return Err(ApiError::Unauthorized);
    };
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    if token != Some(secret) {
        return Err(ApiError::Unauthorized);
    }

    let results = game.resolve_due_games().await?;
    Ok(Json(json!({
        "success": true,
        "gamesResolved": results.len(),
        "results": results,
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
struct BirthdayParams {
    fid: Option<Fid>,
}

async fn farcaster_birthday(
    State(game): State<Arc<DoppelGame>>,
    params: Result<Query<BirthdayParams>, QueryRejection>,
) -> ApiResult {
    let Query(params) = params?;
    let fid = params.fid.ok_or(GameError::MissingField("fid"))?;
    let birthday = game.birthday(fid).await?;
    Ok(Json(json!({ "fid": fid, "birthday": birthday })).into_response())
}
