//! Axum Example for tower-sessions-dynamodb-store
//!
//! This example demonstrates how to use the tower-sessions-dynamodb-store with an Axum application.
//! It shows how to resolve the DynamoDB client, make sure the session table exists, and use
//! sessions to store and retrieve values across requests.
//!
//! # Running the example
//!
//! 1. Start DynamoDB Local (or point the example at a real account):
//!    ```bash
//!    docker run -p 8000:8000 amazon/dynamodb-local
//!    ```
//! 2. Configure the client through the environment (a `.env` file works too):
//!    ```bash
//!    export AWS_DYNAMO_ENDPOINT=http://localhost:8000
//!    export AWS_DEFAULT_REGION=local
//!    export AWS_ACCESS_KEY_ID=local
//!    export AWS_SECRET_ACCESS_KEY=local
//!    ```
//! 3. Run the example:
//!    ```bash
//!    cargo run --example axum_example
//!    ```
//! 4. The server will start on http://127.0.0.1:3000
//!
//! # Testing the example
//!
//! Once the server is running, you can test it with curl:
//!
//! ```bash
//! # Set a session value
//! curl -v -c cookies.txt -X POST "http://127.0.0.1:3000/set?name=username&value=john_doe"
//!
//! # Get the session value
//! curl -v -b cookies.txt "http://127.0.0.1:3000/get?name=username"
//!
//! # Clear the session
//! curl -v -b cookies.txt -c cookies.txt -X POST http://127.0.0.1:3000/clear
//! ```

use axum::{
    extract::Query,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Router,
};
use dotenvy::dotenv;
use serde::Deserialize;
use std::{env, net::SocketAddr, time::Duration};
use time::Duration as TimeDuration;
use tower_sessions::{Expiry, Session, SessionManagerLayer};
use tower_sessions_dynamodb_store::{DynamoDbStore, ExpiredDeletion, StoreOptions};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for better logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    // Load environment variables from .env file if present
    dotenv().ok();

    let table_name = env::var("SESSION_TABLE").unwrap_or_else(|_| "example-sessions".to_string());
    info!("Using session table: {}", table_name);

    // Keep expired sessions around and clean them up in the background
    let options = StoreOptions::default()
        .with_table_name(table_name)
        .with_keep_expired(true)
        .with_touch_interval(Duration::from_secs(60));

    // Resolves the client from the environment and creates the table if needed
    let store = DynamoDbStore::connect(options).await?;

    info!("Session table ready");

    let cleanup_store = store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60 * 60));
        loop {
            interval.tick().await;
            if let Err(e) = cleanup_store.delete_expired().await {
                warn!("Failed to delete expired sessions: {}", e);
            }
        }
    });

    // Session expiry - sessions will expire after 24 hours of inactivity
    let session_expiry = Expiry::OnInactivity(TimeDuration::hours(24));

    // Create the session layer with our store and configuration
    let session_layer = SessionManagerLayer::new(store)
        .with_secure(false) // Allow non-HTTPS for development
        .with_expiry(session_expiry);

    // Set up routes with middleware
    let app = Router::new()
        .route("/", get(index))
        .route("/set", post(set_session_value))
        .route("/get", get(get_session_value))
        .route("/clear", post(clear_session))
        .layer(session_layer);

    // Run the server
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!("Server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

// Route handlers

#[derive(Deserialize)]
struct SetQuery {
    name: String,
    value: String,
}

#[derive(Deserialize)]
struct GetQuery {
    name: String,
}

const VISITS_KEY: &str = "visits";

/// Index route that counts visits and lists the available routes
async fn index(session: Session) -> impl IntoResponse {
    let visits = session.get::<u64>(VISITS_KEY).await.ok().flatten().unwrap_or(0) + 1;
    if let Err(e) = session.insert(VISITS_KEY, visits).await {
        warn!("Failed to record visit: {}", e);
    }

    Html(format!(
        r#"
        <html>
            <head><title>Tower Sessions DynamoDB Example</title></head>
            <body>
                <h1>Tower Sessions DynamoDB Example</h1>
                <p>You have visited this page {visits} time(s) in this session.</p>
                <ul>
                    <li><code>POST /set?name=key&value=some_value</code> - Set a session value</li>
                    <li><code>GET /get?name=key</code> - Get a session value</li>
                    <li><code>POST /clear</code> - Clear the session</li>
                </ul>
            </body>
        </html>
        "#
    ))
}

/// Example: POST /set?name=username&value=john_doe
async fn set_session_value(session: Session, Query(query): Query<SetQuery>) -> impl IntoResponse {
    match session.insert(&query.name, &query.value).await {
        Ok(()) => (
            StatusCode::OK,
            format!("Stored '{}' = '{}'", query.name, query.value),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to set session value: {}", e),
        ),
    }
}

/// Example: GET /get?name=username
async fn get_session_value(session: Session, Query(query): Query<GetQuery>) -> impl IntoResponse {
    match session.get::<String>(&query.name).await {
        Ok(Some(value)) => (StatusCode::OK, format!("'{}' = '{}'", query.name, value)),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            format!("No session value found for '{}'", query.name),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to get session value: {}", e),
        ),
    }
}

/// Deletes the session record and invalidates the cookie
async fn clear_session(session: Session) -> impl IntoResponse {
    match session.flush().await {
        Ok(()) => (StatusCode::OK, "Session cleared".to_string()),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to clear session: {}", e),
        ),
    }
}
