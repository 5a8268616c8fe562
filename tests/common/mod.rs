use std::net::SocketAddr;

use argon2::password_hash::{PasswordHash, PasswordVerifier};
use argon2::Argon2;
use chrono::{Duration, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use passgate::config::Config;

/// A running test server instance with a dedicated test database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: PgPool,
    pub client: Client,
    pub db_name: String,
    database_url: String,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    #[allow(dead_code)]
    pub fn database_url(&self) -> String {
        self.database_url.clone()
    }

    /// Insert a user directly, returning its id.
    pub async fn create_user(&self, email: &str, password: &str) -> Uuid {
        let hash = passgate::auth::password::hash(password).expect("hash failed");
        passgate::db::users::create(&self.pool, email, &hash)
            .await
            .expect("create user failed")
            .id
    }

    /// Issue a reset token for `user_id` that expires in `ttl`; returns the raw token.
    pub async fn issue_reset_token(&self, user_id: Uuid, ttl: Duration) -> String {
        let token = passgate::auth::token::generate();
        passgate::db::password_reset_tokens::create(
            &self.pool,
            user_id,
            &passgate::auth::token::hash(&token),
            Utc::now() + ttl,
        )
        .await
        .expect("create reset token failed");
        token
    }

    /// Call the change-password API with a given forwarded client IP.
    pub async fn change_password(
        &self,
        client_ip: &str,
        token: &str,
        password: &str,
    ) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/api/v1/auth/change-password"))
            .header("x-forwarded-for", client_ip)
            .json(&json!({ "token": token, "password": password }))
            .send()
            .await
            .expect("change-password request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Post the reset form, return (html, status).
    pub async fn submit_reset_form(
        &self,
        client_ip: &str,
        token: &str,
        password: &str,
        confirmation: &str,
    ) -> (String, StatusCode) {
        let resp = self
            .client
            .post(self.url("/reset-password"))
            .header("x-forwarded-for", client_ip)
            .form(&[
                ("token", token),
                ("password", password),
                ("password_confirmation", confirmation),
            ])
            .send()
            .await
            .expect("reset form request failed");
        let status = resp.status();
        (resp.text().await.unwrap_or_default(), status)
    }

    /// Whether `password` matches the user's stored hash.
    pub async fn password_matches(&self, user_id: Uuid, password: &str) -> bool {
        let phc: String = sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .expect("find user failed");
        let parsed = PasswordHash::new(&phc).expect("stored hash is not PHC");
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    #[allow(dead_code)]
    pub async fn create_session(&self, user_id: Uuid) {
        sqlx::query("INSERT INTO sessions (user_id, expires_at) VALUES ($1, $2)")
            .bind(user_id)
            .bind(Utc::now() + Duration::days(1))
            .execute(&self.pool)
            .await
            .expect("create session failed");
    }

    #[allow(dead_code)]
    pub async fn session_count(&self, user_id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .expect("count sessions failed")
    }

    /// Whether the raw reset token could still be redeemed.
    #[allow(dead_code)]
    pub async fn token_usable(&self, raw_token: &str) -> bool {
        sqlx::query_scalar(
            "SELECT NOT used AND expires_at > now() FROM password_reset_tokens
             WHERE token_hash = $1",
        )
        .bind(passgate::auth::token::hash(raw_token))
        .fetch_one(&self.pool)
        .await
        .expect("reset token missing")
    }
}

/// Spawn a test app with a fresh temporary database.
pub async fn spawn_app() -> TestApp {
    let _ = dotenvy::dotenv();

    let base_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");

    // Create a unique test database
    let db_name = format!("passgate_test_{}", Uuid::now_v7().to_string().replace('-', ""));

    // Connect to default postgres DB to create test DB
    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect to postgres for test DB creation");

    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");

    admin_pool.close().await;

    // Connect to test DB and run migrations
    let test_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.clone());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&test_url)
        .await
        .expect("Failed to connect to test database");

    passgate::migrate::apply(&pool, None)
        .await
        .expect("Failed to run migrations on test database");

    let config = Config {
        database_url: test_url.clone(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        base_url: "http://localhost:0".to_string(),
        migrations_dir: None,
        // Loopback is trusted so tests can pick their client IP via X-Forwarded-For
        trusted_proxies: vec!["127.0.0.0/8".parse().unwrap()],
        reset_token_ttl_minutes: 60,
        max_body_size: 65_536,
        log_level: "warn".to_string(),
        smtp: None,
    };

    let (app, _state) = passgate::build_app(pool.clone(), config);

    // Bind to random port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    // Spawn server in background
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        pool,
        client,
        db_name,
        database_url: test_url,
    }
}

/// Drop stale test databases (useful after test crashes).
#[allow(dead_code)]
pub async fn cleanup_stale_test_dbs() {
    let base_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");
    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    if let Ok(admin_pool) = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
    {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT datname FROM pg_database WHERE datname LIKE 'passgate_test_%'",
        )
        .fetch_all(&admin_pool)
        .await
        .unwrap_or_default();

        for db_name in rows {
            let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
                .execute(&admin_pool)
                .await;
        }
        admin_pool.close().await;
    }
}

/// Drop the test database after tests complete.
pub async fn cleanup(app: TestApp) {
    let db_name = app.db_name.clone();
    app.pool.close().await;

    let base_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");
    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect for cleanup");

    let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"))
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;
}
