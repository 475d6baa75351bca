//! Signs in against a live backend and prints what Gatehouse sees.
//!
//! ```text
//! GATEHOUSE_BASE_URL=https://portal.example.com \
//! GATEHOUSE_ACCOUNT=302 GATEHOUSE_PASSWORD=... \
//! RUST_LOG=gatehouse=debug cargo run -p login-probe
//! ```
//!
//! Set `GATEHOUSE_USER_ID` to also open the realtime channel and print
//! the first message it receives.

use std::env;

use gatehouse::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

struct Settings {
    base_url: String,
    account: String,
    password: String,
    user_id: Option<String>,
}

impl Settings {
    fn from_env() -> Result<Self, String> {
        let required = |name: &str| env::var(name).map_err(|_| format!("{name} is not set"));
        Ok(Self {
            base_url: env::var("GATEHOUSE_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            account: required("GATEHOUSE_ACCOUNT")?,
            password: required("GATEHOUSE_PASSWORD")?,
            user_id: env::var("GATEHOUSE_USER_ID").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;
    eprintln!("probing {}", settings.base_url);

    let auth = AuthService::builder()
        .base_url(&settings.base_url)
        .realtime(RealtimeConfig::for_origin(&settings.base_url))
        .build()?;

    let _requests = auth.http().subscribe(Interceptor::new().on_response(|outcome| {
        match outcome {
            Ok(event) => tracing::info!(status = event.status, url = %event.url, "response"),
            Err(e) => tracing::warn!(error = %e, "request failed"),
        }
    }));
    auth.on_token_change(|change| {
        tracing::warn!(old = %change.old, new = %change.new, "session replaced by another client");
    });

    let outcome = match auth
        .login(
            LoginForm::new(&settings.account, &settings.password),
            ClientType::Mobile,
        )
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(code) = e.request_error().and_then(|r| r.code()) {
                eprintln!("login rejected ({code}): {e}");
            } else {
                eprintln!("login failed: {e}");
            }
            return Err(e.into());
        }
    };

    let session = auth.session();
    println!("user:        {}", outcome.grant.user);
    println!("permission:  {}", session.permission_level);
    println!("web allowed: {}", session.permission_level.allows_web());
    if let Some(security) = &outcome.security {
        println!("security:    {security}");
    }

    if let Some(user_id) = settings.user_id {
        let channel = auth.connect_realtime(user_id).await?;
        println!("realtime:    {:?} at {}", channel.state(), channel.endpoint());
        match channel.recv().await? {
            Some(text) => println!("first frame: {text}"),
            None => println!("realtime channel closed by server"),
        }
        channel.close().await?;
    }

    auth.logout();
    Ok(())
}
