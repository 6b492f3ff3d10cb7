mod config;
mod http;

use std::{net::SocketAddr, sync::Arc};

use anyhow::{bail, Context};
use api::{
    auth::{issue_token, UserRole},
    schema::{build_schema, AppSchema},
    seed::seed_hr_demo,
};
use clap::{Parser, Subcommand};
use entity::employee;
use migration::{Migrator, MigratorTrait};
use platform_obs::{init_tracing, ObsConfig};
use sea_orm::{ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter};
use tokio::net::TcpListener;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::http::{app_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "hr-suite", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run HTTP server
    Serve {
        #[arg(long, env = "BIND", default_value = "127.0.0.1:8080")]
        bind: String,
    },
    /// Run migrations (up|down|reset)
    Migrate {
        #[arg(long, default_value = "up")]
        action: String,
    },
    /// Seed demo staff, positions and templates
    Seed,
    /// Print GraphQL SDL
    PrintSchema,
    /// Issue a session token for a user
    IssueToken {
        #[arg(long, conflicts_with = "email")]
        user_id: Option<Uuid>,
        /// Look the user up through their employee email
        #[arg(long)]
        email: Option<String>,
        #[arg(long = "role", default_value = "EMPLOYEE")]
        roles: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;
    init_tracing(ObsConfig {
        service_name: "hr-suite",
        env_filter: None,
        format: config.log_format,
        otlp_endpoint: config.otlp_endpoint.clone(),
    })?;

    let cli = Cli::parse();

    if let Cmd::PrintSchema = cli.cmd {
        let AppSchema(schema) = build_schema(
            Arc::new(DatabaseConnection::Disconnected),
            Arc::new(config.company.clone()),
        );
        println!("{}", schema.sdl());
        return Ok(());
    }

    let db = Database::connect(&config.database_url)
        .await
        .with_context(|| format!("connecting to {}", redact(&config.database_url)))?;
    let db = Arc::new(db);

    match cli.cmd {
        Cmd::Migrate { action } => {
            match action.as_str() {
                "up" => Migrator::up(db.as_ref(), None).await?,
                "down" => Migrator::down(db.as_ref(), None).await?,
                "reset" => Migrator::reset(db.as_ref()).await?,
                other => bail!("unknown migrate action {other:?} (use up|down|reset)"),
            }
            info!(%action, "migrations applied");
            Ok(())
        }
        Cmd::Seed => {
            let seeded = seed_hr_demo(db.as_ref()).await?;
            for person in &seeded.employees {
                info!(
                    email = person.email.as_deref().unwrap_or(""),
                    user_id = ?person.user_id,
                    "seeded employee"
                );
            }
            Ok(())
        }
        Cmd::IssueToken {
            user_id,
            email,
            roles,
        } => {
            let user_id = match (user_id, email) {
                (Some(id), _) => id,
                (None, Some(email)) => user_for_email(db.as_ref(), &email).await?,
                (None, None) => bail!("pass --user-id or --email"),
            };
            let roles = roles
                .iter()
                .map(|r| {
                    UserRole::parse(&r.to_uppercase())
                        .with_context(|| format!("unknown role {r:?}"))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            let token = issue_token(user_id, &roles, &config.auth)?;
            println!("{token}");
            Ok(())
        }
        Cmd::Serve { bind } => {
            Migrator::up(db.as_ref(), None).await?;
            let company = Arc::new(config.company.clone());
            let AppSchema(schema) = build_schema(db.clone(), company.clone());
            let state = AppState {
                schema,
                db: db.clone(),
                auth: Arc::new(config.auth.clone()),
                company,
            };
            let app = app_router(state, &config.cors_allowed_origins);

            let addr: SocketAddr = bind.parse().with_context(|| format!("bad bind address {bind}"))?;
            let listener = TcpListener::bind(addr).await?;
            info!("listening on http://{}", addr);
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown_signal())
            .await?;
            Ok(())
        }
        Cmd::PrintSchema => Ok(()),
    }
}

async fn user_for_email(db: &DatabaseConnection, email: &str) -> anyhow::Result<Uuid> {
    let found = employee::Entity::find()
        .filter(employee::Column::Email.eq(email.trim().to_lowercase()))
        .one(db)
        .await?
        .with_context(|| format!("no employee with email {email}"))?;
    found
        .user_id
        .with_context(|| format!("employee {email} has no login"))
}

/// Strips the password from a connection URL before it reaches the logs.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => {
            let creds = &url[scheme + 3..at];
            match creds.split_once(':') {
                Some((user, _)) => format!("{}{user}:***{}", &url[..scheme + 3], &url[at..]),
                None => url.to_string(),
            }
        }
        _ => url.to_string(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_hides_password_only() {
        assert_eq!(
            redact("postgres://hr:secret@db:5432/hr"),
            "postgres://hr:***@db:5432/hr"
        );
        assert_eq!(redact("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(redact("postgres://db/hr"), "postgres://db/hr");
    }

    #[test]
    fn cli_parses_repeated_roles() {
        let cli = Cli::parse_from([
            "hr-suite",
            "issue-token",
            "--email",
            "a@hr.test",
            "--role",
            "HR",
            "--role",
            "manager",
        ]);
        match cli.cmd {
            Cmd::IssueToken { email, roles, .. } => {
                assert_eq!(email.as_deref(), Some("a@hr.test"));
                assert_eq!(roles, vec!["HR", "manager"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
