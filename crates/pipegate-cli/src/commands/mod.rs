//! CLI command implementations.

use std::fmt::{self, Write as _};

use anyhow::{Result, anyhow};
use pipegate_config::{GateConfig, load_gate_config};
use pipegate_core::{
    AllowedStates, CallContext, Permission, PermissionClass, Principal, PrincipalKind, RepoFinder,
    RepoRef, RepoState, RepoStatePolicy, Session,
};
use pipegate_db::{PgRepoFinder, create_pool};
use serde::Serialize;
use tracing::info;

pub fn validate(path: &str) -> Result<()> {
    match load_gate_config(path) {
        Ok(config) => {
            println!("Configuration is valid");
            print!("{}", render_policy(&config)?);
            Ok(())
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Arguments of `pipegate check-state`.
pub struct CheckStateRequest {
    pub repo_ref: String,
    pub permission: String,
    pub allow: Vec<String>,
    pub config: Option<String>,
    pub database_url: String,
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct StateReport {
    repository: String,
    state: RepoState,
    permission: Permission,
    allowed: bool,
    reason: Option<String>,
}

pub async fn check_state(request: CheckStateRequest) -> Result<()> {
    let permission: Permission = request.permission.parse().map_err(|e: String| anyhow!(e))?;
    let allowed = parse_allowed(&request.allow)?;
    let config = match &request.config {
        Some(path) => load_gate_config(path)?,
        None => GateConfig::default(),
    };
    let repo_ref = RepoRef::parse(&request.repo_ref)?;

    let ctx = match config.call_timeout {
        Some(timeout) => CallContext::new().with_timeout(timeout),
        None => CallContext::new(),
    };

    info!("Connecting to database...");
    let finder = PgRepoFinder::new(create_pool(&request.database_url).await?);
    let repo = ctx
        .run(finder.find_by_ref(&ctx, &repo_ref))
        .await
        .map_err(|interrupted| anyhow!("lookup of {} interrupted: {:?}", repo_ref, interrupted))??;

    let verdict = config
        .state_policy()
        .check_repo_state(&ctx, &operator_session(), &repo, permission, &allowed)
        .await;

    let report = StateReport {
        repository: repo.path.clone(),
        state: repo.state,
        permission,
        allowed: verdict.is_ok(),
        reason: verdict.err().map(|e| e.to_string()),
    };

    if request.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let Some(reason) = &report.reason {
        println!("DENIED: {}", reason);
    } else {
        println!(
            "ALLOWED: {} on '{}' ({})",
            report.permission, report.repository, report.state
        );
    }

    if !report.allowed {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_allowed(names: &[String]) -> Result<AllowedStates> {
    names
        .iter()
        .map(|name| name.parse::<RepoState>().map_err(|e| anyhow!(e)))
        .collect()
}

/// The state policy ignores the caller, but its contract takes a session.
fn operator_session() -> Session {
    Session::new(Principal {
        id: 0,
        uid: "pipegate-cli".to_string(),
        kind: PrincipalKind::Service,
    })
}

fn render_policy(config: &GateConfig) -> Result<String, fmt::Error> {
    let rules = &config.state_rules;
    let mut out = String::new();

    let timeout = config
        .call_timeout
        .map(|t| format!("{}ms", t.as_millis()))
        .unwrap_or_else(|| "none".to_string());
    let defaults: Vec<String> = rules.default_states().iter().map(|s| s.to_string()).collect();

    writeln!(out, "Call timeout:   {}", timeout)?;
    writeln!(out, "Default states: {}", defaults.join(", "))?;
    writeln!(out, "{:<10} {:<5} {:<5}", "STATE", "READ", "WRITE")?;
    for state in RepoState::ALL {
        let mark = |class| if rules.permits(state, class) { "yes" } else { "no" };
        writeln!(
            out,
            "{:<10} {:<5} {:<5}",
            state.to_string(),
            mark(PermissionClass::Read),
            mark(PermissionClass::Write)
        )?;
    }
    Ok(out)
}
