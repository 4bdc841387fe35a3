//! Provider health check before a run
//!
//! Every provider is pinged with a trivial prompt, then the cast is resolved
//! against the registry to show who would run where.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{BackendRegistry, BrainMode, Invocation, ProviderKind};
use crate::persona::{Cast, Persona};

const PING_DIRECTIVE: &str = "You are a health-check responder. Reply with exactly: OK";
const PING_INSTRUCTION: &str = "Respond with the single word OK.";
const PING_MAX_TOKENS: u32 = 16;
const DETAIL_LIMIT: usize = 120;
/// OpenRouter free-tier models are often cold; failed pings are retried
const OPENROUTER_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Ok,
    /// Reachable but replied with nothing
    Warn,
    Fail,
    /// No API key configured
    Skip,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Warn => "WARN",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Skip => "SKIP",
        };
        f.pad(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderCheck {
    pub provider: ProviderKind,
    pub status: CheckStatus,
    pub latency_ms: Option<u64>,
    pub detail: String,
}

/// Where one cast member would run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CastCheck {
    pub role: &'static str,
    pub persona: String,
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    /// False when the persona fell back from its preferred provider
    pub native: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PreflightOutcome {
    AllClear,
    PassWithWarnings(Vec<String>),
    Blocked(Vec<String>),
}

impl PreflightOutcome {
    pub fn is_blocked(&self) -> bool {
        matches!(self, PreflightOutcome::Blocked(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    pub providers: Vec<ProviderCheck>,
    pub cast: Vec<CastCheck>,
    /// None when a debater or the stress tester has no provider
    pub mode: Option<BrainMode>,
    pub outcome: PreflightOutcome,
}

impl PreflightReport {
    pub fn status_of(&self, provider: ProviderKind) -> Option<CheckStatus> {
        self.providers
            .iter()
            .find(|c| c.provider == provider)
            .map(|c| c.status)
    }
}

/// Ping every provider and resolve the cast
pub async fn check(registry: &BackendRegistry, cast: &Cast, timeout: Duration) -> PreflightReport {
    let mut kinds: Vec<ProviderKind> = ProviderKind::PRIORITY.to_vec();
    let extra: Vec<ProviderKind> = registry
        .available()
        .into_iter()
        .filter(|k| !ProviderKind::PRIORITY.contains(k))
        .collect();
    kinds.extend(extra);

    let mut providers = Vec::with_capacity(kinds.len());
    for kind in kinds {
        providers.push(ping(registry, kind, timeout, RETRY_DELAY).await);
    }

    let members: [(&'static str, &Arc<Persona>); 4] = [
        ("debater A", &cast.debater_a),
        ("debater B", &cast.debater_b),
        ("synthesizer", &cast.synthesizer),
        ("stress tester", &cast.stress_tester),
    ];
    let cast_checks: Vec<CastCheck> = members
        .iter()
        .map(|&(role, persona)| match registry.resolve(persona) {
            Ok(resolved) => CastCheck {
                role,
                persona: persona.name.clone(),
                provider: Some(resolved.kind),
                model: Some(resolved.model),
                native: resolved.native,
            },
            Err(_) => CastCheck {
                role,
                persona: persona.name.clone(),
                provider: None,
                model: None,
                native: false,
            },
        })
        .collect();

    let mode = brain_mode(&cast_checks);
    let outcome = outcome(&providers, &cast_checks);
    info!(
        mode = mode.map(|m| m.label()).unwrap_or("NONE"),
        blocked = outcome.is_blocked(),
        "Preflight complete"
    );

    PreflightReport {
        providers,
        cast: cast_checks,
        mode,
        outcome,
    }
}

async fn ping(
    registry: &BackendRegistry,
    kind: ProviderKind,
    timeout: Duration,
    retry_delay: Duration,
) -> ProviderCheck {
    let Some(backend) = registry.get(kind) else {
        return ProviderCheck {
            provider: kind,
            status: CheckStatus::Skip,
            latency_ms: None,
            detail: format!("no key ({})", kind.env_vars().join(" or ")),
        };
    };

    let persona = Persona::new("preflight", PING_DIRECTIVE);
    let model = registry.model_for(kind);
    let invocation = Invocation {
        persona: &persona,
        instruction: PING_INSTRUCTION,
        model: &model,
        max_output_tokens: PING_MAX_TOKENS,
    };
    let attempts = if kind == ProviderKind::OpenRouter {
        OPENROUTER_ATTEMPTS
    } else {
        1
    };

    let mut attempt = 1;
    loop {
        debug!(provider = %kind, model = %model, attempt, "Pinging provider");
        let started = Instant::now();
        let result = tokio::time::timeout(timeout, backend.invoke(&invocation)).await;
        let latency_ms = Some(started.elapsed().as_millis() as u64);

        let (status, detail) = match result {
            Ok(Ok(reply)) if reply.trim().is_empty() => (CheckStatus::Warn, "empty reply".to_string()),
            Ok(Ok(reply)) => (CheckStatus::Ok, clip(reply.trim())),
            Ok(Err(e)) => (CheckStatus::Fail, clip(&e.to_string())),
            Err(_) => (
                CheckStatus::Fail,
                format!("timed out after {}s", timeout.as_secs()),
            ),
        };

        if status == CheckStatus::Fail && attempt < attempts {
            let delay = retry_delay * attempt;
            info!(provider = %kind, attempt, delay = ?delay, detail = %detail, "Ping failed, retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
            continue;
        }
        if status == CheckStatus::Fail {
            warn!(provider = %kind, attempts = attempt, detail = %detail, "Provider check failed");
        }

        return ProviderCheck {
            provider: kind,
            status,
            latency_ms,
            detail,
        };
    }
}

fn brain_mode(cast: &[CastCheck]) -> Option<BrainMode> {
    let provider = |role: &str| cast.iter().find(|c| c.role == role).and_then(|c| c.provider);
    let providers = [
        provider("debater A")?,
        provider("debater B")?,
        provider("stress tester")?,
    ];
    if providers.contains(&ProviderKind::Simulated) {
        return Some(BrainMode::Simulation);
    }
    let mut distinct = providers.to_vec();
    distinct.sort();
    distinct.dedup();
    Some(match distinct.len() {
        3 => BrainMode::Tri,
        2 => BrainMode::Dual,
        _ => BrainMode::Single,
    })
}

fn outcome(providers: &[ProviderCheck], cast: &[CastCheck]) -> PreflightOutcome {
    let mut blockers = Vec::new();
    let mut warnings = Vec::new();

    for member in cast {
        if member.provider.is_none() {
            blockers.push(format!("{} ({}) has no provider", member.persona, member.role));
        }
    }

    for check in providers {
        let needed = cast.iter().any(|c| c.provider == Some(check.provider));
        match check.status {
            CheckStatus::Fail if needed => {
                blockers.push(format!("{} failed: {}", check.provider, check.detail));
            }
            CheckStatus::Fail => {
                warnings.push(format!("{} failed but is not used by the cast", check.provider));
            }
            CheckStatus::Warn if needed => {
                warnings.push(format!("{} returned an empty reply", check.provider));
            }
            _ => {}
        }
    }

    for member in cast.iter().filter(|c| c.provider.is_some() && !c.native) {
        warnings.push(format!(
            "{} falls back to {}",
            member.persona,
            member.provider.map(|p| p.name()).unwrap_or("none")
        ));
    }

    if !blockers.is_empty() {
        PreflightOutcome::Blocked(blockers)
    } else if !warnings.is_empty() {
        PreflightOutcome::PassWithWarnings(warnings)
    } else {
        PreflightOutcome::AllClear
    }
}

fn clip(text: &str) -> String {
    if text.chars().count() <= DETAIL_LIMIT {
        text.to_string()
    } else {
        let cut: String = text.chars().take(DETAIL_LIMIT).collect();
        format!("{}...", cut)
    }
}
