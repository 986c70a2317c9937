//! `POST /authorize`: evaluate an access request

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use warden_authz::{AccessRequest, Decision};

use crate::error::{Error, Result};
use crate::state::AppState;

/// Request body: a credential identifying the subject plus the access context
#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    /// Verifiable-credential-shaped document; only `credentialSubject` is
    /// consulted here
    pub credential: Credential,
    /// The access being requested
    pub context: RequestContext,
}

/// The credential wrapper
#[derive(Debug, Deserialize)]
pub struct Credential {
    /// Subject document; `id` names the subject, remaining scalar fields
    /// become evaluation facts
    #[serde(rename = "credentialSubject", default)]
    pub credential_subject: Value,
}

/// The access context
#[derive(Debug, Deserialize)]
pub struct RequestContext {
    /// Action on the resource
    pub action: String,
    /// Resource being accessed
    pub resource: String,
    /// Environment facts; `tenantID` selects the tenant
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Caller consent marker, required
    #[serde(default)]
    pub consent: Option<String>,
}

/// Evaluate the request to a Decision.
///
/// Scalar credential-subject attributes merge into the environment facts,
/// with explicit environment entries winning. Missing consent is a 400 whose
/// body names the field.
pub async fn authorize(
    State(state): State<AppState>,
    Json(body): Json<AuthorizeRequest>,
) -> Result<Json<Decision>> {
    let consent = body.context.consent.as_deref().unwrap_or("");
    if consent.is_empty() {
        return Err(Error::BadRequest(
            "missing consent field in context".to_string(),
        ));
    }

    let subject = body
        .credential
        .credential_subject
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::BadRequest("credentialSubject.id is required".to_string()))?
        .to_string();

    let mut environment = subject_facts(&body.credential.credential_subject);
    environment.extend(body.context.environment.clone());

    let request = AccessRequest {
        subject,
        resource: body.context.resource.clone(),
        action: body.context.action.clone(),
        environment,
        consent: Some(consent.to_string()),
    };

    let decision = state.engine.evaluate(&request).await;

    let outcome = if decision.allow { "allow" } else { "deny" };
    metrics::counter!("authz_decisions_total", "decision" => outcome).increment(1);

    Ok(Json(decision))
}

/// Scalar credential-subject attributes, minus `id` and `roles`.
fn subject_facts(subject: &Value) -> BTreeMap<String, String> {
    let mut facts = BTreeMap::new();
    let Some(object) = subject.as_object() else {
        return facts;
    };
    for (key, value) in object {
        if key == "id" || key == "roles" {
            continue;
        }
        let fact = match value {
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            _ => continue,
        };
        facts.insert(key.clone(), fact);
    }
    facts
}
