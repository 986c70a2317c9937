//! Explain command - run one evaluation and print the decision with its trace

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use crate::Result;
use warden_authz::{AccessRequest, PolicyEngine, PolicyStore};

#[derive(Args, Debug)]
pub struct ExplainArgs {
    /// Subject requesting access
    #[arg(long)]
    pub subject: String,

    /// Action on the resource
    #[arg(long)]
    pub action: String,

    /// Resource being accessed
    #[arg(long)]
    pub resource: String,

    /// Tenant to evaluate in
    #[arg(long, default_value = "default")]
    pub tenant: String,

    /// Policy file to load
    #[arg(long, env = "POLICY_FILE", default_value = "configs/policies.yaml")]
    pub file: PathBuf,
}

pub async fn run(args: ExplainArgs) -> Result<()> {
    let store = Arc::new(PolicyStore::load(&args.file)?);
    let engine = PolicyEngine::new(store);

    let mut request = AccessRequest {
        subject: args.subject,
        resource: args.resource,
        action: args.action,
        ..Default::default()
    };
    request
        .environment
        .insert("tenantID".to_string(), args.tenant);

    let decision = engine.evaluate(&request).await;

    println!("Policy ID: {}", decision.policy_id.unwrap_or_default());
    println!("Reason: {}", decision.reason);
    if !decision.trace.is_empty() {
        println!("Trace:");
        for line in &decision.trace {
            println!(" - {line}");
        }
    }
    Ok(())
}
