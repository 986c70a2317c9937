//! Validate command

use std::path::PathBuf;

use clap::Args;

use crate::Result;
use warden_authz::PolicyStore;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Policy file to validate
    pub file: PathBuf,
}

pub fn run(args: ValidateArgs) -> Result<()> {
    PolicyStore::load(&args.file)?;
    println!("policy is valid");
    Ok(())
}
