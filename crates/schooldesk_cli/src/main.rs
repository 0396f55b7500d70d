//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open the configured store and print a deterministic summary.
//! - Surface a generated bootstrap admin secret exactly once.

use schooldesk_core::{
    init_from_config, AcademicRepository, CameraRepository, IdentityRepository, RepoResult,
    SchoolStore, StoreConfig,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = match StoreConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = init_from_config(&config) {
        eprintln!("logging disabled: {err}");
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=cli_run module=cli status=error error={err}");
            eprintln!("store error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &StoreConfig) -> RepoResult<()> {
    let store = SchoolStore::open(config)?;
    println!("schooldesk_core version={}", schooldesk_core::core_version());
    println!("backend={}", store.backend_kind().as_str());
    println!("roles={}", store.list_roles()?.len());
    println!("users={}", store.list_users()?.len());
    println!("classes={}", store.list_classes()?.len());
    println!("students={}", store.list_students()?.len());
    println!("cameras={}", store.list_cameras()?.len());

    if let Some(secret) = store
        .seed_report()
        .and_then(|report| report.generated_admin_secret.as_deref())
    {
        // Printed once; the account must rotate it at first login.
        println!("bootstrap admin secret={secret}");
    }
    store.close()
}
