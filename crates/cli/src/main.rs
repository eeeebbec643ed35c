mod args;

use anyhow::Context;
use clap::Parser;

use args::{Cli, Command, TokenCommand};
use bookshelf_app::Application;
use bookshelf_authz::{CredentialVerifier, Subject, TokenAuthority};
use bookshelf_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli).context("failed to load bookshelf settings")?;
    bookshelf_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Serve => bookshelf_app::run(settings).await,
        Command::Migrate => {
            let app = Application::build(settings).await?;
            let applied = app.migrate().await?;
            app.stop().await?;
            println!("applied {applied} migration(s)");
            Ok(())
        }
        Command::Openapi => {
            let app = Application::build(settings).await?;
            let document = bookshelf_http::router::merged_openapi(app.registry());
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(())
        }
        Command::Token { action } => token(&settings, action),
    }
}

/// Flags override `BOOKSHELF_CONFIG_DIR` and `BOOKSHELF_ENV`.
fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    match (&cli.config_dir, &cli.env) {
        (None, None) => Settings::load(),
        (dir, env) => {
            let dir = dir.clone().unwrap_or_else(|| "config".into());
            Settings::load_from(&dir, env.as_deref().unwrap_or("local"))
        }
    }
}

fn token(settings: &Settings, action: TokenCommand) -> anyhow::Result<()> {
    let authority = TokenAuthority::from_settings(&settings.auth);
    match action {
        TokenCommand::Issue { sub, name, level } => {
            let issued = authority.issue(Subject { sub, name, level })?;
            println!("{}", issued.token);
        }
        TokenCommand::Verify { token } => {
            let claims = authority.verify(&token)?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
    }
    Ok(())
}
