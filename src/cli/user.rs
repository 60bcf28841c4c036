//! tasklens user command implementations.

use serde::Serialize;

use crate::cli::Globals;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};

#[derive(Serialize)]
struct UserOutput {
    id: i64,
    name: String,
}

pub async fn run_add(globals: &Globals, name: String, password: String) -> Result<()> {
    let app = globals.open_app()?;
    let ctx = globals.context()?;
    let user = app.users().register(&ctx, &name, &password).await?;

    let mut human = HumanOutput::new("User registered");
    human.push_summary("ID", user.id.to_string());
    human.push_summary("Name", user.name.clone());

    let output = UserOutput {
        id: user.id,
        name: user.name,
    };
    emit_success(globals.output(), "user add", &output, Some(&human))
}

pub async fn run_check(globals: &Globals, name: String, password: String) -> Result<()> {
    let app = globals.open_app()?;
    let ctx = globals.context()?;
    let user = app.users().authenticate(&ctx, &name, &password).await?;

    let human = HumanOutput::new(format!("Credentials valid for {}", user.name));
    let output = UserOutput {
        id: user.id,
        name: user.name,
    };
    emit_success(globals.output(), "user check", &output, Some(&human))
}
