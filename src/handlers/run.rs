use anyhow::Result;
use crate::cli::Source;
use crate::handlers::{install_stop_handler, open_session, require_accepted};
use crate::runner::RunRequest;

pub async fn handle_run(source: Source, terminal: bool) -> Result<()> {
    let mut session = open_session(&source, terminal)?;
    install_stop_handler(session.sender())?;

    let request = RunRequest {
        language_id: source.language.clone(),
        file: None,
    };
    let outcome = session.run(request).await?;
    require_accepted(outcome)?;

    session.wait_idle().await?;
    session.close_terminal().await
}
