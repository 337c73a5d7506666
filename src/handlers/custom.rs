use anyhow::Result;
use crate::cli::Source;
use crate::handlers::{install_stop_handler, open_session, require_accepted};

pub async fn handle_custom(source: Source) -> Result<()> {
    let mut session = open_session(&source, false)?;
    install_stop_handler(session.sender())?;

    let outcome = session.run_custom().await?;
    require_accepted(outcome)?;

    session.wait_idle().await?;
    session.close_terminal().await
}
