pub mod server;

use anyhow::Result;

/// Actions the CLI can resolve to.
#[derive(Debug)]
pub enum Action {
    Server(server::Args),
}

impl Action {
    /// Execute the resolved action.
    ///
    /// # Errors
    /// Propagates the underlying action's failure.
    pub async fn execute(self) -> Result<()> {
        match self {
            Self::Server(args) => server::execute(args).await,
        }
    }
}
