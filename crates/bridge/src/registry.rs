//! Tool discovery against a remote service.

use tracing::{debug, info};

use crate::descriptor::{ToolDescriptor, descriptors_from};
use crate::session::{Connector, Session};
use crate::{Error, Result};

/// A discovery session: connect, list tools, close.
///
/// Nothing is cached; every [`list_tools`](Self::list_tools) re-queries.
pub struct Registry<S> {
    session: S,
}

impl<S: Session> Registry<S> {
    /// Open a session, failing with [`Error::Connection`] if unreachable.
    pub async fn connect<C>(connector: &C) -> Result<Self>
    where
        C: Connector<Session = S>,
    {
        let session = connector
            .connect()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        debug!("registry session opened");
        Ok(Self { session })
    }

    /// List tools in the order the service reports them.
    ///
    /// An empty listing is not an error.
    pub async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        let tools = self.session.list_tools().await?;
        let descriptors = descriptors_from(tools);
        info!(count = descriptors.len(), "discovered tools");
        Ok(descriptors)
    }

    /// End the session.
    pub async fn close(self) -> Result<()> {
        self.session.close().await?;
        Ok(())
    }
}
