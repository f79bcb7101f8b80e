use std::sync::Arc;

use anyhow::Result;

use crate::{
    cli::{Cli, Command},
    client, domain, infra,
    infra::stubs::{InMemoryMessageStore, InMemoryUserDirectory},
    protocol,
    server::{self, context::ServerContext, listener::Listener},
};

pub fn run(cli: Cli) -> Result<()> {
    let config = infra::config::load(cli.config.as_deref())?;
    infra::logging::init(&config.logging)?;

    tracing::debug!(
        domain = domain::module_name(),
        protocol = protocol::module_name(),
        client = client::module_name(),
        server = server::module_name(),
        infra = infra::module_name(),
        "module boundaries loaded"
    );

    match cli.command_or_default() {
        Command::Serve { host, port } => {
            let host = host.unwrap_or(config.network.host);
            let port = port.unwrap_or(config.network.port);

            let context = Arc::new(ServerContext::new(
                Arc::new(InMemoryUserDirectory::new()),
                Arc::new(InMemoryMessageStore::new()),
            ));
            let listener = Listener::bind(&host, port, context)?;
            listener.run();
        }
    }

    Ok(())
}
