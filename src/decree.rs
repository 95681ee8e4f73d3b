use crate::config::{ClientSpecifics, Decree};
use crate::context::{ClientContext, ClientSettings};
use crate::registry::Registry;
use crate::relay::UnattachedRelay;
use anyhow::{Result, bail};
use std::rc::Rc;
use tracing::info;

impl From<&ClientSpecifics> for ClientSettings {
    fn from(specifics: &ClientSpecifics) -> Self {
        Self {
            listen: specifics.listen_addr(),
            handshake_timeout: specifics.handshake_timeout(),
        }
    }
}

/// plan checks a decree list before anything is started. Every decree must
/// be one we can carry out, otherwise nothing runs.
pub fn plan(decrees: &[Decree]) -> Result<Vec<&ClientSpecifics>> {
    if decrees.is_empty() {
        bail!("[ERR] decree document is empty, nothing to launch");
    }

    decrees
        .iter()
        .map(|decree| match decree {
            Decree::LaunchClient(specifics) => Ok(specifics),
            Decree::LaunchServer(_) => bail!("[ERR] decree launchServer is not implemented"),
        })
        .collect()
}

/// launch starts a proxy instance in the registry for every decree
pub fn launch(registry: &mut Registry, decrees: &[Decree]) -> Result<Vec<Rc<ClientContext>>> {
    plan(decrees)?
        .into_iter()
        .map(|specifics| {
            info!(
                local = %specifics.listen_addr(),
                upstream = %specifics.upstream(),
                "launching client"
            );
            let relay = Rc::new(UnattachedRelay::new(specifics.upstream()));
            registry.launch_client(specifics.into(), relay)
        })
        .collect()
}

/// execute launches every decree and then runs the event loop
pub fn execute(decrees: &[Decree]) -> Result<()> {
    let mut registry = Registry::new()?;
    launch(&mut registry, decrees)?;
    registry.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;

    fn client_decree(local_port: u16) -> String {
        format!(
            r#"{{"decree":"launchClient","specifics":{{
                "serverAddress":"203.0.113.7","serverPort":2040,
                "localAddress":"127.0.0.1","localPort":{local_port}}}}}"#
        )
    }

    #[test]
    fn empty_document_is_refused() {
        assert!(plan(&[]).is_err());
    }

    #[test]
    fn launch_server_stops_everything() {
        let doc = format!(
            r#"[{}, {{"decree":"launchServer","specifics":{{}}}}]"#,
            client_decree(0)
        );
        let decrees = config::parse(&doc).unwrap();

        let mut registry = Registry::new().unwrap();
        let err = launch(&mut registry, &decrees).unwrap_err();
        assert!(err.to_string().contains("launchServer"));
        assert!(registry.objects().is_empty());
    }

    #[test]
    fn clients_are_bound_and_registered() {
        let doc = format!("[{}, {}]", client_decree(0), client_decree(0));
        let decrees = config::parse(&doc).unwrap();

        let mut registry = Registry::new().unwrap();
        let contexts = launch(&mut registry, &decrees).unwrap();

        assert_eq!(contexts.len(), 2);
        assert_eq!(registry.objects().len(), 2);
        assert_ne!(contexts[0].local_addr(), contexts[1].local_addr());
        assert_eq!(
            contexts[0].settings().handshake_timeout,
            Some(std::time::Duration::from_secs(10))
        );
    }
}
