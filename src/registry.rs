use crate::context::{ClientContext, ClientSettings};
use crate::relay::RelaySeam;
use anyhow::{Context, Result};
use std::future::Future;
use std::rc::Rc;
use tokio::runtime::{Builder, Runtime};
use tokio::task::LocalSet;
use tracing::{debug, info};

/// GlobalObject is anything the registry keeps alive for the lifetime of
/// the process
pub trait GlobalObject {
    fn describe(&self) -> String;
}

/// Registry owns the process-wide executor and the long-lived objects
/// (proxy instance contexts) that run on it.
///
/// The executor is a current-thread tokio runtime driving a `LocalSet`, so
/// every accept loop and handshake shares one thread and none of the
/// in-process state needs a lock.
pub struct Registry {
    // Field order is drop order: objects, then their tasks, then the runtime
    objects: Vec<Rc<dyn GlobalObject>>,
    local: LocalSet,
    runtime: Runtime,
}

/// Registry implementation block
impl Registry {
    /// new is a constructor for the Registry type
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("[ERR] failed to build the event loop")?;

        Ok(Self {
            objects: Vec::new(),
            local: LocalSet::new(),
            runtime,
        })
    }

    /// block_on drives a future to completion on the shared executor.
    /// Tasks spawned with `spawn_local` from inside it stay on the executor
    /// and keep running once `run` is called.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.local.block_on(&self.runtime, future)
    }

    /// add_global_object hands ownership of a long-lived object to the
    /// registry
    pub fn add_global_object(&mut self, object: Rc<dyn GlobalObject>) {
        debug!("registered {}", object.describe());
        self.objects.push(object);
    }

    /// objects lists what the registry is keeping alive
    pub fn objects(&self) -> &[Rc<dyn GlobalObject>] {
        &self.objects
    }

    /// launch_client binds a proxy instance, arms its listener and
    /// registers it
    pub fn launch_client(
        &mut self,
        settings: ClientSettings,
        relay: Rc<dyn RelaySeam>,
    ) -> Result<Rc<ClientContext>> {
        let ctx = self.block_on(async {
            let ctx = ClientContext::bind(settings, relay).await?;
            ctx.start_listen();
            Ok::<_, anyhow::Error>(ctx)
        })?;

        self.add_global_object(ctx.clone());
        Ok(ctx)
    }

    /// run blocks, draining the executor until no work is left or the
    /// process is interrupted
    pub fn run(self) -> Result<()> {
        let Registry {
            objects,
            local,
            runtime,
        } = self;

        info!(instances = objects.len(), "event loop running");

        runtime.block_on(async {
            tokio::pin!(local);
            tokio::select! {
                _ = &mut local => info!("no work left, event loop finished"),
                signal = tokio::signal::ctrl_c() => {
                    signal.context("[ERR] failed to listen for ctrl-c")?;
                    info!("interrupted, shutting down");
                }
            }
            Ok::<_, anyhow::Error>(())
        })?;

        for object in &objects {
            debug!("releasing {}", object.describe());
        }
        Ok(())
    }
}
