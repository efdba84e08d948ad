use crate::FramelinkClient;

/// An extension loaded by the client.
///
/// Plugins are loaded in order when the client is created and unloaded when
/// the client is destroyed.
pub trait Plugin: Send + Sync {
    /// Name of the plugin, used for logging.
    fn name(&self) -> &str;
    fn load(&self, client: &FramelinkClient);
    fn unload(&self);
}
