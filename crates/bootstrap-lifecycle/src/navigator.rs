//! Navigation out of the bootstrap screen.

use tokio::sync::mpsc;
use tracing::debug;

/// Destinations the bootstrap can leave to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The main application.
    Main,
    /// The authentication entry point.
    Login,
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator that forwards routes to a channel.
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<Route>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Route>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn navigate(&self, route: Route) {
        if self.tx.send(route).is_err() {
            debug!(?route, "Navigation receiver dropped");
        }
    }
}
