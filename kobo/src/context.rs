use kobo_mq::Dispatcher;
use kobo_store::Store;

use crate::outbound::{EmailService, StatementRenderer};

/// Shared handles given to every command, query and job execution. Cheap to
/// clone; each execution still builds its own unit of work, so no domain
/// state crosses request scopes.
#[derive(Clone)]
pub struct AppContext {
    pub store: Store,
    pub dispatcher: Dispatcher,
    pub email: Box<dyn EmailService>,
    pub renderer: Box<dyn StatementRenderer>,
}
