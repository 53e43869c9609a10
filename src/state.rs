use std::sync::Arc;

use crate::backend::Connector;
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub connector: Arc<dyn Connector>,
}
