use futures::future;

use super::types::*;

pub trait SystemService {
    /// Liveness probe
    fn healthcheck(&self) -> ServiceFuture<String>;
}

#[derive(Clone, Debug, Default)]
pub struct SystemServiceImpl;

impl SystemService for SystemServiceImpl {
    fn healthcheck(&self) -> ServiceFuture<String> {
        Box::new(future::ok("Ok".to_string()))
    }
}
