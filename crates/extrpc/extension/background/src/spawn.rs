use futures::task::{LocalFutureObj, LocalSpawn, SpawnError};
use wasm_bindgen_futures::spawn_local;

/// Drives dispatcher tasks on the JS event loop
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SpawnLocal;

impl LocalSpawn for SpawnLocal {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        spawn_local(future);
        Ok(())
    }
}
