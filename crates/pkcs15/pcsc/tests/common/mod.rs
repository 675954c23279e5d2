//! Common test utilities

use nexum_pkcs15_core::CardLayer;
use nexum_pkcs15_pcsc::PcscCardLayer;
use pcsc::{Context, Scope};

/// Try to get a real PC/SC context for tests
pub fn get_pcsc_context() -> Option<Context> {
    Context::establish(Scope::User).ok()
}

/// Try to get a layer with an established context and the index of a reader holding a card
pub fn get_layer_with_card() -> Option<(PcscCardLayer, usize)> {
    get_pcsc_context()?;

    let mut layer = PcscCardLayer::default();
    let readers = layer.establish_context(0).ok()?;
    let index = (0..readers).find(|i| layer.detect_card_presence(*i).unwrap_or(false));
    match index {
        Some(index) => Some((layer, index)),
        None => {
            layer.release_context();
            None
        }
    }
}
