//! UI protocol events: types, streaming translation, SSE encoding.

pub mod encoder;
pub mod translator;
pub mod types;

pub use encoder::{encode_comment, encode_retry, EventEncoder, SseFrame};
pub use translator::StreamTranslator;
pub use types::AgUiEvent;
