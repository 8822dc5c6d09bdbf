//! Wire protocol codec: typed commands and events over JSON text frames.
//!
//! Every frame is a JSON object whose top-level `type` string names the
//! message kind. Outbound commands ([`ClientCommand`], 12 kinds) encode
//! with fixed discriminants; inbound frames decode into [`ServerEvent`]
//! (44 known kinds plus the `Unknown` fallback). Nested unions
//! (conversation items and content parts) are resolved by a second
//! discriminant (`role`) or by field presence.

pub mod commands;
pub mod decode;
pub mod events;
pub mod items;

pub use commands::ClientCommand;
pub use decode::decode_frame;
pub use events::{
    ErrorDetail, RateLimit, ResponseResource, ResponseStatus, ServerEvent, SessionResource, Usage,
};
pub use items::{ContentPart, ConversationItem, OutboundItem};
