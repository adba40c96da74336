mod backend;
mod transport;
mod wire;

pub use backend::{CLOUDFLARE_DEFAULT_MODEL, CloudflareBackend};
pub use transport::{CLOUDFLARE_BASE_URL, CloudflareHttpTransport, CloudflareTransport};
pub use wire::{
    CloudflareFunction, CloudflareMessage, CloudflareRequest, CloudflareResponse, CloudflareTool,
    CloudflareToolCall,
};
