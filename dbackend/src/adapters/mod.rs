#[cfg(any(feature = "backend-cloudflare", feature = "backend-openai"))]
mod http;

#[cfg(feature = "backend-cloudflare")]
pub mod cloudflare;

#[cfg(feature = "backend-openai")]
pub mod openai;

#[cfg(feature = "backend-ollama")]
pub mod ollama;
