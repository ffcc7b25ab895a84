// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Security Level: None
// Routes: GET /, GET /health, POST /api/auth/register, POST /api/auth/login
// Middleware: None (CORS and tracing only)

pub mod auth;
mod system;

pub use system::{health, root};
