// handlers/mod.rs - 3-Tier Handler Architecture
//
// Public (no auth) → Protected (JWT + live session) → Elevated (JWT + live session + admin)
//
// Tier membership is decided by the router in app.rs; handlers in every tier
// receive `State<AppState>`, and protected/elevated handlers also receive
// `Extension<AuthUser>` inserted by the session middleware.
pub mod elevated;
pub mod protected;
pub mod public;
