// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Security Level: valid token whose session nonce is still current
// Routes: /api/auth/{logout,me}, /api/data/tables/*, /api/data/search,
//         /api/data/admin/tables/:name/rows*, /api/users/:id, /api/files/*
// Middleware: jwt_auth_middleware → validate_user_middleware
//
// Table capabilities are checked per call by the access gate inside the
// services, so a view-only grant reaches `tables::data` but not `rows::*`.

pub mod auth;
pub mod files;
pub mod rows;
pub mod search;
pub mod tables;
pub mod users;
