// handlers/elevated/mod.rs - Elevated handlers (administrators only)
//
// Security Level: valid token, current session, admin role
// Routes: /api/data/admin/{database-tables,tables,import-table,access,search},
//         GET|POST /api/users
// Middleware: jwt_auth_middleware → validate_user_middleware → require_admin_middleware

pub mod access;
pub mod search;
pub mod tables;
pub mod users;
